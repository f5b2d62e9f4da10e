//! URL parsing and resolution.
//!
//! Application sources, stylesheets and scripts are all addressed by URL;
//! relative references inside an application are completed against the
//! application's canonical URL.

use alloc::format;
use alloc::string::{String, ToString};
use core::fmt;

/// URL error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    /// The URL string was empty.
    Empty,
    /// Missing scheme separator.
    MissingScheme(String),
    /// Scheme is not http or https.
    UnsupportedScheme(String),
    /// Port component did not parse.
    InvalidPort(String),
    /// A relative reference was given with no base to resolve against.
    NoBase(String),
}

impl fmt::Display for UrlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlError::Empty => write!(f, "Empty URL"),
            UrlError::MissingScheme(u) => write!(f, "Missing scheme: {}", u),
            UrlError::UnsupportedScheme(s) => write!(f, "Unsupported scheme: {}", s),
            UrlError::InvalidPort(p) => write!(f, "Invalid port: {}", p),
            UrlError::NoBase(u) => write!(f, "No base URL for relative reference: {}", u),
        }
    }
}

/// A parsed absolute URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    /// URL scheme (http or https).
    pub scheme: String,
    /// Host name.
    pub host: String,
    /// Port number.
    pub port: u16,
    /// Path, always starting with '/'.
    pub path: String,
    /// Query string (without '?').
    pub query: Option<String>,
    /// Fragment (without '#').
    pub fragment: Option<String>,
}

impl Url {
    /// Parse an absolute URL string.
    pub fn parse(url: &str) -> Result<Self, UrlError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(UrlError::Empty);
        }

        let (scheme, rest) = if let Some(pos) = url.find("://") {
            (&url[..pos], &url[pos + 3..])
        } else {
            return Err(UrlError::MissingScheme(url.to_string()));
        };

        let scheme = scheme.to_ascii_lowercase();
        let default_port = match scheme.as_str() {
            "http" => 80,
            "https" => 443,
            _ => return Err(UrlError::UnsupportedScheme(scheme)),
        };

        let (host_port, path_query) = if let Some(pos) = rest.find('/') {
            (&rest[..pos], &rest[pos..])
        } else {
            (rest, "/")
        };

        let (host, port) = if let Some(pos) = host_port.rfind(':') {
            let port_str = &host_port[pos + 1..];
            let port: u16 = port_str
                .parse()
                .map_err(|_| UrlError::InvalidPort(port_str.to_string()))?;
            (&host_port[..pos], port)
        } else {
            (host_port, default_port)
        };

        let (path_query, fragment) = if let Some(pos) = path_query.find('#') {
            (&path_query[..pos], Some(path_query[pos + 1..].to_string()))
        } else {
            (path_query, None)
        };

        let (path, query) = if let Some(pos) = path_query.find('?') {
            (&path_query[..pos], Some(path_query[pos + 1..].to_string()))
        } else {
            (path_query, None)
        };

        Ok(Url {
            scheme,
            host: host.to_string(),
            port,
            path: path.to_string(),
            query,
            fragment,
        })
    }

    /// Check if a string is already an absolute URL.
    pub fn is_absolute(s: &str) -> bool {
        s.starts_with("http://") || s.starts_with("https://")
    }

    /// Check if a string is a data URI.
    pub fn is_data(s: &str) -> bool {
        s.starts_with("data:")
    }

    /// The host:port pair, omitting default ports.
    pub fn host_port(&self) -> String {
        if (self.scheme == "http" && self.port == 80)
            || (self.scheme == "https" && self.port == 443)
        {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// The origin: scheme://host[:port].
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.host_port())
    }

    /// The directory portion of the path, up to and including the last '/'.
    pub fn base_path(&self) -> &str {
        match self.path.rfind('/') {
            Some(pos) => &self.path[..=pos],
            None => "/",
        }
    }

    /// The public path: origin plus directory, used to complete relative
    /// resource references issued by application code.
    pub fn public_path(&self) -> String {
        format!("{}{}", self.origin(), self.base_path())
    }

    /// Resolve a reference against this URL as base.
    ///
    /// Absolute references are returned unchanged; protocol-relative ones
    /// inherit the base scheme; root-relative and relative paths are
    /// completed against the origin and directory respectively.
    pub fn resolve(&self, reference: &str) -> String {
        let reference = reference.trim();
        if Url::is_absolute(reference) || Url::is_data(reference) {
            return reference.to_string();
        }
        if let Some(rest) = reference.strip_prefix("//") {
            return format!("{}://{}", self.scheme, rest);
        }
        if reference.starts_with('/') {
            return format!("{}{}", self.origin(), reference);
        }
        if reference.is_empty() {
            return self.to_string();
        }
        format!("{}{}", self.public_path(), reference)
    }

    /// Whether another absolute URL shares this URL's origin.
    pub fn same_origin(&self, other: &str) -> bool {
        match Url::parse(other) {
            Ok(u) => u.scheme == self.scheme && u.host == self.host && u.port == self.port,
            Err(_) => false,
        }
    }

    /// Strip the origin from a same-origin absolute URL, yielding a
    /// root-relative path. Returns the input unchanged otherwise.
    pub fn relativize<'a>(&self, other: &'a str) -> &'a str {
        let origin = self.origin();
        if other.len() > origin.len() && other.starts_with(origin.as_str()) {
            &other[origin.len()..]
        } else {
            other
        }
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.origin(), self.path)?;
        if let Some(q) = &self.query {
            write!(f, "?{}", q)?;
        }
        if let Some(frag) = &self.fragment {
            write!(f, "#{}", frag)?;
        }
        Ok(())
    }
}
