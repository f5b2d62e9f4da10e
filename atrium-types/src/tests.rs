//! Unit tests for URL resolution and application naming.

#[cfg(test)]
mod url_tests {
    use crate::url::{Url, UrlError};
    use alloc::string::ToString;

    #[test]
    fn test_parse_basic() {
        let url = Url::parse("https://x.example/common/index.html").unwrap();
        assert_eq!(url.scheme, "https");
        assert_eq!(url.host, "x.example");
        assert_eq!(url.port, 443);
        assert_eq!(url.path, "/common/index.html");
    }

    #[test]
    fn test_parse_port_query_fragment() {
        let url = Url::parse("http://h:8080/a/b?x=1#top").unwrap();
        assert_eq!(url.port, 8080);
        assert_eq!(url.query.as_deref(), Some("x=1"));
        assert_eq!(url.fragment.as_deref(), Some("top"));
        assert_eq!(url.to_string(), "http://h:8080/a/b?x=1#top");
    }

    #[test]
    fn test_parse_rejects_bad_scheme() {
        assert!(matches!(
            Url::parse("ftp://h/x"),
            Err(UrlError::UnsupportedScheme(_))
        ));
        assert!(matches!(Url::parse("no-scheme"), Err(UrlError::MissingScheme(_))));
        assert!(matches!(Url::parse("  "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_base_and_public_path() {
        let url = Url::parse("https://x/common/index.html").unwrap();
        assert_eq!(url.base_path(), "/common/");
        assert_eq!(url.public_path(), "https://x/common/");

        let bare = Url::parse("https://x").unwrap();
        assert_eq!(bare.base_path(), "/");
    }

    #[test]
    fn test_resolve() {
        let base = Url::parse("https://x/common/index.html").unwrap();
        assert_eq!(base.resolve("app.js"), "https://x/common/app.js");
        assert_eq!(base.resolve("/static/a.css"), "https://x/static/a.css");
        assert_eq!(base.resolve("//cdn.example/lib.js"), "https://cdn.example/lib.js");
        assert_eq!(base.resolve("https://y/z"), "https://y/z");
        assert_eq!(base.resolve("data:text/css,"), "data:text/css,");
    }

    #[test]
    fn test_same_origin_and_relativize() {
        let base = Url::parse("https://x/common/").unwrap();
        assert!(base.same_origin("https://x/other"));
        assert!(!base.same_origin("https://y/other"));
        assert_eq!(base.relativize("https://x/img/a.png"), "/img/a.png");
        assert_eq!(base.relativize("https://y/img/a.png"), "https://y/img/a.png");
    }
}

#[cfg(test)]
mod name_tests {
    use crate::name::{container_prefix, validate_name, AppName, NameError};

    #[test]
    fn test_valid_names() {
        assert!(validate_name("app1").is_ok());
        assert!(validate_name("my-App_2").is_ok());
    }

    #[test]
    fn test_invalid_names() {
        assert_eq!(validate_name(""), Err(NameError::Empty));
        assert!(matches!(validate_name("1app"), Err(NameError::BadStart(_))));
        assert!(matches!(
            validate_name("a.b"),
            Err(NameError::BadChar(_, '.'))
        ));
    }

    #[test]
    fn test_container_prefix() {
        let name = AppName::new("app1").unwrap();
        assert_eq!(container_prefix(&name), "atrium-app[name=app1]");
    }
}
