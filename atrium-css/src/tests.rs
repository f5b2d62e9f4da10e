//! Style scoping unit tests
//!
//! Covers rule-list parsing, selector prefixing, url() completion, the
//! escape-hatch comment protocol, and scoping idempotence.

#[cfg(test)]
mod parser_tests {
    use crate::parser::{split_selectors, CssParser};
    use crate::stylesheet::Rule;

    #[test]
    fn test_parse_style_rules() {
        let mut parser = CssParser::new(".a {color:red} div,span{margin:0}");
        let sheet = parser.parse_stylesheet().unwrap();
        assert_eq!(sheet.len(), 2);

        match &sheet.rules[1] {
            Rule::Style(rule) => {
                assert_eq!(rule.selectors, ["div", "span"]);
                assert_eq!(rule.declarations, "margin:0");
            }
            other => panic!("expected style rule, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_media_rule() {
        let mut parser = CssParser::new("@media screen and (max-width: 40em) { .a{x:y} }");
        let sheet = parser.parse_stylesheet().unwrap();
        match &sheet.rules[0] {
            Rule::Container(container) => {
                assert_eq!(container.condition, "@media screen and (max-width: 40em)");
                assert_eq!(container.rules.len(), 1);
            }
            other => panic!("expected container rule, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_passthrough_at_rules() {
        let mut parser =
            CssParser::new("@import url(\"a.css\"); @keyframes spin{from{r:0}to{r:1}}");
        let sheet = parser.parse_stylesheet().unwrap();
        assert_eq!(sheet.len(), 2);
        assert!(matches!(&sheet.rules[0], Rule::Other(t) if t.starts_with("@import")));
        assert!(matches!(&sheet.rules[1], Rule::Other(t) if t == "@keyframes spin{from{r:0}to{r:1}}"));
    }

    #[test]
    fn test_split_selectors_top_level_only() {
        let sels = split_selectors(".a, :is(.b, .c) > .d, [data-x=\"p,q\"]");
        assert_eq!(sels, [".a", ":is(.b, .c) > .d", "[data-x=\"p,q\"]"]);
    }

    #[test]
    fn test_unclosed_block_is_an_error() {
        let mut parser = CssParser::new(".a {color:red");
        assert!(parser.parse_stylesheet().is_err());
    }
}

#[cfg(test)]
mod scoper_tests {
    use alloc::string::ToString;

    use atrium_types::url::Url;

    use crate::scoper::{EngineQuirks, PendingScope, ScratchSheet, StyleScoper};

    fn scoper() -> StyleScoper {
        StyleScoper::new("app1")
    }

    #[test]
    fn test_mixed_selector_list() {
        let mut scratch = ScratchSheet::new();
        let scoped = scoper()
            .scope("* {margin:0} .a, html > .b {color:red}", &mut scratch)
            .unwrap();
        assert_eq!(
            scoped,
            "atrium-app[name=app1] *{margin:0} atrium-app[name=app1] .a, html > .b{color:red}"
        );
    }

    #[test]
    fn test_root_alias_rewrites() {
        let s = scoper();
        assert_eq!(s.scope_selector("html"), "atrium-app[name=app1]");
        assert_eq!(s.scope_selector("body"), "atrium-app[name=app1]");
        assert_eq!(s.scope_selector(":root"), "atrium-app[name=app1]");
        assert_eq!(s.scope_selector("html body"), "atrium-app[name=app1]");
        assert_eq!(s.scope_selector("html .b"), "atrium-app[name=app1] .b");
        assert_eq!(s.scope_selector("html > .b"), "html > .b");
        assert_eq!(s.scope_selector(".menu"), "atrium-app[name=app1] .menu");
    }

    #[test]
    fn test_scoping_is_idempotent() {
        let mut scratch = ScratchSheet::new();
        let s = scoper();
        let once = s
            .scope("* {margin:0} .a, html > .b {color:red}", &mut scratch)
            .unwrap();
        let twice = s.scope(&once, &mut scratch).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_media_rules_recurse() {
        let mut scratch = ScratchSheet::new();
        let scoped = scoper()
            .scope("@media screen { html {margin:0} }", &mut scratch)
            .unwrap();
        assert_eq!(scoped, "@media screen{atrium-app[name=app1]{margin:0}}");
    }

    #[test]
    fn test_url_completion() {
        let base = Url::parse("https://x/common/main.css").unwrap();
        let mut scratch = ScratchSheet::new();
        let scoped = scoper()
            .with_base(base)
            .scope(
                ".a{background:url(img/a.png);mask:url('/m.svg');cursor:url(\"data:image/png;base64,AA\")}",
                &mut scratch,
            )
            .unwrap();
        assert!(scoped.contains("url(\"https://x/common/img/a.png\")"));
        assert!(scoped.contains("url(\"https://x/m.svg\")"));
        assert!(scoped.contains("url(\"data:image/png;base64,AA\")"));
    }

    #[test]
    fn test_url_with_quoted_paren() {
        let base = Url::parse("https://x/common/main.css").unwrap();
        let mut scratch = ScratchSheet::new();
        let scoped = scoper()
            .with_base(base)
            .scope(".a{background:url(\"img/a(1).png\")}", &mut scratch)
            .unwrap();
        assert!(scoped.contains("url(\"https://x/common/img/a(1).png\")"));
    }

    #[test]
    fn test_safari_quirk_relativizes_same_origin() {
        let base = Url::parse("https://x/common/main.css").unwrap();
        let s = scoper()
            .with_base(base)
            .with_quirks(EngineQuirks::SAFARI_CONTENT);
        let rewritten = s.rewrite_declarations("background:url(https://x/img/a.png)");
        assert_eq!(rewritten, "background:url(\"/img/a.png\")");

        let cross = s.rewrite_declarations("background:url(https://y/img/a.png)");
        assert_eq!(cross, "background:url(\"https://y/img/a.png\")");
    }

    #[test]
    fn test_safari_quirk_requotes_content() {
        let s = scoper().with_quirks(EngineQuirks::SAFARI_CONTENT);
        assert_eq!(
            s.rewrite_declarations("content:hello"),
            "content: \"hello\""
        );
        assert_eq!(s.rewrite_declarations("content:none"), "content:none");
        assert_eq!(
            s.rewrite_declarations("content:attr(title)"),
            "content:attr(title)"
        );
        assert_eq!(
            s.rewrite_declarations("content:\"quoted\""),
            "content:\"quoted\""
        );
    }

    #[test]
    fn test_ignore_next_comment() {
        let mut scratch = ScratchSheet::new();
        let scoped = scoper()
            .scope("/* atrium-ignore-next */ .a{x:y} .b{x:y}", &mut scratch)
            .unwrap();
        assert_eq!(scoped, ".a{x:y} atrium-app[name=app1] .b{x:y}");
    }

    #[test]
    fn test_ignore_selector_list_comment() {
        let mut scratch = ScratchSheet::new();
        let scoped = scoper()
            .scope("/* atrium-ignore: .keep */ .keep, .x{c:d}", &mut scratch)
            .unwrap();
        assert_eq!(scoped, ".keep, atrium-app[name=app1] .x{c:d}");
    }

    #[test]
    fn test_ignore_region_comments() {
        let mut scratch = ScratchSheet::new();
        let scoped = scoper()
            .scope(
                "/* atrium-ignore-start */ .a{x:y} .b{x:y} /* atrium-ignore-end */ .c{x:y}",
                &mut scratch,
            )
            .unwrap();
        assert_eq!(scoped, ".a{x:y} .b{x:y} atrium-app[name=app1] .c{x:y}");
    }

    #[test]
    fn test_scratch_sheet_disabled_between_uses() {
        let mut scratch = ScratchSheet::new();
        assert!(scratch.is_disabled());
        scoper().scope(".a{x:y}", &mut scratch).unwrap();
        assert!(scratch.is_disabled());
    }

    #[test]
    fn test_pending_scope_fires_once() {
        let mut scratch = ScratchSheet::new();
        let mut pending = PendingScope::new(scoper());
        assert!(pending.is_armed());

        assert!(pending.feed("", &mut scratch).is_none());
        assert!(pending.is_armed());

        let scoped = pending.feed(".a{x:y}", &mut scratch).unwrap().unwrap();
        assert_eq!(scoped, "atrium-app[name=app1] .a{x:y}");
        assert!(!pending.is_armed());

        assert!(pending.feed(".b{x:y}", &mut scratch).is_none());
    }

    #[test]
    fn test_keyframes_pass_through_unscoped() {
        let mut scratch = ScratchSheet::new();
        let scoped = scoper()
            .scope("@keyframes spin{from{r:0}to{r:1}}", &mut scratch)
            .unwrap();
        assert_eq!(scoped, "@keyframes spin{from{r:0}to{r:1}}".to_string());
    }
}
