//! Document tree and patch layer unit tests

#[cfg(test)]
mod document_tests {
    use alloc::vec::Vec;

    use crate::document::{Document, DomError, DOCUMENT_NODE};
    use crate::node::Attribute;

    #[test]
    fn test_host_document_structure() {
        let doc = Document::new_host();
        let html = doc.document_element().unwrap();
        assert_eq!(doc.get(html).unwrap().tag_name(), Some("html"));
        assert!(doc.head().is_some());
        assert!(doc.body().is_some());
    }

    #[test]
    fn test_append_and_remove() {
        let mut doc = Document::new_host();
        let body = doc.body().unwrap();
        let div = doc.create_element("div", Vec::new());
        doc.append(body, div).unwrap();
        assert_eq!(doc.get(div).unwrap().parent, Some(body));

        doc.remove(div).unwrap();
        assert_eq!(doc.get(div).unwrap().parent, None);
        assert_eq!(doc.remove(div), Err(DomError::NotAttached(div)));
    }

    #[test]
    fn test_insert_before_and_replace() {
        let mut doc = Document::new_host();
        let body = doc.body().unwrap();
        let a = doc.create_element("a", Vec::new());
        let b = doc.create_element("b", Vec::new());
        let c = doc.create_element("c", Vec::new());
        doc.append(body, a).unwrap();
        doc.append(body, c).unwrap();
        doc.insert_before(body, b, Some(c)).unwrap();
        assert_eq!(doc.get(body).unwrap().children, [a, b, c]);

        let d = doc.create_element("d", Vec::new());
        doc.replace(b, d).unwrap();
        assert_eq!(doc.get(body).unwrap().children, [a, d, c]);
        assert_eq!(doc.get(b).unwrap().parent, None);
    }

    #[test]
    fn test_query_selector() {
        let mut doc = Document::new_host();
        let body = doc.body().unwrap();
        let outer = doc.create_element(
            "div",
            alloc::vec![Attribute::new("class", "outer box")],
        );
        let inner = doc.create_element(
            "span",
            alloc::vec![Attribute::new("id", "target"), Attribute::new("name", "x")],
        );
        doc.append(body, outer).unwrap();
        doc.append(outer, inner).unwrap();

        assert_eq!(doc.query_selector(DOCUMENT_NODE, "#target"), Some(inner));
        assert_eq!(doc.query_selector(DOCUMENT_NODE, ".outer span"), Some(inner));
        assert_eq!(doc.query_selector(DOCUMENT_NODE, "span[name=x]"), Some(inner));
        assert_eq!(doc.query_selector(DOCUMENT_NODE, ".missing"), None);
        // Scoped query does not see outside its subtree.
        assert_eq!(doc.query_selector(inner, "div"), None);
    }

    #[test]
    fn test_import_stamps_owner() {
        let mut fragment = Document::new();
        let div = fragment.create_element("div", Vec::new());
        let text = fragment.create_text("hi");
        fragment.append(DOCUMENT_NODE, div).unwrap();
        fragment.append(div, text).unwrap();

        let mut host = Document::new_host();
        let body = host.body().unwrap();
        let imported = host.import(&fragment, div, body, Some("app1")).unwrap();
        assert_eq!(host.get(imported).unwrap().owner_app.as_deref(), Some("app1"));
        assert_eq!(host.text_content(imported), "hi");
    }
}

#[cfg(test)]
mod markup_tests {
    use crate::document::DOCUMENT_NODE;
    use crate::markup::{parse_fragment, MarkupError};

    #[test]
    fn test_parse_structure() {
        let doc = parse_fragment(
            "<html><head><link rel=\"stylesheet\" href=\"a.css\"></head>\
             <body><div id=\"root\">hello</div></body></html>",
        )
        .unwrap();
        assert!(doc.head().is_some());
        assert!(doc.body().is_some());
        let root = doc.query_selector(DOCUMENT_NODE, "#root").unwrap();
        assert_eq!(doc.text_content(root), "hello");
        let link = doc.query_selector(DOCUMENT_NODE, "link").unwrap();
        assert_eq!(doc.get(link).unwrap().get_attribute("href"), Some("a.css"));
    }

    #[test]
    fn test_script_and_style_raw_text() {
        let doc = parse_fragment(
            "<body><style>.a{x:y}</style><script>if (a < b) { run() }</script></body>",
        )
        .unwrap();
        let style = doc.query_selector(DOCUMENT_NODE, "style").unwrap();
        assert_eq!(doc.text_content(style), ".a{x:y}");
        let script = doc.query_selector(DOCUMENT_NODE, "script").unwrap();
        assert_eq!(doc.text_content(script), "if (a < b) { run() }");
    }

    #[test]
    fn test_comments_preserved() {
        let doc = parse_fragment("<body><!--placeholder--></body>").unwrap();
        let body = doc.body().unwrap();
        let children = &doc.get(body).unwrap().children;
        assert_eq!(children.len(), 1);
        assert_eq!(
            doc.get(children[0]).unwrap().data,
            crate::node::NodeData::Comment("placeholder".into())
        );
    }

    #[test]
    fn test_multibyte_attribute_values() {
        let doc = parse_fragment(
            "<body><div title=\"héllo\" data-x='日本語' →>x</div></body>",
        )
        .unwrap();
        let div = doc.query_selector(DOCUMENT_NODE, "div").unwrap();
        assert_eq!(doc.get(div).unwrap().get_attribute("title"), Some("héllo"));
        assert_eq!(doc.get(div).unwrap().get_attribute("data-x"), Some("日本語"));
    }

    #[test]
    fn test_empty_markup_is_an_error() {
        assert!(matches!(parse_fragment("  \n "), Err(MarkupError::Empty)));
    }
}

#[cfg(test)]
mod patch_tests {
    use alloc::vec::Vec;

    use atrium_types::url::Url;

    use crate::document::{Document, DOCUMENT_NODE};
    use crate::node::Attribute;
    use crate::patch::{AttrOutcome, ContainerHandle, PatchContext};

    /// Build a host document with a registered container for "app1".
    fn setup() -> (Document, PatchContext, ContainerHandle) {
        let mut doc = Document::new_host();
        let body = doc.body().unwrap();
        let container = doc.create_element(
            "atrium-app",
            alloc::vec![Attribute::new("name", "app1")],
        );
        let app_head = doc.create_element("atrium-app-head", Vec::new());
        let app_body = doc.create_element("atrium-app-body", Vec::new());
        doc.append(body, container).unwrap();
        doc.append(container, app_head).unwrap();
        doc.append(container, app_body).unwrap();

        let handle = ContainerHandle {
            container,
            head: app_head,
            body: app_body,
        };
        let mut ctx = PatchContext::new();
        ctx.register_route(
            "app1",
            handle,
            Some(Url::parse("https://x/common/").unwrap()),
        );
        ctx.acquire();
        (doc, ctx, handle)
    }

    #[test]
    fn test_refcounted_install() {
        let mut ctx = PatchContext::new();
        assert!(!ctx.is_installed());
        assert!(ctx.acquire());
        assert!(!ctx.acquire());
        assert!(!ctx.release());
        assert!(ctx.release());
        assert!(!ctx.is_installed());
        assert!(!ctx.release());
    }

    #[test]
    fn test_create_element_tags_current_app() {
        let (mut doc, mut ctx, _) = setup();
        ctx.enter("app1");
        let el = ctx.create_element(&mut doc, "div", Vec::new());
        ctx.exit();
        assert_eq!(doc.get(el).unwrap().owner_app.as_deref(), Some("app1"));

        let untagged = ctx.create_element(&mut doc, "div", Vec::new());
        assert_eq!(doc.get(untagged).unwrap().owner_app, None);
    }

    #[test]
    fn test_append_redirects_into_container() {
        let (mut doc, mut ctx, handle) = setup();
        ctx.enter("app1");
        let style = ctx.create_element(&mut doc, "style", Vec::new());
        let div = ctx.create_element(&mut doc, "div", Vec::new());
        ctx.exit();

        let head = doc.head().unwrap();
        let body = doc.body().unwrap();
        ctx.append(&mut doc, head, style).unwrap();
        ctx.append(&mut doc, body, div).unwrap();

        assert_eq!(doc.get(style).unwrap().parent, Some(handle.head));
        assert_eq!(doc.get(div).unwrap().parent, Some(handle.body));
    }

    #[test]
    fn test_append_of_unowned_node_is_not_redirected() {
        let (mut doc, ctx, _) = setup();
        let div = doc.create_element("div", Vec::new());
        let body = doc.body().unwrap();
        ctx.append(&mut doc, body, div).unwrap();
        assert_eq!(doc.get(div).unwrap().parent, Some(body));
    }

    #[test]
    fn test_query_scoped_to_container() {
        let (mut doc, mut ctx, handle) = setup();
        // One ".item" inside the container, one outside.
        let inside = doc.create_element("div", alloc::vec![Attribute::new("class", "item")]);
        doc.append(handle.body, inside).unwrap();
        let outside = doc.create_element("div", alloc::vec![Attribute::new("class", "item")]);
        let body = doc.body().unwrap();
        doc.append(body, outside).unwrap();

        ctx.enter("app1");
        assert_eq!(ctx.query_selector(&doc, ".item"), Some(inside));
        // Root-element queries always hit the real document.
        assert_eq!(
            ctx.query_selector(&doc, "html"),
            doc.document_element()
        );
        ctx.exit();
        assert_eq!(ctx.query_selector(&doc, ".item"), Some(outside));
    }

    #[test]
    fn test_attribute_url_completion() {
        let (mut doc, mut ctx, _) = setup();
        ctx.enter("app1");
        let img = ctx.create_element(&mut doc, "img", Vec::new());
        ctx.exit();

        assert_eq!(
            ctx.set_attribute(&mut doc, img, "src", "img/logo.png").unwrap(),
            AttrOutcome::Set
        );
        assert_eq!(
            doc.get(img).unwrap().get_attribute("src"),
            Some("https://x/common/img/logo.png")
        );

        // Absolute URLs pass through untouched.
        ctx.set_attribute(&mut doc, img, "src", "https://y/a.png").unwrap();
        assert_eq!(doc.get(img).unwrap().get_attribute("src"), Some("https://y/a.png"));
    }

    #[test]
    fn test_container_data_attribute_routes_to_channel() {
        let (mut doc, ctx, handle) = setup();
        let outcome = ctx
            .set_attribute(&mut doc, handle.container, "data", "{\"k\":1}")
            .unwrap();
        assert_eq!(outcome, AttrOutcome::RouteData("{\"k\":1}".into()));
        assert_eq!(doc.get(handle.container).unwrap().get_attribute("data"), None);
    }

    #[test]
    fn test_uninstalled_context_is_transparent() {
        let mut doc = Document::new_host();
        let mut ctx = PatchContext::new();
        ctx.enter("app1");
        let el = ctx.create_element(&mut doc, "div", Vec::new());
        ctx.exit();
        assert_eq!(doc.get(el).unwrap().owner_app, None);
        // Detached node is invisible to queries.
        assert_eq!(ctx.query_selector(&doc, "div"), None);
    }
}
