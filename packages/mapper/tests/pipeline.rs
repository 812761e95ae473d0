use async_trait::async_trait;
use pagemap::render::{decorator_fn, DecoratorRenderer};
use pagemap::{
    path_of, resolve, DiagnosticKind, Document, MapperConfig, MapperError, NodeId, Orchestrator, RenderAdapter,
    RenderError, RenderOptions, RenderResult, RenderStrategy, RendererRegistry,
};
use pagemap_dom::Selector;
use std::time::Duration;

struct Identity;

#[async_trait]
impl RenderAdapter for Identity {
    async fn render(&self, marked_html: &str, _: &RenderOptions) -> RenderResult<String> {
        Ok(marked_html.to_string())
    }
}

/// Returns a fixed page whatever it is given
struct Fixed(&'static str);

#[async_trait]
impl RenderAdapter for Fixed {
    async fn render(&self, _: &str, _: &RenderOptions) -> RenderResult<String> {
        Ok(self.0.to_string())
    }
}

/// Wraps the root content in a layout shell after a short delay
struct SlowShell;

#[async_trait]
impl RenderAdapter for SlowShell {
    async fn render(&self, marked_html: &str, _: &RenderOptions) -> RenderResult<String> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(marked_html
            .replace("<main>", r#"<main><div class="shell"><div class="column">"#)
            .replace("</main>", "</div></div></main>"))
    }
}

struct Broken;

#[async_trait]
impl RenderAdapter for Broken {
    async fn render(&self, _: &str, _: &RenderOptions) -> RenderResult<String> {
        Err(RenderError::Browser("chrome exited".to_string()))
    }
}

fn orchestrator(name: &str, strategy: RenderStrategy) -> (Orchestrator, MapperConfig) {
    let registry = RendererRegistry::new().with(name, strategy);
    (Orchestrator::new(registry), MapperConfig::default().with_render_mode(name))
}

fn select_first(doc: &Document, selector: &str) -> NodeId {
    doc.select_first(doc.root(), &Selector::parse(selector).unwrap()).unwrap()
}

#[tokio::test]
async fn test_end_to_end_heading_and_image() {
    let (orchestrator, config) = orchestrator("identity", RenderStrategy::custom(Identity));
    let config = config.with_target_selectors(["h1", "img"]);

    let service = orchestrator
        .initialize_mapper(r#"<main><h1>Title</h1><img src="/a.jpg"></main>"#, &config)
        .await
        .unwrap();

    let rendered = service.rendered_document();
    let rendered_img = select_first(rendered, "main img");
    let img_marker = rendered.get_attribute(rendered_img, "src").unwrap();
    let parts: Vec<&str> = img_marker.split('_').collect();
    assert_eq!(parts[0], "MARKER");
    assert_eq!(parts[1], "IMG");
    assert!(parts[2].len() == 6 || parts[2].len() == 8);
    assert_eq!(parts[3], "SRC");
    assert!(!service.marked_html().contains("/a.jpg"));
    assert_eq!(service.marker_record(img_marker).unwrap().value, "/a.jpg");

    let source_img = service.find_source_element(rendered, rendered_img).unwrap();
    assert_eq!(source_img, select_first(service.source_document(), "main img"));

    assert_eq!(service.get_all_mapped_elements(None).len(), 2);
}

#[tokio::test]
async fn test_identity_render_keeps_paths() {
    let (orchestrator, config) = orchestrator("identity", RenderStrategy::custom(Identity));
    let source = r#"<main>
        <div class="hero"><h1>Welcome</h1><p>Lead <a href="/x">link</a></p><img src="/hero.png"></div>
        <section><h2>List</h2><ul><li>one</li><li>two</li></ul><ol><li><em>first</em></li></ol></section>
    </main>"#;

    let service = orchestrator.initialize_mapper(source, &config).await.unwrap();

    assert_eq!(service.len(), service.source_paths().len());
    assert_eq!(service.len(), 7);
    for (marker, entry) in service.mapping().iter() {
        assert_eq!(entry.rendered, entry.source, "{}", marker);
    }
    assert!(service.diagnostics().is_empty());
}

#[tokio::test]
async fn test_async_adapter_wrapping() {
    let (orchestrator, config) = orchestrator("shell", RenderStrategy::custom(SlowShell));

    let service = orchestrator
        .initialize_mapper("<main><h1>Title</h1><p>Body</p></main>", &config)
        .await
        .unwrap();

    let rendered = service.rendered_document();
    let p = select_first(rendered, "main .column > p");
    let root = select_first(rendered, "main");
    assert_eq!(path_of(rendered, p, root).key(), "DIV[0]>DIV[0]>P[1]");

    let source_p = service.find_source_element(rendered, p).unwrap();
    assert_eq!(service.source_document().name(source_p), Some("p"));
    assert!(service.metrics().rendering >= Duration::from_millis(10));
}

/// The card block from the live site: moves the picture out of its
/// paragraph, converts paragraphs to spans and pulls the call to action up
fn decorate_card(doc: &mut Document, root: NodeId) -> anyhow::Result<()> {
    let Some(card) = doc.select_first(root, &Selector::parse(".card")?) else {
        return Ok(());
    };
    let inner = doc
        .first_element_child(card)
        .ok_or_else(|| anyhow::anyhow!("card has no inner div"))?;
    doc.add_class(inner, "card-inner");

    if let Some(picture) = doc.select_first(card, &Selector::parse("picture")?) {
        if let Some(para) = doc.parent_element(picture).filter(|p| doc.name(*p) == Some("p")) {
            let container = doc.create_element("div");
            doc.add_class(container, "card-picture-container");
            doc.append_child(container, picture);
            doc.prepend_child(inner, container);
            doc.detach(para);
        }
    }

    for p in doc.select(card, &Selector::parse("p")?) {
        let span = doc.create_element("span");
        doc.reparent_children(p, span);
        doc.replace_with(p, span);
    }

    let content = doc
        .element_children(inner)
        .find(|child| doc.name(*child) == Some("div") && !doc.has_attribute(*child, "class"));
    if let Some(content) = content {
        doc.add_class(content, "card-content-container");
        let cta = doc.element_children(content).filter(|c| doc.name(*c) == Some("span")).last();
        if let Some(cta) = cta {
            doc.add_class(cta, "card-cta-container");
            doc.append_child(inner, cta);
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_restructuring_decorators() {
    let renderer = DecoratorRenderer::new()
        .with(decorator_fn(decorate_card))
        .with(decorator_fn(|doc, root| {
            // Injected banner shifts every sibling index
            let banner = doc.create_element("div");
            doc.set_attribute(banner, "class", "promo");
            doc.prepend_child(root, banner);
            Ok(())
        }));
    let (orchestrator, config) = orchestrator("decorators", RenderStrategy::Decorators(renderer));

    let source = r#"<main><div class="card"><div><p><picture><img src="/media/card.jpg" alt="Card"></picture></p><div><h3>Card title</h3><p>Card body</p><p><a href="/learn">Learn more</a></p></div></div></div></main>"#;
    let service = orchestrator.initialize_mapper(source, &config).await.unwrap();

    // The picture paragraph is gone; its marker went with it
    assert_eq!(service.len(), 4);
    let unmatched: Vec<_> = service
        .diagnostics()
        .iter()
        .filter(|d| d.kind == DiagnosticKind::UnmatchedMarker)
        .collect();
    assert_eq!(unmatched.len(), 1);
    assert!(unmatched[0].marker.as_deref().unwrap().starts_with("MARKER_P_"));

    let rendered = service.rendered_document();
    let source_doc = service.source_document();

    let cta = select_first(rendered, ".card-inner > .card-cta-container");
    let source_cta = service.find_source_element(rendered, cta).unwrap();
    assert_eq!(source_doc.name(source_cta), Some("p"));
    assert!(source_doc.text_content(source_cta).contains("Learn more"));

    let img = select_first(rendered, ".card-picture-container img");
    let source_img = service.find_source_element(rendered, img).unwrap();
    assert_eq!(source_doc.name(source_img), Some("img"));

    let body = select_first(rendered, ".card-content-container > span");
    let source_body = service.find_source_element(rendered, body).unwrap();
    assert!(source_doc.text_content(source_body).contains("Card body"));
    assert_eq!(service.find_rendered_element(rendered, source_body), Some(body));

    let promo = select_first(rendered, ".promo");
    assert_eq!(service.find_source_element(rendered, promo), None);
}

#[tokio::test]
async fn test_deepest_scope_through_pipeline() {
    let renderer = DecoratorRenderer::new().with(decorator_fn(|doc, root| {
        // A table of contents repeats the heading text near the top
        let heading = doc
            .select_first(root, &Selector::parse("h2")?)
            .ok_or_else(|| anyhow::anyhow!("no heading"))?;
        let toc = doc.create_element("nav");
        let text = doc.text_content(heading);
        doc.set_text_content(toc, text);
        doc.prepend_child(root, toc);
        Ok(())
    }));
    let (orchestrator, config) = orchestrator("decorators", RenderStrategy::Decorators(renderer));

    let service = orchestrator
        .initialize_mapper("<main><section><h2>Intro</h2></section></main>", &config)
        .await
        .unwrap();

    let rendered = service.rendered_document();
    let h2 = select_first(rendered, "section h2");
    let nav = select_first(rendered, "nav");
    assert!(service.find_source_element(rendered, h2).is_some());
    assert_eq!(service.find_source_element(rendered, nav), None);
}

#[tokio::test]
async fn test_missing_rendered_root_degrades() {
    let (orchestrator, config) = orchestrator("fixed", RenderStrategy::custom(Fixed("<div><h1>Title</h1></div>")));

    let service = orchestrator
        .initialize_mapper("<main><h1>Title</h1></main>", &config)
        .await
        .unwrap();

    assert!(service.is_empty());
    assert!(service.get_all_mapped_elements(None).is_empty());
    assert_eq!(service.diagnostics()[0].kind, DiagnosticKind::MissingRenderedRoot);

    let rendered = service.rendered_document();
    for node in rendered.descendants(rendered.root()) {
        assert_eq!(service.find_source_element(rendered, node), None);
    }
}

#[tokio::test]
async fn test_missing_source_root_degrades() {
    let (orchestrator, config) = orchestrator("identity", RenderStrategy::custom(Identity));

    let service = orchestrator
        .initialize_mapper("<article><h1>Title</h1></article>", &config)
        .await
        .unwrap();

    assert!(service.is_empty());
    assert_eq!(service.marked_html(), "<article><h1>Title</h1></article>");
    let kinds: Vec<DiagnosticKind> = service.diagnostics().iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![DiagnosticKind::MissingSourceRoot, DiagnosticKind::MissingRenderedRoot]);
}

#[tokio::test]
async fn test_render_failure_is_fatal() {
    let (orchestrator, config) = orchestrator("broken", RenderStrategy::custom(Broken));

    let err = orchestrator
        .initialize_mapper("<main><h1>Title</h1></main>", &config)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, MapperError::Render(RenderError::Browser(_))));
}

#[tokio::test]
async fn test_unknown_mode_lists_available() {
    let (orchestrator, config) = orchestrator("identity", RenderStrategy::custom(Identity));
    let config = config.with_render_mode("print");

    let err = orchestrator
        .initialize_mapper("<main></main>", &config)
        .await
        .err()
        .unwrap();
    assert_eq!(err.to_string(), "Unknown renderMode \"print\". Available: identity");
}

#[tokio::test]
async fn test_page_mode_requires_url() {
    let config = MapperConfig::default().with_render_mode("page");

    let err = Orchestrator::default()
        .initialize_mapper("<main><h1>Title</h1></main>", &config)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, MapperError::Render(RenderError::MissingUrl)));
}

#[tokio::test]
async fn test_live_document_queries() {
    let (orchestrator, config) = orchestrator("identity", RenderStrategy::custom(Identity));
    let service = orchestrator
        .initialize_mapper("<main><h1>A</h1><p>B</p></main>", &config)
        .await
        .unwrap();

    // A page that re-rendered the same markup independently
    let live = Document::parse(service.rendered_html());
    let pairs = service.get_all_mapped_elements(Some(&live));
    assert_eq!(pairs.len(), 2);
    for pair in pairs {
        assert_eq!(resolve(&live, select_first(&live, "main"), &pair.rendered.path), Some(pair.rendered.element));
        assert_eq!(service.find_source_element(&live, pair.rendered.element), Some(pair.source.element));
    }
}
