//! Integration tests for the render engine.
//!
//! Everything runs offline: remote templates and images are served by a local
//! mockito server and rasterisation uses the bundled resvg backend.
//!
//! Run with:
//!   cargo test --test engine -- --nocapture

use flyer_render::{
    render_carousel, render_flyer, render_flyer_to_file, render_template, sanitize_document,
    validate_document, BatchProgressCallback, DataDictionary, FieldMapping, FlyerError,
    FlyerRequest, QualityHint, RenderConfig, RenderOptions, RenderWarning, TemplateSource,
};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

const LISTING: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="100">
  <rect width="200" height="100" fill="#123456"/>
  <text x="10" y="30" font-size="12">dyno.address</text>
  <text x="10" y="60" font-size="12">{{price}} / {price}</text>
  <text id="headline" x="10" y="90" font-size="12">Placeholder headline</text>
</svg>"##;

fn data(pairs: &[(&str, &str)]) -> DataDictionary {
    pairs.iter().copied().collect()
}

fn inline(doc: &str, pairs: &[(&str, &str)]) -> FlyerRequest {
    FlyerRequest::new(TemplateSource::Inline(doc.to_string()), data(pairs))
}

fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'])
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl BatchProgressCallback for Recorder {
    fn on_batch_start(&self, total: usize) {
        self.events.lock().unwrap().push(format!("start {total}"));
    }
    fn on_slide_complete(&self, slide: usize, _total: usize, _png_len: usize) {
        self.events.lock().unwrap().push(format!("ok {slide}"));
    }
    fn on_slide_error(&self, slide: usize, _total: usize, _error: &str) {
        self.events.lock().unwrap().push(format!("err {slide}"));
    }
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.events.lock().unwrap().push(format!("done {success_count}/{total}"));
    }
}

// ── Substitution through the public entry point ──────────────────────────────

#[test]
fn test_namespaced_placeholder_replaced() {
    let doc = r#"<svg><text>dyno.address</text></svg>"#;
    let out = render_template(
        doc,
        &data(&[("address", "123 Main St")]),
        &FieldMapping::new(),
        &RenderOptions::default(),
        &RenderConfig::default(),
    )
    .unwrap();
    assert!(out.document.contains("<text>123 Main St</text>"), "{}", out.document);
    assert_eq!(out.replacement_count, 1);
}

#[test]
fn test_double_and_single_brace_same_key() {
    let doc = r#"<svg><text>{{price}} or {price}</text></svg>"#;
    let out = render_template(
        doc,
        &data(&[("price", "$500,000")]),
        &FieldMapping::new(),
        &RenderOptions::default(),
        &RenderConfig::default(),
    )
    .unwrap();
    assert!(out.document.contains("$500,000 or $500,000"));
    assert!(!out.document.contains('{'));
    assert_eq!(out.replacement_count, 2);
}

#[test]
fn test_empty_value_keeps_placeholder() {
    let doc = r#"<svg><text>{{title}}</text></svg>"#;
    let out = render_template(
        doc,
        &data(&[("title", "   ")]),
        &FieldMapping::new(),
        &RenderOptions::default(),
        &RenderConfig::default(),
    )
    .unwrap();
    assert!(out.document.contains("{{title}}"));
    assert_eq!(out.replacement_count, 0);
}

#[test]
fn test_second_pass_is_a_no_op() {
    let config = RenderConfig::default();
    let d = data(&[("address", "1 Elm"), ("price", "9")]);
    let first = render_template(LISTING, &d, &FieldMapping::new(), &RenderOptions::default(), &config).unwrap();
    let second =
        render_template(&first.document, &d, &FieldMapping::new(), &RenderOptions::default(), &config).unwrap();
    assert_eq!(first.document, second.document);
    assert_eq!(second.replacement_count, 0);
}

#[test]
fn test_case_variants_all_resolve() {
    let doc = r#"<svg><text>DYNO.Address dyno.ADDRESS Dyno.address</text></svg>"#;
    let out = render_template(
        doc,
        &data(&[("address", "X")]),
        &FieldMapping::new(),
        &RenderOptions::default(),
        &RenderConfig::default(),
    )
    .unwrap();
    assert!(out.document.contains("<text>X X X</text>"), "{}", out.document);
}

#[test]
fn test_mapping_drives_element_text() {
    let mut mapping = FieldMapping::new();
    mapping.insert("headline", "title");
    let out = render_template(
        LISTING,
        &data(&[("title", "Just Listed")]),
        &mapping,
        &RenderOptions::default(),
        &RenderConfig::default(),
    )
    .unwrap();
    assert!(out.document.contains(">Just Listed<"), "{}", out.document);
    assert!(!out.document.contains("Placeholder headline"));
}

#[test]
fn test_size_warning_does_not_fail() {
    let config = RenderConfig::builder().max_document_bytes(64).build().unwrap();
    let out = render_template(
        LISTING,
        &data(&[("address", "a long enough address to push things over")]),
        &FieldMapping::new(),
        &RenderOptions::default(),
        &config,
    )
    .unwrap();
    assert!(out
        .warnings
        .iter()
        .any(|w| matches!(w, RenderWarning::SizeLimitExceeded { limit: 64, .. })));
}

// ── Validation and sanitising ────────────────────────────────────────────────

#[test]
fn test_non_svg_documents_rejected() {
    for doc in ["", "<html></html>", "<svg><rect/>"] {
        assert!(!validate_document(doc), "{doc:?}");
        let err = render_template(
            doc,
            &DataDictionary::new(),
            &FieldMapping::new(),
            &RenderOptions::default(),
            &RenderConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FlyerError::InvalidDocument { .. }), "{doc:?}: {err}");
        assert_eq!(err.http_status(), 400);
    }
}

#[test]
fn test_active_content_removed() {
    let doc = r#"<svg><script>alert(1)</script><rect onclick="x()" width="1"/><a href="javascript:void(0)">l</a><iframe src="x"></iframe></svg>"#;
    let clean = sanitize_document(doc);
    assert!(!clean.contains("<script"));
    assert!(!clean.contains("onclick"));
    assert!(!clean.contains("javascript:"));
    assert!(!clean.contains("<iframe"));
    assert!(clean.contains(r#"width="1""#));
}

#[test]
fn test_substituted_script_is_stripped_before_render() {
    let doc = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><text>{{note}}</text></svg>"#;
    // Values are escaped, so the tag never reaches the document as markup.
    let out = render_template(
        doc,
        &data(&[("note", "<script>alert(1)</script>")]),
        &FieldMapping::new(),
        &RenderOptions::default(),
        &RenderConfig::default(),
    )
    .unwrap();
    assert!(!out.document.contains("<script>"));
    assert!(out.document.contains("&lt;script&gt;"));
}

// ── Full renders ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_render_inline_template_to_png() {
    let req = inline(LISTING, &[("address", "123 Main St"), ("price", "$500,000")]).with_options(RenderOptions {
        width: Some(400),
        ..Default::default()
    });
    let out = render_flyer(&req, &RenderConfig::default()).await.unwrap();
    assert!(is_png(&out.png));
    assert_eq!((out.width, out.height), (400, 200));
    assert_eq!(out.substitution.replacement_count, 3);
}

#[tokio::test]
async fn test_quality_and_bounds_shape_output() {
    let req = inline(LISTING, &[]).with_options(RenderOptions {
        width: Some(300),
        quality: QualityHint::High,
        max_width: Some(500),
        ..Default::default()
    });
    let out = render_flyer(&req, &RenderConfig::default()).await.unwrap();
    assert_eq!((out.width, out.height), (500, 250));
}

#[tokio::test]
async fn test_missing_viewbox_uses_default_height() {
    let doc = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect width="10" height="10"/></svg>"#;
    let out = render_flyer(&inline(doc, &[]), &RenderConfig::default()).await.unwrap();
    assert_eq!((out.width, out.height), (1080, 1350));
}

#[tokio::test]
async fn test_render_remote_template() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/flyer.svg")
        .with_status(200)
        .with_header("content-type", "image/svg+xml")
        .with_body(LISTING)
        .create_async()
        .await;

    let req = FlyerRequest::new(
        TemplateSource::Url(format!("{}/flyer.svg", server.url())),
        data(&[("address", "9 Oak Ave")]),
    );
    let out = render_flyer(&req, &RenderConfig::default()).await.unwrap();
    mock.assert_async().await;
    assert!(is_png(&out.png));
    assert!(out.substitution.document.contains("9 Oak Ave"));
}

#[tokio::test]
async fn test_remote_html_is_not_a_template() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/page")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body>nope</body></html>")
        .create_async()
        .await;

    let req = FlyerRequest::new(TemplateSource::Url(format!("{}/page", server.url())), DataDictionary::new());
    let err = render_flyer(&req, &RenderConfig::default()).await.unwrap_err();
    assert!(matches!(err, FlyerError::InvalidDocument { .. }), "{err}");
}

#[tokio::test]
async fn test_render_to_file_writes_png() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/out.png");
    let out = render_flyer_to_file(&inline(LISTING, &[]), &path, &RenderConfig::default())
        .await
        .unwrap();
    let written = std::fs::read(&path).unwrap();
    assert_eq!(written, out.png);
}

// ── Carousel ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_carousel_renders_in_order() {
    let recorder = Arc::new(Recorder::default());
    let config = RenderConfig::builder()
        .progress_callback(recorder.clone() as Arc<dyn BatchProgressCallback>)
        .build()
        .unwrap();
    let slides = vec![
        inline(LISTING, &[("address", "one")]),
        inline(LISTING, &[("address", "two")]),
    ];
    let outs = render_carousel(&slides, &config).await.unwrap();
    assert_eq!(outs.len(), 2);
    assert!(outs[0].substitution.document.contains("one"));
    assert!(outs[1].substitution.document.contains("two"));
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["start 2", "ok 1", "ok 2", "done 2/2"]
    );
}

#[tokio::test]
async fn test_carousel_unreachable_slide_fails_whole_batch() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/missing.svg")
        .with_status(404)
        .create_async()
        .await;

    let recorder = Arc::new(Recorder::default());
    let config = RenderConfig::builder()
        .progress_callback(recorder.clone() as Arc<dyn BatchProgressCallback>)
        .build()
        .unwrap();
    let slides = vec![
        inline(LISTING, &[]),
        FlyerRequest::new(
            TemplateSource::Url(format!("{}/missing.svg", server.url())),
            DataDictionary::new(),
        ),
        inline(LISTING, &[]),
    ];
    let err = render_carousel(&slides, &config).await.unwrap_err();
    assert!(err.to_string().contains("slide 2"), "{err}");
    assert!(matches!(err, FlyerError::SlideFailed { index: 2, .. }));
    assert_eq!(err.upstream_status(), Some(404));
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["start 3", "ok 1", "err 2", "done 1/3"]
    );
}

#[tokio::test]
async fn test_empty_carousel_rejected() {
    let err = render_carousel(&[], &RenderConfig::default()).await.unwrap_err();
    assert_eq!(err.http_status(), 400);
}
