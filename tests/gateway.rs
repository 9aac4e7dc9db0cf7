//! Gateway behaviour against scripted engines: classification, deadlines,
//! resource policies, lifecycle order and isolation between requests.

mod common;

use common::{gateway, RecordingObserver, Script, ScriptedRenderer, MISSING_SHEET, PDF_HEADER};
use reportdoc::{
    ConversionRequest, ErrorKind, GatewayConfig, GatewayError, PageSize, RenderObserver,
    RenderOptions, RenderPhase, ResourceKind, ResourcePolicy, StylesheetSource,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_test::{assert_err, assert_ok};

fn config() -> GatewayConfig {
    GatewayConfig::builder().build().unwrap()
}

fn degrade() -> GatewayConfig {
    GatewayConfig::builder()
        .resource_policy(ResourcePolicy::Degrade)
        .build()
        .unwrap()
}

// ── Success path ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn renders_pdf_with_engine_name_and_stats() {
    let engine = ScriptedRenderer::new(Script::Pdf);
    let gw = gateway(engine.clone(), config());

    let result = assert_ok!(gw.render(ConversionRequest::new("<h1>Hello</h1>")).await);

    assert!(result.bytes().starts_with(b"%PDF"));
    assert_eq!(result.byte_length(), result.bytes().len());
    assert_eq!(result.content_type(), "application/pdf");
    assert_eq!(result.engine(), "scripted");
    assert!(result.warnings().is_empty());
    assert!(result.stats().total_ms >= result.stats().render_ms);
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn page_rule_precedes_request_stylesheets() {
    let engine = ScriptedRenderer::new(Script::Echo);
    let gw = gateway(engine, config());

    let request = ConversionRequest::new("<p>body</p>")
        .with_stylesheet(StylesheetSource::Css("p { color: red }".into()))
        .with_stylesheet(StylesheetSource::Url(
            "data:text/css,h1%20%7B%20margin%3A%200%20%7D".into(),
        ))
        .with_options(RenderOptions {
            page_size: Some(PageSize::Letter),
            landscape: true,
            ..Default::default()
        });

    let result = assert_ok!(gw.render(request).await);
    let text = String::from_utf8_lossy(result.bytes()).into_owned();

    let page = text.find("@page").expect("page rule missing");
    let first = text.find("p { color: red }").expect("inline sheet missing");
    let second = text.find("h1 { margin: 0 }").expect("data sheet missing");
    assert!(page < first && first < second, "wrong order:\n{text}");
    assert!(text.contains("letter landscape"));
    assert!(text.ends_with("<p>body</p>"));
}

#[tokio::test]
async fn identical_requests_produce_identical_bytes() {
    let gw = gateway(ScriptedRenderer::new(Script::Echo), config());
    let request = ConversionRequest::new("<table><tr><td>1</td></tr></table>");

    let a = assert_ok!(gw.render(request.clone()).await);
    let b = assert_ok!(gw.render(request).await);
    assert_eq!(a.bytes(), b.bytes());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_do_not_share_state() {
    let gw = Arc::new(gateway(ScriptedRenderer::new(Script::Echo), config()));

    let tasks = (0..12).map(|i| {
        let gw = gw.clone();
        async move {
            let html = format!("<p>document {i}</p>");
            let result = gw.render(ConversionRequest::new(html.clone())).await;
            (html, result)
        }
    });

    for (html, result) in futures::future::join_all(tasks).await {
        let result = assert_ok!(result);
        let text = String::from_utf8_lossy(result.bytes()).into_owned();
        assert!(text.ends_with(&html), "expected {html}, got {text}");
        assert_eq!(text.matches("<p>document").count(), 1);
    }
}

// ── Validation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_and_blank_html_are_rejected_before_the_engine() {
    let engine = ScriptedRenderer::new(Script::Pdf);
    let gw = gateway(engine.clone(), config());

    for html in ["", "   \n\t "] {
        let err = assert_err!(gw.render(ConversionRequest::new(html)).await);
        assert!(matches!(err, GatewayError::EmptyHtml), "{err:?}");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn oversized_html_is_rejected() {
    let engine = ScriptedRenderer::new(Script::Pdf);
    let config = GatewayConfig::builder().max_html_bytes(16).build().unwrap();
    let gw = gateway(engine.clone(), config);

    let err = assert_err!(gw.render(ConversionRequest::new("<p>".repeat(10))).await);
    assert!(matches!(err, GatewayError::HtmlTooLarge { size: 30, limit: 16 }), "{err:?}");
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn malformed_base_url_never_reaches_the_engine() {
    let engine = ScriptedRenderer::new(Script::Pdf);
    let observer = Arc::new(RecordingObserver::default());
    let config = GatewayConfig::builder()
        .observer(observer.clone() as Arc<dyn RenderObserver>)
        .build()
        .unwrap();
    let gw = gateway(engine.clone(), config);

    let request = ConversionRequest::new("<p>x</p>").with_base_url("not a url");
    let err = assert_err!(gw.render(request).await);

    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(err.source_detail().as_deref(), Some("not a url"));
    assert_eq!(engine.calls(), 0);
    assert_eq!(
        observer.phases(),
        vec![
            RenderPhase::Validating,
            RenderPhase::Failed(ErrorKind::InvalidInput)
        ]
    );
}

#[tokio::test]
async fn file_references_are_refused_when_disabled() {
    let engine = ScriptedRenderer::new(Script::Pdf);
    let config = GatewayConfig::builder().allow_file_urls(false).build().unwrap();
    let gw = gateway(engine.clone(), config);

    let request = ConversionRequest::new("<p>x</p>")
        .with_stylesheet(StylesheetSource::Url(MISSING_SHEET.into()));
    let err = assert_err!(gw.render(request).await);

    assert!(matches!(err, GatewayError::InvalidStylesheet { index: 1, .. }), "{err:?}");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(engine.calls(), 0);
}

// ── Lifecycle ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn observer_sees_validation_before_rendering() {
    let observer = Arc::new(RecordingObserver::default());
    let config = GatewayConfig::builder()
        .observer(observer.clone() as Arc<dyn RenderObserver>)
        .build()
        .unwrap();
    let gw = gateway(ScriptedRenderer::new(Script::Pdf), config);

    assert_ok!(gw.render(ConversionRequest::new("<p>ok</p>")).await);

    assert_eq!(
        observer.phases(),
        vec![
            RenderPhase::Validating,
            RenderPhase::Rendering,
            RenderPhase::Succeeded
        ]
    );
    assert_eq!(observer.successes.load(Ordering::SeqCst), 1);
}

// ── Engine faults ────────────────────────────────────────────────────────────

#[tokio::test]
async fn engine_failure_carries_diagnostics() {
    let gw = gateway(ScriptedRenderer::new(Script::Fail), config());

    let err = assert_err!(gw.render(ConversionRequest::new("<p>x</p>")).await);

    assert_eq!(err.kind(), ErrorKind::RenderingFailure);
    assert!(err.to_string().contains("layout aborted"), "{err}");
    assert_eq!(
        err.source_detail().as_deref(),
        Some("ERROR: unsupported construct at line 3")
    );
}

#[tokio::test]
async fn non_pdf_output_is_a_rendering_failure() {
    let gw = gateway(ScriptedRenderer::new(Script::NotPdf), config());

    let err = assert_err!(gw.render(ConversionRequest::new("<p>x</p>")).await);
    assert!(matches!(err, GatewayError::NotAPdf { .. }), "{err:?}");
    assert_eq!(err.kind(), ErrorKind::RenderingFailure);
}

#[tokio::test]
async fn slow_engine_times_out_near_the_deadline() {
    let config = GatewayConfig::builder().render_timeout_ms(100).build().unwrap();
    let gw = gateway(
        ScriptedRenderer::new(Script::Slow(Duration::from_millis(600))),
        config,
    );

    let started = Instant::now();
    let err = assert_err!(gw.render(ConversionRequest::new("<p>slow</p>")).await);

    assert!(matches!(err, GatewayError::Timeout { limit_ms: 100 }), "{err:?}");
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_millis(500));
}

// ── Resource policy ──────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_stylesheet_fails_under_strict_policy() {
    let engine = ScriptedRenderer::new(Script::Pdf);
    let gw = gateway(engine.clone(), config());

    let request = ConversionRequest::new("<p>x</p>")
        .with_stylesheet(StylesheetSource::Url(MISSING_SHEET.into()));
    let err = assert_err!(gw.render(request).await);

    assert_eq!(err.kind(), ErrorKind::ResourceFetchFailure);
    assert!(
        err.source_detail().unwrap_or_default().contains("print.css"),
        "{err:?}"
    );
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn missing_stylesheet_becomes_warning_under_degrade() {
    let observer = Arc::new(RecordingObserver::default());
    let config = GatewayConfig::builder()
        .resource_policy(ResourcePolicy::Degrade)
        .observer(observer.clone() as Arc<dyn RenderObserver>)
        .build()
        .unwrap();
    let engine = ScriptedRenderer::new(Script::Pdf);
    let gw = gateway(engine.clone(), config);

    let request = ConversionRequest::new("<p>x</p>")
        .with_stylesheet(StylesheetSource::Url(MISSING_SHEET.into()));
    let result = assert_ok!(gw.render(request).await);

    assert_eq!(engine.calls(), 1);
    assert_eq!(result.warnings().len(), 1);
    assert_eq!(result.warnings()[0].kind, ResourceKind::Stylesheet);
    assert_eq!(observer.issues.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn engine_reported_issue_follows_policy() {
    let strict = gateway(ScriptedRenderer::new(Script::MissingImage), config());
    let err = assert_err!(strict.render(ConversionRequest::new("<img src=x>")).await);
    assert_eq!(err.kind(), ErrorKind::ResourceFetchFailure);
    assert_eq!(
        err.source_detail().as_deref(),
        Some("https://cdn.example.com/missing.png")
    );

    let lenient = gateway(ScriptedRenderer::new(Script::MissingImage), degrade());
    let result = assert_ok!(lenient.render(ConversionRequest::new("<img src=x>")).await);
    assert!(result.bytes().starts_with(PDF_HEADER));
    assert_eq!(result.warnings()[0].kind, ResourceKind::Image);
}

// ── File output ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn render_to_file_writes_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("invoice.pdf");
    let gw = gateway(ScriptedRenderer::new(Script::Pdf), config());

    let result = assert_ok!(gw.render_to_file(ConversionRequest::new("<p>x</p>"), &path).await);

    let written = std::fs::read(&path).unwrap();
    assert_eq!(written, result.bytes());
    assert!(!path.with_extension("pdf.tmp").exists());
}

#[tokio::test]
async fn failed_render_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.pdf");
    let gw = gateway(ScriptedRenderer::new(Script::Fail), config());

    assert_err!(gw.render_to_file(ConversionRequest::new("<p>x</p>"), &path).await);
    assert!(!path.exists());
}

#[tokio::test]
async fn failed_rename_removes_the_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    // A non-empty directory at the target path makes the rename fail.
    let path = dir.path().join("taken.pdf");
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("keep"), b"x").unwrap();
    let gw = gateway(ScriptedRenderer::new(Script::Pdf), config());

    let err = assert_err!(gw.render_to_file(ConversionRequest::new("<p>x</p>"), &path).await);

    assert!(matches!(err, GatewayError::OutputWriteFailed { .. }), "{err:?}");
    assert!(!path.with_extension("pdf.tmp").exists());
    assert!(path.join("keep").exists());
}

#[test]
fn render_blocking_works_outside_a_runtime() {
    let gw = gateway(ScriptedRenderer::new(Script::Pdf), config());
    let result = assert_ok!(gw.render_blocking(ConversionRequest::new("<p>sync</p>")));
    assert!(result.bytes().starts_with(b"%PDF"));
}
