//! Scripted engines and observers shared by the integration tests.
#![allow(dead_code)]

use reportdoc::{
    EngineError, GatewayConfig, RenderGateway, RenderJob, RenderObserver, RenderPhase,
    RenderedDocument, Renderer, ResourceIssue, ResourceKind,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PDF_HEADER: &[u8] = b"%PDF-1.7\n";

/// What a [`ScriptedRenderer`] does when called.
pub enum Script {
    /// A minimal PDF.
    Pdf,
    /// A PDF whose body is every stylesheet followed by the HTML.
    Echo,
    /// Sleep, then a minimal PDF.
    Slow(Duration),
    /// Engine failure with diagnostic output.
    Fail,
    /// Bytes that are not a PDF.
    NotPdf,
    /// A PDF plus one image the engine could not load.
    MissingImage,
}

pub struct ScriptedRenderer {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedRenderer {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Renderer for ScriptedRenderer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn render(&self, job: &RenderJob) -> Result<RenderedDocument, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pdf = || RenderedDocument {
            bytes: [PDF_HEADER, b"%%EOF\n"].concat(),
            issues: Vec::new(),
        };
        match &self.script {
            Script::Pdf => Ok(pdf()),
            Script::Echo => {
                let mut bytes = PDF_HEADER.to_vec();
                for sheet in &job.stylesheets {
                    bytes.extend_from_slice(sheet.as_bytes());
                    bytes.push(b'\n');
                }
                bytes.extend_from_slice(job.html.as_bytes());
                Ok(RenderedDocument {
                    bytes,
                    issues: Vec::new(),
                })
            }
            Script::Slow(delay) => {
                std::thread::sleep(*delay);
                Ok(pdf())
            }
            Script::Fail => Err(EngineError::Failed {
                message: "layout aborted".into(),
                detail: Some("ERROR: unsupported construct at line 3".into()),
            }),
            Script::NotPdf => Ok(RenderedDocument {
                bytes: b"<html>oops</html>".to_vec(),
                issues: Vec::new(),
            }),
            Script::MissingImage => Ok(RenderedDocument {
                issues: vec![ResourceIssue::new(
                    ResourceKind::Image,
                    "https://cdn.example.com/missing.png",
                    "HTTP 404",
                )],
                ..pdf()
            }),
        }
    }
}

/// Records every lifecycle callback in order.
#[derive(Default)]
pub struct RecordingObserver {
    pub phases: Mutex<Vec<RenderPhase>>,
    pub issues: Mutex<Vec<ResourceIssue>>,
    pub successes: AtomicUsize,
}

impl RenderObserver for RecordingObserver {
    fn on_phase(&self, phase: RenderPhase) {
        self.phases.lock().unwrap().push(phase);
    }

    fn on_resource_issue(&self, issue: &ResourceIssue) {
        self.issues.lock().unwrap().push(issue.clone());
    }

    fn on_succeeded(&self, _byte_length: usize, _elapsed_ms: u64) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }
}

impl RecordingObserver {
    pub fn phases(&self) -> Vec<RenderPhase> {
        self.phases.lock().unwrap().clone()
    }
}

pub fn gateway(renderer: Arc<ScriptedRenderer>, config: GatewayConfig) -> RenderGateway {
    RenderGateway::new(renderer, config).unwrap()
}

/// A stylesheet reference that can never be read.
pub const MISSING_SHEET: &str = "file:///definitely/not/here/print.css";
