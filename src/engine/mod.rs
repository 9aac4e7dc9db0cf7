//! Rendering engines.
//!
//! The gateway only knows the [`Renderer`] capability. A concrete engine is
//! chosen once at startup by [`select_renderer`] and shared as
//! `Arc<dyn Renderer>` for the life of the process.
//!
//! | Engine | How it renders |
//! |--------|----------------|
//! | [`weasyprint`] | external `weasyprint` process, killed at the deadline |
//! | `builtin` | in-process HTML layout through `printpdf` (feature `builtin`) |
//!
//! `render` is blocking and CPU-bound. It is always called from a blocking
//! worker (see [`crate::pipeline::invoke`]), never on the async executor.

#[cfg(feature = "builtin")]
pub mod builtin;
pub mod weasyprint;

use crate::config::{EngineChoice, GatewayConfig};
use crate::error::{GatewayError, ResourceIssue};
use crate::request::RenderOptions;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// Everything an engine needs for one render.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub html: String,
    pub base_url: Option<Url>,
    /// Resolved CSS texts, page rule first, then request order.
    pub stylesheets: Vec<String>,
    pub options: RenderOptions,
    /// Absolute deadline. Engines that can stop early must do so.
    pub deadline: Instant,
    /// Bound for each resource the engine loads itself.
    pub fetch_timeout: Duration,
    /// Whether the engine may read `file:` references.
    pub allow_file_urls: bool,
}

impl RenderJob {
    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Engine output: the PDF plus any references it had to skip.
#[derive(Debug, Clone, Default)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub issues: Vec<ResourceIssue>,
}

/// Errors raised inside an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{message}")]
    Failed {
        message: String,
        detail: Option<String>,
    },

    #[error("render deadline exceeded")]
    DeadlineExceeded,

    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The engine cannot honour a requested option.
    #[error("option '{option}' is not supported: {reason}")]
    Unsupported { option: &'static str, reason: String },
}

impl EngineError {
    pub fn failed(message: impl Into<String>) -> Self {
        EngineError::Failed {
            message: message.into(),
            detail: None,
        }
    }
}

/// The rendering capability.
///
/// Implementations must be safe to call from several blocking workers at
/// once; the gateway never serialises calls beyond its concurrency cap.
pub trait Renderer: Send + Sync {
    /// Short engine name reported in responses and logs.
    fn name(&self) -> &'static str;

    /// Render `job` to PDF bytes. Blocking.
    fn render(&self, job: &RenderJob) -> Result<RenderedDocument, EngineError>;
}

/// Pick and initialise the engine named by `config.engine`.
///
/// Blocking: probes the WeasyPrint executable and loads fonts. Call it once
/// at startup, outside the async executor.
pub fn select_renderer(config: &GatewayConfig) -> Result<Arc<dyn Renderer>, GatewayError> {
    match config.engine {
        EngineChoice::WeasyPrint => {
            let installation = weasyprint_probe::ensure_weasyprint()
                .map_err(|e| GatewayError::EngineUnavailable(e.to_string()))?;
            Ok(weasyprint_renderer(installation, config))
        }
        EngineChoice::Builtin => builtin_renderer(config),
        EngineChoice::Auto => match weasyprint_probe::ensure_weasyprint() {
            Ok(installation) => Ok(weasyprint_renderer(installation, config)),
            Err(e) => {
                warn!("WeasyPrint not usable ({}); falling back to builtin engine", e);
                builtin_renderer(config)
            }
        },
    }
}

fn weasyprint_renderer(
    installation: weasyprint_probe::Installation,
    config: &GatewayConfig,
) -> Arc<dyn Renderer> {
    let mut renderer = weasyprint::WeasyPrintRenderer::new(installation);
    if let Some(dir) = &config.scratch_dir {
        renderer = renderer.with_scratch_dir(dir);
    }
    info!(
        "Using WeasyPrint {} at {}",
        renderer.version(),
        renderer.executable().display()
    );
    Arc::new(renderer)
}

#[cfg(feature = "builtin")]
fn builtin_renderer(config: &GatewayConfig) -> Result<Arc<dyn Renderer>, GatewayError> {
    let renderer = builtin::BuiltinRenderer::new(config.font_dir.as_deref())
        .map_err(|e| GatewayError::EngineUnavailable(e.to_string()))?;
    info!("Using builtin engine ({} custom fonts)", renderer.font_count());
    Ok(Arc::new(renderer))
}

#[cfg(not(feature = "builtin"))]
fn builtin_renderer(_config: &GatewayConfig) -> Result<Arc<dyn Renderer>, GatewayError> {
    Err(GatewayError::EngineUnavailable(
        "the builtin engine was not compiled in (enable the `builtin` feature)".into(),
    ))
}
