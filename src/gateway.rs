//! The render gateway: one [`ConversionRequest`] in, one PDF or one error out.
//!
//! [`RenderGateway`] owns the engine chosen at startup, the immutable
//! [`GatewayConfig`], a shared HTTP client for stylesheet fetches and the
//! semaphore capping concurrent renders. It is cheap to share behind an
//! `Arc` and holds no per-request state.
//!
//! Every call re-renders from scratch; nothing is cached between requests.

use crate::config::{GatewayConfig, ResourcePolicy};
use crate::engine::{select_renderer, RenderJob, Renderer};
use crate::error::{ErrorKind, GatewayError, ResourceIssue};
use crate::lifecycle::RenderPhase;
use crate::output::{ConversionResult, RenderStats};
use crate::pipeline::validate::{validate_request, ValidatedRequest};
use crate::pipeline::{document, invoke, resources};
use crate::request::ConversionRequest;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// PDF files start with this signature.
const PDF_MAGIC: &[u8] = b"%PDF";

pub struct RenderGateway {
    renderer: Arc<dyn Renderer>,
    config: GatewayConfig,
    http: reqwest::Client,
    permits: Arc<Semaphore>,
}

/// What the Rendering phase hands back on success.
struct Rendered {
    bytes: Vec<u8>,
    warnings: Vec<ResourceIssue>,
    resolve_ms: u64,
    render_ms: u64,
}

impl RenderGateway {
    /// Wire an already-initialised renderer into a gateway.
    pub fn new(renderer: Arc<dyn Renderer>, config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("reportdoc/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::InvalidConfig(format!("HTTP client: {e}")))?;
        let permits = Arc::new(Semaphore::new(config.max_concurrent_renders));

        Ok(Self {
            renderer,
            config,
            http,
            permits,
        })
    }

    /// Select and initialise the engine named in `config`, then build the
    /// gateway around it.
    ///
    /// Blocking (engine probe, font loading). Call from `main` before serving,
    /// or inside `tokio::task::block_in_place`.
    pub fn from_config(config: GatewayConfig) -> Result<Self, GatewayError> {
        let renderer = select_renderer(&config)?;
        Self::new(renderer, config)
    }

    pub fn engine_name(&self) -> &'static str {
        self.renderer.name()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Convert one request to PDF.
    ///
    /// # Errors
    /// - `InvalidInput` kinds for anything [`validate_request`] rejects; the
    ///   engine is never invoked for those
    /// - `ResourceFetchFailure` for an unresolved reference under
    ///   [`ResourcePolicy::Fail`]
    /// - `RenderingFailure` for engine faults or output that is not a PDF
    /// - `Timeout` when the Rendering phase outlives `render_timeout_ms`
    pub async fn render(&self, request: ConversionRequest) -> Result<ConversionResult, GatewayError> {
        let total_start = Instant::now();

        // ── Validating ───────────────────────────────────────────────────
        self.notify(RenderPhase::Validating);
        let validated = match validate_request(request, &self.config) {
            Ok(v) => v,
            Err(e) => return Err(self.fail(e)),
        };
        let validate_ms = total_start.elapsed().as_millis() as u64;

        // ── Rendering ────────────────────────────────────────────────────
        self.notify(RenderPhase::Rendering);
        info!(
            "Rendering {} bytes of HTML with {} ({} stylesheets)",
            validated.html.len(),
            self.renderer.name(),
            validated.stylesheets.len()
        );

        let limit = self.config.render_timeout();
        let deadline = Instant::now() + limit;
        let outcome = tokio::time::timeout(limit, self.render_validated(validated, deadline)).await;
        let rendered = match outcome {
            Ok(Ok(rendered)) => rendered,
            Ok(Err(e)) => return Err(self.fail(e)),
            Err(_) => {
                return Err(self.fail(GatewayError::Timeout {
                    limit_ms: self.config.render_timeout_ms,
                }))
            }
        };

        // ── Succeeded ────────────────────────────────────────────────────
        let stats = RenderStats {
            validate_ms,
            resolve_ms: rendered.resolve_ms,
            render_ms: rendered.render_ms,
            total_ms: total_start.elapsed().as_millis() as u64,
        };
        let result = ConversionResult::new(
            rendered.bytes,
            self.renderer.name(),
            rendered.warnings,
            stats,
        );

        info!(
            "Rendered {} bytes in {}ms ({} warnings)",
            result.byte_length(),
            stats.total_ms,
            result.warnings().len()
        );
        self.notify(RenderPhase::Succeeded);
        if let Some(observer) = &self.config.observer {
            observer.on_succeeded(result.byte_length(), stats.total_ms);
        }

        Ok(result)
    }

    /// Synchronous wrapper around [`render`](Self::render).
    ///
    /// Creates a temporary tokio runtime internally. Do not call from inside
    /// an async context.
    pub fn render_blocking(&self, request: ConversionRequest) -> Result<ConversionResult, GatewayError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| GatewayError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.render(request))
    }

    /// Render and write the PDF to `output_path`.
    ///
    /// Uses atomic write (temp file + rename), so a failed render or write
    /// never leaves a partial file behind.
    pub async fn render_to_file(
        &self,
        request: ConversionRequest,
        output_path: impl AsRef<Path>,
    ) -> Result<ConversionResult, GatewayError> {
        let result = self.render(request).await?;
        let path = output_path.as_ref();
        let write_err = |e: std::io::Error| GatewayError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let tmp_path = path.with_extension("pdf.tmp");
        let written = match tokio::fs::write(&tmp_path, result.bytes()).await {
            Ok(()) => tokio::fs::rename(&tmp_path, path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            error!("Failed to write {}: {}", path.display(), e);
            return Err(write_err(e));
        }

        Ok(result)
    }

    async fn render_validated(
        &self,
        request: ValidatedRequest,
        deadline: Instant,
    ) -> Result<Rendered, GatewayError> {
        let ValidatedRequest {
            html,
            base_url,
            stylesheets,
            options,
        } = request;

        let resolve_start = Instant::now();
        let fetch_timeout = self
            .config
            .fetch_timeout()
            .min(deadline.saturating_duration_since(resolve_start));
        let resolved = resources::resolve_stylesheets(stylesheets, &self.http, fetch_timeout).await;
        let mut warnings = self.screen_issues(resolved.issues)?;
        let resolve_ms = resolve_start.elapsed().as_millis() as u64;

        let mut sheets = Vec::with_capacity(resolved.sheets.len() + 1);
        if let Some(css) = document::page_css(&options) {
            debug!("Page rule: {}", css);
            sheets.push(css);
        }
        sheets.extend(resolved.sheets);

        let job = RenderJob {
            html,
            base_url,
            stylesheets: sheets,
            options,
            deadline,
            fetch_timeout: self.config.fetch_timeout(),
            allow_file_urls: self.config.allow_file_urls,
        };

        let render_start = Instant::now();
        let doc = invoke::run_engine(
            self.renderer.clone(),
            job,
            self.permits.clone(),
            self.config.render_timeout_ms,
        )
        .await?;
        let render_ms = render_start.elapsed().as_millis() as u64;

        warnings.extend(self.screen_issues(doc.issues)?);
        check_pdf(&doc.bytes)?;

        Ok(Rendered {
            bytes: doc.bytes,
            warnings,
            resolve_ms,
            render_ms,
        })
    }

    /// Apply the resource policy: fail on the first issue, or keep them all
    /// as warnings.
    fn screen_issues(&self, issues: Vec<ResourceIssue>) -> Result<Vec<ResourceIssue>, GatewayError> {
        match self.config.resource_policy {
            ResourcePolicy::Fail => match issues.into_iter().next() {
                Some(first) => Err(first.into()),
                None => Ok(Vec::new()),
            },
            ResourcePolicy::Degrade => {
                for issue in &issues {
                    warn!("Rendering without {}", issue);
                    if let Some(observer) = &self.config.observer {
                        observer.on_resource_issue(issue);
                    }
                }
                Ok(issues)
            }
        }
    }

    fn notify(&self, phase: RenderPhase) {
        if let Some(observer) = &self.config.observer {
            observer.on_phase(phase);
        }
    }

    fn fail(&self, e: GatewayError) -> GatewayError {
        let kind = e.kind();
        match kind {
            ErrorKind::RenderingFailure => error!("Render failed: {}", e),
            ErrorKind::InvalidInput => debug!("Rejected request: {}", e),
            _ => warn!("Render failed ({}): {}", kind, e),
        }
        self.notify(RenderPhase::Failed(kind));
        e
    }
}

fn check_pdf(bytes: &[u8]) -> Result<(), GatewayError> {
    if bytes.starts_with(PDF_MAGIC) {
        Ok(())
    } else {
        Err(GatewayError::NotAPdf {
            magic: bytes.iter().take(8).copied().collect(),
        })
    }
}
