//! # reportdoc
//!
//! Turn HTML/CSS documents into PDF files, either as a library call or
//! through a small HTTP service.
//!
//! A [`RenderGateway`] owns one rendering engine, chosen at startup and
//! injected behind the [`Renderer`] trait. Every request is validated
//! before the engine sees it, runs under a deadline, and ends in either a
//! PDF or exactly one classified [`GatewayError`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! ConversionRequest
//!  │
//!  ├─ 1. Validate  size limit, base URL, stylesheet references, options
//!  ├─ 2. Resolve   fetch remote / data: stylesheets (bounded concurrency)
//!  ├─ 3. Document  page CSS from the options, stylesheets in order
//!  ├─ 4. Invoke    engine call on the blocking pool, under a permit
//!  └─ 5. Output    %PDF check, warnings, timings
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reportdoc::{ConversionRequest, GatewayConfig, RenderGateway, ResourcePolicy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::builder()
//!         .render_timeout_ms(20_000)
//!         .resource_policy(ResourcePolicy::Degrade)
//!         .build()?;
//!     let gateway = RenderGateway::from_config(config)?;
//!
//!     let request = ConversionRequest::new("<h1>Invoice #42</h1>")
//!         .with_base_url("https://assets.example.com/");
//!     let pdf = gateway.render_to_file(request, "invoice.pdf").await?;
//!     eprintln!("{} bytes via {}", pdf.byte_length(), pdf.engine());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`     | on | Enables the `reportdoc` binary (clap + anyhow + tracing-subscriber) |
//! | `builtin` | on | In-process engine on printpdf's HTML layout |
//!
//! ## Engines
//!
//! | Engine | CSS coverage | Needs |
//! |--------|--------------|-------|
//! | `weasyprint` | paged media, flexbox, web fonts | `weasyprint` on `PATH` or `WEASYPRINT_BIN` |
//! | `builtin`    | basic block layout, images | a font directory for non-ASCII text |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod request;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EngineChoice, GatewayConfig, GatewayConfigBuilder, ResourcePolicy};
pub use engine::{EngineError, RenderJob, RenderedDocument, Renderer};
pub use error::{ErrorBody, ErrorKind, GatewayError, ResourceIssue, ResourceKind};
pub use gateway::RenderGateway;
pub use lifecycle::{NoopObserver, RenderObserver, RenderPhase, SharedObserver};
pub use output::{ConversionResult, RenderStats};
pub use report::ReportPayload;
pub use request::{ConversionRequest, MediaType, PageSize, PdfVariant, RenderOptions, StylesheetSource};
