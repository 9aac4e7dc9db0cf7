//! Configuration types for the render gateway.
//!
//! All gateway behaviour is controlled through [`GatewayConfig`], built via
//! its [`GatewayConfigBuilder`]. The config is fixed at startup: the gateway
//! never re-reads it per request.

use crate::error::GatewayError;
use crate::lifecycle::SharedObserver;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`crate::gateway::RenderGateway`].
///
/// Built via [`GatewayConfig::builder()`] or using
/// [`GatewayConfig::default()`].
///
/// # Example
/// ```rust
/// use reportdoc::{GatewayConfig, ResourcePolicy};
///
/// let config = GatewayConfig::builder()
///     .render_timeout_ms(20_000)
///     .resource_policy(ResourcePolicy::Degrade)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GatewayConfig {
    /// Largest accepted HTML source in bytes. Default: 5 MiB.
    pub max_html_bytes: usize,

    /// Largest number of stylesheets per request. Default: 16.
    pub max_stylesheets: usize,

    /// Deadline for the whole Rendering phase (stylesheet fetches, waiting
    /// for a render slot, and the engine itself). Default: 30 000 ms.
    pub render_timeout_ms: u64,

    /// Per-resource fetch timeout for stylesheets and images. Default: 10 000 ms.
    ///
    /// Always bounded by what is left of `render_timeout_ms`.
    pub fetch_timeout_ms: u64,

    /// What to do when a referenced resource cannot be loaded. Default: [`ResourcePolicy::Fail`].
    pub resource_policy: ResourcePolicy,

    /// Which engine to wire in at startup. Default: [`EngineChoice::Auto`].
    pub engine: EngineChoice,

    /// Renders allowed to run at once. Default: number of available CPUs.
    ///
    /// Rendering is CPU- and memory-bound; running more renders than cores
    /// only lengthens every render.
    pub max_concurrent_renders: usize,

    /// Directory of `.ttf`/`.otf` files handed to the builtin engine.
    pub font_dir: Option<PathBuf>,

    /// Accept `file:` base URLs, stylesheets and images. Default: `true`.
    ///
    /// Turn off when requests come from untrusted callers, otherwise they can
    /// read local files and learn which paths exist.
    pub allow_file_urls: bool,

    /// Where the external engine creates its per-render scratch directories.
    /// Default: the system temp directory.
    pub scratch_dir: Option<PathBuf>,

    /// Lifecycle observer notified on every state transition.
    pub observer: Option<SharedObserver>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_html_bytes: 5 * 1024 * 1024,
            max_stylesheets: 16,
            render_timeout_ms: 30_000,
            fetch_timeout_ms: 10_000,
            resource_policy: ResourcePolicy::default(),
            engine: EngineChoice::default(),
            max_concurrent_renders: default_concurrency(),
            font_dir: None,
            allow_file_urls: true,
            scratch_dir: None,
            observer: None,
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("max_html_bytes", &self.max_html_bytes)
            .field("max_stylesheets", &self.max_stylesheets)
            .field("render_timeout_ms", &self.render_timeout_ms)
            .field("fetch_timeout_ms", &self.fetch_timeout_ms)
            .field("resource_policy", &self.resource_policy)
            .field("engine", &self.engine)
            .field("max_concurrent_renders", &self.max_concurrent_renders)
            .field("font_dir", &self.font_dir)
            .field("allow_file_urls", &self.allow_file_urls)
            .field("scratch_dir", &self.scratch_dir)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn RenderObserver>"))
            .finish()
    }
}

impl GatewayConfig {
    /// Create a new builder for `GatewayConfig`.
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Builder for [`GatewayConfig`].
#[derive(Debug)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    pub fn max_html_bytes(mut self, bytes: usize) -> Self {
        self.config.max_html_bytes = bytes;
        self
    }

    pub fn max_stylesheets(mut self, n: usize) -> Self {
        self.config.max_stylesheets = n;
        self
    }

    pub fn render_timeout_ms(mut self, ms: u64) -> Self {
        self.config.render_timeout_ms = ms;
        self
    }

    pub fn fetch_timeout_ms(mut self, ms: u64) -> Self {
        self.config.fetch_timeout_ms = ms;
        self
    }

    pub fn resource_policy(mut self, policy: ResourcePolicy) -> Self {
        self.config.resource_policy = policy;
        self
    }

    pub fn engine(mut self, engine: EngineChoice) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn max_concurrent_renders(mut self, n: usize) -> Self {
        self.config.max_concurrent_renders = n.max(1);
        self
    }

    pub fn font_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.font_dir = Some(dir.into());
        self
    }

    pub fn allow_file_urls(mut self, allow: bool) -> Self {
        self.config.allow_file_urls = allow;
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = Some(dir.into());
        self
    }

    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GatewayConfig, GatewayError> {
        let c = &self.config;
        if c.max_html_bytes == 0 {
            return Err(GatewayError::InvalidConfig(
                "max_html_bytes must be ≥ 1".into(),
            ));
        }
        if c.render_timeout_ms == 0 {
            return Err(GatewayError::InvalidConfig(
                "render timeout must be ≥ 1 ms".into(),
            ));
        }
        if c.fetch_timeout_ms == 0 {
            return Err(GatewayError::InvalidConfig(
                "fetch timeout must be ≥ 1 ms".into(),
            ));
        }
        if c.max_concurrent_renders == 0 {
            return Err(GatewayError::InvalidConfig(
                "max_concurrent_renders must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the gateway treats a stylesheet, image or font that cannot be loaded.
///
/// | Policy | Effect |
/// |--------|--------|
/// | `Fail` | the request fails with `ResourceFetchFailure`, naming the reference (default) |
/// | `Degrade` | the document renders without it; the issue is logged and returned as a warning |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourcePolicy {
    #[default]
    Fail,
    Degrade,
}

/// Which rendering engine to inject at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineChoice {
    /// WeasyPrint when installed, otherwise the builtin engine.
    #[default]
    Auto,
    /// WeasyPrint only; startup fails if it cannot be found.
    WeasyPrint,
    /// The in-process printpdf engine.
    Builtin,
}
