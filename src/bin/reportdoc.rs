//! CLI binary for reportdoc.
//!
//! `reportdoc serve` runs the HTTP service; `reportdoc render` converts one
//! HTML file. Both map their flags onto a `GatewayConfig`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use reportdoc::server::{self, AppState};
use reportdoc::{
    ConversionRequest, EngineChoice, GatewayConfig, MediaType, PageSize, RenderGateway,
    RenderOptions, ResourcePolicy, StylesheetSource,
};
use std::io::{self, Write};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the service on the default port (8000)
  reportdoc serve

  # Require an API key and degrade gracefully on missing images
  REPORTDOC_API_KEY=secret reportdoc serve --resource-policy degrade

  # One-shot conversion
  reportdoc render invoice.html -o invoice.pdf

  # Landscape A3 with an extra stylesheet, from stdin to stdout
  cat page.html | reportdoc render - --page-size a3 --landscape -s print.css > page.pdf

HTTP API:
  GET  /ping         health check, never authenticated
  POST /render       JSON request, or raw HTML with ?base_url=&stylesheet=&page_size=&landscape=&media=
  POST /render_b64   JSON request, PDF returned base64-encoded in JSON
  POST /report       report payload rendered through the built-in template

ENVIRONMENT VARIABLES:
  REPORTDOC_HOST / REPORTDOC_PORT   Listen address (default 0.0.0.0:8000)
  REPORTDOC_API_KEY                 Required X-API-Key value; unset disables auth
  REPORTDOC_ENGINE                  auto, weasyprint or builtin
  WEASYPRINT_BIN                    Path to the weasyprint executable
  RUST_LOG                          Log filter, overrides --verbose/--quiet
"#;

/// HTML/CSS to PDF render gateway.
#[derive(Parser, Debug)]
#[command(
    name = "reportdoc",
    version,
    about = "Render HTML/CSS documents to PDF, as an HTTP service or one file at a time",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "REPORTDOC_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "REPORTDOC_QUIET")]
    quiet: bool,

    /// Log line format.
    #[arg(long, global = true, env = "REPORTDOC_LOG_FORMAT", value_enum, default_value = "pretty")]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// Convert one HTML file to PDF.
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Interface to bind.
    #[arg(long, env = "REPORTDOC_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to bind.
    #[arg(long, env = "REPORTDOC_PORT", default_value_t = 8000)]
    port: u16,

    /// Value required in the X-API-Key header of render routes.
    #[arg(long, env = "REPORTDOC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Let requests reference local files through `file:` URLs.
    #[arg(long, env = "REPORTDOC_ALLOW_FILE_URLS")]
    allow_file_urls: bool,

    #[command(flatten)]
    gateway: GatewayArgs,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// HTML file to convert, or `-` for stdin.
    input: String,

    /// Write the PDF here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Base URL for relative references. Defaults to the input file's directory.
    #[arg(long)]
    base_url: Option<String>,

    /// Extra stylesheet URL or path (repeatable, applied in order).
    #[arg(short, long = "stylesheet")]
    stylesheets: Vec<String>,

    /// Paper size.
    #[arg(long, value_enum)]
    page_size: Option<PageSizeArg>,

    /// Landscape orientation.
    #[arg(long)]
    landscape: bool,

    /// Uniform page margin in millimetres.
    #[arg(long)]
    margin_mm: Option<f32>,

    /// CSS media type.
    #[arg(long, value_enum, default_value = "print")]
    media: MediaArg,

    #[command(flatten)]
    gateway: GatewayArgs,
}

/// Settings shared by both subcommands.
#[derive(Args, Debug)]
struct GatewayArgs {
    /// Rendering engine.
    #[arg(long, env = "REPORTDOC_ENGINE", value_enum, default_value = "auto")]
    engine: EngineArg,

    /// Render deadline in milliseconds.
    #[arg(long, env = "REPORTDOC_RENDER_TIMEOUT", default_value_t = 30_000)]
    render_timeout: u64,

    /// Per-resource fetch timeout in milliseconds.
    #[arg(long, env = "REPORTDOC_FETCH_TIMEOUT", default_value_t = 10_000)]
    fetch_timeout: u64,

    /// Largest accepted HTML document in bytes.
    #[arg(long, env = "REPORTDOC_MAX_HTML_BYTES", default_value_t = 5 * 1024 * 1024)]
    max_html_bytes: usize,

    /// What to do when a stylesheet, image or font cannot be loaded.
    #[arg(long, env = "REPORTDOC_RESOURCE_POLICY", value_enum, default_value = "fail")]
    resource_policy: PolicyArg,

    /// Renders allowed at once. Default: number of CPUs.
    #[arg(long, env = "REPORTDOC_MAX_CONCURRENT")]
    max_concurrent: Option<usize>,

    /// Directory of .ttf/.otf fonts for the builtin engine.
    #[arg(long, env = "REPORTDOC_FONT_DIR")]
    font_dir: Option<PathBuf>,

    /// Parent directory for the WeasyPrint engine's per-render scratch files.
    #[arg(long, env = "REPORTDOC_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EngineArg {
    Auto,
    Weasyprint,
    Builtin,
}

impl From<EngineArg> for EngineChoice {
    fn from(v: EngineArg) -> Self {
        match v {
            EngineArg::Auto => EngineChoice::Auto,
            EngineArg::Weasyprint => EngineChoice::WeasyPrint,
            EngineArg::Builtin => EngineChoice::Builtin,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    Fail,
    Degrade,
}

impl From<PolicyArg> for ResourcePolicy {
    fn from(v: PolicyArg) -> Self {
        match v {
            PolicyArg::Fail => ResourcePolicy::Fail,
            PolicyArg::Degrade => ResourcePolicy::Degrade,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageSizeArg {
    A3,
    A4,
    A5,
    Letter,
    Legal,
}

impl From<PageSizeArg> for PageSize {
    fn from(v: PageSizeArg) -> Self {
        match v {
            PageSizeArg::A3 => PageSize::A3,
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::A5 => PageSize::A5,
            PageSizeArg::Letter => PageSize::Letter,
            PageSizeArg::Legal => PageSize::Legal,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum MediaArg {
    Print,
    Screen,
}

impl From<MediaArg> for MediaType {
    fn from(v: MediaArg) -> Self {
        match v {
            MediaArg::Print => MediaType::Print,
            MediaArg::Screen => MediaType::Screen,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    match cli.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init(),
    }

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Render(args) => render(args, cli.quiet).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let gateway = start_gateway(&args.gateway, args.allow_file_urls)?;
    let state = AppState::new(Arc::new(gateway), args.api_key);
    let addr = SocketAddr::new(args.host, args.port);

    server::serve(addr, state)
        .await
        .with_context(|| format!("Failed to serve on {addr}"))
}

async fn render(args: RenderArgs, quiet: bool) -> Result<()> {
    // Local input files reference their neighbours through file: URLs.
    let gateway = start_gateway(&args.gateway, true)?;

    let html = if args.input == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read HTML from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(&args.input)
            .await
            .with_context(|| format!("Failed to read {}", args.input))?
    };

    let base_url = match args.base_url {
        Some(url) => Some(url),
        None if args.input != "-" => directory_url(Path::new(&args.input)),
        None => None,
    };

    let request = ConversionRequest {
        html,
        base_url,
        stylesheets: args
            .stylesheets
            .iter()
            .map(|s| StylesheetSource::Url(stylesheet_reference(s)))
            .collect(),
        options: RenderOptions {
            page_size: args.page_size.map(Into::into),
            landscape: args.landscape,
            margin_mm: args.margin_mm,
            media: args.media.into(),
            ..Default::default()
        },
    };

    let result = match &args.output {
        Some(path) => gateway
            .render_to_file(request, path)
            .await
            .context("Conversion failed")?,
        None => {
            let result = gateway.render(request).await.context("Conversion failed")?;
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(result.bytes())
                .context("Failed to write to stdout")?;
            handle.flush().ok();
            result
        }
    };

    if !quiet {
        for w in result.warnings() {
            eprintln!("{} {}", yellow("⚠"), w);
        }
        let target = args
            .output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".to_string());
        eprintln!(
            "{}  {} bytes  {}  {}ms  →  {}",
            green("✔"),
            result.byte_length(),
            dim(result.engine()),
            result.stats().total_ms,
            bold(&target),
        );
    }

    Ok(())
}

/// Map CLI args to `GatewayConfig` and initialise the engine.
fn start_gateway(args: &GatewayArgs, allow_file_urls: bool) -> Result<RenderGateway> {
    let mut builder = GatewayConfig::builder()
        .engine(args.engine.into())
        .allow_file_urls(allow_file_urls)
        .render_timeout_ms(args.render_timeout)
        .fetch_timeout_ms(args.fetch_timeout)
        .max_html_bytes(args.max_html_bytes)
        .resource_policy(args.resource_policy.into());
    if let Some(n) = args.max_concurrent {
        builder = builder.max_concurrent_renders(n);
    }
    if let Some(dir) = &args.font_dir {
        builder = builder.font_dir(dir);
    }
    if let Some(dir) = &args.scratch_dir {
        builder = builder.scratch_dir(dir);
    }
    let config = builder.build().context("Invalid configuration")?;

    // Engine probing and font loading block; keep them off the executor's
    // hot path.
    tokio::task::block_in_place(|| RenderGateway::from_config(config))
        .context("Failed to initialise the rendering engine")
}

/// `file://` URL of the directory holding `input`.
fn directory_url(input: &Path) -> Option<String> {
    let dir = std::fs::canonicalize(input).ok()?.parent()?.to_path_buf();
    url::Url::from_directory_path(dir).ok().map(String::from)
}

/// Accept plain filesystem paths for `--stylesheet` as well as URLs.
fn stylesheet_reference(s: &str) -> String {
    if s.contains("://") || s.starts_with("data:") {
        return s.to_string();
    }
    std::fs::canonicalize(s)
        .ok()
        .and_then(|p| url::Url::from_file_path(p).ok())
        .map(String::from)
        .unwrap_or_else(|| s.to_string())
}
