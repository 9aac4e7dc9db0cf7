//! WeasyPrint engine: one `weasyprint` process per render.
//!
//! Each render gets its own [`tempfile::TempDir`] holding `input.html`, the
//! stylesheets, the output PDF and the captured stderr. The directory lives
//! under the configured scratch directory (or the system temp directory) and
//! is removed when the job returns, on every path.
//!
//! The child is polled until the job deadline and killed when it passes, so a
//! runaway layout never outlives its request.

use super::{EngineError, RenderJob, RenderedDocument, Renderer};
use crate::error::{ResourceIssue, ResourceKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use weasyprint_probe::{Installation, Version};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Lines of stderr kept as failure detail.
const STDERR_TAIL_LINES: usize = 20;

pub struct WeasyPrintRenderer {
    executable: PathBuf,
    version: Version,
    scratch_dir: Option<PathBuf>,
}

impl WeasyPrintRenderer {
    pub fn new(installation: Installation) -> Self {
        Self {
            executable: installation.path,
            version: installation.version,
            scratch_dir: None,
        }
    }

    /// Create per-render working directories under `dir`.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn workdir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("reportdoc-");
        match &self.scratch_dir {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        }
    }
}

impl Renderer for WeasyPrintRenderer {
    fn name(&self) -> &'static str {
        "weasyprint"
    }

    fn render(&self, job: &RenderJob) -> Result<RenderedDocument, EngineError> {
        let workdir = self.workdir()?;
        let dir = workdir.path();

        let input = dir.join("input.html");
        let output = dir.join("output.pdf");
        let stderr_path = dir.join("stderr.log");
        fs::write(&input, &job.html)?;

        let mut sheets = Vec::with_capacity(job.stylesheets.len());
        for (i, css) in job.stylesheets.iter().enumerate() {
            let path = dir.join(format!("sheet-{i}.css"));
            fs::write(&path, css)?;
            sheets.push(path);
        }

        let args = build_args(job, &sheets, &input, &output);
        debug!("Spawning {} with {} args", self.executable.display(), args.len());

        let mut child = Command::new(&self.executable)
            .args(&args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(File::create(&stderr_path)?))
            .spawn()?;

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if job.is_expired() {
                warn!("WeasyPrint exceeded the render deadline; killing pid {}", child.id());
                let _ = child.kill();
                let _ = child.wait();
                return Err(EngineError::DeadlineExceeded);
            }
            std::thread::sleep(POLL_INTERVAL.min(job.remaining()));
        };

        let stderr = fs::read_to_string(&stderr_path).unwrap_or_default();

        if !status.success() {
            return Err(EngineError::Failed {
                message: format!("weasyprint exited with {status}"),
                detail: Some(stderr_tail(&stderr)).filter(|s| !s.is_empty()),
            });
        }

        let bytes = fs::read(&output)?;
        Ok(RenderedDocument {
            bytes,
            issues: parse_diagnostics(&stderr),
        })
    }
}

/// Command-line arguments for one job.
fn build_args(job: &RenderJob, sheets: &[PathBuf], input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--encoding".into(), "utf-8".into()];

    if let Some(base) = &job.base_url {
        args.push("--base-url".into());
        args.push(base.as_str().into());
    }
    for sheet in sheets {
        args.push("--stylesheet".into());
        args.push(sheet.into());
    }

    args.push("--media-type".into());
    args.push(job.options.media.as_str().into());

    if job.options.presentational_hints {
        args.push("--presentational-hints".into());
    }
    if let Some(variant) = job.options.pdf_variant {
        args.push("--pdf-variant".into());
        args.push(variant.as_str().into());
    }

    args.push(input.into());
    args.push(output.into());
    args
}

// ── Diagnostics ──────────────────────────────────────────────────────────────

static RE_LOAD_FAILURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"Failed to load (\w+) at (?:["']([^"']+)["']|(\S+?))(?::?\s+(.*))?$"#).unwrap()
});

/// Extract unresolved references from WeasyPrint's log output.
fn parse_diagnostics(stderr: &str) -> Vec<ResourceIssue> {
    let mut issues: Vec<ResourceIssue> = Vec::new();

    for line in stderr.lines() {
        let Some(caps) = RE_LOAD_FAILURE.captures(line.trim_end()) else {
            continue;
        };
        let kind = match &caps[1] {
            "image" => ResourceKind::Image,
            "stylesheet" => ResourceKind::Stylesheet,
            "font" => ResourceKind::Font,
            _ => ResourceKind::Other,
        };
        let reference = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let reason = caps
            .get(4)
            .map(|m| m.as_str().trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "could not be loaded".to_string());

        if !issues.iter().any(|i| i.reference == reference) {
            issues.push(ResourceIssue::new(kind, reference, reason));
        }
    }

    issues
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
