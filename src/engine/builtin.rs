//! Builtin engine: in-process HTML layout through `printpdf`.
//!
//! Used when WeasyPrint is not installed. Stylesheets are embedded into the
//! document head and every `<img src>` is loaded up front, since the layout
//! pass has no network or file access of its own.
//!
//! Layout cannot be interrupted once started; the deadline is checked before
//! it begins and the gateway discards late results.

use super::{EngineError, RenderJob, RenderedDocument, Renderer};
use crate::error::{ResourceIssue, ResourceKind};
use crate::pipeline::document::{img_sources, inject_styles};
use crate::pipeline::resources::{decode_data_uri, shorten};
use crate::request::{MediaType, RenderOptions};
use printpdf::{Base64OrRaw, GeneratePdfOptions, PdfDocument, PdfSaveOptions};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use url::Url;

pub struct BuiltinRenderer {
    fonts: BTreeMap<String, Base64OrRaw>,
}

impl BuiltinRenderer {
    /// Create the engine, loading every `.ttf`/`.otf` in `font_dir`.
    ///
    /// A configured directory that is unreadable or holds no fonts is an
    /// error: the caller asked for fonts and would silently get fallbacks.
    pub fn new(font_dir: Option<&Path>) -> Result<Self, EngineError> {
        let fonts = match font_dir {
            Some(dir) => load_fonts(dir)?,
            None => BTreeMap::new(),
        };
        Ok(Self { fonts })
    }

    pub fn font_count(&self) -> usize {
        self.fonts.len()
    }
}

impl Renderer for BuiltinRenderer {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn render(&self, job: &RenderJob) -> Result<RenderedDocument, EngineError> {
        check_options(&job.options)?;
        let html = inject_styles(&job.html, &job.stylesheets);

        let mut loader = ImageLoader::new(job);
        let mut images = BTreeMap::new();
        let mut issues = Vec::new();
        for src in img_sources(&html) {
            match loader.load(&src) {
                Ok(bytes) => {
                    images.insert(src, Base64OrRaw::Raw(bytes));
                }
                Err(reason) => {
                    issues.push(ResourceIssue::new(ResourceKind::Image, shorten(&src), reason))
                }
            }
        }
        debug!("Loaded {} images ({} failed)", images.len(), issues.len());

        if job.is_expired() {
            return Err(EngineError::DeadlineExceeded);
        }

        let (width, height) = job.options.page_dimensions_mm();
        let options = GeneratePdfOptions {
            page_width: Some(width),
            page_height: Some(height),
            ..Default::default()
        };

        let mut warnings = Vec::new();
        let doc = PdfDocument::from_html(&html, &images, &self.fonts, &options, &mut warnings)
            .map_err(|e| EngineError::Failed {
                message: "HTML layout failed".into(),
                detail: Some(e),
            })?;
        let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!("printpdf reported {} warnings", warnings.len());
        }

        Ok(RenderedDocument { bytes, issues })
    }
}

/// Reject options the layout pass has no way to honour.
fn check_options(options: &RenderOptions) -> Result<(), EngineError> {
    if let Some(variant) = options.pdf_variant {
        return Err(EngineError::Unsupported {
            option: "pdf_variant",
            reason: format!("cannot produce {}", variant.as_str()),
        });
    }
    if options.media != MediaType::Print {
        return Err(EngineError::Unsupported {
            option: "media",
            reason: format!("only print media is laid out, got {}", options.media.as_str()),
        });
    }
    if options.presentational_hints {
        return Err(EngineError::Unsupported {
            option: "presentational_hints",
            reason: "HTML presentational attributes are not applied".into(),
        });
    }
    Ok(())
}

fn load_fonts(dir: &Path) -> Result<BTreeMap<String, Base64OrRaw>, EngineError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        EngineError::Unavailable(format!("cannot read font directory {}: {e}", dir.display()))
    })?;

    let mut fonts = BTreeMap::new();
    for entry in entries {
        let path = entry?.path();
        let is_font = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"))
            .unwrap_or(false);
        if !is_font {
            continue;
        }
        let Some(family) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        fonts.insert(family.to_string(), Base64OrRaw::Raw(fs::read(&path)?));
    }

    if fonts.is_empty() {
        return Err(EngineError::Unavailable(format!(
            "no .ttf or .otf fonts in {}",
            dir.display()
        )));
    }
    info!("Loaded {} fonts from {}", fonts.len(), dir.display());
    Ok(fonts)
}

// ── Image loading ────────────────────────────────────────────────────────────

/// Loads `<img>` references for one job. The HTTP client is created on first
/// use, on the blocking worker that runs the job.
struct ImageLoader<'a> {
    job: &'a RenderJob,
    client: Option<reqwest::blocking::Client>,
}

impl<'a> ImageLoader<'a> {
    fn new(job: &'a RenderJob) -> Self {
        Self { job, client: None }
    }

    fn load(&mut self, src: &str) -> Result<Vec<u8>, String> {
        let bytes = if src.starts_with("data:") {
            decode_data_uri(src)?.bytes
        } else {
            let url = self.resolve(src)?;
            match url.scheme() {
                "file" if !self.job.allow_file_urls => {
                    return Err("file: URLs are disabled".to_string())
                }
                "file" => {
                    let path = url
                        .to_file_path()
                        .map_err(|_| "not a local file path".to_string())?;
                    fs::read(&path).map_err(|e| e.to_string())?
                }
                "http" | "https" => self.fetch(&url)?,
                other => return Err(format!("unsupported scheme '{other}'")),
            }
        };

        image::guess_format(&bytes).map_err(|_| "unrecognised image format".to_string())?;
        Ok(bytes)
    }

    fn resolve(&self, src: &str) -> Result<Url, String> {
        match Url::parse(src) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.job.base_url {
                Some(base) => base.join(src).map_err(|e| e.to_string()),
                None => Err("relative reference without a base_url".into()),
            },
            Err(e) => Err(e.to_string()),
        }
    }

    fn fetch(&mut self, url: &Url) -> Result<Vec<u8>, String> {
        let timeout = self.job.fetch_timeout.min(self.job.remaining());
        if timeout.is_zero() {
            return Err("render deadline reached before fetch".into());
        }

        if self.client.is_none() {
            let client = reqwest::blocking::Client::builder()
                .build()
                .map_err(|e| format!("HTTP client: {e}"))?;
            self.client = Some(client);
        }
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| "HTTP client unavailable".to_string())?;

        let response = client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    format!("timed out after {}ms", timeout.as_millis())
                } else {
                    e.to_string()
                }
            })?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| e.to_string())
    }
}
