//! Request validation: the Validating state of the gateway.
//!
//! Everything here is pure and synchronous. It runs before any network
//! access or engine invocation, so a malformed request never costs a render.

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::request::{ConversionRequest, RenderOptions, StylesheetSource};
use url::Url;

/// A request that passed validation, with every URL parsed.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub html: String,
    pub base_url: Option<Url>,
    pub stylesheets: Vec<StylesheetRef>,
    pub options: RenderOptions,
}

/// A stylesheet whose location has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StylesheetRef {
    Inline(String),
    /// A `data:` URI, decoded during resolution.
    Data(String),
    /// An absolute `http`, `https` or `file` URL.
    Remote(Url),
}

const URL_SCHEMES: [&str; 3] = ["http", "https", "file"];

/// Validate a request against the configured limits.
///
/// Checks, in order: empty HTML, HTML size, base URL syntax, stylesheet
/// count, each stylesheet entry, option ranges.
pub fn validate_request(
    request: ConversionRequest,
    config: &GatewayConfig,
) -> Result<ValidatedRequest, GatewayError> {
    let ConversionRequest {
        html,
        base_url,
        stylesheets,
        options,
    } = request;

    if html.trim().is_empty() {
        return Err(GatewayError::EmptyHtml);
    }
    if html.len() > config.max_html_bytes {
        return Err(GatewayError::HtmlTooLarge {
            size: html.len(),
            limit: config.max_html_bytes,
        });
    }

    let base_url = base_url.as_deref().map(parse_base_url).transpose()?;
    if let Some(url) = &base_url {
        if url.scheme() == "file" && !config.allow_file_urls {
            return Err(GatewayError::InvalidBaseUrl {
                url: url.to_string(),
                reason: "file: URLs are disabled".into(),
            });
        }
    }

    if stylesheets.len() > config.max_stylesheets {
        return Err(GatewayError::TooManyStylesheets {
            count: stylesheets.len(),
            limit: config.max_stylesheets,
        });
    }

    let stylesheets = stylesheets
        .into_iter()
        .enumerate()
        .map(|(i, sheet)| {
            resolve_stylesheet(i + 1, sheet, base_url.as_ref(), config.allow_file_urls)
        })
        .collect::<Result<Vec<_>, _>>()?;

    validate_options(&options)?;

    Ok(ValidatedRequest {
        html,
        base_url,
        stylesheets,
        options,
    })
}

/// Parse a base URL: absolute, hierarchical, and `http`, `https` or `file`.
pub fn parse_base_url(raw: &str) -> Result<Url, GatewayError> {
    let invalid = |reason: String| GatewayError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !URL_SCHEMES.contains(&url.scheme()) {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot be used as a base".into()));
    }
    Ok(url)
}

fn resolve_stylesheet(
    index: usize,
    sheet: StylesheetSource,
    base_url: Option<&Url>,
    allow_file_urls: bool,
) -> Result<StylesheetRef, GatewayError> {
    let invalid = |reason: String| GatewayError::InvalidStylesheet { index, reason };

    match sheet {
        StylesheetSource::Css(css) => {
            if css.trim().is_empty() {
                return Err(invalid("CSS text is empty".into()));
            }
            Ok(StylesheetRef::Inline(css))
        }
        StylesheetSource::Url(raw) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(invalid("URL is empty".into()));
            }
            if raw.starts_with("data:") {
                return Ok(StylesheetRef::Data(raw.to_string()));
            }

            let url = match Url::parse(raw) {
                Ok(url) => url,
                Err(url::ParseError::RelativeUrlWithoutBase) => match base_url {
                    Some(base) => base.join(raw).map_err(|e| invalid(e.to_string()))?,
                    None => {
                        return Err(invalid(format!(
                            "relative URL '{raw}' needs a base_url"
                        )))
                    }
                },
                Err(e) => return Err(invalid(e.to_string())),
            };

            if !URL_SCHEMES.contains(&url.scheme()) {
                return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
            }
            if url.scheme() == "file" && !allow_file_urls {
                return Err(invalid("file: URLs are disabled".into()));
            }
            Ok(StylesheetRef::Remote(url))
        }
    }
}

fn validate_options(options: &RenderOptions) -> Result<(), GatewayError> {
    if let Some(margin) = options.margin_mm {
        if !margin.is_finite() || !(0.0..=100.0).contains(&margin) {
            return Err(GatewayError::InvalidOption {
                option: "margin_mm",
                reason: format!("must be between 0 and 100, got {margin}"),
            });
        }
    }
    Ok(())
}
