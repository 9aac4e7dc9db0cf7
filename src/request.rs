//! Request types: what a caller submits for conversion.

use serde::{Deserialize, Serialize};

/// One document-conversion request.
///
/// Consumed by value by [`crate::gateway::RenderGateway::render`]; a request
/// is rendered exactly once.
///
/// JSON form:
/// ```json
/// {
///   "html": "<h1>Hello</h1>",
///   "base_url": "https://example.com/reports/",
///   "stylesheets": [{"css": "h1 { color: navy }"}, {"url": "print.css"}],
///   "options": {"page_size": "a4", "landscape": true}
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversionRequest {
    /// The HTML document. Must be non-empty.
    pub html: String,

    /// Base for resolving relative references in the document and in
    /// stylesheet URLs.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Extra stylesheets, applied in order after the page settings.
    #[serde(default)]
    pub stylesheets: Vec<StylesheetSource>,

    #[serde(default)]
    pub options: RenderOptions,
}

impl ConversionRequest {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_stylesheet(mut self, sheet: StylesheetSource) -> Self {
        self.stylesheets.push(sheet);
        self
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }
}

/// A stylesheet supplied inline or by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StylesheetSource {
    /// CSS text.
    Css(String),
    /// Absolute URL, URL relative to `base_url`, or a `data:` URI.
    Url(String),
}

/// The recognised rendering flags. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderOptions {
    /// Paper size. `None` leaves the document's own `@page` rules in charge.
    pub page_size: Option<PageSize>,

    /// Rotate the page size to landscape.
    pub landscape: bool,

    /// Uniform page margin in millimetres (0–100).
    pub margin_mm: Option<f32>,

    /// CSS media type used to select `@media` rules. Default: print.
    pub media: MediaType,

    /// Honour presentational HTML attributes such as `align` and `bgcolor`.
    pub presentational_hints: bool,

    /// Produce a PDF/A or PDF/UA variant.
    pub pdf_variant: Option<PdfVariant>,
}

impl RenderOptions {
    /// Whether any option needs a synthesised `@page` rule.
    pub fn has_page_rules(&self) -> bool {
        self.page_size.is_some() || self.landscape || self.margin_mm.is_some()
    }

    /// Page width and height in millimetres, defaulting to A4.
    pub fn page_dimensions_mm(&self) -> (f32, f32) {
        let (w, h) = self.page_size.unwrap_or_default().dimensions_mm();
        if self.landscape {
            (h, w)
        } else {
            (w, h)
        }
    }
}

/// Supported paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
}

impl PageSize {
    /// Portrait width and height in millimetres.
    pub fn dimensions_mm(self) -> (f32, f32) {
        match self {
            PageSize::A3 => (297.0, 420.0),
            PageSize::A4 => (210.0, 297.0),
            PageSize::A5 => (148.0, 210.0),
            PageSize::Letter => (215.9, 279.4),
            PageSize::Legal => (215.9, 355.6),
        }
    }

    /// The CSS `size` keyword.
    pub fn css_name(self) -> &'static str {
        match self {
            PageSize::A3 => "A3",
            PageSize::A4 => "A4",
            PageSize::A5 => "A5",
            PageSize::Letter => "letter",
            PageSize::Legal => "legal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Print,
    Screen,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Print => "print",
            MediaType::Screen => "screen",
        }
    }
}

/// Archival and accessibility PDF profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PdfVariant {
    #[serde(rename = "pdf/a-1b")]
    PdfA1b,
    #[serde(rename = "pdf/a-2b")]
    PdfA2b,
    #[serde(rename = "pdf/a-3b")]
    PdfA3b,
    #[serde(rename = "pdf/ua-1")]
    PdfUa1,
}

impl PdfVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            PdfVariant::PdfA1b => "pdf/a-1b",
            PdfVariant::PdfA2b => "pdf/a-2b",
            PdfVariant::PdfA3b => "pdf/a-3b",
            PdfVariant::PdfUa1 => "pdf/ua-1",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_json_request() {
        let json = r#"{
            "html": "<p>hi</p>",
            "base_url": "https://example.com/",
            "stylesheets": [{"css": "p { color: red }"}, {"url": "print.css"}],
            "options": {"page_size": "letter", "landscape": true, "pdf_variant": "pdf/a-3b"}
        }"#;
        let req: ConversionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.base_url.as_deref(), Some("https://example.com/"));
        assert_eq!(req.stylesheets.len(), 2);
        assert_eq!(req.stylesheets[1], StylesheetSource::Url("print.css".into()));
        assert_eq!(req.options.page_size, Some(PageSize::Letter));
        assert_eq!(req.options.pdf_variant, Some(PdfVariant::PdfA3b));
        assert_eq!(req.options.media, MediaType::Print);
    }

    #[test]
    fn html_only_request_uses_defaults() {
        let req: ConversionRequest = serde_json::from_str(r#"{"html": "x"}"#).unwrap();
        assert_eq!(req, ConversionRequest::new("x"));
        assert!(!req.options.has_page_rules());
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = serde_json::from_str::<ConversionRequest>(
            r#"{"html": "x", "options": {"javascript": true}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("javascript"), "got: {err}");
    }

    #[test]
    fn landscape_swaps_dimensions() {
        let opts = RenderOptions {
            page_size: Some(PageSize::A4),
            landscape: true,
            ..Default::default()
        };
        assert_eq!(opts.page_dimensions_mm(), (297.0, 210.0));
        assert!(opts.has_page_rules());
    }
}
