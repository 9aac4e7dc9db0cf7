//! Report documents: a structured payload rendered through an HTML template.
//!
//! A [`ReportPayload`] describes one recurring media report (owner, cadence,
//! data sources, changelog). [`build_report_html`] validates it and fills the
//! embedded Tera template; the result goes through the gateway like any other
//! HTML.
//!
//! `description`, `notes` and `adjustments` are Markdown (tables included).
//! Raw HTML inside them is escaped, never passed through.

use crate::error::GatewayError;
use once_cell::sync::Lazy;
use pulldown_cmark::{html, CowStr, Event, Options, Parser};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use thiserror::Error;
use url::Url;

const TEMPLATE_NAME: &str = "report.html";
const TEMPLATE: &str = include_str!("../templates/report.html.tera");

/// Timestamp format stamped into every report.
pub const GENERATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("'{field}' is required")]
    Missing { field: &'static str },

    #[error("'{field}' is invalid: {reason}")]
    Invalid { field: String, reason: String },

    #[error("template error: {0}")]
    Template(String),
}

impl From<ReportError> for GatewayError {
    fn from(e: ReportError) -> Self {
        match e {
            ReportError::Template(msg) => {
                tracing::error!("Report template failed: {}", msg);
                GatewayError::Internal(msg)
            }
            other => GatewayError::InvalidRequest(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleSheet {
    pub subtitle: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub date: String,
    pub change: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

/// The report description accepted by `POST /report`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub title: String,
    pub media_team: String,
    pub owner: Owner,
    pub frequency: Frequency,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    pub automated: bool,
    #[serde(default)]
    pub google_sheets: Vec<GoogleSheet>,
    #[serde(default)]
    pub bigquery_link: Option<String>,
    pub report_link: String,
    #[serde(default)]
    pub adjustments: Vec<String>,
    pub description: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub changelog: Vec<Change>,
}

fn default_version() -> String {
    "1.0".to_string()
}

static RE_EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

impl ReportPayload {
    /// Check field rules and fill defaults.
    ///
    /// - `title` and `description` must not be blank
    /// - `owner.email` must look like an address
    /// - every link must be an absolute `http(s)` URL
    /// - `automated` reports need a `bigquery_link`
    /// - blank `notes` become a contact line for the owner
    pub fn validate(mut self) -> Result<Self, ReportError> {
        if self.title.trim().is_empty() {
            return Err(ReportError::Missing { field: "title" });
        }
        if self.description.trim().is_empty() {
            return Err(ReportError::Missing {
                field: "description",
            });
        }
        if !RE_EMAIL.is_match(self.owner.email.trim()) {
            return Err(ReportError::Invalid {
                field: "owner.email".into(),
                reason: format!("'{}' is not an email address", self.owner.email),
            });
        }

        check_http_url("report_link", &self.report_link)?;
        for (i, sheet) in self.google_sheets.iter().enumerate() {
            check_http_url(&format!("google_sheets[{i}].url"), &sheet.url)?;
        }
        match &self.bigquery_link {
            Some(link) => check_http_url("bigquery_link", link)?,
            None if self.automated => {
                return Err(ReportError::Invalid {
                    field: "bigquery_link".into(),
                    reason: "required when automated is true".into(),
                })
            }
            None => {}
        }

        if self.notes.as_deref().map(str::trim).unwrap_or("").is_empty() {
            self.notes = Some(format!("For access issues, contact {}", self.owner.email));
        }

        Ok(self)
    }

    /// Name for the download, derived from the title.
    pub fn download_stem(&self) -> &str {
        &self.title
    }
}

fn check_http_url(field: &str, raw: &str) -> Result<(), ReportError> {
    let invalid = |reason: String| ReportError::Invalid {
        field: field.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(()),
        "http" | "https" => Err(invalid("URL has no host".into())),
        other => Err(invalid(format!("scheme '{other}' is not http(s)"))),
    }
}

#[derive(Serialize)]
struct ReportView<'a> {
    #[serde(flatten)]
    payload: &'a ReportPayload,
    description_html: String,
    notes_html: String,
    adjustments_html: Vec<String>,
    generated_at: &'a str,
}

/// Render Markdown to an HTML fragment. Raw HTML becomes literal text.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(CowStr::from(raw.into_string())),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Validate `payload` and render it to a complete HTML document.
pub fn build_report_html(payload: ReportPayload, generated_at: &str) -> Result<String, GatewayError> {
    let payload = payload.validate()?;
    let html = render_template(&payload, generated_at)?;
    Ok(html)
}

fn render_template(payload: &ReportPayload, generated_at: &str) -> Result<String, ReportError> {
    let mut tera = Tera::default();
    tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)
        .map_err(|e| ReportError::Template(e.to_string()))?;

    let view = ReportView {
        payload,
        description_html: markdown_to_html(&payload.description),
        notes_html: markdown_to_html(payload.notes.as_deref().unwrap_or_default()),
        adjustments_html: payload
            .adjustments
            .iter()
            .map(|a| markdown_to_html(a))
            .collect(),
        generated_at,
    };
    let context =
        Context::from_serialize(&view).map_err(|e| ReportError::Template(e.to_string()))?;

    tera.render(TEMPLATE_NAME, &context)
        .map_err(|e| ReportError::Template(e.to_string()))
}

/// Local wall-clock time formatted with [`GENERATED_AT_FORMAT`].
pub fn generated_at_now() -> String {
    jiff::Zoned::now().strftime(GENERATED_AT_FORMAT).to_string()
}
