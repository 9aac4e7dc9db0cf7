//! Error types for the reportdoc render gateway.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`GatewayError`] is **fatal**: the request cannot produce a PDF
//!   (bad input, engine fault, deadline exceeded, or a missing resource under
//!   the strict policy). Returned as `Err(GatewayError)` from
//!   [`crate::gateway::RenderGateway::render`].
//!
//! * [`ResourceIssue`] is **non-fatal**: one external reference (stylesheet,
//!   image, font) could not be loaded. Under
//!   [`ResourcePolicy::Degrade`](crate::config::ResourcePolicy::Degrade) the
//!   document is rendered without it and the issue is returned alongside the
//!   PDF in [`crate::output::ConversionResult::warnings`]; under
//!   [`ResourcePolicy::Fail`](crate::config::ResourcePolicy::Fail) the first
//!   issue is promoted to [`GatewayError::ResourceFetch`].
//!
//! Every `GatewayError` maps onto exactly one [`ErrorKind`], which is what
//! the HTTP layer uses to pick a status code.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The four failure categories visible to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Client-caused; retrying the same request will fail again.
    InvalidInput,
    /// The engine faulted or produced unusable output.
    RenderingFailure,
    /// A referenced stylesheet, image or font could not be loaded.
    ResourceFetchFailure,
    /// Rendering exceeded the configured deadline.
    Timeout,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::RenderingFailure => "RenderingFailure",
            ErrorKind::ResourceFetchFailure => "ResourceFetchFailure",
            ErrorKind::Timeout => "Timeout",
        }
    }

    /// Whether resubmitting the identical request can reasonably succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::ResourceFetchFailure)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All fatal errors returned by the render gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The HTML source is empty or whitespace only.
    #[error("HTML source is empty")]
    EmptyHtml,

    /// The HTML source exceeds `max_html_bytes`.
    #[error("HTML source is {size} bytes; the limit is {limit} bytes")]
    HtmlTooLarge { size: usize, limit: usize },

    /// The base URL does not parse or uses an unsupported scheme.
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// More stylesheets than `max_stylesheets`.
    #[error("Too many stylesheets: {count} (limit {limit})")]
    TooManyStylesheets { count: usize, limit: usize },

    /// A stylesheet entry is empty or its URL cannot be resolved.
    #[error("Invalid stylesheet #{index}: {reason}")]
    InvalidStylesheet { index: usize, reason: String },

    /// A render option is out of range.
    #[error("Invalid render option '{option}': {reason}")]
    InvalidOption { option: &'static str, reason: String },

    /// The request body could not be decoded (bad JSON, not UTF-8, bad query).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── Resource errors ───────────────────────────────────────────────────
    /// A referenced resource could not be loaded under the strict policy.
    #[error("Failed to load {kind} '{reference}': {reason}")]
    ResourceFetch {
        reference: String,
        kind: ResourceKind,
        reason: String,
    },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// The engine reported a failure.
    #[error("Rendering failed in {engine}: {message}")]
    RenderingFailed {
        engine: &'static str,
        message: String,
        detail: Option<String>,
    },

    /// The engine returned bytes that are not a PDF.
    #[error("Engine output is not a PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// Rendering did not finish before the deadline.
    #[error("Rendering exceeded the {limit_ms}ms deadline")]
    Timeout { limit_ms: u64 },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not write the PDF to the requested path.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Startup errors ────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No usable rendering engine could be initialised.
    #[error("Rendering engine unavailable: {0}")]
    EngineUnavailable(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (for example a panicking render task).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// The caller-visible category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::EmptyHtml
            | GatewayError::HtmlTooLarge { .. }
            | GatewayError::InvalidBaseUrl { .. }
            | GatewayError::TooManyStylesheets { .. }
            | GatewayError::InvalidStylesheet { .. }
            | GatewayError::InvalidOption { .. }
            | GatewayError::InvalidRequest(_)
            | GatewayError::InvalidConfig(_) => ErrorKind::InvalidInput,
            GatewayError::ResourceFetch { .. } => ErrorKind::ResourceFetchFailure,
            GatewayError::Timeout { .. } => ErrorKind::Timeout,
            GatewayError::RenderingFailed { .. }
            | GatewayError::NotAPdf { .. }
            | GatewayError::OutputWriteFailed { .. }
            | GatewayError::EngineUnavailable(_)
            | GatewayError::Internal(_) => ErrorKind::RenderingFailure,
        }
    }

    /// Extra context for the caller: the unresolved reference, the engine's
    /// diagnostic output, or the offending URL.
    pub fn source_detail(&self) -> Option<String> {
        match self {
            GatewayError::ResourceFetch { reference, .. } => Some(reference.clone()),
            GatewayError::RenderingFailed { detail, .. } => detail.clone(),
            GatewayError::InvalidBaseUrl { url, .. } => Some(url.clone()),
            GatewayError::OutputWriteFailed { path, .. } => Some(path.display().to_string()),
            _ => None,
        }
    }
}

/// Serialisable form of a [`GatewayError`]: `{ kind, message, source_detail }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_detail: Option<String>,
}

impl From<&GatewayError> for ErrorBody {
    fn from(e: &GatewayError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
            source_detail: e.source_detail(),
        }
    }
}

/// What sort of external reference failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Stylesheet,
    Image,
    Font,
    Other,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Stylesheet => "stylesheet",
            ResourceKind::Image => "image",
            ResourceKind::Font => "font",
            ResourceKind::Other => "resource",
        })
    }
}

/// A non-fatal failure to load one external reference.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} '{reference}' could not be loaded: {reason}")]
pub struct ResourceIssue {
    pub reference: String,
    pub kind: ResourceKind,
    pub reason: String,
}

impl ResourceIssue {
    pub fn new(kind: ResourceKind, reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            kind,
            reason: reason.into(),
        }
    }
}

impl From<ResourceIssue> for GatewayError {
    fn from(issue: ResourceIssue) -> Self {
        GatewayError::ResourceFetch {
            reference: issue.reference,
            kind: issue.kind,
            reason: issue.reason,
        }
    }
}
