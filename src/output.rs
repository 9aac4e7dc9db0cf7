//! Output types returned by a successful conversion.

use crate::error::ResourceIssue;
use serde::Serialize;

/// MIME type of every successful result.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A finished PDF.
///
/// Fields are private: a result is immutable once the gateway hands it out.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    bytes: Vec<u8>,
    engine: &'static str,
    warnings: Vec<ResourceIssue>,
    stats: RenderStats,
}

impl ConversionResult {
    pub(crate) fn new(
        bytes: Vec<u8>,
        engine: &'static str,
        warnings: Vec<ResourceIssue>,
        stats: RenderStats,
    ) -> Self {
        Self {
            bytes,
            engine,
            warnings,
            stats,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_length(&self) -> usize {
        self.bytes.len()
    }

    pub fn content_type(&self) -> &'static str {
        PDF_CONTENT_TYPE
    }

    /// Name of the engine that produced the document.
    pub fn engine(&self) -> &'static str {
        self.engine
    }

    /// References that were skipped under the degrade policy.
    pub fn warnings(&self) -> &[ResourceIssue] {
        &self.warnings
    }

    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Per-phase timings of one conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    pub validate_ms: u64,
    /// Stylesheet resolution.
    pub resolve_ms: u64,
    /// Engine time, including the wait for a render slot.
    pub render_ms: u64,
    pub total_ms: u64,
}
