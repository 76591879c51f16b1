//! Result types returned by the substitution and render entry points.

use crate::error::RenderWarning;
use serde::Serialize;

/// Outcome of applying a data dictionary to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstitutionResult {
    /// The substituted document.
    pub document: String,
    /// Placeholder occurrences replaced.
    pub replacement_count: usize,
    /// Non-fatal findings; empty on a clean run.
    pub warnings: Vec<RenderWarning>,
    pub stats: SubstitutionStats,
}

/// Diagnostic counters for one substitution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstitutionStats {
    /// Distinct placeholder tokens present in the input document.
    pub placeholders_found: usize,
    /// Occurrences replaced (equals `replacement_count`).
    pub placeholders_replaced: usize,
    /// Size of the substituted document in bytes.
    pub estimated_size: usize,
}

/// A rendered flyer.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    /// Encoded PNG.
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// The substitution that produced the rasterised document.
    pub substitution: SubstitutionResult,
    /// Wall-clock time from template resolution to encoded PNG.
    pub render_time_ms: u64,
}

impl RenderOutput {
    /// Size of the encoded PNG in bytes.
    pub fn size(&self) -> usize {
        self.png.len()
    }
}
