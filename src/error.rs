//! Error types for the flyer-render library.
//!
//! Two distinct types reflect two distinct failure modes:
//!
//! * [`FlyerError`]: **Fatal**: the render cannot proceed (not an SVG,
//!   template unreachable, rasteriser rejected the document). Returned as
//!   `Err(FlyerError)` from the top-level `render*` functions.
//!
//! * [`RenderWarning`]: **Non-fatal**: the substituted document is suspicious
//!   (root tag gone, payload larger than the configured ceiling) but can still
//!   be handed to the rasteriser. Stored in
//!   [`crate::output::SubstitutionResult::warnings`]; the caller decides
//!   whether to proceed.
//!
//! Unmatched placeholders and missing data keys are neither: they are the
//! normal case and are silently left in place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the flyer-render library.
#[derive(Debug, Error)]
pub enum FlyerError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The template is not an SVG document (no `<svg>` … `</svg>`).
    #[error("Invalid SVG document: {reason}")]
    InvalidDocument { reason: String },

    /// The request itself is malformed (no template, empty batch, bad URL).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A template or an embedded image could not be fetched.
    #[error("Failed to fetch '{url}': {reason}")]
    FetchFailed {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    /// A remote fetch exceeded its time budget.
    #[error("Fetching '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// A local template file could not be read.
    #[error("Failed to read template '{path}': {source}")]
    TemplateReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Render errors ─────────────────────────────────────────────────────
    /// The rasteriser rejected the substituted document.
    #[error("SVG to PNG conversion failed: {detail}")]
    RasterizationFailed { detail: String },

    /// One slide of a carousel failed; the batch was aborted.
    ///
    /// `index` is 1-based.
    #[error("Failed to process slide {index}: {source}")]
    SlideFailed {
        index: usize,
        #[source]
        source: Box<FlyerError>,
    },

    /// Packing rendered slides into a zip archive failed.
    #[error("Failed to build zip archive: {0}")]
    ArchiveFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output image file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlyerError {
    /// HTTP status code equivalent for this error.
    ///
    /// Slow upstreams (504) and broken upstreams (502) are kept apart so
    /// callers can decide whether a retry is worthwhile.
    pub fn http_status(&self) -> u16 {
        match self {
            FlyerError::InvalidDocument { .. } | FlyerError::InvalidRequest(_) => 400,
            FlyerError::TemplateReadFailed { .. } => 404,
            FlyerError::FetchFailed { .. } => 502,
            FlyerError::Timeout { .. } => 504,
            FlyerError::SlideFailed { source, .. } => source.http_status(),
            FlyerError::RasterizationFailed { .. }
            | FlyerError::ArchiveFailed(_)
            | FlyerError::OutputWriteFailed { .. }
            | FlyerError::InvalidConfig(_)
            | FlyerError::Internal(_) => 500,
        }
    }

    /// Status code reported by the upstream server, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            FlyerError::FetchFailed { status, .. } => *status,
            FlyerError::SlideFailed { source, .. } => source.upstream_status(),
            _ => None,
        }
    }
}

/// A non-fatal finding attached to a successful substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderWarning {
    /// The substituted document no longer contains an `<svg` opening tag.
    MissingRoot,

    /// The substituted document is larger than the configured ceiling.
    SizeLimitExceeded { size: usize, limit: usize },
}

impl fmt::Display for RenderWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderWarning::MissingRoot => write!(f, "Invalid SVG: missing <svg> tag"),
            RenderWarning::SizeLimitExceeded { size, limit } => write!(
                f,
                "SVG size too large: {}KB (limit {}KB)",
                size.div_ceil(1024),
                limit / 1024
            ),
        }
    }
}
