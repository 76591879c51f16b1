//! Pipeline stages for template rendering.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own and the rasteriser can be swapped without touching
//! the text stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ sanitize ──▶ substitute ──▶ postprocess ──▶ sanitize ──▶ rasterize ──▶ encode
//! (URL/file)  (scrub)     (placeholders)  (clean/embed)   (again)      (resvg)       (base64/zip)
//! ```
//!
//! 1. [`input`]     : resolve a URL, file or inline template to validated text
//! 2. [`sanitize`]  : reject non-documents, strip active content, add a viewBox
//! 3. [`scan`]      : locate placeholders of every supported syntax
//! 4. [`substitute`]: resolve placeholders against the data and apply them
//!    atomically
//! 5. [`postprocess`]: configured clean-up steps; the only text stage with
//!    network I/O (image embedding)
//! 6. [`rasterize`] : document → PNG on the blocking pool
//! 7. [`encode`]    : base64, `data:` URLs and carousel archives

pub mod encode;
pub mod input;
pub mod postprocess;
pub mod rasterize;
pub mod sanitize;
pub mod scan;
pub mod substitute;
