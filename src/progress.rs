//! Progress-callback trait for per-slide carousel events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::RenderConfigBuilder::progress_callback`] to receive events
//! as [`crate::render::render_carousel`] works through its slides. The CLI
//! drives a terminal progress bar from it; a server could forward the same
//! events to a WebSocket.
//!
//! # Example
//!
//! ```rust
//! use flyer_render::{BatchProgressCallback, RenderConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rendered: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_slide_complete(&self, slide: usize, total: usize, png_len: usize) {
//!         self.rendered.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Slide {}/{} done ({} bytes)", slide, total, png_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { rendered: AtomicUsize::new(0) });
//!
//! let config = RenderConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the carousel renderer as it processes each slide.
///
/// Slides are rendered one after another, so calls never overlap for a single
/// batch. The trait is still `Send + Sync` because one config (and therefore
/// one callback) may be shared by concurrent requests. All methods default to
/// no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first slide.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before a slide's template is resolved.
    ///
    /// # Arguments
    /// * `slide`: 1-indexed slide number
    /// * `total`: slides in the batch
    fn on_slide_start(&self, slide: usize, total: usize) {
        let _ = (slide, total);
    }

    /// Called when a slide has been rasterised.
    ///
    /// # Arguments
    /// * `slide`  : 1-indexed slide number
    /// * `total`  : slides in the batch
    /// * `png_len`: size of the encoded PNG in bytes
    fn on_slide_complete(&self, slide: usize, total: usize, png_len: usize) {
        let _ = (slide, total, png_len);
    }

    /// Called when a slide fails. The batch stops after this call.
    fn on_slide_error(&self, slide: usize, total: usize, error: &str) {
        let _ = (slide, total, error);
    }

    /// Called once the batch is over, successfully or not.
    ///
    /// # Arguments
    /// * `total`        : slides in the batch
    /// * `success_count`: slides rendered before the batch finished or stopped
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RenderConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
