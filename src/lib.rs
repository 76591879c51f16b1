//! # flyer-render
//!
//! Fill SVG flyer templates with business data and rasterise them to PNG.
//!
//! Templates are authored in a design tool with placeholder tokens where the
//! listing data goes. This crate finds those tokens, replaces them with the
//! caller's values without ever corrupting the markup, and renders the
//! result.
//!
//! ## Placeholder Syntaxes
//!
//! | Syntax | Example |
//! |--------|---------|
//! | namespaced | `dyno.address` (namespace configurable, case-insensitive) |
//! | double brace | `{{price}}` |
//! | single brace | `{price}` |
//! | dollar brace | `${price}` |
//! | percent | `%price%` |
//! | element text | `<text id="price">…</text>` via a field mapping |
//! | bare word | `price` in text content (opt-in) |
//!
//! ## Pipeline Overview
//!
//! ```text
//! Template
//!  │
//!  ├─ 1. Input       fetch URL / read file / inline text, must be SVG
//!  ├─ 2. Sanitise    drop scripts, handlers, iframes; synthesise viewBox
//!  ├─ 3. Substitute  one atomic pass over the original document
//!  ├─ 4. Post steps  clean / minify / embed remote images
//!  ├─ 5. Rasterise   resvg on the blocking pool
//!  └─ 6. Encode      PNG, data URL or zip of slides
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flyer_render::{render_flyer, DataDictionary, FlyerRequest, RenderConfig, TemplateSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let data: DataDictionary = [("address", "123 Main St"), ("price", "$500,000")]
//!         .into_iter()
//!         .collect();
//!     let request = FlyerRequest::new(
//!         TemplateSource::Url("https://cdn.example.com/flyer.svg".into()),
//!         data,
//!     );
//!     let output = render_flyer(&request, &RenderConfig::default()).await?;
//!     std::fs::write("flyer.png", &output.png)?;
//!     eprintln!("{} placeholders replaced", output.substitution.replacement_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `flyer-render` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | HTTP API (axum + tower-http) in [`server`] |
//!
//! Disable both when using only the library:
//! ```toml
//! flyer-render = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod data;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod render;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    Background, PostStep, QualityHint, RenderConfig, RenderConfigBuilder, RenderOptions,
    DEFAULT_MAX_DOCUMENT_BYTES, DEFAULT_NAMESPACE,
};
pub use data::{DataDictionary, FieldMapping, Scalar};
pub use error::{FlyerError, RenderWarning};
pub use output::{RenderOutput, SubstitutionResult, SubstitutionStats};
pub use pipeline::input::{Fetcher, TemplateSource};
pub use pipeline::rasterize::{RasterImage, RasterTarget, Rasterizer, ResvgRasterizer};
pub use pipeline::sanitize::{normalize_dimensions, sanitize_document, validate_document};
pub use pipeline::scan::{scan, Placeholder, Scanner, Syntax};
pub use pipeline::substitute::{substitute, Substitutor};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use render::{
    render_carousel, render_flyer, render_flyer_sync, render_flyer_to_file, render_template,
    FlyerRequest,
};
