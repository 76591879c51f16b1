//! Render entry points: template + data → PNG.
//!
//! [`render_template`] is the pure core (no I/O): validate, sanitise, give
//! the document a sizing box and substitute. [`render_flyer`] wraps it with
//! template resolution, post steps and rasterisation; [`render_carousel`]
//! repeats that for a batch of slides.

use crate::config::{PostStep, RenderConfig, RenderOptions};
use crate::data::{DataDictionary, FieldMapping};
use crate::error::FlyerError;
use crate::output::{RenderOutput, SubstitutionResult};
use crate::pipeline::input::{self, Fetcher, TemplateSource};
use crate::pipeline::postprocess;
use crate::pipeline::rasterize::{self, RasterTarget};
use crate::pipeline::sanitize::{check_document, normalize_dimensions, sanitize_document};
use crate::pipeline::substitute::Substitutor;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One flyer to render.
#[derive(Debug, Clone)]
pub struct FlyerRequest {
    pub source: TemplateSource,
    pub data: DataDictionary,
    pub mapping: FieldMapping,
    pub options: RenderOptions,
    /// Inline remote `<image>`s even when the config's post steps don't.
    pub embed_images: bool,
    /// Per-request override of [`RenderConfig::bare_word_fallback`].
    pub bare_word_fallback: Option<bool>,
}

impl FlyerRequest {
    pub fn new(source: TemplateSource, data: DataDictionary) -> Self {
        Self {
            source,
            data,
            mapping: FieldMapping::default(),
            options: RenderOptions::default(),
            embed_images: false,
            bare_word_fallback: None,
        }
    }

    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Post steps for this request: the configured ones, plus `EmbedImages`
    /// at the end when requested and not already present.
    fn post_steps(&self, config: &RenderConfig) -> Vec<PostStep> {
        let mut steps = config.post_steps.clone();
        if self.embed_images && !steps.contains(&PostStep::EmbedImages) {
            steps.push(PostStep::EmbedImages);
        }
        steps
    }
}

/// Validate, sanitise, normalise and substitute a document.
///
/// # Errors
/// [`FlyerError::InvalidDocument`] when `document` is not an SVG; nothing
/// else fails here. Unmatched placeholders are left in place.
pub fn render_template(
    document: &str,
    data: &DataDictionary,
    mapping: &FieldMapping,
    options: &RenderOptions,
    config: &RenderConfig,
) -> Result<SubstitutionResult, FlyerError> {
    render_template_with(document, data, mapping, options, config, &Substitutor::new(config))
}

fn render_template_with(
    document: &str,
    data: &DataDictionary,
    mapping: &FieldMapping,
    options: &RenderOptions,
    config: &RenderConfig,
    substitutor: &Substitutor,
) -> Result<SubstitutionResult, FlyerError> {
    check_document(document)?;
    let clean = sanitize_document(document);
    let sized = normalize_dimensions(
        &clean,
        options.width.unwrap_or(config.default_width),
        options.height.unwrap_or(config.default_height),
    );
    let result = substitutor.apply(&sized, data, mapping);
    for w in &result.warnings {
        warn!("{}", w);
    }
    Ok(result)
}

/// Render a single flyer to PNG.
///
/// # Errors
/// Fetch failures and timeouts, invalid templates, and rasteriser failures.
/// Substitution warnings are carried in `output.substitution.warnings`.
pub async fn render_flyer(request: &FlyerRequest, config: &RenderConfig) -> Result<RenderOutput, FlyerError> {
    let fetcher = Fetcher::new(config)?;
    render_with(request, config, &fetcher).await
}

async fn render_with(
    request: &FlyerRequest,
    config: &RenderConfig,
    fetcher: &Fetcher,
) -> Result<RenderOutput, FlyerError> {
    let start = Instant::now();
    info!("Rendering flyer: {}", request.source.describe());

    // ── Step 1: Resolve template ─────────────────────────────────────────
    let template = input::resolve_source(&request.source, fetcher).await?;

    // ── Step 2: Substitute ───────────────────────────────────────────────
    let mut substitutor = Substitutor::new(config);
    if let Some(enabled) = request.bare_word_fallback {
        substitutor = substitutor.with_bare_word_fallback(enabled);
    }
    let mut substitution = render_template_with(
        &template,
        &request.data,
        &request.mapping,
        &request.options,
        config,
        &substitutor,
    )?;
    info!(
        "Substituted {} placeholders ({} found)",
        substitution.replacement_count, substitution.stats.placeholders_found
    );

    // ── Step 3: Post steps ───────────────────────────────────────────────
    let steps = request.post_steps(config);
    let processed = postprocess::apply_post_steps(substitution.document.clone(), &steps, fetcher).await?;

    // ── Step 4: Sanitise at the rasteriser boundary ──────────────────────
    let final_doc = sanitize_document(&processed);
    debug!("Final document: {} bytes", final_doc.len());
    substitution.document = final_doc.clone();

    // ── Step 5: Rasterise ────────────────────────────────────────────────
    let target = RasterTarget::from_options(&request.options, config);
    let image = rasterize::rasterize_blocking(rasterize::rasterizer_for(config), final_doc, target).await?;

    let render_time_ms = start.elapsed().as_millis() as u64;
    info!("Flyer rendered in {}ms", render_time_ms);

    Ok(RenderOutput {
        png: image.png,
        width: image.width,
        height: image.height,
        substitution,
        render_time_ms,
    })
}

/// Render a flyer and write the PNG to `output_path`.
///
/// Uses atomic write (temp file in the target directory + persist) so a
/// crashed render never leaves a truncated PNG behind.
pub async fn render_flyer_to_file(
    request: &FlyerRequest,
    output_path: impl AsRef<Path>,
    config: &RenderConfig,
) -> Result<RenderOutput, FlyerError> {
    let output = render_flyer(request, config).await?;
    let path = output_path.as_ref().to_path_buf();

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&parent)
        .await
        .map_err(|e| FlyerError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    let png = output.png.clone();
    let target = path.clone();
    tokio::task::spawn_blocking(move || -> Result<(), FlyerError> {
        let write_err = |source| FlyerError::OutputWriteFailed {
            path: target.clone(),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
        tmp.write_all(&png).map_err(write_err)?;
        tmp.persist(&target).map_err(|e| write_err(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| FlyerError::Internal(format!("Write task panicked: {}", e)))??;

    info!("Wrote {} ({} bytes)", path.display(), output.size());
    Ok(output)
}

/// Synchronous wrapper around [`render_flyer`].
///
/// Creates a temporary tokio runtime internally.
pub fn render_flyer_sync(request: &FlyerRequest, config: &RenderConfig) -> Result<RenderOutput, FlyerError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| FlyerError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(render_flyer(request, config))
}

/// Render slides one after another, in order.
///
/// Stops at the first failure: the error is wrapped in
/// [`FlyerError::SlideFailed`] with the 1-based slide number and no partial
/// result is returned.
pub async fn render_carousel(
    slides: &[FlyerRequest],
    config: &RenderConfig,
) -> Result<Vec<RenderOutput>, FlyerError> {
    if slides.is_empty() {
        return Err(FlyerError::InvalidRequest("No slides provided".into()));
    }
    let total = slides.len();
    info!("Rendering carousel: {} slides", total);

    let fetcher = Fetcher::new(config)?;
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_batch_start(total);
    }

    let mut outputs = Vec::with_capacity(total);
    for (i, slide) in slides.iter().enumerate() {
        let n = i + 1;
        if let Some(cb) = cb {
            cb.on_slide_start(n, total);
        }
        match render_with(slide, config, &fetcher).await {
            Ok(out) => {
                if let Some(cb) = cb {
                    cb.on_slide_complete(n, total, out.size());
                }
                outputs.push(out);
            }
            Err(e) => {
                warn!("Slide {}/{} failed: {}", n, total, e);
                if let Some(cb) = cb {
                    cb.on_slide_error(n, total, &e.to_string());
                    cb.on_batch_complete(total, outputs.len());
                }
                return Err(FlyerError::SlideFailed {
                    index: n,
                    source: Box::new(e),
                });
            }
        }
    }

    if let Some(cb) = cb {
        cb.on_batch_complete(total, outputs.len());
    }
    info!("Carousel complete: {} slides", total);
    Ok(outputs)
}
