//! Rasterisation: substituted SVG document → PNG bytes.
//!
//! ## Why spawn_blocking?
//!
//! Parsing, layout and painting are pure CPU work that can take hundreds of
//! milliseconds for a poster-sized flyer. [`rasterize_blocking`] moves it
//! onto tokio's blocking pool so request handlers keep their worker threads.
//!
//! ## Why clamp both edges?
//!
//! The raster width is chosen by the caller, but the height follows the
//! document's aspect ratio. A tall banner requested at 4096 px wide would
//! otherwise allocate a 4096 × 40000 pixmap; both edges are therefore capped
//! and the scale reduced until the whole image fits.

use crate::config::{Background, RenderConfig, RenderOptions};
use crate::error::FlyerError;
use once_cell::sync::Lazy;
use resvg::tiny_skia::{Color, Pixmap, Transform};
use resvg::usvg;
use std::sync::Arc;
use tracing::{debug, info};

/// System fonts, loaded once per process.
static FONTS: Lazy<Arc<usvg::fontdb::Database>> = Lazy::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    debug!("Loaded {} font faces", db.len());
    Arc::new(db)
});

/// What the caller wants out of a rasterisation.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterTarget {
    /// Desired output width in pixels, before clamping.
    pub width: f32,
    pub max_width: u32,
    pub max_height: u32,
    pub background: Background,
}

impl RasterTarget {
    /// Combine request options with the service-wide limits.
    pub fn from_options(options: &RenderOptions, config: &RenderConfig) -> Self {
        let (max_width, max_height) = options.bounds(config);
        Self {
            width: options.target_width(config),
            max_width,
            max_height,
            background: config.background,
        }
    }
}

/// An encoded PNG and its pixel size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Converts a document into a PNG.
///
/// Implementations must not touch the network or the local disk; remote
/// images are inlined beforehand by the `EmbedImages` post step.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, document: &str, target: &RasterTarget) -> Result<RasterImage, FlyerError>;
}

/// Output pixel size and scale for a `doc_width` × `doc_height` document.
///
/// Preserves aspect ratio; never exceeds the target's bounds; never below 1 px.
pub fn fit_dimensions(doc_width: f32, doc_height: f32, target: &RasterTarget) -> (u32, u32, f32) {
    let doc_width = doc_width.max(1.0);
    let doc_height = doc_height.max(1.0);

    let mut scale = target.width.max(1.0) / doc_width;
    let max_w = target.max_width.max(1) as f32;
    let max_h = target.max_height.max(1) as f32;
    if doc_width * scale > max_w {
        scale = max_w / doc_width;
    }
    if doc_height * scale > max_h {
        scale = max_h / doc_height;
    }

    let width = ((doc_width * scale).round() as u32).clamp(1, target.max_width.max(1));
    let height = ((doc_height * scale).round() as u32).clamp(1, target.max_height.max(1));
    (width, height, scale)
}

/// Default rasteriser backed by resvg.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResvgRasterizer;

impl Rasterizer for ResvgRasterizer {
    fn rasterize(&self, document: &str, target: &RasterTarget) -> Result<RasterImage, FlyerError> {
        let mut opt = usvg::Options::default();
        opt.fontdb = Arc::clone(&FONTS);
        opt.image_href_resolver = inline_images_only();

        let tree = usvg::Tree::from_str(document, &opt).map_err(|e| FlyerError::RasterizationFailed {
            detail: e.to_string(),
        })?;

        let size = tree.size();
        let (width, height, scale) = fit_dimensions(size.width(), size.height(), target);
        debug!(
            "Document {}x{} → raster {}x{} (scale {:.3})",
            size.width(),
            size.height(),
            width,
            height,
            scale
        );

        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| FlyerError::RasterizationFailed {
            detail: format!("cannot allocate a {width}x{height} pixmap"),
        })?;
        if let Background::Rgb(r, g, b) = target.background {
            pixmap.fill(Color::from_rgba8(r, g, b, 255));
        }

        resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

        let png = pixmap.encode_png().map_err(|e| FlyerError::RasterizationFailed {
            detail: format!("PNG encoding failed: {e}"),
        })?;

        Ok(RasterImage { png, width, height })
    }
}

/// Image resolver that decodes `data:` URIs and refuses every other href.
///
/// usvg's default resolver reads plain hrefs from the local disk. Remote
/// images are inlined by the `EmbedImages` post step before this point, so
/// anything still referenced by path or URL is dropped from the raster.
fn inline_images_only<'a>() -> usvg::ImageHrefResolver<'a> {
    usvg::ImageHrefResolver {
        resolve_data: usvg::ImageHrefResolver::default_data_resolver(),
        resolve_string: Box::new(|href: &str, _opts: &usvg::Options| {
            debug!("Ignoring non-inline image href: {}", href);
            None
        }),
    }
}

/// Run `rasterizer` on the blocking pool.
pub async fn rasterize_blocking(
    rasterizer: Arc<dyn Rasterizer>,
    document: String,
    target: RasterTarget,
) -> Result<RasterImage, FlyerError> {
    let image = tokio::task::spawn_blocking(move || rasterizer.rasterize(&document, &target))
        .await
        .map_err(|e| FlyerError::Internal(format!("Render task panicked: {}", e)))??;
    info!(
        "Rasterised {}x{} PNG ({} bytes)",
        image.width,
        image.height,
        image.png.len()
    );
    Ok(image)
}

/// The configured rasteriser, or [`ResvgRasterizer`].
pub fn rasterizer_for(config: &RenderConfig) -> Arc<dyn Rasterizer> {
    config
        .rasterizer
        .clone()
        .unwrap_or_else(|| Arc::new(ResvgRasterizer))
}
