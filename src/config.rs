//! Configuration types for template rendering.
//!
//! Service-wide behaviour is controlled through [`RenderConfig`], built via
//! its [`RenderConfigBuilder`]. Per-request knobs (target width, quality) live
//! in [`RenderOptions`] so one config can be shared by every request handler.

use crate::error::FlyerError;
use crate::pipeline::rasterize::Rasterizer;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Default namespace of the dotted placeholder syntax (`dyno.address`).
pub const DEFAULT_NAMESPACE: &str = "dyno";

/// Default ceiling on the substituted document size: 4 MiB.
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 4 * 1024 * 1024;

/// Configuration shared by every render.
///
/// Built via [`RenderConfig::builder()`] or using [`RenderConfig::default()`].
///
/// # Example
/// ```rust
/// use flyer_render::RenderConfig;
///
/// let config = RenderConfig::builder()
///     .namespace("acme")
///     .max_document_bytes(2 * 1024 * 1024)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct RenderConfig {
    /// Prefix of the dotted placeholder syntax. Default: `"dyno"`.
    pub namespace: String,

    /// Replace bare whole-word occurrences of data keys in text content. Default: false.
    ///
    /// A field literally named `title` would otherwise rewrite every "title"
    /// in the artwork, so this stays opt-in.
    pub bare_word_fallback: bool,

    /// Minimum key length (in chars) for the bare-word fallback. Default: 4.
    pub bare_word_min_len: usize,

    /// Size above which a substituted document earns a warning. Default: 4 MiB.
    pub max_document_bytes: usize,

    /// Raster width when the request names none. Default: 1080.
    pub default_width: u32,

    /// Height used for the synthesised `viewBox` when the template has none. Default: 1350.
    pub default_height: u32,

    /// Upper bound on the output raster width in pixels. Default: 4096.
    pub max_width: u32,

    /// Upper bound on the output raster height in pixels. Default: 4096.
    pub max_height: u32,

    /// Fill painted behind the document. Default: white.
    pub background: Background,

    /// Steps applied between substitution and rasterisation. Default: `[Clean]`.
    pub post_steps: Vec<PostStep>,

    /// Timeout for fetching a remote template. Default: 30 s.
    pub document_fetch_timeout_secs: u64,

    /// Timeout for fetching each remote `<image>` when embedding. Default: 15 s.
    pub image_fetch_timeout_secs: u64,

    /// `User-Agent` sent with every fetch.
    pub user_agent: String,

    /// Rasteriser override. `None` uses [`crate::pipeline::rasterize::ResvgRasterizer`].
    pub rasterizer: Option<Arc<dyn Rasterizer>>,

    /// Optional per-slide progress events for carousel renders.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            bare_word_fallback: false,
            bare_word_min_len: 4,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            default_width: 1080,
            default_height: 1350,
            max_width: 4096,
            max_height: 4096,
            background: Background::default(),
            post_steps: vec![PostStep::Clean],
            document_fetch_timeout_secs: 30,
            image_fetch_timeout_secs: 15,
            user_agent: concat!("flyer-render/", env!("CARGO_PKG_VERSION")).to_string(),
            rasterizer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderConfig")
            .field("namespace", &self.namespace)
            .field("bare_word_fallback", &self.bare_word_fallback)
            .field("bare_word_min_len", &self.bare_word_min_len)
            .field("max_document_bytes", &self.max_document_bytes)
            .field("default_width", &self.default_width)
            .field("default_height", &self.default_height)
            .field("max_width", &self.max_width)
            .field("max_height", &self.max_height)
            .field("background", &self.background)
            .field("post_steps", &self.post_steps)
            .field("document_fetch_timeout_secs", &self.document_fetch_timeout_secs)
            .field("image_fetch_timeout_secs", &self.image_fetch_timeout_secs)
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn Rasterizer>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl RenderConfig {
    /// Create a new builder for `RenderConfig`.
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`RenderConfig`].
#[derive(Debug)]
pub struct RenderConfigBuilder {
    config: RenderConfig,
}

impl RenderConfigBuilder {
    pub fn namespace(mut self, ns: impl Into<String>) -> Self {
        self.config.namespace = ns.into();
        self
    }

    pub fn bare_word_fallback(mut self, v: bool) -> Self {
        self.config.bare_word_fallback = v;
        self
    }

    pub fn bare_word_min_len(mut self, n: usize) -> Self {
        self.config.bare_word_min_len = n.max(1);
        self
    }

    pub fn max_document_bytes(mut self, n: usize) -> Self {
        self.config.max_document_bytes = n;
        self
    }

    pub fn default_size(mut self, width: u32, height: u32) -> Self {
        self.config.default_width = width;
        self.config.default_height = height;
        self
    }

    pub fn max_size(mut self, width: u32, height: u32) -> Self {
        self.config.max_width = width;
        self.config.max_height = height;
        self
    }

    pub fn background(mut self, bg: Background) -> Self {
        self.config.background = bg;
        self
    }

    pub fn post_steps(mut self, steps: Vec<PostStep>) -> Self {
        self.config.post_steps = steps;
        self
    }

    pub fn document_fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.document_fetch_timeout_secs = secs;
        self
    }

    pub fn image_fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.image_fetch_timeout_secs = secs;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RenderConfig, FlyerError> {
        let c = &self.config;
        if c.namespace.is_empty() || !c.namespace.chars().all(|ch| ch.is_alphanumeric() || ch == '_') {
            return Err(FlyerError::InvalidConfig(format!(
                "Namespace must be a non-empty identifier, got '{}'",
                c.namespace
            )));
        }
        if c.default_width == 0 || c.default_height == 0 {
            return Err(FlyerError::InvalidConfig(
                "Default size must be at least 1×1".into(),
            ));
        }
        if c.max_width < 16 || c.max_height < 16 {
            return Err(FlyerError::InvalidConfig(format!(
                "Maximum size must be at least 16×16, got {}×{}",
                c.max_width, c.max_height
            )));
        }
        if c.document_fetch_timeout_secs == 0 || c.image_fetch_timeout_secs == 0 {
            return Err(FlyerError::InvalidConfig(
                "Fetch timeouts must be ≥ 1s".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Per-request options ──────────────────────────────────────────────────

/// Per-request render options.
///
/// Every field is optional; `None` falls back to the [`RenderConfig`] value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    /// Target raster width in pixels before the quality scale is applied.
    pub width: Option<u32>,
    /// Requested height; used for the synthesised `viewBox` fallback.
    pub height: Option<u32>,
    /// Caller-side cap on the raster width (never above the config cap).
    pub max_width: Option<u32>,
    /// Caller-side cap on the raster height (never above the config cap).
    pub max_height: Option<u32>,
    /// Resolution multiplier hint.
    #[serde(default)]
    pub quality: QualityHint,
}

impl RenderOptions {
    /// Effective `(max_width, max_height)` after combining request and config caps.
    pub fn bounds(&self, config: &RenderConfig) -> (u32, u32) {
        let w = self.max_width.map_or(config.max_width, |w| w.min(config.max_width));
        let h = self.max_height.map_or(config.max_height, |h| h.min(config.max_height));
        (w.max(1), h.max(1))
    }

    /// Raster width before clamping: requested (or default) width × quality scale.
    pub fn target_width(&self, config: &RenderConfig) -> f32 {
        let base = self.width.unwrap_or(config.default_width).max(1) as f32;
        base * self.quality.scale()
    }
}

/// Resolution multiplier applied on top of the requested width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityHint {
    /// Half resolution; quick previews.
    Draft,
    /// 1× (default).
    #[default]
    Standard,
    /// 2×; print or retina output.
    High,
}

impl QualityHint {
    pub fn scale(self) -> f32 {
        match self {
            QualityHint::Draft => 0.5,
            QualityHint::Standard => 1.0,
            QualityHint::High => 2.0,
        }
    }
}

/// A transformation applied between substitution and rasterisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStep {
    /// Strip the XML declaration, DOCTYPE and comments; trim.
    Clean,
    /// Collapse whitespace runs and drop empty attributes.
    Minify,
    /// Inline remote `<image>` references as base64 `data:` URIs.
    EmbedImages,
}

impl FromStr for PostStep {
    type Err = FlyerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clean" => Ok(PostStep::Clean),
            "minify" | "optimize" => Ok(PostStep::Minify),
            "embed" | "embed_images" | "embed-images" => Ok(PostStep::EmbedImages),
            other => Err(FlyerError::InvalidConfig(format!(
                "Unknown post step '{other}' (expected clean, minify or embed-images)"
            ))),
        }
    }
}

/// Fill painted behind the document before rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Transparent,
    Rgb(u8, u8, u8),
}

impl Default for Background {
    fn default() -> Self {
        Background::Rgb(255, 255, 255)
    }
}

impl FromStr for Background {
    type Err = FlyerError;

    /// Accepts `white`, `black`, `transparent`/`none`, `#rgb` and `#rrggbb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let invalid = || FlyerError::InvalidConfig(format!("Invalid background colour '{s}'"));
        match s.as_str() {
            "white" => return Ok(Background::Rgb(255, 255, 255)),
            "black" => return Ok(Background::Rgb(0, 0, 0)),
            "transparent" | "none" => return Ok(Background::Transparent),
            _ => {}
        }
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        let channel = |h: &str| u8::from_str_radix(h, 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let r = channel(&hex[0..1])?;
                let g = channel(&hex[1..2])?;
                let b = channel(&hex[2..3])?;
                Ok(Background::Rgb(r * 17, g * 17, b * 17))
            }
            6 => Ok(Background::Rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = RenderConfig::default();
        assert_eq!(c.namespace, "dyno");
        assert!(!c.bare_word_fallback);
        assert_eq!(c.max_document_bytes, 4 * 1024 * 1024);
        assert_eq!((c.default_width, c.default_height), (1080, 1350));
        assert_eq!(c.post_steps, vec![PostStep::Clean]);
    }

    #[test]
    fn builder_rejects_bad_namespace() {
        let err = RenderConfig::builder().namespace("dy no").build().unwrap_err();
        assert!(err.to_string().contains("Namespace"));
        assert!(RenderConfig::builder().namespace("").build().is_err());
    }

    #[test]
    fn builder_rejects_tiny_bounds() {
        assert!(RenderConfig::builder().max_size(8, 4096).build().is_err());
    }

    #[test]
    fn request_bounds_never_exceed_config() {
        let config = RenderConfig::builder().max_size(2000, 2000).build().unwrap();
        let opts = RenderOptions {
            max_width: Some(5000),
            max_height: Some(800),
            ..Default::default()
        };
        assert_eq!(opts.bounds(&config), (2000, 800));
    }

    #[test]
    fn target_width_applies_quality_scale() {
        let config = RenderConfig::default();
        let opts = RenderOptions {
            width: Some(600),
            quality: QualityHint::High,
            ..Default::default()
        };
        assert_eq!(opts.target_width(&config), 1200.0);
        assert_eq!(RenderOptions::default().target_width(&config), 1080.0);
    }

    #[test]
    fn parse_background() {
        assert_eq!("white".parse::<Background>().unwrap(), Background::Rgb(255, 255, 255));
        assert_eq!("#f00".parse::<Background>().unwrap(), Background::Rgb(255, 0, 0));
        assert_eq!("#1a2B3c".parse::<Background>().unwrap(), Background::Rgb(0x1a, 0x2b, 0x3c));
        assert_eq!("none".parse::<Background>().unwrap(), Background::Transparent);
        assert!("#12345".parse::<Background>().is_err());
        assert!("chartreuse".parse::<Background>().is_err());
    }

    #[test]
    fn parse_post_step() {
        assert_eq!("Clean".parse::<PostStep>().unwrap(), PostStep::Clean);
        assert_eq!("embed-images".parse::<PostStep>().unwrap(), PostStep::EmbedImages);
        assert_eq!("optimize".parse::<PostStep>().unwrap(), PostStep::Minify);
        assert!("sharpen".parse::<PostStep>().is_err());
    }

    #[test]
    fn quality_deserialises_lowercase() {
        let q: QualityHint = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(q, QualityHint::High);
    }
}
