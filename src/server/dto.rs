//! Request and response bodies of the HTTP API.
//!
//! Field names are camelCase on the wire to match the web clients.

use crate::config::{QualityHint, RenderOptions};
use crate::data::{DataDictionary, FieldMapping};
use crate::error::FlyerError;
use crate::output::RenderOutput;
use crate::pipeline::encode;
use crate::pipeline::input::TemplateSource;
use crate::render::FlyerRequest;
use serde::{Deserialize, Serialize};

/// How a single flyer is returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// JSON with a `data:` URL and plain base64.
    #[default]
    Base64,
    /// Raw `image/png` body.
    Png,
}

/// How a carousel is returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarouselFormat {
    /// One `data:` URL per slide.
    #[default]
    Array,
    /// A single zip archive as a `data:` URL.
    Zip,
}

/// `POST /api/render-flyer` and `/api/render-flyer-advanced`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFlyerBody {
    pub svg_url: Option<String>,
    pub svg_content: Option<String>,
    pub data: Option<DataDictionary>,
    #[serde(default, alias = "fieldMapping")]
    pub field_mappings: FieldMapping,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    #[serde(default)]
    pub format: ImageFormat,
    #[serde(default)]
    pub quality: QualityHint,
    #[serde(default)]
    pub embed_images: bool,
    /// Honoured by the advanced endpoint only.
    pub bare_word_fallback: Option<bool>,
}

impl RenderFlyerBody {
    /// Build the library request. `svgContent` wins when both sources are set.
    pub fn into_request(self) -> Result<FlyerRequest, FlyerError> {
        let source = template_source(self.svg_url, self.svg_content)?;
        let data = self
            .data
            .ok_or_else(|| FlyerError::InvalidRequest("data object is required".into()))?;
        Ok(FlyerRequest {
            source,
            data,
            mapping: self.field_mappings,
            options: RenderOptions {
                width: self.width,
                height: self.height,
                max_width: self.max_width,
                max_height: self.max_height,
                quality: self.quality,
            },
            embed_images: self.embed_images,
            bare_word_fallback: None,
        })
    }
}

fn template_source(url: Option<String>, content: Option<String>) -> Result<TemplateSource, FlyerError> {
    match (url, content) {
        (_, Some(content)) if !content.trim().is_empty() => Ok(TemplateSource::Inline(content)),
        (Some(url), _) if !url.trim().is_empty() => Ok(TemplateSource::Url(url.trim().to_string())),
        _ => Err(FlyerError::InvalidRequest(
            "svgUrl or svgContent is required".into(),
        )),
    }
}

/// Size and timing of a rendered image.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderMetadata {
    /// PNG size in bytes.
    pub size: usize,
    pub width: u32,
    pub height: u32,
    pub render_time_ms: u64,
    pub placeholders_found: usize,
}

/// Successful single-flyer JSON response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFlyerResponse {
    pub success: bool,
    /// `data:image/png;base64,…`
    pub image_url: String,
    /// Same payload without the `data:` prefix.
    pub image_base64: String,
    pub fields_processed: usize,
    pub warnings: Vec<String>,
    pub metadata: RenderMetadata,
}

impl From<&RenderOutput> for RenderFlyerResponse {
    fn from(out: &RenderOutput) -> Self {
        let image_base64 = encode::to_base64(&out.png);
        Self {
            success: true,
            image_url: format!("data:image/png;base64,{image_base64}"),
            image_base64,
            fields_processed: out.substitution.replacement_count,
            warnings: out.substitution.warnings.iter().map(ToString::to_string).collect(),
            metadata: RenderMetadata {
                size: out.size(),
                width: out.width,
                height: out.height,
                render_time_ms: out.render_time_ms,
                placeholders_found: out.substitution.stats.placeholders_found,
            },
        }
    }
}

/// One slide of a carousel request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideBody {
    pub svg_url: Option<String>,
    pub svg_content: Option<String>,
    #[serde(default)]
    pub data: DataDictionary,
    #[serde(default, alias = "fieldMapping")]
    pub field_mappings: FieldMapping,
}

/// `POST /api/render-carousel`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderCarouselBody {
    #[serde(default)]
    pub slides: Vec<SlideBody>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(default)]
    pub quality: QualityHint,
    #[serde(default)]
    pub format: CarouselFormat,
    #[serde(default)]
    pub embed_images: bool,
}

impl RenderCarouselBody {
    /// One library request per slide, sharing the batch-wide size options.
    ///
    /// A slide without a template fails the whole batch up front, naming the
    /// slide.
    pub fn into_requests(self) -> Result<Vec<FlyerRequest>, FlyerError> {
        if self.slides.is_empty() {
            return Err(FlyerError::InvalidRequest(
                "slides array is required and must not be empty".into(),
            ));
        }
        let options = RenderOptions {
            width: self.width,
            height: self.height,
            quality: self.quality,
            ..Default::default()
        };
        self.slides
            .into_iter()
            .enumerate()
            .map(|(i, slide)| {
                let source = template_source(slide.svg_url, slide.svg_content).map_err(|e| {
                    FlyerError::SlideFailed {
                        index: i + 1,
                        source: Box::new(e),
                    }
                })?;
                Ok(FlyerRequest {
                    source,
                    data: slide.data,
                    mapping: slide.field_mappings,
                    options: options.clone(),
                    embed_images: self.embed_images,
                    bare_word_fallback: None,
                })
            })
            .collect()
    }
}

/// Successful carousel response; exactly one of `images` / `zip_base64` is set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderCarouselResponse {
    pub success: bool,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_base64: Option<String>,
}

/// `GET /api/health`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}
