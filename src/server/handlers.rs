//! Route handlers.

use super::dto::{
    CarouselFormat, HealthResponse, ImageFormat, RenderCarouselBody, RenderCarouselResponse,
    RenderFlyerBody, RenderFlyerResponse,
};
use super::error::ApiError;
use super::AppState;
use crate::output::RenderOutput;
use crate::pipeline::encode;
use crate::render::{render_carousel, render_flyer, FlyerRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::info;

/// POST /api/render-flyer
pub async fn render_flyer_handler(
    State(state): State<AppState>,
    body: Result<Json<RenderFlyerBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let format = body.format;
    let request = body.into_request()?;
    respond_single(&state, &request, format).await
}

/// POST /api/render-flyer-advanced
///
/// Same contract as `/api/render-flyer`, plus `bareWordFallback`.
pub async fn render_flyer_advanced_handler(
    State(state): State<AppState>,
    body: Result<Json<RenderFlyerBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let format = body.format;
    let bare_words = body.bare_word_fallback;
    let mut request = body.into_request()?;
    request.bare_word_fallback = bare_words;
    respond_single(&state, &request, format).await
}

async fn respond_single(
    state: &AppState,
    request: &FlyerRequest,
    format: ImageFormat,
) -> Result<Response, ApiError> {
    let output = render_flyer(request, &state.config).await?;
    info!(
        "Rendered {}x{} flyer, {} fields, {}ms",
        output.width, output.height, output.substitution.replacement_count, output.render_time_ms
    );
    Ok(match format {
        ImageFormat::Png => png_response(output),
        ImageFormat::Base64 => Json(RenderFlyerResponse::from(&output)).into_response(),
    })
}

fn png_response(output: RenderOutput) -> Response {
    ([(CONTENT_TYPE, "image/png")], output.png).into_response()
}

/// POST /api/render-carousel
pub async fn render_carousel_handler(
    State(state): State<AppState>,
    body: Result<Json<RenderCarouselBody>, JsonRejection>,
) -> Result<Json<RenderCarouselResponse>, ApiError> {
    let Json(body) = body?;
    let format = body.format;
    let requests = body.into_requests()?;
    let outputs = render_carousel(&requests, &state.config).await?;

    let response = match format {
        CarouselFormat::Array => RenderCarouselResponse {
            success: true,
            count: outputs.len(),
            images: Some(outputs.iter().map(|o| encode::to_data_url(&o.png)).collect()),
            zip_base64: None,
        },
        CarouselFormat::Zip => {
            let pngs: Vec<&[u8]> = outputs.iter().map(|o| o.png.as_slice()).collect();
            let archive = encode::zip_slides(&pngs)?;
            RenderCarouselResponse {
                success: true,
                count: outputs.len(),
                images: None,
                zip_base64: Some(encode::data_url("application/zip", &archive)),
            }
        }
    };
    Ok(Json(response))
}

/// GET /api/health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}
