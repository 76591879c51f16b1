//! HTTP API over the render pipeline.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /api/render-flyer` | one flyer, JSON or raw PNG |
//! | `POST /api/render-flyer-advanced` | same, with the bare-word fallback switch |
//! | `POST /api/render-carousel` | several slides, `data:` URLs or a zip |
//! | `GET  /api/health` | liveness |
//!
//! Every response carries no-cache headers, CORS is open to any origin and
//! each request runs inside a span tagged with its `x-request-id`.

mod dto;
mod error;
mod handlers;

pub use dto::{
    CarouselFormat, HealthResponse, ImageFormat, RenderCarouselBody, RenderCarouselResponse,
    RenderFlyerBody, RenderFlyerResponse, RenderMetadata, SlideBody,
};
pub use error::{ApiError, ErrorResponse};

use crate::config::RenderConfig;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::header::{HeaderValue, CACHE_CONTROL, EXPIRES, PRAGMA};
use axum::http::Request;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Largest accepted request body: 50 MiB.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RenderConfig>,
    pub started: Instant,
}

impl AppState {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config: Arc::new(config),
            started: Instant::now(),
        }
    }
}

/// Build the application router with all layers attached.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        let request_id = req
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "request",
            method = %req.method(),
            uri = %req.uri(),
            request_id = %request_id,
        )
    });

    Router::new()
        .route("/api/render-flyer", post(handlers::render_flyer_handler))
        .route("/api/render-flyer-advanced", post(handlers::render_flyer_advanced_handler))
        .route("/api/render-carousel", post(handlers::render_carousel_handler))
        .route("/api/health", get(handlers::health_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(PRAGMA, HeaderValue::from_static("no-cache")))
        .layer(SetResponseHeaderLayer::overriding(EXPIRES, HeaderValue::from_static("0")))
        .layer(trace)
        .layer(cors)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, config: RenderConfig) -> std::io::Result<()> {
    let app = router(AppState::new(config));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    info!("  POST /api/render-flyer");
    info!("  POST /api/render-flyer-advanced");
    info!("  POST /api/render-carousel");
    info!("  GET  /api/health");
    axum::serve(listener, app).await
}
