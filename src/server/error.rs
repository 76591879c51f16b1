//! Mapping library errors onto HTTP responses.

use crate::error::FlyerError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

/// Body of every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Handler error: a [`FlyerError`] rendered as `{success: false, error}`.
#[derive(Debug)]
pub struct ApiError(pub FlyerError);

impl From<FlyerError> for ApiError {
    fn from(e: FlyerError) -> Self {
        ApiError(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(FlyerError::InvalidRequest(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }
        (
            status,
            Json(ErrorResponse {
                success: false,
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_error_kind() {
        let timeout = ApiError(FlyerError::Timeout {
            url: "https://cdn.test/a.svg".into(),
            secs: 30,
        })
        .into_response();
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);

        let bad = ApiError(FlyerError::InvalidRequest("svgUrl or svgContent is required".into()))
            .into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }
}
