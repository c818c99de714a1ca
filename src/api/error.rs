//! HTTP mapping of crate errors

use crate::error::HeatforgeError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
}

/// Handler error wrapping `HeatforgeError`
#[derive(Debug)]
pub struct ApiError(pub HeatforgeError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            HeatforgeError::SiteNotFound(_) => StatusCode::NOT_FOUND,
            HeatforgeError::InvalidInteraction(_) => StatusCode::BAD_REQUEST,
            HeatforgeError::Generator(_) | HeatforgeError::Extraction(_) => StatusCode::BAD_GATEWAY,
            HeatforgeError::GeneratorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            HeatforgeError::GeneratorTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match &self.0 {
            HeatforgeError::SiteNotFound(_) => "Site not found",
            HeatforgeError::InvalidInteraction(_) => "Invalid request",
            HeatforgeError::Generator(_) => "Content generation failed",
            HeatforgeError::Extraction(_) => "Generated content could not be parsed",
            HeatforgeError::GeneratorUnavailable(_) => "Content generator unavailable",
            HeatforgeError::GeneratorTimeout(_) => "Content generation timed out",
            _ => "Internal server error",
        }
    }
}

impl From<HeatforgeError> for ApiError {
    fn from(err: HeatforgeError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed ({}): {}", status, self.0);
        } else {
            warn!("Request rejected ({}): {}", status, self.0);
        }

        let body = ErrorBody {
            error: self.title().to_string(),
            details: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
