//! HTTP mapping of service errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::errors::SailtrackError;
use crate::render::RenderError;

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around `SailtrackError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub SailtrackError);

impl From<SailtrackError> for ApiError {
    fn from(err: SailtrackError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn classify(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            SailtrackError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            SailtrackError::UnprocessableData(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable_data")
            }
            SailtrackError::InvalidMmsi(_) => (StatusCode::BAD_REQUEST, "invalid_mmsi"),
            SailtrackError::RenderError(
                RenderError::InvalidSize { .. } | RenderError::UnknownColorScheme(_),
            ) => (StatusCode::BAD_REQUEST, "invalid_map_options"),
            SailtrackError::RenderError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "render_error"),
            SailtrackError::StorageError(_) | SailtrackError::SchemaError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.classify();

        if status.is_server_error() {
            error!(error = ?self.0, "request failed");
        }

        let message = match &self.0 {
            SailtrackError::NotFound => "No data for MMSI".to_string(),
            // Internal details stay in the log
            _ if status.is_server_error() => error_code.replace('_', " "),
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: error_code,
            message,
        };

        (status, Json(body)).into_response()
    }
}
