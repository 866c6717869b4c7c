//! API error type and JSON error response formatting.
//!
//! Malformed multipart input is a 400; every pipeline failure surfaces as a
//! single generic 500 carrying the underlying error's message as detail —
//! there is deliberately no finer taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use tabletalk_core::error::TabletalkError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code ("bad_request" or "internal_error").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error mapped to an HTTP status and JSON body.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or malformed request fields.
    BadRequest(String),
    /// 500 Internal Server Error - any pipeline failure.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<TabletalkError> for ApiError {
    fn from(err: TabletalkError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
