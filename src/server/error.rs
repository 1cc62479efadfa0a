use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::TranscriptorError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by HTTP handlers
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{} not found", what))
    }
}

pub fn status_for(err: &TranscriptorError) -> StatusCode {
    match err {
        TranscriptorError::MissingInput
        | TranscriptorError::InvalidUrl(_)
        | TranscriptorError::ResolutionExhausted { .. }
        | TranscriptorError::UnsupportedMediaType { .. }
        | TranscriptorError::UpstreamFetchFailed { .. } => StatusCode::BAD_REQUEST,
        TranscriptorError::MediaTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        TranscriptorError::Provider(_) => StatusCode::BAD_GATEWAY,
        TranscriptorError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        TranscriptorError::Storage(_) | TranscriptorError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<TranscriptorError> for ApiError {
    fn from(err: TranscriptorError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!(error = %err, "request_failed");
        } else {
            tracing::warn!(error = %err, "request_rejected");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}
