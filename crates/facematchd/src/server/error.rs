use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_typed_multipart::TypedMultipartError;
use facematch_core::{DecodeError, SourceError};
use thiserror::Error;

use super::types::ErrorBody;
use crate::engine::EngineError;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// API error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Both image1 and image2 are required")]
    MissingImages,
    #[error("invalid multipart body: {0}")]
    InvalidMultipart(String),
    #[error("request body is too large")]
    PayloadTooLarge,
    #[error("{field}: {source}")]
    Decode {
        field: &'static str,
        #[source]
        source: DecodeError,
    },
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingImages | Self::InvalidMultipart(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingImages | Self::InvalidMultipart(_) | Self::PayloadTooLarge => "invalid_input",
            Self::Decode { .. } => "decode_error",
            _ => "processing_failure",
        }
    }
}

impl From<TypedMultipartError> for AppError {
    fn from(err: TypedMultipartError) -> Self {
        match err {
            // not multipart at all: neither image is there
            TypedMultipartError::InvalidRequest { .. } => Self::MissingImages,
            TypedMultipartError::InvalidRequestBody { source }
                if source.status() == StatusCode::PAYLOAD_TOO_LARGE =>
            {
                Self::PayloadTooLarge
            }
            other => Self::InvalidMultipart(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "compare failed");
        } else {
            tracing::warn!(error = %self, "rejected compare request");
        }

        let body = ErrorBody { error: self.to_string(), kind: self.kind().to_string() };
        (status, Json(body)).into_response()
    }
}
