//! Error types for the HTTP surface
//!
//! Every failure is a JSON object with an `error` string plus `detail` or
//! `traceback`. A tripped runtime gate reports
//! `"Incompatible tensor runtime version"`, naming the checked runtime
//! (`candle-core`) rather than a numerical-array library.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use neuroscan_core::Error;
use serde_json::json;
use thiserror::Error as ThisError;

/// Failures a request handler can report, one per boundary
#[derive(ThisError, Debug)]
pub enum ApiError {
    /// The compatibility gate tripped at startup
    #[error("incompatible tensor runtime: {0}")]
    Incompatible(String),

    /// The multipart body had no file part
    #[error("missing file upload")]
    MissingFile,

    /// The multipart body could not be read
    #[error("upload error: {message}")]
    Upload { status: StatusCode, message: String },

    /// Uploaded bytes are not a decodable image
    #[error("invalid image file")]
    InvalidImage(#[source] Error),

    /// The classifier could not be constructed
    #[error("failed to initialize classifier")]
    Initialization(#[source] Error),

    /// The forward pass failed
    #[error("model inference failed")]
    Inference(#[source] Error),
}

impl ApiError {
    /// Stable tag used for metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Incompatible(_) => "incompatible",
            Self::MissingFile => "missing_file",
            Self::Upload { .. } => "upload",
            Self::InvalidImage(_) => "invalid_image",
            Self::Initialization(_) => "initialization",
            Self::Inference(_) => "inference",
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Compatibility(msg) => Self::Incompatible(msg),
            Error::ImageDecode(_) => Self::InvalidImage(err),
            Error::Initialization { .. } | Error::ModelLoad(_) | Error::Config(_) => {
                Self::Initialization(err)
            }
            other => Self::Inference(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        metrics::counter!("neuroscan_errors_total", "kind" => self.kind()).increment(1);

        let (status, body) = match &self {
            ApiError::Incompatible(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Incompatible tensor runtime version", "detail": detail }),
            ),
            ApiError::MissingFile => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "Missing file upload",
                    "detail": "expected a multipart/form-data part named 'file'",
                }),
            ),
            ApiError::Upload { status, message } => {
                tracing::warn!(detail = %message, "Upload rejected");
                (*status, json!({ "error": "Invalid upload", "detail": message }))
            }
            ApiError::InvalidImage(e) => {
                let traceback = e.chain();
                tracing::error!("Image load error:\n{}", traceback);
                (
                    StatusCode::BAD_REQUEST,
                    json!({ "error": "Invalid image file", "traceback": traceback }),
                )
            }
            ApiError::Initialization(e) => {
                let traceback = e.chain();
                tracing::error!("Classifier init error:\n{}", traceback);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Failed to initialize classifier", "traceback": traceback }),
                )
            }
            ApiError::Inference(e) => {
                let traceback = e.chain();
                tracing::error!("Inference error:\n{}", traceback);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Model inference failed", "traceback": traceback }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_boundaries() {
        assert!(matches!(
            ApiError::from(Error::image_decode("bad header")),
            ApiError::InvalidImage(_)
        ));
        assert!(matches!(
            ApiError::from(Error::compatibility("too new")),
            ApiError::Incompatible(msg) if msg == "too new"
        ));
        assert!(matches!(
            ApiError::from(Error::model_load("no weights")),
            ApiError::Initialization(_)
        ));
        assert!(matches!(
            ApiError::from(Error::inference("shape mismatch")),
            ApiError::Inference(_)
        ));
    }

    #[test]
    fn test_status_codes() {
        let status = |e: ApiError| e.into_response().status();

        assert_eq!(status(ApiError::Incompatible("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(ApiError::MissingFile), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status(ApiError::InvalidImage(Error::image_decode("x"))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(ApiError::Inference(Error::inference("x"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
