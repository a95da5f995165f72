//! HTTP routes and handlers

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use neuroscan_classifiers::decode_image;
use neuroscan_core::{Error, Prediction};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, Instrument};

use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Multipart field carrying the image
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predictions: Vec<Prediction>,
}

/// Status message, or the gate diagnostic when the runtime is incompatible
pub async fn root(State(state): State<AppState>) -> Result<impl IntoResponse> {
    metrics::counter!("neuroscan_requests_total", "endpoint" => "root").increment(1);
    ensure_compatible(&state)?;

    Ok(Json(json!({
        "message": format!("NeuroScan API running (model: {})", state.classifier.model_id()),
    })))
}

/// Liveness and readiness summary
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "model": state.classifier.model_id(),
        "model_loaded": state.classifier.is_ready(),
        "runtime_compatible": !state.gate.is_incompatible(),
        "runtime_version": state.gate.detected_version(),
    }))
}

/// Prometheus exposition
pub async fn metrics(State(state): State<AppState>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// Classify an uploaded image
pub async fn predict(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PredictResponse>> {
    metrics::counter!("neuroscan_requests_total", "endpoint" => "predict").increment(1);

    // Checked before the body is read, so nothing is decoded or loaded
    ensure_compatible(&state)?;

    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("predict", %request_id);

    async move {
        let (file_name, contents) = read_upload(multipart).await?;
        debug!(file = %file_name, bytes = contents.len(), "Received upload");

        let image = tokio::task::spawn_blocking(move || decode_image(&contents))
            .await
            .map_err(|e| ApiError::Inference(Error::internal(format!("Decode task failed: {}", e))))?
            .map_err(ApiError::from)?;

        let classifier = state.classifier.get().await.map_err(ApiError::from)?;

        let predictions = classifier
            .classify(image, state.top_k())
            .await
            .map_err(ApiError::Inference)?;

        info!(
            top = predictions.first().map(|p| p.label.as_str()).unwrap_or("-"),
            count = predictions.len(),
            "Prediction complete"
        );
        Ok(Json(PredictResponse { predictions }))
    }
    .instrument(span)
    .await
}

fn ensure_compatible(state: &AppState) -> Result<()> {
    if state.gate.is_incompatible() {
        return Err(ApiError::Incompatible(state.gate.message().to_string()));
    }
    Ok(())
}

/// Read the bytes of the `file` part, skipping any other parts
async fn read_upload(mut multipart: Multipart) -> Result<(String, Bytes)> {
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(FILE_FIELD) {
            debug!(field = ?field.name(), "Skipping multipart field");
            continue;
        }

        let file_name = field.file_name().unwrap_or(FILE_FIELD).to_string();
        let data = field.bytes().await.map_err(upload_error)?;
        return Ok((file_name, data));
    }

    Err(ApiError::MissingFile)
}

/// Oversized bodies keep 413; any other unreadable multipart is a 422
fn upload_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    let status = match err.status() {
        StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    ApiError::Upload {
        status,
        message: err.body_text(),
    }
}
