//! HTTP API: the inference endpoint and health reporting.
//!
//! `POST /v1/images/cleanup` accepts a batch of image references, runs them
//! through the hosted model, and answers with the standard response
//! envelope. `GET /health` reports readiness: 200 once the model is loaded,
//! 503 while it is still coming up.

use crate::api::{build_response, gen_request_id, ResponseEnvelope};
use crate::error::{GantryError, Result};
use crate::observability;
use crate::server::ServerHandle;
use crate::task::{GenerationParams, InferenceJob, ItemRef};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct AppState {
    /// Submission handle to the model server.
    pub handle: ServerHandle,
    /// Prefix for generated request identifiers.
    pub api_name: String,
}

/// One image reference in a request: a URI string or inline base64 bytes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ImageSource {
    Uri(String),
    Inline { data: String },
}

impl ImageSource {
    fn into_item(self) -> Result<ItemRef> {
        match self {
            ImageSource::Uri(uri) => Ok(ItemRef::Uri(uri)),
            ImageSource::Inline { data } => base64::engine::general_purpose::STANDARD
                .decode(data.as_bytes())
                .map(ItemRef::Data)
                .map_err(|e| GantryError::InvalidInput(format!("invalid base64 image data: {e}"))),
        }
    }
}

/// Body of `POST /v1/images/cleanup`.
#[derive(Debug, Deserialize)]
pub struct CleanupRequest {
    /// Images to clean, by reference or inline.
    pub images: Vec<ImageSource>,
    /// Optional per-request model parameters.
    #[serde(default)]
    pub params: GenerationParams,
}

/// JSON error body for rejected requests.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    fn response(status: StatusCode, code: &'static str, message: String) -> Response {
        observability::record_api_request(status.as_u16());
        (status, Json(ApiError { code, message })).into_response()
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/images/cleanup", post(cleanup_images))
        .route("/health", get(health))
        .with_state(state)
}

/// Serve the API until the shutdown signal flips.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|triggered| *triggered).await;
        })
        .await
        .map_err(|e| GantryError::Network(e.to_string()))?;

    Ok(())
}

async fn cleanup_images(
    State(state): State<AppState>,
    Json(request): Json<CleanupRequest>,
) -> Response {
    let mut items = Vec::with_capacity(request.images.len());
    for source in request.images {
        match source.into_item() {
            Ok(item) => items.push(item),
            Err(e) => {
                return ApiError::response(StatusCode::BAD_REQUEST, "InvalidRequest", e.to_string())
            }
        }
    }

    let request_id = gen_request_id(&state.api_name);
    info!(request = %request_id, images = items.len(), "inference request accepted");

    let job = InferenceJob::new(items, request.params);
    match state.handle.submit(request_id.clone(), job).await {
        Ok(outcome) => {
            observability::record_api_request(StatusCode::OK.as_u16());
            let envelope: ResponseEnvelope = build_response(&request_id, outcome);
            (StatusCode::OK, Json(envelope)).into_response()
        }
        Err(e) => ApiError::response(
            StatusCode::SERVICE_UNAVAILABLE,
            "ServiceUnavailable",
            e.to_string(),
        ),
    }
}

async fn health(State(state): State<AppState>) -> Response {
    let loaded = state.handle.is_ready();
    let status = if loaded {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = serde_json::json!({
        "status": if loaded { "ok" } else { "loading" },
        "model_loaded": loaded,
    });
    (status, Json(body)).into_response()
}
