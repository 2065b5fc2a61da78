//! HTTP inbound adapter.
//!
//! `POST /add-watermark` takes `{ "videoUrl", "username" }` and answers with
//! the pipeline's JSON outcome. `GET /health` is a liveness probe.

use crate::application::pipeline::PipelineService;
use crate::domain::request::WatermarkRequest;
use crate::ports::command::CommandRunner;
use crate::ports::storage::StoragePort;
use crate::ports::watermark::WatermarkRenderer;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub fn router<S, C, W>(service: Arc<PipelineService<S, C, W>>) -> Router
where
    S: StoragePort + 'static,
    C: CommandRunner + 'static,
    W: WatermarkRenderer + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/add-watermark", post(add_watermark::<S, C, W>))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn add_watermark<S, C, W>(
    State(service): State<Arc<PipelineService<S, C, W>>>,
    body: Bytes,
) -> Response
where
    S: StoragePort + 'static,
    C: CommandRunner + 'static,
    W: WatermarkRenderer + 'static,
{
    let request: WatermarkRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("invalid request body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": "Invalid request body", "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let report = service.handle(&request).await;
    let status = StatusCode::from_u16(report.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(report.body)).into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
