use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{ClassLabel, MODEL_INPUT_SHAPE, ModelMetadata},
    pipeline::{InferencePipeline, PredictionResult},
};

/// Multipart field carrying the upload.
const IMAGE_FIELD: &str = "image";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<InferencePipeline>,
}

#[derive(Serialize)]
struct MetadataResponse {
    labels: Vec<&'static str>,
    input_shape: [usize; 4],
    model: Option<ModelMetadata>,
    load_attempts: usize,
}

pub fn build_router(config: Arc<AppConfig>, pipeline: Arc<InferencePipeline>) -> Router {
    let body_limit = config.max_upload_bytes;
    let state = AppState { config, pipeline };

    Router::new()
        .route("/health", get(health))
        .route("/api/predict", post(predict))
        .route("/metadata", get(metadata))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResult>, ServiceError> {
    let multipart = multipart.map_err(|rejection| {
        warn!(%rejection, "prediction request is not a multipart form");
        ServiceError::NoImage
    })?;
    let image = read_image_field(multipart).await?;

    info!(bytes = image.len(), "classifying upload");
    let result = state.pipeline.predict(image).await?;
    Ok(Json(result))
}

async fn read_image_field(mut multipart: Multipart) -> Result<Vec<u8>, ServiceError> {
    loop {
        let field = multipart.next_field().await.map_err(multipart_failure)?;
        let Some(field) = field else {
            return Err(ServiceError::NoImage);
        };
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let bytes = field.bytes().await.map_err(multipart_failure)?;
        return Ok(bytes.to_vec());
    }
}

fn multipart_failure(err: MultipartError) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!(error = %err, "upload exceeds body limit");
        ServiceError::UnsupportedImage
    } else {
        warn!(error = %err, "malformed multipart body");
        ServiceError::NoImage
    }
}

async fn metadata(State(state): State<AppState>) -> Json<MetadataResponse> {
    let registry = state.pipeline.registry();
    Json(MetadataResponse {
        labels: ClassLabel::ALL.iter().map(|label| label.as_str()).collect(),
        input_shape: MODEL_INPUT_SHAPE,
        model: registry.metadata(),
        load_attempts: registry.load_attempts(),
    })
}
