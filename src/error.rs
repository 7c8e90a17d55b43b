use std::{path::PathBuf, time::Duration};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Which side of the boundary caused a failed prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Client,
    Server,
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("no image provided")]
    Missing,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported image format")]
    UnsupportedFormat,
    #[error("image format {0} is not accepted")]
    RejectedFormat(String),
    #[error("malformed image: {0}")]
    Malformed(String),
}

/// Cloneable so a single failed attempt can be reported to every waiter.
#[derive(Debug, Clone, Error)]
pub enum ModelLoadError {
    #[error("model artifact missing: {}", .0.display())]
    Missing(PathBuf),
    #[error("failed to read model artifact {}: {reason}", .path.display())]
    Io { path: PathBuf, reason: String },
    #[error("model artifact rejected: {0}")]
    Invalid(String),
    #[error("model loader task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("input shape {actual:?} does not match model input {expected:?}")]
    InputShape {
        expected: [usize; 4],
        actual: [usize; 4],
    },
    #[error("model produced {actual} scores, expected {expected}")]
    OutputLength { expected: usize, actual: usize },
    #[error("model produced a non-finite score at index {0}")]
    NonFinite(usize),
    #[error("forward pass failed: {0}")]
    Runtime(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("prediction timed out after {0:?}")]
    Timeout(Duration),
}

impl PipelineError {
    pub fn fault(&self) -> Fault {
        match self {
            PipelineError::Input(_) | PipelineError::Decode(_) => Fault::Client,
            PipelineError::ModelLoad(_)
            | PipelineError::Inference(_)
            | PipelineError::Timeout(_) => Fault::Server,
        }
    }
}

/// Caller-visible failure. Carries no internal detail.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no image provided")]
    NoImage,
    #[error("unsupported image format")]
    UnsupportedImage,
    #[error("failed to load model")]
    ModelUnavailable,
    #[error("failed to process image")]
    ProcessingFailed,
}

impl From<PipelineError> for ServiceError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Input(InputError::Missing) => ServiceError::NoImage,
            PipelineError::Decode(_) => ServiceError::UnsupportedImage,
            PipelineError::ModelLoad(_) => ServiceError::ModelUnavailable,
            PipelineError::Inference(_) | PipelineError::Timeout(_) => {
                ServiceError::ProcessingFailed
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match self {
            ServiceError::NoImage | ServiceError::UnsupportedImage => StatusCode::BAD_REQUEST,
            ServiceError::ModelUnavailable | ServiceError::ProcessingFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
