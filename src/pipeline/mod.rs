//! Single-image inference: decode, preprocess, forward pass, softmax, report.

mod postprocess;
mod preprocess;
mod tensor;

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::task;
use tracing::{debug, warn};

use crate::{
    error::{DecodeError, InferenceError, InputError, PipelineError},
    model::ModelRegistry,
};

pub use postprocess::{
    ClassProbability, PredictionResult, argmax, normalize_confidence, softmax,
};
pub use preprocess::{decode, prepare, resize_bilinear};
pub use tensor::{ImageTensor, Probabilities, PreprocessedInput, RawScores, TensorLedger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decode,
    LoadModel,
    Forward,
    Postprocess,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Decode => "decode",
            Stage::LoadModel => "load_model",
            Stage::Forward => "forward",
            Stage::Postprocess => "postprocess",
        })
    }
}

pub struct InferencePipeline {
    registry: Arc<ModelRegistry>,
    ledger: TensorLedger,
    timeout: Duration,
}

impl InferencePipeline {
    pub fn new(registry: Arc<ModelRegistry>, timeout: Duration) -> Self {
        Self {
            registry,
            ledger: TensorLedger::new(),
            timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Intermediate tensors currently alive across all in-flight requests.
    pub fn live_tensors(&self) -> usize {
        self.ledger.live()
    }

    /// Classifies one encoded image.
    ///
    /// Either a complete result or a single error is returned. On timeout the
    /// request is abandoned; blocking work already handed to the pool finishes
    /// and drops its tensors on its own.
    pub async fn predict(&self, image: Vec<u8>) -> Result<PredictionResult, PipelineError> {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.run(image)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.timeout, "prediction timed out");
                Err(PipelineError::Timeout(self.timeout))
            }
        };

        if let Ok(prediction) = &result {
            debug!(
                class = %prediction.top_class,
                confidence = prediction.top_confidence,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "prediction complete"
            );
        }
        result
    }

    async fn run(&self, image: Vec<u8>) -> Result<PredictionResult, PipelineError> {
        if image.is_empty() {
            return Err(failed(Stage::Decode, InputError::Missing));
        }

        let ledger = self.ledger.clone();
        let input = task::spawn_blocking(move || -> Result<PreprocessedInput, DecodeError> {
            let decoded = decode(&image, &ledger)?;
            Ok(prepare(&decoded, &ledger))
        })
        .await
        .map_err(|err| failed(Stage::Decode, task_failed(err)))?
        .map_err(|err| failed(Stage::Decode, err))?;

        let model = self
            .registry
            .get()
            .await
            .map_err(|err| failed(Stage::LoadModel, err))?;

        let expected = model.input_shape();
        if input.shape() != expected {
            return Err(failed(
                Stage::Forward,
                InferenceError::InputShape {
                    expected,
                    actual: input.shape(),
                },
            ));
        }

        let ledger = self.ledger.clone();
        let scores = task::spawn_blocking(move || {
            let raw = model.forward(&input)?;
            drop(input);
            postprocess::validate_scores(raw, &ledger)
        })
        .await
        .map_err(|err| failed(Stage::Forward, task_failed(err)))?
        .map_err(|err| failed(Stage::Forward, err))?;

        let probs = postprocess::probabilities(&scores, &self.ledger);
        drop(scores);
        postprocess::assemble(&probs).map_err(|err| failed(Stage::Postprocess, err))
    }
}

fn task_failed(err: task::JoinError) -> InferenceError {
    InferenceError::Runtime(format!("pipeline task failed: {err}"))
}

fn failed(stage: Stage, err: impl Into<PipelineError>) -> PipelineError {
    let err = err.into();
    warn!(%stage, fault = ?err.fault(), error = %err, "prediction stage failed");
    err
}
