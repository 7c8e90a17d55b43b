use std::sync::Arc;

use crate::{
    error::{InferenceError, ModelLoadError},
    model::{MODEL_INPUT_SHAPE, ModelMetadata},
    pipeline::PreprocessedInput,
};

/// Shared, read-only handle to a loaded classifier.
pub type ModelHandle = Arc<dyn Classifier>;

/// A loaded model able to score one preprocessed image.
///
/// Implementations must be safe to call from several blocking threads at
/// once; the registry hands the same instance to every request.
pub trait Classifier: Send + Sync {
    fn metadata(&self) -> ModelMetadata;

    /// Input shape the artifact declares, batch dimension first.
    fn input_shape(&self) -> [usize; 4] {
        MODEL_INPUT_SHAPE
    }

    /// Runs a forward pass and returns the raw scores for the single batch element.
    fn forward(&self, input: &PreprocessedInput) -> Result<Vec<f32>, InferenceError>;
}

/// Produces a classifier from its artifact. Called on the blocking pool.
pub trait ModelLoader: Send + Sync {
    fn load(&self) -> Result<ModelHandle, ModelLoadError>;
}

impl<F> ModelLoader for F
where
    F: Fn() -> Result<ModelHandle, ModelLoadError> + Send + Sync,
{
    fn load(&self) -> Result<ModelHandle, ModelLoadError> {
        self()
    }
}
