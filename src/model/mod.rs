mod loader;
mod registry;
mod types;

#[cfg(feature = "tch-backend")]
pub mod tch_backend;

pub use loader::{Classifier, ModelHandle, ModelLoader};
pub use registry::ModelRegistry;
pub use types::{ClassLabel, INPUT_CHANNELS, INPUT_SIDE, MODEL_INPUT_SHAPE, ModelMetadata};
