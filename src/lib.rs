pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod server;

pub use config::AppConfig;
pub use error::{Fault, PipelineError, ServiceError};
pub use model::{ClassLabel, Classifier, ModelLoader, ModelRegistry};
pub use pipeline::{InferencePipeline, PredictionResult};
pub use server::build_router;
