use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use tch::{Device, Kind, Tensor, no_grad};

use crate::{
    error::{InferenceError, ModelLoadError},
    model::{Classifier, MODEL_INPUT_SHAPE, ModelHandle, ModelLoader, ModelMetadata},
    pipeline::PreprocessedInput,
};

/// Loads a traced TorchScript classifier taking NHWC `[1, 128, 128, 3]` input.
pub struct TorchScriptLoader {
    module_path: PathBuf,
    device: Device,
}

impl TorchScriptLoader {
    pub fn new(module_path: impl Into<PathBuf>, device: Device) -> Self {
        Self {
            module_path: module_path.into(),
            device,
        }
    }
}

impl ModelLoader for TorchScriptLoader {
    fn load(&self) -> Result<ModelHandle, ModelLoadError> {
        let model = TorchScriptClassifier::new(&self.module_path, self.device)?;
        Ok(Arc::new(model))
    }
}

pub struct TorchScriptClassifier {
    metadata: ModelMetadata,
    device: Device,
    // CModule is not Sync; forward passes on one module are serialized.
    module: Mutex<tch::CModule>,
}

impl TorchScriptClassifier {
    pub fn new(module_path: &Path, device: Device) -> Result<Self, ModelLoadError> {
        if !module_path.exists() {
            return Err(ModelLoadError::Missing(module_path.to_path_buf()));
        }
        let size_bytes = fs::metadata(module_path)
            .map_err(|e| ModelLoadError::Io {
                path: module_path.to_path_buf(),
                reason: e.to_string(),
            })?
            .len();
        let mut module = tch::CModule::load_on_device(module_path, device)
            .map_err(|e| ModelLoadError::Invalid(e.to_string()))?;
        module.set_eval();

        let name = module_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("classifier")
            .to_string();

        Ok(Self {
            metadata: ModelMetadata {
                name,
                path: module_path.to_path_buf(),
                backend: "torchscript",
                size_bytes,
                input_shape: MODEL_INPUT_SHAPE,
            },
            device,
            module: Mutex::new(module),
        })
    }
}

impl Classifier for TorchScriptClassifier {
    fn metadata(&self) -> ModelMetadata {
        self.metadata.clone()
    }

    fn forward(&self, input: &PreprocessedInput) -> Result<Vec<f32>, InferenceError> {
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();

        no_grad(|| {
            let tensor = Tensor::from_slice(input.as_slice())
                .reshape(shape.as_slice())
                .to(self.device);

            let output = {
                let module = self.module.lock();
                module
                    .forward_ts(&[tensor])
                    .map_err(|e| InferenceError::Runtime(e.to_string()))?
            };

            // [1, classes] or [classes]; anything else is a broken artifact.
            let dims = output.size();
            if dims.len() > 2 || (dims.len() == 2 && dims[0] != 1) {
                return Err(InferenceError::Runtime(format!(
                    "unexpected output shape {dims:?}"
                )));
            }

            let flat = output
                .to_device(Device::Cpu)
                .to_kind(Kind::Float)
                .flatten(0, -1);
            Vec::<f32>::try_from(&flat).map_err(|e| InferenceError::Runtime(e.to_string()))
        })
    }
}
