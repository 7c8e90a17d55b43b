#![allow(dead_code)]

use std::{
    io::Cursor,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use garment_classifier_service::{
    Classifier, ModelLoader,
    error::{InferenceError, ModelLoadError},
    model::{MODEL_INPUT_SHAPE, ModelHandle, ModelMetadata},
    pipeline::PreprocessedInput,
};
use image::{ImageFormat, Rgb, RgbImage};

pub const REFERENCE_LOGITS: [f32; 7] = [2.0, 0.5, 0.1, 0.0, 0.2, 0.1, 0.05];

fn metadata(name: &str) -> ModelMetadata {
    ModelMetadata {
        name: name.into(),
        path: PathBuf::from(format!("fixtures/{name}.pt")),
        backend: "stub",
        size_bytes: 0,
        input_shape: MODEL_INPUT_SHAPE,
    }
}

/// Returns the same logits for every input.
pub struct FixedScores(pub Vec<f32>);

impl Classifier for FixedScores {
    fn metadata(&self) -> ModelMetadata {
        metadata("fixed")
    }

    fn forward(&self, _input: &PreprocessedInput) -> Result<Vec<f32>, InferenceError> {
        Ok(self.0.clone())
    }
}

/// Scores each class from per-channel means so different images score differently.
pub struct ChannelMeans;

impl Classifier for ChannelMeans {
    fn metadata(&self) -> ModelMetadata {
        metadata("channel-means")
    }

    fn forward(&self, input: &PreprocessedInput) -> Result<Vec<f32>, InferenceError> {
        let mut sums = [0.0f32; 3];
        for (idx, value) in input.as_slice().iter().enumerate() {
            sums[idx % 3] += value;
        }
        let n = (input.as_slice().len() / 3) as f32;
        let [r, g, b] = sums.map(|s| s / n);
        Ok(vec![r * 4.0, g * 4.0, b * 4.0, r - g, g - b, b - r, 0.5])
    }
}

/// Declares an input shape the pipeline never produces.
pub struct WrongInputShape;

impl Classifier for WrongInputShape {
    fn metadata(&self) -> ModelMetadata {
        metadata("wrong-shape")
    }

    fn input_shape(&self) -> [usize; 4] {
        [1, 224, 224, 3]
    }

    fn forward(&self, _input: &PreprocessedInput) -> Result<Vec<f32>, InferenceError> {
        Ok(REFERENCE_LOGITS.to_vec())
    }
}

pub struct Slow(pub Duration);

impl Classifier for Slow {
    fn metadata(&self) -> ModelMetadata {
        metadata("slow")
    }

    fn forward(&self, _input: &PreprocessedInput) -> Result<Vec<f32>, InferenceError> {
        std::thread::sleep(self.0);
        Ok(REFERENCE_LOGITS.to_vec())
    }
}

/// Loader that counts its invocations and takes `delay` to finish.
pub fn counting_loader<F>(
    delay: Duration,
    make: F,
) -> (impl ModelLoader + 'static, Arc<AtomicUsize>)
where
    F: Fn() -> Result<ModelHandle, ModelLoadError> + Send + Sync + 'static,
{
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let loader = move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(delay);
        make()
    };
    (loader, calls)
}

pub fn serve(model: impl Classifier + 'static) -> impl ModelLoader + 'static {
    let model: ModelHandle = Arc::new(model);
    move || -> Result<ModelHandle, ModelLoadError> { Ok(model.clone()) }
}

pub fn missing_artifact() -> impl ModelLoader + 'static {
    || -> Result<ModelHandle, ModelLoadError> {
        Err(ModelLoadError::Missing(PathBuf::from("models/absent.pt")))
    }
}

pub fn encode(img: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    });
    encode(&img, ImageFormat::Png)
}

pub fn solid_jpeg(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    encode(&RgbImage::from_pixel(width, height, Rgb(color)), ImageFormat::Jpeg)
}
