use image::ImageFormat;
use ndarray::{Array3, Array4};

use crate::{
    error::DecodeError,
    model::{INPUT_CHANNELS, INPUT_SIDE},
    pipeline::{ImageTensor, PreprocessedInput, TensorLedger},
};

const ACCEPTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Bmp,
    ImageFormat::Gif,
];

/// Decodes JPEG, PNG, BMP or GIF bytes into RGB pixels.
///
/// The format is sniffed from the leading bytes, not trusted from the upload.
/// Grayscale and alpha images are converted to three channels; animated GIFs
/// yield their first frame.
pub fn decode(bytes: &[u8], ledger: &TensorLedger) -> Result<ImageTensor, DecodeError> {
    let format = image::guess_format(bytes).map_err(|_| DecodeError::UnsupportedFormat)?;
    if !ACCEPTED_FORMATS.contains(&format) {
        return Err(DecodeError::RejectedFormat(format!("{format:?}")));
    }

    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(DecodeError::Malformed("image has no pixels".into()));
    }

    let pixels = Array3::from_shape_vec(
        (height as usize, width as usize, INPUT_CHANNELS),
        rgb.into_raw(),
    )
    .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    Ok(ImageTensor::new(pixels, ledger))
}

/// Bilinear resize with corner-aligned sampling off and no half-pixel offset:
/// output pixel `(y, x)` samples source coordinate `(y * in_h / out_h, x * in_w / out_w)`
/// and interpolates between the four surrounding pixels, clamping at the
/// bottom and right edges.
pub fn resize_bilinear(pixels: &Array3<u8>, out_h: usize, out_w: usize) -> Array3<f32> {
    let (in_h, in_w, channels) = pixels.dim();
    let scale_y = in_h as f32 / out_h as f32;
    let scale_x = in_w as f32 / out_w as f32;

    let mut out = Array3::<f32>::zeros((out_h, out_w, channels));
    if in_h == 0 || in_w == 0 {
        return out;
    }
    for y in 0..out_h {
        let src_y = y as f32 * scale_y;
        let y0 = (src_y.floor() as usize).min(in_h - 1);
        let y1 = (y0 + 1).min(in_h - 1);
        let dy = src_y - y0 as f32;

        for x in 0..out_w {
            let src_x = x as f32 * scale_x;
            let x0 = (src_x.floor() as usize).min(in_w - 1);
            let x1 = (x0 + 1).min(in_w - 1);
            let dx = src_x - x0 as f32;

            for c in 0..channels {
                let tl = pixels[[y0, x0, c]] as f32;
                let tr = pixels[[y0, x1, c]] as f32;
                let bl = pixels[[y1, x0, c]] as f32;
                let br = pixels[[y1, x1, c]] as f32;

                let top = tl + (tr - tl) * dx;
                let bottom = bl + (br - bl) * dx;
                out[[y, x, c]] = top + (bottom - top) * dy;
            }
        }
    }
    out
}

/// Resizes to the model's fixed 128×128 input, adds the batch dimension and
/// scales pixel values into `[0, 1]`.
pub fn prepare(image: &ImageTensor, ledger: &TensorLedger) -> PreprocessedInput {
    let resized = resize_bilinear(image.pixels(), INPUT_SIDE, INPUT_SIDE);
    let batch = Array4::from_shape_fn(
        (1, INPUT_SIDE, INPUT_SIDE, INPUT_CHANNELS),
        |(_, y, x, c)| (resized[[y, x, c]] / 255.0).clamp(0.0, 1.0),
    );
    PreprocessedInput::new(batch, ledger)
}
