//! Per-request intermediate tensors.
//!
//! Every tensor holds a [`Lease`] on the pipeline's [`TensorLedger`]. The
//! lease is returned when the tensor is dropped, so the ledger's live count
//! goes back to its baseline once a request finishes on any path.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use ndarray::{Array3, Array4};

/// Counts intermediate tensors that are currently alive.
#[derive(Debug, Clone, Default)]
pub struct TensorLedger {
    live: Arc<AtomicUsize>,
}

impl TensorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn lease(&self) -> Lease {
        self.live.fetch_add(1, Ordering::SeqCst);
        Lease {
            live: self.live.clone(),
        }
    }
}

#[derive(Debug)]
struct Lease {
    live: Arc<AtomicUsize>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Decoded RGB pixels, height × width × channels.
#[derive(Debug)]
pub struct ImageTensor {
    pixels: Array3<u8>,
    _lease: Lease,
}

impl ImageTensor {
    pub(crate) fn new(pixels: Array3<u8>, ledger: &TensorLedger) -> Self {
        Self {
            pixels,
            _lease: ledger.lease(),
        }
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn channels(&self) -> usize {
        self.pixels.dim().2
    }

    pub fn pixels(&self) -> &Array3<u8> {
        &self.pixels
    }
}

/// Model-ready batch of one image, values in `[0, 1]`.
#[derive(Debug)]
pub struct PreprocessedInput {
    data: Array4<f32>,
    _lease: Lease,
}

impl PreprocessedInput {
    pub(crate) fn new(data: Array4<f32>, ledger: &TensorLedger) -> Self {
        Self {
            data,
            _lease: ledger.lease(),
        }
    }

    pub fn shape(&self) -> [usize; 4] {
        let (n, h, w, c) = self.data.dim();
        [n, h, w, c]
    }

    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    /// Contiguous NHWC values. Built in standard layout, so never empty for a
    /// non-empty tensor.
    pub fn as_slice(&self) -> &[f32] {
        self.data.as_slice().unwrap_or_default()
    }
}

/// Pre-softmax model output for the single batch element.
#[derive(Debug)]
pub struct RawScores {
    values: Vec<f32>,
    _lease: Lease,
}

impl RawScores {
    pub(crate) fn new(values: Vec<f32>, ledger: &TensorLedger) -> Self {
        Self {
            values,
            _lease: ledger.lease(),
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}

#[derive(Debug)]
pub struct Probabilities {
    values: Vec<f32>,
    _lease: Lease,
}

impl Probabilities {
    pub(crate) fn new(values: Vec<f32>, ledger: &TensorLedger) -> Self {
        Self {
            values,
            _lease: ledger.lease(),
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leases_are_returned_on_drop() {
        let ledger = TensorLedger::new();
        let scores = RawScores::new(vec![1.0, 2.0], &ledger);
        let probs = Probabilities::new(vec![0.5, 0.5], &ledger);
        assert_eq!(ledger.live(), 2);

        drop(scores);
        assert_eq!(ledger.live(), 1);
        drop(probs);
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn preprocessed_input_reports_nhwc_shape() {
        let ledger = TensorLedger::new();
        let input = PreprocessedInput::new(Array4::zeros((1, 4, 5, 3)), &ledger);
        assert_eq!(input.shape(), [1, 4, 5, 3]);
        assert_eq!(input.as_slice().len(), 60);
    }
}
