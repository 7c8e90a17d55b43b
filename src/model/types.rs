use std::{fmt, path::PathBuf};

use serde::Serialize;

/// Input side length the bundled model was trained on.
pub const INPUT_SIDE: usize = 128;
pub const INPUT_CHANNELS: usize = 3;
/// NHWC input shape declared by the model artifact.
pub const MODEL_INPUT_SHAPE: [usize; 4] = [1, INPUT_SIDE, INPUT_SIDE, INPUT_CHANNELS];

/// Output classes, in the order the model emits scores for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClassLabel {
    Bags,
    Bottomwear,
    Dress,
    Headwear,
    Shoes,
    Topwear,
    Watches,
}

impl ClassLabel {
    pub const ALL: [ClassLabel; 7] = [
        ClassLabel::Bags,
        ClassLabel::Bottomwear,
        ClassLabel::Dress,
        ClassLabel::Headwear,
        ClassLabel::Shoes,
        ClassLabel::Topwear,
        ClassLabel::Watches,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClassLabel::Bags => "Bags",
            ClassLabel::Bottomwear => "Bottomwear",
            ClassLabel::Dress => "Dress",
            ClassLabel::Headwear => "Headwear",
            ClassLabel::Shoes => "Shoes",
            ClassLabel::Topwear => "Topwear",
            ClassLabel::Watches => "Watches",
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub name: String,
    pub path: PathBuf,
    pub backend: &'static str,
    pub size_bytes: u64,
    pub input_shape: [usize; 4],
}
