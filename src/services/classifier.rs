//! Sub-image classification seam.
//!
//! The fingerprint pipeline only needs ranked labels with confidences; where
//! they come from (an ONNX model, a remote service, a fixed answer in tests)
//! is behind the [`Classifier`] trait.

use image::DynamicImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier backend failed: {0}")]
    Backend(String),
}

/// One predicted label with its confidence in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub name: String,
    pub confidence: f32,
}

impl Label {
    pub fn new(name: impl Into<String>, confidence: f32) -> Self {
        Self { name: name.into(), confidence }
    }
}

/// Ranks labels for a sub-image, best first.
///
/// Implementations must be safe to share across the worker pool.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &DynamicImage) -> Result<Vec<Label>, ClassifierError>;
}

/// Classifier that returns the same ranked labels for every image.
///
/// Used when the caller already knows what the upload contains (`--treat-as`
/// flags) and in tests.
pub struct FixedClassifier {
    labels: Vec<Label>,
}

impl FixedClassifier {
    pub fn new(labels: Vec<Label>) -> Self {
        Self { labels }
    }

    /// A yes/no classifier: `positive` wins with `confidence` when `answer`
    /// is true, otherwise `negative` does.
    pub fn binary(positive: &str, negative: &str, answer: bool, confidence: f32) -> Self {
        let (top, rest) = if answer { (positive, negative) } else { (negative, positive) };
        Self::new(vec![Label::new(top, confidence), Label::new(rest, 1.0 - confidence)])
    }
}

impl Classifier for FixedClassifier {
    fn classify(&self, _image: &DynamicImage) -> Result<Vec<Label>, ClassifierError> {
        Ok(self.labels.clone())
    }
}
