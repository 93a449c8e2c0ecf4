pub mod analyzer;
pub mod classifier;
pub mod ocr;
pub mod perceptual;

pub use analyzer::{Analyzer, AnalyzerConfig};
pub use classifier::{Classifier, FixedClassifier, Label};
pub use ocr::{NullOcr, OcrEngine, TesseractOcr};
pub use perceptual::PerceptualHasher;
