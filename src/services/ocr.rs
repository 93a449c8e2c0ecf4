//! OCR seam for text fingerprinting.
//!
//! The pipeline only needs word tokens in reading order. [`TesseractOcr`]
//! shells out to the `tesseract` binary; [`NullOcr`] stands in when no OCR
//! backend is available and yields empty fingerprints.

use std::io;
use std::process::Command;

use image::imageops::FilterType;
use image::DynamicImage;
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("failed to stage image for OCR: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode image for OCR: {0}")]
    Image(#[from] image::ImageError),
    #[error("ocr backend failed: {0}")]
    Backend(String),
}

/// Extracts word tokens from a sub-image, in reading order.
pub trait OcrEngine: Send + Sync {
    fn extract_words(&self, image: &DynamicImage) -> Result<Vec<String>, OcrError>;
}

/// OCR via the system `tesseract` binary.
///
/// Images are upscaled to a fixed working height before recognition; axis
/// labels in downsampled figures are otherwise too small to read.
pub struct TesseractOcr {
    target_height: u32,
}

impl TesseractOcr {
    pub fn new() -> Self {
        Self { target_height: 800 }
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractOcr {
    fn extract_words(&self, image: &DynamicImage) -> Result<Vec<String>, OcrError> {
        let scaled = if image.height() < self.target_height {
            let width = (image.width() as f64 * self.target_height as f64
                / image.height().max(1) as f64) as u32;
            image.resize_exact(width.max(1), self.target_height, FilterType::CatmullRom)
        } else {
            image.clone()
        };

        let staged = tempfile::Builder::new().suffix(".png").tempfile()?;
        scaled.save(staged.path())?;

        let output = Command::new("tesseract")
            .arg(staged.path())
            .arg("stdout")
            .output()
            .map_err(|e| OcrError::Backend(format!("could not run tesseract: {}", e)))?;
        if !output.status.success() {
            return Err(OcrError::Backend(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        debug!("ocr produced {} word(s)", words.len());
        Ok(words)
    }
}

/// OCR backend that reads nothing; text fingerprints come out empty.
pub struct NullOcr;

impl OcrEngine for NullOcr {
    fn extract_words(&self, _image: &DynamicImage) -> Result<Vec<String>, OcrError> {
        Ok(Vec::new())
    }
}
