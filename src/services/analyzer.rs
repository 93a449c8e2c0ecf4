//! Upload orchestration: segment, classify, fingerprint, store, query.

use std::path::{Path, PathBuf};

use chrono::Utc;
use image::DynamicImage;
use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::core::gap::GapConfig;
use crate::core::ratio_hash::{self, RatioHashConfig};
use crate::core::segment::{SegmentConfig, Segmenter};
use crate::core::text;
use crate::database::{
    FingerprintRecord, InsertOutcome, MatchResult, Modality, RecordStore, StoreError,
};
use crate::services::classifier::{Classifier, ClassifierError};
use crate::services::ocr::{OcrEngine, OcrError};
use crate::services::perceptual::PerceptualHasher;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("failed to decode image {path}: {source}")]
    Decode { path: PathBuf, source: image::ImageError },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Ocr(#[from] OcrError),
}

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub segment: SegmentConfig,
    pub ratio: RatioHashConfig,
    pub gap: GapConfig,
    /// Minimum word length kept in text fingerprints.
    pub min_word_len: usize,
    /// A classification only counts when its top label reaches this confidence.
    pub min_confidence: f32,
    /// Findings scoring below this are dropped from reports.
    pub min_score: f64,
    /// Top label name marking a sub-image as a bar chart.
    pub bar_label: String,
    /// Top label name marking a sub-image as a pure image (no readable text).
    pub pure_label: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            segment: SegmentConfig::default(),
            ratio: RatioHashConfig::default(),
            gap: GapConfig::default(),
            min_word_len: text::DEFAULT_MIN_WORD_LEN,
            min_confidence: 0.5,
            min_score: 0.01,
            bar_label: "bar".to_string(),
            pure_label: "pure".to_string(),
        }
    }
}

/// Outcome of adding one upload to the corpus.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub parent: String,
    pub inserted: usize,
    pub duplicates: usize,
}

/// Suspicious corpus entries found for one record on one modality.
#[derive(Debug, Clone, Serialize)]
pub struct ModalityMatches {
    pub record_id: String,
    pub modality: Modality,
    pub matches: Vec<MatchResult>,
}

/// Everything found while checking one upload against the corpus.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub parent: String,
    /// Number of fingerprinted units: the full image plus its blobs.
    pub analyzed: usize,
    pub findings: Vec<ModalityMatches>,
}

/// Turns uploads into fingerprint records and runs them against the corpus.
///
/// The classifiers and the OCR backend are injected; the analyzer itself has
/// no opinion on where labels and words come from.
pub struct Analyzer {
    config: AnalyzerConfig,
    segmenter: Segmenter,
    hasher: PerceptualHasher,
    bar_classifier: Box<dyn Classifier>,
    pure_classifier: Box<dyn Classifier>,
    ocr: Box<dyn OcrEngine>,
}

impl Analyzer {
    pub fn new(
        config: AnalyzerConfig,
        bar_classifier: Box<dyn Classifier>,
        pure_classifier: Box<dyn Classifier>,
        ocr: Box<dyn OcrEngine>,
    ) -> Self {
        let segmenter = Segmenter::new(config.segment.clone());
        Self {
            config,
            segmenter,
            hasher: PerceptualHasher::new(),
            bar_classifier,
            pure_classifier,
            ocr,
        }
    }

    /// Fingerprints an upload: the full image first, then one record per
    /// segmented blob, all sharing the upload's file stem as parent.
    pub fn fingerprint_upload(&self, path: &Path) -> Result<Vec<FingerprintRecord>, AnalyzeError> {
        let parent = upload_stem(path);
        let image = image::open(path)
            .map_err(|source| AnalyzeError::Decode { path: path.to_path_buf(), source })?;

        let blobs = self.segmenter.segment(&image);
        debug!("upload {}: {} blob(s)", parent, blobs.len());

        let mut units: Vec<(String, DynamicImage)> = Vec::with_capacity(blobs.len() + 1);
        units.push((parent.clone(), image));
        for (i, blob) in blobs.into_iter().enumerate() {
            units.push((format!("{}_blob{}", parent, i + 1), DynamicImage::ImageLuma8(blob.image)));
        }

        units
            .into_par_iter()
            .map(|(id, unit)| self.fingerprint_one(id, &parent, &unit))
            .collect()
    }

    fn fingerprint_one(
        &self,
        id: String,
        parent: &str,
        image: &DynamicImage,
    ) -> Result<FingerprintRecord, AnalyzeError> {
        let is_bar = self.top_label_is(&*self.bar_classifier, image, &self.config.bar_label)?;
        let is_pure = self.top_label_is(&*self.pure_classifier, image, &self.config.pure_label)?;

        let structural_hash =
            if is_bar { Some(ratio_hash::ratio_hash(image, &self.config.ratio)) } else { None };
        let text_fingerprint = if is_pure {
            None
        } else {
            let words = self.ocr.extract_words(image)?;
            Some(text::fingerprint(&words, self.config.min_word_len))
        };

        Ok(FingerprintRecord {
            id,
            parent: parent.to_string(),
            perceptual_hash: self.hasher.hash(image),
            structural_hash,
            text_fingerprint,
            is_bar,
            is_pure,
            created_at: Utc::now().to_rfc3339(),
        })
    }

    fn top_label_is(
        &self,
        classifier: &dyn Classifier,
        image: &DynamicImage,
        label: &str,
    ) -> Result<bool, AnalyzeError> {
        let labels = classifier.classify(image)?;
        Ok(labels
            .first()
            .map(|top| top.name == label && top.confidence >= self.config.min_confidence)
            .unwrap_or(false))
    }

    /// Fingerprints an upload and inserts every record into the corpus.
    ///
    /// Records whose id already exists are counted, not overwritten.
    pub fn ingest(&self, path: &Path, store: &RecordStore) -> Result<IngestReport, AnalyzeError> {
        let records = self.fingerprint_upload(path)?;
        let parent = upload_stem(path);
        let mut inserted = 0;
        let mut duplicates = 0;
        for record in &records {
            match store.add(record)? {
                InsertOutcome::Inserted => inserted += 1,
                InsertOutcome::Duplicate => duplicates += 1,
            }
        }
        info!("ingested {}: {} inserted, {} duplicate(s)", parent, inserted, duplicates);
        Ok(IngestReport { parent, inserted, duplicates })
    }

    /// Fingerprints an upload and queries the corpus for suspicious matches
    /// without inserting anything.
    ///
    /// Each record runs a perceptual query plus a structural or text query
    /// where it carries that fingerprint. Records from the same upload are
    /// never reported against each other.
    pub fn check(&self, path: &Path, store: &RecordStore) -> Result<AnalysisReport, AnalyzeError> {
        let records = self.fingerprint_upload(path)?;
        let parent = upload_stem(path);

        let mut findings = Vec::new();
        for record in &records {
            for modality in [Modality::Perceptual, Modality::Structural, Modality::Text] {
                let applicable = match modality {
                    Modality::Perceptual => true,
                    Modality::Structural => record.structural_hash.is_some(),
                    Modality::Text => record.text_fingerprint.is_some(),
                };
                if !applicable {
                    continue;
                }
                let matches = store.query_matches(
                    record,
                    modality,
                    |r| r.parent != parent,
                    &self.config.gap,
                    self.config.min_score,
                );
                if !matches.is_empty() {
                    findings.push(ModalityMatches {
                        record_id: record.id.clone(),
                        modality,
                        matches,
                    });
                }
            }
        }
        info!("checked {}: {} finding(s) across {} record(s)", parent, findings.len(), records.len());
        Ok(AnalysisReport { parent, analyzed: records.len(), findings })
    }
}

/// The upload's identity: its file stem, or the whole path when there is none.
fn upload_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
