use serde::{Deserialize, Serialize};

/// One stored fingerprint row, covering a full upload or one of its blobs.
///
/// `id` is unique across the corpus; `parent` ties every blob back to the
/// upload it was segmented from (the full image is its own parent). Rows are
/// immutable once inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub id: String,
    pub parent: String,
    pub perceptual_hash: String,
    /// Present only for sub-images classified as bar charts.
    pub structural_hash: Option<String>,
    /// Present only for sub-images not classified as pure images.
    pub text_fingerprint: Option<String>,
    pub is_bar: bool,
    pub is_pure: bool,
    pub created_at: String,
}

/// The fingerprint modality a corpus query compares on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Perceptual,
    Structural,
    Text,
}

/// Ephemeral distance of one corpus row to a query record.
#[derive(Debug, Clone)]
pub struct DistanceSample {
    pub id: String,
    pub parent: String,
    pub distance: f64,
}

/// One suspicious corpus entry, with the query's suspicion score attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub id: String,
    pub parent: String,
    pub score: f64,
}

/// Outcome of an insert attempt; errors are reported separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The id already exists; the store was not modified.
    Duplicate,
}
