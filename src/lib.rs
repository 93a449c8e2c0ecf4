pub mod core;
pub mod database;
pub mod services;

pub use crate::core::gap::{detect, Detection, GapConfig};
pub use crate::core::segment::{Blob, SegmentConfig, Segmenter};
pub use crate::database::models::{FingerprintRecord, InsertOutcome, MatchResult, Modality};
pub use crate::database::store::RecordStore;
pub use crate::services::analyzer::{Analyzer, AnalyzerConfig};
