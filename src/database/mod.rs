pub mod models;
pub mod store;

pub use models::{DistanceSample, FingerprintRecord, InsertOutcome, MatchResult, Modality};
pub use store::RecordStore;

use std::path::Path;

use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    id               TEXT PRIMARY KEY,
    parent           TEXT NOT NULL,
    perceptual_hash  TEXT NOT NULL,
    structural_hash  TEXT,
    text_fingerprint TEXT,
    is_bar           INTEGER NOT NULL,
    is_pure          INTEGER NOT NULL,
    created_at       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_records_parent ON records(parent);
";

/// Opens (and creates, if needed) the fingerprint database at `path`.
pub fn open_database<P: AsRef<Path>>(path: P) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// In-memory database with the same schema, for tests and dry runs.
pub fn open_in_memory() -> Result<Connection, StoreError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}
