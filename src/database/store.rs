//! The corpus of fingerprint records and its match queries.

use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{DistanceSample, FingerprintRecord, InsertOutcome, MatchResult, Modality};
use super::StoreError;
use crate::core::gap::{self, GapConfig, MAX_DISTANCE};
use crate::core::{ratio_hash, text};
use crate::services::perceptual;

/// Record corpus backed by SQLite.
///
/// Inserts run check-then-insert under an exclusive connection lock so two
/// concurrent uploads with the same id cannot both observe "not present".
/// Queries read an in-memory snapshot that is reloaded after every
/// successful insert, so they never block on writers.
pub struct RecordStore {
    conn: Mutex<Connection>,
    snapshot: RwLock<Arc<Vec<FingerprintRecord>>>,
}

impl RecordStore {
    /// Opens the store at `path`, creating the database if necessary.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::from_connection(super::open_database(path)?)
    }

    /// An in-memory store for tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(super::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let store =
            Self { conn: Mutex::new(conn), snapshot: RwLock::new(Arc::new(Vec::new())) };
        store.reload()?;
        info!("opened record store with {} record(s)", store.len());
        Ok(store)
    }

    /// Inserts a record unless its id is already present.
    ///
    /// Never overwrites: a duplicate id reports [`InsertOutcome::Duplicate`]
    /// and leaves the store untouched. Storage faults surface as
    /// [`StoreError`] without a partial commit.
    pub fn add(&self, record: &FingerprintRecord) -> Result<InsertOutcome, StoreError> {
        {
            let conn = self.conn.lock().expect("record store lock poisoned");
            let exists = conn
                .query_row("SELECT 1 FROM records WHERE id = ?1", [&record.id], |_| Ok(()))
                .optional()?;
            if exists.is_some() {
                debug!("id {} already exists, skipping insert", record.id);
                return Ok(InsertOutcome::Duplicate);
            }
            conn.execute(
                "INSERT INTO records
                 (id, parent, perceptual_hash, structural_hash, text_fingerprint,
                  is_bar, is_pure, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.parent,
                    record.perceptual_hash,
                    record.structural_hash,
                    record.text_fingerprint,
                    record.is_bar,
                    record.is_pure,
                    record.created_at,
                ],
            )?;
        }
        self.reload()?;
        Ok(InsertOutcome::Inserted)
    }

    /// Re-reads the full corpus into the query snapshot.
    pub fn reload(&self) -> Result<(), StoreError> {
        let records = {
            let conn = self.conn.lock().expect("record store lock poisoned");
            let mut stmt = conn.prepare(
                "SELECT id, parent, perceptual_hash, structural_hash, text_fingerprint,
                        is_bar, is_pure, created_at
                 FROM records",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(FingerprintRecord {
                    id: row.get(0)?,
                    parent: row.get(1)?,
                    perceptual_hash: row.get(2)?,
                    structural_hash: row.get(3)?,
                    text_fingerprint: row.get(4)?,
                    is_bar: row.get(5)?,
                    is_pure: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        *self.snapshot.write().expect("record store lock poisoned") = Arc::new(records);
        Ok(())
    }

    /// The current corpus snapshot.
    pub fn records(&self) -> Arc<Vec<FingerprintRecord>> {
        self.snapshot.read().expect("record store lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds corpus entries suspiciously close to `query` on one modality.
    ///
    /// Every corpus row passing `filter` contributes one distance (rows or
    /// queries missing the modality contribute the sentinel), the gap
    /// detector picks the suspicious cluster, and the closest `match_count`
    /// rows come back carrying the detection score. Results below
    /// `min_score` are suppressed entirely.
    pub fn query_matches<F>(
        &self,
        query: &FingerprintRecord,
        modality: Modality,
        filter: F,
        config: &GapConfig,
        min_score: f64,
    ) -> Vec<MatchResult>
    where
        F: Fn(&FingerprintRecord) -> bool,
    {
        let records = self.records();
        let mut samples: Vec<DistanceSample> = records
            .iter()
            .filter(|r| filter(r))
            .map(|r| DistanceSample {
                id: r.id.clone(),
                parent: r.parent.clone(),
                distance: modality_distance(query, r, modality),
            })
            .collect();
        samples.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        let distances: Vec<f64> = samples.iter().map(|s| s.distance).collect();
        let detection = gap::detect(&distances, config);
        debug!(
            "{:?} query over {} sample(s): {} candidate(s), score {:.4}",
            modality,
            distances.len(),
            detection.match_count,
            detection.score
        );
        if detection.score < min_score || detection.match_count == 0 {
            return Vec::new();
        }
        samples
            .into_iter()
            .take(detection.match_count)
            .map(|s| MatchResult { id: s.id, parent: s.parent, score: detection.score })
            .collect()
    }
}

/// Distance between two records on one modality; a missing value on either
/// side folds into the sentinel (insufficient signal, never an error).
fn modality_distance(a: &FingerprintRecord, b: &FingerprintRecord, modality: Modality) -> f64 {
    match modality {
        Modality::Perceptual => perceptual::distance(&a.perceptual_hash, &b.perceptual_hash) as f64,
        Modality::Structural => match (&a.structural_hash, &b.structural_hash) {
            (Some(x), Some(y)) => ratio_hash::distance(x, y) as f64,
            _ => MAX_DISTANCE,
        },
        Modality::Text => match (&a.text_fingerprint, &b.text_fingerprint) {
            (Some(x), Some(y)) => {
                text::distance(x, y, text::DEFAULT_MIN_NGRAMS, text::DEFAULT_NGRAM_LEN)
            }
            _ => MAX_DISTANCE,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: &str, parent: &str) -> FingerprintRecord {
        FingerprintRecord {
            id: id.to_string(),
            parent: parent.to_string(),
            perceptual_hash: String::new(),
            structural_hash: None,
            text_fingerprint: None,
            is_bar: false,
            is_pure: false,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn add_and_reload_roundtrip() {
        let dir = tempdir().unwrap();
        let store = RecordStore::open(dir.path().join("test.db")).unwrap();
        assert!(store.is_empty());

        let mut rec = record("fig1", "fig1");
        rec.structural_hash = Some("001002003004".to_string());
        assert_eq!(store.add(&rec).unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.len(), 1);
        assert_eq!(*store.records()[0].structural_hash.as_ref().unwrap(), "001002003004");
    }

    #[test]
    fn duplicate_id_never_mutates_the_store() {
        let store = RecordStore::open_in_memory().unwrap();
        let first = record("fig1", "fig1");
        assert_eq!(store.add(&first).unwrap(), InsertOutcome::Inserted);

        let mut second = record("fig1", "other_parent");
        second.is_bar = true;
        assert_eq!(store.add(&second).unwrap(), InsertOutcome::Duplicate);
        assert_eq!(store.len(), 1);
        // The stored row is still the first one.
        let records = store.records();
        assert_eq!(records[0].parent, "fig1");
        assert!(!records[0].is_bar);
    }

    #[test]
    fn snapshot_reflects_inserts() {
        let store = RecordStore::open_in_memory().unwrap();
        let before = store.records();
        store.add(&record("a", "a")).unwrap();
        // The old snapshot is untouched; a fresh one sees the insert.
        assert!(before.is_empty());
        assert_eq!(store.records().len(), 1);
    }

    #[test]
    fn structural_query_finds_reordered_chart() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut stored = record("p1", "p1");
        // Bars 100, 200, 300, 400 normalized: 0fa, 1f4, 2ee, 3e8.
        stored.structural_hash = Some("0fa1f42ee3e8".to_string());
        stored.is_bar = true;
        store.add(&stored).unwrap();
        let mut unrelated = record("p2", "p2");
        unrelated.structural_hash = Some("3e83e83e83e8".to_string());
        unrelated.is_bar = true;
        store.add(&unrelated).unwrap();
        store.add(&record("p3", "p3")).unwrap();

        // Same multiset of bars in reverse order.
        let mut query = record("q", "q");
        query.structural_hash = Some("3e82ee1f40fa".to_string());
        let matches = store.query_matches(
            &query,
            Modality::Structural,
            |r| r.parent != "q",
            &GapConfig::default(),
            0.01,
        );
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "p1");
        assert!(matches[0].score > 0.01);
    }

    #[test]
    fn filter_excludes_own_parent() {
        let store = RecordStore::open_in_memory().unwrap();
        store.add(&record("p1", "p1")).unwrap();
        store.add(&record("p1_blob1", "p1")).unwrap();
        let query = record("p1_blob2", "p1");
        let matches = store.query_matches(
            &query,
            Modality::Perceptual,
            |r| r.parent != query.parent,
            &GapConfig::default(),
            0.01,
        );
        assert!(matches.is_empty());
    }

    #[test]
    fn text_query_ignores_disjoint_vocabularies() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut stored = record("p1", "p1");
        stored.text_fingerprint =
            Some("aaabbb cccddd eeefff ggghhh iiijjj kkklll".to_string());
        store.add(&stored).unwrap();
        let mut other = record("p2", "p2");
        other.text_fingerprint =
            Some("mmmnnn oooppp qqqrrr sssttt uuuvvv wwwxxx".to_string());
        store.add(&other).unwrap();

        let mut query = record("q", "q");
        query.text_fingerprint =
            Some("yyyzzz aabbcc ddeeff gghhii jjkkll mmnnoo".to_string());
        let matches = store.query_matches(
            &query,
            Modality::Text,
            |r| r.parent != "q",
            &GapConfig::default(),
            0.01,
        );
        assert!(matches.is_empty());
    }
}
