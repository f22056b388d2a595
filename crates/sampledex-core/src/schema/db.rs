use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::model::{AnalysisEngine, AudioFormat, MusicalKey, SampleId, SampleMetadata, SampleRecord};

use super::migrations::MIGRATIONS;
use super::vector::{decode_embedding, encode_embedding, l2_normalize, squared_l2};

/// File name of the SQLite database inside a sample database directory.
pub const STORE_FILE: &str = "samples.db";

const SAMPLE_COLUMNS: &str = "id, path, filename, embedding, bpm, key, duration_secs, format,
     analysis_engine, created_at, updated_at";

/// A stored sample together with its distance from a query embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub record: SampleRecord,
    /// Squared Euclidean distance between unit vectors (`0..=4`).
    pub distance: f32,
}

/// Summary counts for a sample database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub with_bpm: usize,
    pub with_key: usize,
    pub by_engine: BTreeMap<String, usize>,
}

/// A sample database: one directory holding the SQLite store.
///
/// The connection sits behind a mutex so a store can be shared with
/// async indexing stages; every method holds the lock only for the
/// duration of its own statements.
#[derive(Debug)]
pub struct SampleStore {
    conn: Mutex<Connection>,
    dir: Option<PathBuf>,
}

impl SampleStore {
    /// Open the sample database in `dir`, creating the directory and the
    /// schema if needed.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let conn = Connection::open(dir.join(STORE_FILE))?;
        let store = Self {
            conn: Mutex::new(conn),
            dir: Some(dir.to_path_buf()),
        };
        store.apply_migrations()?;
        Ok(store)
    }

    /// Open the sample database in `dir`, failing if none has been created
    /// there yet.
    pub fn open_existing(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.join(STORE_FILE).is_file() {
            return Err(Error::DatabaseNotFound(dir.to_path_buf()));
        }
        Self::create(dir)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            dir: None,
        };
        store.apply_migrations()?;
        Ok(store)
    }

    /// Whether `dir` contains a sample database.
    #[must_use]
    pub fn exists(dir: &Path) -> bool {
        dir.join(STORE_FILE).is_file()
    }

    /// Lock the underlying connection (for advanced queries).
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The database directory, or `None` for in-memory stores.
    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn apply_migrations(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for migration in MIGRATIONS {
            if !applied.contains(&migration.version) {
                log::info!(
                    "Applying migration {} ({})",
                    migration.version,
                    migration.name
                );
                conn.execute_batch(migration.sql)?;
                conn.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, migration.name],
                )?;
            }
        }

        Ok(())
    }
}

// Sample CRUD
impl SampleStore {
    /// Insert a new sample. The embedding is normalized to unit length.
    pub fn insert(&self, record: &SampleRecord) -> Result<()> {
        if self.contains(&record.id)? {
            return Err(Error::Duplicate(record.id.to_string()));
        }

        let mut embedding = record.embedding.clone();
        l2_normalize(&mut embedding);
        let metadata = &record.metadata;

        self.conn().execute(
            "INSERT INTO samples (
                id, path, filename, embedding, dimensions, bpm, key,
                duration_secs, format, analysis_engine, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                record.id.as_str(),
                record.path.to_string_lossy().as_ref(),
                record.filename,
                encode_embedding(&embedding),
                i64::try_from(embedding.len()).unwrap_or(i64::MAX),
                metadata.bpm.unwrap_or(0.0),
                metadata.key.map(|k| k.to_string()).unwrap_or_default(),
                metadata.duration_secs,
                metadata.format.map(|f| f.extension()),
                metadata.analysis_engine.as_str(),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Whether a sample with this id is stored.
    pub fn contains(&self, id: &SampleId) -> Result<bool> {
        let found = self
            .conn()
            .query_row("SELECT 1 FROM samples WHERE id = ?1", [id.as_str()], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// All stored sample ids.
    pub fn ids(&self) -> Result<HashSet<SampleId>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id FROM samples")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|id| id.map(SampleId::new))
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(ids)
    }

    /// Get one sample by id.
    pub fn get(&self, id: &SampleId) -> Result<SampleRecord> {
        let sql = format!("SELECT {SAMPLE_COLUMNS} FROM samples WHERE id = ?1");
        self.conn()
            .query_row(&sql, [id.as_str()], row_to_record)
            .optional()?
            .ok_or_else(|| Error::NotFound {
                entity: "sample",
                id: id.to_string(),
            })
    }

    /// All samples, in insertion order.
    pub fn list(&self) -> Result<Vec<SampleRecord>> {
        let sql = format!("SELECT {SAMPLE_COLUMNS} FROM samples ORDER BY rowid");
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Number of stored samples.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Rewrite the metadata of many samples in one transaction.
    ///
    /// Embeddings, paths and creation times are left alone. Returns the
    /// number of rows that existed and were updated.
    pub fn update_metadata_batch(&self, updates: &[(SampleId, SampleMetadata)]) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE samples SET
                    bpm = ?2, key = ?3, duration_secs = ?4, format = ?5,
                    analysis_engine = ?6, updated_at = ?7
                 WHERE id = ?1",
            )?;
            let now = Utc::now().to_rfc3339();
            for (id, metadata) in updates {
                let changed = stmt.execute(rusqlite::params![
                    id.as_str(),
                    metadata.bpm.unwrap_or(0.0),
                    metadata.key.map(|k| k.to_string()).unwrap_or_default(),
                    metadata.duration_secs,
                    metadata.format.map(|f| f.extension()),
                    metadata.analysis_engine.as_str(),
                    now,
                ])?;
                if changed == 0 {
                    log::warn!("Metadata update for unknown sample {}", id);
                }
                updated += changed;
            }
        }
        tx.commit()?;

        log::debug!("Updated metadata for {} samples", updated);
        Ok(updated)
    }

    /// Counts of samples per analysis engine and with detected BPM/key.
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn();
        let (total, with_bpm, with_key): (i64, i64, i64) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN bpm > 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN key != '' THEN 1 ELSE 0 END), 0)
             FROM samples",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let mut stmt = conn.prepare(
            "SELECT analysis_engine, COUNT(*) FROM samples GROUP BY analysis_engine",
        )?;
        let by_engine = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    usize::try_from(row.get::<_, i64>(1)?).unwrap_or(0),
                ))
            })?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;

        Ok(StoreStats {
            total: usize::try_from(total).unwrap_or(0),
            with_bpm: usize::try_from(with_bpm).unwrap_or(0),
            with_key: usize::try_from(with_key).unwrap_or(0),
            by_engine,
        })
    }
}

// Nearest-neighbour query
impl SampleStore {
    /// The `n` samples closest to `embedding`, nearest first.
    ///
    /// The query is normalized before comparison. Samples whose embedding
    /// dimension differs from the query are skipped.
    pub fn query(&self, embedding: &[f32], n: usize) -> Result<Vec<Neighbor>> {
        if n == 0 || embedding.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = embedding.to_vec();
        l2_normalize(&mut query);

        let mut neighbors = Vec::new();
        let mut skipped = 0usize;
        for record in self.list()? {
            if record.embedding.len() != query.len() {
                skipped += 1;
                continue;
            }
            let distance = squared_l2(&query, &record.embedding);
            neighbors.push(Neighbor { record, distance });
        }

        if skipped > 0 {
            log::warn!(
                "Skipped {} samples whose embedding dimension differs from the query ({})",
                skipped,
                query.len()
            );
        }

        // Stable sort keeps insertion order for ties.
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(n);
        Ok(neighbors)
    }
}

// Store info
impl SampleStore {
    /// Record a fact about the store, such as the embedding model used.
    pub fn set_info(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO store_info (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    /// Read a fact recorded with [`SampleStore::set_info`].
    pub fn info(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row("SELECT value FROM store_info WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }
}

fn conversion_error(column: usize, err: Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(Into::into)
        .map_err(|e| conversion_error(column, Error::InvalidData(format!("bad timestamp: {e}"))))
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<SampleRecord> {
    let id: String = row.get(0)?;
    let path: String = row.get(1)?;
    let blob: Vec<u8> = row.get(3)?;
    let bpm: f64 = row.get(4)?;
    let key: String = row.get(5)?;
    let format: Option<String> = row.get(7)?;
    let engine: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    let embedding = decode_embedding(&blob).map_err(|e| conversion_error(3, e))?;

    // Keys written by other tools may not parse; treat them as undetected.
    let key = if key.is_empty() {
        None
    } else {
        match key.parse::<MusicalKey>() {
            Ok(key) => Some(key),
            Err(e) => {
                log::warn!("Ignoring key for {}: {}", id, e);
                None
            }
        }
    };

    Ok(SampleRecord {
        id: SampleId::new(id),
        path: PathBuf::from(path),
        filename: row.get(2)?,
        embedding,
        metadata: SampleMetadata {
            bpm: (bpm > 0.0).then_some(bpm),
            key,
            duration_secs: row.get(6)?,
            format: format.as_deref().and_then(AudioFormat::from_extension),
            analysis_engine: engine
                .parse::<AnalysisEngine>()
                .map_err(|e| conversion_error(8, e))?,
        },
        created_at: parse_timestamp(9, &created_at)?,
        updated_at: parse_timestamp(10, &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Mode, PitchClass};

    fn record(path: &str, embedding: Vec<f32>) -> SampleRecord {
        SampleRecord::new(PathBuf::from(path), embedding, AnalysisEngine::Builtin)
    }

    #[test]
    fn test_store_open_in_memory() {
        let store = SampleStore::open_in_memory().unwrap();
        let count: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, i64::try_from(MIGRATIONS.len()).unwrap());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_sample_round_trip() {
        let store = SampleStore::open_in_memory().unwrap();
        let mut sample = record("/samples/kick.wav", vec![3.0, 4.0]);
        sample.metadata.bpm = Some(128.0);
        sample.metadata.key = Some(MusicalKey::new(PitchClass::A, Mode::Minor));
        sample.metadata.duration_secs = Some(1.5);
        store.insert(&sample).unwrap();

        let loaded = store.get(&sample.id).unwrap();
        assert_eq!(loaded.filename, "kick.wav");
        assert_eq!(loaded.metadata.bpm, Some(128.0));
        assert_eq!(loaded.metadata.key, sample.metadata.key);
        assert_eq!(loaded.metadata.duration_secs, Some(1.5));
        assert_eq!(loaded.metadata.format, Some(AudioFormat::Wav));
        assert_eq!(loaded.metadata.analysis_engine, AnalysisEngine::Builtin);
        // Normalized on insert
        assert!((loaded.embedding[0] - 0.6).abs() < 1e-6);
        assert!((loaded.embedding[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_undetected_values_are_none() {
        let store = SampleStore::open_in_memory().unwrap();
        let sample = record("/samples/noise.wav", vec![1.0, 0.0]);
        store.insert(&sample).unwrap();

        let loaded = store.get(&sample.id).unwrap();
        assert_eq!(loaded.metadata.bpm, None);
        assert_eq!(loaded.metadata.key, None);
    }

    #[test]
    fn test_insert_duplicate_fails() {
        let store = SampleStore::open_in_memory().unwrap();
        let sample = record("/samples/kick.wav", vec![1.0, 0.0]);
        store.insert(&sample).unwrap();
        let err = store.insert(&sample).unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store = SampleStore::open_in_memory().unwrap();
        let err = store.get(&SampleId::new("/nope.wav")).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_update_metadata_batch_keeps_embedding() {
        let store = SampleStore::open_in_memory().unwrap();
        let sample = record("/samples/snare.wav", vec![0.0, 1.0]);
        store.insert(&sample).unwrap();

        let mut metadata = sample.metadata.clone();
        metadata.bpm = Some(96.0);
        metadata.analysis_engine = AnalysisEngine::External;
        let updated = store
            .update_metadata_batch(&[
                (sample.id.clone(), metadata),
                (SampleId::new("/missing.wav"), sample.metadata.clone()),
            ])
            .unwrap();
        assert_eq!(updated, 1);

        let loaded = store.get(&sample.id).unwrap();
        assert_eq!(loaded.metadata.bpm, Some(96.0));
        assert_eq!(loaded.metadata.analysis_engine, AnalysisEngine::External);
        assert_eq!(loaded.embedding, vec![0.0, 1.0]);
    }

    #[test]
    fn test_query_orders_by_distance() {
        let store = SampleStore::open_in_memory().unwrap();
        store.insert(&record("/a.wav", vec![1.0, 0.0])).unwrap();
        store.insert(&record("/b.wav", vec![0.0, 1.0])).unwrap();
        store.insert(&record("/c.wav", vec![1.0, 1.0])).unwrap();
        store.insert(&record("/short.wav", vec![1.0])).unwrap();

        let neighbors = store.query(&[2.0, 0.1], 2).unwrap();
        assert_eq!(neighbors.len(), 2);
        assert_eq!(neighbors[0].record.filename, "a.wav");
        assert_eq!(neighbors[1].record.filename, "c.wav");
        assert!(neighbors[0].distance <= neighbors[1].distance);
    }

    #[test]
    fn test_stats() {
        let store = SampleStore::open_in_memory().unwrap();
        let mut a = record("/a.wav", vec![1.0, 0.0]);
        a.metadata.bpm = Some(120.0);
        let mut b = record("/b.wav", vec![0.0, 1.0]);
        b.metadata.analysis_engine = AnalysisEngine::External;
        b.metadata.key = Some(MusicalKey::new(PitchClass::C, Mode::Major));
        store.insert(&a).unwrap();
        store.insert(&b).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.with_bpm, 1);
        assert_eq!(stats.with_key, 1);
        assert_eq!(stats.by_engine.get("builtin"), Some(&1));
        assert_eq!(stats.by_engine.get("external"), Some(&1));
    }

    #[test]
    fn test_open_existing_requires_store() {
        let dir = tempfile::tempdir().unwrap();
        let db_dir = dir.path().join("sample_db");
        let err = SampleStore::open_existing(&db_dir).unwrap_err();
        assert!(matches!(err, Error::DatabaseNotFound(_)));

        SampleStore::create(&db_dir).unwrap();
        assert!(SampleStore::exists(&db_dir));
        assert!(SampleStore::open_existing(&db_dir).is_ok());
    }

    #[test]
    fn test_store_info() {
        let store = SampleStore::open_in_memory().unwrap();
        assert_eq!(store.info("embedding_model").unwrap(), None);
        store.set_info("embedding_model", "clap").unwrap();
        store.set_info("embedding_model", "clap-large").unwrap();
        assert_eq!(
            store.info("embedding_model").unwrap().as_deref(),
            Some("clap-large")
        );
    }
}
