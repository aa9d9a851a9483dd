use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use rusqlite::Connection;

use crate::config::StoreConfig;

/// Sorted-set style storage: per key, blobs ordered by an integer score.
///
/// Scores are unique per key; adding at an existing score replaces the blob.
/// Operations on an unknown key are no-ops or return nothing. Calls may block;
/// the worker issues them through [`SampleLog::blocking`].
///
/// [`SampleLog::blocking`]: crate::samples::SampleLog::blocking
pub trait SampleStore: Send + Sync + 'static {
    fn add(&self, key: &str, score: i64, blob: &str) -> Result<(), anyhow::Error>;

    /// Blobs with `min <= score <= max`, ascending by score.
    fn range_by_score(&self, key: &str, min: i64, max: i64) -> Result<Vec<String>, anyhow::Error>;

    /// Removes blobs with `min <= score <= max`, returning how many went.
    fn remove_range_by_score(
        &self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<usize, anyhow::Error>;

    fn delete(&self, key: &str) -> Result<(), anyhow::Error>;
}

#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let conn = Connection::open(path).context("Failed to open database file")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens the configured database file and creates the table if needed.
    pub fn open_configured(config: &StoreConfig) -> Result<Self, anyhow::Error> {
        let store = Self::open(&config.path)?;
        store.init()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, anyhow::Error> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn init(&self) -> Result<(), anyhow::Error> {
        self.conn()?
            .execute_batch(
                r"
                CREATE TABLE IF NOT EXISTS samples (
                    key TEXT NOT NULL,
                    score INTEGER NOT NULL,
                    blob TEXT NOT NULL,
                    PRIMARY KEY (key, score)
                );
                ",
            )
            .context("Failed to create table")?;
        Ok(())
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, anyhow::Error> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))
    }
}

impl SampleStore for SqliteStore {
    fn add(&self, key: &str, score: i64, blob: &str) -> Result<(), anyhow::Error> {
        self.conn()?
            .execute(
                r"
                INSERT INTO samples (key, score, blob) VALUES (?1, ?2, ?3)
                ON CONFLICT (key, score) DO UPDATE SET blob = excluded.blob",
                rusqlite::params![key, score, blob],
            )
            .context("Failed to insert sample")?;
        Ok(())
    }

    fn range_by_score(&self, key: &str, min: i64, max: i64) -> Result<Vec<String>, anyhow::Error> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached(
                r"
                SELECT blob FROM samples
                WHERE key = ?1 AND score BETWEEN ?2 AND ?3
                ORDER BY score ASC",
            )
            .context("Failed to prepare range query")?;
        let blobs = stmt
            .query_map(rusqlite::params![key, min, max], |row| row.get(0))
            .context("Failed to query samples")?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to read sample row")?;
        Ok(blobs)
    }

    fn remove_range_by_score(
        &self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<usize, anyhow::Error> {
        let removed = self
            .conn()?
            .execute(
                "DELETE FROM samples WHERE key = ?1 AND score BETWEEN ?2 AND ?3",
                rusqlite::params![key, min, max],
            )
            .context("Failed to remove samples")?;
        Ok(removed)
    }

    fn delete(&self, key: &str) -> Result<(), anyhow::Error> {
        self.conn()?
            .execute("DELETE FROM samples WHERE key = ?1", rusqlite::params![key])
            .context("Failed to delete samples")?;
        Ok(())
    }
}
