use crate::error::PersistenceError;
use crate::progress::{Level, ProgressState, StateBackend};
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

const PHOTO_KIND: &str = "photo";

/// Embedded SQLite store for all sampling state, one row per recorded key.
/// Each record is a single autocommitted insert, so nothing is rewritten
/// wholesale as the sets grow.
pub struct SqliteState {
    conn: Mutex<Connection>,
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

impl SqliteState {
    pub fn new(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, PersistenceError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, PersistenceError> {
        // Every record must be on disk before the walker moves on
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            ",
        )?;

        let state = SqliteState {
            conn: Mutex::new(conn),
        };
        state.init_schema()?;
        Ok(state)
    }

    fn init_schema(&self) -> Result<(), PersistenceError> {
        self.conn().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sampled (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL CHECK(kind IN ('state', 'county', 'az_filter', 'photo')),
                key TEXT NOT NULL,
                recorded_at INTEGER NOT NULL,
                UNIQUE(kind, key)
            );

            CREATE INDEX IF NOT EXISTS idx_sampled_kind ON sampled(kind);
            ",
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves nothing half-applied in SQLite
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn keys(&self, kind: &str) -> Result<Vec<String>, PersistenceError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key FROM sampled WHERE kind = ?1 ORDER BY id")?;
        let keys = stmt
            .query_map(params![kind], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }

    fn insert(&self, kind: &str, key: &str) -> Result<(), PersistenceError> {
        self.conn().execute(
            "INSERT OR IGNORE INTO sampled (kind, key, recorded_at) VALUES (?1, ?2, ?3)",
            params![kind, key, current_timestamp()],
        )?;
        Ok(())
    }

    pub fn count(&self, kind: &str) -> Result<usize, PersistenceError> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM sampled WHERE kind = ?1",
            params![kind],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl StateBackend for SqliteState {
    fn load_progress(&self) -> Result<ProgressState, PersistenceError> {
        Ok(ProgressState {
            sampled_states: self.keys(Level::State.as_str())?.into_iter().collect(),
            sampled_counties: self.keys(Level::County.as_str())?.into_iter().collect(),
            sampled_az: self.keys(Level::AzFilter.as_str())?.into_iter().collect(),
        })
    }

    fn record_visit(
        &self,
        _state: &ProgressState,
        level: Level,
        href: &str,
    ) -> Result<(), PersistenceError> {
        self.insert(level.as_str(), href)
    }

    fn load_photos(&self) -> Result<Vec<String>, PersistenceError> {
        self.keys(PHOTO_KIND)
    }

    fn record_photo(&self, _photos: &[String], url: &str) -> Result<(), PersistenceError> {
        self.insert(PHOTO_KIND, url)
    }

    fn reset(&self) -> Result<(), PersistenceError> {
        self.conn().execute("DELETE FROM sampled", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ProgressStore, SampledPhotoSet};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_database_creation() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("state.db");

        assert!(!SqliteState::exists(&db_path));
        let state = SqliteState::new(&db_path);
        assert!(state.is_ok());
        assert!(SqliteState::exists(&db_path));
    }

    #[test]
    fn test_visits_and_photos_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("state.db");

        {
            let backend = Arc::new(SqliteState::new(&db_path).unwrap());
            let mut progress = ProgressStore::load(backend.clone()).unwrap();
            let mut photos = SampledPhotoSet::load(backend).unwrap();

            progress.mark_visited(Level::County, "https://c/").unwrap();
            progress.mark_visited(Level::County, "https://c/").unwrap();
            progress.mark_visited(Level::AzFilter, "https://c/?letter=Q").unwrap();
            photos.insert("https://img/mugshot-b.jpg").unwrap();
            photos.insert("https://img/mugshot-a.jpg").unwrap();
        }

        let backend = Arc::new(SqliteState::new(&db_path).unwrap());
        assert_eq!(backend.count("county").unwrap(), 1);

        let progress = ProgressStore::load(backend.clone()).unwrap();
        assert!(progress.is_visited(Level::County, "https://c/"));
        assert!(progress.is_visited(Level::AzFilter, "https://c/?letter=Q"));
        assert!(!progress.is_visited(Level::State, "https://c/"));

        // Insertion order is preserved
        let photos = SampledPhotoSet::load(backend).unwrap();
        assert_eq!(
            photos.urls(),
            &[
                "https://img/mugshot-b.jpg".to_string(),
                "https://img/mugshot-a.jpg".to_string()
            ]
        );
    }

    #[test]
    fn test_reset_clears_all_kinds() {
        let backend = SqliteState::in_memory().unwrap();
        backend.insert("county", "https://c/").unwrap();
        backend.insert(PHOTO_KIND, "https://img/mugshot.jpg").unwrap();

        backend.reset().unwrap();

        assert_eq!(backend.count("county").unwrap(), 0);
        assert_eq!(backend.count(PHOTO_KIND).unwrap(), 0);
    }
}
