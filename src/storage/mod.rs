//! Durable state of the crawler
//!
//! A single SQLite file holds the frontier (`crawl_status`), the ingested
//! articles (`articles`, `article_authors`) and the crawl target
//! (`crawler_config`). [`Database`] opens the file, creates the schema and
//! hands out the shared connection to the individual stores.

pub mod frontier;
pub mod repository;
pub mod settings;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::utils::error::StoreError;

pub use frontier::{FrontierCounts, FrontierStore, MemoryFrontierStore, SqliteFrontierStore};
pub use repository::{ArticleStore, MemoryArticleStore, SqliteArticleStore};
pub use settings::SqliteConfigProvider;

/// Connection shared by the SQLite-backed stores
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Lock a shared connection, mapping poisoning to a store error
pub(crate) fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StoreError> {
    conn.lock().map_err(|_| StoreError::LockPoisoned)
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS crawl_status (
        url TEXT PRIMARY KEY,
        visited INTEGER NOT NULL DEFAULT 0,
        last_access INTEGER,
        last_http_status INTEGER
    );

    CREATE INDEX IF NOT EXISTS idx_crawl_status_visited
        ON crawl_status(visited);

    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        abstract TEXT NOT NULL,
        last_update_timestamp INTEGER NOT NULL,
        source_url TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS article_authors (
        article_id TEXT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        name TEXT NOT NULL,
        PRIMARY KEY (article_id, position)
    );

    CREATE TABLE IF NOT EXISTS crawler_config (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        root_url TEXT NOT NULL,
        desired_article_count INTEGER NOT NULL
    );
"#;

/// Database management wrapper
#[derive(Clone)]
pub struct Database {
    conn: SharedConnection,
}

impl Database {
    /// Open (or create) the SQLite file and ensure the schema exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self::from_connection(conn)?;
        tracing::info!(path = %path.display(), "SQLite database initialized");
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Frontier store backed by this database
    pub fn frontier(&self) -> SqliteFrontierStore {
        SqliteFrontierStore::new(Arc::clone(&self.conn))
    }

    /// Article store backed by this database
    pub fn articles(&self) -> SqliteArticleStore {
        SqliteArticleStore::new(Arc::clone(&self.conn))
    }

    /// Crawl configuration provider backed by this database
    pub fn config_provider(&self) -> SqliteConfigProvider {
        SqliteConfigProvider::new(Arc::clone(&self.conn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_initialization() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("unarxiv.db");

        assert!(Database::open(&path).is_ok());
        assert!(path.exists());

        // Reopening keeps the existing schema
        assert!(Database::open(&path).is_ok());
    }

    #[test]
    fn test_in_memory_schema() {
        let db = Database::in_memory().unwrap();
        let conn = lock(&db.conn).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('crawl_status', 'articles', 'article_authors', 'crawler_config')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }
}
