//! Frontier Store: the durable, deduplicated set of discovered URLs
//!
//! A URL appears at most once. Entries are created unvisited, flipped to
//! visited when the URL Source claims them, and stamped with the fetch
//! outcome (timestamp, HTTP status) once the Fetcher completes. Entries are
//! never deleted, so the table doubles as the permanent crawl ledger.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use super::{lock, SharedConnection};
use crate::models::FrontierEntry;
use crate::utils::error::StoreError;

/// Aggregate frontier sizes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierCounts {
    pub total: u64,
    pub visited: u64,
}

impl FrontierCounts {
    /// Number of URLs not yet claimed
    pub fn pending(&self) -> u64 {
        self.total.saturating_sub(self.visited)
    }
}

/// Durable frontier contract consumed by the pipeline
#[async_trait]
pub trait FrontierStore: Send + Sync {
    /// Idempotent insert; inserting a known URL is a successful no-op
    async fn enqueue(&self, url: &str) -> Result<(), StoreError>;

    /// Up to `limit` URLs not yet visited; an empty result means the queue is
    /// currently empty. Does not claim anything.
    async fn claim_next_unvisited(&self, limit: usize) -> Result<Vec<String>, StoreError>;

    /// Mark a URL visited ahead of dispatch so it is never handed out twice
    async fn claim(&self, url: &str) -> Result<(), StoreError>;

    /// Record the fetch outcome: access time (Unix nanoseconds) and HTTP
    /// status, `None` when no response was received
    async fn mark_visited(
        &self,
        url: &str,
        http_status: Option<u16>,
        timestamp: u64,
    ) -> Result<(), StoreError>;

    /// Look up a single entry
    async fn entry(&self, url: &str) -> Result<Option<FrontierEntry>, StoreError>;

    /// Total and visited URL counts
    async fn counts(&self) -> Result<FrontierCounts, StoreError>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of [`FrontierStore`] over the `crawl_status` table
pub struct SqliteFrontierStore {
    conn: SharedConnection,
}

impl SqliteFrontierStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl FrontierStore for SqliteFrontierStore {
    async fn enqueue(&self, url: &str) -> Result<(), StoreError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO crawl_status (url, visited) VALUES (?1, 0) ON CONFLICT(url) DO NOTHING",
            params![url],
        )?;
        Ok(())
    }

    async fn claim_next_unvisited(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        let conn = lock(&self.conn)?;
        let mut stmt =
            conn.prepare_cached("SELECT url FROM crawl_status WHERE visited = 0 LIMIT ?1")?;

        let urls = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(urls)
    }

    async fn claim(&self, url: &str) -> Result<(), StoreError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "UPDATE crawl_status SET visited = 1 WHERE url = ?1",
            params![url],
        )?;
        Ok(())
    }

    async fn mark_visited(
        &self,
        url: &str,
        http_status: Option<u16>,
        timestamp: u64,
    ) -> Result<(), StoreError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            r#"
                UPDATE crawl_status
                SET visited = 1, last_access = ?1, last_http_status = ?2
                WHERE url = ?3
                "#,
            params![timestamp as i64, http_status, url],
        )?;
        Ok(())
    }

    async fn entry(&self, url: &str) -> Result<Option<FrontierEntry>, StoreError> {
        let conn = lock(&self.conn)?;
        let entry = conn
            .query_row(
                "SELECT url, visited, last_access, last_http_status
                 FROM crawl_status WHERE url = ?1",
                params![url],
                |row| {
                    Ok(FrontierEntry {
                        url: row.get(0)?,
                        visited: row.get(1)?,
                        last_access: row.get::<_, Option<i64>>(2)?.map(|t| t.max(0) as u64),
                        last_http_status: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(entry)
    }

    async fn counts(&self) -> Result<FrontierCounts, StoreError> {
        let conn = lock(&self.conn)?;
        let (total, visited): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(visited), 0) FROM crawl_status",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(FrontierCounts {
            total: total as u64,
            visited: visited as u64,
        })
    }
}

// ============================================================================
// In-memory Implementation
// ============================================================================

/// In-memory implementation of [`FrontierStore`]
///
/// Keeps insertion order for unvisited selection, which makes pipeline tests
/// deterministic.
#[derive(Default)]
pub struct MemoryFrontierStore {
    inner: RwLock<MemoryFrontier>,
}

#[derive(Default)]
struct MemoryFrontier {
    entries: HashMap<String, FrontierEntry>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl MemoryFrontierStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.inner.read().map(|f| f.entries.len()).unwrap_or(0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FrontierStore for MemoryFrontierStore {
    async fn enqueue(&self, url: &str) -> Result<(), StoreError> {
        let mut frontier = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        if frontier.entries.contains_key(url) {
            return Ok(());
        }

        let seq = frontier.next_seq;
        frontier.next_seq += 1;
        frontier.order.insert(seq, url.to_string());
        frontier
            .entries
            .insert(url.to_string(), FrontierEntry::unvisited(url));
        Ok(())
    }

    async fn claim_next_unvisited(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        let frontier = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(frontier
            .order
            .values()
            .filter(|url| {
                frontier
                    .entries
                    .get(*url)
                    .map(|e| !e.visited)
                    .unwrap_or(false)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn claim(&self, url: &str) -> Result<(), StoreError> {
        let mut frontier = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        if let Some(entry) = frontier.entries.get_mut(url) {
            entry.visited = true;
        }
        Ok(())
    }

    async fn mark_visited(
        &self,
        url: &str,
        http_status: Option<u16>,
        timestamp: u64,
    ) -> Result<(), StoreError> {
        let mut frontier = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        if let Some(entry) = frontier.entries.get_mut(url) {
            entry.visited = true;
            entry.last_access = Some(timestamp);
            entry.last_http_status = http_status;
        }
        Ok(())
    }

    async fn entry(&self, url: &str) -> Result<Option<FrontierEntry>, StoreError> {
        let frontier = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(frontier.entries.get(url).cloned())
    }

    async fn counts(&self) -> Result<FrontierCounts, StoreError> {
        let frontier = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        let visited = frontier.entries.values().filter(|e| e.visited).count();
        Ok(FrontierCounts {
            total: frontier.entries.len() as u64,
            visited: visited as u64,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
