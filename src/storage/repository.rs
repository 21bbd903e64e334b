//! Article Store: ingested article metadata keyed by article id
//!
//! The upsert decision (insert / modify / unchanged) lives in
//! [`crate::crawler::upsert`]; the store only offers lookup, unconditional
//! overwrite and a count. Authors are kept in a child table with their
//! position so order survives a round-trip.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use url::Url;

use super::{lock, SharedConnection};
use crate::models::ArticleRecord;
use crate::utils::error::StoreError;

/// Trait for article storage operations
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Get an article by its id
    async fn article_by_id(&self, id: &str) -> Result<Option<ArticleRecord>, StoreError>;

    /// Insert or overwrite an article, authors included
    async fn update_article(&self, article: &ArticleRecord) -> Result<(), StoreError>;

    /// Number of stored articles
    async fn count(&self) -> Result<u64, StoreError>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of [`ArticleStore`]
pub struct SqliteArticleStore {
    conn: SharedConnection,
}

impl SqliteArticleStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ArticleStore for SqliteArticleStore {
    async fn article_by_id(&self, id: &str) -> Result<Option<ArticleRecord>, StoreError> {
        let conn = lock(&self.conn)?;

        let row = conn
            .query_row(
                "SELECT id, title, abstract, last_update_timestamp, source_url
                 FROM articles WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, title, abstract_text, timestamp, source_url)) = row else {
            return Ok(None);
        };

        let source_url = Url::parse(&source_url).map_err(|e| StoreError::Corrupt {
            table: "articles",
            reason: format!("invalid source_url {source_url:?}: {e}"),
        })?;

        let mut stmt = conn.prepare_cached(
            "SELECT name FROM article_authors WHERE article_id = ?1 ORDER BY position",
        )?;
        let authors = stmt
            .query_map(params![id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(ArticleRecord {
            id,
            title,
            authors,
            abstract_text,
            last_update_timestamp: timestamp.max(0) as u64,
            source_url,
        }))
    }

    async fn update_article(&self, article: &ArticleRecord) -> Result<(), StoreError> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
                INSERT INTO articles (id, title, abstract, last_update_timestamp, source_url)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    abstract = excluded.abstract,
                    last_update_timestamp = excluded.last_update_timestamp,
                    source_url = excluded.source_url
                "#,
            params![
                article.id,
                article.title,
                article.abstract_text,
                article.last_update_timestamp as i64,
                article.source_url.as_str(),
            ],
        )?;

        tx.execute(
            "DELETE FROM article_authors WHERE article_id = ?1",
            params![article.id],
        )?;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO article_authors (article_id, position, name) VALUES (?1, ?2, ?3)",
            )?;
            for (position, name) in article.authors.iter().enumerate() {
                stmt.execute(params![article.id, position as i64, name])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

// ============================================================================
// In-memory Implementation
// ============================================================================

/// In-memory implementation of [`ArticleStore`]
#[derive(Default)]
pub struct MemoryArticleStore {
    articles: RwLock<HashMap<String, ArticleRecord>>,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with the given articles
    pub fn with_articles(articles: impl IntoIterator<Item = ArticleRecord>) -> Self {
        Self {
            articles: RwLock::new(articles.into_iter().map(|a| (a.id.clone(), a)).collect()),
        }
    }

    /// Clear all articles
    pub fn clear(&self) {
        if let Ok(mut articles) = self.articles.write() {
            articles.clear();
        }
    }
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    async fn article_by_id(&self, id: &str) -> Result<Option<ArticleRecord>, StoreError> {
        let articles = self.articles.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(articles.get(id).cloned())
    }

    async fn update_article(&self, article: &ArticleRecord) -> Result<(), StoreError> {
        let mut articles = self.articles.write().map_err(|_| StoreError::LockPoisoned)?;
        articles.insert(article.id.clone(), article.clone());
        Ok(())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let articles = self.articles.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(articles.len() as u64)
    }
}

// ============================================================================
// Tests
// ============================================================================
