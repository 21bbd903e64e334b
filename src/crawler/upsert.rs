//! Change-aware article upsert
//!
//! A record is written only when it is new or differs from the stored one
//! (ignoring `last_update_timestamp`). Re-crawling unchanged pages therefore
//! costs a lookup but never a write.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::metrics::CrawlMetrics;
use crate::models::ArticleRecord;
use crate::storage::ArticleStore;
use crate::utils::error::StoreError;

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    /// No record with this id existed
    Inserted,
    /// The stored record differed and was overwritten
    Modified,
    /// The stored record is identical; nothing was written
    Unchanged,
}

impl UpsertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Modified => "modified",
            Self::Unchanged => "unchanged",
        }
    }

    /// Whether the store was written
    pub fn wrote(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Upsert engine used by the Article Sink workers
///
/// Clones share one write lock, so the lookup and the write of an upsert
/// are atomic across every Article Sink worker.
#[derive(Clone)]
pub struct ArticleUpserter {
    store: Arc<dyn ArticleStore>,
    metrics: Arc<CrawlMetrics>,
    write_lock: Arc<Mutex<()>>,
}

impl ArticleUpserter {
    pub fn new(store: Arc<dyn ArticleStore>, metrics: Arc<CrawlMetrics>) -> Self {
        Self {
            store,
            metrics,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Insert, overwrite or skip `article` depending on the stored state
    pub async fn upsert(&self, article: &ArticleRecord) -> Result<UpsertOutcome, StoreError> {
        let _guard = self.write_lock.lock().await;

        let outcome = match self.store.article_by_id(&article.id).await? {
            None => {
                self.store.update_article(article).await?;
                self.metrics.record_inserted();
                UpsertOutcome::Inserted
            }
            Some(previous) if previous.same_content(article) => UpsertOutcome::Unchanged,
            Some(_) => {
                self.store.update_article(article).await?;
                self.metrics.record_modified();
                UpsertOutcome::Modified
            }
        };

        if outcome.wrote() {
            tracing::info!(article_id = %article.id, outcome = outcome.as_str(), "Upserted article");
        }

        Ok(outcome)
    }
}
