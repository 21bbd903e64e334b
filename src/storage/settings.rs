//! SQLite-backed crawl target (`crawler_config` table)

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use super::{lock, SharedConnection};
use crate::config::ConfigProvider;
use crate::error::{Error, Result};
use crate::models::CrawlConfiguration;
use crate::utils::error::StoreError;

/// Reads the single crawl target row; writes it via [`set_configuration`](Self::set_configuration)
pub struct SqliteConfigProvider {
    conn: SharedConnection,
}

impl SqliteConfigProvider {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Replace the stored crawl target
    pub fn set_configuration(&self, configuration: &CrawlConfiguration) -> Result<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            r#"
                INSERT INTO crawler_config (id, root_url, desired_article_count)
                VALUES (1, ?1, ?2)
                ON CONFLICT(id) DO UPDATE SET
                    root_url = excluded.root_url,
                    desired_article_count = excluded.desired_article_count
                "#,
            params![
                configuration.root_url,
                configuration.desired_article_count as i64
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl ConfigProvider for SqliteConfigProvider {
    async fn crawl_configuration(&self) -> Result<CrawlConfiguration> {
        let conn = lock(&self.conn)?;
        let row = conn
            .query_row(
                "SELECT root_url, desired_article_count FROM crawler_config WHERE id = 1",
                [],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()
            .map_err(StoreError::from)?;

        match row {
            Some((root_url, desired)) => Ok(CrawlConfiguration::new(root_url, desired.max(0) as u64)),
            None => Err(Error::NoConfigs),
        }
    }
}
