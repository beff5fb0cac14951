pub mod postgrest;
pub mod sqlite;

use crate::content::types::{Article, Quote};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

pub use postgrest::PostgrestStore;
pub use sqlite::SqliteStore;

/// Backing store for quotes and daily articles.
///
/// Quotes are read-only from here; articles are only ever written through
/// `upsert_article`, which must overwrite on an `id` conflict so concurrent
/// writers for the same day converge on one row.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn count_quotes(&self) -> Result<u64>;
    /// Quote at `offset` in ascending `id` order.
    async fn quote_at(&self, offset: u64) -> Result<Option<Quote>>;
    async fn article_by_date(&self, date: NaiveDate) -> Result<Option<Article>>;
    /// Insert, or overwrite the row with the same `id`. Returns the stored row.
    async fn upsert_article(&self, article: &Article) -> Result<Article>;
}
