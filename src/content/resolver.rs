use super::cache::{read_dated, write_dated, LocalCache, DAILY_ARTICLE_KEY};
use super::error::{ContentError, Result};
use super::fallback::fallback_article;
use super::types::{Article, ArticleContent, ArticleKind, Quote};
use crate::generator::ArticleGenerator;
use crate::store::RecordStore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const GENERATED_READ_TIME: &str = "6 min";

/// Where the day's article came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleSource {
    Cache,
    Store,
    Generated,
    Fallback,
}

impl ArticleSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ArticleSource::Cache => "cache",
            ArticleSource::Store => "store",
            ArticleSource::Generated => "generated",
            ArticleSource::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub article: Article,
    pub source: ArticleSource,
    /// False when the store write failed and the article only lives locally.
    pub persisted: bool,
}

/// Cached article plus whether the store holds it. An unpersisted entry is
/// served from the cache but its store write is retried on every resolve.
#[derive(Debug, Serialize, Deserialize)]
struct CachedArticle {
    article: Article,
    persisted: bool,
}

/// Cache → store → generate (or fallback) chain for the day's article.
///
/// No locking: two resolvers racing past the store lookup both generate, and
/// the store's upsert on `id` leaves a single row for the day.
pub struct ArticleResolver {
    store: Arc<dyn RecordStore>,
    generator: Arc<dyn ArticleGenerator>,
    cache: Arc<dyn LocalCache>,
}

impl ArticleResolver {
    pub fn new(
        store: Arc<dyn RecordStore>,
        generator: Arc<dyn ArticleGenerator>,
        cache: Arc<dyn LocalCache>,
    ) -> Self {
        Self {
            store,
            generator,
            cache,
        }
    }

    /// Full chain. Never fails: the worst case is an unpersisted fallback.
    pub async fn resolve(&self, quote: &Quote, today: NaiveDate) -> Resolution {
        match self.resolve_existing(quote, today).await {
            Some(found) => found,
            None => self.generate_and_persist(quote, today).await,
        }
    }

    /// Steps 1 and 2: local cache, then the store. `None` means the article
    /// has to be produced.
    pub async fn resolve_existing(&self, quote: &Quote, today: NaiveDate) -> Option<Resolution> {
        if let Some(cached) = self.from_cache(today) {
            return Some(self.serve_cached(cached, today).await);
        }

        match self.from_store(today).await {
            Ok(Some(article)) => {
                if article.id != quote.id {
                    tracing::warn!(
                        %today,
                        article_id = article.id,
                        quote_id = quote.id,
                        "stored article was written for a different quote"
                    );
                }
                self.to_cache(today, &article, true);
                Some(Resolution {
                    article,
                    source: ArticleSource::Store,
                    persisted: true,
                })
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(%today, error = %e, "article lookup failed, treating as absent");
                None
            }
        }
    }

    /// Step 3: generate (or fall back), upsert, cache.
    pub async fn generate_and_persist(&self, quote: &Quote, today: NaiveDate) -> Resolution {
        let (article, source) = match self.generate(quote, today).await {
            Ok(article) => (article, ArticleSource::Generated),
            Err(e) => {
                tracing::warn!(%today, quote_id = quote.id, error = %e, "using fallback article");
                (fallback_article(quote, today), ArticleSource::Fallback)
            }
        };

        let (article, persisted) = match self.persist(&article).await {
            Ok(saved) => (saved, true),
            Err(e) => {
                tracing::error!(%today, article_id = article.id, error = %e, "article not persisted");
                (article, false)
            }
        };

        self.to_cache(today, &article, persisted);
        tracing::info!(%today, source = source.as_str(), persisted, title = %article.title, "daily article ready");
        Resolution {
            article,
            source,
            persisted,
        }
    }

    async fn serve_cached(&self, cached: CachedArticle, today: NaiveDate) -> Resolution {
        let CachedArticle { article, persisted } = cached;
        if persisted {
            return Resolution {
                article,
                source: ArticleSource::Cache,
                persisted,
            };
        }

        match self.persist(&article).await {
            Ok(saved) => {
                tracing::info!(%today, article_id = saved.id, "cached article persisted on retry");
                self.to_cache(today, &saved, true);
                Resolution {
                    article: saved,
                    source: ArticleSource::Cache,
                    persisted: true,
                }
            }
            Err(e) => {
                tracing::warn!(%today, article_id = article.id, error = %e, "article still not persisted");
                Resolution {
                    article,
                    source: ArticleSource::Cache,
                    persisted: false,
                }
            }
        }
    }

    fn from_cache(&self, today: NaiveDate) -> Option<CachedArticle> {
        read_dated(self.cache.as_ref(), DAILY_ARTICLE_KEY, today)
    }

    fn to_cache(&self, today: NaiveDate, article: &Article, persisted: bool) {
        let entry = CachedArticle {
            article: article.clone(),
            persisted,
        };
        write_dated(self.cache.as_ref(), DAILY_ARTICLE_KEY, today, &entry);
    }

    async fn from_store(&self, today: NaiveDate) -> Result<Option<Article>> {
        self.store
            .article_by_date(today)
            .await
            .map_err(ContentError::store)
    }

    async fn generate(&self, quote: &Quote, today: NaiveDate) -> Result<Article> {
        let generated = self
            .generator
            .generate(quote)
            .await
            .map_err(ContentError::generation)?;
        Ok(Article {
            id: quote.id,
            kind: ArticleKind::Analysis,
            title: generated.title,
            excerpt: generated.excerpt,
            quote_text: quote.text.clone(),
            author: quote.author.clone(),
            category: quote.category_or_default().to_string(),
            read_time: GENERATED_READ_TIME.to_string(),
            published_date: today,
            content: ArticleContent {
                intro: generated.intro,
                context: generated.context,
                points: generated.points,
                exercise: generated.exercise,
                conclusion: generated.conclusion,
            },
        })
    }

    async fn persist(&self, article: &Article) -> Result<Article> {
        self.store
            .upsert_article(article)
            .await
            .map_err(ContentError::store)
    }
}
