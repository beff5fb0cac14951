pub mod cache;
pub mod error;
pub mod fallback;
pub mod resolver;
pub mod selector;
pub mod types;

use crate::generator::ArticleGenerator;
use crate::store::RecordStore;
use cache::{discard, LocalCache, DAILY_ARTICLE_KEY, DAILY_QUOTE_KEY};
use chrono::NaiveDate;
use error::Result;
use resolver::{ArticleResolver, ArticleSource, Resolution};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use types::{Article, DailyQuote};

/// Source of "today" in the viewer's local zone.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// Observable state of the day's content.
#[derive(Debug, Clone)]
pub struct ContentState {
    pub quote: Option<DailyQuote>,
    pub article: Option<Article>,
    pub article_source: Option<ArticleSource>,
    pub is_loading: bool,
    pub is_generating: bool,
    pub error: Option<String>,
    pub current_date: NaiveDate,
}

impl ContentState {
    fn new(current_date: NaiveDate) -> Self {
        Self {
            quote: None,
            article: None,
            article_source: None,
            is_loading: true,
            is_generating: false,
            error: None,
            current_date,
        }
    }
}

/// Quote-of-the-day plus its article, resolved once per calendar day.
pub struct DailyContent {
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn LocalCache>,
    resolver: ArticleResolver,
    clock: Arc<dyn Clock>,
    state_tx: watch::Sender<ContentState>,
}

impl DailyContent {
    pub fn new(
        store: Arc<dyn RecordStore>,
        generator: Arc<dyn ArticleGenerator>,
        cache: Arc<dyn LocalCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let resolver = ArticleResolver::new(store.clone(), generator, cache.clone());
        let (state_tx, _) = watch::channel(ContentState::new(clock.today()));
        Self {
            store,
            cache,
            resolver,
            clock,
            state_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ContentState> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> ContentState {
        self.state_tx.borrow().clone()
    }

    /// Resolve today's quote, then its article. A missing quote stops the
    /// chain and is recorded in the state; article problems never do.
    pub async fn load(&self) -> Result<(DailyQuote, Resolution)> {
        let today = self.clock.today();
        self.state_tx.send_modify(|s| {
            s.current_date = today;
            s.is_loading = true;
            s.error = None;
        });

        let daily = match selector::select_daily_quote(self.store.as_ref(), self.cache.as_ref(), today).await {
            Ok(daily) => daily,
            Err(e) => {
                tracing::error!(%today, error = %e, "daily quote unavailable");
                self.state_tx.send_modify(|s| {
                    s.is_loading = false;
                    s.error = Some(e.to_string());
                });
                return Err(e);
            }
        };

        self.state_tx.send_modify(|s| {
            s.quote = Some(daily.clone());
            s.is_loading = false;
        });

        let resolution = match self.resolver.resolve_existing(&daily.quote, today).await {
            Some(found) => found,
            None => {
                self.state_tx.send_modify(|s| s.is_generating = true);
                let made = self.resolver.generate_and_persist(&daily.quote, today).await;
                self.state_tx.send_modify(|s| s.is_generating = false);
                made
            }
        };

        self.state_tx.send_modify(|s| {
            s.article = Some(resolution.article.clone());
            s.article_source = Some(resolution.source);
        });
        Ok((daily, resolution))
    }

    /// Reload when the local date moved past the loaded one. Returns whether
    /// a rollover happened.
    pub async fn check_rollover(&self) -> bool {
        let today = self.clock.today();
        let loaded = self.state_tx.borrow().current_date;
        if today == loaded {
            return false;
        }

        tracing::info!(from = %loaded, to = %today, "day rollover");
        discard(self.cache.as_ref(), DAILY_QUOTE_KEY);
        discard(self.cache.as_ref(), DAILY_ARTICLE_KEY);
        self.state_tx.send_modify(|s| {
            s.quote = None;
            s.article = None;
            s.article_source = None;
        });
        // Errors are already recorded in the state by `load`.
        let _ = self.load().await;
        true
    }

    /// Periodic rollover check. Abort the handle on teardown.
    pub fn spawn_rollover_watch(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick fires immediately; the initial load is the caller's job.
            interval.tick().await;
            loop {
                interval.tick().await;
                self.check_rollover().await;
            }
        })
    }
}
