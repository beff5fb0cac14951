// Integration tests for the daily quote and article pipeline

#[cfg(test)]
mod tests {
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use daily_quote::config::GeneratorConfig;
    use daily_quote::content::cache::{LocalCache, MemoryCache};
    use daily_quote::content::error::ContentError;
    use daily_quote::content::resolver::{ArticleResolver, ArticleSource};
    use daily_quote::content::types::{Article, Quote};
    use daily_quote::content::{Clock, DailyContent};
    use daily_quote::generator::{ArticleGenerator, ChatCompletions, GeneratedArticle};
    use daily_quote::store::{RecordStore, SqliteStore};
    use mockito::Server;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct FixedClock(Mutex<NaiveDate>);

    impl FixedClock {
        fn new(date: NaiveDate) -> Arc<Self> {
            Arc::new(Self(Mutex::new(date)))
        }

        fn set(&self, date: NaiveDate) {
            *self.0.lock().unwrap() = date;
        }
    }

    impl Clock for FixedClock {
        fn today(&self) -> NaiveDate {
            *self.0.lock().unwrap()
        }
    }

    /// Generator fake: counts calls, succeeds or fails on demand.
    struct ScriptedGenerator {
        calls: AtomicUsize,
        fail: bool,
    }

    impl ScriptedGenerator {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ArticleGenerator for ScriptedGenerator {
        async fn generate(&self, quote: &Quote) -> Result<GeneratedArticle> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("upstream returned 503");
            }
            Ok(GeneratedArticle {
                title: format!("On {} (draft {})", quote.author, n),
                excerpt: "A short look.".into(),
                intro: "intro".into(),
                context: "context".into(),
                points: vec!["one".into(), "two".into(), "three".into(), "four".into()],
                exercise: "exercise".into(),
                conclusion: "conclusion".into(),
            })
        }
    }

    /// Store wrapper whose article writes fail while `read_only` is set.
    struct ReadOnlyStore {
        inner: Arc<SqliteStore>,
        read_only: AtomicBool,
        writes: AtomicUsize,
    }

    impl ReadOnlyStore {
        fn new(inner: Arc<SqliteStore>) -> Arc<Self> {
            Arc::new(Self {
                inner,
                read_only: AtomicBool::new(true),
                writes: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RecordStore for ReadOnlyStore {
        async fn count_quotes(&self) -> Result<u64> {
            self.inner.count_quotes().await
        }

        async fn quote_at(&self, offset: u64) -> Result<Option<Quote>> {
            self.inner.quote_at(offset).await
        }

        async fn article_by_date(&self, date: NaiveDate) -> Result<Option<Article>> {
            self.inner.article_by_date(date).await
        }

        async fn upsert_article(&self, article: &Article) -> Result<Article> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.read_only.load(Ordering::SeqCst) {
                bail!("permission denied for table articles");
            }
            self.inner.upsert_article(article).await
        }
    }

    fn seeded_store() -> Arc<SqliteStore> {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_quote("The unexamined life is not worth living.", "Socrates", Some("Philosophy"))
            .unwrap();
        store
            .insert_quote("We suffer more often in imagination than in reality.", "Seneca", None)
            .unwrap();
        store
            .insert_quote("Man is condemned to be free.", "Jean-Paul Sartre", None)
            .unwrap();
        Arc::new(store)
    }

    fn daily(
        store: Arc<SqliteStore>,
        generator: Arc<dyn ArticleGenerator>,
        cache: Arc<dyn LocalCache>,
        clock: Arc<FixedClock>,
    ) -> DailyContent {
        DailyContent::new(store, generator, cache, clock)
    }

    #[tokio::test]
    async fn test_http_500_falls_back_and_persists() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body("{}")
            .create_async()
            .await;
        let config = GeneratorConfig {
            base_url: server.url(),
            request_timeout_ms: 5_000,
            ..Default::default()
        };
        let generator = Arc::new(ChatCompletions::new(&config, Some("key".into())).unwrap());
        let store = seeded_store();
        let today = ymd(2024, 5, 1);
        let content = daily(store.clone(), generator, Arc::new(MemoryCache::new()), FixedClock::new(today));

        let (quote, resolution) = content.load().await.unwrap();
        assert_eq!(resolution.source, ArticleSource::Fallback);
        assert!(resolution.persisted);
        assert!(resolution.article.title.contains(&quote.quote.author));
        assert_eq!(resolution.article.read_time, "5 min");
        assert_eq!(resolution.article.id, quote.quote.id);

        let stored = store.article_by_date(today).await.unwrap().unwrap();
        assert_eq!(stored, resolution.article);
        assert_eq!(store.count_articles().unwrap(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_day_index_picks_quote_and_generates() {
        let store = seeded_store();
        let generator = ScriptedGenerator::ok();
        // 2024-05-01 is day 122; 122 mod 3 = 2
        let content = daily(store, generator.clone(), Arc::new(MemoryCache::new()), FixedClock::new(ymd(2024, 5, 1)));

        let (quote, resolution) = content.load().await.unwrap();
        assert_eq!(quote.quote.id, 3);
        assert_eq!(resolution.source, ArticleSource::Generated);
        assert_eq!(resolution.article.read_time, "6 min");
        assert_eq!(resolution.article.category, "Reflection");
        assert_eq!(resolution.article.quote_text, quote.quote.text);
        assert_eq!(generator.calls(), 1);

        let state = content.snapshot();
        assert!(!state.is_loading);
        assert!(!state.is_generating);
        assert_eq!(state.article_source, Some(ArticleSource::Generated));
    }

    #[tokio::test]
    async fn test_second_load_same_day_uses_cache() {
        let store = seeded_store();
        let generator = ScriptedGenerator::failing();
        let cache: Arc<dyn LocalCache> = Arc::new(MemoryCache::new());
        let content = daily(store.clone(), generator.clone(), cache.clone(), FixedClock::new(ymd(2024, 5, 1)));

        let (_, first) = content.load().await.unwrap();
        let (_, second) = content.load().await.unwrap();
        assert_eq!(second.source, ArticleSource::Cache);
        assert_eq!(second.article, first.article);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_store_hit_skips_generation() {
        let store = seeded_store();
        let today = ymd(2024, 5, 1);

        // another client already wrote today's article
        let writer = ArticleResolver::new(store.clone(), ScriptedGenerator::ok(), Arc::new(MemoryCache::new()));
        let quote = store.quote_at(2).await.unwrap().unwrap();
        let written = writer.resolve(&quote, today).await;

        let generator = ScriptedGenerator::ok();
        let content = daily(store, generator.clone(), Arc::new(MemoryCache::new()), FixedClock::new(today));
        let (_, resolution) = content.load().await.unwrap();
        assert_eq!(resolution.source, ArticleSource::Store);
        assert_eq!(resolution.article, written.article);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_leave_one_article() {
        let store = seeded_store();
        let today = ymd(2024, 5, 1);
        let quote = store.quote_at(2).await.unwrap().unwrap();

        let a = ArticleResolver::new(store.clone(), ScriptedGenerator::ok(), Arc::new(MemoryCache::new()));
        let b = ArticleResolver::new(store.clone(), ScriptedGenerator::ok(), Arc::new(MemoryCache::new()));
        let (ra, rb) = tokio::join!(a.resolve(&quote, today), b.resolve(&quote, today));

        assert!(ra.persisted && rb.persisted);
        assert_eq!(store.count_articles().unwrap(), 1);
        let stored = store.article_by_date(today).await.unwrap().unwrap();
        assert_eq!(stored.id, quote.id);
        assert!(stored == ra.article || stored == rb.article);
    }

    #[tokio::test]
    async fn test_store_write_failure_still_serves_article() {
        let store = seeded_store();
        let today = ymd(2024, 5, 1);
        let quote = store.quote_at(0).await.unwrap().unwrap();
        let cache: Arc<dyn LocalCache> = Arc::new(MemoryCache::new());
        let read_only = ReadOnlyStore::new(store.clone());
        let generator = ScriptedGenerator::ok();
        let resolver = ArticleResolver::new(read_only.clone(), generator.clone(), cache.clone());

        let first = resolver.resolve(&quote, today).await;
        assert_eq!(first.source, ArticleSource::Generated);
        assert!(!first.persisted);
        assert_eq!(store.count_articles().unwrap(), 0);

        // the local copy still short-circuits generation, and says it is unsaved
        let second = resolver.resolve(&quote, today).await;
        assert_eq!(second.source, ArticleSource::Cache);
        assert_eq!(second.article, first.article);
        assert!(!second.persisted);
        assert_eq!(store.count_articles().unwrap(), 0);
        assert_eq!(generator.calls(), 1);
        assert_eq!(read_only.writes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unsaved_cached_article_is_written_once_store_recovers() {
        let store = seeded_store();
        let today = ymd(2024, 5, 1);
        let quote = store.quote_at(0).await.unwrap().unwrap();
        let read_only = ReadOnlyStore::new(store.clone());
        let resolver = ArticleResolver::new(
            read_only.clone(),
            ScriptedGenerator::ok(),
            Arc::new(MemoryCache::new()),
        );

        let first = resolver.resolve(&quote, today).await;
        assert!(!first.persisted);

        read_only.read_only.store(false, Ordering::SeqCst);
        let second = resolver.resolve(&quote, today).await;
        assert_eq!(second.source, ArticleSource::Cache);
        assert!(second.persisted);
        assert_eq!(second.article, first.article);
        assert_eq!(store.article_by_date(today).await.unwrap(), Some(first.article));

        // persisted now, so no further writes
        let third = resolver.resolve(&quote, today).await;
        assert!(third.persisted);
        assert_eq!(read_only.writes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_collection_reports_no_quotes() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let generator = ScriptedGenerator::ok();
        let content = daily(store, generator.clone(), Arc::new(MemoryCache::new()), FixedClock::new(ymd(2024, 5, 1)));

        let err = content.load().await.unwrap_err();
        assert!(matches!(err, ContentError::NoQuotesAvailable));
        let state = content.snapshot();
        assert_eq!(state.error.as_deref(), Some("no quotes available"));
        assert!(state.quote.is_none());
        assert!(!state.is_loading);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_rollover_reloads_for_new_day() {
        let store = seeded_store();
        let clock = FixedClock::new(ymd(2024, 5, 1));
        let content = daily(store.clone(), ScriptedGenerator::ok(), Arc::new(MemoryCache::new()), clock.clone());
        let mut rx = content.subscribe();

        content.load().await.unwrap();
        assert!(!content.check_rollover().await);

        clock.set(ymd(2024, 5, 2));
        assert!(content.check_rollover().await);

        let state = rx.borrow_and_update().clone();
        assert_eq!(state.current_date, ymd(2024, 5, 2));
        // day 123 mod 3 = 0
        assert_eq!(state.quote.unwrap().quote.id, 1);
        assert_eq!(state.article.unwrap().published_date, ymd(2024, 5, 2));
        assert_eq!(store.count_articles().unwrap(), 2);
        assert!(!content.check_rollover().await);
    }
}
