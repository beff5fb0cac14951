use anyhow::{Context, Result};
use daily_quote::carousel::images::FsImageSource;
use daily_quote::carousel::stage::CarouselStage;
use daily_quote::config::{Config, StoreBackend};
use daily_quote::content::cache::{FileCache, LocalCache, MemoryCache};
use daily_quote::content::{DailyContent, LocalClock};
use daily_quote::generator::{ArticleGenerator, ChatCompletions};
use daily_quote::store::{PostgrestStore, RecordStore, SqliteStore};
use daily_quote::tui::{self, CardSize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_CONFIG: &str = "config.toml";
const LOG_FILE: &str = "daily-quote.log";
const LOG_FILTER: &str = "daily_quote=info";

fn config_path() -> PathBuf {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}

fn init_logging(to_file: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(LOG_FILTER));
    if to_file {
        let log_file = std::fs::File::create(LOG_FILE)
            .with_context(|| format!("Failed to create log file: {}", LOG_FILE))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(log_file)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

async fn build_store(config: &Config) -> Result<Arc<dyn RecordStore>> {
    match config.store.backend {
        StoreBackend::Sqlite => {
            let store = SqliteStore::open(&config.store.sqlite_path)?;
            if let Some(seed) = &config.store.seed_quotes {
                match store.seed_quotes_if_empty(seed).await {
                    Ok(0) => {}
                    Ok(n) => tracing::info!(count = n, path = %seed.display(), "seeded quotes"),
                    Err(e) => tracing::warn!(error = %e, "quote seeding skipped"),
                }
            }
            Ok(Arc::new(store))
        }
        StoreBackend::Postgrest => {
            let url = config
                .store
                .postgrest_url
                .as_deref()
                .context("store.postgrest_url is required for the postgrest backend")?;
            Ok(Arc::new(PostgrestStore::new(url, Config::store_api_key()?)))
        }
    }
}

fn build_cache(config: &Config) -> Arc<dyn LocalCache> {
    match &config.cache.dir {
        Some(dir) => Arc::new(FileCache::new(dir.clone())),
        None => Arc::new(MemoryCache::new()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let sync_mode = std::env::args().any(|arg| arg == "--sync");
    init_logging(!sync_mode)?;

    let config = Config::load(&config_path())?;

    // Load saved keys from .env (real env vars take precedence)
    Config::load_env_file();

    let generator_key = Config::generator_api_key();
    if generator_key.is_none() {
        tracing::warn!("no generator key set; new articles will use the template");
    }

    let store = build_store(&config).await?;
    let generator: Arc<dyn ArticleGenerator> =
        Arc::new(ChatCompletions::new(&config.generator, generator_key)?);
    let content = Arc::new(DailyContent::new(
        store,
        generator,
        build_cache(&config),
        Arc::new(LocalClock),
    ));

    if sync_mode {
        let (daily, resolution) = content.load().await?;
        let summary = json!({
            "date": daily.date,
            "quote": daily.quote,
            "article": resolution.article,
            "source": resolution.source.as_str(),
            "persisted": resolution.persisted,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let content_rx = content.subscribe();
    let loader = {
        let content = content.clone();
        tokio::spawn(async move {
            // Failures are published through the content state.
            let _ = content.load().await;
        })
    };
    let rollover = content
        .clone()
        .spawn_rollover_watch(Duration::from_secs(config.daily.rollover_check_interval_s.max(1)));

    let source = Arc::new(FsImageSource::from_authors(&config.carousel.authors));
    let mut stage = CarouselStage::new(&config.carousel, config.background.clone(), source);
    let card = CardSize {
        width: config.carousel.card_width,
        height: config.carousel.card_height,
    };

    let result = tui::run_viewer(&mut stage, card, content_rx).await;

    rollover.abort();
    loader.abort();
    result
}
