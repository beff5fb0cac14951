//! Local persistent key-value cache for the day's quote and article.
//!
//! Entries are JSON `{date, payload}`. An entry is only ever served for the
//! date it was written on; stale or unreadable entries are removed on read.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

pub const DAILY_QUOTE_KEY: &str = "dailyQuote";
pub const DAILY_ARTICLE_KEY: &str = "dailyArticle";

pub trait LocalCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub date: NaiveDate,
    pub payload: T,
}

/// Read `key` if it was written for `today`.
pub fn read_dated<T: DeserializeOwned>(
    cache: &dyn LocalCache,
    key: &str,
    today: NaiveDate,
) -> Option<T> {
    let raw = match cache.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(key, error = %e, "cache read failed");
            return None;
        }
    };

    match serde_json::from_str::<CacheEntry<T>>(&raw) {
        Ok(entry) if entry.date == today => Some(entry.payload),
        Ok(entry) => {
            tracing::debug!(key, cached = %entry.date, %today, "discarding stale cache entry");
            discard(cache, key);
            None
        }
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding corrupt cache entry");
            discard(cache, key);
            None
        }
    }
}

/// Write `payload` under `key` for `today`. Failures are logged, never returned.
pub fn write_dated<T: Serialize>(cache: &dyn LocalCache, key: &str, today: NaiveDate, payload: &T) {
    let entry = CacheEntry {
        date: today,
        payload,
    };
    let result = serde_json::to_string(&entry)
        .context("failed to serialize cache entry")
        .and_then(|raw| cache.set(key, &raw));
    if let Err(e) = result {
        tracing::warn!(key, error = %e, "cache write failed");
    }
}

pub fn discard(cache: &dyn LocalCache, key: &str) {
    if let Err(e) = cache.remove(key) {
        tracing::warn!(key, error = %e, "cache remove failed");
    }
}

/// One JSON file per key under a directory.
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl LocalCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read cache file: {}", path.display())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache dir: {}", self.dir.display()))?;
        let path = self.path_for(key);
        std::fs::write(&path, value)
            .with_context(|| format!("Failed to write cache file: {}", path.display()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove cache file: {}", path.display())),
        }
    }
}

/// In-process cache, used when no cache directory is configured.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| anyhow::anyhow!("cache mutex poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow::anyhow!("cache mutex poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow::anyhow!("cache mutex poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}
