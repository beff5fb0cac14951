use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ENV_FILE: &str = ".env";
const GENERATOR_KEY_VAR: &str = "DAILY_QUOTE_GENERATOR_KEY";
const STORE_KEY_VAR: &str = "DAILY_QUOTE_STORE_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub daily: DailyConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub carousel: CarouselConfig,
    #[serde(default)]
    pub background: BackgroundConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DailyConfig {
    /// How often the day-rollover check runs.
    pub rollover_check_interval_s: u64,
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            rollover_check_interval_s: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Postgrest,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub sqlite_path: PathBuf,
    pub postgrest_url: Option<String>,
    /// JSON file of quotes loaded into an empty SQLite collection on start.
    pub seed_quotes: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            sqlite_path: PathBuf::from("daily-quote.db"),
            postgrest_url: None,
            seed_quotes: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub request_timeout_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.7,
            request_timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory for the local JSON cache. `None` keeps the cache in memory.
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: Some(PathBuf::from(".daily-quote-cache")),
        }
    }
}

/// One carousel card: an author portrait plus the metadata shown on click.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AuthorCard {
    pub name: String,
    pub image: PathBuf,
    pub bio: Option<String>,
    pub birth: Option<String>,
    pub death: Option<String>,
    pub nationality: Option<String>,
    pub domain: Option<String>,
    pub known_for: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CarouselConfig {
    pub friction: f64,
    pub wheel_sensitivity: f64,
    pub drag_sensitivity: f64,
    /// Velocity magnitude (px/s) below which the track is considered at rest.
    pub velocity_epsilon: f64,
    /// Pointer travel (px) beyond which a press becomes a drag instead of a click.
    pub click_threshold_px: f64,
    pub max_rotation_deg: f64,
    pub max_depth: f64,
    pub min_scale: f64,
    pub scale_range: f64,
    pub max_blur: f64,
    pub blur_exponent: f64,
    pub gap: f64,
    pub card_width: f64,
    pub card_height: f64,
    /// Cards farther than this many half-viewports from centre are hidden.
    pub cull_factor: f64,
    pub preload_radius: usize,
    pub startup_wait_count: usize,
    pub startup_wait_timeout_ms: u64,
    pub startup_palette_count: usize,
    pub authors: Vec<AuthorCard>,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            friction: 0.92,
            wheel_sensitivity: 0.8,
            drag_sensitivity: 18.0,
            velocity_epsilon: 0.02,
            click_threshold_px: 5.0,
            max_rotation_deg: 28.0,
            max_depth: 140.0,
            min_scale: 0.92,
            scale_range: 0.1,
            max_blur: 2.0,
            blur_exponent: 1.1,
            gap: 28.0,
            card_width: 350.0,
            card_height: 450.0,
            cull_factor: 2.5,
            preload_radius: 4,
            startup_wait_count: 7,
            startup_wait_timeout_ms: 1000,
            startup_palette_count: 5,
            authors: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackgroundConfig {
    pub transition_ms: u64,
    pub fast_window_ms: u64,
    pub fast_interval_ms: u64,
    pub idle_interval_ms: u64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            transition_ms: 450,
            fast_window_ms: 800,
            fast_interval_ms: 16,
            idle_interval_ms: 33,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| "Failed to parse config TOML")?;
        Ok(config)
    }

    /// Load .env file into process environment. Real env vars take precedence.
    pub fn load_env_file() {
        let path = Path::new(ENV_FILE);
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };
        // Strip BOM if present (common on Windows-created files)
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        for line in content.lines() {
            let line = line.trim().trim_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"').trim_matches('\'');
                if std::env::var(key).is_err() {
                    std::env::set_var(key, value);
                }
            }
        }
    }

    /// Key for the text-generation endpoint. Absent means every generation
    /// falls through to the template article.
    pub fn generator_api_key() -> Option<String> {
        env_key(GENERATOR_KEY_VAR)
    }

    /// Service key for the PostgREST store.
    pub fn store_api_key() -> Result<String> {
        env_key(STORE_KEY_VAR).with_context(|| format!("{} is not set", STORE_KEY_VAR))
    }
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| sanitize_key(&v))
        .filter(|v| !v.is_empty())
}

/// Strip carriage returns, BOM, and other invisible chars from a key value.
fn sanitize_key(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "")
        .trim()
        .to_string()
}
