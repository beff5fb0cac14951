use super::RecordStore;
use crate::content::types::{Article, ArticleContent, ArticleKind, Quote};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS quotes (
    id           INTEGER PRIMARY KEY,
    quote_text   TEXT NOT NULL,
    quote_author TEXT NOT NULL,
    category     TEXT
);

CREATE TABLE IF NOT EXISTS articles (
    id             INTEGER PRIMARY KEY,
    type           TEXT NOT NULL,
    title          TEXT NOT NULL,
    excerpt        TEXT NOT NULL,
    quote_text     TEXT NOT NULL,
    author         TEXT NOT NULL,
    category       TEXT NOT NULL,
    read_time      TEXT NOT NULL,
    published_date TEXT NOT NULL UNIQUE,
    content        TEXT NOT NULL
);
";

const ARTICLE_COLUMNS: &str =
    "id, type, title, excerpt, quote_text, author, category, read_time, published_date, content";

#[derive(Debug, Deserialize)]
struct SeedQuote {
    quote_text: String,
    quote_author: String,
    #[serde(default)]
    category: Option<String>,
}

/// SQLite-backed record store. One connection behind a mutex; trait calls
/// run their statements on the blocking pool so the runtime never waits on
/// disk, and the lock is never held across an await.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

/// Raw `articles` row before date and JSON decoding.
struct ArticleRow {
    id: i64,
    kind: String,
    title: String,
    excerpt: String,
    quote_text: String,
    author: String,
    category: String,
    read_time: String,
    published_date: String,
    content: String,
}

impl ArticleRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            kind: row.get("type")?,
            title: row.get("title")?,
            excerpt: row.get("excerpt")?,
            quote_text: row.get("quote_text")?,
            author: row.get("author")?,
            category: row.get("category")?,
            read_time: row.get("read_time")?,
            published_date: row.get("published_date")?,
            content: row.get("content")?,
        })
    }

    fn into_article(self) -> Result<Article> {
        let kind = match self.kind.as_str() {
            "analysis" => ArticleKind::Analysis,
            other => anyhow::bail!("unknown article type '{}'", other),
        };
        let published_date = NaiveDate::parse_from_str(&self.published_date, "%Y-%m-%d")
            .with_context(|| format!("invalid published_date '{}'", self.published_date))?;
        let content: ArticleContent = serde_json::from_str(&self.content)
            .with_context(|| format!("invalid content JSON for article {}", self.id))?;
        Ok(Article {
            id: self.id,
            kind,
            title: self.title,
            excerpt: self.excerpt,
            quote_text: self.quote_text,
            author: self.author,
            category: self.category,
            read_time: self.read_time,
            published_date,
            content,
        })
    }
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("failed to create schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>> {
        conn.lock()
            .map_err(|_| anyhow!("sqlite connection mutex poisoned"))
    }

    /// Run `f` on the calling thread. For setup and test helpers only.
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = Self::lock(&self.conn)?;
        f(&conn)
    }

    /// Run `f` against the connection on the blocking pool.
    async fn interact<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            f(&conn)
        })
        .await
        .context("sqlite task panicked")?
    }

    /// Append a quote to the collection. Ids are assigned in insertion order.
    pub fn insert_quote(&self, text: &str, author: &str, category: Option<&str>) -> Result<Quote> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO quotes (quote_text, quote_author, category) VALUES (?1, ?2, ?3)",
                params![text, author, category],
            )?;
            Ok(Quote {
                id: conn.last_insert_rowid(),
                text: text.to_string(),
                author: author.to_string(),
                category: category.map(str::to_string),
            })
        })
    }

    /// Load quotes from a JSON array of `{quote_text, quote_author, category}`
    /// records, but only into an empty collection. Returns how many were added.
    pub async fn seed_quotes_if_empty(&self, path: &Path) -> Result<usize> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read quote seed file: {}", path.display()))?;
        let seeds: Vec<SeedQuote> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse quote seed file: {}", path.display()))?;

        self.interact(move |conn| {
            let existing: i64 = conn.query_row("SELECT COUNT(*) FROM quotes", [], |row| row.get(0))?;
            if existing > 0 {
                return Ok(0);
            }
            let tx = conn.unchecked_transaction()?;
            for seed in &seeds {
                tx.execute(
                    "INSERT INTO quotes (quote_text, quote_author, category) VALUES (?1, ?2, ?3)",
                    params![seed.quote_text, seed.quote_author, seed.category],
                )?;
            }
            tx.commit()?;
            Ok(seeds.len())
        })
        .await
    }

    /// Number of stored articles. Used to check the one-per-day invariant.
    pub fn count_articles(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
            Ok(n as u64)
        })
    }

    fn article_by_id(conn: &Connection, id: i64) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles WHERE id = ?1", ARTICLE_COLUMNS);
        conn.query_row(&sql, params![id], ArticleRow::from_row)
            .optional()?
            .map(ArticleRow::into_article)
            .transpose()
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn count_quotes(&self) -> Result<u64> {
        self.interact(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM quotes", [], |row| row.get(0))?;
            Ok(n as u64)
        })
        .await
    }

    async fn quote_at(&self, offset: u64) -> Result<Option<Quote>> {
        let offset = i64::try_from(offset)
            .map_err(|_| anyhow!("offset {} exceeds SQLite INTEGER range", offset))?;
        self.interact(move |conn| {
            let quote = conn
                .query_row(
                    "SELECT id, quote_text, quote_author, category FROM quotes
                     ORDER BY id LIMIT 1 OFFSET ?1",
                    params![offset],
                    |row| {
                        Ok(Quote {
                            id: row.get("id")?,
                            text: row.get("quote_text")?,
                            author: row.get("quote_author")?,
                            category: row.get("category")?,
                        })
                    },
                )
                .optional()?;
            Ok(quote)
        })
        .await
    }

    async fn article_by_date(&self, date: NaiveDate) -> Result<Option<Article>> {
        let sql = format!(
            "SELECT {} FROM articles WHERE published_date = ?1",
            ARTICLE_COLUMNS
        );
        let date = date.format("%Y-%m-%d").to_string();
        self.interact(move |conn| {
            conn.query_row(&sql, params![date], ArticleRow::from_row)
                .optional()?
                .map(ArticleRow::into_article)
                .transpose()
        })
        .await
    }

    async fn upsert_article(&self, article: &Article) -> Result<Article> {
        let content = serde_json::to_string(&article.content)?;
        let article = article.clone();
        self.interact(move |conn| {
            conn.execute(
                "INSERT INTO articles (id, type, title, excerpt, quote_text, author, category,
                                       read_time, published_date, content)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                     type = excluded.type,
                     title = excluded.title,
                     excerpt = excluded.excerpt,
                     quote_text = excluded.quote_text,
                     author = excluded.author,
                     category = excluded.category,
                     read_time = excluded.read_time,
                     published_date = excluded.published_date,
                     content = excluded.content",
                params![
                    article.id,
                    "analysis",
                    article.title,
                    article.excerpt,
                    article.quote_text,
                    article.author,
                    article.category,
                    article.read_time,
                    article.published_date.format("%Y-%m-%d").to_string(),
                    content,
                ],
            )
            .with_context(|| format!("upsert of article {} failed", article.id))?;
            Self::article_by_id(conn, article.id)?
                .ok_or_else(|| anyhow!("article {} missing after upsert", article.id))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_article(id: i64, date: NaiveDate, title: &str) -> Article {
        Article {
            id,
            kind: ArticleKind::Analysis,
            title: title.to_string(),
            excerpt: "excerpt".into(),
            quote_text: "The unexamined life is not worth living.".into(),
            author: "Socrates".into(),
            category: "Philosophy".into(),
            read_time: "6 min".into(),
            published_date: date,
            content: ArticleContent {
                intro: "intro \"quoted\" — with unicode é".into(),
                context: "context".into(),
                points: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                exercise: "exercise".into(),
                conclusion: "conclusion".into(),
            },
        }
    }

    #[tokio::test]
    async fn test_seed_only_fills_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quotes.json");
        std::fs::write(
            &path,
            r#"[{"quote_text":"Know thyself.","quote_author":"Thales"},
               {"quote_text":"Less is more.","quote_author":"Browning","category":"Art"}]"#,
        )
        .unwrap();

        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.seed_quotes_if_empty(&path).await.unwrap(), 2);
        assert_eq!(store.seed_quotes_if_empty(&path).await.unwrap(), 0);
        assert_eq!(store.count_quotes().await.unwrap(), 2);
        let q = store.quote_at(1).await.unwrap().unwrap();
        assert_eq!(q.category.as_deref(), Some("Art"));
    }

    #[tokio::test]
    async fn test_quote_at_follows_id_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_quote("first", "A", None).unwrap();
        store.insert_quote("second", "B", Some("Life")).unwrap();
        store.insert_quote("third", "C", None).unwrap();

        assert_eq!(store.count_quotes().await.unwrap(), 3);
        let q = store.quote_at(1).await.unwrap().unwrap();
        assert_eq!(q.text, "second");
        assert_eq!(q.category.as_deref(), Some("Life"));
        assert!(store.quote_at(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_then_read_by_date_roundtrips_content() {
        let store = SqliteStore::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let article = sample_article(4, date, "title");

        let saved = store.upsert_article(&article).await.unwrap();
        assert_eq!(saved, article);

        let read = store.article_by_date(date).await.unwrap().unwrap();
        assert_eq!(
            serde_json::to_string(&read.content).unwrap(),
            serde_json::to_string(&article.content).unwrap()
        );
    }

    #[tokio::test]
    async fn test_upsert_same_id_overwrites() {
        let store = SqliteStore::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        store.upsert_article(&sample_article(4, date, "first")).await.unwrap();
        let saved = store.upsert_article(&sample_article(4, date, "second")).await.unwrap();

        assert_eq!(saved.title, "second");
        assert_eq!(store.count_articles().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_second_article_for_same_day_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        store.upsert_article(&sample_article(4, date, "first")).await.unwrap();
        assert!(store.upsert_article(&sample_article(5, date, "other")).await.is_err());
        assert_eq!(store.count_articles().unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_calls_from_spawned_tasks_share_one_connection() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.insert_quote("first", "A", None).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.upsert_article(&sample_article(1, date, "same")).await.unwrap();
                    store.count_quotes().await.unwrap()
                })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap(), 1);
        }
        assert_eq!(store.count_articles().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_article_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(store.article_by_date(date).await.unwrap().is_none());
    }
}
