use super::RecordStore;
use crate::content::types::{Article, Quote};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder};

/// Record store over a PostgREST endpoint (the hosted Supabase database).
pub struct PostgrestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Total row count from a `Content-Range` header such as `0-0/412` or `*/412`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/').and_then(|(_, total)| total.trim().parse().ok())
}

impl PostgrestStore {
    pub fn new(base_url: &str, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn fetch_rows<T: serde::de::DeserializeOwned>(
        &self,
        req: RequestBuilder,
        what: &str,
    ) -> Result<Vec<T>> {
        let resp = self
            .authed(req)
            .send()
            .await
            .with_context(|| format!("{} request failed", what))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{} failed ({}): {}", what, status, body);
        }
        resp.json()
            .await
            .with_context(|| format!("failed to parse {} response", what))
    }
}

#[async_trait]
impl RecordStore for PostgrestStore {
    async fn count_quotes(&self) -> Result<u64> {
        let req = self
            .client
            .head(self.table_url("quotes"))
            .query(&[("select", "id")])
            .header("Prefer", "count=exact");
        let resp = self.authed(req).send().await.context("quote count request failed")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("quote count failed ({})", status);
        }
        resp.headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .context("quote count response has no usable Content-Range header")
    }

    async fn quote_at(&self, offset: u64) -> Result<Option<Quote>> {
        let offset = offset.to_string();
        let req = self.client.get(self.table_url("quotes")).query(&[
            ("select", "id,quote_text,quote_author,category"),
            ("order", "id.asc"),
            ("offset", offset.as_str()),
            ("limit", "1"),
        ]);
        let rows: Vec<Quote> = self.fetch_rows(req, "quote fetch").await?;
        Ok(rows.into_iter().next())
    }

    async fn article_by_date(&self, date: NaiveDate) -> Result<Option<Article>> {
        let filter = format!("eq.{}", date.format("%Y-%m-%d"));
        let req = self.client.get(self.table_url("articles")).query(&[
            ("select", "*"),
            ("published_date", filter.as_str()),
            ("limit", "1"),
        ]);
        let rows: Vec<Article> = self.fetch_rows(req, "article lookup").await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_article(&self, article: &Article) -> Result<Article> {
        let req = self
            .client
            .post(self.table_url("articles"))
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&[article]);
        let rows: Vec<Article> = self.fetch_rows(req, "article upsert").await?;
        rows.into_iter()
            .next()
            .with_context(|| format!("article upsert for {} returned no row", article.id))
    }
}
