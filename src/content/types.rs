use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Category used when a stored quote has none.
pub const DEFAULT_CATEGORY: &str = "Reflection";

/// A stored quote. Column names follow the `quotes` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: i64,
    #[serde(rename = "quote_text")]
    pub text: String,
    #[serde(rename = "quote_author")]
    pub author: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl Quote {
    pub fn category_or_default(&self) -> &str {
        self.category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(DEFAULT_CATEGORY)
    }
}

/// The quote selected for a calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuote {
    pub date: NaiveDate,
    pub quote: Quote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleKind {
    Analysis,
}

/// Body sections of a daily article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleContent {
    pub intro: String,
    pub context: String,
    pub points: Vec<String>,
    pub exercise: String,
    pub conclusion: String,
}

/// One article per calendar day. `id` is the id of the quote it analyses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ArticleKind,
    pub title: String,
    pub excerpt: String,
    pub quote_text: String,
    pub author: String,
    pub category: String,
    pub read_time: String,
    pub published_date: NaiveDate,
    pub content: ArticleContent,
}
