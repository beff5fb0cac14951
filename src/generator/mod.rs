pub mod chat;

use crate::content::types::Quote;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

pub use chat::ChatCompletions;

/// Number of analysis points an article carries.
pub const ARTICLE_POINTS: usize = 4;

/// Article body as returned by the generator, before it is tied to a quote and a date.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneratedArticle {
    pub title: String,
    pub excerpt: String,
    pub intro: String,
    pub context: String,
    pub points: Vec<String>,
    pub exercise: String,
    pub conclusion: String,
}

#[async_trait]
pub trait ArticleGenerator: Send + Sync {
    async fn generate(&self, quote: &Quote) -> Result<GeneratedArticle>;
}

pub fn build_prompt(quote: &Quote) -> String {
    format!(
        r#"Write a complete, engaging blog article about this quote:

"{text}" - {author}

The article must contain:
1. A catchy, inspiring title
2. An engaging introduction (2-3 sentences)
3. The historical context of the quote
4. 4 key points of analysis or practical application
5. A practical exercise for the reader
6. An inspiring conclusion

Format your answer ONLY as strict JSON (no text before or after):
{{
  "title": "Article title",
  "excerpt": "Short summary in 1-2 sentences",
  "intro": "Introduction",
  "context": "Historical context",
  "points": ["Point 1", "Point 2", "Point 3", "Point 4"],
  "exercise": "Practical exercise",
  "conclusion": "Conclusion"
}}"#,
        text = quote.text,
        author = quote.author,
    )
}

/// Remove code fences and any prose around the outermost JSON object.
pub fn strip_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // Drop the info string ("json", "JSON", ...) up to the first newline.
        s = rest.split_once('\n').map_or(rest, |(_, body)| body);
    }
    if let Some(body) = s.trim_end().strip_suffix("```") {
        s = body;
    }
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if start < end => &s[start..=end],
        _ => s.trim(),
    }
}

/// First `{` from which an article object parses, ignoring anything after it.
fn embedded_article(s: &str) -> Option<GeneratedArticle> {
    s.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&s[start..])
            .into_iter::<GeneratedArticle>()
            .next()
            .and_then(|parsed| parsed.ok())
    })
}

/// Parse a generator reply into an article body.
pub fn parse_generated(raw: &str) -> Result<GeneratedArticle> {
    let body = strip_fences(raw);
    let mut article = match serde_json::from_str::<GeneratedArticle>(body) {
        Ok(article) => article,
        Err(e) => embedded_article(body)
            .ok_or(e)
            .context("generator reply is not the expected JSON object")?,
    };

    if article.title.trim().is_empty() {
        anyhow::bail!("generator reply has an empty title");
    }
    if article.points.len() < ARTICLE_POINTS {
        anyhow::bail!(
            "generator reply has {} points, expected {}",
            article.points.len(),
            ARTICLE_POINTS
        );
    }
    article.points.truncate(ARTICLE_POINTS);
    Ok(article)
}
