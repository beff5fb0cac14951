use super::types::{Article, ArticleContent, ArticleKind, Quote};
use chrono::NaiveDate;

pub const FALLBACK_READ_TIME: &str = "5 min";

/// Template article built from the quote alone. Used whenever generation
/// fails so the day still gets a stable article.
pub fn fallback_article(quote: &Quote, today: NaiveDate) -> Article {
    Article {
        id: quote.id,
        kind: ArticleKind::Analysis,
        title: format!("Analysis: \"{}\" by {}", quote.text, quote.author),
        excerpt: format!("Discover the deeper meaning of this quote by {}.", quote.author),
        quote_text: quote.text.clone(),
        author: quote.author.clone(),
        category: quote.category_or_default().to_string(),
        read_time: FALLBACK_READ_TIME.to_string(),
        published_date: today,
        content: ArticleContent {
            intro: format!(
                "This quote by {} invites us to reflect on a fundamental aspect of life.",
                quote.author
            ),
            context: format!("{} is known for a singular wisdom and insight.", quote.author),
            points: vec![
                "A close reading of what the words actually say".to_string(),
                "Putting it into practice in everyday life".to_string(),
                "The historical and cultural context of its time".to_string(),
                "Why it still matters today".to_string(),
            ],
            exercise: "Take five minutes to sit with this quote and write down what it evokes for you personally."
                .to_string(),
            conclusion: "This quote keeps inspiring and guiding generation after generation.".to_string(),
        },
    }
}
