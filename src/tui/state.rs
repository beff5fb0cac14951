use crate::config::AuthorCard;
use crate::content::ContentState;
use std::collections::VecDeque;

const MAX_LOGS: usize = 50;

#[derive(Debug, Clone)]
pub struct ViewState {
    pub content: ContentState,
    pub selected_author: Option<AuthorCard>,
    pub show_article: bool,
    pub article_scroll: u16,
    pub logs: VecDeque<LogEntry>,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub message: String,
}

impl ViewState {
    pub fn new(content: ContentState) -> Self {
        Self {
            content,
            selected_author: None,
            show_article: false,
            article_scroll: 0,
            logs: VecDeque::with_capacity(MAX_LOGS),
        }
    }

    pub fn push_log(&mut self, level: &str, message: String) {
        let time = chrono::Local::now().format("%H:%M:%S").to_string();
        if self.logs.len() >= MAX_LOGS {
            self.logs.pop_front();
        }
        self.logs.push_back(LogEntry {
            time,
            level: level.to_string(),
            message,
        });
    }

    /// Replace the content snapshot, logging the transitions worth noticing.
    pub fn update_content(&mut self, next: ContentState) {
        if next.current_date != self.content.current_date {
            self.push_log("INFO", format!("New day: {}", next.current_date));
            self.article_scroll = 0;
        }
        if next.is_generating && !self.content.is_generating {
            self.push_log("INFO", "Writing today's article".to_string());
        }
        if let (Some(article), None) = (&next.article, &self.content.article) {
            let source = next.article_source.map(|s| s.as_str()).unwrap_or("unknown");
            self.push_log("INFO", format!("Article ready ({}): {}", source, article.title));
        }
        if let Some(err) = next.error.as_ref().filter(|e| self.content.error.as_ref() != Some(*e)) {
            self.push_log("ERROR", err.clone());
        }
        self.content = next;
    }

    pub fn toggle_article(&mut self) {
        self.show_article = !self.show_article;
        self.article_scroll = 0;
    }

    pub fn scroll_article(&mut self, delta: i32) {
        self.article_scroll = (self.article_scroll as i32 + delta).clamp(0, u16::MAX as i32) as u16;
    }

    pub fn open_author(&mut self, author: AuthorCard) {
        self.push_log("INFO", format!("Opened {}", author.name));
        self.selected_author = Some(author);
    }

    pub fn close_overlay(&mut self) -> bool {
        if self.selected_author.take().is_some() {
            return true;
        }
        if self.show_article {
            self.show_article = false;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn state() -> ViewState {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        ViewState::new(ContentState {
            quote: None,
            article: None,
            article_source: None,
            is_loading: true,
            is_generating: false,
            error: None,
            current_date: today,
        })
    }

    #[test]
    fn test_log_is_capped() {
        let mut s = state();
        for i in 0..(MAX_LOGS + 10) {
            s.push_log("INFO", format!("line {}", i));
        }
        assert_eq!(s.logs.len(), MAX_LOGS);
        assert_eq!(s.logs.front().unwrap().message, "line 10");
    }

    #[test]
    fn test_update_content_logs_new_error_once() {
        let mut s = state();
        let mut next = s.content.clone();
        next.error = Some("no quotes available".to_string());
        s.update_content(next.clone());
        s.update_content(next);
        assert_eq!(s.logs.iter().filter(|l| l.level == "ERROR").count(), 1);
    }

    #[test]
    fn test_update_content_resets_scroll_on_new_day() {
        let mut s = state();
        s.scroll_article(12);
        let mut next = s.content.clone();
        next.current_date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        s.update_content(next);
        assert_eq!(s.article_scroll, 0);
        assert!(s.logs.back().unwrap().message.contains("2024-05-02"));
    }

    #[test]
    fn test_scroll_never_negative() {
        let mut s = state();
        s.scroll_article(-5);
        assert_eq!(s.article_scroll, 0);
        s.scroll_article(3);
        assert_eq!(s.article_scroll, 3);
    }

    #[test]
    fn test_close_overlay_order() {
        let mut s = state();
        s.toggle_article();
        s.open_author(AuthorCard {
            name: "Lao Tzu".to_string(),
            ..Default::default()
        });
        assert!(s.close_overlay());
        assert!(s.selected_author.is_none());
        assert!(s.show_article);
        assert!(s.close_overlay());
        assert!(!s.show_article);
        assert!(!s.close_overlay());
    }
}
