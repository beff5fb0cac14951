use thiserror::Error;

/// Failure kinds of the daily content pipeline.
///
/// Only `NoQuotesAvailable` and a `Store` failure while selecting the quote
/// reach the caller of `DailyContent::load`; everything else is absorbed by
/// a fallback somewhere along the chain.
#[derive(Error, Debug)]
pub enum ContentError {
    #[error("no quotes available")]
    NoQuotesAvailable,

    #[error("article generation failed: {0}")]
    Generation(String),

    #[error("record store error: {0}")]
    Store(String),

    #[error("local cache error: {0}")]
    Cache(String),
}

impl ContentError {
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(format!("{:#}", err))
    }

    pub fn generation(err: impl std::fmt::Display) -> Self {
        Self::Generation(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, ContentError>;
