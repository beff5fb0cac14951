use super::cache::{read_dated, write_dated, LocalCache, DAILY_QUOTE_KEY};
use super::error::{ContentError, Result};
use super::types::{DailyQuote, Quote};
use crate::store::RecordStore;
use chrono::{Datelike, NaiveDate};

/// 1-based ordinal day of the year (Jan 1 = 1).
pub fn day_of_year(date: NaiveDate) -> u32 {
    date.ordinal()
}

/// Offset of the day's quote in a collection of `count` quotes.
pub fn daily_index(date: NaiveDate, count: u64) -> Option<u64> {
    if count == 0 {
        return None;
    }
    Some(u64::from(day_of_year(date)) % count)
}

/// Resolve the quote for `today`, from the local cache when it was already
/// picked today, otherwise from the store at `daily_index`.
pub async fn select_daily_quote(
    store: &dyn RecordStore,
    cache: &dyn LocalCache,
    today: NaiveDate,
) -> Result<DailyQuote> {
    if let Some(quote) = read_dated::<Quote>(cache, DAILY_QUOTE_KEY, today) {
        tracing::debug!(%today, quote_id = quote.id, "daily quote served from cache");
        return Ok(DailyQuote { date: today, quote });
    }

    let count = store.count_quotes().await.map_err(ContentError::store)?;
    let index = daily_index(today, count).ok_or(ContentError::NoQuotesAvailable)?;
    let quote = store
        .quote_at(index)
        .await
        .map_err(ContentError::store)?
        .ok_or_else(|| ContentError::Store(format!("no quote at offset {} of {}", index, count)))?;

    tracing::info!(%today, index, count, quote_id = quote.id, author = %quote.author, "daily quote selected");
    write_dated(cache, DAILY_QUOTE_KEY, today, &quote);
    Ok(DailyQuote { date: today, quote })
}
