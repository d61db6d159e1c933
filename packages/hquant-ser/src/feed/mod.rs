//! Data-feed collaborators: sources of raw quote records and the loader
//! that appends them to a [`SerContext`](crate::SerContext).

pub mod csv;
mod loader;

pub use self::csv::{CsvFileSource, CsvQuoteParser};
pub use loader::{load_once, spawn_loader, LoadHandle, LoadReport, LoaderOptions};

use crate::error::Result;
use crate::types::Quote;

/// Quotes returned by one fetch, ascending by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchBatch {
    pub quotes: Vec<Quote>,
    /// Records that could not be parsed.
    pub skipped: usize,
}

/// A blocking source of quote records.
pub trait QuoteSource: Send {
    fn name(&self) -> &str;

    /// Records at or after `since` (all records when `None`). The record at
    /// `since` is the possibly still forming last bar and is sent again.
    fn fetch(&mut self, since: Option<i64>) -> Result<FetchBatch>;
}

/// In-memory source handing out at most `batch` new quotes per fetch, plus
/// the one at `since`.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    quotes: Vec<Quote>,
    batch: usize,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, mut quotes: Vec<Quote>) -> Self {
        quotes.sort_by_key(|q| q.time);
        let batch = quotes.len().max(1);
        Self {
            name: name.into(),
            quotes,
            batch,
        }
    }

    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch.max(1);
        self
    }

    /// Replaces the quote at the same time, or inserts it in order.
    pub fn upsert(&mut self, quote: Quote) {
        match self.quotes.binary_search_by_key(&quote.time, |q| q.time) {
            Ok(i) => self.quotes[i] = quote,
            Err(i) => self.quotes.insert(i, quote),
        }
    }
}

impl QuoteSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&mut self, since: Option<i64>) -> Result<FetchBatch> {
        let start = since.map_or(0, |t| self.quotes.partition_point(|q| q.time < t));
        let resent = since.is_some_and(|t| self.quotes.get(start).is_some_and(|q| q.time == t));
        let quotes = self
            .quotes
            .iter()
            .skip(start)
            .take(self.batch + usize::from(resent))
            .copied()
            .collect();
        Ok(FetchBatch { quotes, skipped: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn times(batch: &FetchBatch) -> Vec<i64> {
        batch.quotes.iter().map(|q| q.time).collect()
    }

    #[test]
    fn memory_source_pages_from_time() {
        let quotes = (1..=5).map(|i| Quote::new(i, 1.0, 1.0, 1.0, 1.0, 1.0)).collect();
        let mut src = MemorySource::new("mem", quotes).with_batch(2);
        assert_eq!(times(&src.fetch(None).unwrap()), vec![1, 2]);
        assert_eq!(times(&src.fetch(Some(2)).unwrap()), vec![2, 3, 4]);
        assert_eq!(times(&src.fetch(Some(5)).unwrap()), vec![5]);
        assert!(src.fetch(Some(6)).unwrap().quotes.is_empty());

        src.upsert(Quote::new(5, 2.0, 2.0, 2.0, 2.0, 1.0));
        src.upsert(Quote::new(0, 1.0, 1.0, 1.0, 1.0, 1.0));
        assert_eq!(src.fetch(Some(5)).unwrap().quotes[0].close, 2.0);
        assert_eq!(times(&src.fetch(None).unwrap()), vec![0, 1]);
    }
}
