//! CSV quote records, e.g. Yahoo's `Date,Open,High,Low,Close,Volume[,Adj Close]`.
//!
//! Columns are found by header name (case-insensitive):
//! - `date`, `time`, `datetime`, `timestamp`, `dt` → row time
//! - `open`, `high`, `low`, `volume`/`vol`, `amount`
//! - `close`/`price`, falling back to `adj close`
//!
//! Only a time and a close column are required; missing `open`/`high`/`low`
//! take the close. Rows that fail to parse are skipped and counted.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use ::csv::{ReaderBuilder, StringRecord};
use chrono::{NaiveDate, NaiveDateTime};
use tracing::warn;

use super::{FetchBatch, QuoteSource};
use crate::error::{Error, Result};
use crate::frequency::Calendar;
use crate::types::Quote;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}

fn is_date_column(name: &str) -> bool {
    matches!(name, "date" | "time" | "datetime" | "timestamp" | "dt")
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    time: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: usize,
    volume: Option<usize>,
    amount: Option<usize>,
}

impl Columns {
    fn detect(headers: &StringRecord) -> Result<Self> {
        let map: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, h)| (normalize_header(h), idx))
            .collect();
        let find = |names: &[&str]| names.iter().find_map(|n| map.get(*n).copied());

        let time = headers
            .iter()
            .position(|h| is_date_column(&normalize_header(h)))
            .ok_or_else(|| Error::Source("CSV has no date column".to_string()))?;
        let close = find(&["close", "price", "adj close", "adjusted close"])
            .ok_or_else(|| Error::Source("CSV has no close column".to_string()))?;
        Ok(Self {
            time,
            open: find(&["open"]),
            high: find(&["high"]),
            low: find(&["low"]),
            close,
            volume: find(&["volume", "vol"]),
            amount: find(&["amount"]),
        })
    }
}

/// Parses CSV quote records into ascending, de-duplicated [`Quote`]s.
///
/// Dates without a time of day are taken at local midnight of the
/// calendar's zone. Integer timestamps are epoch milliseconds.
#[derive(Debug, Clone)]
pub struct CsvQuoteParser {
    date_format: String,
    calendar: Calendar,
}

impl Default for CsvQuoteParser {
    fn default() -> Self {
        Self::new(Calendar::default())
    }
}

impl CsvQuoteParser {
    pub fn new(calendar: Calendar) -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            calendar,
        }
    }

    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    pub fn parse_time(&self, raw: &str) -> Option<i64> {
        let raw = raw.trim();
        if let Ok(ms) = raw.parse::<i64>() {
            return Some(ms);
        }
        let local = NaiveDateTime::parse_from_str(raw, &self.date_format)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(raw, &self.date_format)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })?;
        Some(self.calendar.to_utc_ms(local))
    }

    pub fn parse_str(&self, data: &str) -> Result<FetchBatch> {
        self.parse_reader(data.as_bytes())
    }

    pub fn parse_reader<R: Read>(&self, reader: R) -> Result<FetchBatch> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(::csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader
            .headers()
            .map_err(|e| Error::Source(e.to_string()))?
            .clone();
        let cols = Columns::detect(&headers)?;

        let mut batch = FetchBatch::default();
        for (idx, result) in csv_reader.records().enumerate() {
            // +2: header line, 1-based
            let line = idx + 2;
            let parsed = result
                .map_err(|e| e.to_string())
                .and_then(|record| self.parse_record(&record, &cols));
            match parsed {
                Ok(quote) => batch.quotes.push(quote),
                Err(reason) => {
                    let err = Error::MalformedRow { line, reason };
                    warn!(%err, "skipped CSV row");
                    batch.skipped += 1;
                }
            }
        }

        batch.quotes.sort_by_key(|q| q.time);
        batch.quotes.dedup_by(|next, kept| {
            let dup = next.time == kept.time;
            if dup {
                *kept = *next;
            }
            dup
        });
        Ok(batch)
    }

    fn parse_record(&self, record: &StringRecord, cols: &Columns) -> std::result::Result<Quote, String> {
        let field = |idx: usize| record.get(idx).unwrap_or("");
        let number = |idx: usize| -> std::result::Result<f64, String> {
            let raw = field(idx);
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("cannot parse {raw:?} as number"))
        };
        let optional = |idx: Option<usize>, fallback: f64| idx.map_or(Ok(fallback), number);

        let raw_time = field(cols.time);
        let time = self
            .parse_time(raw_time)
            .ok_or_else(|| format!("cannot parse {raw_time:?} as date"))?;
        let close = number(cols.close)?;
        let quote = Quote::new(
            time,
            optional(cols.open, close)?,
            optional(cols.high, close)?,
            optional(cols.low, close)?,
            close,
            optional(cols.volume, 0.0)?,
        );
        Ok(quote.with_amount(optional(cols.amount, f64::NAN)?))
    }
}

/// Re-reads a CSV file on each fetch.
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    name: String,
    path: PathBuf,
    parser: CsvQuoteParser,
}

impl CsvFileSource {
    pub fn new(path: impl AsRef<Path>, parser: CsvQuoteParser) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: path.display().to_string(),
            path,
            parser,
        }
    }
}

impl QuoteSource for CsvFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&mut self, since: Option<i64>) -> Result<FetchBatch> {
        let file = File::open(&self.path)
            .map_err(|e| Error::Source(format!("{}: {e}", self.path.display())))?;
        let mut batch = self.parser.parse_reader(BufReader::new(file))?;
        if let Some(since) = since {
            batch.quotes.retain(|q| q.time >= since);
        }
        Ok(batch)
    }
}
