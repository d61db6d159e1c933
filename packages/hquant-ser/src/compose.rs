use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::frequency::{Calendar, Frequency};
use crate::ser::Ser;
use crate::types::Quote;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeEventKind {
    BarUpdated,
    BarClosed,
}

#[derive(Debug, Clone, Copy)]
pub struct ComposeEvent {
    pub kind: ComposeEventKind,
    pub bar: Quote,
}

fn nan_sum(a: f64, b: f64) -> f64 {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => f64::NAN,
        (true, false) => b,
        (false, true) => a,
        (false, false) => a + b,
    }
}

fn merge(bar: &mut Quote, q: &Quote) {
    bar.high = bar.high.max(q.high);
    bar.low = bar.low.min(q.low);
    bar.close = q.close;
    bar.volume = nan_sum(bar.volume, q.volume);
    bar.amount = nan_sum(bar.amount, q.amount);
}

/// Folds fine-frequency quotes into bars of a coarser frequency.
///
/// A bar is stamped with the begin time of its calendar bucket. Input must be
/// time ordered; a quote from an older bucket than the forming bar is
/// rejected.
#[derive(Debug, Clone)]
pub struct Composer {
    freq: Frequency,
    calendar: Calendar,
    current: Option<Quote>,
    events: VecDeque<ComposeEvent>,
}

impl Composer {
    pub fn new(freq: Frequency, calendar: Calendar) -> Self {
        Self {
            freq,
            calendar,
            current: None,
            events: VecDeque::new(),
        }
    }

    pub fn freq(&self) -> Frequency {
        self.freq
    }

    /// Bucket begin time of the bar that would contain `time`.
    pub fn bucket_of(&self, time: i64) -> i64 {
        self.freq.begin_time_of_freq_that_include(time, &self.calendar)
    }

    /// The bar being formed, if any.
    pub fn current(&self) -> Option<&Quote> {
        self.current.as_ref()
    }

    pub fn push(&mut self, q: &Quote) -> Result<()> {
        let open_time = self.bucket_of(q.time);
        match &mut self.current {
            Some(cur) if cur.time == open_time => {
                merge(cur, q);
                let bar = *cur;
                self.events.push_back(ComposeEvent {
                    kind: ComposeEventKind::BarUpdated,
                    bar,
                });
            }
            Some(cur) if open_time < cur.time => {
                return Err(Error::NonMonotonicTime {
                    time: q.time,
                    last: cur.time,
                });
            }
            slot => {
                if let Some(prev) = slot.take() {
                    self.events.push_back(ComposeEvent {
                        kind: ComposeEventKind::BarClosed,
                        bar: prev,
                    });
                }
                let bar = Quote { time: open_time, ..*q };
                *slot = Some(bar);
                self.events.push_back(ComposeEvent {
                    kind: ComposeEventKind::BarUpdated,
                    bar,
                });
            }
        }
        Ok(())
    }

    /// Closes the forming bar.
    pub fn flush(&mut self) {
        if let Some(bar) = self.current.take() {
            self.events.push_back(ComposeEvent {
                kind: ComposeEventKind::BarClosed,
                bar,
            });
        }
    }

    pub fn reset(&mut self) {
        self.current = None;
        self.events.clear();
    }

    pub fn poll_events(&mut self) -> Vec<ComposeEvent> {
        self.events.drain(..).collect()
    }

    /// Starts over and folds `quotes` into complete bars; the last one may
    /// still be forming.
    pub fn compose(&mut self, quotes: &[Quote]) -> Result<Vec<Quote>> {
        self.reset();
        for q in quotes {
            self.push(q)?;
        }
        let mut bars: Vec<Quote> = self
            .poll_events()
            .into_iter()
            .filter(|ev| ev.kind == ComposeEventKind::BarClosed)
            .map(|ev| ev.bar)
            .collect();
        bars.extend(self.current);
        Ok(bars)
    }

    /// Source rows needed to rebuild every target bar touched by a change
    /// starting at `from_time`.
    pub fn source_rows_from(&self, src: &Ser, from_time: i64) -> Vec<Quote> {
        match src.timestamps().ceil_row(self.bucket_of(from_time)) {
            Some(row) => src.quotes_from(row),
            None => Vec::new(),
        }
    }
}
