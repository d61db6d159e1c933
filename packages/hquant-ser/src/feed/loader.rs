use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::QuoteSource;
use crate::config::LoaderConfig;
use crate::context::{lock_context, SerContext};
use crate::error::{Error, Result};
use crate::ser::Ser;
use crate::types::Quote;

/// Outcome of one load cycle (or the sum of a loader's cycles).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Rows appended or rewritten.
    pub loaded: usize,
    /// Re-sent rows identical to the stored ones.
    pub unchanged: usize,
    pub skipped: usize,
    pub last_loaded_time: Option<i64>,
    /// False when the cycle was cancelled before every fetched row was applied.
    pub complete: bool,
}

impl LoadReport {
    fn absorb(&mut self, cycle: &LoadReport) {
        self.loaded += cycle.loaded;
        self.unchanged += cycle.unchanged;
        self.skipped += cycle.skipped;
        self.last_loaded_time = cycle.last_loaded_time.or(self.last_loaded_time);
        self.complete = cycle.complete;
    }
}

/// Fetches everything from the context's last loaded time on and applies
/// it. The last loaded bar is fetched again, so a forming bar is rewritten
/// once the source has moved it; rows equal to the stored ones are left
/// alone. The fetch runs without holding the lock; rows are applied under
/// it, checking `run` between rows. One change event is signalled per cycle,
/// from the earliest changed row.
///
/// A failed fetch leaves the context untouched.
pub fn load_once(ctx: &Mutex<SerContext>, source: &mut dyn QuoteSource, run: &AtomicBool) -> Result<LoadReport> {
    let since = lock_context(ctx)?.last_loaded_time();
    let batch = source.fetch(since)?;

    let mut guard = lock_context(ctx)?;
    let mut report = LoadReport {
        skipped: batch.skipped,
        complete: true,
        ..LoadReport::default()
    };
    let mut first_time: Option<i64> = None;
    for quote in &batch.quotes {
        if !run.load(Ordering::Relaxed) {
            report.complete = false;
            break;
        }
        if is_stored(guard.base_ser(), quote) {
            report.unchanged += 1;
            continue;
        }
        match guard.push_quote(quote) {
            Ok(_) => {
                report.loaded += 1;
                first_time = Some(first_time.map_or(quote.time, |t| t.min(quote.time)));
            }
            Err(err @ Error::NonMonotonicTime { .. }) => {
                warn!(source = source.name(), %err, "skipped quote");
                report.skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }
    if let Some(from) = first_time {
        let base = guard.base();
        guard.series_changed(base, from)?;
    }
    report.last_loaded_time = guard.last_loaded_time();

    if report.complete {
        info!(
            source = source.name(),
            loaded = report.loaded,
            skipped = report.skipped,
            "load cycle complete"
        );
    } else {
        warn!(source = source.name(), loaded = report.loaded, "load cycle cancelled");
    }
    Ok(report)
}

fn is_stored(ser: &Ser, quote: &Quote) -> bool {
    ser.index_of_occurred_time(quote.time)
        .ok()
        .and_then(|row| ser.quote_at(row))
        .is_some_and(|stored| stored.same_values(quote))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    pub poll_interval: Duration,
    /// Stop after the first cycle instead of polling.
    pub one_shot: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            one_shot: false,
        }
    }
}

impl From<&LoaderConfig> for LoaderOptions {
    fn from(cfg: &LoaderConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            one_shot: cfg.one_shot,
        }
    }
}

/// A running loader thread.
#[derive(Debug)]
pub struct LoadHandle {
    run: Arc<AtomicBool>,
    thread: JoinHandle<LoadReport>,
}

impl LoadHandle {
    /// Asks the loader to stop; it finishes the current row first.
    pub fn cancel(&self) {
        self.run.store(false, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        !self.thread.is_finished()
    }

    /// Waits for the loader and returns the summed report of its cycles.
    pub fn join(self) -> Result<LoadReport> {
        self.thread
            .join()
            .map_err(|_| Error::Source("loader thread panicked".to_string()))
    }
}

/// Runs load cycles on a background thread until cancelled (or once, for a
/// one-shot loader). Failed cycles are logged and retried on the next poll.
pub fn spawn_loader(ctx: Arc<Mutex<SerContext>>, mut source: Box<dyn QuoteSource>, opts: LoaderOptions) -> LoadHandle {
    let run = Arc::new(AtomicBool::new(true));
    let flag = run.clone();
    let thread = thread::spawn(move || {
        let mut total = LoadReport::default();
        while flag.load(Ordering::Relaxed) {
            match load_once(&ctx, source.as_mut(), &flag) {
                Ok(cycle) => total.absorb(&cycle),
                Err(Error::LockPoisoned(err)) => {
                    warn!(source = source.name(), %err, "loader stopped");
                    break;
                }
                Err(err) => warn!(source = source.name(), %err, "load cycle failed"),
            }
            if opts.one_shot {
                break;
            }
            sleep_while(&flag, opts.poll_interval);
        }
        total
    });
    LoadHandle { run, thread }
}

fn sleep_while(run: &AtomicBool, interval: Duration) {
    const SLICE: Duration = Duration::from_millis(10);
    let deadline = Instant::now() + interval;
    while run.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(SLICE.min(deadline - now));
    }
}
