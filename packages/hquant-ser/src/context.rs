use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::event::{EventFilter, Observers, OwnerId, SerEvent, SubscriptionId};
use crate::frequency::Calendar;
use crate::graph::{IndicatorGraph, Vertex};
use crate::indicator::{Indicator, IndicatorDescriptor, IndicatorId, Opt};
use crate::ser::{Ser, SerArena, SerId, SerKey};
use crate::types::Quote;

/// Outcome of appending a batch of quotes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub appended: usize,
    pub skipped: usize,
    pub first_time: Option<i64>,
    pub last_time: Option<i64>,
}

/// One quote series with its indicators, observers and pending events.
///
/// All mutation of the series and every recompute it triggers go through
/// `&mut self`; shared use wraps it in a `Mutex` (see [`crate::Workspace`]).
#[derive(Debug)]
pub struct SerContext {
    key: SerKey,
    calendar: Calendar,
    arena: SerArena,
    base: SerId,
    graph: IndicatorGraph,
    observers: Observers,
    events: VecDeque<SerEvent>,
    last_loaded_time: Option<i64>,
}

impl SerContext {
    pub fn new(key: SerKey, calendar: Calendar) -> Self {
        let mut arena = SerArena::new();
        let base = arena.insert(Ser::quote(key.to_string(), key.freq));
        let mut graph = IndicatorGraph::new();
        graph.add_ser(base);
        Self {
            key,
            calendar,
            arena,
            base,
            graph,
            observers: Observers::new(),
            events: VecDeque::new(),
            last_loaded_time: None,
        }
    }

    pub fn key(&self) -> &SerKey {
        &self.key
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    /// Id of the quote series.
    pub fn base(&self) -> SerId {
        self.base
    }

    pub fn base_ser(&self) -> &Ser {
        // The base series is created with the context and never removed.
        self.arena
            .get(self.base)
            .unwrap_or_else(|| unreachable!("base series missing"))
    }

    pub fn ser(&self, id: SerId) -> Option<&Ser> {
        self.arena.get(id)
    }

    /// Direct write access. Call [`SerContext::series_changed`] afterwards so
    /// dependents recompute.
    pub fn ser_mut(&mut self, id: SerId) -> Result<&mut Ser> {
        self.arena.try_get_mut(id)
    }

    /// Adds an auxiliary series (e.g. a second input for indicators).
    pub fn add_ser(&mut self, ser: Ser) -> SerId {
        let id = self.arena.insert(ser);
        self.graph.add_ser(id);
        id
    }

    pub fn last_loaded_time(&self) -> Option<i64> {
        self.last_loaded_time
    }

    pub fn indicators(&self) -> &IndicatorGraph {
        &self.graph
    }

    pub fn indicator(&self, id: IndicatorId) -> Option<&Indicator> {
        self.graph.get(id)
    }

    /// Series holding the indicator's result vars.
    pub fn indicator_ser(&self, id: IndicatorId) -> Option<&Ser> {
        self.arena.get(self.graph.get(id)?.output()?)
    }

    /// Values of the indicator's declared var `name` (e.g. `"ema"`).
    pub fn indicator_values(&self, id: IndicatorId, name: &str) -> Option<&[f64]> {
        let var = self.graph.get(id)?.var_name(name)?;
        self.indicator_ser(id)?.values(var)
    }

    pub fn descriptor_of(&self, id: IndicatorId) -> Option<IndicatorDescriptor> {
        self.graph.get(id).map(Indicator::descriptor)
    }

    pub fn descriptors(&self) -> Vec<IndicatorDescriptor> {
        self.graph.iter().map(Indicator::descriptor).collect()
    }

    /// Adds an indicator on the quote series and computes its history.
    pub fn add_indicator(&mut self, desc: &IndicatorDescriptor) -> Result<IndicatorId> {
        self.add_indicator_on(desc, self.base)
    }

    pub fn add_indicator_on(&mut self, desc: &IndicatorDescriptor, base: SerId) -> Result<IndicatorId> {
        let id = self.graph.add(&mut self.arena, desc, base)?;
        if desc.active {
            let events = self.graph.recompute(&mut self.arena, id, 0)?;
            self.dispatch_all(events);
        }
        Ok(id)
    }

    pub fn declare_dependency(&mut self, from: Vertex, to: Vertex) -> Result<()> {
        self.graph.declare_dependency(from, to)
    }

    /// Removes the indicator; returns its descriptor for persistence.
    pub fn remove_indicator(&mut self, id: IndicatorId) -> Result<IndicatorDescriptor> {
        let indicator = self.graph.remove(&mut self.arena, id)?;
        Ok(indicator.descriptor())
    }

    /// Replays `opts` into the indicator. A real change recomputes its whole
    /// history and everything downstream; identical values do nothing.
    pub fn set_opts(&mut self, id: IndicatorId, opts: &[Opt]) -> Result<bool> {
        let indicator = self.graph.try_get_mut(id)?;
        if !indicator.set_opts(opts)? {
            return Ok(false);
        }
        let source = indicator.output().unwrap_or(self.base);
        debug!(indicator = %indicator.label(), "opts changed");
        self.dispatch(SerEvent::opts_changed(source, id));
        let events = self.graph.recompute(&mut self.arena, id, 0)?;
        self.dispatch_all(events);
        Ok(true)
    }

    /// Writes one quote row (create or clear-and-rewrite) without triggering
    /// recomputation.
    pub fn push_quote(&mut self, quote: &Quote) -> Result<usize> {
        let row = self.arena.try_get_mut(self.base)?.put_quote(quote)?;
        self.last_loaded_time = Some(self.last_loaded_time.map_or(quote.time, |t| t.max(quote.time)));
        Ok(row)
    }

    /// Appends quotes, skipping (and logging) rows that would break the
    /// ascending time order, then signals one change event for the batch.
    pub fn ingest(&mut self, quotes: &[Quote]) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        for quote in quotes {
            match self.push_quote(quote) {
                Ok(_) => {
                    report.appended += 1;
                    // a batch may rewrite an earlier row after a newer one
                    report.first_time = Some(report.first_time.map_or(quote.time, |t| t.min(quote.time)));
                    report.last_time = Some(report.last_time.map_or(quote.time, |t| t.max(quote.time)));
                }
                Err(err @ Error::NonMonotonicTime { .. }) => {
                    warn!(ser = %self.key, time = quote.time, %err, "skipped quote");
                    report.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }
        if let Some(from) = report.first_time {
            self.series_changed(self.base, from)?;
        }
        Ok(report)
    }

    /// Signals that `ser` changed from `from_time` on; recomputes dependents
    /// in topological order and dispatches every resulting event.
    pub fn series_changed(&mut self, ser: SerId, from_time: i64) -> Result<()> {
        let to_time = self
            .arena
            .try_get(ser)?
            .last_occurred_time()
            .unwrap_or(from_time);
        let ev = SerEvent::updated(ser, from_time, to_time);
        self.dispatch(ev);
        let events = self.graph.propagate(&mut self.arena, &[ev])?;
        self.dispatch_all(events);
        Ok(())
    }

    /// Computes a spot indicator at `time` (e.g. the cursor position).
    pub fn compute_spot(&mut self, id: IndicatorId, time: i64) -> Result<()> {
        let events = self.graph.compute_spot(&mut self.arena, id, time)?;
        self.dispatch_all(events);
        Ok(())
    }

    pub fn subscribe<F>(&mut self, owner: OwnerId, filter: EventFilter, callback: F) -> SubscriptionId
    where
        F: FnMut(&SerEvent) + Send + 'static,
    {
        self.observers.subscribe(owner, filter, callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn remove_observers_of(&mut self, owner: OwnerId) -> usize {
        self.observers.remove_observers_of(owner)
    }

    pub fn poll_events(&mut self) -> Vec<SerEvent> {
        self.events.drain(..).collect()
    }

    pub fn events_len(&self) -> usize {
        self.events.len()
    }

    /// Bulk clear: drops every row of every series, keeps indicators bound
    /// (they recompute from scratch on the next change).
    pub fn clear(&mut self) {
        let ids: Vec<SerId> = self.arena.ids().collect();
        for id in ids {
            if let Some(ser) = self.arena.get_mut(id) {
                ser.clear();
            }
        }
        self.graph.reset_all();
        self.last_loaded_time = None;
        self.dispatch(SerEvent::cleared(self.base));
    }

    /// Teardown: clears all rows and drops every observer.
    pub fn close(&mut self) {
        self.clear();
        self.observers = Observers::new();
        self.events.clear();
    }

    fn dispatch(&mut self, ev: SerEvent) {
        self.observers.notify(&ev);
        self.events.push_back(ev);
    }

    fn dispatch_all(&mut self, events: Vec<SerEvent>) {
        for ev in events {
            self.dispatch(ev);
        }
    }
}

/// Locks a shared context, mapping poisoning to [`Error::LockPoisoned`].
pub fn lock_context(ctx: &Mutex<SerContext>) -> Result<MutexGuard<'_, SerContext>> {
    ctx.lock().map_err(|e| Error::LockPoisoned(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SerEventKind;
    use crate::frequency::Frequency;
    use crate::indicator::{IndicatorKind, Placement};
    use std::sync::{Arc, Mutex};

    fn ctx() -> SerContext {
        SerContext::new(SerKey::new("TEST", Frequency::ONE_MIN), Calendar::utc())
    }

    fn q(i: i64, c: f64) -> Quote {
        Quote::new(i * 60_000, c, c + 1.0, c - 1.0, c, 10.0)
    }

    #[test]
    fn ingest_skips_out_of_order_rows() {
        let mut c = ctx();
        let report = c.ingest(&[q(1, 1.0), q(3, 3.0), q(2, 2.0), q(3, 3.5), q(4, 4.0)]).unwrap();
        assert_eq!(report.appended, 4);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.first_time, Some(60_000));
        assert_eq!(c.base_ser().len(), 3);
        assert_eq!(c.base_ser().value_at(1, "close"), 3.5);
        assert_eq!(c.last_loaded_time(), Some(240_000));
    }

    #[test]
    fn rewriting_an_earlier_row_recomputes_from_it() {
        let mut c = ctx();
        let ema = c
            .add_indicator(&IndicatorDescriptor::new(IndicatorKind::Ema).with_opt("period", 1.0).unwrap())
            .unwrap();
        let in_place = c
            .add_indicator(
                &IndicatorDescriptor::new(IndicatorKind::Ema)
                    .with_opt("period", 1.0)
                    .unwrap()
                    .with_placement(Placement::InPlace),
            )
            .unwrap();
        c.ingest(&(1..=5).map(|i| q(i, 10.0)).collect::<Vec<_>>()).unwrap();

        let report = c.ingest(&[q(6, 10.0), q(2, 99.0)]).unwrap();
        assert_eq!(report.first_time, Some(120_000));
        assert_eq!(report.last_time, Some(360_000));
        assert_eq!(c.base_ser().value_at(1, "close"), 99.0);
        assert_eq!(c.indicator_values(ema, "ema").unwrap()[1], 99.0);
        assert_eq!(c.indicator_values(in_place, "ema").unwrap()[1], 99.0);
        assert_eq!(c.indicator_values(ema, "ema").unwrap()[5], 10.0);
    }

    #[test]
    fn indicators_follow_ingestion_and_notify() {
        let mut c = ctx();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        c.subscribe(OwnerId(9), EventFilter::all(), move |ev| {
            sink.lock().unwrap().push(ev.kind)
        });
        let ema = c
            .add_indicator(&IndicatorDescriptor::new(IndicatorKind::Ema))
            .unwrap();
        c.ingest(&(1..=30).map(|i| q(i, 10.0)).collect::<Vec<_>>())
            .unwrap();
        assert_eq!(c.indicator_values(ema, "ema").unwrap().len(), 30);
        assert!(c.indicator_values(ema, "ema").unwrap().iter().all(|v| *v == 10.0));

        let kinds = seen.lock().unwrap().clone();
        assert_eq!(
            kinds,
            vec![SerEventKind::Updated, SerEventKind::FinishedComputing]
        );
        assert_eq!(c.poll_events().len(), 2);
        assert_eq!(c.remove_observers_of(OwnerId(9)), 1);
    }

    #[test]
    fn opts_change_recomputes_history() {
        let mut c = ctx();
        c.ingest(&(1..=20).map(|i| q(i, i as f64)).collect::<Vec<_>>())
            .unwrap();
        let ma = c
            .add_indicator(
                &IndicatorDescriptor::new(IndicatorKind::Ma).with_placement(Placement::InPlace),
            )
            .unwrap();
        assert!(c.indicator_values(ma, "ma").unwrap()[18].is_nan());
        c.poll_events();

        assert!(c.set_opts(ma, &[Opt::int("period", 2, 1, 1000).unwrap()]).unwrap());
        assert_eq!(c.indicator_values(ma, "ma").unwrap()[1], 1.5);
        let kinds: Vec<_> = c.poll_events().into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![SerEventKind::OptsChanged, SerEventKind::FinishedComputing]
        );

        assert!(!c.set_opts(ma, &[Opt::int("period", 2, 1, 1000).unwrap()]).unwrap());
        assert!(c.poll_events().is_empty());
        assert_eq!(c.descriptor_of(ma).unwrap().opt("period"), Some(2.0));
    }

    #[test]
    fn clear_resets_rows_and_watermarks() {
        let mut c = ctx();
        let rsi = c
            .add_indicator(&IndicatorDescriptor::new(IndicatorKind::Rsi))
            .unwrap();
        c.ingest(&[q(1, 1.0), q(2, 2.0)]).unwrap();
        c.clear();
        assert!(c.base_ser().is_empty());
        assert!(c.indicator_ser(rsi).unwrap().is_empty());
        assert_eq!(c.indicator(rsi).unwrap().computed_time(), None);
        assert_eq!(c.last_loaded_time(), None);

        c.ingest(&[q(1, 5.0)]).unwrap();
        assert_eq!(c.indicator_ser(rsi).unwrap().len(), 1);
    }

    #[test]
    fn forecast_indicator_follows_appends() {
        let mut c = ctx();
        let desc = IndicatorDescriptor::new(IndicatorKind::Mlp)
            .with_opt("window", 3.0)
            .unwrap()
            .with_opt("hidden", 3.0)
            .unwrap()
            .with_opt("epochs", 20.0)
            .unwrap();
        let mlp = c.add_indicator(&desc).unwrap();
        c.ingest(&(1..=3).map(|i| q(i, i as f64)).collect::<Vec<_>>()).unwrap();
        assert!(c.indicator_values(mlp, "forecast").unwrap().iter().all(|v| v.is_nan()));

        c.ingest(&(4..=12).map(|i| q(i, (i % 4) as f64)).collect::<Vec<_>>()).unwrap();
        c.ingest(&[q(13, 1.0)]).unwrap();
        let forecast = c.indicator_values(mlp, "forecast").unwrap();
        assert_eq!(forecast.len(), 13);
        assert!(forecast[1].is_nan());
        assert!(forecast[12].is_finite());
        assert_eq!(c.descriptor_of(mlp).unwrap().opt("window"), Some(3.0));
    }

    #[test]
    fn spot_indicator_computes_single_row() {
        let mut c = ctx();
        c.ingest(&(1..=10).map(|i| q(i, i as f64)).collect::<Vec<_>>())
            .unwrap();
        let pm = c
            .add_indicator(&IndicatorDescriptor::new(IndicatorKind::ProbMass))
            .unwrap();
        c.compute_spot(pm, 5 * 60_000).unwrap();
        let var = c.indicator_ser(pm).unwrap().var("mass").unwrap();
        assert!(var.get_profile(4).is_some());
        assert!(var.get_profile(9).is_none());
    }
}
