use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use tracing::{debug, warn};

use crate::compose::Composer;
use crate::context::{lock_context, IngestReport, SerContext};
use crate::error::{Error, Result};
use crate::frequency::Calendar;
use crate::ser::SerKey;
use crate::types::Quote;

/// Open series by key, each behind its own lock, plus the declared
/// composition chains between them.
///
/// A chain `source -> target` rebuilds the target's quote bars from the
/// source's rows whenever the source is fed through the workspace. Only one
/// context lock is held at a time.
///
/// Lock order: `recomposing` first, then one context. Recompositions run one
/// at a time, so a target is never written from an older source snapshot
/// after a newer one.
#[derive(Debug)]
pub struct Workspace {
    calendar: Calendar,
    contexts: IndexMap<SerKey, Arc<Mutex<SerContext>>>,
    chains: StableDiGraph<SerKey, ()>,
    nodes: HashMap<SerKey, NodeIndex>,
    recomposing: Mutex<()>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(Calendar::default())
    }
}

impl Workspace {
    pub fn new(calendar: Calendar) -> Self {
        Self {
            calendar,
            contexts: IndexMap::new(),
            chains: StableDiGraph::new(),
            nodes: HashMap::new(),
            recomposing: Mutex::new(()),
        }
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SerKey> {
        self.contexts.keys()
    }

    /// Returns the context for `key`, creating an empty one if needed.
    pub fn open(&mut self, key: SerKey) -> Arc<Mutex<SerContext>> {
        if let Some(ctx) = self.contexts.get(&key) {
            return ctx.clone();
        }
        debug!(ser = %key, "open");
        let ctx = Arc::new(Mutex::new(SerContext::new(key.clone(), self.calendar)));
        let node = self.chains.add_node(key.clone());
        self.nodes.insert(key.clone(), node);
        self.contexts.insert(key, ctx.clone());
        ctx
    }

    pub fn get(&self, key: &SerKey) -> Option<Arc<Mutex<SerContext>>> {
        self.contexts.get(key).cloned()
    }

    pub fn try_get(&self, key: &SerKey) -> Result<Arc<Mutex<SerContext>>> {
        self.get(key)
            .ok_or_else(|| Error::UnknownSeries(key.to_string()))
    }

    /// Bulk-clears the series, drops its observers and its chains.
    pub fn close(&mut self, key: &SerKey) -> Result<()> {
        let ctx = self
            .contexts
            .shift_remove(key)
            .ok_or_else(|| Error::UnknownSeries(key.to_string()))?;
        lock_context(&ctx)?.close();
        if let Some(node) = self.nodes.remove(key) {
            self.chains.remove_node(node);
        }
        debug!(ser = %key, "closed");
        Ok(())
    }

    /// Declares that `target` is composed from `source` and composes the
    /// rows `source` already has. The target must not be finer than the
    /// source; an edge closing a cycle is rejected.
    pub fn chain(&mut self, source: &SerKey, target: &SerKey) -> Result<()> {
        let (Some(&from), Some(&to)) = (self.nodes.get(source), self.nodes.get(target)) else {
            return Err(Error::UnknownSeries(format!("{source} -> {target}")));
        };
        if source.freq.is_coarser_than(&target.freq) {
            return Err(Error::InvalidFrequency(format!(
                "cannot compose {} bars from {}",
                target.freq, source.freq
            )));
        }
        if self.chains.contains_edge(from, to) {
            return Ok(());
        }
        let edge = self.chains.add_edge(from, to, ());
        if from == to || is_cyclic_directed(&self.chains) {
            self.chains.remove_edge(edge);
            warn!(%source, %target, "rejected cyclic chain");
            return Err(Error::CyclicDependency(format!("{source} -> {target}")));
        }

        let ctx = self.try_get(source)?;
        let first = lock_context(&ctx)?.base_ser().first_occurred_time();
        if let Some(time) = first {
            self.recompose(source, time)?;
        }
        Ok(())
    }

    /// Keys directly composed from `source`.
    pub fn targets_of(&self, source: &SerKey) -> Vec<SerKey> {
        self.nodes.get(source).map_or_else(Vec::new, |&node| {
            self.chains
                .neighbors(node)
                .filter_map(|n| self.chains.node_weight(n).cloned())
                .collect()
        })
    }

    /// Appends quotes to `key`, recomputes its indicators, then rebuilds
    /// every chained series downstream.
    pub fn feed_quotes(&self, key: &SerKey, quotes: &[Quote]) -> Result<IngestReport> {
        let ctx = self.try_get(key)?;
        let report = lock_context(&ctx)?.ingest(quotes)?;
        if let Some(from) = report.first_time {
            self.recompose(key, from)?;
        }
        Ok(report)
    }

    /// Rebuilds chained series after `key` changed from `from_time`, in
    /// topological order of the chains.
    pub fn recompose(&self, key: &SerKey, from_time: i64) -> Result<()> {
        let Some(&start) = self.nodes.get(key) else {
            return Err(Error::UnknownSeries(key.to_string()));
        };
        let order = toposort(&self.chains, None)
            .map_err(|_| Error::CyclicDependency(key.to_string()))?;
        let _serial = self
            .recomposing
            .lock()
            .map_err(|e| Error::LockPoisoned(e.to_string()))?;

        let mut dirty: HashMap<NodeIndex, i64> = HashMap::from([(start, from_time)]);
        for node in order {
            let Some(time) = dirty.remove(&node) else {
                continue;
            };
            let source = self.try_get(&self.chains[node])?;
            for edge in self.chains.edges(node) {
                let target_key = &self.chains[edge.target()];
                let mut composer = Composer::new(target_key.freq, self.calendar);
                let rows = {
                    let src = lock_context(&source)?;
                    composer.source_rows_from(src.base_ser(), time)
                };
                let bars = composer.compose(&rows)?;
                let target = self.try_get(target_key)?;
                let report = lock_context(&target)?.ingest(&bars)?;
                if let Some(first) = report.first_time {
                    dirty
                        .entry(edge.target())
                        .and_modify(|t| *t = (*t).min(first))
                        .or_insert(first);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::Frequency;
    use crate::indicator::{IndicatorDescriptor, IndicatorKind};
    use std::thread;

    fn minute_quotes(from: i64, n: i64) -> Vec<Quote> {
        (from..from + n)
            .map(|i| Quote::new(i * 60_000, i as f64, i as f64 + 1.0, i as f64 - 1.0, i as f64, 1.0))
            .collect()
    }

    #[test]
    fn chained_series_follow_the_source() {
        let mut ws = Workspace::default();
        let m1 = SerKey::new("AAPL", Frequency::ONE_MIN);
        let m5 = SerKey::new("AAPL", Frequency::FIVE_MIN);
        ws.open(m1.clone());
        let five = ws.open(m5.clone());
        let ma = lock_context(&five)
            .unwrap()
            .add_indicator(&IndicatorDescriptor::new(IndicatorKind::Ma).with_opt("period", 2.0).unwrap())
            .unwrap();

        ws.feed_quotes(&m1, &minute_quotes(0, 7)).unwrap();
        ws.chain(&m1, &m5).unwrap();
        {
            let ctx = lock_context(&five).unwrap();
            assert_eq!(ctx.base_ser().len(), 2);
            assert_eq!(ctx.base_ser().value_at(1, "close"), 6.0);
        }

        ws.feed_quotes(&m1, &minute_quotes(7, 5)).unwrap();
        let ctx = lock_context(&five).unwrap();
        assert_eq!(ctx.base_ser().len(), 3);
        assert_eq!(ctx.base_ser().value_at(1, "close"), 9.0);
        assert_eq!(ctx.base_ser().value_at(1, "volume"), 5.0);
        assert_eq!(ctx.indicator_values(ma, "ma").unwrap()[2], (9.0 + 11.0) / 2.0);
    }

    #[test]
    fn concurrent_feeds_leave_the_target_fully_composed() {
        let mut ws = Workspace::default();
        let m1 = SerKey::new("AAPL", Frequency::ONE_MIN);
        let m5 = SerKey::new("AAPL", Frequency::FIVE_MIN);
        let one = ws.open(m1.clone());
        let five = ws.open(m5.clone());
        ws.chain(&m1, &m5).unwrap();

        let ws = Arc::new(ws);
        let next = Arc::new(std::sync::atomic::AtomicI64::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let (ws, next, m1) = (ws.clone(), next.clone(), m1.clone());
                thread::spawn(move || loop {
                    let i = next.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    if i >= 200 {
                        break;
                    }
                    // late rows are skipped, never an error
                    ws.feed_quotes(&m1, &minute_quotes(i, 1)).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let ohlcv = |q: &Quote| (q.time, q.open, q.high, q.low, q.close, q.volume);
        let rows = lock_context(&one).unwrap().base_ser().quotes_from(0);
        let expected: Vec<_> = Composer::new(Frequency::FIVE_MIN, Calendar::utc())
            .compose(&rows)
            .unwrap()
            .iter()
            .map(ohlcv)
            .collect();
        let composed: Vec<_> = lock_context(&five).unwrap().base_ser().quotes_from(0).iter().map(ohlcv).collect();
        assert_eq!(composed, expected);
    }

    #[test]
    fn chains_reject_finer_targets_and_cycles() {
        let mut ws = Workspace::default();
        let a = SerKey::new("A", Frequency::DAILY);
        let b = SerKey::new("B", Frequency::DAILY);
        let m = SerKey::new("A", Frequency::ONE_MIN);
        for k in [&a, &b, &m] {
            ws.open(k.clone());
        }
        assert!(matches!(ws.chain(&a, &m), Err(Error::InvalidFrequency(_))));
        ws.chain(&a, &b).unwrap();
        assert!(matches!(ws.chain(&b, &a), Err(Error::CyclicDependency(_))));
        assert!(matches!(ws.chain(&a, &a), Err(Error::CyclicDependency(_))));
        assert_eq!(ws.targets_of(&a), vec![b.clone()]);
    }

    #[test]
    fn close_clears_and_forgets() {
        let mut ws = Workspace::default();
        let key = SerKey::new("X", Frequency::ONE_MIN);
        let ctx = ws.open(key.clone());
        ws.feed_quotes(&key, &minute_quotes(0, 3)).unwrap();
        ws.close(&key).unwrap();
        assert!(lock_context(&ctx).unwrap().base_ser().is_empty());
        assert!(ws.get(&key).is_none());
        assert!(ws.feed_quotes(&key, &minute_quotes(3, 1)).is_err());
    }

    #[test]
    fn contexts_are_fed_from_several_threads() {
        let mut ws = Workspace::default();
        let keys: Vec<SerKey> = (0..4)
            .map(|i| SerKey::new(format!("S{i}"), Frequency::ONE_MIN))
            .collect();
        for k in &keys {
            ws.open(k.clone());
        }
        let ws = Arc::new(ws);
        let handles: Vec<_> = keys
            .iter()
            .cloned()
            .map(|k| {
                let ws = ws.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        ws.feed_quotes(&k, &minute_quotes(i, 1)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for k in &keys {
            assert_eq!(lock_context(&ws.get(k).unwrap()).unwrap().base_ser().len(), 50);
        }
    }
}
