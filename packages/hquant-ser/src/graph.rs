//! Dependency DAG of series and indicators.
//!
//! Vertices are series and indicators. Edges point from what is read to what
//! is written:
//! - base series -> indicator;
//! - indicator -> its derived series (own placement);
//! - in-place indicator -> every later indicator on the same base (they may
//!   read its vars);
//! - any explicitly declared dependency.
//!
//! Change events propagate synchronously in topological order, each
//! indicator computing at most once per pass.

use std::collections::HashMap;

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use tracing::warn;

use crate::error::{Error, Result};
use crate::event::{SerEvent, SerEventKind};
use crate::indicator::{Indicator, IndicatorDescriptor, IndicatorId, Placement};
use crate::ser::{SerArena, SerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vertex {
    Ser(SerId),
    Indicator(IndicatorId),
}

#[derive(Debug)]
struct Slot {
    node: NodeIndex,
    indicator: Indicator,
}

#[derive(Debug, Default)]
pub struct IndicatorGraph {
    dag: StableDiGraph<Vertex, ()>,
    sers: HashMap<SerId, NodeIndex>,
    indicators: IndexMap<IndicatorId, Slot>,
    order: Vec<NodeIndex>,
    position: HashMap<NodeIndex, usize>,
    next_id: u32,
}

impl IndicatorGraph {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    pub fn get(&self, id: IndicatorId) -> Option<&Indicator> {
        self.indicators.get(&id).map(|s| &s.indicator)
    }

    pub fn get_mut(&mut self, id: IndicatorId) -> Option<&mut Indicator> {
        self.indicators.get_mut(&id).map(|s| &mut s.indicator)
    }

    pub fn try_get_mut(&mut self, id: IndicatorId) -> Result<&mut Indicator> {
        self.get_mut(id)
            .ok_or_else(|| Error::UnknownIndicator(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Indicator> {
        self.indicators.values().map(|s| &s.indicator)
    }

    /// Current evaluation order (indicators only).
    pub fn topo_order(&self) -> Vec<IndicatorId> {
        self.order
            .iter()
            .filter_map(|n| match self.dag[*n] {
                Vertex::Indicator(id) => Some(id),
                Vertex::Ser(_) => None,
            })
            .collect()
    }

    pub fn add_ser(&mut self, id: SerId) -> NodeIndex {
        if let Some(&node) = self.sers.get(&id) {
            return node;
        }
        let node = self.dag.add_node(Vertex::Ser(id));
        self.sers.insert(id, node);
        self.reorder_or_warn();
        node
    }

    /// Drops a series vertex and its edges.
    pub fn remove_ser(&mut self, id: SerId) {
        if let Some(node) = self.sers.remove(&id) {
            self.dag.remove_node(node);
            self.reorder_or_warn();
        }
    }

    fn vertex_node(&self, v: Vertex) -> Result<NodeIndex> {
        match v {
            Vertex::Ser(id) => self
                .sers
                .get(&id)
                .copied()
                .ok_or_else(|| Error::UnknownSeries(format!("{id:?}"))),
            Vertex::Indicator(id) => self
                .indicators
                .get(&id)
                .map(|s| s.node)
                .ok_or_else(|| Error::UnknownIndicator(id.to_string())),
        }
    }

    /// Registers a new indicator on `base` as described by `desc`.
    pub fn add(&mut self, arena: &mut SerArena, desc: &IndicatorDescriptor, base: SerId) -> Result<IndicatorId> {
        arena.try_get(base)?;
        let id = IndicatorId(self.next_id.max(1));
        let mut indicator = desc.create_indicator(id)?;
        indicator.bind(arena, base, desc.placement)?;
        self.next_id = id.0 + 1;

        let base_node = self.add_ser(base);
        let node = self.dag.add_node(Vertex::Indicator(id));
        self.dag.add_edge(base_node, node, ());
        for earlier in self.indicators.values() {
            let ind = &earlier.indicator;
            if ind.placement() == Placement::InPlace && ind.base() == Some(base) {
                self.dag.add_edge(earlier.node, node, ());
            }
        }
        if let (Placement::OwnSer, Some(out)) = (indicator.placement(), indicator.output()) {
            let out_node = self.add_ser(out);
            self.dag.add_edge(node, out_node, ());
        }
        self.indicators.insert(id, Slot { node, indicator });
        self.reorder_or_warn();
        Ok(id)
    }

    /// Declares that `to` must be computed after `from`. Rejected (and left
    /// unchanged) if it would close a cycle.
    pub fn declare_dependency(&mut self, from: Vertex, to: Vertex) -> Result<()> {
        let (a, b) = (self.vertex_node(from)?, self.vertex_node(to)?);
        let edge = self.dag.add_edge(a, b, ());
        if self.reorder().is_err() {
            self.dag.remove_edge(edge);
            warn!(?from, ?to, "rejected cyclic dependency");
            return Err(Error::CyclicDependency(format!("{from:?} -> {to:?}")));
        }
        Ok(())
    }

    /// Unregisters an indicator and drops its result vars or derived series.
    pub fn remove(&mut self, arena: &mut SerArena, id: IndicatorId) -> Result<Indicator> {
        let Slot { node, mut indicator } = self
            .indicators
            .shift_remove(&id)
            .ok_or_else(|| Error::UnknownIndicator(id.to_string()))?;
        self.dag.remove_node(node);
        if let (Placement::OwnSer, Some(out)) = (indicator.placement(), indicator.output()) {
            self.remove_ser(out);
        }
        indicator.detach(arena);
        self.reorder_or_warn();
        Ok(indicator)
    }

    fn reorder(&mut self) -> std::result::Result<(), NodeIndex> {
        let order = toposort(&self.dag, None).map_err(|cycle| cycle.node_id())?;
        self.position = order.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        self.order = order;
        Ok(())
    }

    fn reorder_or_warn(&mut self) {
        if let Err(node) = self.reorder() {
            // Only declared edges can close a cycle and those are checked.
            warn!(vertex = ?self.dag.node_weight(node), "dependency graph has a cycle");
        }
    }

    /// Marks readers of `ser` that come after position `after` dirty from
    /// `time`. An indicator never receives its own `FinishedComputing` event.
    fn mark_readers(
        &self,
        ser: SerId,
        time: i64,
        cause: Option<&SerEvent>,
        after: Option<usize>,
        dirty: &mut HashMap<NodeIndex, i64>,
    ) {
        let Some(&node) = self.sers.get(&ser) else {
            return;
        };
        self.mark_successors(node, time, cause, after, dirty);
    }

    fn mark_successors(
        &self,
        node: NodeIndex,
        time: i64,
        cause: Option<&SerEvent>,
        after: Option<usize>,
        dirty: &mut HashMap<NodeIndex, i64>,
    ) {
        for next in self.dag.neighbors_directed(node, Direction::Outgoing) {
            let pos = self.position.get(&next).copied().unwrap_or(0);
            if after.is_some_and(|p| pos <= p) {
                continue;
            }
            if let (Vertex::Indicator(id), Some(ev)) = (self.dag[next], cause) {
                if ev.is_caused_by(id) {
                    continue;
                }
            }
            dirty
                .entry(next)
                .and_modify(|t| *t = (*t).min(time))
                .or_insert(time);
        }
    }

    /// Recomputes every indicator affected by `events`, upstream first.
    /// Returns the `FinishedComputing` events produced along the way.
    pub fn propagate(&mut self, arena: &mut SerArena, events: &[SerEvent]) -> Result<Vec<SerEvent>> {
        let mut dirty: HashMap<NodeIndex, i64> = HashMap::new();
        for ev in events {
            let time = match ev.kind {
                SerEventKind::Cleared | SerEventKind::OptsChanged => i64::MIN,
                _ => ev.from_time,
            };
            self.mark_readers(ev.source, time, Some(ev), None, &mut dirty);
            if let (SerEventKind::FinishedComputing, Some(origin)) = (ev.kind, ev.origin) {
                if let Some(slot) = self.indicators.get(&origin) {
                    self.mark_successors(slot.node, time, Some(ev), None, &mut dirty);
                }
            }
        }

        let mut produced = Vec::new();
        let order = self.order.clone();
        for (pos, node) in order.into_iter().enumerate() {
            let Some(time) = dirty.remove(&node) else {
                continue;
            };
            match self.dag[node] {
                Vertex::Ser(ser) => self.mark_readers(ser, time, None, Some(pos), &mut dirty),
                Vertex::Indicator(id) => {
                    let Some(slot) = self.indicators.get_mut(&id) else {
                        continue;
                    };
                    let Some(ev) = slot.indicator.compute_from(arena, time)? else {
                        continue;
                    };
                    self.mark_readers(ev.source, ev.from_time, Some(&ev), Some(pos), &mut dirty);
                    self.mark_successors(node, ev.from_time, Some(&ev), Some(pos), &mut dirty);
                    produced.push(ev);
                }
            }
        }
        Ok(produced)
    }

    /// Recomputes one indicator from `from_time` and everything downstream.
    pub fn recompute(&mut self, arena: &mut SerArena, id: IndicatorId, from_time: i64) -> Result<Vec<SerEvent>> {
        let Some(ev) = self.try_get_mut(id)?.compute_from(arena, from_time)? else {
            return Ok(Vec::new());
        };
        let mut events = vec![ev];
        events.extend(self.propagate(arena, &events)?);
        Ok(events)
    }

    /// Spot computation for one indicator, then downstream propagation.
    pub fn compute_spot(&mut self, arena: &mut SerArena, id: IndicatorId, time: i64) -> Result<Vec<SerEvent>> {
        let Some(ev) = self.try_get_mut(id)?.compute_spot(arena, time)? else {
            return Ok(Vec::new());
        };
        let mut events = vec![ev];
        events.extend(self.propagate(arena, &events)?);
        Ok(events)
    }

    /// Invalidates every indicator (after a bulk clear).
    pub fn reset_all(&mut self) {
        for slot in self.indicators.values_mut() {
            slot.indicator.reset();
        }
    }
}
