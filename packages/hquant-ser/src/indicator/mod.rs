//! Incrementally recomputed derived series.
//!
//! An [`Indicator`] reads a base [`Ser`] and writes its result vars either
//! into its own derived series or in place into the base series. It keeps a
//! `computed_time` watermark: rows up to the watermark are valid and are only
//! recomputed when the base changes at or before them.
//!
//! Computation is a strategy chosen by kind, not a subclass:
//! - [`ContCompute`]: row `i` from row `i-1` (stateful recurrence, strictly in
//!   increasing row order);
//! - [`SpotCompute`]: one row in isolation (e.g. a histogram at a cursor).

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::event::SerEvent;
use crate::ser::{MassDistribution, Plot, Ser, SerArena, SerId, Var};

pub mod builtin;
mod descriptor;
pub mod func;
mod kind;
mod opt;

pub use descriptor::IndicatorDescriptor;
pub use kind::IndicatorKind;
pub use opt::{replay_opts, Opt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndicatorId(pub u32);

impl core::fmt::Display for IndicatorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result var declared by an indicator kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarSpec {
    pub name: &'static str,
    pub plot: Plot,
}

impl VarSpec {
    pub const fn line(name: &'static str) -> Self {
        Self {
            name,
            plot: Plot::Line,
        }
    }

    pub const fn hidden(name: &'static str) -> Self {
        Self {
            name,
            plot: Plot::None,
        }
    }

    pub const fn profile(name: &'static str) -> Self {
        Self {
            name,
            plot: Plot::Profile,
        }
    }
}

/// Where an indicator writes its result vars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Placement {
    /// A derived series whose rows mirror the base rows.
    #[default]
    OwnSer,
    /// Prefixed vars inside the base series itself.
    InPlace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeState {
    Uninitialized,
    Computing { from_row: usize },
    Settled { up_to_row: usize },
}

/// Read access to the base series during a compute pass.
pub struct Input<'a> {
    ser: &'a Ser,
    source: &'a str,
}

impl<'a> Input<'a> {
    pub fn new(ser: &'a Ser, source: &'a str) -> Self {
        Self { ser, source }
    }

    pub fn len(&self) -> usize {
        self.ser.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ser.is_empty()
    }

    pub fn time(&self, row: usize) -> Option<i64> {
        self.ser.time_at(row)
    }

    /// Values of `name`; empty when the var does not exist.
    pub fn var(&self, name: &str) -> &'a [f64] {
        self.ser.values(name).unwrap_or(&[])
    }

    /// The configured source var (usually `close`).
    pub fn source(&self) -> &'a [f64] {
        self.var(self.source)
    }

    pub fn high(&self) -> &'a [f64] {
        self.var("high")
    }

    pub fn low(&self) -> &'a [f64] {
        self.var("low")
    }

    pub fn close(&self) -> &'a [f64] {
        self.var("close")
    }

    pub fn volume(&self) -> &'a [f64] {
        self.var("volume")
    }
}

/// Result vars lent out of the output series for one compute pass, indexed
/// in the order the kind declares them.
///
/// The first failed write is kept and returned by the compute pass.
#[derive(Debug)]
pub struct Frame {
    vars: Vec<Var>,
    fault: Option<Error>,
}

impl Frame {
    pub(crate) fn new(vars: Vec<Var>) -> Self {
        Self { vars, fault: None }
    }

    pub(crate) fn finish(self) -> (Vec<Var>, Option<Error>) {
        (self.vars, self.fault)
    }

    #[inline]
    pub fn get(&self, k: usize, row: usize) -> f64 {
        self.vars.get(k).map_or(f64::NAN, |v| v.get(row))
    }

    /// Value of var `k` at `row - 1`, NaN on the first row.
    #[inline]
    pub fn prev(&self, k: usize, row: usize) -> f64 {
        row.checked_sub(1).map_or(f64::NAN, |r| self.get(k, r))
    }

    #[inline]
    pub fn set(&mut self, k: usize, row: usize, v: f64) {
        let written = match self.vars.get_mut(k) {
            Some(var) => var.set(row, v),
            None => Err(Error::UnknownVar(format!("result var #{k}"))),
        };
        self.record(written);
    }

    pub fn set_profile(&mut self, k: usize, row: usize, dist: Option<MassDistribution>) {
        let written = match self.vars.get_mut(k) {
            Some(var) => var.set_profile(row, dist.map(std::sync::Arc::new)),
            None => Err(Error::UnknownVar(format!("result var #{k}"))),
        };
        self.record(written);
    }

    pub fn fault(&self) -> Option<&Error> {
        self.fault.as_ref()
    }

    fn record(&mut self, written: Result<()>) {
        if let Err(err) = written {
            self.fault.get_or_insert(err);
        }
    }
}

pub trait ContCompute: Send {
    /// Runs once before a pass over `rows`, e.g. to fit a model on the
    /// history the pass can see.
    fn prepare(&mut self, _input: &Input<'_>, _rows: Range<usize>) -> Result<()> {
        Ok(())
    }

    /// Computes row `i`. Rows before `i` are already valid in `out`.
    fn compute(&self, i: usize, input: &Input<'_>, out: &mut Frame);
}

pub trait SpotCompute: Send {
    /// Computes row `i` without reading any other result row.
    fn compute_spot(&self, i: usize, input: &Input<'_>, out: &mut Frame);
}

pub enum ComputeStrategy {
    Continuous(Box<dyn ContCompute>),
    Spot(Box<dyn SpotCompute>),
}

impl core::fmt::Debug for ComputeStrategy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ComputeStrategy::Continuous(_) => f.write_str("Continuous"),
            ComputeStrategy::Spot(_) => f.write_str("Spot"),
        }
    }
}

#[derive(Debug)]
pub struct Indicator {
    id: IndicatorId,
    kind: IndicatorKind,
    opts: Vec<Opt>,
    source: String,
    strategy: ComputeStrategy,
    placement: Placement,
    base: Option<SerId>,
    output: Option<SerId>,
    var_names: Vec<String>,
    computed_time: Option<i64>,
    spot_time: Option<i64>,
    state: ComputeState,
}

impl Indicator {
    /// Builds an unbound indicator. `opts` are replayed by name onto the
    /// kind's defaults (cloned, never shared with the caller).
    pub fn new(id: IndicatorId, kind: IndicatorKind, opts: &[Opt], source: &str) -> Result<Self> {
        let mut own_opts = kind.default_opts();
        replay_opts(&mut own_opts, opts);
        let strategy = kind.create(&own_opts)?;
        Ok(Self {
            id,
            kind,
            opts: own_opts,
            source: source.to_string(),
            strategy,
            placement: Placement::OwnSer,
            base: None,
            output: None,
            var_names: Vec::new(),
            computed_time: None,
            spot_time: None,
            state: ComputeState::Uninitialized,
        })
    }

    pub fn id(&self) -> IndicatorId {
        self.id
    }

    pub fn kind(&self) -> IndicatorKind {
        self.kind
    }

    pub fn opts(&self) -> &[Opt] {
        &self.opts
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn base(&self) -> Option<SerId> {
        self.base
    }

    /// Series the result vars live in (the base itself when in place).
    pub fn output(&self) -> Option<SerId> {
        self.output
    }

    /// Result var names in declaration order, as stored in the output series.
    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }

    /// Output var name for the kind's declared var `name`.
    pub fn var_name(&self, name: &str) -> Option<&str> {
        self.kind
            .outputs()
            .iter()
            .position(|spec| spec.name == name)
            .and_then(|k| self.var_names.get(k))
            .map(String::as_str)
    }

    pub fn computed_time(&self) -> Option<i64> {
        self.computed_time
    }

    pub fn spot_time(&self) -> Option<i64> {
        self.spot_time
    }

    pub fn state(&self) -> ComputeState {
        self.state
    }

    pub fn is_spot(&self) -> bool {
        matches!(self.strategy, ComputeStrategy::Spot(_))
    }

    /// Display label, e.g. `MACD(12,26,9)`.
    pub fn label(&self) -> String {
        let opts: Vec<String> = self.opts.iter().map(|o| o.to_string()).collect();
        format!("{}({})", self.kind.short_name(), opts.join(","))
    }

    pub fn descriptor(&self) -> IndicatorDescriptor {
        IndicatorDescriptor {
            kind: self.kind,
            opts: self.opts.clone(),
            source: self.source.clone(),
            placement: self.placement,
            active: true,
        }
    }

    /// Attaches to `base`, creating the result vars. Var names are fixed here
    /// and do not follow later option changes.
    pub(crate) fn bind(&mut self, arena: &mut SerArena, base: SerId, placement: Placement) -> Result<()> {
        let base_ser = arena.try_get(base)?;
        let specs = self.kind.outputs();
        match placement {
            Placement::OwnSer => {
                let mut out = Ser::new(
                    format!("{}:{}", base_ser.name(), self.label()),
                    base_ser.freq(),
                );
                out.align_rows(base_ser.timestamps().as_slice());
                for spec in specs {
                    out.add_var(spec.name, spec.plot);
                }
                self.var_names = specs.iter().map(|s| s.name.to_string()).collect();
                self.output = Some(arena.insert(out));
            }
            Placement::InPlace => {
                let prefix = format!("{}{}", self.kind.short_name(), self.id);
                let names: Vec<String> = specs
                    .iter()
                    .map(|s| format!("{prefix}.{}", s.name))
                    .collect();
                if names.iter().any(|n| n == &self.source) {
                    return Err(Error::InvalidOpts(format!(
                        "{} cannot read its own output {}",
                        self.label(),
                        self.source
                    )));
                }
                let base_ser = arena.try_get_mut(base)?;
                for (spec, name) in specs.iter().zip(&names) {
                    base_ser.add_var(name, spec.plot);
                }
                self.var_names = names;
                self.output = Some(base);
            }
        }
        self.base = Some(base);
        self.placement = placement;
        self.reset();
        Ok(())
    }

    /// Removes the result vars (or the derived series) from the arena.
    pub(crate) fn detach(&mut self, arena: &mut SerArena) {
        match (self.placement, self.output) {
            (Placement::OwnSer, Some(out)) => {
                arena.remove(out);
            }
            (Placement::InPlace, Some(out)) => {
                if let Some(ser) = arena.get_mut(out) {
                    for name in &self.var_names {
                        ser.remove_var(name);
                    }
                }
            }
            _ => {}
        }
        self.base = None;
        self.output = None;
        self.reset();
    }

    /// Invalidates all history; the next compute starts from row 0.
    pub fn reset(&mut self) {
        self.computed_time = None;
        self.state = ComputeState::Uninitialized;
    }

    /// Replays `opts` by name. An actual change rebuilds the strategy and
    /// resets the watermark; identical values are a no-op.
    pub fn set_opts(&mut self, opts: &[Opt]) -> Result<bool> {
        let mut next = self.opts.clone();
        if !replay_opts(&mut next, opts) {
            return Ok(false);
        }
        self.strategy = self.kind.create(&next)?;
        self.opts = next;
        self.reset();
        Ok(true)
    }

    /// Recomputes from `min(from_time, computed_time)` to the end of the base.
    ///
    /// Rows before that start are untouched. Returns the `FinishedComputing`
    /// event describing the recomputed range, or `None` if nothing needed
    /// computing.
    pub fn compute_from(&mut self, arena: &mut SerArena, from_time: i64) -> Result<Option<SerEvent>> {
        let base_id = self.base.ok_or_else(|| Error::BaseSeriesNotSet(self.label()))?;
        let start_time = match (self.state, self.computed_time) {
            (ComputeState::Uninitialized, _) | (_, None) => i64::MIN,
            (_, Some(computed)) => from_time.min(computed),
        };
        let start = arena
            .try_get(base_id)?
            .index_of_occurred_time(start_time)
            .unwrap_or_else(|pos| pos);
        let beg = start.min(self.align_output(arena, base_id)?);

        let base = arena.try_get(base_id)?;
        let len = base.len();
        let last_time = base.last_occurred_time();
        if beg >= len {
            self.settle(len, last_time);
            return Ok(None);
        }

        let rows = match (&self.strategy, self.spot_time) {
            (ComputeStrategy::Continuous(_), _) => beg..len,
            (ComputeStrategy::Spot(_), Some(spot)) => match base.timestamps().floor_row(spot) {
                Some(row) if row >= beg => row..row + 1,
                _ => beg..beg,
            },
            (ComputeStrategy::Spot(_), None) => beg..beg,
        };
        let from_row_time = base.time_at(beg).unwrap_or(start_time);

        self.state = ComputeState::Computing { from_row: beg };
        self.run(arena, base_id, rows.clone())?;
        self.settle(len, last_time);

        debug!(
            indicator = %self.label(),
            from_row = rows.start,
            to_row = rows.end,
            "computed"
        );
        if rows.is_empty() {
            return Ok(None);
        }
        let to_time = last_time.unwrap_or(from_row_time);
        Ok(Some(SerEvent::finished(
            self.output.unwrap_or(base_id),
            self.id,
            from_row_time,
            to_time,
        )))
    }

    /// Computes only the row at (or just before) `time`, remembering it as
    /// the spot time for later base changes. Continuous indicators recompute
    /// from that time instead.
    pub fn compute_spot(&mut self, arena: &mut SerArena, time: i64) -> Result<Option<SerEvent>> {
        if let ComputeStrategy::Continuous(_) = self.strategy {
            return self.compute_from(arena, time);
        }
        let base_id = self.base.ok_or_else(|| Error::BaseSeriesNotSet(self.label()))?;
        self.spot_time = Some(time);
        self.align_output(arena, base_id)?;

        let base = arena.try_get(base_id)?;
        let Some(row) = base.timestamps().floor_row(time) else {
            return Ok(None);
        };
        let row_time = base.time_at(row).unwrap_or(time);
        self.run(arena, base_id, row..row + 1)?;
        Ok(Some(SerEvent::finished(
            self.output.unwrap_or(base_id),
            self.id,
            row_time,
            row_time,
        )))
    }

    /// Mirrors base rows into a derived output series. Returns the first row
    /// whose output must be recomputed because rows were rewritten.
    fn align_output(&self, arena: &mut SerArena, base_id: SerId) -> Result<usize> {
        match self.output {
            Some(out_id) if out_id != base_id => {
                let (base, out) = arena
                    .pair_mut(base_id, out_id)
                    .ok_or_else(|| Error::UnknownSeries(format!("{out_id:?}")))?;
                let common = out.align_rows(base.timestamps().as_slice());
                Ok(if common == base.len() { usize::MAX } else { common })
            }
            _ => Ok(usize::MAX),
        }
    }

    fn run(&mut self, arena: &mut SerArena, base_id: SerId, rows: Range<usize>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let out_id = self.output.unwrap_or(base_id);
        let mut frame = Frame::new(arena.try_get_mut(out_id)?.take_frame(&self.var_names)?);
        let mut prepared = Ok(());
        if let Some(base) = arena.get(base_id) {
            let input = Input::new(base, &self.source);
            match &mut self.strategy {
                ComputeStrategy::Continuous(c) => {
                    prepared = c.prepare(&input, rows.clone());
                    if prepared.is_ok() {
                        for i in rows {
                            c.compute(i, &input, &mut frame);
                        }
                    }
                }
                ComputeStrategy::Spot(s) => {
                    for i in rows {
                        s.compute_spot(i, &input, &mut frame);
                    }
                }
            }
        }
        // the lent vars go back even when the pass failed
        let (vars, fault) = frame.finish();
        if let Some(out) = arena.get_mut(out_id) {
            out.restore_frame(vars);
        }
        prepared?;
        match fault {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn settle(&mut self, len: usize, last_time: Option<i64>) {
        self.computed_time = last_time;
        self.state = match len {
            0 => ComputeState::Uninitialized,
            n => ComputeState::Settled { up_to_row: n - 1 },
        };
    }
}
