//! Time-indexed columnar store.
//!
//! A [`Ser`] owns a strictly increasing list of occurred times (one per row,
//! dense row index, wall-clock gaps collapsed) and a set of named [`Var`]
//! columns aligned to those rows.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};
use crate::frequency::Frequency;

mod column;
mod item;
mod quote;
pub mod timestamps;
mod var;

pub use item::SerItem;
pub use timestamps::Timestamps;
pub use var::{Cell, MassDistribution, Plot, Var};

/// Handle of a series inside a [`SerArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SerId(pub u32);

/// Series identity used by persistence: symbol + frequency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerKey {
    pub symbol: String,
    pub freq: Frequency,
}

impl SerKey {
    pub fn new(symbol: impl Into<String>, freq: Frequency) -> Self {
        Self {
            symbol: symbol.into(),
            freq,
        }
    }
}

impl core::fmt::Display for SerKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.freq)
    }
}

#[derive(Debug, Clone)]
pub struct Ser {
    name: String,
    freq: Frequency,
    timestamps: Timestamps,
    vars: IndexMap<String, Var>,
}

impl Ser {
    pub fn new(name: impl Into<String>, freq: Frequency) -> Self {
        Self {
            name: name.into(),
            freq,
            timestamps: Timestamps::new(),
            vars: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn freq(&self) -> Frequency {
        self.freq
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    pub fn time_at(&self, row: usize) -> Option<i64> {
        self.timestamps.get(row)
    }

    pub fn first_occurred_time(&self) -> Option<i64> {
        self.timestamps.first()
    }

    pub fn last_occurred_time(&self) -> Option<i64> {
        self.timestamps.last()
    }

    /// Adds a column sized to the current rows. Returns false if a var with
    /// this name already exists (the existing one is kept).
    pub fn add_var(&mut self, name: &str, plot: Plot) -> bool {
        if self.vars.contains_key(name) {
            return false;
        }
        self.vars
            .insert(name.to_string(), Var::new(name, plot, self.len()));
        true
    }

    pub fn remove_var(&mut self, name: &str) -> Option<Var> {
        self.vars.shift_remove(name)
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn var(&self, name: &str) -> Option<&Var> {
        self.vars.get(name)
    }

    pub fn var_names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// Binary search over occurred times: `Ok(row)` on an exact hit,
    /// `Err(insertion_point)` when `time` has no row. Callers clamp the
    /// insertion point to the nearest row as needed.
    #[inline]
    pub fn index_of_occurred_time(&self, time: i64) -> std::result::Result<usize, usize> {
        self.timestamps.index_of(time)
    }

    /// Snapshot of the row at `time`, else of the nearest row before it.
    /// `None` means nothing has been loaded at or before `time` yet.
    pub fn get_item(&self, time: i64) -> Option<SerItem> {
        self.item_at(self.timestamps.floor_row(time)?)
    }

    pub fn item_at(&self, row: usize) -> Option<SerItem> {
        let time = self.timestamps.get(row)?;
        let cells = self
            .vars
            .iter()
            .filter_map(|(name, var)| Some((name.clone(), var.cell(row)?)))
            .collect();
        Some(SerItem::new(time, row, cells))
    }

    /// Clears the row at `time` if it exists, otherwise appends a new row.
    ///
    /// New rows must come after the last occurred time; an earlier time with
    /// no row is rejected with [`Error::NonMonotonicTime`].
    pub fn create_item_or_clear_it(&mut self, time: i64) -> Result<usize> {
        match self.timestamps.index_of(time) {
            Ok(row) => {
                for var in self.vars.values_mut() {
                    var.reset(row);
                }
                trace!(ser = %self.name, time, row, "cleared row");
                Ok(row)
            }
            Err(_) => {
                let row = self.timestamps.push(time)?;
                let len = self.len();
                for var in self.vars.values_mut() {
                    var.resize(len);
                }
                Ok(row)
            }
        }
    }

    /// Writes `v` into `var` at the row with exactly `time`.
    pub fn set_value(&mut self, time: i64, var: &str, v: f64) -> Result<()> {
        let row = self
            .timestamps
            .index_of(time)
            .map_err(|_| Error::NoRowAt(time))?;
        self.set_at(row, var, v)
    }

    pub fn set_at(&mut self, row: usize, var: &str, v: f64) -> Result<()> {
        self.vars
            .get_mut(var)
            .ok_or_else(|| Error::UnknownVar(var.to_string()))?
            .set(row, v)
    }

    pub fn set_profile_at(
        &mut self,
        row: usize,
        var: &str,
        dist: Option<Arc<MassDistribution>>,
    ) -> Result<()> {
        self.vars
            .get_mut(var)
            .ok_or_else(|| Error::UnknownVar(var.to_string()))?
            .set_profile(row, dist)
    }

    /// Scalar at `row`; NaN when unset or unknown.
    #[inline]
    pub fn value_at(&self, row: usize, var: &str) -> f64 {
        self.vars.get(var).map_or(f64::NAN, |v| v.get(row))
    }

    pub fn values(&self, var: &str) -> Option<&[f64]> {
        self.vars.get(var).map(Var::values)
    }

    /// Bulk clear: drops every row, keeps the columns.
    pub fn clear(&mut self) {
        self.timestamps.clear();
        for var in self.vars.values_mut() {
            var.resize(0);
        }
    }

    /// Makes this series' rows mirror `times` (a derived series following its
    /// base). Returns the first row that was (re)written; rows before it were
    /// already identical and keep their values.
    pub(crate) fn align_rows(&mut self, times: &[i64]) -> usize {
        let mut common = self.len().min(times.len());
        while common > 0 && self.timestamps.get(common - 1) != Some(times[common - 1]) {
            common -= 1;
        }
        if common == self.len() && common == times.len() {
            return common;
        }
        self.timestamps.truncate(common);
        for &t in &times[common..] {
            // `times` is strictly increasing, so the push cannot fail.
            let _ = self.timestamps.push(t);
        }
        let len = self.len();
        for var in self.vars.values_mut() {
            var.resize(common);
            var.resize(len);
        }
        common
    }

    /// Lends the named vars out so they can be written while the rest of the
    /// series is read. Must be paired with [`Ser::restore_frame`].
    pub(crate) fn take_frame(&mut self, names: &[String]) -> Result<Vec<Var>> {
        if let Some(missing) = names.iter().find(|n| !self.vars.contains_key(n.as_str())) {
            return Err(Error::UnknownVar(missing.clone()));
        }
        let mut taken = Vec::with_capacity(names.len());
        for name in names {
            if let Some(slot) = self.vars.get_mut(name) {
                let placeholder = slot.placeholder();
                taken.push(std::mem::replace(slot, placeholder));
            }
        }
        Ok(taken)
    }

    pub(crate) fn restore_frame(&mut self, vars: Vec<Var>) {
        for var in vars {
            if let Some(slot) = self.vars.get_mut(var.name()) {
                *slot = var;
            }
        }
    }
}

/// Owner of every series in one context; ids are stable for the arena's life.
#[derive(Debug, Default)]
pub struct SerArena {
    slots: Vec<Option<Ser>>,
}

impl SerArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ser: Ser) -> SerId {
        let id = SerId(self.slots.len() as u32);
        self.slots.push(Some(ser));
        id
    }

    pub fn remove(&mut self, id: SerId) -> Option<Ser> {
        self.slots.get_mut(id.0 as usize)?.take()
    }

    pub fn get(&self, id: SerId) -> Option<&Ser> {
        self.slots.get(id.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: SerId) -> Option<&mut Ser> {
        self.slots.get_mut(id.0 as usize)?.as_mut()
    }

    pub fn try_get(&self, id: SerId) -> Result<&Ser> {
        self.get(id)
            .ok_or_else(|| Error::UnknownSeries(format!("{id:?}")))
    }

    pub fn try_get_mut(&mut self, id: SerId) -> Result<&mut Ser> {
        self.get_mut(id)
            .ok_or_else(|| Error::UnknownSeries(format!("{id:?}")))
    }

    /// Borrows `read` shared and `write` exclusively; `None` if they are the
    /// same series or either is missing.
    pub(crate) fn pair_mut(&mut self, read: SerId, write: SerId) -> Option<(&Ser, &mut Ser)> {
        let (r, w) = (read.0 as usize, write.0 as usize);
        if r == w || r >= self.slots.len() || w >= self.slots.len() {
            return None;
        }
        if r < w {
            let (lo, hi) = self.slots.split_at_mut(w);
            Some((lo[r].as_ref()?, hi[0].as_mut()?))
        } else {
            let (lo, hi) = self.slots.split_at_mut(r);
            Some((hi[0].as_ref()?, lo[w].as_mut()?))
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = SerId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| SerId(i as u32))
    }
}
