use std::sync::Arc;

use indexmap::IndexMap;

use super::var::{Cell, MassDistribution};

/// Immutable snapshot of one row across all Vars.
///
/// Items are built while the owning series is borrowed, so a reader never
/// observes a row half-way through an update.
#[derive(Debug, Clone, PartialEq)]
pub struct SerItem {
    time: i64,
    row: usize,
    cells: IndexMap<String, Cell>,
}

impl SerItem {
    pub(crate) fn new(time: i64, row: usize, cells: IndexMap<String, Cell>) -> Self {
        Self { time, row, cells }
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn get(&self, var: &str) -> Option<&Cell> {
        self.cells.get(var)
    }

    /// Scalar value of `var`, NaN when missing or unset.
    pub fn value(&self, var: &str) -> f64 {
        self.cells
            .get(var)
            .and_then(Cell::as_scalar)
            .unwrap_or(f64::NAN)
    }

    pub fn profile(&self, var: &str) -> Option<Arc<MassDistribution>> {
        match self.cells.get(var)? {
            Cell::Profile(p) => p.clone(),
            Cell::Scalar(_) => None,
        }
    }

    /// True when every cell of the row is unset (a freshly created or cleared row).
    pub fn is_clear(&self) -> bool {
        self.cells.values().all(Cell::is_unset)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v))
    }
}
