use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::column::Column;
use crate::error::{Error, Result};

/// Shape tag of a Var. Rendering uses it; the store only uses it to pick the
/// storage layout (`Profile` vars hold distributions, everything else f64).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Plot {
    Line,
    Quote,
    Profile,
    /// Internal state, never plotted.
    None,
}

/// A probability mass distribution over price levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MassDistribution {
    pub levels: Vec<f64>,
    pub masses: Vec<f64>,
}

impl MassDistribution {
    pub fn new(levels: Vec<f64>, masses: Vec<f64>) -> Result<Self> {
        if levels.len() != masses.len() {
            return Err(Error::dimension(levels.len(), masses.len()));
        }
        Ok(Self { levels, masses })
    }

    pub fn total(&self) -> f64 {
        self.masses.iter().sum()
    }

    /// Level carrying the largest mass.
    pub fn mode(&self) -> Option<f64> {
        self.levels
            .iter()
            .zip(&self.masses)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(level, _)| *level)
    }
}

/// One cell read back from a Var.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Scalar(f64),
    Profile(Option<Arc<MassDistribution>>),
}

impl Cell {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Cell::Scalar(v) => Some(*v),
            Cell::Profile(_) => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        match self {
            Cell::Scalar(v) => v.is_nan(),
            Cell::Profile(p) => p.is_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum VarData {
    Scalar(Column<f64>),
    Profile(Vec<Option<Arc<MassDistribution>>>),
}

/// A named column aligned to its Ser's rows. Unset float cells are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    name: String,
    plot: Plot,
    data: VarData,
}

impl Var {
    pub fn new(name: impl Into<String>, plot: Plot, len: usize) -> Self {
        let data = match plot {
            Plot::Profile => VarData::Profile(vec![None; len]),
            _ => VarData::Scalar(Column::with_len(len, f64::NAN)),
        };
        Self {
            name: name.into(),
            plot,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plot(&self) -> Plot {
        self.plot
    }

    pub fn len(&self) -> usize {
        match &self.data {
            VarData::Scalar(col) => col.len(),
            VarData::Profile(cells) => cells.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.data, VarData::Scalar(_))
    }

    /// Scalar value at `row`; NaN when unset, out of range or not scalar.
    #[inline]
    pub fn get(&self, row: usize) -> f64 {
        match &self.data {
            VarData::Scalar(col) => col.get(row).unwrap_or(f64::NAN),
            VarData::Profile(_) => f64::NAN,
        }
    }

    pub fn get_profile(&self, row: usize) -> Option<Arc<MassDistribution>> {
        match &self.data {
            VarData::Profile(cells) => cells.get(row).cloned().flatten(),
            VarData::Scalar(_) => None,
        }
    }

    pub fn cell(&self, row: usize) -> Option<Cell> {
        match &self.data {
            VarData::Scalar(col) => col.get(row).map(Cell::Scalar),
            VarData::Profile(cells) => cells.get(row).cloned().map(Cell::Profile),
        }
    }

    /// All scalar values; empty for profile vars.
    pub fn values(&self) -> &[f64] {
        match &self.data {
            VarData::Scalar(col) => col.as_slice(),
            VarData::Profile(_) => &[],
        }
    }

    pub fn set(&mut self, row: usize, v: f64) -> Result<()> {
        let written = match &mut self.data {
            VarData::Scalar(col) => col.set(row, v),
            VarData::Profile(_) => {
                return Err(Error::UnknownVar(format!("{} is not a scalar var", self.name)))
            }
        };
        if written {
            Ok(())
        } else {
            Err(Error::dimension(self.len(), row + 1))
        }
    }

    pub fn set_profile(&mut self, row: usize, dist: Option<Arc<MassDistribution>>) -> Result<()> {
        let len = self.len();
        match &mut self.data {
            VarData::Profile(cells) => match cells.get_mut(row) {
                Some(slot) => {
                    *slot = dist;
                    Ok(())
                }
                None => Err(Error::dimension(len, row + 1)),
            },
            VarData::Scalar(_) => Err(Error::UnknownVar(format!(
                "{} is not a profile var",
                self.name
            ))),
        }
    }

    pub(crate) fn reset(&mut self, row: usize) {
        match &mut self.data {
            VarData::Scalar(col) => col.reset(row),
            VarData::Profile(cells) => {
                if let Some(slot) = cells.get_mut(row) {
                    *slot = None;
                }
            }
        }
    }

    pub(crate) fn resize(&mut self, len: usize) {
        match &mut self.data {
            VarData::Scalar(col) => col.resize(len),
            VarData::Profile(cells) => cells.resize(len, None),
        }
    }

    /// Empty stand-in left behind while a Var is lent out to a compute frame.
    pub(crate) fn placeholder(&self) -> Var {
        Var::new(self.name.clone(), self.plot, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_and_profile_cells() {
        let mut v = Var::new("close", Plot::Quote, 2);
        assert!(v.get(0).is_nan());
        v.set(1, 3.5).unwrap();
        assert_eq!(v.cell(1), Some(Cell::Scalar(3.5)));
        assert!(v.set(2, 1.0).is_err());
        assert!(v.set_profile(0, None).is_err());

        let mut p = Var::new("mass", Plot::Profile, 1);
        let dist = MassDistribution::new(vec![1.0, 2.0], vec![0.25, 0.75]).unwrap();
        p.set_profile(0, Some(Arc::new(dist))).unwrap();
        assert_eq!(p.get_profile(0).unwrap().mode(), Some(2.0));
        assert!(p.get(0).is_nan());
        assert!(p.set(0, 1.0).is_err());
        p.reset(0);
        assert!(p.cell(0).unwrap().is_unset());
    }
}
