use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPoint {
    pub input: Vec<f64>,
    pub output: Vec<f64>,
}

impl TrainingPoint {
    pub fn new(input: Vec<f64>, output: Vec<f64>) -> Self {
        Self { input, output }
    }
}

/// Points sharing one input and one output dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSet {
    points: Vec<TrainingPoint>,
}

impl TrainingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<TrainingPoint>) -> Result<Self> {
        let mut set = Self::new();
        for p in points {
            set.push(p)?;
        }
        Ok(set)
    }

    /// Sliding windows over `values`: `window` consecutive values predict the
    /// value `horizon` steps after the window. Windows touching NaN are
    /// skipped.
    pub fn from_series(values: &[f64], window: usize, horizon: usize) -> Result<Self> {
        if window == 0 || horizon == 0 {
            return Err(Error::InvalidTrainingData(
                "window and horizon must be positive".to_string(),
            ));
        }
        let span = window + horizon;
        let mut set = Self::new();
        if values.len() >= span {
            for start in 0..=values.len() - span {
                let input = &values[start..start + window];
                let target = values[start + span - 1];
                if target.is_nan() || input.iter().any(|v| v.is_nan()) {
                    continue;
                }
                set.points.push(TrainingPoint::new(input.to_vec(), vec![target]));
            }
        }
        if set.is_empty() {
            return Err(Error::InvalidTrainingData(format!(
                "{} values yield no window of {window} + {horizon}",
                values.len()
            )));
        }
        Ok(set)
    }

    pub fn push(&mut self, point: TrainingPoint) -> Result<()> {
        if point.input.is_empty() || point.output.is_empty() {
            return Err(Error::InvalidTrainingData("empty point".to_string()));
        }
        if let Some(first) = self.points.first() {
            if first.input.len() != point.input.len() {
                return Err(Error::dimension(first.input.len(), point.input.len()));
            }
            if first.output.len() != point.output.len() {
                return Err(Error::dimension(first.output.len(), point.output.len()));
            }
        }
        self.points.push(point);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn input_dimension(&self) -> usize {
        self.points.first().map_or(0, |p| p.input.len())
    }

    pub fn output_dimension(&self) -> usize {
        self.points.first().map_or(0, |p| p.output.len())
    }

    pub fn points(&self) -> &[TrainingPoint] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrainingPoint> {
        self.points.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Range {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl Range {
    fn fit<'a>(rows: impl Iterator<Item = &'a [f64]>, dim: usize) -> Self {
        let mut r = Self {
            min: vec![f64::INFINITY; dim],
            max: vec![f64::NEG_INFINITY; dim],
        };
        for row in rows {
            for (i, v) in row.iter().enumerate().take(dim) {
                r.min[i] = r.min[i].min(*v);
                r.max[i] = r.max[i].max(*v);
            }
        }
        r
    }

    fn scale(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| match (self.min.get(i), self.max.get(i)) {
                (Some(lo), Some(hi)) if hi > lo => (v - lo) / (hi - lo),
                (Some(_), Some(_)) => 0.5,
                _ => *v,
            })
            .collect()
    }

    fn unscale(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| match (self.min.get(i), self.max.get(i)) {
                (Some(lo), Some(hi)) if hi > lo => lo + v * (hi - lo),
                (Some(lo), Some(_)) => *lo,
                _ => *v,
            })
            .collect()
    }
}

/// Per-column min-max scaling into `[0, 1]`, fitted on a training set.
/// Constant columns map to 0.5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    input: Range,
    output: Range,
}

impl Normalizer {
    pub fn fit(set: &TrainingSet) -> Result<Self> {
        if set.is_empty() {
            return Err(Error::InvalidTrainingData("empty training set".to_string()));
        }
        Ok(Self {
            input: Range::fit(set.iter().map(|p| p.input.as_slice()), set.input_dimension()),
            output: Range::fit(set.iter().map(|p| p.output.as_slice()), set.output_dimension()),
        })
    }

    pub fn normalize_input(&self, input: &[f64]) -> Vec<f64> {
        self.input.scale(input)
    }

    pub fn normalize_output(&self, output: &[f64]) -> Vec<f64> {
        self.output.scale(output)
    }

    pub fn denormalize_output(&self, output: &[f64]) -> Vec<f64> {
        self.output.unscale(output)
    }

    pub fn normalize(&self, set: &TrainingSet) -> TrainingSet {
        TrainingSet {
            points: set
                .iter()
                .map(|p| TrainingPoint::new(self.normalize_input(&p.input), self.normalize_output(&p.output)))
                .collect(),
        }
    }
}
