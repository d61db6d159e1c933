use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A named, bounded, steppable indicator parameter.
///
/// `min <= value <= max` always holds: out-of-range writes are clamped and
/// NaN writes are ignored. Deserialized opts go through [`Opt::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawOpt")]
pub struct Opt {
    name: String,
    value: f64,
    min: f64,
    max: f64,
    step: f64,
}

fn default_step() -> f64 {
    1.0
}

#[derive(Deserialize)]
struct RawOpt {
    name: String,
    value: f64,
    min: f64,
    max: f64,
    #[serde(default = "default_step")]
    step: f64,
}

impl TryFrom<RawOpt> for Opt {
    type Error = Error;

    fn try_from(raw: RawOpt) -> Result<Self> {
        Opt::new(raw.name, raw.value, raw.min, raw.max, raw.step)
    }
}

impl Opt {
    pub fn new(name: impl Into<String>, value: f64, min: f64, max: f64, step: f64) -> Result<Self> {
        let name = name.into();
        if !(min <= max) || !value.is_finite() {
            return Err(Error::InvalidOpts(format!(
                "{name}: value {value} with bounds [{min}, {max}]"
            )));
        }
        Ok(Self {
            value: value.clamp(min, max),
            name,
            min,
            max,
            step,
        })
    }

    /// Built-in defaults; the caller guarantees `min <= value <= max`.
    pub(crate) fn preset(name: &str, value: f64, min: f64, max: f64, step: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            min,
            max,
            step,
        }
    }

    /// Integer-valued option (periods, bucket counts).
    pub fn int(name: impl Into<String>, value: u32, min: u32, max: u32) -> Result<Self> {
        Self::new(name, value as f64, min as f64, max as f64, 1.0)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Value rounded to a non-negative integer (for window lengths).
    pub fn as_usize(&self) -> usize {
        self.value.round().max(0.0) as usize
    }

    /// Writes a clamped value; returns whether the stored value changed.
    pub fn set_value(&mut self, v: f64) -> bool {
        if v.is_nan() {
            return false;
        }
        let v = v.clamp(self.min, self.max);
        if v == self.value {
            return false;
        }
        self.value = v;
        true
    }

}

impl core::fmt::Display for Opt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.step.fract() == 0.0 && self.value.fract() == 0.0 {
            write!(f, "{}", self.value as i64)
        } else {
            write!(f, "{}", self.value)
        }
    }
}

/// Copies values from `src` into `dst` by name. Returns whether anything changed.
pub fn replay_opts(dst: &mut [Opt], src: &[Opt]) -> bool {
    let mut changed = false;
    for opt in dst.iter_mut() {
        if let Some(from) = src.iter().find(|o| o.name == opt.name) {
            changed |= opt.set_value(from.value);
        }
    }
    changed
}
