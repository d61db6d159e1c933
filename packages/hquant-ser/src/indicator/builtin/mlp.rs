use std::ops::Range;

use crate::error::{Error, Result};
use crate::indicator::func::window;
use crate::indicator::{ContCompute, Frame, Input};
use crate::nn::{Network, NetworkConfig, Normalizer, TrainingConfig, TrainingSet};

/// Forecast of the source var `horizon` rows ahead, made by a perceptron fed
/// the last `window` values.
///
/// Every pass retrains from scratch (fixed seeds) on the latest `history`
/// windows whose target is known, then forecasts the recomputed rows. Rows
/// before the pass keep the forecasts made when they were computed. Until
/// one full window plus horizon exists the forecast is NaN.
#[derive(Debug, Clone)]
pub struct Mlp {
    window: usize,
    horizon: usize,
    hidden: usize,
    epochs: usize,
    history: usize,
    first_row: usize,
    forecasts: Vec<f64>,
}

impl Mlp {
    pub fn new(window: usize, horizon: usize, hidden: usize, epochs: usize, history: usize) -> Self {
        Self {
            window: window.max(1),
            horizon: horizon.max(1),
            hidden: hidden.max(1),
            epochs: epochs.max(1),
            history: history.max(1),
            first_row: 0,
            forecasts: Vec::new(),
        }
    }

    fn train(&self, values: &[f64]) -> Result<Option<(Network, Normalizer)>> {
        let span = self.window + self.horizon;
        let from = values.len().saturating_sub(self.history + span - 1);
        let set = match TrainingSet::from_series(&values[from..], self.window, self.horizon) {
            Ok(set) => set,
            Err(Error::InvalidTrainingData(_)) => return Ok(None),
            Err(err) => return Err(err),
        };
        let norm = Normalizer::fit(&set)?;
        let mut net = Network::new(&NetworkConfig {
            inputs: self.window,
            hidden: vec![self.hidden],
            outputs: 1,
            ..NetworkConfig::default()
        })?;
        let cfg = TrainingConfig {
            max_epochs: self.epochs,
            target_error: 1e-4,
            ..TrainingConfig::default()
        };
        net.train(&norm.normalize(&set), &cfg)?;
        Ok(Some((net, norm)))
    }
}

impl ContCompute for Mlp {
    fn prepare(&mut self, input: &Input<'_>, rows: Range<usize>) -> Result<()> {
        let values = input.source();
        let end = rows.end.min(values.len());
        self.first_row = rows.start;
        self.forecasts.clear();
        let Some((mut net, norm)) = self.train(&values[..end])? else {
            return Ok(());
        };
        for i in rows.start..end {
            let forecast = match window(values, i, self.window) {
                Some(w) => {
                    let out = net.predict(&norm.normalize_input(w))?;
                    norm.denormalize_output(&out).first().copied().unwrap_or(f64::NAN)
                }
                None => f64::NAN,
            };
            self.forecasts.push(forecast);
        }
        Ok(())
    }

    fn compute(&self, i: usize, _input: &Input<'_>, out: &mut Frame) {
        let forecast = i
            .checked_sub(self.first_row)
            .and_then(|k| self.forecasts.get(k))
            .copied()
            .unwrap_or(f64::NAN);
        out.set(0, i, forecast);
    }
}

#[cfg(test)]
mod tests {
    use crate::indicator::builtin::testing::{flat, run};
    use crate::indicator::{IndicatorKind, Opt};

    fn opts(window: u32, epochs: u32) -> Vec<Opt> {
        vec![
            Opt::int("window", window, 1, 200).unwrap(),
            Opt::int("horizon", 1, 1, 100).unwrap(),
            Opt::int("hidden", 4, 1, 256).unwrap(),
            Opt::int("epochs", epochs, 1, 10_000).unwrap(),
        ]
    }

    #[test]
    fn learns_an_alternating_series() {
        let quotes: Vec<_> = (0..40)
            .map(|i| flat(i, if i % 2 == 0 { 1.0 } else { 3.0 }))
            .collect();
        let out = run(IndicatorKind::Mlp, &opts(2, 300), &quotes);
        let v = out.values("forecast").unwrap();
        assert_eq!(v.len(), 40);
        assert!(v[0].is_nan());
        // row 39 closes at 3, so the next close is 1
        assert!((v[39] - 1.0).abs() < 0.5, "forecast {}", v[39]);
        assert!((v[38] - 3.0).abs() < 0.5, "forecast {}", v[38]);
    }

    #[test]
    fn short_history_forecasts_nothing() {
        let quotes: Vec<_> = (0..3).map(|i| flat(i, i as f64)).collect();
        let out = run(IndicatorKind::Mlp, &opts(5, 10), &quotes);
        assert!(out.values("forecast").unwrap().iter().all(|v| v.is_nan()));
    }
}
