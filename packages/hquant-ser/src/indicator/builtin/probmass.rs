use crate::indicator::func::at;
use crate::indicator::{Frame, Input, SpotCompute};
use crate::ser::MassDistribution;

/// Volume-at-price histogram over the `period` bars ending at the spot row.
///
/// The window's `[low, high]` range is split into `levels` equal buckets;
/// each bar's volume goes to the bucket of its close. Masses sum to 1.
#[derive(Debug, Clone)]
pub struct ProbMass {
    period: usize,
    levels: usize,
}

impl ProbMass {
    pub fn new(period: usize, levels: usize) -> Self {
        Self {
            period: period.max(1),
            levels: levels.max(2),
        }
    }

    pub fn distribution(&self, i: usize, input: &Input<'_>) -> Option<MassDistribution> {
        let (high, low, close, volume) = (input.high(), input.low(), input.close(), input.volume());
        let begin = (i + 1).saturating_sub(self.period);
        let rows = begin..=i;

        let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
        for j in rows.clone() {
            let (h, l) = (at(high, j), at(low, j));
            if h.is_finite() && l.is_finite() {
                lo = lo.min(l);
                hi = hi.max(h);
            }
        }
        if !(lo.is_finite() && hi.is_finite()) {
            return None;
        }

        let n = self.levels;
        let step = (hi - lo) / n as f64;
        let levels: Vec<f64> = (0..n).map(|k| lo + step * (k as f64 + 0.5)).collect();
        let mut masses = vec![0.0; n];
        for j in rows {
            let (c, v) = (at(close, j), at(volume, j));
            if !(c.is_finite() && v.is_finite()) {
                continue;
            }
            let bucket = if step > 0.0 {
                (((c - lo) / step) as usize).min(n - 1)
            } else {
                0
            };
            masses[bucket] += v;
        }
        let total: f64 = masses.iter().sum();
        if total <= 0.0 {
            return None;
        }
        masses.iter_mut().for_each(|m| *m /= total);
        MassDistribution::new(levels, masses).ok()
    }
}

impl SpotCompute for ProbMass {
    fn compute_spot(&self, i: usize, input: &Input<'_>, out: &mut Frame) {
        out.set_profile(0, i, self.distribution(i, input));
    }
}

#[cfg(test)]
mod tests {
    use crate::indicator::builtin::testing::run;
    use crate::indicator::{IndicatorKind, Opt};
    use crate::types::Quote;

    #[test]
    fn spot_row_only() {
        let q = |i: i64, c: f64, v: f64| Quote::new(i * 60_000, c, c + 1.0, c - 1.0, c, v);
        let quotes = [q(1, 10.0, 1.0), q(2, 20.0, 3.0), q(3, 10.0, 1.0)];
        let opts = [
            Opt::int("period", 3, 1, 1000).unwrap(),
            Opt::int("levels", 2, 2, 500).unwrap(),
        ];
        let out = run(IndicatorKind::ProbMass, &opts, &quotes);
        let var = out.var("mass").unwrap();
        assert!(var.get_profile(0).is_none());
        assert!(var.get_profile(1).is_none());

        let dist = var.get_profile(2).unwrap();
        // range [9, 21], buckets [9, 15) and [15, 21]
        assert_eq!(dist.levels, vec![12.0, 18.0]);
        assert_eq!(dist.masses, vec![0.4, 0.6]);
        assert!((dist.total() - 1.0).abs() < 1e-12);
    }
}
