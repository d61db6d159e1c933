use crate::indicator::func::{ma, stdev};
use crate::indicator::{ContCompute, Frame, Input};

/// Bollinger bands: `mid = ma`, `up/dn = mid +/- k * stdev`.
#[derive(Debug, Clone)]
pub struct Boll {
    period: usize,
    k: f64,
}

impl Boll {
    pub fn new(period: usize, k: f64) -> Self {
        Self {
            period: period.max(1),
            k,
        }
    }
}

impl ContCompute for Boll {
    fn compute(&self, i: usize, input: &Input<'_>, out: &mut Frame) {
        let src = input.source();
        let mid = ma(src, i, self.period);
        let sd = stdev(src, i, self.period);
        out.set(0, i, mid);
        out.set(1, i, mid + self.k * sd);
        out.set(2, i, mid - self.k * sd);
    }
}

#[cfg(test)]
mod tests {
    use crate::indicator::builtin::testing::{flat, run};
    use crate::indicator::{IndicatorKind, Opt};

    #[test]
    fn bands_around_mean() {
        let quotes: Vec<_> = [1.0, 3.0, 1.0, 3.0].iter().enumerate().map(|(i, c)| flat(i, *c)).collect();
        let opts = [
            Opt::int("period", 2, 1, 1000).unwrap(),
            Opt::new("k", 2.0, 0.1, 10.0, 0.1).unwrap(),
        ];
        let out = run(IndicatorKind::Boll, &opts, &quotes);
        assert!(out.value_at(0, "mid").is_nan());
        assert_eq!(out.value_at(3, "mid"), 2.0);
        assert_eq!(out.value_at(3, "up"), 4.0);
        assert_eq!(out.value_at(3, "dn"), 0.0);
    }
}
