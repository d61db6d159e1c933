use crate::indicator::func::{at, highest, lowest};
use crate::indicator::{ContCompute, Frame, Input};

/// Williams %R in `[-100, 0]`.
#[derive(Debug, Clone)]
pub struct Wms {
    period: usize,
}

impl Wms {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }
}

impl ContCompute for Wms {
    fn compute(&self, i: usize, input: &Input<'_>, out: &mut Frame) {
        let hh = highest(input.high(), i, self.period);
        let ll = lowest(input.low(), i, self.period);
        let close = at(input.close(), i);
        let wr = if hh > ll {
            (hh - close) / (hh - ll) * -100.0
        } else if hh == ll {
            -50.0
        } else {
            f64::NAN
        };
        out.set(0, i, wr);
    }
}

#[cfg(test)]
mod tests {
    use crate::indicator::builtin::testing::{hl, run};
    use crate::indicator::{IndicatorKind, Opt};

    #[test]
    fn range_position() {
        let quotes = [hl(0, 10.0, 0.0, 5.0), hl(1, 8.0, 2.0, 8.0), hl(2, 9.0, 1.0, 1.0)];
        let opts = [Opt::int("period", 2, 1, 1000).unwrap()];
        let out = run(IndicatorKind::Wms, &opts, &quotes);
        assert!(out.value_at(0, "wr").is_nan());
        // hh 10, ll 0
        assert_eq!(out.value_at(1, "wr"), -20.0);
        // hh 9, ll 1, close at the low
        assert_eq!(out.value_at(2, "wr"), -100.0);
    }
}
