use crate::indicator::func::{at, highest, lowest, wilder};
use crate::indicator::{ContCompute, Frame, Input};

const K: usize = 0;
const D: usize = 1;
const J: usize = 2;

/// Stochastic KD(J). `rsv` over `period` bars, `k`/`d` smoothed with a
/// Wilder-style step seeded at 50, `j = 3k - 2d`.
#[derive(Debug, Clone)]
pub struct Kd {
    period: usize,
    k_smooth: usize,
    d_smooth: usize,
}

impl Kd {
    pub fn new(period: usize, k_smooth: usize, d_smooth: usize) -> Self {
        Self {
            period: period.max(1),
            k_smooth: k_smooth.max(1),
            d_smooth: d_smooth.max(1),
        }
    }
}

fn seeded(prev: f64) -> f64 {
    if prev.is_nan() {
        50.0
    } else {
        prev
    }
}

impl ContCompute for Kd {
    fn compute(&self, i: usize, input: &Input<'_>, out: &mut Frame) {
        let hh = highest(input.high(), i, self.period);
        let ll = lowest(input.low(), i, self.period);
        let close = at(input.close(), i);
        let rsv = if hh > ll {
            (close - ll) / (hh - ll) * 100.0
        } else if hh == ll {
            50.0
        } else {
            f64::NAN
        };
        if rsv.is_nan() || close.is_nan() {
            for k in [K, D, J] {
                out.set(k, i, f64::NAN);
            }
            return;
        }
        let k = wilder(seeded(out.prev(K, i)), rsv, self.k_smooth);
        let d = wilder(seeded(out.prev(D, i)), k, self.d_smooth);
        out.set(K, i, k);
        out.set(D, i, d);
        out.set(J, i, 3.0 * k - 2.0 * d);
    }
}

#[cfg(test)]
mod tests {
    use crate::indicator::builtin::testing::{hl, run};
    use crate::indicator::IndicatorKind;

    #[test]
    fn close_at_high_pushes_k_up() {
        let quotes: Vec<_> = (0..30)
            .map(|i| hl(i, 10.0 + i as f64, 9.0 + i as f64, 10.0 + i as f64))
            .collect();
        let kind = IndicatorKind::Kd;
        let out = run(kind, &kind.default_opts(), &quotes);
        assert!(out.value_at(7, "k").is_nan());
        // First rsv = 100: k = (2*50 + 100)/3
        assert!((out.value_at(8, "k") - 200.0 / 3.0).abs() < 1e-9);
        let k = out.value_at(29, "k");
        let d = out.value_at(29, "d");
        assert!(k > 99.0 && k <= 100.0);
        assert!((out.value_at(29, "j") - (3.0 * k - 2.0 * d)).abs() < 1e-9);
    }
}
