use crate::indicator::func::{at, wilder};
use crate::indicator::{ContCompute, Frame, Input};

const RSI: usize = 0;
const UP: usize = 1;
const DN: usize = 2;

/// Wilder RSI. The first `period` changes seed the averages with a plain
/// mean; later rows smooth from the previous row's hidden `up`/`dn`.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    fn rsi_from(up: f64, dn: f64) -> f64 {
        if up == 0.0 && dn == 0.0 {
            return 50.0;
        }
        if dn == 0.0 {
            return 100.0;
        }
        100.0 - 100.0 / (1.0 + up / dn)
    }
}

impl ContCompute for Rsi {
    fn compute(&self, i: usize, input: &Input<'_>, out: &mut Frame) {
        let src = input.source();
        if i < self.period {
            for k in [RSI, UP, DN] {
                out.set(k, i, f64::NAN);
            }
            return;
        }
        let (up, dn) = if i == self.period {
            let (mut gains, mut losses) = (0.0, 0.0);
            for j in 1..=i {
                let change = at(src, j) - at(src, j - 1);
                gains += change.max(0.0);
                losses += (-change).max(0.0);
            }
            (gains / self.period as f64, losses / self.period as f64)
        } else {
            let change = at(src, i) - at(src, i - 1);
            (
                wilder(out.prev(UP, i), change.max(0.0), self.period),
                wilder(out.prev(DN, i), (-change).max(0.0), self.period),
            )
        };
        out.set(UP, i, up);
        out.set(DN, i, dn);
        let rsi = if up.is_nan() || dn.is_nan() {
            f64::NAN
        } else {
            Self::rsi_from(up, dn)
        };
        out.set(RSI, i, rsi);
    }
}
