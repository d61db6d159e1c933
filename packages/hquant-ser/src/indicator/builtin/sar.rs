use crate::indicator::func::at;
use crate::indicator::{ContCompute, Frame, Input};

const SAR: usize = 0;
const DIR: usize = 1;
const EP: usize = 2;
const AF: usize = 3;

const LONG: f64 = 1.0;
const SHORT: f64 = -1.0;

/// Parabolic stop-and-reverse.
///
/// Hidden state per row: direction (`+1` long, `-1` short), extreme point and
/// acceleration factor. A flip puts the SAR at the old extreme point, the
/// extreme point at the flip bar's low/high and resets the acceleration.
#[derive(Debug, Clone)]
pub struct Sar {
    af_init: f64,
    af_step: f64,
    af_max: f64,
}

impl Sar {
    pub fn new(af_init: f64, af_step: f64, af_max: f64) -> Self {
        Self {
            af_init,
            af_step,
            af_max,
        }
    }

    /// Seeds the trend from bars `i-1` and `i`.
    fn seed(&self, i: usize, high: &[f64], low: &[f64], out: &mut Frame) {
        let long = at(high, i) > at(high, i - 1);
        let (sar, ep) = if long {
            (at(low, i - 1), at(high, i))
        } else {
            (at(high, i - 1), at(low, i))
        };
        out.set(SAR, i, sar);
        out.set(DIR, i, if long { LONG } else { SHORT });
        out.set(EP, i, ep);
        out.set(AF, i, self.af_init);
    }
}

impl ContCompute for Sar {
    fn compute(&self, i: usize, input: &Input<'_>, out: &mut Frame) {
        let (high, low) = (input.high(), input.low());
        if i == 0 {
            for k in [SAR, DIR, EP, AF] {
                out.set(k, i, f64::NAN);
            }
            return;
        }
        let (sar, dir, mut ep, mut af) = (
            out.prev(SAR, i),
            out.prev(DIR, i),
            out.prev(EP, i),
            out.prev(AF, i),
        );
        if i == 1 || sar.is_nan() || dir.is_nan() {
            self.seed(i, high, low, out);
            return;
        }

        let mut next = sar + af * (ep - sar);
        let mut dir = dir;
        if dir == LONG {
            next = next.min(at(low, i - 1));
            if i >= 2 {
                next = next.min(at(low, i - 2));
            }
            if at(low, i) < next {
                dir = SHORT;
                next = ep;
                ep = at(low, i);
                af = self.af_init;
            } else if at(high, i) > ep {
                ep = at(high, i);
                af = (af + self.af_step).min(self.af_max);
            }
        } else {
            next = next.max(at(high, i - 1));
            if i >= 2 {
                next = next.max(at(high, i - 2));
            }
            if at(high, i) > next {
                dir = LONG;
                next = ep;
                ep = at(high, i);
                af = self.af_init;
            } else if at(low, i) < ep {
                ep = at(low, i);
                af = (af + self.af_step).min(self.af_max);
            }
        }
        out.set(SAR, i, next);
        out.set(DIR, i, dir);
        out.set(EP, i, ep);
        out.set(AF, i, af);
    }
}
