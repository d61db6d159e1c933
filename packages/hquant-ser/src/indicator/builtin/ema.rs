use crate::indicator::func::{at, iema};
use crate::indicator::{ContCompute, Frame, Input};

/// `ema[0] = v[0]`, `ema[i] = iema(ema[i-1], v[i], period)`.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }
}

impl ContCompute for Ema {
    fn compute(&self, i: usize, input: &Input<'_>, out: &mut Frame) {
        let v = at(input.source(), i);
        out.set(0, i, iema(out.prev(0, i), v, self.period));
    }
}
