use crate::indicator::func::ma;
use crate::indicator::{ContCompute, Frame, Input};

/// Simple moving average of the source var.
#[derive(Debug, Clone)]
pub struct Ma {
    period: usize,
}

impl Ma {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }
}

impl ContCompute for Ma {
    fn compute(&self, i: usize, input: &Input<'_>, out: &mut Frame) {
        out.set(0, i, ma(input.source(), i, self.period));
    }
}
