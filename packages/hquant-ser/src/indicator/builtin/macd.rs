use crate::indicator::func::{at, iema};
use crate::indicator::{ContCompute, Frame, Input};

const MACD: usize = 0;
const SIGNAL: usize = 1;
const HIST: usize = 2;
const EMA_FAST: usize = 3;
const EMA_SLOW: usize = 4;

/// `macd = ema(fast) - ema(slow)`, `signal = ema(macd, signal)`,
/// `hist = macd - signal`.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: fast.max(1),
            slow: slow.max(1),
            signal: signal.max(1),
        }
    }
}

impl ContCompute for Macd {
    fn compute(&self, i: usize, input: &Input<'_>, out: &mut Frame) {
        let v = at(input.source(), i);
        let fast = iema(out.prev(EMA_FAST, i), v, self.fast);
        let slow = iema(out.prev(EMA_SLOW, i), v, self.slow);
        let macd = fast - slow;
        let signal = iema(out.prev(SIGNAL, i), macd, self.signal);
        out.set(EMA_FAST, i, fast);
        out.set(EMA_SLOW, i, slow);
        out.set(MACD, i, macd);
        out.set(SIGNAL, i, signal);
        out.set(HIST, i, macd - signal);
    }
}
