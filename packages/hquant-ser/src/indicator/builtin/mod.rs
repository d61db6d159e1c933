//! Built-in indicators.

mod boll;
mod ema;
mod kd;
mod ma;
mod macd;
mod mlp;
mod obv;
mod probmass;
mod rsi;
mod sar;
mod wms;

pub use boll::Boll;
pub use ema::Ema;
pub use kd::Kd;
pub use ma::Ma;
pub use macd::Macd;
pub use mlp::Mlp;
pub use obv::Obv;
pub use probmass::ProbMass;
pub use rsi::Rsi;
pub use sar::Sar;
pub use wms::Wms;

#[cfg(test)]
pub(crate) mod testing {
    use crate::frequency::Frequency;
    use crate::indicator::{Indicator, IndicatorId, IndicatorKind, Opt, Placement};
    use crate::ser::{Ser, SerArena};
    use crate::types::Quote;

    pub fn ser_from(quotes: &[Quote]) -> Ser {
        let mut ser = Ser::quote("T", Frequency::ONE_MIN);
        for q in quotes {
            ser.put_quote(q).unwrap();
        }
        ser
    }

    pub fn flat(i: usize, c: f64) -> Quote {
        Quote::new((i as i64 + 1) * 60_000, c, c, c, c, 1.0)
    }

    pub fn hl(i: usize, high: f64, low: f64, close: f64) -> Quote {
        Quote::new((i as i64 + 1) * 60_000, close, high, low, close, 1.0)
    }

    /// Runs `kind` over `quotes` and returns the output series.
    pub fn run(kind: IndicatorKind, opts: &[Opt], quotes: &[Quote]) -> Ser {
        let mut arena = SerArena::new();
        let base = arena.insert(ser_from(quotes));
        let mut ind = Indicator::new(IndicatorId(1), kind, opts, "close").unwrap();
        ind.bind(&mut arena, base, Placement::OwnSer).unwrap();
        ind.compute_from(&mut arena, 0).unwrap();
        if ind.is_spot() {
            let last = arena.get(base).unwrap().last_occurred_time().unwrap();
            ind.compute_spot(&mut arena, last).unwrap();
        }
        arena.remove(ind.output().unwrap()).unwrap()
    }
}
