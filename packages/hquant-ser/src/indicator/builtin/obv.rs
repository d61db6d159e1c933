use crate::indicator::func::at;
use crate::indicator::{ContCompute, Frame, Input};

/// On-balance volume.
#[derive(Debug, Clone, Copy, Default)]
pub struct Obv;

impl ContCompute for Obv {
    fn compute(&self, i: usize, input: &Input<'_>, out: &mut Frame) {
        let (close, volume) = (input.close(), input.volume());
        let v = at(volume, i);
        let obv = match i.checked_sub(1) {
            None => v,
            Some(p) => {
                let prev = out.get(0, p);
                let (c, pc) = (at(close, i), at(close, p));
                if c > pc {
                    prev + v
                } else if c < pc {
                    prev - v
                } else {
                    prev
                }
            }
        };
        out.set(0, i, obv);
    }
}

#[cfg(test)]
mod tests {
    use crate::indicator::builtin::testing::run;
    use crate::indicator::IndicatorKind;
    use crate::types::Quote;

    #[test]
    fn signed_volume_sum() {
        let q = |i: i64, c: f64, v: f64| Quote::new(i * 60_000, c, c, c, c, v);
        let quotes = [q(1, 10.0, 5.0), q(2, 11.0, 3.0), q(3, 10.5, 2.0), q(4, 10.5, 9.0)];
        let out = run(IndicatorKind::Obv, &[], &quotes);
        assert_eq!(out.values("obv").unwrap(), &[5.0, 8.0, 6.0, 6.0]);
    }
}
