use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::builtin::{Boll, Ema, Kd, Ma, Macd, Mlp, Obv, ProbMass, Rsi, Sar, Wms};
use super::{ComputeStrategy, Opt, VarSpec};
use crate::error::{Error, Result};

/// Typed registry of the built-in indicators: kind -> defaults, result vars
/// and constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndicatorKind {
    Ma,
    Ema,
    Rsi,
    Macd,
    Boll,
    Kd,
    Sar,
    Wms,
    Obv,
    ProbMass,
    /// Perceptron forecast of the source var.
    Mlp,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 11] = [
        IndicatorKind::Ma,
        IndicatorKind::Ema,
        IndicatorKind::Rsi,
        IndicatorKind::Macd,
        IndicatorKind::Boll,
        IndicatorKind::Kd,
        IndicatorKind::Sar,
        IndicatorKind::Wms,
        IndicatorKind::Obv,
        IndicatorKind::ProbMass,
        IndicatorKind::Mlp,
    ];

    pub const fn short_name(self) -> &'static str {
        match self {
            IndicatorKind::Ma => "MA",
            IndicatorKind::Ema => "EMA",
            IndicatorKind::Rsi => "RSI",
            IndicatorKind::Macd => "MACD",
            IndicatorKind::Boll => "BOLL",
            IndicatorKind::Kd => "KD",
            IndicatorKind::Sar => "SAR",
            IndicatorKind::Wms => "WMS",
            IndicatorKind::Obv => "OBV",
            IndicatorKind::ProbMass => "PROBMASS",
            IndicatorKind::Mlp => "MLP",
        }
    }

    /// Whether the kind reads the configurable source var (otherwise it reads
    /// the quote columns directly).
    pub const fn reads_source(self) -> bool {
        matches!(
            self,
            IndicatorKind::Ma
                | IndicatorKind::Ema
                | IndicatorKind::Rsi
                | IndicatorKind::Macd
                | IndicatorKind::Boll
                | IndicatorKind::Mlp
        )
    }

    pub fn default_opts(self) -> Vec<Opt> {
        let period = |v: f64| Opt::preset("period", v, 1.0, 1000.0, 1.0);
        match self {
            IndicatorKind::Ma => vec![period(20.0)],
            IndicatorKind::Ema => vec![period(12.0)],
            IndicatorKind::Rsi => vec![period(14.0)],
            IndicatorKind::Macd => vec![
                Opt::preset("fast", 12.0, 1.0, 1000.0, 1.0),
                Opt::preset("slow", 26.0, 2.0, 1000.0, 1.0),
                Opt::preset("signal", 9.0, 1.0, 1000.0, 1.0),
            ],
            IndicatorKind::Boll => vec![
                period(20.0),
                Opt::preset("k", 2.0, 0.1, 10.0, 0.1),
            ],
            IndicatorKind::Kd => vec![
                period(9.0),
                Opt::preset("k", 3.0, 1.0, 100.0, 1.0),
                Opt::preset("d", 3.0, 1.0, 100.0, 1.0),
            ],
            IndicatorKind::Sar => vec![
                Opt::preset("af_init", 0.02, 0.001, 1.0, 0.001),
                Opt::preset("af_step", 0.02, 0.001, 1.0, 0.001),
                Opt::preset("af_max", 0.2, 0.001, 1.0, 0.001),
            ],
            IndicatorKind::Wms => vec![period(10.0)],
            IndicatorKind::Obv => vec![],
            IndicatorKind::ProbMass => vec![
                period(100.0),
                Opt::preset("levels", 20.0, 2.0, 500.0, 1.0),
            ],
            IndicatorKind::Mlp => vec![
                Opt::preset("window", 10.0, 1.0, 200.0, 1.0),
                Opt::preset("horizon", 1.0, 1.0, 100.0, 1.0),
                Opt::preset("hidden", 8.0, 1.0, 256.0, 1.0),
                Opt::preset("epochs", 200.0, 1.0, 10_000.0, 1.0),
                Opt::preset("history", 250.0, 1.0, 100_000.0, 1.0),
            ],
        }
    }

    /// Result vars in the order the strategy indexes them. Hidden vars carry
    /// recurrence state so a recompute only needs the previous row.
    pub fn outputs(self) -> &'static [VarSpec] {
        const MA: &[VarSpec] = &[VarSpec::line("ma")];
        const EMA: &[VarSpec] = &[VarSpec::line("ema")];
        const RSI: &[VarSpec] = &[VarSpec::line("rsi"), VarSpec::hidden("up"), VarSpec::hidden("dn")];
        const MACD: &[VarSpec] = &[
            VarSpec::line("macd"),
            VarSpec::line("signal"),
            VarSpec::line("hist"),
            VarSpec::hidden("ema_fast"),
            VarSpec::hidden("ema_slow"),
        ];
        const BOLL: &[VarSpec] = &[VarSpec::line("mid"), VarSpec::line("up"), VarSpec::line("dn")];
        const KD: &[VarSpec] = &[VarSpec::line("k"), VarSpec::line("d"), VarSpec::line("j")];
        const SAR: &[VarSpec] = &[
            VarSpec::line("sar"),
            VarSpec::hidden("dir"),
            VarSpec::hidden("ep"),
            VarSpec::hidden("af"),
        ];
        const WMS: &[VarSpec] = &[VarSpec::line("wr")];
        const OBV: &[VarSpec] = &[VarSpec::line("obv")];
        const PROBMASS: &[VarSpec] = &[VarSpec::profile("mass")];
        const MLP: &[VarSpec] = &[VarSpec::line("forecast")];
        match self {
            IndicatorKind::Ma => MA,
            IndicatorKind::Ema => EMA,
            IndicatorKind::Rsi => RSI,
            IndicatorKind::Macd => MACD,
            IndicatorKind::Boll => BOLL,
            IndicatorKind::Kd => KD,
            IndicatorKind::Sar => SAR,
            IndicatorKind::Wms => WMS,
            IndicatorKind::Obv => OBV,
            IndicatorKind::ProbMass => PROBMASS,
            IndicatorKind::Mlp => MLP,
        }
    }

    /// Builds the compute strategy for `opts` (matched by name).
    pub fn create(self, opts: &[Opt]) -> Result<ComputeStrategy> {
        let find = |name: &str| {
            opts.iter()
                .find(|o| o.name() == name)
                .ok_or_else(|| Error::InvalidOpts(format!("{} requires opt {name:?}", self.short_name())))
        };
        let value = |name: &str| find(name).map(Opt::value);
        let count = |name: &str| find(name).map(|o| o.as_usize().max(1));

        let strategy = match self {
            IndicatorKind::Ma => ComputeStrategy::Continuous(Box::new(Ma::new(count("period")?))),
            IndicatorKind::Ema => ComputeStrategy::Continuous(Box::new(Ema::new(count("period")?))),
            IndicatorKind::Rsi => ComputeStrategy::Continuous(Box::new(Rsi::new(count("period")?))),
            IndicatorKind::Macd => {
                let (fast, slow) = (count("fast")?, count("slow")?);
                if fast >= slow {
                    return Err(Error::InvalidOpts(format!(
                        "MACD fast ({fast}) must be below slow ({slow})"
                    )));
                }
                ComputeStrategy::Continuous(Box::new(Macd::new(fast, slow, count("signal")?)))
            }
            IndicatorKind::Boll => {
                ComputeStrategy::Continuous(Box::new(Boll::new(count("period")?, value("k")?)))
            }
            IndicatorKind::Kd => ComputeStrategy::Continuous(Box::new(Kd::new(
                count("period")?,
                count("k")?,
                count("d")?,
            ))),
            IndicatorKind::Sar => {
                let (init, step, max) = (value("af_init")?, value("af_step")?, value("af_max")?);
                if init > max {
                    return Err(Error::InvalidOpts(format!(
                        "SAR af_init ({init}) exceeds af_max ({max})"
                    )));
                }
                ComputeStrategy::Continuous(Box::new(Sar::new(init, step, max)))
            }
            IndicatorKind::Wms => ComputeStrategy::Continuous(Box::new(Wms::new(count("period")?))),
            IndicatorKind::Obv => ComputeStrategy::Continuous(Box::new(Obv)),
            IndicatorKind::ProbMass => ComputeStrategy::Spot(Box::new(ProbMass::new(
                count("period")?,
                count("levels")?.max(2),
            ))),
            IndicatorKind::Mlp => ComputeStrategy::Continuous(Box::new(Mlp::new(
                count("window")?,
                count("horizon")?,
                count("hidden")?,
                count("epochs")?,
                count("history")?,
            ))),
        };
        Ok(strategy)
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for IndicatorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        IndicatorKind::ALL
            .into_iter()
            .find(|k| k.short_name() == upper)
            .ok_or_else(|| Error::UnknownIndicator(s.to_string()))
    }
}
