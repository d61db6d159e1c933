use serde::{Deserialize, Serialize};

use super::{replay_opts, Indicator, IndicatorId, IndicatorKind, Opt, Placement};
use crate::error::{Error, Result};

fn default_source() -> String {
    "close".to_string()
}

fn default_active() -> bool {
    true
}

/// Serializable description of an indicator: kind plus its own copy of the
/// opts. Restoring replays the opts into a fresh instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDescriptor {
    pub kind: IndicatorKind,
    #[serde(default)]
    pub opts: Vec<Opt>,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub placement: Placement,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl IndicatorDescriptor {
    pub fn new(kind: IndicatorKind) -> Self {
        Self {
            kind,
            opts: kind.default_opts(),
            source: default_source(),
            placement: Placement::OwnSer,
            active: true,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    /// Stores clones of `opts`; later edits to the caller's list do not leak
    /// into the descriptor.
    pub fn set_opts(&mut self, opts: &[Opt]) -> bool {
        if self.opts.is_empty() {
            self.opts = self.kind.default_opts();
        }
        replay_opts(&mut self.opts, opts)
    }

    /// Sets one opt by name.
    pub fn with_opt(mut self, name: &str, value: f64) -> Result<Self> {
        let opt = self
            .opts
            .iter_mut()
            .find(|o| o.name() == name)
            .ok_or_else(|| Error::InvalidOpts(format!("{} has no opt {name:?}", self.kind)))?;
        opt.set_value(value);
        Ok(self)
    }

    pub fn opt(&self, name: &str) -> Option<f64> {
        self.opts.iter().find(|o| o.name() == name).map(Opt::value)
    }

    /// Fresh, unbound indicator with the stored opts replayed.
    pub fn create_indicator(&self, id: IndicatorId) -> Result<Indicator> {
        Indicator::new(id, self.kind, &self.opts, &self.source)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opts_are_cloned_into_the_descriptor() {
        let mut mine = vec![Opt::int("period", 30, 1, 1000).unwrap()];
        let mut desc = IndicatorDescriptor::new(IndicatorKind::Ema);
        assert!(desc.set_opts(&mine));
        mine[0].set_value(99.0);
        assert_eq!(desc.opt("period"), Some(30.0));
        assert_eq!(mine[0].value(), 99.0);
    }

    #[test]
    fn restore_replays_opts() {
        let desc = IndicatorDescriptor::new(IndicatorKind::Macd)
            .with_opt("signal", 5.0)
            .unwrap()
            .with_placement(Placement::InPlace);
        let json = desc.to_json().unwrap();
        let back = IndicatorDescriptor::from_json(&json).unwrap();
        assert_eq!(back, desc);

        let ind = back.create_indicator(IndicatorId(3)).unwrap();
        assert_eq!(ind.label(), "MACD(12,26,5)");
        assert!(IndicatorDescriptor::new(IndicatorKind::Ma).with_opt("nope", 1.0).is_err());
    }

    #[test]
    fn stored_opts_are_clamped_on_load() {
        let desc = IndicatorDescriptor::from_json(
            r#"{"kind":"MA","opts":[{"name":"period","value":0,"min":1,"max":1000,"step":1}]}"#,
        )
        .unwrap();
        assert_eq!(desc.opt("period"), Some(1.0));
        assert!(IndicatorDescriptor::from_json(
            r#"{"kind":"MA","opts":[{"name":"period","value":5,"min":9,"max":1}]}"#
        )
        .is_err());
    }

    #[test]
    fn minimal_json_uses_defaults() {
        let desc = IndicatorDescriptor::from_json(r#"{"kind":"RSI"}"#).unwrap();
        assert_eq!(desc.source, "close");
        assert!(desc.active);
        let ind = desc.create_indicator(IndicatorId(1)).unwrap();
        assert_eq!(ind.label(), "RSI(14)");
    }
}
