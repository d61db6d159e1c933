//! Engine configuration loaded from TOML.
//!
//! Every section is optional:
//!
//! ```toml
//! [calendar]
//! time_zone = "America/New_York"
//! first_day_of_week = "Sun"
//!
//! [loader]
//! poll_interval_ms = 30000
//! date_format = "%Y-%m-%d"
//!
//! [network]
//! inputs = 10
//! hidden = [8]
//!
//! [training]
//! mode = "batch"
//! learner = { kind = "rprop" }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::feed::csv::DEFAULT_DATE_FORMAT;
use crate::frequency::Calendar;
use crate::nn::{NetworkConfig, TrainingConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub poll_interval_ms: u64,
    pub one_shot: bool,
    /// chrono format of the CSV date column.
    pub date_format: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 60_000,
            one_shot: false,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub calendar: Calendar,
    pub loader: LoaderConfig,
    pub network: NetworkConfig,
    pub training: TrainingConfig,
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// CSV parser honoring the calendar and the configured date format.
    pub fn csv_parser(&self) -> crate::feed::CsvQuoteParser {
        crate::feed::CsvQuoteParser::new(self.calendar).with_date_format(&self.loader.date_format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{LearnerConfig, TrainingMode};
    use chrono::Weekday;

    #[test]
    fn empty_config_is_default() {
        let cfg = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.calendar, Calendar::utc());
        assert_eq!(cfg.loader.poll_interval_ms, 60_000);
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            [calendar]
            time_zone = "America/New_York"
            first_day_of_week = "Sun"

            [loader]
            poll_interval_ms = 500

            [network]
            inputs = 10
            hidden = [8, 4]

            [training]
            mode = "batch"
            learner = { kind = "rprop" }
            "#,
        )
        .unwrap();
        assert_eq!(cfg.calendar.tz, chrono_tz::America::New_York);
        assert_eq!(cfg.calendar.first_day_of_week, Weekday::Sun);
        assert_eq!(cfg.loader.poll_interval_ms, 500);
        assert_eq!(cfg.loader.date_format, DEFAULT_DATE_FORMAT);
        assert_eq!(cfg.network.hidden, vec![8, 4]);
        assert_eq!(cfg.network.outputs, 1);
        assert_eq!(cfg.training.mode, TrainingMode::Batch);
        assert_eq!(cfg.training.learner, LearnerConfig::Rprop);
    }

    #[test]
    fn bad_values_are_config_errors() {
        assert!(matches!(
            EngineConfig::from_toml_str("[calendar]\ntime_zone = \"Mars/Olympus\""),
            Err(Error::Config(_))
        ));
        assert!(EngineConfig::load("/nonexistent/hquant.toml").is_err());
    }
}
