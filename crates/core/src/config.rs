//! Configuration structures for the quotegrid pipeline.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration for a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bucket width in seconds.
    pub interval_secs: u32,
    /// Restrict output to the daily trading window.
    pub only_trading_hours: bool,
    /// Opening time of day, `HH:MM:SS`.
    pub opening_time: String,
    /// Closing time of day, `HH:MM:SS`.
    pub closing_time: String,
    /// Calendar span of the output grid.
    pub window: AnalysisWindow,
    /// Timezone of timestamps, trading hours and dates.
    pub timezone: Tz,
    /// Process instruments on the rayon thread pool.
    pub parallel: bool,
    /// Compute the mean inter-quote gap per instrument.
    pub compute_mean_gaps: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            only_trading_hours: true,
            opening_time: "10:00:00".to_string(),
            closing_time: "15:30:00".to_string(),
            window: AnalysisWindow::default(),
            timezone: chrono_tz::America::New_York,
            parallel: true,
            compute_mean_gaps: true,
        }
    }
}

impl PipelineConfig {
    /// Check every field, failing on the first invalid one.
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(Error::config("interval_secs must be positive"));
        }
        self.window.validate()?;
        self.trading_hours()?;
        Ok(())
    }

    /// Bucket width as a signed second count.
    pub fn deltat(&self) -> i64 {
        i64::from(self.interval_secs)
    }

    /// Parsed trading window, `None` when the restriction is disabled.
    pub fn trading_hours(&self) -> Result<Option<TradingHours>> {
        if !self.only_trading_hours {
            return Ok(None);
        }
        TradingHours::parse(&self.opening_time, &self.closing_time).map(Some)
    }
}

/// Fixed calendar span covered by the output grid, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    /// First grid instant (local time).
    pub start: NaiveDateTime,
    /// Last admissible grid instant (local time).
    pub end: NaiveDateTime,
}

impl Default for AnalysisWindow {
    fn default() -> Self {
        let start = NaiveDate::from_ymd_opt(2007, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
        let end = NaiveDate::from_ymd_opt(2012, 12, 31).and_then(|d| d.and_hms_opt(23, 59, 59));
        match (start, end) {
            (Some(start), Some(end)) => Self { start, end },
            _ => unreachable!("default analysis window is a valid calendar range"),
        }
    }
}

impl AnalysisWindow {
    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(Error::config(format!(
                "analysis window starts after it ends ({} > {})",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Daily trading window in local seconds-of-day, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingHours {
    pub open_secs: u32,
    pub close_secs: u32,
}

impl TradingHours {
    /// Parse `HH:MM:SS` opening and closing times.
    pub fn parse(opening: &str, closing: &str) -> Result<Self> {
        let open_secs = parse_time_of_day(opening)?;
        let close_secs = parse_time_of_day(closing)?;
        if open_secs > close_secs {
            return Err(Error::config(format!(
                "opening time {opening} is after closing time {closing}"
            )));
        }
        Ok(Self {
            open_secs,
            close_secs,
        })
    }

    #[inline]
    pub fn contains(&self, seconds_of_day: u32) -> bool {
        seconds_of_day >= self.open_secs && seconds_of_day <= self.close_secs
    }
}

fn parse_time_of_day(s: &str) -> Result<u32> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M:%S")
        .map(|t| t.num_seconds_from_midnight())
        .map_err(|e| Error::config(format!("invalid time of day {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.interval_secs, 5);
        assert!(config.only_trading_hours);
        assert_eq!(config.timezone, chrono_tz::America::New_York);
        assert_eq!(config.window.start.to_string(), "2007-01-01 00:00:00");
        assert_eq!(config.window.end.to_string(), "2012-12-31 23:59:59");
        config.validate().unwrap();
    }

    #[test]
    fn test_default_trading_hours() {
        let hours = PipelineConfig::default().trading_hours().unwrap().unwrap();
        assert_eq!(hours.open_secs, 10 * 3600);
        assert_eq!(hours.close_secs, 15 * 3600 + 30 * 60);
        assert!(hours.contains(10 * 3600));
        assert!(hours.contains(15 * 3600 + 30 * 60));
        assert!(!hours.contains(15 * 3600 + 30 * 60 + 1));
    }

    #[test]
    fn test_trading_hours_disabled() {
        let config = PipelineConfig {
            only_trading_hours: false,
            opening_time: "garbage".to_string(),
            ..Default::default()
        };
        assert_eq!(config.trading_hours().unwrap(), None);
    }

    #[test]
    fn test_invalid_configs() {
        let zero = PipelineConfig {
            interval_secs: 0,
            ..Default::default()
        };
        assert!(matches!(zero.validate(), Err(Error::Config(_))));

        let bad_time = PipelineConfig {
            closing_time: "15:61:00".to_string(),
            ..Default::default()
        };
        assert!(bad_time.validate().is_err());

        let inverted = PipelineConfig {
            opening_time: "16:00:00".to_string(),
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"interval_secs": 60, "timezone": "Europe/London"}"#).unwrap();
        assert_eq!(config.interval_secs, 60);
        assert_eq!(config.timezone, chrono_tz::Europe::London);
        assert_eq!(config.opening_time, "10:00:00");
    }
}
