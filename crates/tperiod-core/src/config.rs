use std::collections::HashSet;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{PeriodError, Result};

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300; // refresher tick cadence
pub const DEFAULT_HORIZON_SECS: u64 = 24 * 3600; // roll-forward horizon and pre-fill length
pub const DEFAULT_RETENTION_SECS: u64 = 3600; // history kept behind "now" on purge
pub const MAX_WINDOW_SECS: u64 = 366 * 24 * 3600; // ceiling for horizon and retention

/// Top-level config (tperiod.toml + TPERIOD_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TperiodConfig {
    #[serde(default)]
    pub refresher: RefresherConfig,
    #[serde(default)]
    pub periods: Vec<PeriodConfig>,
}

/// Cadence and window sizes used by the background refresher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefresherConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_horizon_secs")]
    pub horizon_secs: u64,
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            horizon_secs: DEFAULT_HORIZON_SECS,
            retention_secs: DEFAULT_RETENTION_SECS,
        }
    }
}

impl RefresherConfig {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    /// Roll-forward horizon, capped at [`MAX_WINDOW_SECS`].
    pub fn horizon(&self) -> chrono::Duration {
        window(self.horizon_secs)
    }

    /// Purge grace window, capped at [`MAX_WINDOW_SECS`].
    pub fn retention(&self) -> chrono::Duration {
        window(self.retention_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(PeriodError::Config(
                "refresher.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.horizon_secs == 0 {
            return Err(PeriodError::Config(
                "refresher.horizon_secs must be greater than zero".to_string(),
            ));
        }
        if self.horizon_secs > MAX_WINDOW_SECS {
            return Err(PeriodError::Config(format!(
                "refresher.horizon_secs must be at most {MAX_WINDOW_SECS}, got {}",
                self.horizon_secs
            )));
        }
        if self.retention_secs > MAX_WINDOW_SECS {
            return Err(PeriodError::Config(format!(
                "refresher.retention_secs must be at most {MAX_WINDOW_SECS}, got {}",
                self.retention_secs
            )));
        }
        Ok(())
    }
}

fn window(secs: u64) -> chrono::Duration {
    let secs = i64::try_from(secs.min(MAX_WINDOW_SECS)).unwrap_or(i64::MAX);
    chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::MAX)
}

/// One configured time period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodConfig {
    pub name: String,
    /// Display name shown next to `name` in dumps.
    pub alias: Option<String>,
    pub policy: PolicyConfig,
}

/// Selects the update policy a period is built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Active for every requested window.
    Always,
    /// Never active.
    Never,
    /// Active inside the listed weekly windows (UTC).
    Weekly {
        #[serde(default)]
        windows: Vec<WindowConfig>,
    },
}

/// A daily or weekly time-of-day window.
///
/// `day` follows ISO weekday numbering (0 = Monday … 6 = Sunday); absent means
/// every day. A window whose end is not after its start runs past midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub day: Option<u8>,
    pub start_hour: u8,
    #[serde(default)]
    pub start_minute: u8,
    pub end_hour: u8,
    #[serde(default)]
    pub end_minute: u8,
}

fn default_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}
fn default_horizon_secs() -> u64 {
    DEFAULT_HORIZON_SECS
}
fn default_retention_secs() -> u64 {
    DEFAULT_RETENTION_SECS
}

impl TperiodConfig {
    /// Load config from a TOML file with TPERIOD_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `TPERIOD_REFRESHER__INTERVAL_SECS=60`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::from_figment(
            Figment::new()
                .merge(Toml::file(&path))
                .merge(Env::prefixed("TPERIOD_").split("__")),
        )
    }

    /// Extract and validate a config from an already assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: TperiodConfig = figment
            .extract()
            .map_err(|e| PeriodError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.refresher.validate()?;

        let mut seen = HashSet::new();
        for period in &self.periods {
            if period.name.trim().is_empty() {
                return Err(PeriodError::Config("period name must not be empty".to_string()));
            }
            if !seen.insert(period.name.as_str()) {
                return Err(PeriodError::Config(format!(
                    "duplicate period name: {}",
                    period.name
                )));
            }
            if let PolicyConfig::Weekly { windows } = &period.policy {
                for window in windows {
                    window.validate().map_err(|reason| {
                        PeriodError::Config(format!("period {}: {reason}", period.name))
                    })?;
                }
            }
        }
        Ok(())
    }
}

impl WindowConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.day.is_some_and(|d| d > 6) {
            return Err(format!("window day must be 0..=6, got {:?}", self.day));
        }
        if self.start_hour > 23 || self.end_hour > 23 {
            return Err("window hours must be 0..=23".to_string());
        }
        if self.start_minute > 59 || self.end_minute > 59 {
            return Err("window minutes must be 0..=59".to_string());
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.tperiod/tperiod.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Result<TperiodConfig> {
        TperiodConfig::from_figment(Figment::new().merge(Toml::string(toml)))
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.refresher.interval_secs, 300);
        assert_eq!(config.refresher.horizon_secs, 86_400);
        assert_eq!(config.refresher.retention_secs, 3_600);
        assert!(config.periods.is_empty());
    }

    #[test]
    fn parses_weekly_policy() {
        let config = parse(
            r#"
            [refresher]
            interval_secs = 60

            [[periods]]
            name = "business-hours"
            alias = "Business hours"
            policy = { kind = "weekly", windows = [
                { day = 0, start_hour = 9, end_hour = 17 },
                { start_hour = 22, start_minute = 30, end_hour = 2 },
            ] }

            [[periods]]
            name = "24x7"
            policy = { kind = "always" }
            "#,
        )
        .unwrap();

        assert_eq!(config.refresher.interval(), std::time::Duration::from_secs(60));
        assert_eq!(config.periods.len(), 2);
        assert_eq!(config.periods[0].alias.as_deref(), Some("Business hours"));
        match &config.periods[0].policy {
            PolicyConfig::Weekly { windows } => {
                assert_eq!(windows.len(), 2);
                assert_eq!(windows[0].day, Some(0));
                assert_eq!(windows[1].start_minute, 30);
                assert_eq!(windows[1].end_minute, 0);
            }
            other => panic!("expected weekly policy, got {other:?}"),
        }
        assert_eq!(config.periods[1].policy, PolicyConfig::Always);
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = parse(
            r#"
            [[periods]]
            name = "a"
            policy = { kind = "never" }

            [[periods]]
            name = "a"
            policy = { kind = "always" }
            "#,
        )
        .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn rejects_out_of_range_window() {
        let err = parse(
            r#"
            [[periods]]
            name = "late"
            policy = { kind = "weekly", windows = [{ start_hour = 24, end_hour = 1 }] }
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("late"));
    }

    #[test]
    fn rejects_horizon_beyond_ceiling() {
        let mut config = TperiodConfig::default();
        config.refresher.horizon_secs = u64::MAX;
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("horizon_secs"));

        let err = parse("[refresher]\nhorizon_secs = 10000000000000\n").unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn rejects_retention_beyond_ceiling() {
        let err = parse(&format!("[refresher]\nretention_secs = {}\n", MAX_WINDOW_SECS + 1))
            .unwrap_err();
        assert!(err.to_string().contains("retention_secs"));
    }

    #[test]
    fn oversized_windows_are_capped_not_wrapped() {
        let cfg = RefresherConfig {
            interval_secs: 60,
            horizon_secs: u64::MAX,
            retention_secs: u64::MAX,
        };
        assert!(cfg.validate().is_err());
        let cap = chrono::Duration::seconds(MAX_WINDOW_SECS as i64);
        assert_eq!(cfg.horizon(), cap);
        assert_eq!(cfg.retention(), cap);
    }

    #[test]
    fn rejects_zero_interval() {
        let err = parse("[refresher]\ninterval_secs = 0\n").unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
