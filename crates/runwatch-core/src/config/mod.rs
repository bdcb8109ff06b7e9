use crate::errors::ConfigError;
use crate::model::MICROS_PER_DAY;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound on the status aggregation window.
pub const MAX_STATUS_WINDOW_SECS: u64 = 86_400;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub status: StatusSettings,
    pub coverage: CoverageThresholds,
    pub inactivity: InactivitySettings,
    pub profiling: ProfilingSettings,
    pub notify: NotifySettings,

    /// Attempts per read-compute-write cycle before a task gives up.
    pub max_retries: u32,

    /// Concurrent tasks during fan-out.
    pub fanout_parallelism: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            status: StatusSettings::default(),
            coverage: CoverageThresholds::default(),
            inactivity: InactivitySettings::default(),
            profiling: ProfilingSettings::default(),
            notify: NotifySettings::default(),
            max_retries: 5,
            fanout_parallelism: 4,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StatusSettings {
    /// Look-back window; clamped to one day.
    pub window_secs: u64,
    pub max_run_count: u32,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            window_secs: MAX_STATUS_WINDOW_SECS,
            max_run_count: 1000,
        }
    }
}

impl StatusSettings {
    pub fn window_us(&self) -> i64 {
        self.window_secs.min(MAX_STATUS_WINDOW_SECS) as i64 * 1_000_000
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CoverageThresholds {
    pub good_zone: f64,
    pub bad_zone: f64,
    pub delta: f64,
}

impl Default for CoverageThresholds {
    fn default() -> Self {
        Self {
            good_zone: 0.70,
            bad_zone: 0.30,
            delta: 0.05,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct InactivitySettings {
    pub min_days: u32,
    pub max_days: u32,
}

impl Default for InactivitySettings {
    fn default() -> Self {
        Self {
            min_days: 1,
            max_days: 8,
        }
    }
}

impl InactivitySettings {
    pub fn min_us(&self) -> i64 {
        i64::from(self.min_days) * MICROS_PER_DAY
    }

    pub fn max_us(&self) -> i64 {
        i64::from(self.max_days) * MICROS_PER_DAY
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProfilingSettings {
    /// Run option keys whose values form the option alias, in order.
    pub option_keys: Vec<String>,
    /// IANA zone used to truncate timestamps to a canonical day.
    pub reference_time_zone: String,
    /// Minimum absolute delta (percent) flagged in the digest.
    pub digest_threshold_pct: f64,
}

impl Default for ProfilingSettings {
    fn default() -> Self {
        Self {
            option_keys: vec!["hidl_hal_mode".to_string()],
            reference_time_zone: "America/Los_Angeles".to_string(),
            digest_threshold_pct: 5.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct NotifySettings {
    pub default_recipients: Vec<String>,
    pub subject_prefix: Option<String>,
    /// Base URL for links back to the dashboard, e.g. `https://dash.example.com`.
    pub dashboard_url: Option<String>,
}

impl EngineConfig {
    /// Loads YAML config; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        let cfg = Self::from_yaml(&raw)?;
        Ok(cfg)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_yaml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.coverage;
        for (field, v) in [
            ("coverage.good_zone", c.good_zone),
            ("coverage.bad_zone", c.bad_zone),
            ("coverage.delta", c.delta),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(ConfigError::Invalid {
                    field,
                    detail: format!("{v} is outside [0, 1]"),
                });
            }
        }
        if c.bad_zone >= c.good_zone {
            return Err(ConfigError::Invalid {
                field: "coverage.bad_zone",
                detail: format!("{} must be below good_zone {}", c.bad_zone, c.good_zone),
            });
        }
        if self.inactivity.min_days >= self.inactivity.max_days {
            return Err(ConfigError::Invalid {
                field: "inactivity.min_days",
                detail: format!(
                    "{} must be below max_days {}",
                    self.inactivity.min_days, self.inactivity.max_days
                ),
            });
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid {
                field: "max_retries",
                detail: "must be at least 1".into(),
            });
        }
        if self.status.max_run_count == 0 {
            return Err(ConfigError::Invalid {
                field: "status.max_run_count",
                detail: "must be at least 1".into(),
            });
        }
        self.time_zone()?;
        Ok(())
    }

    pub fn time_zone(&self) -> Result<chrono_tz::Tz, ConfigError> {
        self.profiling
            .reference_time_zone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| ConfigError::Invalid {
                field: "profiling.reference_time_zone",
                detail: e.to_string(),
            })
    }
}
