//! Engine configuration.
//!
//! Every documented timeout, interval, rate and cap is a named, validated
//! parameter here rather than a constant buried in the engine. Stored as
//! TOML at `~/.config/pulselane/config.toml`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::zone::ZoneSettings;

/// Engine configuration.
///
/// Serialized to/from TOML; every field has a default so a partial file
/// (or none at all) still yields a working engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Width of one tick, fixed at session creation.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Autosave cadence; must not be shorter than the tick interval.
    #[serde(default = "default_autosave_interval_ms")]
    pub autosave_interval_ms: u64,

    /// Device handoffs shorter than this continue the prior participation.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// A session with no device activity for this long ends itself.
    #[serde(default = "default_inactivity_timeout_ms")]
    pub inactivity_timeout_ms: u64,

    /// A session with an empty roster for this long ends itself.
    #[serde(default = "default_empty_roster_timeout_ms")]
    pub empty_roster_timeout_ms: u64,

    /// Upper bound on total stored series points per session.
    #[serde(default = "default_series_size_cap")]
    pub series_size_cap: usize,

    /// Most recent dropout events kept per participant.
    #[serde(default = "default_max_dropout_events")]
    pub max_dropout_events: usize,

    /// Sessions shorter than this with no recorded data are not persisted.
    #[serde(default = "default_min_session_duration_ms")]
    pub min_session_duration_ms: u64,

    #[serde(default)]
    pub zones: ZoneSettings,
}

fn default_tick_interval_ms() -> u64 {
    5_000
}
fn default_autosave_interval_ms() -> u64 {
    15_000
}
fn default_grace_period_ms() -> u64 {
    60_000
}
fn default_inactivity_timeout_ms() -> u64 {
    180_000
}
fn default_empty_roster_timeout_ms() -> u64 {
    60_000
}
fn default_series_size_cap() -> usize {
    200_000
}
fn default_max_dropout_events() -> usize {
    3
}
fn default_min_session_duration_ms() -> u64 {
    30_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            autosave_interval_ms: default_autosave_interval_ms(),
            grace_period_ms: default_grace_period_ms(),
            inactivity_timeout_ms: default_inactivity_timeout_ms(),
            empty_roster_timeout_ms: default_empty_roster_timeout_ms(),
            series_size_cap: default_series_size_cap(),
            max_dropout_events: default_max_dropout_events(),
            min_session_duration_ms: default_min_session_duration_ms(),
            zones: ZoneSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "tick_interval_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.autosave_interval_ms < self.tick_interval_ms {
            return Err(ConfigError::InvalidValue {
                key: "autosave_interval_ms".to_string(),
                message: format!(
                    "must be at least the tick interval ({} ms)",
                    self.tick_interval_ms
                ),
            });
        }
        if self.series_size_cap == 0 {
            return Err(ConfigError::InvalidValue {
                key: "series_size_cap".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.max_dropout_events == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_dropout_events".to_string(),
                message: "must be positive".to_string(),
            });
        }
        self.zones.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn autosave_shorter_than_tick_is_rejected() {
        let config = EngineConfig {
            autosave_interval_ms: 1_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let config = EngineConfig {
            tick_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str("tick_interval_ms = 1000\nautosave_interval_ms = 3000\n").unwrap();
        assert_eq!(config.tick_interval_ms, 1_000);
        assert_eq!(config.autosave_interval_ms, 3_000);
        assert_eq!(config.grace_period_ms, 60_000);
        assert_eq!(config.max_dropout_events, 3);
        config.validate().unwrap();
    }

    #[test]
    fn toml_round_trip() {
        let config = EngineConfig::default();
        let rendered = config.to_toml().unwrap();
        let parsed: EngineConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.tick_interval_ms, config.tick_interval_ms);
        assert_eq!(parsed.zones.bounds.len(), config.zones.bounds.len());
    }
}
