//! Heart-rate zones and coin accrual.
//!
//! A zone is a contiguous intensity band with a coin rate per tick. The
//! TreasureBox keeps the running totals; the cumulative per-entity totals
//! are also written into the timeline so any reader can recover per-tick
//! deltas by subtraction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Heart-rate intensity band, coolest to hottest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Cool,
    Active,
    Warm,
    Hot,
    Fire,
}

impl Zone {
    pub const ALL: [Zone; 5] = [Zone::Cool, Zone::Active, Zone::Warm, Zone::Hot, Zone::Fire];

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Cool => "cool",
            Zone::Active => "active",
            Zone::Warm => "warm",
            Zone::Hot => "hot",
            Zone::Fire => "fire",
        }
    }
}

/// Lower bound of one zone band, in bpm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneBound {
    pub zone: Zone,
    pub min_bpm: f64,
}

/// Coins per tick for each zone. One named field per zone keeps the
/// mapping total by construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneRates {
    #[serde(default)]
    pub cool: f64,
    #[serde(default = "default_rate_active")]
    pub active: f64,
    #[serde(default = "default_rate_warm")]
    pub warm: f64,
    #[serde(default = "default_rate_hot")]
    pub hot: f64,
    #[serde(default = "default_rate_fire")]
    pub fire: f64,
}

fn default_rate_active() -> f64 {
    1.0
}
fn default_rate_warm() -> f64 {
    2.0
}
fn default_rate_hot() -> f64 {
    3.0
}
fn default_rate_fire() -> f64 {
    4.0
}

impl Default for ZoneRates {
    fn default() -> Self {
        Self {
            cool: 0.0,
            active: default_rate_active(),
            warm: default_rate_warm(),
            hot: default_rate_hot(),
            fire: default_rate_fire(),
        }
    }
}

impl ZoneRates {
    pub fn rate(&self, zone: Zone) -> f64 {
        match zone {
            Zone::Cool => self.cool,
            Zone::Active => self.active,
            Zone::Warm => self.warm,
            Zone::Hot => self.hot,
            Zone::Fire => self.fire,
        }
    }
}

/// Zone bands and coin rates. All of this is named, validated
/// configuration rather than a hard contract; the invariants are that the
/// bands are contiguous and ascending and rates are never negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSettings {
    #[serde(default = "default_bounds")]
    pub bounds: Vec<ZoneBound>,
    #[serde(default)]
    pub rates: ZoneRates,
}

fn default_bounds() -> Vec<ZoneBound> {
    vec![
        ZoneBound {
            zone: Zone::Cool,
            min_bpm: 0.0,
        },
        ZoneBound {
            zone: Zone::Active,
            min_bpm: 104.0,
        },
        ZoneBound {
            zone: Zone::Warm,
            min_bpm: 125.0,
        },
        ZoneBound {
            zone: Zone::Hot,
            min_bpm: 146.0,
        },
        ZoneBound {
            zone: Zone::Fire,
            min_bpm: 166.0,
        },
    ]
}

impl Default for ZoneSettings {
    fn default() -> Self {
        Self {
            bounds: default_bounds(),
            rates: ZoneRates::default(),
        }
    }
}

impl ZoneSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bounds.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "zones.bounds".to_string(),
                message: "at least one zone band is required".to_string(),
            });
        }
        for pair in self.bounds.windows(2) {
            if pair[1].min_bpm <= pair[0].min_bpm {
                return Err(ConfigError::InvalidValue {
                    key: "zones.bounds".to_string(),
                    message: format!(
                        "bounds must ascend: {} >= {}",
                        pair[0].min_bpm, pair[1].min_bpm
                    ),
                });
            }
        }
        for zone in Zone::ALL {
            let rate = self.rates.rate(zone);
            if rate < 0.0 || rate.is_nan() {
                return Err(ConfigError::InvalidValue {
                    key: format!("zones.rates.{}", zone.as_str()),
                    message: format!("rate must be >= 0, got {rate}"),
                });
            }
        }
        Ok(())
    }
}

/// Maps a heart rate to exactly one zone.
#[derive(Debug, Clone)]
pub struct ZoneClassifier {
    settings: ZoneSettings,
}

impl ZoneClassifier {
    pub fn new(settings: ZoneSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    /// Classify a heart rate. Strictly below the lowest bound maps to the
    /// lowest zone; at or above the highest bound maps to the highest.
    pub fn classify(&self, heart_rate: f64) -> Zone {
        let mut zone = self.settings.bounds[0].zone;
        for bound in &self.settings.bounds {
            if heart_rate >= bound.min_bpm {
                zone = bound.zone;
            } else {
                break;
            }
        }
        zone
    }

    /// Coin rate for a zone. The mapping is total by construction.
    pub fn rate(&self, zone: Zone) -> f64 {
        self.settings.rates.rate(zone)
    }

    pub fn settings(&self) -> &ZoneSettings {
        &self.settings
    }
}

/// Running coin totals: per entity, per zone, and session-wide.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreasureBox {
    total: f64,
    by_entity: BTreeMap<String, f64>,
    by_zone: BTreeMap<Zone, f64>,
}

impl TreasureBox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one tick's worth of coins for an entity sitting in `zone`.
    /// Returns the entity's new cumulative total.
    pub fn accrue(&mut self, entity_id: &str, zone: Zone, rate: f64) -> f64 {
        self.total += rate;
        *self.by_zone.entry(zone).or_insert(0.0) += rate;
        let entity_total = self.by_entity.entry(entity_id.to_string()).or_insert(0.0);
        *entity_total += rate;
        *entity_total
    }

    /// Move an entity's bucket to its successor during a grace-period
    /// handoff. The session-wide and per-zone totals are unchanged.
    pub fn transfer(&mut self, from_entity: &str, to_entity: &str) {
        let coins = self.by_entity.remove(from_entity).unwrap_or(0.0);
        *self.by_entity.entry(to_entity.to_string()).or_insert(0.0) += coins;
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn entity_total(&self, entity_id: &str) -> f64 {
        self.by_entity.get(entity_id).copied().unwrap_or(0.0)
    }

    pub fn by_zone(&self) -> &BTreeMap<Zone, f64> {
        &self.by_zone
    }
}
