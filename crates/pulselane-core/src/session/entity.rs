//! A single participation instance.
//!
//! An entity is not a person: one profile may own several entities over a
//! session's life (drop out, rejoin, hand the device to a friend). Entity
//! ids are never reused.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Participation status. `Dropped` and `Transferred` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Active,
    /// Genuine departure; the entity stays a reportable record.
    Dropped,
    /// Continued by a successor within the grace period; a bookkeeping
    /// artifact, excluded from the persisted roster.
    Transferred,
}

/// One participation instance bound to a device slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntity {
    pub entity_id: String,
    /// Reference to a profile; the profile does not own this entity.
    pub profile_id: String,
    pub device_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: EntityStatus,
    pub coins: f64,
    pub last_active: DateTime<Utc>,
}

impl SessionEntity {
    pub fn new(profile_id: &str, device_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            entity_id: uuid::Uuid::new_v4().to_string(),
            profile_id: profile_id.to_string(),
            device_id: device_id.to_string(),
            start_time: now,
            end_time: None,
            status: EntityStatus::Active,
            coins: 0.0,
            last_active: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == EntityStatus::Active
    }

    /// Record device activity.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if self.is_active() {
            self.last_active = now;
        }
    }

    /// Whether a takeover at `now` continues this participation.
    pub fn within_grace(&self, now: DateTime<Utc>, grace_period_ms: u64) -> bool {
        now - self.last_active < Duration::milliseconds(grace_period_ms as i64)
    }

    /// Inherit a predecessor's progress during a grace-period handoff.
    pub fn inherit_from(&mut self, predecessor: &SessionEntity) {
        self.coins = predecessor.coins;
        self.start_time = predecessor.start_time;
    }

    pub fn mark_dropped(&mut self, now: DateTime<Utc>) {
        if self.is_active() {
            self.status = EntityStatus::Dropped;
            self.end_time = Some(now);
        }
    }

    pub fn mark_transferred(&mut self, now: DateTime<Utc>) {
        if self.is_active() {
            self.status = EntityStatus::Transferred;
            self.end_time = Some(now);
        }
    }
}
