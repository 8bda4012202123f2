//! The serialized session record handed to the persistence boundary.
//!
//! One record per save call. The schema is versioned and strict: required
//! fields must be present (serde rejects their absence) rather than
//! silently defaulted, and the validation gate runs before every save.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityMonitor;
use crate::codec::decode_series;
use crate::error::{CoreError, ValidationError};
use crate::session::entity::SessionEntity;
use crate::timeline::{SeriesKind, Timeline, TimelineSnapshot};
use crate::zone::Zone;

/// Current record schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Session identity and bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub tick_interval_ms: u64,
}

/// Coin totals at record time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoinTotals {
    pub coins: f64,
    pub per_zone: BTreeMap<Zone, f64>,
}

/// Complete persisted session payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub schema_version: u32,
    pub session: SessionMeta,
    pub totals: CoinTotals,
    pub entities: Vec<SessionEntity>,
    pub timeline: TimelineSnapshot,
    /// Opaque pass-through records (voice memos, media markers).
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
    #[serde(default)]
    pub snapshots: Vec<serde_json::Value>,
}

impl SessionRecord {
    /// Parse a record from JSON, rejecting schema versions this build does
    /// not understand.
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        let record: Self = serde_json::from_str(raw)?;
        if record.schema_version > SCHEMA_VERSION {
            return Err(ValidationError::InvalidValue {
                field: "schema_version".to_string(),
                message: format!(
                    "record version {} is newer than supported version {}",
                    record.schema_version, SCHEMA_VERSION
                ),
            }
            .into());
        }
        Ok(record)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn has_entity_series(&self) -> bool {
        self.timeline
            .series
            .keys()
            .any(|key| key.starts_with(SeriesKind::Entity.as_str()))
    }

    /// Cheap validation of record metadata: everything that does not need
    /// the series decoded.
    pub fn validate_meta(
        &self,
        now: DateTime<Utc>,
        min_session_duration_ms: u64,
    ) -> Result<(), ValidationError> {
        if self.session.id.is_empty() {
            return Err(ValidationError::MissingSession);
        }
        if self.session.start_time.timestamp_millis() <= 0 {
            return Err(ValidationError::InvalidStartTime);
        }
        if let Some(end) = self.session.end_time {
            if end < self.session.start_time {
                return Err(ValidationError::InvalidStartTime);
            }
        }
        if self.has_entity_series() && self.entities.is_empty() {
            return Err(ValidationError::RosterRequired);
        }
        let until = self.session.end_time.unwrap_or(now);
        let duration_ms = (until - self.session.start_time).num_milliseconds().max(0) as u64;
        if duration_ms < min_session_duration_ms && self.timeline.series.is_empty() {
            return Err(ValidationError::SessionTooShortAndEmpty {
                min_ms: min_session_duration_ms,
            });
        }
        Ok(())
    }

    /// Full validation gate: metadata checks plus decoded series shape and
    /// the total size cap.
    pub fn validate(
        &self,
        now: DateTime<Utc>,
        min_session_duration_ms: u64,
        series_size_cap: usize,
    ) -> Result<(), ValidationError> {
        self.validate_meta(now, min_session_duration_ms)?;
        let mut points = 0usize;
        for (key, encoded) in &self.timeline.series {
            let samples = decode_series(encoded).map_err(|_| {
                ValidationError::InvalidValue {
                    field: key.clone(),
                    message: "series failed to decode".to_string(),
                }
            })?;
            if samples.len() as u64 != self.timeline.tick_count {
                return Err(ValidationError::SeriesTickMismatch {
                    key: key.clone(),
                    len: samples.len(),
                    expected: self.timeline.tick_count,
                });
            }
            points += samples.len();
        }
        if points > series_size_cap {
            return Err(ValidationError::SeriesSizeCap {
                points,
                cap: series_size_cap,
            });
        }
        Ok(())
    }

    /// Ids of the persisted roster, the participant set every derived view
    /// is rebuilt from.
    pub fn roster_ids(&self) -> Vec<String> {
        self.entities.iter().map(|e| e.entity_id.clone()).collect()
    }

    /// Rebuild the dropout history purely from this record. This is the
    /// restart path: the monitor is a cache of timeline-derived state.
    pub fn reconstruct_activity(
        &self,
        max_dropout_events: usize,
    ) -> Result<(Timeline, ActivityMonitor), CoreError> {
        let timeline = Timeline::from_snapshot(&self.timeline)?;
        let mut monitor = ActivityMonitor::new(max_dropout_events);
        monitor.reconstruct_from_timeline(&timeline, &self.roster_ids(), self.session.start_time);
        Ok((timeline, monitor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{Metric, SeriesKey};

    fn now() -> DateTime<Utc> {
        "2026-03-01T19:00:00Z".parse().unwrap()
    }

    fn minimal_record() -> SessionRecord {
        SessionRecord {
            schema_version: SCHEMA_VERSION,
            session: SessionMeta {
                id: "s-1".to_string(),
                start_time: now() - chrono::Duration::minutes(10),
                end_time: Some(now()),
                tick_interval_ms: 5000,
            },
            totals: CoinTotals::default(),
            entities: Vec::new(),
            timeline: Timeline::new(5000).snapshot(),
            events: Vec::new(),
            snapshots: Vec::new(),
        }
    }

    #[test]
    fn minimal_ended_record_passes() {
        minimal_record().validate(now(), 30_000, 200_000).unwrap();
    }

    #[test]
    fn empty_id_is_missing_session() {
        let mut record = minimal_record();
        record.session.id.clear();
        assert_eq!(
            record.validate_meta(now(), 30_000).unwrap_err().code(),
            "missing-session"
        );
    }

    #[test]
    fn epoch_start_time_is_invalid() {
        let mut record = minimal_record();
        record.session.start_time = DateTime::<Utc>::UNIX_EPOCH;
        assert_eq!(
            record.validate_meta(now(), 30_000).unwrap_err().code(),
            "invalid-startTime"
        );
    }

    #[test]
    fn end_before_start_is_invalid() {
        let mut record = minimal_record();
        record.session.end_time = Some(record.session.start_time - chrono::Duration::seconds(1));
        assert_eq!(
            record.validate_meta(now(), 30_000).unwrap_err().code(),
            "invalid-startTime"
        );
    }

    #[test]
    fn entity_series_without_roster_is_rejected() {
        let mut record = minimal_record();
        let mut timeline = Timeline::new(5000);
        timeline
            .record_tick(
                &SeriesKey::entity("e1", Metric::HeartRate),
                0,
                Some(crate::codec::SeriesValue::Number(100.0)),
            )
            .unwrap();
        timeline.commit_tick();
        record.timeline = timeline.snapshot();
        assert_eq!(
            record.validate_meta(now(), 30_000).unwrap_err().code(),
            "roster-required"
        );
    }

    #[test]
    fn short_empty_session_is_rejected() {
        let mut record = minimal_record();
        record.session.start_time = now() - chrono::Duration::seconds(5);
        record.session.end_time = Some(now());
        assert_eq!(
            record.validate_meta(now(), 30_000).unwrap_err().code(),
            "session-too-short-and-empty"
        );
    }

    #[test]
    fn tick_mismatch_is_caught_in_full_validation() {
        let mut record = minimal_record();
        record.timeline.tick_count = 4;
        record
            .timeline
            .series
            .insert("session:session:coins".to_string(), "[[1.0,3]]".to_string());
        assert_eq!(
            record
                .validate(now(), 30_000, 200_000)
                .unwrap_err()
                .code(),
            "series-tick-mismatch"
        );
    }

    #[test]
    fn size_cap_is_caught_in_full_validation() {
        let mut record = minimal_record();
        record.timeline.tick_count = 10;
        record
            .timeline
            .series
            .insert("session:session:coins".to_string(), "[[1.0,10]]".to_string());
        assert_eq!(
            record.validate(now(), 30_000, 5).unwrap_err().code(),
            "series-size-cap"
        );
    }

    #[test]
    fn newer_schema_version_is_rejected() {
        let mut record = minimal_record();
        record.schema_version = SCHEMA_VERSION + 1;
        let raw = record.to_json().unwrap();
        assert!(SessionRecord::from_json(&raw).is_err());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        // No silent defaulting of required fields: a record without a
        // session block must fail to parse.
        let raw = r#"{"schema_version":1,"totals":{"coins":0.0,"per_zone":{}},"entities":[],"timeline":{"tick_interval_ms":5000,"tick_count":0,"encoding":"rle","series":{}}}"#;
        assert!(SessionRecord::from_json(raw).is_err());
    }
}
