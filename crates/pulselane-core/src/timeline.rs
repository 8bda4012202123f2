//! Tick-indexed, append-only series store.
//!
//! The timeline is the single durable source of truth for a session: every
//! derived view (dropout history, race-chart frames, coin deltas) must be
//! recomputable from it. Writes are append-only at the in-progress tick;
//! out-of-order writes are rejected, not reordered.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::{decode_series, encode_series, Sample};
use crate::error::{CodecError, CoreError, InvariantError, ValidationError};

/// Timeline encoding identifier carried in snapshots.
pub const RLE_ENCODING: &str = "rle";

/// Who a series belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    /// Owned by one participation instance
    Entity,
    /// Session-wide aggregate
    Session,
}

impl SeriesKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesKind::Entity => "entity",
            SeriesKind::Session => "session",
        }
    }
}

/// What a series measures.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    HeartRate,
    Cadence,
    /// Zone label per tick
    Zone,
    /// Cumulative coin total, monotone non-decreasing
    Coins,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::HeartRate => "heart_rate",
            Metric::Cadence => "cadence",
            Metric::Zone => "zone",
            Metric::Coins => "coins",
        }
    }
}

impl FromStr for Metric {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heart_rate" => Ok(Metric::HeartRate),
            "cadence" => Ok(Metric::Cadence),
            "zone" => Ok(Metric::Zone),
            "coins" => Ok(Metric::Coins),
            other => Err(CodecError::InvalidSeriesKey(other.to_string())),
        }
    }
}

/// Identifies one series: `(kind, owner, metric)`, rendered as
/// `"kind:owner:metric"` in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub kind: SeriesKind,
    pub owner: String,
    pub metric: Metric,
}

impl SeriesKey {
    /// Series owned by a participation instance.
    pub fn entity(entity_id: &str, metric: Metric) -> Self {
        Self {
            kind: SeriesKind::Entity,
            owner: entity_id.to_string(),
            metric,
        }
    }

    /// Session-wide aggregate series.
    pub fn session(metric: Metric) -> Self {
        Self {
            kind: SeriesKind::Session,
            owner: "session".to_string(),
            metric,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.kind.as_str(),
            self.owner,
            self.metric.as_str()
        )
    }
}

impl FromStr for SeriesKey {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind_str, rest) = s
            .split_once(':')
            .ok_or_else(|| CodecError::InvalidSeriesKey(s.to_string()))?;
        let (owner, metric_str) = rest
            .rsplit_once(':')
            .ok_or_else(|| CodecError::InvalidSeriesKey(s.to_string()))?;
        let kind = match kind_str {
            "entity" => SeriesKind::Entity,
            "session" => SeriesKind::Session,
            _ => return Err(CodecError::InvalidSeriesKey(s.to_string())),
        };
        if owner.is_empty() {
            return Err(CodecError::InvalidSeriesKey(s.to_string()));
        }
        Ok(Self {
            kind,
            owner: owner.to_string(),
            metric: metric_str.parse()?,
        })
    }
}

/// Immutable encoded copy of a timeline, the unit handed to persistence.
///
/// Series that are entirely null are omitted; an absent key reads back as
/// all-null at `tick_count` length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineSnapshot {
    pub tick_interval_ms: u64,
    pub tick_count: u64,
    pub encoding: String,
    pub series: BTreeMap<String, String>,
}

/// Fixed-interval tick store holding every recorded series of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    tick_interval_ms: u64,
    tick_count: u64,
    series: BTreeMap<SeriesKey, Vec<Sample>>,
}

impl Timeline {
    /// Create an empty timeline with a fixed tick interval.
    pub fn new(tick_interval_ms: u64) -> Self {
        Self {
            tick_interval_ms,
            tick_count: 0,
            series: BTreeMap::new(),
        }
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }

    /// Number of committed ticks. Only ever increases.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Write one sample at the in-progress tick index.
    ///
    /// `tick` must equal `tick_count()`; anything else is an out-of-order
    /// write and is rejected. A series that starts mid-session is padded
    /// with leading nulls.
    pub fn record_tick(
        &mut self,
        key: &SeriesKey,
        tick: u64,
        value: Sample,
    ) -> Result<(), InvariantError> {
        if tick != self.tick_count {
            return Err(InvariantError::OutOfOrderTick {
                key: key.to_string(),
                tick,
                expected: self.tick_count,
            });
        }
        let series = self.series.entry(key.clone()).or_default();
        if series.len() as u64 > tick {
            // Already written at this tick; a second write is out of order.
            return Err(InvariantError::OutOfOrderTick {
                key: key.to_string(),
                tick,
                expected: series.len() as u64,
            });
        }
        while (series.len() as u64) < tick {
            series.push(None);
        }
        series.push(value);
        Ok(())
    }

    /// Close the in-progress tick. Every series not written this tick is
    /// padded with null: absence of a reading in a tick window is null.
    pub fn commit_tick(&mut self) {
        self.tick_count += 1;
        for series in self.series.values_mut() {
            while (series.len() as u64) < self.tick_count {
                series.push(None);
            }
        }
    }

    /// Borrow a series. Returns `None` for a key never written.
    pub fn series(&self, key: &SeriesKey) -> Option<&[Sample]> {
        self.series.get(key).map(Vec::as_slice)
    }

    /// Copy of a series, safe from later mutation.
    pub fn series_cloned(&self, key: &SeriesKey) -> Option<Vec<Sample>> {
        self.series.get(key).cloned()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SeriesKey> {
        self.series.keys()
    }

    /// Total stored points across every series.
    pub fn total_points(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    /// Whether any per-entity series has been recorded.
    pub fn has_entity_series(&self) -> bool {
        self.series.keys().any(|k| k.kind == SeriesKind::Entity)
    }

    /// Persist gate: every series length must equal the tick count, and the
    /// total stored points must stay under the cap.
    pub fn validate(&self, size_cap: usize) -> Result<(), ValidationError> {
        for (key, series) in &self.series {
            if series.len() as u64 != self.tick_count {
                return Err(ValidationError::SeriesTickMismatch {
                    key: key.to_string(),
                    len: series.len(),
                    expected: self.tick_count,
                });
            }
        }
        let points = self.total_points();
        if points > size_cap {
            return Err(ValidationError::SeriesSizeCap {
                points,
                cap: size_cap,
            });
        }
        Ok(())
    }

    /// Immutable encoded copy for persistence. All-null series are omitted.
    pub fn snapshot(&self) -> TimelineSnapshot {
        let mut encoded = BTreeMap::new();
        for (key, series) in &self.series {
            if series.iter().all(Option::is_none) {
                continue;
            }
            encoded.insert(key.to_string(), encode_series(series));
        }
        TimelineSnapshot {
            tick_interval_ms: self.tick_interval_ms,
            tick_count: self.tick_count,
            encoding: RLE_ENCODING.to_string(),
            series: encoded,
        }
    }

    /// Rebuild a timeline from an encoded snapshot.
    ///
    /// Decoded series shorter than `tick_count` are padded with trailing
    /// nulls; longer ones mean the snapshot is corrupt.
    pub fn from_snapshot(snapshot: &TimelineSnapshot) -> Result<Self, CoreError> {
        if snapshot.encoding != RLE_ENCODING {
            return Err(CodecError::UnsupportedEncoding(snapshot.encoding.clone()).into());
        }
        let mut series = BTreeMap::new();
        for (key_str, encoded) in &snapshot.series {
            let key: SeriesKey = key_str.parse::<SeriesKey>()?;
            let mut samples = decode_series(encoded)?;
            if samples.len() as u64 > snapshot.tick_count {
                return Err(ValidationError::SeriesTickMismatch {
                    key: key_str.clone(),
                    len: samples.len(),
                    expected: snapshot.tick_count,
                }
                .into());
            }
            while (samples.len() as u64) < snapshot.tick_count {
                samples.push(None);
            }
            series.insert(key, samples);
        }
        Ok(Self {
            tick_interval_ms: snapshot.tick_interval_ms,
            tick_count: snapshot.tick_count,
            series,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SeriesValue;

    fn hr_key() -> SeriesKey {
        SeriesKey::entity("e1", Metric::HeartRate)
    }

    #[test]
    fn record_then_commit_keeps_shape() {
        let mut timeline = Timeline::new(5000);
        for tick in 0..4 {
            timeline
                .record_tick(&hr_key(), tick, Some(SeriesValue::Number(70.0 + tick as f64)))
                .unwrap();
            timeline.commit_tick();
        }
        assert_eq!(timeline.tick_count(), 4);
        assert_eq!(timeline.series(&hr_key()).unwrap().len(), 4);
        timeline.validate(200_000).unwrap();
    }

    #[test]
    fn out_of_order_write_is_fatal() {
        let mut timeline = Timeline::new(5000);
        timeline
            .record_tick(&hr_key(), 0, Some(SeriesValue::Number(70.0)))
            .unwrap();
        timeline.commit_tick();

        let err = timeline
            .record_tick(&hr_key(), 0, Some(SeriesValue::Number(71.0)))
            .unwrap_err();
        assert!(matches!(err, InvariantError::OutOfOrderTick { tick: 0, .. }));

        let err = timeline
            .record_tick(&hr_key(), 5, Some(SeriesValue::Number(71.0)))
            .unwrap_err();
        assert!(matches!(err, InvariantError::OutOfOrderTick { tick: 5, .. }));
    }

    #[test]
    fn double_write_in_same_tick_is_rejected() {
        let mut timeline = Timeline::new(5000);
        timeline
            .record_tick(&hr_key(), 0, Some(SeriesValue::Number(70.0)))
            .unwrap();
        assert!(timeline
            .record_tick(&hr_key(), 0, Some(SeriesValue::Number(71.0)))
            .is_err());
    }

    #[test]
    fn late_joiner_gets_leading_nulls() {
        let mut timeline = Timeline::new(5000);
        let early = SeriesKey::entity("e1", Metric::HeartRate);
        let late = SeriesKey::entity("e2", Metric::HeartRate);

        timeline
            .record_tick(&early, 0, Some(SeriesValue::Number(70.0)))
            .unwrap();
        timeline.commit_tick();
        timeline
            .record_tick(&early, 1, Some(SeriesValue::Number(72.0)))
            .unwrap();
        timeline
            .record_tick(&late, 1, Some(SeriesValue::Number(90.0)))
            .unwrap();
        timeline.commit_tick();

        assert_eq!(timeline.series(&late).unwrap()[0], None);
        assert!(timeline.series(&late).unwrap()[1].is_some());
        timeline.validate(200_000).unwrap();
    }

    #[test]
    fn commit_pads_unwritten_series() {
        let mut timeline = Timeline::new(5000);
        timeline
            .record_tick(&hr_key(), 0, Some(SeriesValue::Number(70.0)))
            .unwrap();
        timeline.commit_tick();
        // e1 sends nothing in tick 1.
        timeline.commit_tick();
        assert_eq!(timeline.series(&hr_key()).unwrap().len(), 2);
        assert_eq!(timeline.series(&hr_key()).unwrap()[1], None);
    }

    #[test]
    fn size_cap_is_enforced() {
        let mut timeline = Timeline::new(5000);
        for tick in 0..10 {
            timeline
                .record_tick(&hr_key(), tick, Some(SeriesValue::Number(70.0)))
                .unwrap();
            timeline.commit_tick();
        }
        assert!(matches!(
            timeline.validate(5),
            Err(ValidationError::SeriesSizeCap { points: 10, cap: 5 })
        ));
    }

    #[test]
    fn snapshot_omits_all_null_series() {
        let mut timeline = Timeline::new(5000);
        let silent = SeriesKey::entity("ghost", Metric::HeartRate);
        timeline.record_tick(&silent, 0, None).unwrap();
        timeline
            .record_tick(&hr_key(), 0, Some(SeriesValue::Number(70.0)))
            .unwrap();
        timeline.commit_tick();

        let snapshot = timeline.snapshot();
        assert!(snapshot.series.contains_key("entity:e1:heart_rate"));
        assert!(!snapshot.series.contains_key("entity:ghost:heart_rate"));
    }

    #[test]
    fn snapshot_round_trips_through_restore() {
        let mut timeline = Timeline::new(5000);
        for tick in 0..6 {
            let sample = if tick == 3 {
                None
            } else {
                Some(SeriesValue::Number(100.0 + tick as f64))
            };
            timeline.record_tick(&hr_key(), tick, sample).unwrap();
            timeline.commit_tick();
        }

        let restored = Timeline::from_snapshot(&timeline.snapshot()).unwrap();
        assert_eq!(restored.tick_count(), timeline.tick_count());
        assert_eq!(restored.series(&hr_key()), timeline.series(&hr_key()));
    }

    #[test]
    fn restore_rejects_unknown_encoding() {
        let mut snapshot = Timeline::new(5000).snapshot();
        snapshot.encoding = "delta".to_string();
        assert!(Timeline::from_snapshot(&snapshot).is_err());
    }

    #[test]
    fn series_key_string_form_round_trips() {
        let key = SeriesKey::entity("abc-123", Metric::HeartRate);
        assert_eq!(key.to_string(), "entity:abc-123:heart_rate");
        assert_eq!(key.to_string().parse::<SeriesKey>().unwrap(), key);

        let global = SeriesKey::session(Metric::Coins);
        assert_eq!(global.to_string().parse::<SeriesKey>().unwrap(), global);

        assert!("bogus".parse::<SeriesKey>().is_err());
        assert!("entity::coins".parse::<SeriesKey>().is_err());
    }
}
