//! Participant activity tracking and dropout history.
//!
//! The monitor is a cache, not a source of truth: everything it holds must
//! be reconstructible from the timeline and the roster alone, so that a
//! process restart (or a remounted renderer) loses nothing.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::SeriesValue;
use crate::timeline::{Metric, SeriesKey, Timeline};

/// A moment a participant's signal vanished. The tick is frozen forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropoutEvent {
    pub participant_id: String,
    /// Last tick the participant was confirmed active.
    pub tick: u64,
    /// Cumulative coin total at that tick.
    pub coins_at_dropout: f64,
    pub at: DateTime<Utc>,
}

/// Tracks active/inactive transitions per participant and keeps the most
/// recent dropout events for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityMonitor {
    max_events_per_participant: usize,
    events: BTreeMap<String, Vec<DropoutEvent>>,
}

impl ActivityMonitor {
    pub fn new(max_events_per_participant: usize) -> Self {
        Self {
            max_events_per_participant: max_events_per_participant.max(1),
            events: BTreeMap::new(),
        }
    }

    /// Append a dropout event. Lists are append-only and capped at the N
    /// most recently appended events; the oldest appended is evicted, not
    /// the one with the smallest tick.
    pub fn record_dropout(
        &mut self,
        participant_id: &str,
        tick: u64,
        coins_at_dropout: f64,
        at: DateTime<Utc>,
    ) {
        let list = self.events.entry(participant_id.to_string()).or_default();
        list.push(DropoutEvent {
            participant_id: participant_id.to_string(),
            tick,
            coins_at_dropout,
            at,
        });
        if list.len() > self.max_events_per_participant {
            list.remove(0);
        }
    }

    /// Dropout events for one participant, oldest appended first.
    pub fn events(&self, participant_id: &str) -> &[DropoutEvent] {
        self.events
            .get(participant_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_events(&self, participant_id: &str) -> bool {
        !self.events(participant_id).is_empty()
    }

    /// Every stored event, grouped by participant in deterministic order.
    pub fn all_events(&self) -> impl Iterator<Item = &DropoutEvent> {
        self.events.values().flatten()
    }

    /// Rebuild dropout history from timeline data alone.
    ///
    /// For each participant with no existing events, scans their heart-rate
    /// series once: a dropout is any index `i > 0` where the previous
    /// sample is present and the current one is null. The event tick is
    /// `i - 1` and its value is the participant's cumulative coin total at
    /// that tick. Idempotent, and never overwrites live-observed history.
    pub fn reconstruct_from_timeline(
        &mut self,
        timeline: &Timeline,
        participant_ids: &[String],
        session_start: DateTime<Utc>,
    ) {
        let interval_ms = timeline.tick_interval_ms() as i64;
        for participant_id in participant_ids {
            if self.has_events(participant_id) {
                continue;
            }
            let hr_key = SeriesKey::entity(participant_id, Metric::HeartRate);
            let Some(heart_rate) = timeline.series(&hr_key) else {
                continue;
            };
            let coins_key = SeriesKey::entity(participant_id, Metric::Coins);
            let coins = timeline.series(&coins_key);

            for i in 1..heart_rate.len() {
                let was_active = heart_rate[i - 1].is_some();
                let is_active = heart_rate[i].is_some();
                if was_active && !is_active {
                    let tick = (i - 1) as u64;
                    let coins_at_dropout = coins
                        .and_then(|s| s.get(i - 1))
                        .and_then(|sample| match sample {
                            Some(SeriesValue::Number(v)) => Some(*v),
                            _ => None,
                        })
                        .unwrap_or(0.0);
                    let at = session_start + Duration::milliseconds(i as i64 * interval_ms);
                    self.record_dropout(participant_id, tick, coins_at_dropout, at);
                }
            }
        }
    }
}
