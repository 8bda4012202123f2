//! Session lifecycle engine.
//!
//! The engine is a wall-clock state machine in the same spirit as a
//! caller-ticked timer: it owns the timeline, the coin totals, the roster
//! and the activity monitor, and every mutation happens through one of its
//! synchronous methods with an injected `now`. The async shell that
//! schedules it lives in `orchestrator.rs`; nothing here spawns tasks.
//!
//! ## State transitions
//!
//! ```text
//! Idle -> Active -> Ended
//! ```
//!
//! `Idle -> Active` on the first device activity (a roster join);
//! `Active -> Ended` on an explicit end request, an inactivity timeout, or
//! a sustained empty roster. `Ended` is terminal: once `end_time` is set
//! the session is immutable.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityMonitor;
use crate::codec::SeriesValue;
use crate::config::EngineConfig;
use crate::error::{CoreError, InvariantError, Result, ValidationError};
use crate::events::Event;
use crate::session::entity::{EntityStatus, SessionEntity};
use crate::session::record::{CoinTotals, SessionMeta, SessionRecord, SCHEMA_VERSION};
use crate::timeline::{Metric, SeriesKey, Timeline};
use crate::zone::{TreasureBox, Zone, ZoneClassifier};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Active,
    Ended,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Active => "active",
            SessionState::Ended => "ended",
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Requested,
    InactivityTimeout,
    EmptyRoster,
}

/// One reading delivered by the device boundary. The engine is agnostic to
/// how it arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: String,
    pub metric: Metric,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Session engine: single writer for timeline, treasure and roster state.
#[derive(Debug)]
pub struct SessionEngine {
    config: EngineConfig,
    classifier: ZoneClassifier,
    state: SessionState,
    session_id: String,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    end_reason: Option<EndReason>,
    timeline: Timeline,
    treasure: TreasureBox,
    monitor: ActivityMonitor,
    entities: Vec<SessionEntity>,
    /// device id -> index into `entities` for the current slot owner.
    slots: BTreeMap<String, usize>,
    /// Latest reading per (device, metric) within the current tick window.
    pending: BTreeMap<(String, Metric), Reading>,
    last_zone: BTreeMap<String, Zone>,
    last_activity: Option<DateTime<Utc>>,
    roster_empty_since: Option<DateTime<Utc>>,
    /// Opaque timestamped records passed through to the persisted payload.
    extra_events: Vec<serde_json::Value>,
    extra_snapshots: Vec<serde_json::Value>,
}

impl SessionEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let classifier = ZoneClassifier::new(config.zones.clone())?;
        let timeline = Timeline::new(config.tick_interval_ms);
        let monitor = ActivityMonitor::new(config.max_dropout_events);
        Ok(Self {
            config,
            classifier,
            state: SessionState::Idle,
            session_id: uuid::Uuid::new_v4().to_string(),
            start_time: None,
            end_time: None,
            end_reason: None,
            timeline,
            treasure: TreasureBox::new(),
            monitor,
            entities: Vec::new(),
            slots: BTreeMap::new(),
            pending: BTreeMap::new(),
            last_zone: BTreeMap::new(),
            last_activity: None,
            roster_empty_since: None,
            extra_events: Vec::new(),
            extra_snapshots: Vec::new(),
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn treasure(&self) -> &TreasureBox {
        &self.treasure
    }

    pub fn monitor(&self) -> &ActivityMonitor {
        &self.monitor
    }

    pub fn entities(&self) -> &[SessionEntity] {
        &self.entities
    }

    /// Entity currently owning a device slot.
    pub fn entity_for_device(&self, device_id: &str) -> Option<&SessionEntity> {
        self.slots.get(device_id).map(|&idx| &self.entities[idx])
    }

    // ── Roster ───────────────────────────────────────────────────────

    /// A profile takes a device slot. Starts the session on the first
    /// join; runs the grace-period handoff when the slot was held.
    ///
    /// Returns the new entity id and the events produced.
    pub fn join(
        &mut self,
        device_id: &str,
        profile_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, Vec<Event>)> {
        if self.state == SessionState::Ended {
            return Err(InvariantError::SessionEnded.into());
        }
        let mut events = Vec::new();
        if self.state == SessionState::Idle {
            events.extend(self.activate(now));
        }

        let mut successor = SessionEntity::new(profile_id, device_id, now);
        if self.entities.iter().any(|e| e.entity_id == successor.entity_id) {
            return Err(InvariantError::EntityIdReused(successor.entity_id).into());
        }

        if let Some(&prev_idx) = self.slots.get(device_id) {
            if self.entities[prev_idx].is_active() {
                if self.entities[prev_idx].within_grace(now, self.config.grace_period_ms) {
                    // Momentary blip: the new participation continues the
                    // old one; the old record is bookkeeping only.
                    successor.inherit_from(&self.entities[prev_idx]);
                    self.treasure
                        .transfer(&self.entities[prev_idx].entity_id, &successor.entity_id);
                    self.entities[prev_idx].mark_transferred(now);
                    events.push(Event::EntityTransferred {
                        from_entity: self.entities[prev_idx].entity_id.clone(),
                        to_entity: successor.entity_id.clone(),
                        device_id: device_id.to_string(),
                        coins: successor.coins,
                        at: now,
                    });
                } else {
                    // Genuine departure: keep the old record, start fresh.
                    events.extend(self.observe_departure(prev_idx, now));
                    self.entities[prev_idx].mark_dropped(now);
                    events.push(Event::EntityDropped {
                        entity_id: self.entities[prev_idx].entity_id.clone(),
                        device_id: device_id.to_string(),
                        coins: self.entities[prev_idx].coins,
                        at: now,
                    });
                }
            }
        }

        let entity_id = successor.entity_id.clone();
        events.push(Event::EntityJoined {
            entity_id: entity_id.clone(),
            profile_id: profile_id.to_string(),
            device_id: device_id.to_string(),
            at: now,
        });
        self.entities.push(successor);
        self.slots
            .insert(device_id.to_string(), self.entities.len() - 1);
        self.roster_empty_since = None;
        self.last_activity = Some(now);
        tracing::debug!(device_id, profile_id, entity_id = %entity_id, "roster join");
        Ok((entity_id, events))
    }

    /// A device slot is released for good; its entity is dropped.
    pub fn leave(&mut self, device_id: &str, now: DateTime<Utc>) -> Result<Vec<Event>> {
        if self.state == SessionState::Ended {
            return Err(InvariantError::SessionEnded.into());
        }
        let Some(idx) = self.slots.remove(device_id) else {
            return Ok(Vec::new());
        };
        let mut events = Vec::new();
        if self.entities[idx].is_active() {
            events.extend(self.observe_departure(idx, now));
            self.entities[idx].mark_dropped(now);
            events.push(Event::EntityDropped {
                entity_id: self.entities[idx].entity_id.clone(),
                device_id: device_id.to_string(),
                coins: self.entities[idx].coins,
                at: now,
            });
        }
        if self.slots.is_empty() {
            self.roster_empty_since = Some(now);
        }
        Ok(events)
    }

    // ── Device input ─────────────────────────────────────────────────

    /// Buffer the latest reading for its (device, metric) pair. Readings
    /// from unpaired devices are ignored; malformed values are rejected
    /// without touching any state.
    pub fn ingest_reading(&mut self, reading: Reading, now: DateTime<Utc>) -> Result<()> {
        if self.state == SessionState::Ended {
            return Err(InvariantError::SessionEnded.into());
        }
        if !reading.value.is_finite() || reading.value < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: reading.metric.as_str().to_string(),
                message: format!("reading must be a non-negative number, got {}", reading.value),
            }
            .into());
        }
        let Some(&idx) = self.slots.get(&reading.device_id) else {
            tracing::debug!(device_id = %reading.device_id, "reading from unpaired device dropped");
            return Ok(());
        };
        self.entities[idx].touch(now);
        self.last_activity = Some(now);
        self.pending
            .insert((reading.device_id.clone(), reading.metric), reading);
        Ok(())
    }

    // ── Tick collection ──────────────────────────────────────────────

    /// Collect one tick: drain buffered readings into the timeline, score
    /// zones, accrue coins, observe dropouts, then evaluate the automatic
    /// end conditions.
    ///
    /// Idle sessions collect nothing; ended sessions reject the call.
    pub fn collect_tick(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        match self.state {
            SessionState::Idle => Ok(Vec::new()),
            SessionState::Ended => Err(InvariantError::SessionEnded.into()),
            SessionState::Active => {
                let mut events = self.collect_tick_inner(now)?;
                events.extend(self.check_end_conditions(now));
                Ok(events)
            }
        }
    }

    fn collect_tick_inner(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let tick = self.timeline.tick_count();
        let mut events = Vec::new();
        let mut active_entities = 0usize;

        let slots: Vec<(String, usize)> = self
            .slots
            .iter()
            .map(|(device, &idx)| (device.clone(), idx))
            .collect();

        for (device_id, idx) in slots {
            let entity_id = self.entities[idx].entity_id.clone();
            let hr_key = SeriesKey::entity(&entity_id, Metric::HeartRate);

            let was_active = self
                .timeline
                .series(&hr_key)
                .and_then(|s| s.last())
                .map(|sample| sample.is_some())
                .unwrap_or(false);

            let hr = self
                .pending
                .remove(&(device_id.clone(), Metric::HeartRate))
                .map(|r| r.value);
            let cadence = self
                .pending
                .remove(&(device_id.clone(), Metric::Cadence))
                .map(|r| r.value);

            self.timeline
                .record_tick(&hr_key, tick, hr.map(SeriesValue::Number))?;
            if let Some(value) = cadence {
                let cadence_key = SeriesKey::entity(&entity_id, Metric::Cadence);
                self.timeline
                    .record_tick(&cadence_key, tick, Some(SeriesValue::Number(value)))?;
            }

            let zone_key = SeriesKey::entity(&entity_id, Metric::Zone);
            match hr {
                Some(value) => {
                    active_entities += 1;
                    let zone = self.classifier.classify(value);
                    let rate = self.classifier.rate(zone);
                    let total = self.treasure.accrue(&entity_id, zone, rate);
                    self.entities[idx].coins = total;
                    self.timeline.record_tick(
                        &zone_key,
                        tick,
                        Some(SeriesValue::Label(zone.as_str().to_string())),
                    )?;
                    if self.last_zone.get(&entity_id) != Some(&zone) {
                        self.last_zone.insert(entity_id.clone(), zone);
                        events.push(Event::ZoneChanged {
                            entity_id: entity_id.clone(),
                            zone,
                            at: now,
                        });
                    }
                }
                None => {
                    if was_active {
                        // tick >= 1 here: was_active needs a prior sample.
                        let dropout_tick = tick - 1;
                        let coins = self.treasure.entity_total(&entity_id);
                        self.monitor
                            .record_dropout(&entity_id, dropout_tick, coins, now);
                        events.push(Event::ParticipantDropout {
                            entity_id: entity_id.clone(),
                            tick: dropout_tick,
                            at: now,
                        });
                    }
                }
            }

            // Cumulative coin series: carried forward even through silent
            // ticks so readers can recover deltas by subtraction.
            let coins_key = SeriesKey::entity(&entity_id, Metric::Coins);
            let total = self.treasure.entity_total(&entity_id);
            self.timeline
                .record_tick(&coins_key, tick, Some(SeriesValue::Number(total)))?;
        }

        let global_coins = SeriesKey::session(Metric::Coins);
        self.timeline.record_tick(
            &global_coins,
            tick,
            Some(SeriesValue::Number(self.treasure.total())),
        )?;
        self.timeline.commit_tick();

        // Readings that never matched a slot are stale by now.
        self.pending.clear();

        events.push(Event::TickCollected {
            tick,
            active_entities,
            at: now,
        });
        Ok(events)
    }

    fn check_end_conditions(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        if self.state != SessionState::Active {
            return Vec::new();
        }
        if let Some(last) = self.last_activity {
            if now - last >= Duration::milliseconds(self.config.inactivity_timeout_ms as i64) {
                return self.finalize(now, EndReason::InactivityTimeout);
            }
        }
        if let Some(since) = self.roster_empty_since {
            if now - since >= Duration::milliseconds(self.config.empty_roster_timeout_ms as i64) {
                return self.finalize(now, EndReason::EmptyRoster);
            }
        }
        Vec::new()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// End the session: one final tick collection, then the terminal
    /// transition. After this the engine rejects every mutation.
    pub fn end(&mut self, now: DateTime<Utc>, reason: EndReason) -> Result<Vec<Event>> {
        match self.state {
            SessionState::Ended => Err(InvariantError::SessionEnded.into()),
            SessionState::Idle => Ok(self.finalize(now, reason)),
            SessionState::Active => {
                let mut events = self.collect_tick_inner(now)?;
                if self.state == SessionState::Active {
                    events.extend(self.finalize(now, reason));
                }
                Ok(events)
            }
        }
    }

    fn activate(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        self.state = SessionState::Active;
        self.start_time = Some(now);
        self.last_activity = Some(now);
        tracing::info!(session_id = %self.session_id, "session started");
        vec![Event::SessionStarted {
            session_id: self.session_id.clone(),
            at: now,
        }]
    }

    fn finalize(&mut self, now: DateTime<Utc>, reason: EndReason) -> Vec<Event> {
        self.state = SessionState::Ended;
        self.end_time = Some(now);
        self.end_reason = Some(reason);
        for entity in &mut self.entities {
            if entity.is_active() {
                entity.end_time = Some(now);
            }
        }
        tracing::info!(
            session_id = %self.session_id,
            ?reason,
            ticks = self.timeline.tick_count(),
            coins = self.treasure.total(),
            "session ended"
        );
        vec![Event::SessionEnded {
            session_id: self.session_id.clone(),
            reason,
            at: now,
        }]
    }

    /// If a participant's signal was live at the last committed tick, a
    /// departure between ticks still produces a dropout event; a signal
    /// that already went silent was observed during collection.
    fn observe_departure(&mut self, idx: usize, now: DateTime<Utc>) -> Vec<Event> {
        let entity_id = self.entities[idx].entity_id.clone();
        let hr_key = SeriesKey::entity(&entity_id, Metric::HeartRate);
        let last_sample_live = self
            .timeline
            .series(&hr_key)
            .and_then(|s| s.last())
            .map(|sample| sample.is_some())
            .unwrap_or(false);
        if !last_sample_live || self.timeline.tick_count() == 0 {
            return Vec::new();
        }
        let tick = self.timeline.tick_count() - 1;
        let coins = self.treasure.entity_total(&entity_id);
        self.monitor.record_dropout(&entity_id, tick, coins, now);
        vec![Event::ParticipantDropout {
            entity_id,
            tick,
            at: now,
        }]
    }

    // ── Opaque pass-through ──────────────────────────────────────────

    /// Attach an opaque timestamped record (voice memo, media marker) to
    /// the persisted payload.
    pub fn log_event(&mut self, value: serde_json::Value) -> Result<()> {
        if self.state == SessionState::Ended {
            return Err(InvariantError::SessionEnded.into());
        }
        self.extra_events.push(value);
        Ok(())
    }

    pub fn log_snapshot(&mut self, value: serde_json::Value) -> Result<()> {
        if self.state == SessionState::Ended {
            return Err(InvariantError::SessionEnded.into());
        }
        self.extra_snapshots.push(value);
        Ok(())
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Build the serialized session record without validating it.
    pub fn build_record(&self) -> SessionRecord {
        let entities: Vec<SessionEntity> = self
            .entities
            .iter()
            .filter(|e| e.status != EntityStatus::Transferred)
            .cloned()
            .collect();
        SessionRecord {
            schema_version: SCHEMA_VERSION,
            session: SessionMeta {
                id: self.session_id.clone(),
                start_time: self.start_time.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
                end_time: self.end_time,
                tick_interval_ms: self.config.tick_interval_ms,
            },
            totals: CoinTotals {
                coins: self.treasure.total(),
                per_zone: self.treasure.by_zone().clone(),
            },
            entities,
            timeline: self.timeline.snapshot(),
            events: self.extra_events.clone(),
            snapshots: self.extra_snapshots.clone(),
        }
    }

    /// Build the record and run the persist gate. A failure aborts only
    /// this attempt; the engine keeps running untouched.
    pub fn validated_record(&self, now: DateTime<Utc>) -> Result<SessionRecord, CoreError> {
        self.timeline.validate(self.config.series_size_cap)?;
        let record = self.build_record();
        record.validate_meta(now, self.config.min_session_duration_ms)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SessionEngine {
        SessionEngine::new(EngineConfig::default()).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        "2026-03-01T18:00:00Z".parse().unwrap()
    }

    fn hr(device: &str, value: f64, at: DateTime<Utc>) -> Reading {
        Reading {
            device_id: device.to_string(),
            metric: Metric::HeartRate,
            value,
            timestamp: at,
        }
    }

    #[test]
    fn first_join_activates_the_session() {
        let mut engine = engine();
        assert_eq!(engine.state(), SessionState::Idle);

        let (_, events) = engine.join("d1", "p1", t0()).unwrap();
        assert_eq!(engine.state(), SessionState::Active);
        assert!(matches!(events[0], Event::SessionStarted { .. }));
        assert!(matches!(events[1], Event::EntityJoined { .. }));
        assert_eq!(engine.start_time(), Some(t0()));
    }

    #[test]
    fn collect_on_idle_records_nothing() {
        let mut engine = engine();
        assert!(engine.collect_tick(t0()).unwrap().is_empty());
        assert_eq!(engine.timeline().tick_count(), 0);
    }

    #[test]
    fn negative_reading_is_rejected_without_state_change() {
        let mut engine = engine();
        engine.join("d1", "p1", t0()).unwrap();
        let err = engine.ingest_reading(hr("d1", -5.0, t0()), t0()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        engine.collect_tick(t0()).unwrap();
        // The bad reading never made it in; the tick is null.
        let entity_id = engine.entities()[0].entity_id.clone();
        let key = SeriesKey::entity(&entity_id, Metric::HeartRate);
        assert_eq!(engine.timeline().series(&key).unwrap()[0], None);
    }

    #[test]
    fn reading_from_unpaired_device_is_dropped() {
        let mut engine = engine();
        engine.join("d1", "p1", t0()).unwrap();
        engine.ingest_reading(hr("ghost", 120.0, t0()), t0()).unwrap();
        engine.collect_tick(t0()).unwrap();
        assert_eq!(engine.timeline().keys().count(), 3); // hr, coins, global coins
    }

    #[test]
    fn tick_accrues_coins_and_emits_zone_change() {
        let mut engine = engine();
        engine.join("d1", "p1", t0()).unwrap();
        engine.ingest_reading(hr("d1", 130.0, t0()), t0()).unwrap();
        let events = engine.collect_tick(t0()).unwrap();

        assert!(events
            .iter()
            .any(|e| matches!(e, Event::ZoneChanged { zone: Zone::Warm, .. })));
        assert_eq!(engine.treasure().total(), 2.0);
        assert_eq!(engine.entities()[0].coins, 2.0);

        // Cumulative coin series carries the running total.
        let entity_id = engine.entities()[0].entity_id.clone();
        let coins_key = SeriesKey::entity(&entity_id, Metric::Coins);
        assert_eq!(
            engine.timeline().series(&coins_key).unwrap()[0],
            Some(SeriesValue::Number(2.0))
        );
    }

    #[test]
    fn silent_tick_after_activity_records_a_dropout() {
        let mut engine = engine();
        engine.join("d1", "p1", t0()).unwrap();
        engine.ingest_reading(hr("d1", 120.0, t0()), t0()).unwrap();
        engine.collect_tick(t0()).unwrap();

        let t1 = t0() + Duration::seconds(5);
        let events = engine.collect_tick(t1).unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::ParticipantDropout { tick: 0, .. })));

        let entity_id = engine.entities()[0].entity_id.clone();
        assert_eq!(engine.monitor().events(&entity_id).len(), 1);
        assert_eq!(engine.monitor().events(&entity_id)[0].tick, 0);
    }

    #[test]
    fn inactivity_timeout_ends_the_session() {
        let mut engine = engine();
        engine.join("d1", "p1", t0()).unwrap();
        engine.ingest_reading(hr("d1", 120.0, t0()), t0()).unwrap();
        engine.collect_tick(t0()).unwrap();

        let late = t0() + Duration::milliseconds(180_000);
        let events = engine.collect_tick(late).unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::SessionEnded {
                reason: EndReason::InactivityTimeout,
                ..
            }
        )));
        assert_eq!(engine.state(), SessionState::Ended);
    }

    #[test]
    fn empty_roster_timeout_ends_the_session() {
        let mut engine = engine();
        engine.join("d1", "p1", t0()).unwrap();
        engine.ingest_reading(hr("d1", 120.0, t0()), t0()).unwrap();
        engine.collect_tick(t0()).unwrap();
        engine.leave("d1", t0() + Duration::seconds(10)).unwrap();

        // Keep device activity alive so only the roster condition fires.
        let t1 = t0() + Duration::seconds(75);
        let events = engine.collect_tick(t1).unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::SessionEnded {
                reason: EndReason::EmptyRoster,
                ..
            }
        )));
    }

    #[test]
    fn ended_session_rejects_every_mutation() {
        let mut engine = engine();
        engine.join("d1", "p1", t0()).unwrap();
        engine.end(t0() + Duration::seconds(40), EndReason::Requested).unwrap();

        assert!(engine.collect_tick(t0()).is_err());
        assert!(engine.join("d2", "p2", t0()).is_err());
        assert!(engine.leave("d1", t0()).is_err());
        assert!(engine.ingest_reading(hr("d1", 100.0, t0()), t0()).is_err());
        assert!(engine.log_event(serde_json::json!({"memo": "x"})).is_err());
        assert!(engine.end(t0(), EndReason::Requested).is_err());
    }

    #[test]
    fn end_runs_one_final_collection() {
        let mut engine = engine();
        engine.join("d1", "p1", t0()).unwrap();
        engine.ingest_reading(hr("d1", 110.0, t0()), t0()).unwrap();
        engine.collect_tick(t0()).unwrap();

        let t1 = t0() + Duration::seconds(5);
        engine.ingest_reading(hr("d1", 112.0, t1), t1).unwrap();
        engine.end(t1, EndReason::Requested).unwrap();

        // The buffered reading made it into the final tick.
        assert_eq!(engine.timeline().tick_count(), 2);
        let entity_id = engine.entities()[0].entity_id.clone();
        let key = SeriesKey::entity(&entity_id, Metric::HeartRate);
        assert_eq!(
            engine.timeline().series(&key).unwrap()[1],
            Some(SeriesValue::Number(112.0))
        );
    }

    #[test]
    fn opaque_records_flow_into_the_payload() {
        let mut engine = engine();
        engine.join("d1", "p1", t0()).unwrap();
        engine
            .log_event(serde_json::json!({"at": "2026-03-01T18:01:00Z", "kind": "voice-memo"}))
            .unwrap();
        engine
            .log_snapshot(serde_json::json!({"at": "2026-03-01T18:02:00Z", "kind": "photo"}))
            .unwrap();
        let record = engine.build_record();
        assert_eq!(record.events.len(), 1);
        assert_eq!(record.snapshots.len(), 1);
    }
}
