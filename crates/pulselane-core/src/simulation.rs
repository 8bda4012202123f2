//! Synthetic sessions for exercising the engine end to end.
//!
//! Drives a real `SessionEngine` tick by tick with seeded random heart
//! rates, dropouts and rejoins. A fixed seed reproduces the same session
//! shape, which makes this the workhorse behind the CLI `simulate`
//! command and the integration suites.

use chrono::{DateTime, Duration, Utc};
use rand::prelude::*;
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::events::Event;
use crate::session::{EndReason, Reading, SessionEngine, SessionRecord, SessionState};
use crate::timeline::Metric;

/// Configuration for a synthetic session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of participants, each on their own device.
    pub participants: usize,

    /// Ticks to simulate before the session is ended.
    pub ticks: u64,

    /// Per-tick probability that an active participant goes silent.
    pub dropout_probability: f64,

    /// Per-tick probability that a silent participant comes back.
    pub rejoin_probability: f64,

    /// Random seed for reproducibility (None = random).
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            participants: 4,
            ticks: 120,
            dropout_probability: 0.02,
            rejoin_probability: 0.3,
            seed: None,
        }
    }
}

/// What a simulation run produced.
#[derive(Debug)]
pub struct SimulationOutcome {
    pub record: SessionRecord,
    pub events: Vec<Event>,
    /// Dropout events observed live during the run.
    pub dropouts: usize,
}

/// Run a synthetic session against a real engine.
pub fn run(config: &SimulationConfig, engine_config: EngineConfig) -> Result<SimulationOutcome> {
    let mut engine = SessionEngine::new(engine_config)?;
    let interval_ms = engine.config().tick_interval_ms as i64;
    let mut rng = Mcg128Xsl64::seed_from_u64(config.seed.unwrap_or_else(random));

    let start: DateTime<Utc> = Utc::now();
    let mut events = Vec::new();

    // One device per participant; heart rates walk randomly inside a band
    // per runner so zones actually differ.
    let mut heart_rates: Vec<f64> = (0..config.participants)
        .map(|i| 90.0 + (i as f64 * 17.0) % 70.0)
        .collect();
    let mut silent: Vec<bool> = vec![false; config.participants];

    for i in 0..config.participants {
        let (_, joined) = engine.join(&format!("device-{i}"), &format!("profile-{i}"), start)?;
        events.extend(joined);
    }

    for tick in 0..config.ticks {
        if engine.state() == SessionState::Ended {
            break;
        }
        let now = start + Duration::milliseconds(tick as i64 * interval_ms);
        for i in 0..config.participants {
            if silent[i] {
                if rng.gen_bool(config.rejoin_probability) {
                    silent[i] = false;
                }
            } else if rng.gen_bool(config.dropout_probability) {
                silent[i] = true;
            }
            if silent[i] {
                continue;
            }
            heart_rates[i] = (heart_rates[i] + rng.gen_range(-4.0..6.0)).clamp(60.0, 195.0);
            engine.ingest_reading(
                Reading {
                    device_id: format!("device-{i}"),
                    metric: Metric::HeartRate,
                    value: heart_rates[i],
                    timestamp: now,
                },
                now,
            )?;
        }
        events.extend(engine.collect_tick(now)?);
    }

    let end = start + Duration::milliseconds(config.ticks as i64 * interval_ms);
    if engine.state() != SessionState::Ended {
        events.extend(engine.end(end, EndReason::Requested)?);
    }

    let dropouts = events
        .iter()
        .filter(|e| matches!(e, Event::ParticipantDropout { .. }))
        .count();
    let record = engine.validated_record(end)?;

    Ok(SimulationOutcome {
        record,
        events,
        dropouts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> SimulationConfig {
        SimulationConfig {
            participants: 3,
            ticks: 40,
            dropout_probability: 0.1,
            rejoin_probability: 0.4,
            seed: Some(seed),
        }
    }

    #[test]
    fn produces_a_valid_record() {
        let outcome = run(&seeded(7), EngineConfig::default()).unwrap();
        assert_eq!(outcome.record.timeline.tick_count, 41); // 40 + final collection
        assert_eq!(outcome.record.entities.len(), 3);
        assert!(outcome.record.totals.coins > 0.0);
    }

    #[test]
    fn same_seed_reproduces_the_same_shape() {
        let a = run(&seeded(42), EngineConfig::default()).unwrap();
        let b = run(&seeded(42), EngineConfig::default()).unwrap();
        assert_eq!(a.record.totals.coins, b.record.totals.coins);
        assert_eq!(a.dropouts, b.dropouts);
        assert_eq!(a.record.timeline.tick_count, b.record.timeline.tick_count);
    }

    #[test]
    fn different_seeds_diverge() {
        let a = run(&seeded(1), EngineConfig::default()).unwrap();
        let b = run(&seeded(2), EngineConfig::default()).unwrap();
        // Coin totals depend on every zone visit; a collision would be
        // remarkable.
        assert_ne!(a.record.totals.coins, b.record.totals.coins);
    }
}
