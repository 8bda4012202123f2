//! Session orchestration: periodic tick collection and autosave.
//!
//! One orchestrator owns one session. It wraps the synchronous engine in a
//! mutex and runs two independently scheduled tasks against it:
//!
//! - the tick collector, the only periodic writer of timeline state
//! - the autosave loop, which reads a validated record clone under a short
//!   lock and persists it without holding the lock
//!
//! At most one autosave is in flight; an overlapping cycle is coalesced
//! away, never queued. Ending the session cancels both tasks before the
//! terminal transition, so nothing can write after `end_time` is set, then
//! performs one forced persist. Orchestrators are not resumable: a new
//! session needs a new instance.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::session::engine::{EndReason, Reading, SessionEngine, SessionState};
use crate::session::record::SessionRecord;
use crate::storage::SessionStore;

type SharedEngine = Arc<Mutex<SessionEngine>>;
type SharedEvents = Arc<Mutex<Vec<Event>>>;

fn lock_engine(engine: &SharedEngine) -> MutexGuard<'_, SessionEngine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

fn push_events(sink: &SharedEvents, events: Vec<Event>) {
    if events.is_empty() {
        return;
    }
    sink.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .extend(events);
}

/// Owns one session's engine, store handle and periodic task handles.
pub struct SessionOrchestrator {
    engine: SharedEngine,
    store: Arc<dyn SessionStore>,
    events: SharedEvents,
    autosave_in_flight: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    tick_task: Option<JoinHandle<()>>,
    autosave_task: Option<JoinHandle<()>>,
}

impl SessionOrchestrator {
    pub fn new(engine: SessionEngine, store: Arc<dyn SessionStore>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            engine: Arc::new(Mutex::new(engine)),
            store,
            events: Arc::new(Mutex::new(Vec::new())),
            autosave_in_flight: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            tick_task: None,
            autosave_task: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        lock_engine(&self.engine).state()
    }

    pub fn session_id(&self) -> String {
        lock_engine(&self.engine).session_id().to_string()
    }

    /// Shared engine handle, for read paths such as frame derivation.
    pub fn engine(&self) -> SharedEngine {
        Arc::clone(&self.engine)
    }

    /// Drain events accumulated since the last poll.
    pub fn drain_events(&self) -> Vec<Event> {
        std::mem::take(
            &mut *self
                .events
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    // ── Device boundary ──────────────────────────────────────────────

    pub fn join(&self, device_id: &str, profile_id: &str) -> Result<String> {
        let (entity_id, events) = lock_engine(&self.engine).join(device_id, profile_id, Utc::now())?;
        push_events(&self.events, events);
        Ok(entity_id)
    }

    pub fn leave(&self, device_id: &str) -> Result<()> {
        let events = lock_engine(&self.engine).leave(device_id, Utc::now())?;
        push_events(&self.events, events);
        Ok(())
    }

    pub fn ingest_reading(&self, reading: Reading) -> Result<()> {
        lock_engine(&self.engine).ingest_reading(reading, Utc::now())
    }

    // ── Scheduling ───────────────────────────────────────────────────

    /// Spawn the tick collector and the autosave loop. Idempotent.
    pub fn start(&mut self) {
        if self.tick_task.is_some() {
            return;
        }
        let (tick_interval_ms, autosave_interval_ms) = {
            let engine = lock_engine(&self.engine);
            (
                engine.config().tick_interval_ms,
                engine.config().autosave_interval_ms,
            )
        };
        self.tick_task = Some(self.spawn_tick_task(tick_interval_ms));
        self.autosave_task = Some(self.spawn_autosave_task(autosave_interval_ms));
    }

    fn spawn_tick_task(&self, tick_interval_ms: u64) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let events = Arc::clone(&self.events);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let period = Duration::from_millis(tick_interval_ms);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        let mut engine = lock_engine(&engine);
                        if engine.state() == SessionState::Ended {
                            break;
                        }
                        match engine.collect_tick(Utc::now()) {
                            Ok(produced) => {
                                drop(engine);
                                push_events(&events, produced);
                            }
                            Err(err) => {
                                drop(engine);
                                tracing::error!(error = %err, "tick collection failed");
                            }
                        }
                    }
                }
            }
        })
    }

    fn spawn_autosave_task(&self, autosave_interval_ms: u64) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let store = Arc::clone(&self.store);
        let events = Arc::clone(&self.events);
        let in_flight = Arc::clone(&self.autosave_in_flight);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let period = Duration::from_millis(autosave_interval_ms);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        autosave_cycle(&engine, &store, &events, &in_flight);
                    }
                }
            }
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// End the session: cancel both periodic tasks, run the final tick
    /// collection, then perform one forced, non-skippable persist.
    pub async fn end(&mut self, reason: EndReason) -> Result<SessionRecord> {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.tick_task.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.autosave_task.take() {
            let _ = handle.await;
        }

        let now = Utc::now();
        let record = {
            let mut engine = lock_engine(&self.engine);
            if engine.state() != SessionState::Ended {
                let produced = engine.end(now, reason)?;
                push_events(&self.events, produced);
            }
            engine.validated_record(now)?
        };
        self.store.save(&record).map_err(CoreError::from)?;
        push_events(
            &self.events,
            vec![Event::AutosavePersisted {
                session_id: record.session.id.clone(),
                tick_count: record.timeline.tick_count,
                at: Utc::now(),
            }],
        );
        tracing::info!(session_id = %record.session.id, "final persist complete");
        Ok(record)
    }
}

fn autosave_cycle(
    engine: &SharedEngine,
    store: &Arc<dyn SessionStore>,
    events: &SharedEvents,
    in_flight: &Arc<AtomicBool>,
) {
    if in_flight.swap(true, Ordering::SeqCst) {
        // A save is still running; state will be re-snapshotted next cycle.
        let session_id = lock_engine(engine).session_id().to_string();
        tracing::debug!(session_id = %session_id, "autosave coalesced");
        push_events(
            events,
            vec![Event::AutosaveSkipped {
                session_id,
                at: Utc::now(),
            }],
        );
        return;
    }

    let now = Utc::now();
    let snapshot = {
        let engine = lock_engine(engine);
        if engine.state() != SessionState::Active {
            in_flight.store(false, Ordering::SeqCst);
            return;
        }
        engine.validated_record(now)
    };

    match snapshot {
        Ok(record) => match store.save(&record) {
            Ok(()) => {
                push_events(
                    events,
                    vec![Event::AutosavePersisted {
                        session_id: record.session.id.clone(),
                        tick_count: record.timeline.tick_count,
                        at: Utc::now(),
                    }],
                );
            }
            Err(err) => {
                // Transient: nothing is rolled back, the next cycle retries.
                tracing::warn!(error = %err, "autosave persist failed");
                push_events(
                    events,
                    vec![Event::AutosaveFailed {
                        session_id: record.session.id.clone(),
                        code: "store-error".to_string(),
                        at: Utc::now(),
                    }],
                );
            }
        },
        Err(CoreError::Validation(validation)) => {
            tracing::warn!(code = validation.code(), "autosave aborted by validation");
            let session_id = lock_engine(engine).session_id().to_string();
            push_events(
                events,
                vec![Event::AutosaveFailed {
                    session_id,
                    code: validation.code().to_string(),
                    at: Utc::now(),
                }],
            );
        }
        Err(err) => {
            tracing::error!(error = %err, "autosave failed");
        }
    }
    in_flight.store(false, Ordering::SeqCst);
}
