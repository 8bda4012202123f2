//! # Pulselane Core Library
//!
//! Core engine for Pulselane, a live race chart for group fitness
//! sessions: concurrent participants ride tick-indexed heart-rate series,
//! earn coins by intensity zone, and render as collision-free avatars and
//! dropout badges. All business logic lives here; GUIs, sensor bridges
//! and transports are thin layers over this crate.
//!
//! ## Architecture
//!
//! - **SessionEngine**: a wall-clock state machine; an async orchestrator
//!   schedules its tick collection and autosave cadences
//! - **Timeline**: append-only tick store, run-length encoded at the
//!   persistence boundary; the single source of truth every derived view
//!   (dropout history, chart frames) must be recomputable from
//! - **Zones & TreasureBox**: heart-rate banding and coin accrual
//! - **LayoutManager**: pure, deterministic collision resolution for the
//!   race chart
//! - **Storage**: SQLite session store behind a one-call save boundary
//!
//! ## Key components
//!
//! - [`SessionEngine`] / [`SessionOrchestrator`]: session lifecycle
//! - [`Timeline`]: tick-indexed series store
//! - [`LayoutManager`]: avatar/badge collision resolution
//! - [`Database`]: session record persistence

pub mod activity;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod layout;
pub mod session;
pub mod simulation;
pub mod storage;
pub mod timeline;
pub mod zone;

pub use activity::{ActivityMonitor, DropoutEvent};
pub use codec::{decode_series, encode_series, Sample, SeriesValue};
pub use config::EngineConfig;
pub use error::{
    CodecError, ConfigError, CoreError, InvariantError, Result, StoreError, ValidationError,
};
pub use events::Event;
pub use layout::{
    ChartBounds, ClusterDetector, Connector, ElementKind, LayoutConfig, LayoutElement,
    LayoutManager, LayoutResult, PositionedElement,
};
pub use session::{
    EndReason, Reading, SessionEngine, SessionEntity, SessionOrchestrator, SessionRecord,
    SessionState,
};
pub use storage::{Database, MemoryStore, SessionStore};
pub use timeline::{Metric, SeriesKey, SeriesKind, Timeline, TimelineSnapshot};
pub use zone::{TreasureBox, Zone, ZoneClassifier, ZoneRates, ZoneSettings};
