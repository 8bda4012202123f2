//! Engine events.
//!
//! Every observable state change in the session produces an Event. The
//! rendering layer polls for them; transport bridges subscribe to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::EndReason;
use crate::zone::Zone;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        session_id: String,
        at: DateTime<Utc>,
    },
    EntityJoined {
        entity_id: String,
        profile_id: String,
        device_id: String,
        at: DateTime<Utc>,
    },
    /// A device handoff inside the grace period: the new participation
    /// continues the old one's coins and start time.
    EntityTransferred {
        from_entity: String,
        to_entity: String,
        device_id: String,
        coins: f64,
        at: DateTime<Utc>,
    },
    /// A participation ended for good; it stays reportable.
    EntityDropped {
        entity_id: String,
        device_id: String,
        coins: f64,
        at: DateTime<Utc>,
    },
    TickCollected {
        tick: u64,
        active_entities: usize,
        at: DateTime<Utc>,
    },
    /// A participant's signal vanished this tick.
    ParticipantDropout {
        entity_id: String,
        /// Last tick the participant was confirmed active.
        tick: u64,
        at: DateTime<Utc>,
    },
    ZoneChanged {
        entity_id: String,
        zone: Zone,
        at: DateTime<Utc>,
    },
    AutosavePersisted {
        session_id: String,
        tick_count: u64,
        at: DateTime<Utc>,
    },
    /// An autosave cycle fired while another was in flight and was
    /// coalesced away.
    AutosaveSkipped {
        session_id: String,
        at: DateTime<Utc>,
    },
    AutosaveFailed {
        session_id: String,
        code: String,
        at: DateTime<Utc>,
    },
    SessionEnded {
        session_id: String,
        reason: EndReason,
        at: DateTime<Utc>,
    },
}
