//! Event types and broadcast bus for player notifications
//!
//! # Architecture
//!
//! Bilivox uses hybrid communication:
//! - **EventBus** (tokio::broadcast): one-to-many notification of state
//!   transitions and progress ticks, one bus per tenant
//! - **Command channels** (tokio::mpsc): request → single actor
//! - **Watch channels** (tokio::watch): latest-state snapshots for the
//!   progress coalescer
//!
//! Events are serializable so presentation layers can forward them as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::state::PlayerState;
use crate::track::TrackInfo;

/// Player events published on a tenant's event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Engine state transition (Idle/Playing/Paused or track change)
    StateChanged {
        state: PlayerState,
        timestamp: DateTime<Utc>,
    },

    /// A track began playing
    TrackStarted {
        track: TrackInfo,
        index: usize,
        timestamp: DateTime<Utc>,
    },

    /// A track finished; `genuine` distinguishes real completion from a
    /// premature end that was still accepted
    TrackEnded {
        title: String,
        genuine: bool,
        timestamp: DateTime<Utc>,
    },

    /// A playback anomaly triggered a retry of the same track
    TrackRetrying {
        title: String,
        attempt: u32,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A track was abandoned after repeated failures or a permanent error
    TrackSkipped {
        title: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Queue contents changed
    QueueChanged {
        length: usize,
        timestamp: DateTime<Utc>,
    },

    /// Coalescer progress tick while playing
    Progress {
        title: String,
        position_secs: u64,
        duration_secs: u64,
        timestamp: DateTime<Utc>,
    },

    /// An error worth surfacing to users
    PlayerError {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for one tenant's player events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus buffering up to `capacity` events per
    /// subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Broadcast an event; errors when no subscriber is listening
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Broadcast an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }
}
