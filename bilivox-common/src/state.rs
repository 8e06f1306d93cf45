//! Derived player state snapshots
//!
//! A [`PlayerState`] is constructed once per transition and never mutated
//! afterwards; consumers always see a consistent picture of one tenant's
//! player.

use serde::{Deserialize, Serialize};

use crate::track::{LoopMode, TrackInfo};

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Playing,
    Paused,
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackStatus::Idle => write!(f, "idle"),
            PlaybackStatus::Playing => write!(f, "playing"),
            PlaybackStatus::Paused => write!(f, "paused"),
        }
    }
}

/// Point-in-time snapshot of one tenant's player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub status: PlaybackStatus,
    pub is_playing: bool,
    pub is_paused: bool,
    pub current_track: Option<TrackInfo>,
    /// Index of the current track, `None` when nothing is active
    pub current_index: Option<usize>,
    pub queue_length: usize,
    /// True when an adjacent index exists or the loop mode makes a forward
    /// move possible
    pub has_next: bool,
    pub has_previous: bool,
    pub loop_mode: LoopMode,
    /// Whether a transport connection is attached
    pub connected: bool,
    /// Elapsed playback time of the current track, clamped to its duration
    pub position_secs: u64,
}

impl PlayerState {
    /// Snapshot for a player with nothing queued or playing.
    pub fn idle(loop_mode: LoopMode, connected: bool) -> Self {
        Self {
            status: PlaybackStatus::Idle,
            is_playing: false,
            is_paused: false,
            current_track: None,
            current_index: None,
            queue_length: 0,
            has_next: false,
            has_previous: false,
            loop_mode,
            connected,
            position_secs: 0,
        }
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::idle(LoopMode::default(), false)
    }
}
