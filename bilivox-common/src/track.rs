//! Track and loop-mode types shared between the player and its consumers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A queued piece of media, fully resolved to a streamable URL.
///
/// Owned exclusively by the queue entry holding it. Everything except
/// `retry_count` is immutable after creation; the engine increments
/// `retry_count` when playback of this track ends anomalously.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: Uuid,
    pub title: String,
    pub duration_secs: u64,
    /// Direct CDN stream URL produced by the resolver
    pub stream_url: String,
    /// Page URL the request originally named
    pub source_url: String,
    pub uploader: String,
    pub requested_by: String,
    pub added_at: DateTime<Utc>,
    /// Consecutive playback-anomaly retries consumed by this track
    pub retry_count: u32,
}

impl Track {
    pub fn new(
        title: impl Into<String>,
        duration_secs: u64,
        stream_url: impl Into<String>,
        source_url: impl Into<String>,
        uploader: impl Into<String>,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            duration_secs,
            stream_url: stream_url.into(),
            source_url: source_url.into(),
            uploader: uploader.into(),
            requested_by: requested_by.into(),
            added_at: crate::time::now(),
            retry_count: 0,
        }
    }
}

/// Track summary carried in state snapshots and events.
///
/// Omits the stream URL, which is an internal playback detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: Uuid,
    pub title: String,
    pub duration_secs: u64,
    pub uploader: String,
    pub requested_by: String,
}

impl From<&Track> for TrackInfo {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id,
            title: track.title.clone(),
            duration_secs: track.duration_secs,
            uploader: track.uploader.clone(),
            requested_by: track.requested_by.clone(),
        }
    }
}

/// Loop policy governing auto-advance when a track genuinely ends.
///
/// New players start in the configured default mode
/// ([`crate::config::PlaybackConfig::default_loop_mode`], `track` unless
/// overridden).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    /// No looping: the queue plays through once
    None,
    /// Repeat the current track
    #[default]
    Track,
    /// Wrap around to the head after the last track
    Queue,
}

impl LoopMode {
    /// Parse a user-supplied mode name. Unknown names yield `None` so the
    /// caller can ignore them without failing the command.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Some(LoopMode::None),
            "track" => Some(LoopMode::Track),
            "queue" => Some(LoopMode::Queue),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::None => "none",
            LoopMode::Track => "track",
            LoopMode::Queue => "queue",
        }
    }
}

impl std::fmt::Display for LoopMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
