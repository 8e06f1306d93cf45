//! # Bilivox Common Library
//!
//! Shared code for the bilivox playback service:
//! - Error taxonomy
//! - Event types (PlayerEvent) and per-tenant event bus
//! - Configuration loading (TOML bootstrap + environment overrides)
//! - Track, loop-mode, and player-state types
//! - Time and id utilities

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod state;
pub mod time;
pub mod track;

pub use error::{Error, Result};
pub use ids::GuildId;
pub use state::{PlaybackStatus, PlayerState};
pub use track::{LoopMode, Track, TrackInfo};
