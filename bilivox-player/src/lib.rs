//! # Bilivox Player Library
//!
//! Per-guild playback engines for streaming remote audio into a real-time
//! voice transport.
//!
//! **Purpose:** own a playback queue per guild, drive the external
//! transcode subprocess, recover from upstream stream failures, and expose
//! consistent state snapshots to presentation layers.
//!
//! **Architecture:** one single-writer actor per guild. A cloneable
//! [`PlayerHandle`] enqueues commands on the actor's channel; transport
//! lifecycle callbacks and subprocess outcomes arrive as messages on the
//! same actor, so nothing races. The chat gateway, metadata resolver, and
//! UI renderer plug in through the [`transport::TransportSink`],
//! [`resolver::StreamResolver`], and [`playback::progress::UpdateSink`]
//! traits.

pub mod debounce;
pub mod playback;
pub mod registry;
pub mod resolver;
pub mod transport;

pub use playback::engine::PlayerHandle;
pub use registry::{PlayerRegistry, PlayOutcome, RegistryStats};
