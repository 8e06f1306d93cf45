//! Common error types for bilivox
//!
//! Defines the playback error taxonomy using thiserror. Transient failures
//! (`StalledStream`, `TransientUpstream`) are eligible for engine-level
//! retry; `PermanentDecode` skips the track; `ToolUnavailable` is fatal for
//! the whole engine. Caller mistakes (empty queue, out-of-range index,
//! unknown loop-mode name) are surfaced as boolean/`Option` results on the
//! operations themselves, not as error values.

use thiserror::Error;

/// Common result type for bilivox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the playback core
#[derive(Error, Debug)]
pub enum Error {
    /// External transcode tool missing or not invocable
    #[error("transcode tool unavailable: {0}")]
    ToolUnavailable(String),

    /// Transcode subprocess failed to spawn
    #[error("transcode startup failed: {0}")]
    Startup(String),

    /// Transcode subprocess produced no output past the kill threshold
    #[error("stalled stream: no transcoder output for {idle_secs}s")]
    StalledStream { idle_secs: u64 },

    /// Transient upstream (CDN) failure, eligible for bounded retry
    #[error("transient upstream failure: {0}")]
    TransientUpstream(String),

    /// Permanent decode failure (bad data); the track is skipped, not retried
    #[error("permanent decode failure: {0}")]
    PermanentDecode(String),

    /// Metadata/stream-URL resolution failed; propagated to the caller untouched
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// Operation not valid in the current player state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Queue reached its configured size limit
    #[error("queue full: limit is {0} tracks")]
    QueueFull(usize),

    /// Configuration loading or validation error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures the engine retries with the same track before
    /// giving up and advancing.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::StalledStream { .. } | Error::TransientUpstream(_) | Error::Startup(_)
        )
    }
}
