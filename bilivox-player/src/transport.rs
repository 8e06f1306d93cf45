//! Transport sink seam
//!
//! The engine writes decoded PCM into a [`TransportSink`] implementation
//! and receives lifecycle notifications through
//! [`crate::PlayerHandle::transport_event`]. No vendor protocol is assumed
//! beyond this contract.

use async_trait::async_trait;
use bytes::Bytes;

/// Real-time audio delivery channel, fed raw PCM at the configured sample
/// rate and channel count.
#[async_trait]
pub trait TransportSink: Send + Sync {
    /// Deliver one chunk of raw PCM (s16le).
    async fn write(&self, chunk: Bytes) -> std::io::Result<()>;

    /// Pause delivery without tearing the stream down.
    async fn pause(&self);

    /// Resume a paused stream.
    async fn resume(&self);

    /// End the current stream; subsequent writes belong to a new one.
    async fn stop(&self);

    /// Tear down the underlying connection.
    async fn disconnect(&self);

    fn is_connected(&self) -> bool;
}

/// Lifecycle events emitted by the transport client.
///
/// The engine relies on events for one session arriving in the order the
/// transport delivered them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Playing,
    Paused,
    /// The current stream drained to its end
    Idle,
    Error(String),
    Disconnected,
}
