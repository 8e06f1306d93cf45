//! Stream resolver seam
//!
//! Turns a source page URL into playable stream metadata. Implemented
//! outside this crate (the Bilibili API client in production); the player
//! only ever hands the resolved stream URL to the transcode supervisor.

use async_trait::async_trait;

use bilivox_common::Result;

/// Metadata and stream URL for a resolved media page.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub title: String,
    pub duration_secs: u64,
    pub uploader: String,
    /// Direct CDN stream URL, already validated by the resolver
    pub stream_url: String,
}

#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Resolve a source page URL, or fail with [`bilivox_common::Error::Resolution`].
    async fn resolve(&self, source_url: &str) -> Result<ResolvedMedia>;
}
