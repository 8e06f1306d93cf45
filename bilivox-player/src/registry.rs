//! Guild registry: one playback engine per guild, created lazily
//!
//! Explicitly constructed — the embedding service owns the registry and
//! its lifecycle; there is no process-wide singleton. Engines are never
//! shared between guilds, so cross-guild operations need no coordination
//! beyond the registry map itself.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::RwLock;
use tracing::{debug, info};

use bilivox_common::config::AppConfig;
use bilivox_common::events::PlayerEvent;
use bilivox_common::state::PlayerState;
use bilivox_common::track::{Track, TrackInfo};
use bilivox_common::{GuildId, Result};

use crate::debounce::CommandGate;
use crate::playback::engine::PlayerHandle;
use crate::playback::progress::UpdateSink;
use crate::playback::supervisor::FfmpegSupervisor;
use crate::resolver::StreamResolver;

/// Outcome of a play request: the enqueued track and whether playback
/// started with it.
#[derive(Debug, Clone, Serialize)]
pub struct PlayOutcome {
    pub track: TrackInfo,
    pub started: bool,
}

/// Aggregate counters across all guilds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryStats {
    pub total_guilds: usize,
    pub connected: usize,
    pub playing: usize,
    pub queued_tracks: usize,
}

pub struct PlayerRegistry {
    config: Arc<AppConfig>,
    resolver: Arc<dyn StreamResolver>,
    update_sink: Arc<dyn UpdateSink>,
    players: RwLock<HashMap<GuildId, PlayerHandle>>,
    gate: CommandGate,
}

impl PlayerRegistry {
    pub fn new(
        config: Arc<AppConfig>,
        resolver: Arc<dyn StreamResolver>,
        update_sink: Arc<dyn UpdateSink>,
    ) -> Self {
        Self {
            config,
            resolver,
            update_sink,
            players: RwLock::new(HashMap::new()),
            gate: CommandGate::new(),
        }
    }

    /// Get the guild's player, creating it on first use.
    pub async fn get_or_create(&self, guild: GuildId) -> PlayerHandle {
        if let Some(handle) = self.players.read().await.get(&guild) {
            return handle.clone();
        }
        let mut players = self.players.write().await;
        players
            .entry(guild)
            .or_insert_with(|| {
                info!(%guild, "created player for guild");
                let transcode = self.config.transcode.clone();
                PlayerHandle::spawn(
                    guild,
                    Arc::clone(&self.config),
                    move |events| Box::new(FfmpegSupervisor::new(guild, transcode, events)),
                    Arc::clone(&self.update_sink),
                )
            })
            .clone()
    }

    pub async fn get(&self, guild: GuildId) -> Option<PlayerHandle> {
        self.players.read().await.get(&guild).cloned()
    }

    /// Tear down and forget the guild's player. Returns false when none
    /// existed.
    pub async fn teardown(&self, guild: GuildId) -> bool {
        let handle = self.players.write().await.remove(&guild);
        match handle {
            Some(handle) => {
                handle.teardown().await;
                info!(%guild, "removed player for guild");
                true
            }
            None => false,
        }
    }

    /// Tear down every guild's player.
    pub async fn shutdown(&self) {
        let players: Vec<_> = self.players.write().await.drain().collect();
        for (_, handle) in players {
            handle.teardown().await;
        }
        info!("player registry shutdown complete");
    }

    /// Resolve a source URL and enqueue it for the guild, starting
    /// playback when nothing is playing or paused. Resolution failures
    /// propagate untouched.
    pub async fn play(
        &self,
        guild: GuildId,
        source_url: &str,
        requested_by: &str,
    ) -> Result<PlayOutcome> {
        let media = self.resolver.resolve(source_url).await?;
        let player = self.get_or_create(guild).await;
        let track = Track::new(
            media.title,
            media.duration_secs,
            media.stream_url,
            source_url,
            media.uploader,
            requested_by,
        );
        let info = player.enqueue(track).await?;

        let state = player.state().await;
        let mut started = false;
        if !state.is_playing && !state.is_paused {
            started = player.play_next().await?;
        }
        Ok(PlayOutcome {
            track: info,
            started,
        })
    }

    /// Debounced skip: a double-clicked button collapses to one advance.
    pub async fn skip(&self, guild: GuildId) -> Result<bool> {
        if self.debounced(guild, "skip") {
            return Ok(false);
        }
        match self.get(guild).await {
            Some(player) => player.skip().await,
            None => Ok(false),
        }
    }

    pub async fn previous(&self, guild: GuildId) -> Result<bool> {
        if self.debounced(guild, "previous") {
            return Ok(false);
        }
        match self.get(guild).await {
            Some(player) => player.previous().await,
            None => Ok(false),
        }
    }

    pub async fn pause(&self, guild: GuildId) -> bool {
        if self.debounced(guild, "pause") {
            return false;
        }
        match self.get(guild).await {
            Some(player) => player.pause().await,
            None => false,
        }
    }

    pub async fn resume(&self, guild: GuildId) -> bool {
        if self.debounced(guild, "resume") {
            return false;
        }
        match self.get(guild).await {
            Some(player) => player.resume().await,
            None => false,
        }
    }

    pub async fn stop(&self, guild: GuildId) {
        if let Some(player) = self.get(guild).await {
            player.stop().await;
        }
    }

    pub async fn clear_queue(&self, guild: GuildId) {
        if let Some(player) = self.get(guild).await {
            player.clear_queue().await;
        }
    }

    pub async fn shuffle(&self, guild: GuildId) -> bool {
        match self.get(guild).await {
            Some(player) => player.shuffle().await,
            None => false,
        }
    }

    /// Set the loop mode from a user-supplied name; unknown names are
    /// silently ignored.
    pub async fn set_loop_mode(&self, guild: GuildId, mode_name: &str) {
        if let Some(player) = self.get(guild).await {
            player.set_loop_mode_by_name(mode_name).await;
        }
    }

    /// Subscribe to a guild's player events (state transitions plus
    /// progress ticks). The player is created if it does not exist yet.
    pub async fn subscribe(&self, guild: GuildId) -> broadcast::Receiver<PlayerEvent> {
        self.get_or_create(guild).await.subscribe()
    }

    pub async fn state(&self, guild: GuildId) -> Option<PlayerState> {
        match self.get(guild).await {
            Some(player) => Some(player.state().await),
            None => None,
        }
    }

    /// Aggregate counters across all guilds.
    pub async fn statistics(&self) -> RegistryStats {
        let players: Vec<_> = self.players.read().await.values().cloned().collect();
        let mut stats = RegistryStats {
            total_guilds: players.len(),
            ..RegistryStats::default()
        };
        for player in players {
            let state = player.state().await;
            if state.connected {
                stats.connected += 1;
            }
            if state.is_playing {
                stats.playing += 1;
            }
            stats.queued_tracks += state.queue_length;
        }
        stats
    }

    fn debounced(&self, guild: GuildId, action: &'static str) -> bool {
        let window = self.config.playback.debounce_window();
        if self.gate.should_debounce(guild, action, window) {
            debug!(%guild, action, "duplicate command dropped");
            return true;
        }
        false
    }
}
