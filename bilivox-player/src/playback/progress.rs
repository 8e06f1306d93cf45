//! Progress/update coalescing
//!
//! One task per guild samples the engine's latest state snapshot and pushes
//! a render to the presentation layer. Ticks that land while a render is
//! still in flight are dropped rather than queued — bounded staleness is
//! acceptable, an unbounded backlog of render requests is not. Bursts of
//! state changes collapse to a single render of the newest state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use bilivox_common::events::{EventBus, PlayerEvent};
use bilivox_common::state::{PlaybackStatus, PlayerState};
use bilivox_common::GuildId;

use crate::playback::engine::EngineSnapshot;

/// Presentation-layer callback fed coalesced state snapshots.
///
/// Renders may be slow (message edits against a rate-limited chat API);
/// the updater guarantees at most one call is in flight per guild.
#[async_trait]
pub trait UpdateSink: Send + Sync {
    async fn render(&self, guild: GuildId, state: &PlayerState);
}

/// `UpdateSink` that discards renders; for headless deployments and tests.
#[derive(Debug, Default)]
pub struct NullUpdateSink;

#[async_trait]
impl UpdateSink for NullUpdateSink {
    async fn render(&self, _guild: GuildId, _state: &PlayerState) {}
}

/// Spawn the per-guild updater task.
///
/// Runs until the engine drops its state sender. The ticker only runs
/// while the engine is Playing; on Paused/Idle the task sits on the watch
/// channel waiting for the next transition.
pub(crate) fn spawn_updater(
    guild: GuildId,
    interval: Duration,
    mut state_rx: watch::Receiver<EngineSnapshot>,
    sink: Arc<dyn UpdateSink>,
    bus: EventBus,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let playing = state_rx.borrow().state.status == PlaybackStatus::Playing;
            if playing {
                tokio::select! {
                    _ = tick.tick() => {}
                    changed = state_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            } else {
                tick.reset();
                if state_rx.changed().await.is_err() {
                    break;
                }
            }

            // Always render the freshest snapshot; anything that arrived
            // while a previous render was in flight has been superseded.
            let snapshot = state_rx.borrow_and_update().clone();
            let state = snapshot.with_live_position();

            if state.status == PlaybackStatus::Playing {
                if let Some(track) = &state.current_track {
                    bus.emit_lossy(PlayerEvent::Progress {
                        title: track.title.clone(),
                        position_secs: state.position_secs,
                        duration_secs: track.duration_secs,
                        timestamp: bilivox_common::time::now(),
                    });
                }
            }
            sink.render(guild, &state).await;
        }
        debug!(%guild, "progress updater stopped");
    })
}
