//! Per-guild playback engine
//!
//! Single-writer actor: a [`PlayerHandle`] enqueues commands on an mpsc
//! channel; the actor task owns the queue, loop mode, and transcode
//! session. Transport lifecycle callbacks and subprocess outcomes arrive as
//! messages on the same actor, so a `skip` command and a concurrent
//! "track ended" callback can never both decide to advance the queue.
//!
//! Track-end handling distinguishes a genuine end from a premature one by
//! wall-clock elapsed time (see [`is_genuine_end`]); premature ends, stalls,
//! and transient upstream failures retry the same track a bounded number of
//! times before the engine gives up and advances.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use bilivox_common::config::{AppConfig, PlaybackConfig};
use bilivox_common::events::{EventBus, PlayerEvent};
use bilivox_common::state::{PlaybackStatus, PlayerState};
use bilivox_common::time::now;
use bilivox_common::track::{LoopMode, Track, TrackInfo};
use bilivox_common::{Error, GuildId, Result};

use crate::playback::progress::{spawn_updater, UpdateSink};
use crate::playback::queue::TrackQueue;
use crate::playback::supervisor::{SessionEvent, SessionId, SessionOutcome, StreamSupervisor};
use crate::transport::{TransportEvent, TransportSink};

/// Capacity of the per-guild event bus.
const EVENT_BUS_CAPACITY: usize = 64;

/// Latest engine state plus the playback start instant, published on a
/// watch channel for the progress updater.
#[derive(Debug, Clone)]
pub(crate) struct EngineSnapshot {
    pub state: PlayerState,
    pub started: Option<Instant>,
}

impl EngineSnapshot {
    fn idle(loop_mode: LoopMode) -> Self {
        Self {
            state: PlayerState::idle(loop_mode, false),
            started: None,
        }
    }

    /// State with `position_secs` recomputed from the start instant,
    /// clamped to the track duration.
    pub(crate) fn with_live_position(&self) -> PlayerState {
        let mut state = self.state.clone();
        if state.status == PlaybackStatus::Playing {
            if let (Some(started), Some(track)) = (self.started, &state.current_track) {
                state.position_secs = started.elapsed().as_secs().min(track.duration_secs);
            }
        }
        state
    }
}

/// A transport-idle counts as a real end of track if the stream played for
/// at least the minimum genuine time, or got within the end tolerance of
/// the track's full duration. Anything shorter is a failed start, retried
/// rather than advanced past.
pub(crate) fn is_genuine_end(elapsed: Duration, duration_secs: u64, config: &PlaybackConfig) -> bool {
    if elapsed >= Duration::from_secs(config.min_genuine_play_secs) {
        return true;
    }
    let full = Duration::from_secs(duration_secs);
    let tolerance = Duration::from_secs(config.end_tolerance_secs);
    match full.checked_sub(tolerance) {
        Some(threshold) => elapsed >= threshold,
        None => true,
    }
}

/// Forward/backward availability given position, length, and loop mode.
fn compute_nav(index: Option<usize>, len: usize, loop_mode: LoopMode) -> (bool, bool) {
    let next_adjacent = match index {
        Some(i) => i + 1 < len,
        None => len > 0,
    };
    let prev_adjacent = matches!(index, Some(i) if i > 0);
    let wrap = match loop_mode {
        LoopMode::Queue => len > 0,
        LoopMode::Track => index.is_some(),
        LoopMode::None => false,
    };
    (next_adjacent || wrap, prev_adjacent || wrap)
}

/// Why the current track is being retried.
#[derive(Debug)]
enum AnomalyReason {
    Premature { elapsed_secs: u64 },
    Cdn(String),
    Stalled { idle_secs: u64 },
    Transport(String),
    Startup(String),
}

impl std::fmt::Display for AnomalyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyReason::Premature { elapsed_secs } => {
                write!(f, "playback ended prematurely after {}s", elapsed_secs)
            }
            AnomalyReason::Cdn(detail) => write!(f, "transient upstream failure: {}", detail),
            AnomalyReason::Stalled { idle_secs } => {
                write!(f, "stream stalled for {}s", idle_secs)
            }
            AnomalyReason::Transport(detail) => write!(f, "transport error: {}", detail),
            AnomalyReason::Startup(detail) => write!(f, "transcode startup failed: {}", detail),
        }
    }
}

/// How a track-end notification reached the engine.
enum EndSignal {
    TransportIdle,
    SessionCompleted,
}

/// Commands processed by the actor.
enum PlayerCommand {
    Enqueue {
        track: Track,
        reply: oneshot::Sender<Result<TrackInfo>>,
    },
    PlayNext {
        reply: oneshot::Sender<Result<bool>>,
    },
    PlayIndex {
        index: usize,
        reply: oneshot::Sender<Result<bool>>,
    },
    Skip {
        reply: oneshot::Sender<Result<bool>>,
    },
    Previous {
        reply: oneshot::Sender<Result<bool>>,
    },
    Pause {
        reply: oneshot::Sender<bool>,
    },
    Resume {
        reply: oneshot::Sender<bool>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    ClearQueue {
        reply: oneshot::Sender<()>,
    },
    Shuffle {
        reply: oneshot::Sender<bool>,
    },
    SetLoopMode {
        mode: LoopMode,
    },
    RemoveTrack {
        index: usize,
        reply: oneshot::Sender<Option<TrackInfo>>,
    },
    QueueSnapshot {
        reply: oneshot::Sender<Vec<TrackInfo>>,
    },
    GetState {
        reply: oneshot::Sender<PlayerState>,
    },
    Connect {
        sink: Arc<dyn TransportSink>,
        reply: oneshot::Sender<()>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Transport(TransportEvent),
    /// Internal: a scheduled retry came due
    RetryDue { epoch: u64 },
    /// Internal: advance unconditionally after giving up on a track
    ForceAdvance { epoch: u64 },
    Teardown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to one guild's playback engine.
///
/// All methods are safe to call from any task; mutations are serialized by
/// the engine actor.
#[derive(Clone)]
pub struct PlayerHandle {
    guild: GuildId,
    cmd_tx: mpsc::UnboundedSender<PlayerCommand>,
    bus: EventBus,
}

impl PlayerHandle {
    /// Spawn a new engine actor with an injected supervisor.
    ///
    /// `supervisor_factory` receives the channel on which the supervisor
    /// must deliver its terminal session events.
    pub fn spawn(
        guild: GuildId,
        config: Arc<AppConfig>,
        supervisor_factory: impl FnOnce(mpsc::UnboundedSender<SessionEvent>) -> Box<dyn StreamSupervisor>,
        update_sink: Arc<dyn UpdateSink>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let bus = EventBus::new(EVENT_BUS_CAPACITY);
        let supervisor = supervisor_factory(session_tx);

        let (state_tx, state_rx) =
            watch::channel(EngineSnapshot::idle(config.playback.default_loop_mode));
        let updater = spawn_updater(
            guild,
            config.progress.update_interval(),
            state_rx,
            update_sink,
            bus.clone(),
        );

        let actor = PlayerActor {
            guild,
            config: config.playback.clone(),
            queue: TrackQueue::new(),
            loop_mode: config.playback.default_loop_mode,
            status: PlaybackStatus::Idle,
            sink: None,
            connected: false,
            supervisor,
            active_session: None,
            play_started_at: None,
            epoch: 0,
            bus: bus.clone(),
            state_tx,
            cmd_tx: cmd_tx.downgrade(),
        };
        tokio::spawn(actor.run(cmd_rx, session_rx, updater));

        Self { guild, cmd_tx, bus }
    }

    pub fn guild(&self) -> GuildId {
        self.guild
    }

    /// Subscribe to this guild's player events: state transitions plus
    /// coalescer progress ticks.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PlayerEvent> {
        self.bus.subscribe()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> PlayerCommand,
    ) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(make(tx)).is_err() {
            return None;
        }
        rx.await.ok()
    }

    fn gone<T>() -> Result<T> {
        Err(Error::InvalidState("player has been torn down".into()))
    }

    /// Append a track to the queue. Playback does not start automatically;
    /// callers check the returned state and trigger [`Self::play_next`].
    pub async fn enqueue(&self, track: Track) -> Result<TrackInfo> {
        self.request(|reply| PlayerCommand::Enqueue { track, reply })
            .await
            .unwrap_or_else(Self::gone)
    }

    /// Start the first queued track, or the one after the last finished
    /// track. Returns false when the queue has nothing left to play.
    pub async fn play_next(&self) -> Result<bool> {
        self.request(|reply| PlayerCommand::PlayNext { reply })
            .await
            .unwrap_or_else(Self::gone)
    }

    /// Play a specific queue entry. Returns false for an out-of-range index.
    pub async fn play_index(&self, index: usize) -> Result<bool> {
        self.request(|reply| PlayerCommand::PlayIndex { index, reply })
            .await
            .unwrap_or_else(Self::gone)
    }

    pub async fn skip(&self) -> Result<bool> {
        self.request(|reply| PlayerCommand::Skip { reply })
            .await
            .unwrap_or_else(Self::gone)
    }

    pub async fn previous(&self) -> Result<bool> {
        self.request(|reply| PlayerCommand::Previous { reply })
            .await
            .unwrap_or_else(Self::gone)
    }

    pub async fn pause(&self) -> bool {
        self.request(|reply| PlayerCommand::Pause { reply })
            .await
            .unwrap_or(false)
    }

    pub async fn resume(&self) -> bool {
        self.request(|reply| PlayerCommand::Resume { reply })
            .await
            .unwrap_or(false)
    }

    /// Stop playback: clears the queue and tears down the transcode
    /// session and transport connection.
    pub async fn stop(&self) {
        let _ = self.request(|reply| PlayerCommand::Stop { reply }).await;
    }

    /// Truncate the queue to just the active track.
    pub async fn clear_queue(&self) {
        let _ = self.request(|reply| PlayerCommand::ClearQueue { reply }).await;
    }

    /// Shuffle pending tracks; the active one stays first. Returns false
    /// when there is nothing to shuffle.
    pub async fn shuffle(&self) -> bool {
        self.request(|reply| PlayerCommand::Shuffle { reply })
            .await
            .unwrap_or(false)
    }

    pub async fn set_loop_mode(&self, mode: LoopMode) {
        let _ = self.cmd_tx.send(PlayerCommand::SetLoopMode { mode });
    }

    /// Set the loop mode from a user-supplied name; unknown names are
    /// silently ignored.
    pub async fn set_loop_mode_by_name(&self, name: &str) {
        match LoopMode::from_name(name) {
            Some(mode) => self.set_loop_mode(mode).await,
            None => debug!(guild = %self.guild, name, "ignoring unknown loop mode"),
        }
    }

    /// Remove a pending queue entry; the active track cannot be removed.
    pub async fn remove_track(&self, index: usize) -> Option<TrackInfo> {
        self.request(|reply| PlayerCommand::RemoveTrack { index, reply })
            .await
            .flatten()
    }

    pub async fn queue_snapshot(&self) -> Vec<TrackInfo> {
        self.request(|reply| PlayerCommand::QueueSnapshot { reply })
            .await
            .unwrap_or_default()
    }

    pub async fn state(&self) -> PlayerState {
        self.request(|reply| PlayerCommand::GetState { reply })
            .await
            .unwrap_or_default()
    }

    /// Attach a connected transport sink for this guild.
    pub async fn connect(&self, sink: Arc<dyn TransportSink>) {
        let _ = self.request(|reply| PlayerCommand::Connect { sink, reply }).await;
    }

    /// Detach the transport; any live playback is suspended.
    pub async fn disconnect(&self) {
        let _ = self.request(|reply| PlayerCommand::Disconnect { reply }).await;
    }

    /// Feed a transport lifecycle event into the engine.
    pub fn transport_event(&self, event: TransportEvent) {
        let _ = self.cmd_tx.send(PlayerCommand::Transport(event));
    }

    /// Tear the engine down: cancels its timers, kills any live
    /// subprocess, and stops the actor. Awaits completion.
    pub async fn teardown(&self) {
        let _ = self.request(|reply| PlayerCommand::Teardown { reply }).await;
    }
}

/// Owns all mutable player state; runs until torn down.
struct PlayerActor {
    guild: GuildId,
    config: PlaybackConfig,
    queue: TrackQueue,
    loop_mode: LoopMode,
    status: PlaybackStatus,
    sink: Option<Arc<dyn TransportSink>>,
    connected: bool,
    supervisor: Box<dyn StreamSupervisor>,
    /// Session whose terminal event the engine will act on; events from
    /// any other session are stale and dropped
    active_session: Option<SessionId>,
    play_started_at: Option<Instant>,
    /// Bumped on every playback decision; stale retry/advance timers
    /// carry an older value and are ignored
    epoch: u64,
    bus: EventBus,
    state_tx: watch::Sender<EngineSnapshot>,
    /// Weak self-sender for scheduled retries; must not keep the actor
    /// alive once every external handle is gone
    cmd_tx: mpsc::WeakUnboundedSender<PlayerCommand>,
}

impl PlayerActor {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<PlayerCommand>,
        mut session_rx: mpsc::UnboundedReceiver<SessionEvent>,
        updater: JoinHandle<()>,
    ) {
        info!(guild = %self.guild, "player engine started");
        let mut teardown_ack: Option<oneshot::Sender<()>> = None;

        loop {
            tokio::select! {
                command = cmd_rx.recv() => match command {
                    Some(PlayerCommand::Teardown { reply }) => {
                        teardown_ack = Some(reply);
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(event) = session_rx.recv() => self.handle_session_event(event).await,
            }
        }

        // Teardown order: the supervisor cancels its activity monitor and
        // kills the subprocess (awaited), then the coalescer stops.
        self.supervisor.stop().await;
        updater.abort();
        if let Some(sink) = self.sink.take() {
            sink.disconnect().await;
        }
        if let Some(ack) = teardown_ack {
            let _ = ack.send(());
        }
        info!(guild = %self.guild, "player engine stopped");
    }

    async fn handle_command(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::Enqueue { track, reply } => {
                let _ = reply.send(self.enqueue(track));
            }
            PlayerCommand::PlayNext { reply } => {
                let result = self.play_next().await;
                let _ = reply.send(result);
            }
            PlayerCommand::PlayIndex { index, reply } => {
                let result = self.play_index(index).await;
                let _ = reply.send(result);
            }
            PlayerCommand::Skip { reply } => {
                let result = self.skip().await;
                let _ = reply.send(result);
            }
            PlayerCommand::Previous { reply } => {
                let result = self.previous().await;
                let _ = reply.send(result);
            }
            PlayerCommand::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            PlayerCommand::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            PlayerCommand::Stop { reply } => {
                info!(guild = %self.guild, "stop command received");
                self.stop_playback().await;
                let _ = reply.send(());
            }
            PlayerCommand::ClearQueue { reply } => {
                self.queue.clear_keep_current();
                info!(guild = %self.guild, "queue cleared");
                self.emit_queue_changed();
                self.publish_state();
                let _ = reply.send(());
            }
            PlayerCommand::Shuffle { reply } => {
                let shuffled = self.queue.len() > 1;
                if shuffled {
                    self.queue.shuffle_pinning_current();
                    info!(guild = %self.guild, queue_len = self.queue.len(), "queue shuffled");
                    self.emit_queue_changed();
                    self.publish_state();
                }
                let _ = reply.send(shuffled);
            }
            PlayerCommand::SetLoopMode { mode } => {
                self.loop_mode = mode;
                info!(guild = %self.guild, %mode, "loop mode changed");
                self.publish_state();
            }
            PlayerCommand::RemoveTrack { index, reply } => {
                let removed = self.queue.remove(index).map(|t| TrackInfo::from(&t));
                if removed.is_some() {
                    self.emit_queue_changed();
                    self.publish_state();
                }
                let _ = reply.send(removed);
            }
            PlayerCommand::QueueSnapshot { reply } => {
                let tracks = self.queue.tracks().iter().map(TrackInfo::from).collect();
                let _ = reply.send(tracks);
            }
            PlayerCommand::GetState { reply } => {
                let _ = reply.send(self.current_state());
            }
            PlayerCommand::Connect { sink, reply } => {
                self.connected = sink.is_connected();
                self.sink = Some(sink);
                debug!(guild = %self.guild, connected = self.connected, "transport attached");
                self.publish_state();
                let _ = reply.send(());
            }
            PlayerCommand::Disconnect { reply } => {
                self.suspend_playback().await;
                let _ = reply.send(());
            }
            PlayerCommand::Transport(event) => self.handle_transport_event(event).await,
            PlayerCommand::RetryDue { epoch } => self.handle_retry_due(epoch).await,
            PlayerCommand::ForceAdvance { epoch } => {
                if epoch == self.epoch {
                    self.force_advance().await;
                } else {
                    debug!(guild = %self.guild, "stale advance request ignored");
                }
            }
            PlayerCommand::Teardown { .. } => unreachable!("teardown handled in run loop"),
        }
    }

    // ─── user operations ─────────────────────────────────────────

    fn enqueue(&mut self, track: Track) -> Result<TrackInfo> {
        if self.queue.len() >= self.config.max_queue_size {
            return Err(Error::QueueFull(self.config.max_queue_size));
        }
        let info = TrackInfo::from(&track);
        info!(
            guild = %self.guild,
            title = %track.title,
            requested_by = %track.requested_by,
            queue_len = self.queue.len() + 1,
            "track added to queue"
        );
        self.queue.push(track);
        self.emit_queue_changed();
        self.publish_state();
        Ok(info)
    }

    async fn play_next(&mut self) -> Result<bool> {
        let target = match self.queue.current_index() {
            None => 0,
            Some(index) => index + 1,
        };
        if target >= self.queue.len() {
            info!(guild = %self.guild, "queue exhausted, stopping playback");
            self.stop_playback().await;
            return Ok(false);
        }
        self.queue.select(target);
        self.attempt_play_current().await
    }

    async fn play_index(&mut self, index: usize) -> Result<bool> {
        if self.queue.select(index).is_none() {
            warn!(guild = %self.guild, index, queue_len = self.queue.len(), "invalid track index");
            return Ok(false);
        }
        self.attempt_play_current().await
    }

    async fn skip(&mut self) -> Result<bool> {
        let Some(index) = self.queue.current_index() else {
            return Ok(false);
        };
        if index + 1 < self.queue.len() {
            self.queue.select(index + 1);
            self.attempt_play_current().await?;
            return Ok(true);
        }
        match self.loop_mode {
            LoopMode::Queue => {
                self.queue.select(0);
                self.attempt_play_current().await?;
                Ok(true)
            }
            LoopMode::Track => {
                // at the tail, repeat-one replays instead of stopping
                self.attempt_play_current().await?;
                Ok(true)
            }
            LoopMode::None => {
                self.stop_playback().await;
                Ok(false)
            }
        }
    }

    async fn previous(&mut self) -> Result<bool> {
        let Some(index) = self.queue.current_index() else {
            return Ok(false);
        };
        if index > 0 {
            self.queue.select(index - 1);
            self.attempt_play_current().await?;
            return Ok(true);
        }
        match self.loop_mode {
            LoopMode::Queue => {
                self.queue.select(self.queue.len() - 1);
                self.attempt_play_current().await?;
                Ok(true)
            }
            LoopMode::Track => {
                self.attempt_play_current().await?;
                Ok(true)
            }
            // at the head without wraparound the current track keeps playing
            LoopMode::None => Ok(false),
        }
    }

    async fn pause(&mut self) -> bool {
        if self.status != PlaybackStatus::Playing {
            return false;
        }
        if let Some(sink) = &self.sink {
            sink.pause().await;
        }
        self.status = PlaybackStatus::Paused;
        info!(guild = %self.guild, "playback paused");
        self.publish_state();
        true
    }

    async fn resume(&mut self) -> bool {
        if self.status != PlaybackStatus::Paused {
            return false;
        }
        if let Some(sink) = &self.sink {
            sink.resume().await;
        }
        self.status = PlaybackStatus::Playing;
        info!(guild = %self.guild, "playback resumed");
        self.publish_state();
        true
    }

    // ─── playback control ────────────────────────────────────────

    /// Start the selected track, routing startup failures into the retry
    /// machinery (except a missing tool, which is fatal).
    async fn attempt_play_current(&mut self) -> Result<bool> {
        match self.play_current().await {
            Ok(started) => Ok(started),
            Err(Error::ToolUnavailable(detail)) => {
                error!(guild = %self.guild, %detail, "transcode tool unavailable, stopping");
                self.emit_error(format!("transcode tool unavailable: {}", detail));
                self.stop_playback().await;
                Err(Error::ToolUnavailable(detail))
            }
            Err(e) => {
                self.handle_anomaly(AnomalyReason::Startup(e.to_string())).await;
                Err(e)
            }
        }
    }

    async fn play_current(&mut self) -> Result<bool> {
        let track = match self.queue.current() {
            Some(track) => track.clone(),
            None => {
                warn!(guild = %self.guild, "no current track to play");
                return Ok(false);
            }
        };
        let Some(sink) = self.sink.clone() else {
            warn!(guild = %self.guild, title = %track.title, "no transport connection available");
            return Err(Error::InvalidState("no transport connection".into()));
        };

        self.epoch += 1;
        let session = self.supervisor.start(&track, sink).await?;

        self.active_session = Some(session);
        self.play_started_at = Some(Instant::now());
        self.status = PlaybackStatus::Playing;
        info!(
            guild = %self.guild,
            title = %track.title,
            session,
            "track playback started"
        );
        if let Some(index) = self.queue.current_index() {
            self.bus.emit_lossy(PlayerEvent::TrackStarted {
                track: TrackInfo::from(&track),
                index,
                timestamp: now(),
            });
        }
        self.publish_state();
        Ok(true)
    }

    /// Full stop: clear the queue, tear down the transcode session and the
    /// transport connection.
    async fn stop_playback(&mut self) {
        self.epoch += 1;
        self.active_session = None;
        self.supervisor.stop().await;
        if let Some(sink) = self.sink.take() {
            sink.stop().await;
            sink.disconnect().await;
        }
        self.connected = false;
        self.queue.clear_all();
        self.play_started_at = None;
        self.status = PlaybackStatus::Idle;
        self.publish_state();
    }

    /// Transport went away: keep the queue but end the session.
    async fn suspend_playback(&mut self) {
        self.epoch += 1;
        self.active_session = None;
        self.supervisor.stop().await;
        self.sink = None;
        self.connected = false;
        self.queue.deselect();
        self.play_started_at = None;
        self.status = PlaybackStatus::Idle;
        info!(guild = %self.guild, "transport detached, playback suspended");
        self.publish_state();
    }

    // ─── end-of-track and failure handling ───────────────────────

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                self.connected = true;
                debug!(guild = %self.guild, "transport connected");
                self.publish_state();
            }
            TransportEvent::Disconnected => {
                info!(guild = %self.guild, "transport disconnected");
                self.suspend_playback().await;
            }
            TransportEvent::Playing | TransportEvent::Paused => {
                debug!(guild = %self.guild, "transport state notification");
            }
            TransportEvent::Idle => {
                self.on_track_end_signal(EndSignal::TransportIdle).await;
            }
            TransportEvent::Error(detail) => {
                warn!(guild = %self.guild, %detail, "transport reported an error");
                if self.active_session.take().is_some() {
                    self.supervisor.stop().await;
                    self.handle_anomaly(AnomalyReason::Transport(detail)).await;
                }
            }
        }
    }

    async fn handle_session_event(&mut self, event: SessionEvent) {
        if self.active_session != Some(event.session_id) {
            debug!(
                guild = %self.guild,
                session = event.session_id,
                "ignoring event from stale transcode session"
            );
            return;
        }
        match event.outcome {
            SessionOutcome::Completed => {
                self.on_track_end_signal(EndSignal::SessionCompleted).await;
            }
            SessionOutcome::CdnFailure { detail } => {
                self.active_session = None;
                warn!(guild = %self.guild, %detail, "upstream CDN failure");
                self.handle_anomaly(AnomalyReason::Cdn(detail)).await;
            }
            SessionOutcome::Stalled { idle_secs } => {
                self.active_session = None;
                warn!(guild = %self.guild, idle_secs, "stream stalled");
                self.handle_anomaly(AnomalyReason::Stalled { idle_secs }).await;
            }
            SessionOutcome::DecodeFailure { detail } => {
                self.active_session = None;
                let title = self
                    .queue
                    .current()
                    .map(|t| t.title.clone())
                    .unwrap_or_default();
                warn!(
                    guild = %self.guild,
                    %title,
                    %detail,
                    "permanent decode failure, skipping track"
                );
                self.bus.emit_lossy(PlayerEvent::TrackSkipped {
                    title,
                    reason: format!("permanent decode failure: {}", detail),
                    timestamp: now(),
                });
                self.force_advance().await;
            }
            SessionOutcome::Stopped => {
                // engine-initiated; nothing to decide
                debug!(guild = %self.guild, session = event.session_id, "session stop confirmed");
            }
        }
    }

    /// Natural-end decision point: either a transport idle or a clean
    /// subprocess exit, whichever lands first for the active session.
    async fn on_track_end_signal(&mut self, signal: EndSignal) {
        if self.status == PlaybackStatus::Idle {
            return;
        }
        if self.active_session.take().is_none() {
            debug!(guild = %self.guild, "duplicate end signal ignored");
            return;
        }
        let elapsed = self
            .play_started_at
            .map(|at| at.elapsed())
            .unwrap_or_default();
        let (title, duration_secs) = match self.queue.current() {
            Some(track) => (track.title.clone(), track.duration_secs),
            None => {
                self.status = PlaybackStatus::Idle;
                self.publish_state();
                return;
            }
        };

        if is_genuine_end(elapsed, duration_secs, &self.config) {
            let via = match signal {
                EndSignal::TransportIdle => "transport",
                EndSignal::SessionCompleted => "transcoder",
            };
            debug!(
                guild = %self.guild,
                %title,
                elapsed_secs = elapsed.as_secs(),
                via,
                "track ended"
            );
            self.bus.emit_lossy(PlayerEvent::TrackEnded {
                title,
                genuine: true,
                timestamp: now(),
            });
            if let Some(track) = self.queue.current_mut() {
                track.retry_count = 0;
            }
            self.handle_track_end().await;
        } else {
            self.handle_anomaly(AnomalyReason::Premature {
                elapsed_secs: elapsed.as_secs(),
            })
            .await;
        }
    }

    /// Auto-advance policy for a genuine end.
    async fn handle_track_end(&mut self) {
        match self.loop_mode {
            LoopMode::Track if self.queue.current().is_some() => {
                let _ = self.attempt_play_current().await;
            }
            _ => {
                let _ = self.skip().await;
            }
        }
    }

    /// Bounded retry for premature ends, stalls, CDN failures, transport
    /// errors, and spawn failures.
    async fn handle_anomaly(&mut self, reason: AnomalyReason) {
        let Some(track) = self.queue.current_mut() else {
            self.status = PlaybackStatus::Idle;
            self.publish_state();
            return;
        };
        track.retry_count += 1;
        let attempt = track.retry_count;
        let title = track.title.clone();

        if attempt > self.config.max_track_retries {
            warn!(
                guild = %self.guild,
                %title,
                retries = self.config.max_track_retries,
                %reason,
                "giving up after repeated playback failures, skipping track"
            );
            self.bus.emit_lossy(PlayerEvent::TrackSkipped {
                title,
                reason: reason.to_string(),
                timestamp: now(),
            });
            if let Some(cmd_tx) = self.cmd_tx.upgrade() {
                let _ = cmd_tx.send(PlayerCommand::ForceAdvance { epoch: self.epoch });
            }
            return;
        }

        info!(
            guild = %self.guild,
            %title,
            attempt,
            max = self.config.max_track_retries,
            %reason,
            "retrying track after playback anomaly"
        );
        self.bus.emit_lossy(PlayerEvent::TrackRetrying {
            title,
            attempt,
            reason: reason.to_string(),
            timestamp: now(),
        });
        self.schedule_retry();
    }

    fn schedule_retry(&self) {
        let epoch = self.epoch;
        let delay = self.config.retry_delay();
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(cmd_tx) = cmd_tx.upgrade() {
                let _ = cmd_tx.send(PlayerCommand::RetryDue { epoch });
            }
        });
    }

    async fn handle_retry_due(&mut self, epoch: u64) {
        if epoch != self.epoch {
            debug!(guild = %self.guild, "stale retry timer ignored");
            return;
        }
        if self.active_session.is_some() || self.queue.current().is_none() {
            return;
        }
        let _ = self.attempt_play_current().await;
    }

    /// Advance regardless of repeat-one: the current track is being
    /// abandoned.
    async fn force_advance(&mut self) {
        let Some(index) = self.queue.current_index() else {
            self.status = PlaybackStatus::Idle;
            self.publish_state();
            return;
        };
        let len = self.queue.len();
        let next = if index + 1 < len {
            Some(index + 1)
        } else if self.loop_mode == LoopMode::Queue && len > 1 {
            // wrapping a single-track queue would replay the track that
            // just failed repeatedly
            Some(0)
        } else {
            None
        };
        match next {
            Some(next) => {
                self.queue.select(next);
                let _ = self.attempt_play_current().await;
            }
            None => {
                self.stop_playback().await;
            }
        }
    }

    // ─── state publication ───────────────────────────────────────

    fn current_state(&self) -> PlayerState {
        let index = self.queue.current_index();
        let len = self.queue.len();
        let (has_next, has_previous) = compute_nav(index, len, self.loop_mode);
        let current_track = self.queue.current().map(TrackInfo::from);
        let position_secs = match (&current_track, self.play_started_at) {
            (Some(track), Some(started)) => started.elapsed().as_secs().min(track.duration_secs),
            _ => 0,
        };
        PlayerState {
            status: self.status,
            is_playing: self.status == PlaybackStatus::Playing,
            is_paused: self.status == PlaybackStatus::Paused,
            current_track,
            current_index: index,
            queue_length: len,
            has_next,
            has_previous,
            loop_mode: self.loop_mode,
            connected: self.connected,
            position_secs,
        }
    }

    /// Publish the snapshot to the coalescer and event subscribers.
    fn publish_state(&mut self) {
        let state = self.current_state();
        self.bus.emit_lossy(PlayerEvent::StateChanged {
            state: state.clone(),
            timestamp: now(),
        });
        self.state_tx.send_replace(EngineSnapshot {
            state,
            started: self.play_started_at,
        });
    }

    fn emit_queue_changed(&self) {
        self.bus.emit_lossy(PlayerEvent::QueueChanged {
            length: self.queue.len(),
            timestamp: now(),
        });
    }

    fn emit_error(&self, message: String) {
        self.bus.emit_lossy(PlayerEvent::PlayerError {
            message,
            timestamp: now(),
        });
    }
}
