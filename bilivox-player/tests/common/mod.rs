//! Shared test doubles for the integration suites
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use bilivox_common::config::AppConfig;
use bilivox_common::{Error, GuildId, Result, Track};
use bilivox_player::playback::progress::{NullUpdateSink, UpdateSink};
use bilivox_player::playback::supervisor::{
    SessionEvent, SessionId, SessionOutcome, StreamSupervisor,
};
use bilivox_player::resolver::{ResolvedMedia, StreamResolver};
use bilivox_player::transport::TransportSink;
use bilivox_player::PlayerHandle;

pub const TEST_GUILD: GuildId = GuildId(1);

/// Transport sink that swallows PCM and stays connected.
pub struct MockSink;

#[async_trait]
impl TransportSink for MockSink {
    async fn write(&self, _chunk: Bytes) -> std::io::Result<()> {
        Ok(())
    }
    async fn pause(&self) {}
    async fn resume(&self) {}
    async fn stop(&self) {}
    async fn disconnect(&self) {}
    fn is_connected(&self) -> bool {
        true
    }
}

/// What the mock supervisor should do on the next `start` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartBehavior {
    Succeed,
    FailStartup,
    FailToolUnavailable,
}

/// Control surface shared between a test and its mock supervisor.
pub struct MockControl {
    events: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
    started: Mutex<Vec<(SessionId, String)>>,
    behavior: Mutex<StartBehavior>,
}

impl MockControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(None),
            started: Mutex::new(Vec::new()),
            behavior: Mutex::new(StartBehavior::Succeed),
        })
    }

    fn set_events(&self, tx: mpsc::UnboundedSender<SessionEvent>) {
        *self.events.lock().unwrap() = Some(tx);
    }

    pub fn set_behavior(&self, behavior: StartBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn started_titles(&self) -> Vec<String> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .map(|(_, title)| title.clone())
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub fn last_session(&self) -> SessionId {
        self.started
            .lock()
            .unwrap()
            .last()
            .map(|(id, _)| *id)
            .expect("no session started")
    }

    /// Deliver a terminal outcome for the most recent session.
    pub fn finish(&self, outcome: SessionOutcome) {
        self.finish_session(self.last_session(), outcome);
    }

    pub fn finish_session(&self, session_id: SessionId, outcome: SessionOutcome) {
        let events = self.events.lock().unwrap();
        events
            .as_ref()
            .expect("supervisor not wired")
            .send(SessionEvent {
                session_id,
                outcome,
            })
            .expect("engine gone");
    }
}

pub struct MockSupervisor {
    control: Arc<MockControl>,
    next: SessionId,
    active: Option<SessionId>,
}

#[async_trait]
impl StreamSupervisor for MockSupervisor {
    async fn start(&mut self, track: &Track, _sink: Arc<dyn TransportSink>) -> Result<SessionId> {
        match *self.control.behavior.lock().unwrap() {
            StartBehavior::FailStartup => {
                return Err(Error::Startup("mock spawn failure".into()));
            }
            StartBehavior::FailToolUnavailable => {
                return Err(Error::ToolUnavailable("mock tool missing".into()));
            }
            StartBehavior::Succeed => {}
        }
        self.next += 1;
        self.active = Some(self.next);
        self.control
            .started
            .lock()
            .unwrap()
            .push((self.next, track.title.clone()));
        Ok(self.next)
    }

    async fn stop(&mut self) {
        self.active = None;
    }

    fn active_session(&self) -> Option<SessionId> {
        self.active
    }
}

/// Spawn an engine wired to a mock supervisor and a connected mock sink.
pub async fn spawn_player_with(
    config: Arc<AppConfig>,
    update_sink: Arc<dyn UpdateSink>,
) -> (PlayerHandle, Arc<MockControl>) {
    let control = MockControl::new();
    let factory_control = Arc::clone(&control);
    let player = PlayerHandle::spawn(
        TEST_GUILD,
        config,
        move |events| {
            factory_control.set_events(events);
            Box::new(MockSupervisor {
                control: factory_control,
                next: 0,
                active: None,
            })
        },
        update_sink,
    );
    player.connect(Arc::new(MockSink)).await;
    (player, control)
}

pub async fn spawn_player(config: Arc<AppConfig>) -> (PlayerHandle, Arc<MockControl>) {
    spawn_player_with(config, Arc::new(NullUpdateSink)).await
}

pub fn test_config() -> Arc<AppConfig> {
    Arc::new(AppConfig::default())
}

pub fn track(title: &str, duration_secs: u64) -> Track {
    Track::new(
        title,
        duration_secs,
        format!("https://cdn.example/{}.m4s", title),
        format!("https://example.com/video/{}", title),
        "uploader",
        "tester",
    )
}

/// Let spawned tasks and the engine actor drain their queues.
pub async fn settle() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}

/// Resolver returning fixed metadata, or a resolution failure for URLs
/// containing "bad".
pub struct MockResolver {
    pub duration_secs: u64,
}

#[async_trait]
impl StreamResolver for MockResolver {
    async fn resolve(&self, source_url: &str) -> Result<ResolvedMedia> {
        if source_url.contains("bad") {
            return Err(Error::Resolution(format!("cannot resolve {}", source_url)));
        }
        Ok(ResolvedMedia {
            title: format!("resolved:{}", source_url),
            duration_secs: self.duration_secs,
            uploader: "uploader".into(),
            stream_url: format!("{}/stream", source_url),
        })
    }
}
