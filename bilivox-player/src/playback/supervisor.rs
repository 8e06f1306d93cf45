//! Transcode process supervision
//!
//! Spawns the external decode tool for a stream URL, pipes its stdout into
//! the transport sink, watches output activity, and classifies failures.
//! The tool is treated as an unreliable black box: it can stall, die on
//! CDN hiccups, or choke on bad data, and each of those must surface as a
//! distinct outcome for the engine's retry logic.
//!
//! At most one live subprocess exists per supervisor. The child handle is
//! owned by its session's supervise task — kill signals are only ever
//! delivered there, so a delayed kill can never reach a process from a
//! newer session.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use bilivox_common::config::TranscodeConfig;
use bilivox_common::{Error, GuildId, Result, Track};

use crate::transport::TransportSink;

/// Identifier for one transcode session, monotonic per supervisor.
pub type SessionId = u64;

/// Bytes of trailing stderr kept for failure classification.
const STDERR_TAIL_LIMIT: usize = 8 * 1024;

/// PCM read chunk size for the stdout pump.
const PUMP_CHUNK_SIZE: usize = 8 * 1024;

/// How long a finished session may keep draining its pump and stderr tasks.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Terminal outcome of a transcode session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Tool exited cleanly (code 0)
    Completed,
    /// Exit classified as a transient upstream (CDN) failure
    CdnFailure { detail: String },
    /// Exit classified as a permanent decode failure
    DecodeFailure { detail: String },
    /// Killed by the activity monitor after prolonged output silence
    Stalled { idle_secs: u64 },
    /// Killed by an explicit stop; the engine ignores these
    Stopped,
}

/// Terminal event delivered to the engine.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub session_id: SessionId,
    pub outcome: SessionOutcome,
}

/// Seam between the engine and the subprocess machinery.
#[async_trait]
pub trait StreamSupervisor: Send {
    /// Start transcoding `track`'s stream URL into `sink`. Any live
    /// session is fully stopped and awaited first.
    async fn start(&mut self, track: &Track, sink: Arc<dyn TransportSink>) -> Result<SessionId>;

    /// Stop the live session, if any, and await its teardown. Idempotent.
    async fn stop(&mut self);

    fn active_session(&self) -> Option<SessionId>;
}

/// stderr fragments that identify a transient upstream failure when the
/// tool exits with code 255. Matched case-insensitively.
const CDN_FAILURE_SIGNATURES: &[&str] = &[
    "connection reset",
    "connection refused",
    "timed out",
    "403",
    "404",
    "502",
    "503",
    "i/o error",
    "will reconnect",
    "error=end of file",
];

/// Classify a tool exit as a transient upstream (CDN) failure.
///
/// Only exit code 255 qualifies; the same stderr text with any other code
/// is a different failure class.
pub fn is_cdn_failure(exit_code: Option<i32>, stderr: &str) -> bool {
    if exit_code != Some(255) {
        return false;
    }
    let stderr = stderr.to_ascii_lowercase();
    CDN_FAILURE_SIGNATURES.iter().any(|sig| stderr.contains(sig))
}

/// Why a kill was requested; decides the reported outcome.
#[derive(Debug, Clone, Copy)]
enum KillReason {
    Stop,
    Stalled { idle_secs: u64 },
}

struct KillRequest {
    reason: KillReason,
    /// Acked once the child is fully reaped
    done: Option<oneshot::Sender<()>>,
}

struct ActiveSession {
    id: SessionId,
    kill_tx: mpsc::Sender<KillRequest>,
    monitor: JoinHandle<()>,
    supervise: JoinHandle<()>,
}

/// Production supervisor invoking ffmpeg.
pub struct FfmpegSupervisor {
    guild: GuildId,
    config: TranscodeConfig,
    events: mpsc::UnboundedSender<SessionEvent>,
    next_session: SessionId,
    active: Option<ActiveSession>,
}

impl FfmpegSupervisor {
    pub fn new(
        guild: GuildId,
        config: TranscodeConfig,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            guild,
            config,
            events,
            next_session: 0,
            active: None,
        }
    }

    /// Cheap probe that the decode tool is invocable at all.
    async fn probe_tool(&self) -> Result<()> {
        let status = Command::new(&self.config.tool_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::ToolUnavailable(format!("{}: {}", self.config.tool_path, e)))?;
        if !status.success() {
            return Err(Error::ToolUnavailable(format!(
                "{} -version exited with {}",
                self.config.tool_path, status
            )));
        }
        Ok(())
    }

    /// Fixed argument template; the stream URL is the only caller-supplied
    /// value, and it is passed as a single argv entry, never through a
    /// shell. Raw PCM output: container framing corrupts on abrupt kill.
    fn build_args(&self, stream_url: &str) -> Vec<String> {
        vec![
            "-user_agent".into(),
            self.config.user_agent.clone(),
            "-referer".into(),
            self.config.referer.clone(),
            "-i".into(),
            stream_url.to_string(),
            "-f".into(),
            "s16le".into(),
            "-ar".into(),
            self.config.sample_rate.to_string(),
            "-ac".into(),
            self.config.channels.to_string(),
            "-vn".into(),
            "-loglevel".into(),
            "error".into(),
            "pipe:1".into(),
        ]
    }

    /// Replace any live session with one running `command`.
    async fn start_with_command(
        &mut self,
        command: Command,
        sink: Arc<dyn TransportSink>,
    ) -> Result<SessionId> {
        // Overlapping sessions piping into the same sink are forbidden:
        // fully tear down any previous one before spawning.
        self.stop().await;
        self.spawn_session(command, sink).await
    }

    /// Spawn `command` as the new session and wire up its pump, stderr
    /// collector, supervise task, and activity monitor.
    async fn spawn_session(
        &mut self,
        mut command: Command,
        sink: Arc<dyn TransportSink>,
    ) -> Result<SessionId> {
        self.next_session += 1;
        let id = self.next_session;

        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = command.spawn().map_err(|e| Error::Startup(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Startup("missing stdout pipe".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Startup("missing stderr pipe".into()))?;

        let started = Instant::now();
        // Milliseconds after `started` of the most recent stdout data.
        let last_activity = Arc::new(AtomicU64::new(0));

        let guild = self.guild;
        let pump = {
            let last_activity = Arc::clone(&last_activity);
            tokio::spawn(async move {
                let mut stdout = stdout;
                let mut buf = vec![0u8; PUMP_CHUNK_SIZE];
                loop {
                    match stdout.read(&mut buf).await {
                        Ok(0) => break,
                        Ok(n) => {
                            last_activity
                                .store(started.elapsed().as_millis() as u64, Ordering::Relaxed);
                            if let Err(e) = sink.write(Bytes::copy_from_slice(&buf[..n])).await {
                                debug!(%guild, session = id, error = %e, "transport sink rejected PCM chunk");
                                break;
                            }
                        }
                        Err(e) => {
                            debug!(%guild, session = id, error = %e, "transcoder stdout read failed");
                            break;
                        }
                    }
                }
            })
        };

        let stderr_task = tokio::spawn(async move {
            let mut stderr = stderr;
            let mut tail = String::new();
            let mut buf = vec![0u8; 2048];
            loop {
                match stderr.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        tail.push_str(&String::from_utf8_lossy(&buf[..n]));
                        if tail.len() > STDERR_TAIL_LIMIT {
                            let cut = tail.len() - STDERR_TAIL_LIMIT;
                            tail.drain(..cut);
                        }
                    }
                }
            }
            tail
        });

        let (kill_tx, kill_rx) = mpsc::channel(4);

        let supervise = tokio::spawn(supervise_child(
            guild,
            id,
            child,
            kill_rx,
            pump,
            stderr_task,
            self.events.clone(),
            self.config.kill_grace(),
        ));

        // The monitor captures this session's own kill handle, never a
        // shared "current process" reference.
        let monitor = tokio::spawn(monitor_activity(
            guild,
            id,
            started,
            Arc::clone(&last_activity),
            kill_tx.clone(),
            self.config.clone(),
        ));

        self.active = Some(ActiveSession {
            id,
            kill_tx,
            monitor,
            supervise,
        });
        Ok(id)
    }
}

#[async_trait]
impl StreamSupervisor for FfmpegSupervisor {
    async fn start(&mut self, track: &Track, sink: Arc<dyn TransportSink>) -> Result<SessionId> {
        self.probe_tool().await?;

        let mut command = Command::new(&self.config.tool_path);
        command.args(self.build_args(&track.stream_url));
        let id = self.start_with_command(command, sink).await?;
        info!(guild = %self.guild, session = id, title = %track.title, "transcode session started");
        Ok(id)
    }

    async fn stop(&mut self) {
        let Some(session) = self.active.take() else {
            return;
        };
        let id = session.id;
        session.monitor.abort();

        let (done_tx, done_rx) = oneshot::channel();
        let request = KillRequest {
            reason: KillReason::Stop,
            done: Some(done_tx),
        };
        if session.kill_tx.send(request).await.is_ok() {
            // The supervise task acks once the child is fully reaped.
            let _ = done_rx.await;
        } else {
            // Session already terminated on its own; wait out its cleanup.
            let _ = session.supervise.await;
        }
        debug!(guild = %self.guild, session = id, "transcode session torn down");
    }

    fn active_session(&self) -> Option<SessionId> {
        self.active.as_ref().map(|s| s.id)
    }
}

/// Owns the child for its whole life: waits for exit, performs requested
/// kills, classifies the result, and reports exactly one terminal event.
#[allow(clippy::too_many_arguments)]
async fn supervise_child(
    guild: GuildId,
    id: SessionId,
    mut child: Child,
    mut kill_rx: mpsc::Receiver<KillRequest>,
    pump: JoinHandle<()>,
    stderr_task: JoinHandle<String>,
    events: mpsc::UnboundedSender<SessionEvent>,
    kill_grace: Duration,
) {
    let mut kill_reason: Option<KillReason> = None;
    let mut acks: Vec<oneshot::Sender<()>> = Vec::new();

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(request) = kill_rx.recv() => {
                if let Some(done) = request.done {
                    acks.push(done);
                }
                if kill_reason.is_none() {
                    kill_reason = Some(request.reason);
                    break shutdown_child(&mut child, kill_grace).await;
                }
            }
        }
    };

    // Collect acks that raced in while the child was going down.
    while let Ok(request) = kill_rx.try_recv() {
        if let Some(done) = request.done {
            acks.push(done);
        }
    }

    // Let the pump drain the final buffered output, then cut it loose.
    let mut pump = pump;
    if tokio::time::timeout(DRAIN_TIMEOUT, &mut pump).await.is_err() {
        pump.abort();
    }
    let stderr_tail = match tokio::time::timeout(DRAIN_TIMEOUT, stderr_task).await {
        Ok(Ok(tail)) => tail,
        _ => String::new(),
    };

    let outcome = match kill_reason {
        Some(KillReason::Stop) => SessionOutcome::Stopped,
        Some(KillReason::Stalled { idle_secs }) => SessionOutcome::Stalled { idle_secs },
        None => classify_exit(status, &stderr_tail),
    };
    match &outcome {
        SessionOutcome::Completed | SessionOutcome::Stopped => {
            debug!(%guild, session = id, ?outcome, "transcode session ended");
        }
        _ => {
            warn!(%guild, session = id, ?outcome, "transcode session failed");
        }
    }

    for done in acks {
        let _ = done.send(());
    }
    let _ = events.send(SessionEvent {
        session_id: id,
        outcome,
    });
}

/// Graceful stop sequence: close stdin, SIGTERM, then SIGKILL once the
/// grace period runs out.
async fn shutdown_child(
    child: &mut Child,
    grace: Duration,
) -> std::io::Result<std::process::ExitStatus> {
    drop(child.stdin.take());

    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // tokio only exposes SIGKILL; deliver SIGTERM directly.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        } else {
            let _ = child.start_kill();
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child.start_kill();
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            let _ = child.start_kill();
            child.wait().await
        }
    }
}

/// Map an exit status plus stderr tail onto a terminal outcome.
fn classify_exit(
    status: std::io::Result<std::process::ExitStatus>,
    stderr: &str,
) -> SessionOutcome {
    match status {
        Ok(status) if status.success() => SessionOutcome::Completed,
        Ok(status) => {
            let code = status.code();
            if is_cdn_failure(code, stderr) {
                SessionOutcome::CdnFailure {
                    detail: last_stderr_line(stderr),
                }
            } else {
                let detail = match code {
                    Some(code) => format!("exit code {}: {}", code, last_stderr_line(stderr)),
                    None => format!("terminated by signal: {}", last_stderr_line(stderr)),
                };
                SessionOutcome::DecodeFailure { detail }
            }
        }
        Err(e) => SessionOutcome::DecodeFailure {
            detail: format!("wait failed: {}", e),
        },
    }
}

fn last_stderr_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("no diagnostic output")
        .trim()
        .to_string()
}

/// Watches transcoder output activity for one session and requests a kill
/// when it goes silent past the threshold.
async fn monitor_activity(
    guild: GuildId,
    id: SessionId,
    started: Instant,
    last_activity: Arc<AtomicU64>,
    kill_tx: mpsc::Sender<KillRequest>,
    config: TranscodeConfig,
) {
    let mut tick = tokio::time::interval(config.activity_check_interval());
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick.tick().await; // first tick fires immediately

    loop {
        tick.tick().await;
        if kill_tx.is_closed() {
            // session already over
            break;
        }
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let idle_ms = elapsed_ms.saturating_sub(last_activity.load(Ordering::Relaxed));

        if idle_ms >= config.inactive_kill_ms {
            let idle_secs = idle_ms / 1000;
            warn!(%guild, session = id, idle_secs, "transcoder silent past kill threshold, terminating");
            let _ = kill_tx
                .send(KillRequest {
                    reason: KillReason::Stalled { idle_secs },
                    done: None,
                })
                .await;
            break;
        }
        if idle_ms >= config.inactive_warning_ms {
            warn!(%guild, session = id, idle_secs = idle_ms / 1000, "transcoder produced no output recently");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct NullSink {
        bytes_written: AtomicUsize,
    }

    impl NullSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                bytes_written: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TransportSink for NullSink {
        async fn write(&self, chunk: Bytes) -> std::io::Result<()> {
            self.bytes_written.fetch_add(chunk.len(), Ordering::Relaxed);
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

    fn test_config() -> TranscodeConfig {
        TranscodeConfig {
            kill_grace_ms: 200,
            activity_check_interval_ms: 50,
            inactive_warning_ms: 100,
            inactive_kill_ms: 60_000, // effectively off unless a test lowers it
            ..TranscodeConfig::default()
        }
    }

    fn test_track() -> Track {
        Track::new("t", 60, "https://cdn/x", "https://page/x", "up", "tester")
    }

    fn supervisor_with_events(
        config: TranscodeConfig,
    ) -> (FfmpegSupervisor, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (FfmpegSupervisor::new(GuildId(1), config, tx), rx)
    }

    fn shell_command(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    // ─── is_cdn_failure ──────────────────────────────────────────

    #[test]
    fn cdn_failure_signatures_match() {
        let cases = [
            "Will reconnect at 123 in 0 second(s), error=End of file.",
            "Server returned 403 Forbidden",
            "Server returned 503 Service Unavailable",
            "Connection reset by peer",
            "Connection refused",
            "Connection timed out",
            "I/O error reading from network",
            "HTTP error 404 Not Found",
        ];
        for stderr in cases {
            assert!(is_cdn_failure(Some(255), stderr), "expected match: {}", stderr);
        }
    }

    #[test]
    fn cdn_failure_requires_exit_code_255() {
        assert!(!is_cdn_failure(Some(1), "Connection reset by peer"));
        assert!(!is_cdn_failure(Some(0), "Connection reset by peer"));
        assert!(!is_cdn_failure(Some(137), "Connection reset by peer"));
        assert!(!is_cdn_failure(None, "Connection reset by peer"));
    }

    #[test]
    fn cdn_failure_requires_signature_match() {
        assert!(!is_cdn_failure(Some(255), "Invalid data found when processing input"));
        assert!(!is_cdn_failure(Some(255), "No such file or directory"));
        assert!(!is_cdn_failure(Some(255), ""));
    }

    // ─── classify_exit ───────────────────────────────────────────

    #[cfg(unix)]
    #[test]
    fn classify_exit_codes() {
        use std::os::unix::process::ExitStatusExt;
        use std::process::ExitStatus;

        assert_eq!(
            classify_exit(Ok(ExitStatus::from_raw(0)), ""),
            SessionOutcome::Completed
        );
        assert!(matches!(
            classify_exit(Ok(ExitStatus::from_raw(255 << 8)), "Connection refused"),
            SessionOutcome::CdnFailure { .. }
        ));
        assert!(matches!(
            classify_exit(Ok(ExitStatus::from_raw(1 << 8)), "Invalid data found"),
            SessionOutcome::DecodeFailure { .. }
        ));
        // terminated by a signal we did not request
        assert!(matches!(
            classify_exit(Ok(ExitStatus::from_raw(libc::SIGSEGV)), ""),
            SessionOutcome::DecodeFailure { .. }
        ));
    }

    // ─── process lifecycle ───────────────────────────────────────

    #[tokio::test]
    async fn probe_rejects_missing_tool() {
        let config = TranscodeConfig {
            tool_path: "/nonexistent/bilivox-transcoder".into(),
            ..test_config()
        };
        let (mut supervisor, _rx) = supervisor_with_events(config);
        let err = supervisor
            .start(&test_track(), NullSink::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolUnavailable(_)));
    }

    #[tokio::test]
    async fn completed_session_reports_output_and_outcome() {
        let (mut supervisor, mut rx) = supervisor_with_events(test_config());
        let sink = NullSink::new();
        let sink_dyn: Arc<dyn TransportSink> = sink.clone();
        let id = supervisor
            .spawn_session(shell_command("printf 'pcm-bytes'"), sink_dyn)
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.session_id, id);
        assert_eq!(event.outcome, SessionOutcome::Completed);
        assert!(sink.bytes_written.load(Ordering::Relaxed) > 0);
    }

    #[tokio::test]
    async fn failing_session_classified_permanent() {
        let (mut supervisor, mut rx) = supervisor_with_events(test_config());
        let id = supervisor
            .spawn_session(
                shell_command("echo 'Invalid data found when processing input' >&2; exit 1"),
                NullSink::new(),
            )
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.session_id, id);
        match event.outcome {
            SessionOutcome::DecodeFailure { detail } => {
                assert!(detail.contains("Invalid data found"), "detail: {}", detail);
            }
            other => panic!("expected DecodeFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn cdn_exit_classified_transient() {
        let (mut supervisor, mut rx) = supervisor_with_events(test_config());
        supervisor
            .spawn_session(
                shell_command("echo 'Connection reset by peer' >&2; exit 255"),
                NullSink::new(),
            )
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.outcome, SessionOutcome::CdnFailure { .. }));
    }

    #[tokio::test]
    async fn stop_kills_live_session_and_reports_stopped() {
        let (mut supervisor, mut rx) = supervisor_with_events(test_config());
        let id = supervisor
            .spawn_session(shell_command("sleep 30"), NullSink::new())
            .await
            .unwrap();

        supervisor.stop().await;
        assert_eq!(supervisor.active_session(), None);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.session_id, id);
        assert_eq!(event.outcome, SessionOutcome::Stopped);

        // idempotent
        supervisor.stop().await;
    }

    #[tokio::test]
    async fn stalled_session_is_killed_and_reported() {
        let config = TranscodeConfig {
            activity_check_interval_ms: 40,
            inactive_warning_ms: 80,
            inactive_kill_ms: 160,
            kill_grace_ms: 200,
            ..TranscodeConfig::default()
        };
        let (mut supervisor, mut rx) = supervisor_with_events(config);
        // produces no stdout at all
        supervisor
            .spawn_session(shell_command("sleep 30"), NullSink::new())
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(15), rx.recv())
            .await
            .expect("stall detection timed out")
            .unwrap();
        assert!(matches!(event.outcome, SessionOutcome::Stalled { .. }));
    }

    #[tokio::test]
    async fn second_session_survives_first_sessions_delayed_kill() {
        let (mut supervisor, mut rx) = supervisor_with_events(test_config());

        // Session A: a long-running child we stop, which schedules its
        // SIGTERM/SIGKILL sequence.
        let id_a = supervisor
            .spawn_session(shell_command("sleep 30"), NullSink::new())
            .await
            .unwrap();
        supervisor.stop().await;

        // Session B starts immediately afterwards.
        let id_b = supervisor
            .spawn_session(shell_command("sleep 1; printf done"), NullSink::new())
            .await
            .unwrap();
        assert_ne!(id_a, id_b);

        // Wait well past A's grace period: B must terminate on its own
        // terms (Completed), never via a kill meant for A.
        let stopped = rx.recv().await.unwrap();
        assert_eq!(stopped.session_id, id_a);
        assert_eq!(stopped.outcome, SessionOutcome::Stopped);

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("session B never finished")
            .unwrap();
        assert_eq!(event.session_id, id_b);
        assert_eq!(event.outcome, SessionOutcome::Completed);
    }

    #[tokio::test]
    async fn start_replaces_live_session_before_spawning() {
        let (mut supervisor, mut rx) = supervisor_with_events(test_config());
        let id_a = supervisor
            .start_with_command(shell_command("sleep 30"), NullSink::new())
            .await
            .unwrap();
        let id_b = supervisor
            .start_with_command(shell_command("sleep 30"), NullSink::new())
            .await
            .unwrap();
        assert_ne!(id_a, id_b);
        assert_eq!(supervisor.active_session(), Some(id_b));

        // A was already fully torn down before B spawned.
        let event = rx.recv().await.unwrap();
        assert_eq!(event.session_id, id_a);
        assert_eq!(event.outcome, SessionOutcome::Stopped);

        supervisor.stop().await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.session_id, id_b);
        assert_eq!(event.outcome, SessionOutcome::Stopped);
    }

    #[test]
    fn build_args_template_is_fixed() {
        let (supervisor, _rx) = supervisor_with_events(TranscodeConfig::default());
        let args = supervisor.build_args("https://cdn.example/stream.m4s");
        assert!(args.contains(&"-user_agent".to_string()));
        assert!(args.contains(&"https://cdn.example/stream.m4s".to_string()));
        assert!(args.contains(&"s16le".to_string()));
        assert!(args.contains(&"48000".to_string()));
        assert_eq!(args.last().unwrap(), "pipe:1");
    }
}
