//! Configuration management for bilivox
//!
//! Bootstrap configuration is a TOML file with built-in defaults for every
//! setting; a missing file yields a fully defaulted configuration. A small
//! set of environment variables override the file for deploy-time tweaks.
//!
//! # Settings sources priority
//!
//! 1. Environment variables (`BILIVOX_*`)
//! 2. TOML configuration file
//! 3. Built-in defaults (code constants)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::track::LoopMode;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub playback: PlaybackConfig,
    pub transcode: TranscodeConfig,
    pub progress: ProgressConfig,
    pub logging: LoggingConfig,
}

/// Playback engine policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Loop mode applied to newly created players. Repeat-one is the
    /// shipped default, kept configurable rather than baked in.
    pub default_loop_mode: LoopMode,

    /// Maximum queued tracks per guild
    pub max_queue_size: usize,

    /// Playback-anomaly retries per track before it is skipped
    pub max_track_retries: u32,

    /// Delay before retrying a track after an anomaly (ms)
    pub retry_delay_ms: u64,

    /// Minimum wall-clock playback time for a track end to count as genuine (s)
    pub min_genuine_play_secs: u64,

    /// A track ending within this many seconds of its full duration is
    /// genuine regardless of elapsed time (s)
    pub end_tolerance_secs: u64,

    /// Window within which a repeated command for the same guild/action is
    /// dropped as a duplicate (ms)
    pub command_debounce_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_loop_mode: LoopMode::Track,
            max_queue_size: 50,
            max_track_retries: 2,
            retry_delay_ms: 2_000,
            min_genuine_play_secs: 3,
            end_tolerance_secs: 2,
            command_debounce_ms: 400,
        }
    }
}

impl PlaybackConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.command_debounce_ms)
    }
}

/// Transcode subprocess settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Decode tool binary; resolved through PATH unless absolute
    pub tool_path: String,

    /// User-agent header passed to the tool; the upstream CDN rejects
    /// requests without a browser-like value
    pub user_agent: String,

    /// Referer header required by the upstream CDN
    pub referer: String,

    /// Output sample rate expected by the transport sink (Hz)
    pub sample_rate: u32,

    /// Output channel count expected by the transport sink
    pub channels: u8,

    /// How often the activity monitor samples transcoder output (ms)
    pub activity_check_interval_ms: u64,

    /// Output silence that triggers a warning log (ms)
    pub inactive_warning_ms: u64,

    /// Output silence that triggers a kill and a stalled-stream failure (ms)
    pub inactive_kill_ms: u64,

    /// Grace period between SIGTERM and SIGKILL during teardown (ms)
    pub kill_grace_ms: u64,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            tool_path: "ffmpeg".to_string(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            referer: "https://www.bilibili.com/".to_string(),
            sample_rate: 48_000,
            channels: 2,
            activity_check_interval_ms: 10_000,
            inactive_warning_ms: 30_000,
            inactive_kill_ms: 60_000,
            kill_grace_ms: 3_000,
        }
    }
}

impl TranscodeConfig {
    pub fn activity_check_interval(&self) -> Duration {
        Duration::from_millis(self.activity_check_interval_ms)
    }

    pub fn inactive_warning(&self) -> Duration {
        Duration::from_millis(self.inactive_warning_ms)
    }

    pub fn inactive_kill(&self) -> Duration {
        Duration::from_millis(self.inactive_kill_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

/// Progress coalescer settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Interval between progress renders while playing (ms)
    pub update_interval_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 1_000,
        }
    }
}

impl ProgressConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl AppConfig {
    /// Load configuration: TOML file (if given), then environment
    /// overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                toml::from_str(&text)
                    .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))?
            }
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("BILIVOX_TOOL_PATH") {
            self.transcode.tool_path = v;
        }
        if let Ok(v) = std::env::var("BILIVOX_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("BILIVOX_MAX_QUEUE_SIZE") {
            match v.parse() {
                Ok(n) => self.playback.max_queue_size = n,
                Err(_) => warn!("ignoring non-numeric BILIVOX_MAX_QUEUE_SIZE={}", v),
            }
        }
        if let Ok(v) = std::env::var("BILIVOX_DEFAULT_LOOP_MODE") {
            match LoopMode::from_name(&v) {
                Some(mode) => self.playback.default_loop_mode = mode,
                None => warn!("ignoring unknown BILIVOX_DEFAULT_LOOP_MODE={}", v),
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.transcode.tool_path.is_empty() {
            return Err(Error::Config("transcode.tool_path must not be empty".into()));
        }
        if self.transcode.inactive_kill_ms <= self.transcode.inactive_warning_ms {
            return Err(Error::Config(
                "transcode.inactive_kill_ms must exceed inactive_warning_ms".into(),
            ));
        }
        if self.transcode.activity_check_interval_ms == 0
            || self.progress.update_interval_ms == 0
        {
            return Err(Error::Config("intervals must be non-zero".into()));
        }
        if self.playback.max_queue_size == 0 {
            return Err(Error::Config("playback.max_queue_size must be non-zero".into()));
        }
        Ok(())
    }
}

/// Initialize tracing from the logging configuration.
///
/// Falls back to the `RUST_LOG` environment variable when set.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.level.clone()));

    let registry = tracing_subscriber::registry().with(filter);
    match &config.file {
        Some(path) => {
            match std::fs::OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => {
                    let writer = std::sync::Arc::new(file);
                    registry
                        .with(
                            tracing_subscriber::fmt::layer()
                                .with_writer(writer)
                                .with_ansi(false),
                        )
                        .init();
                }
                Err(e) => {
                    registry.with(tracing_subscriber::fmt::layer()).init();
                    warn!("cannot open log file {}: {}, logging to stderr", path.display(), e);
                }
            }
        }
        None => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }
}
