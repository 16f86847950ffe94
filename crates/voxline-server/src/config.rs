//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;
use voxline_pipeline::{RetryConfig, StageTimeouts};
use voxline_voice::{ChatConfig, SttConfig, TtsConfig};

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Media storage directories.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Speech-to-text backend.
    #[serde(default)]
    pub stt: SttConfig,

    /// Conversation responder backend.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Text-to-speech backend.
    #[serde(default)]
    pub tts: TtsConfig,

    /// Pipeline tuning: timeouts, retries, history bound.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Usage gate collaborator.
    #[serde(default)]
    pub usage: UsageConfig,

    /// Analytics sink collaborator.
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Media storage directories, created and probed at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory for inbound raw recordings (removed after use).
    #[serde(default = "default_recordings_dir")]
    pub recordings_dir: String,

    /// Directory for synthesized replies (retained for delivery).
    #[serde(default = "default_replies_dir")]
    pub replies_dir: String,
}

/// Pipeline tuning knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Conversation turns kept per caller.
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,

    /// Cap on a downloaded recording in bytes.
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: u64,

    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    #[serde(default = "default_transcribe_timeout_secs")]
    pub transcribe_timeout_secs: u64,

    #[serde(default = "default_respond_timeout_secs")]
    pub respond_timeout_secs: u64,

    #[serde(default = "default_synthesize_timeout_secs")]
    pub synthesize_timeout_secs: u64,

    /// Additional attempts after the first failure of download/STT/TTS.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl PipelineConfig {
    pub fn timeouts(&self) -> StageTimeouts {
        StageTimeouts {
            download: Duration::from_secs(self.download_timeout_secs),
            transcribe: Duration::from_secs(self.transcribe_timeout_secs),
            respond: Duration::from_secs(self.respond_timeout_secs),
            synthesize: Duration::from_secs(self.synthesize_timeout_secs),
        }
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            ..RetryConfig::default()
        }
    }
}

/// Usage gate endpoint. When unset, every call is allowed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageConfig {
    #[serde(default)]
    pub url: Option<String>,
}

/// Analytics sink endpoint. When unset, completed calls are not reported.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub url: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "voxline_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_recordings_dir() -> String {
    "media/recordings".to_string()
}

fn default_replies_dir() -> String {
    "media/replies".to_string()
}

fn default_max_history_turns() -> usize {
    10
}

fn default_max_download_bytes() -> u64 {
    voxline_pipeline::fetcher::DEFAULT_MAX_DOWNLOAD_BYTES
}

fn default_download_timeout_secs() -> u64 {
    30
}

fn default_transcribe_timeout_secs() -> u64 {
    60
}

fn default_respond_timeout_secs() -> u64 {
    30
}

fn default_synthesize_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    250
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            recordings_dir: default_recordings_dir(),
            replies_dir: default_replies_dir(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_history_turns: default_max_history_turns(),
            max_download_bytes: default_max_download_bytes(),
            download_timeout_secs: default_download_timeout_secs(),
            transcribe_timeout_secs: default_transcribe_timeout_secs(),
            respond_timeout_secs: default_respond_timeout_secs(),
            synthesize_timeout_secs: default_synthesize_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `VOXLINE_HOST` overrides `server.host`
/// - `VOXLINE_PORT` overrides `server.port`
/// - `VOXLINE_RECORDINGS_DIR` / `VOXLINE_REPLIES_DIR` override `storage.*`
/// - `VOXLINE_STT_API_KEY` / `VOXLINE_CHAT_API_KEY` / `VOXLINE_TTS_API_KEY`
///   override the backend API keys (keys should not live in the config file)
/// - `VOXLINE_USAGE_URL` overrides `usage.url`
/// - `VOXLINE_ANALYTICS_URL` overrides `analytics.url`
/// - `VOXLINE_LOG_LEVEL` overrides `logging.level`
/// - `VOXLINE_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("VOXLINE_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("VOXLINE_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(dir) = std::env::var("VOXLINE_RECORDINGS_DIR") {
        config.storage.recordings_dir = dir;
    }
    if let Ok(dir) = std::env::var("VOXLINE_REPLIES_DIR") {
        config.storage.replies_dir = dir;
    }
    if let Ok(key) = std::env::var("VOXLINE_STT_API_KEY") {
        config.stt.api_key = key;
    }
    if let Ok(key) = std::env::var("VOXLINE_CHAT_API_KEY") {
        config.chat.api_key = key;
    }
    if let Ok(key) = std::env::var("VOXLINE_TTS_API_KEY") {
        config.tts.api_key = key;
    }
    if let Ok(url) = std::env::var("VOXLINE_USAGE_URL") {
        config.usage.url = Some(url);
    }
    if let Ok(url) = std::env::var("VOXLINE_ANALYTICS_URL") {
        config.analytics.url = Some(url);
    }
    if let Ok(level) = std::env::var("VOXLINE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("VOXLINE_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}
