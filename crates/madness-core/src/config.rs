//! Configuration loading and typed config structures for the bot.
//!
//! The configuration lives in `madness-config.yaml` next to the binary.
//! Every field has a default, so an empty or missing file yields a
//! working (if notification-less) bot. Secrets are normally supplied via
//! environment variables rather than the YAML file.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but makes no sense.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level bot configuration, mirroring `madness-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BotConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Deduplication window and sweep cadence.
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Engine behavior toggles.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Snapshot storage.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Discord delivery.
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BotConfig {
    /// Load configuration from a YAML file and apply environment
    /// overrides.
    ///
    /// Environment variables:
    /// - `PORT` overrides `server.port`
    /// - `DISCORD_BOT_TOKEN` overrides `discord.bot_token`
    /// - `DISCORD_CHANNEL_ID` overrides `discord.channel_id`
    /// - `MADNESS_DATA_DIR` overrides `storage.data_dir`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string (no environment overrides).
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("PORT") {
            self.server.port = val.trim().parse().map_err(|e| ConfigError::Invalid {
                reason: format!("PORT={val:?} is not a port number: {e}"),
            })?;
        }
        if let Ok(val) = std::env::var("DISCORD_BOT_TOKEN") {
            self.discord.bot_token = Some(val);
        }
        if let Ok(val) = std::env::var("DISCORD_CHANNEL_ID") {
            self.discord.channel_id = Some(val);
        }
        if let Ok(val) = std::env::var("MADNESS_DATA_DIR") {
            self.storage.data_dir = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.dedup.window_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "dedup.window_secs must be at least 1".to_owned(),
            });
        }
        if self.dedup.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "dedup.sweep_interval_secs must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Deduplication settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DedupConfig {
    /// Identical events within this many seconds collapse to one.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// How often stale keys are swept.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Keys older than this are evicted by the sweep.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl DedupConfig {
    /// The dedup window.
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// The sweep interval.
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// The retention period, never shorter than the window.
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs.max(self.window_secs))
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            retention_secs: default_retention_secs(),
        }
    }
}

/// Engine behavior toggles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Start with clan-only mode enabled (when no saved state says
    /// otherwise).
    #[serde(default)]
    pub clan_only_mode: bool,

    /// Add the reporting account of every admitted event to the clan
    /// roster. Off unless explicitly enabled.
    #[serde(default)]
    pub auto_register_reporters: bool,
}

/// Snapshot storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the JSON documents.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Upper bound on a single write, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl StorageConfig {
    /// The write timeout.
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Discord delivery settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiscordConfig {
    /// Bot token. Without it notifications are only logged.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Channel receiving the embeds.
    #[serde(default)]
    pub channel_id: Option<String>,

    /// Discord REST API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Upper bound on a single send, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Directory with `*.j2` files overriding the built-in message
    /// templates.
    #[serde(default)]
    pub templates_dir: Option<String>,
}

impl DiscordConfig {
    /// The send timeout.
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Token and channel, if both are configured and non-blank.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let token = self.bot_token.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        let channel = self.channel_id.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
        Some((token, channel))
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            channel_id: None,
            api_base: default_api_base(),
            timeout_ms: default_timeout_ms(),
            templates_dir: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    3000
}

const fn default_window_secs() -> u64 {
    10
}

const fn default_sweep_interval_secs() -> u64 {
    30
}

const fn default_retention_secs() -> u64 {
    20
}

fn default_data_dir() -> String {
    "data".to_owned()
}

const fn default_timeout_ms() -> u64 {
    5_000
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}
