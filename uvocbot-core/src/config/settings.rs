//! Settings configuration loaded from TOML files.
//!
//! This module handles non-sensitive configuration stored in TOML format
//! in the XDG config directory (~/.config/uvocbot/config.toml).

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default TOML configuration file content
const DEFAULT_CONFIG_TOML: &str = r#"# UVOCBot configuration file
# Located at: ~/.config/uvocbot/config.toml
#
# This file contains non-sensitive configuration.
# Secrets are loaded from environment variables:
#   - DISCORD_BOT_TOKEN
#   - CENSUS_SERVICE_ID

[gateway]
host = "127.0.0.1"
port = 3000

[discord]
enabled = true

[logging]
level = "info"

[database]
# path = "/var/lib/uvocbot/settings.sqlite3"

[census]
base_url = "https://census.daybreakgames.com"
streaming_url = "wss://push.planetside2.com/streaming"
timeout_seconds = 15
min_interval_ms = 200
cache_ttl_minutes = 60
failure_threshold = 3
cooldown_seconds = 30
stream_enabled = true
reconnect_seconds = 10

[population]
providers = ["honu", "fisu"]
honu_url = "https://wt.honu.pw"
fisu_url = "https://ps2.fisu.pw"
timeout_seconds = 10
cache_ttl_seconds = 60

[facility_capture]
enabled = true
pacing_ms = 100
breaker_backoff_seconds = 15
"#;

/// Settings loaded from TOML configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    /// HTTP API server configuration
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Discord bot configuration
    #[serde(default)]
    pub discord: DiscordSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Settings database location
    #[serde(default)]
    pub database: DatabaseSettings,

    /// Census REST and streaming API
    #[serde(default)]
    pub census: CensusSettings,

    /// Population aggregators
    #[serde(default)]
    pub population: PopulationSettings,

    /// Facility capture resolution loop
    #[serde(default)]
    pub facility_capture: FacilityCaptureSettings,
}

/// HTTP API server settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewaySettings {
    /// Host to bind to
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

/// Discord bot settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscordSettings {
    /// Whether Discord bot is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Database settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatabaseSettings {
    /// Override for the settings database file (defaults to the XDG data dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Census API settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CensusSettings {
    /// REST endpoint root
    #[serde(default = "default_census_base_url")]
    pub base_url: String,

    /// Event streaming websocket endpoint
    #[serde(default = "default_census_streaming_url")]
    pub streaming_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_census_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Minimum interval between REST requests in milliseconds
    #[serde(default = "default_census_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Cache TTL in minutes for static data (map regions, outfits)
    #[serde(default = "default_census_cache_ttl_minutes")]
    pub cache_ttl_minutes: u64,

    /// Consecutive failures before the circuit breaker opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds the breaker stays open after server errors
    #[serde(default = "default_census_cooldown_seconds")]
    pub cooldown_seconds: u64,

    /// Whether to subscribe to the event stream
    #[serde(default = "default_true")]
    pub stream_enabled: bool,

    /// Delay before reconnecting a dropped stream, in seconds
    #[serde(default = "default_census_reconnect_seconds")]
    pub reconnect_seconds: u64,
}

/// Population aggregator settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PopulationSettings {
    /// Providers to try, in order ("honu", "fisu")
    #[serde(default = "default_population_providers")]
    pub providers: Vec<String>,

    /// honu base URL
    #[serde(default = "default_honu_url")]
    pub honu_url: String,

    /// fisu base URL
    #[serde(default = "default_fisu_url")]
    pub fisu_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_population_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Cache TTL in seconds
    #[serde(default = "default_population_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
}

/// Facility capture loop settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FacilityCaptureSettings {
    /// Whether capture notifications are resolved and posted
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum time per processed item in milliseconds
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Wait before requeueing when the Census breaker is open, in seconds
    #[serde(default = "default_breaker_backoff_seconds")]
    pub breaker_backoff_seconds: u64,
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_census_base_url() -> String {
    "https://census.daybreakgames.com".to_string()
}

fn default_census_streaming_url() -> String {
    "wss://push.planetside2.com/streaming".to_string()
}

fn default_census_timeout_seconds() -> u64 {
    15
}

fn default_census_min_interval_ms() -> u64 {
    200
}

fn default_census_cache_ttl_minutes() -> u64 {
    60
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_census_cooldown_seconds() -> u64 {
    30
}

fn default_census_reconnect_seconds() -> u64 {
    10
}

fn default_population_providers() -> Vec<String> {
    vec!["honu".to_string(), "fisu".to_string()]
}

fn default_honu_url() -> String {
    "https://wt.honu.pw".to_string()
}

fn default_fisu_url() -> String {
    "https://ps2.fisu.pw".to_string()
}

fn default_population_timeout_seconds() -> u64 {
    10
}

fn default_population_cache_ttl_seconds() -> u64 {
    60
}

fn default_pacing_ms() -> u64 {
    100
}

fn default_breaker_backoff_seconds() -> u64 {
    15
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

impl Default for DiscordSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for CensusSettings {
    fn default() -> Self {
        Self {
            base_url: default_census_base_url(),
            streaming_url: default_census_streaming_url(),
            timeout_seconds: default_census_timeout_seconds(),
            min_interval_ms: default_census_min_interval_ms(),
            cache_ttl_minutes: default_census_cache_ttl_minutes(),
            failure_threshold: default_failure_threshold(),
            cooldown_seconds: default_census_cooldown_seconds(),
            stream_enabled: default_true(),
            reconnect_seconds: default_census_reconnect_seconds(),
        }
    }
}

impl Default for PopulationSettings {
    fn default() -> Self {
        Self {
            providers: default_population_providers(),
            honu_url: default_honu_url(),
            fisu_url: default_fisu_url(),
            timeout_seconds: default_population_timeout_seconds(),
            cache_ttl_seconds: default_population_cache_ttl_seconds(),
        }
    }
}

impl Default for FacilityCaptureSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            pacing_ms: default_pacing_ms(),
            breaker_backoff_seconds: default_breaker_backoff_seconds(),
        }
    }
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,
}

impl Settings {
    /// Load settings from the TOML configuration file.
    ///
    /// If the config file doesn't exist, creates it with default values.
    pub fn load() -> Result<Self, SettingsError> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!("Creating default configuration at {:?}", config_path);
            Self::create_default_config(&config_path)?;
        }

        let content = fs::read_to_string(&config_path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        Ok(settings)
    }

    /// Serialize settings to TOML content.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get the configuration file path.
    ///
    /// Uses `UVOCBOT_CONFIG_DIR` when set, otherwise `~/.config/uvocbot/config.toml`.
    pub fn config_path() -> Result<PathBuf, SettingsError> {
        if let Ok(override_dir) = std::env::var("UVOCBOT_CONFIG_DIR") {
            let dir = PathBuf::from(override_dir);
            return Ok(dir.join("config.toml"));
        }

        let config_dir = dirs::config_dir()
            .ok_or(SettingsError::ConfigDirNotFound)?
            .join("uvocbot");

        Ok(config_dir.join("config.toml"))
    }

    fn create_default_config(path: &PathBuf) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, DEFAULT_CONFIG_TOML)?;

        Ok(())
    }

    /// Save settings to a specific file path.
    pub fn save_to_path(&self, path: &PathBuf) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = self.to_toml()?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the HTTP bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }
}
