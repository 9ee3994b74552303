//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Token authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Realtime pipeline settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
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

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Busy timeout for SQLite connections, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "pulse_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Token authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret string the token HMAC key is derived from.
    #[serde(default = "default_token_secret")]
    pub token_secret: String,

    /// Token time-to-live in seconds.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

/// Realtime pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Threshold above which a measurement is classified anomalous.
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f64,

    /// Seconds between generator ticks.
    #[serde(default = "default_generator_interval_secs")]
    pub generator_interval_secs: u64,

    /// Seconds between flush cycles.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Maximum number of events held in the in-memory buffer.
    #[serde(default = "default_buffer_max_size")]
    pub buffer_max_size: usize,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8000
}

fn default_db_path() -> String {
    "pulse.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_token_secret() -> String {
    "change_this_secret_in_production".to_string()
}

fn default_token_ttl_secs() -> u64 {
    3_600
}

fn default_alert_threshold() -> f64 {
    80.0
}

fn default_generator_interval_secs() -> u64 {
    1
}

fn default_flush_interval_secs() -> u64 {
    5
}

fn default_buffer_max_size() -> usize {
    10_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
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

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: default_token_secret(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            alert_threshold: default_alert_threshold(),
            generator_interval_secs: default_generator_interval_secs(),
            flush_interval_secs: default_flush_interval_secs(),
            buffer_max_size: default_buffer_max_size(),
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
/// - `PULSE_HOST` overrides `server.host`
/// - `PULSE_PORT` overrides `server.port`
/// - `PULSE_DB_PATH` overrides `database.path`
/// - `PULSE_LOG_LEVEL` overrides `logging.level`
/// - `PULSE_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `PULSE_TOKEN_SECRET` overrides `auth.token_secret`
/// - `PULSE_ALERT_THRESHOLD` overrides `realtime.alert_threshold`
/// - `PULSE_GENERATOR_INTERVAL_SECS` overrides `realtime.generator_interval_secs`
/// - `PULSE_FLUSH_INTERVAL_SECS` overrides `realtime.flush_interval_secs`
/// - `PULSE_BUFFER_MAX_SIZE` overrides `realtime.buffer_max_size`
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
    if let Ok(host) = std::env::var("PULSE_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("PULSE_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("PULSE_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("PULSE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("PULSE_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(secret) = std::env::var("PULSE_TOKEN_SECRET") {
        config.auth.token_secret = secret;
    }
    if let Ok(threshold) = std::env::var("PULSE_ALERT_THRESHOLD") {
        if let Ok(parsed) = threshold.parse() {
            config.realtime.alert_threshold = parsed;
        }
    }
    if let Ok(interval) = std::env::var("PULSE_GENERATOR_INTERVAL_SECS") {
        if let Ok(parsed) = interval.parse() {
            config.realtime.generator_interval_secs = parsed;
        }
    }
    if let Ok(interval) = std::env::var("PULSE_FLUSH_INTERVAL_SECS") {
        if let Ok(parsed) = interval.parse() {
            config.realtime.flush_interval_secs = parsed;
        }
    }
    if let Ok(size) = std::env::var("PULSE_BUFFER_MAX_SIZE") {
        if let Ok(parsed) = size.parse() {
            config.realtime.buffer_max_size = parsed;
        }
    }

    Ok(config)
}
