use crate::error::config::ConfigError;
use crate::{DEFAULT_API_BASE_URL, DEFAULT_WS_PATH};

use common::ErrorLocation;

use std::env;
use std::panic::Location;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use url::Url;

const CONFIG_FILE_NAME: &str = "realtime.json";
const CONFIG_DIR_NAME: &str = "realtime-console";
const CONFIG_VERSION: u32 = 1;

/// Overrides `api.base_url`.
pub const ENV_API_URL: &str = "REALTIME_API_URL";
/// Overrides `realtime.enabled` (`true`/`false`/`1`/`0`).
pub const ENV_ENABLED: &str = "REALTIME_ENABLED";

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSection {
    /// Initial value of the gate's enabled flag.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_incoming_ms: u64,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_outgoing_ms: u64,
}

impl Default for RealtimeSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            ws_path: default_ws_path(),
            topics: default_topics(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            heartbeat_incoming_ms: default_heartbeat_ms(),
            heartbeat_outgoing_ms: default_heartbeat_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub realtime: RealtimeSection,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api: ApiConfig::default(),
            realtime: RealtimeSection::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}
fn default_enabled() -> bool {
    true
}
fn default_ws_path() -> String {
    DEFAULT_WS_PATH.to_string()
}
fn default_topics() -> Vec<String> {
    vec![
        "/topic/subshipment-status".to_string(),
        "/topic/status-updates".to_string(),
    ]
}
fn default_reconnect_delay_ms() -> u64 {
    3000
}
fn default_max_reconnect_attempts() -> u32 {
    5
}
fn default_heartbeat_ms() -> u64 {
    4000
}

// ============================================
// IMPLEMENTATION
// ============================================

impl RealtimeConfig {
    /// Platform config directory for the console (`~/.config/realtime-console` on Linux).
    #[track_caller]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME))
            .ok_or_else(|| ConfigError::DirectoryNotFound {
                location: ErrorLocation::from(Location::caller()),
                path: PathBuf::from(CONFIG_DIR_NAME),
            })
    }

    /// Load config from {config_dir}/realtime.json.
    ///
    /// # Returns
    ///
    /// Returns defaults if the file is missing.
    /// Returns `Err(ConfigError)` if the file exists but is corrupted or invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: RealtimeConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/realtime.json using atomic write.
    ///
    /// Uses temp file + rename for atomicity (no corruption on crash).
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        // Atomic rename (POSIX guarantees atomicity)
        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Apply `.env` and process environment overrides, then re-validate.
    ///
    /// A missing `.env` file is not an error.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => debug!("No .env file found"),
            Err(e) => warn!("Ignoring unreadable .env file: {e}"),
        }

        if let Ok(url) = env::var(ENV_API_URL) {
            info!("Using API base URL from {ENV_API_URL}: {url}");
            self.api.base_url = url;
        }

        if let Ok(raw) = env::var(ENV_ENABLED) {
            self.realtime.enabled = parse_flag(&raw).ok_or_else(|| {
                ConfigError::env_override(ENV_ENABLED, format!("expected true/false/1/0, got '{raw}'"))
            })?;
            info!("Realtime enabled from {ENV_ENABLED}: {}", self.realtime.enabled);
        }

        self.validate()
    }

    /// Validate config values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::validation(format!(
                "Invalid version: {} (expected 1-{})",
                self.version, CONFIG_VERSION
            )));
        }

        let url = Url::parse(&self.api.base_url).map_err(|e| {
            ConfigError::validation(format!("Invalid api.base_url '{}': {e}", self.api.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::validation(format!(
                "api.base_url must be http(s): {}",
                self.api.base_url
            )));
        }

        if !self.realtime.ws_path.starts_with('/') {
            return Err(ConfigError::validation(format!(
                "realtime.ws_path must start with '/': {}",
                self.realtime.ws_path
            )));
        }

        if self.realtime.topics.is_empty() {
            return Err(ConfigError::validation("realtime.topics must not be empty"));
        }
        if let Some(topic) = self
            .realtime
            .topics
            .iter()
            .find(|topic| topic.trim().is_empty())
        {
            return Err(ConfigError::validation(format!(
                "realtime.topics contains an empty destination: '{topic}'"
            )));
        }

        if self.realtime.reconnect_delay_ms == 0 {
            return Err(ConfigError::validation(
                "realtime.reconnect_delay_ms must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
