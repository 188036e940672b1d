//! Configuration module for PlcWatch-RS
//!
//! This module handles client configuration including:
//! - The connection target and acquisition parameters for a monitoring run
//! - Timeout classes and watchdog cadence ([`settings`])
//! - Application state persistence (recently used connection targets)
//!
//! # App Data Location
//!
//! Application data is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/dev.hxyulin.plcwatch-rs/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.plcwatch-rs/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.plcwatch-rs\`
//!
//! # Files
//!
//! - `app_state.json` - Recently used connection targets
//! - `logs/` - Rolling log files when file logging is enabled
//! - Config files (`.toml` or `.json`) - Saved wherever the user chooses
//!
//! # Example
//!
//! ```ignore
//! use plcwatch_rs::config::{AppConfig, AppState};
//!
//! let config = AppConfig::load("plant.toml")?;
//!
//! let mut state = AppState::load_or_default();
//! state.add_recent_target(&config.connection.target());
//! state.save()?;
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{PlcWatchError, Result};
use crate::types::{AcquisitionParams, ConnectionTarget};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.hxyulin.plcwatch-rs";

/// App state filename
pub const APP_STATE_FILE: &str = "app_state.json";

/// Maximum number of recent connection targets to remember
pub const MAX_RECENT_TARGETS: usize = 10;

/// Default service loop period in milliseconds
pub const DEFAULT_REFRESH_RATE_MS: u64 = 1_000;

/// Default trend window in milliseconds
pub const DEFAULT_DURATION_MS: u64 = 60_000;

/// Default acquisition service endpoint
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:5000/events";

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        PlcWatchError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            PlcWatchError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the app state file
pub fn app_state_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(APP_STATE_FILE))
}

// ==================== App Config ====================

/// Client configuration for one monitoring setup
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// Where the acquisition service and PLC live
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Tags and stream parameters
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Timeout classes and watchdog
    #[serde(default)]
    pub session: SessionSettings,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config file; `.json` is parsed as JSON, anything else as TOML
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlcWatchError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = if is_json(path) {
            serde_json::from_str(&content).map_err(|e| {
                PlcWatchError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        } else {
            toml::from_str(&content).map_err(|e| {
                PlcWatchError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save the config; the format follows the file extension like [`AppConfig::load`]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    PlcWatchError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = if is_json(path) {
            serde_json::to_string_pretty(self)
                .map_err(|e| PlcWatchError::Config(format!("Failed to serialize config: {}", e)))?
        } else {
            toml::to_string_pretty(self)
                .map_err(|e| PlcWatchError::Config(format!("Failed to serialize config: {}", e)))?
        };

        std::fs::write(path, content).map_err(|e| {
            PlcWatchError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Reject values the session cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.acquisition.refresh_rate_ms == 0 {
            return Err(PlcWatchError::Config(
                "refresh_rate_ms must be greater than zero".to_string(),
            ));
        }
        let timeouts = &self.session.timeouts;
        for (field, value) in [
            ("session.timeouts.short_ms", timeouts.short_ms),
            ("session.timeouts.medium_ms", timeouts.medium_ms),
            ("session.timeouts.long_ms", timeouts.long_ms),
            ("session.watchdog.interval_ms", self.session.watchdog.interval_ms),
        ] {
            if value == 0 || value > MAX_DURATION_MS {
                return Err(PlcWatchError::Config(format!(
                    "{} must be between 1 and {}, got {}",
                    field, MAX_DURATION_MS, value
                )));
            }
        }
        Ok(())
    }
}

/// Largest accepted timeout or interval, keeps deadline arithmetic on `i64` clear of overflow
pub const MAX_DURATION_MS: u64 = i64::MAX as u64 / 2;

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

// ==================== Connection Config ====================

/// Acquisition service endpoint and PLC address
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionConfig {
    /// WebSocket URL of the acquisition service
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// PLC IP address
    #[serde(default)]
    pub host: String,

    /// Controller slot
    #[serde(default = "default_slot")]
    pub slot: String,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_slot() -> String {
    "0".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            host: String::new(),
            slot: default_slot(),
        }
    }
}

impl ConnectionConfig {
    /// Connection target described by this config
    pub fn target(&self) -> ConnectionTarget {
        ConnectionTarget::new(self.host.clone(), self.slot.clone())
    }
}

// ==================== Acquisition Config ====================

/// Tags to watch and how often
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcquisitionConfig {
    /// Service loop period in milliseconds
    #[serde(default = "default_refresh_rate")]
    pub refresh_rate_ms: u64,

    /// Trend window in milliseconds
    #[serde(default = "default_duration")]
    pub duration_ms: u64,

    /// Ordered tag names
    #[serde(default)]
    pub tags: Vec<String>,

    /// Trend history or latest value only
    #[serde(default)]
    pub sink: SinkMode,
}

fn default_refresh_rate() -> u64 {
    DEFAULT_REFRESH_RATE_MS
}

fn default_duration() -> u64 {
    DEFAULT_DURATION_MS
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            refresh_rate_ms: DEFAULT_REFRESH_RATE_MS,
            duration_ms: DEFAULT_DURATION_MS,
            tags: Vec::new(),
            sink: SinkMode::default(),
        }
    }
}

impl AcquisitionConfig {
    /// Stream parameters for a start command
    pub fn params(&self) -> AcquisitionParams {
        AcquisitionParams::new(self.refresh_rate_ms, self.duration_ms)
    }
}

// ==================== Logging Config ====================

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LoggingConfig {
    /// Also write logs to a daily rolling file
    #[serde(default)]
    pub log_to_file: bool,

    /// Directory for log files (defaults to `<app data>/logs`)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// `EnvFilter` directive used when `RUST_LOG` is not set
    #[serde(default)]
    pub filter: Option<String>,
}

impl LoggingConfig {
    /// Directory log files go to, if one can be determined
    pub fn resolved_log_dir(&self) -> Option<PathBuf> {
        self.log_dir
            .clone()
            .or_else(|| app_data_dir().map(|p| p.join("logs")))
    }
}

// ==================== App State ====================

/// A connection target used before
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecentTarget {
    pub host: String,
    pub slot: String,
    /// Last used timestamp (Unix seconds)
    pub last_used: i64,
}

impl RecentTarget {
    /// Create a new recent entry stamped with the current time
    pub fn new(target: &ConnectionTarget) -> Self {
        Self {
            host: target.host.clone(),
            slot: target.slot.clone(),
            last_used: chrono::Utc::now().timestamp(),
        }
    }

    /// The target this entry describes
    pub fn target(&self) -> ConnectionTarget {
        ConnectionTarget::new(self.host.clone(), self.slot.clone())
    }
}

/// Persistent application state
///
/// Stores history that persists across runs, separate from config files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppState {
    /// Version for future migration support
    #[serde(default = "default_app_state_version")]
    pub version: u32,

    /// Recently used connection targets, most recent first
    #[serde(default)]
    pub recent_targets: Vec<RecentTarget>,
}

fn default_app_state_version() -> u32 {
    1
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            version: 1,
            recent_targets: Vec::new(),
        }
    }
}

impl AppState {
    /// Load app state from the default location
    pub fn load() -> Result<Self> {
        let path = app_state_path().ok_or_else(|| {
            PlcWatchError::Config("Could not determine app state path".to_string())
        })?;
        Self::load_from(&path)
    }

    /// Load app state from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| PlcWatchError::Config(format!("Failed to read app state: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| PlcWatchError::Config(format!("Failed to parse app state: {}", e)))
    }

    /// Load app state, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load app state, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save app state to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_app_data_dir()?;
        self.save_to(&dir.join(APP_STATE_FILE))
    }

    /// Save app state to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            PlcWatchError::Config(format!("Failed to serialize app state: {}", e))
        })?;

        std::fs::write(path, content)
            .map_err(|e| PlcWatchError::Config(format!("Failed to write app state: {}", e)))
    }

    /// Add or refresh a recent target
    pub fn add_recent_target(&mut self, target: &ConnectionTarget) {
        self.recent_targets
            .retain(|t| !(t.host == target.host && t.slot == target.slot));
        self.recent_targets.insert(0, RecentTarget::new(target));
        self.recent_targets.truncate(MAX_RECENT_TARGETS);
    }

    /// Most recently used target
    pub fn last_target(&self) -> Option<ConnectionTarget> {
        self.recent_targets.first().map(RecentTarget::target)
    }
}

// ==================== Tests ====================
