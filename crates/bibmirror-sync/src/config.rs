//! # Mirror Configuration
//!
//! Configuration for the sync binary and the API client.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BIBMIRROR_DATABASE_PATH=/var/lib/bibmirror/mirror.db               │
//! │     BIBMIRROR_API_BASE_URL=https://api.zotero.org                      │
//! │     BIBMIRROR_API_TIMEOUT_SECS / BIBMIRROR_API_MAX_ATTEMPTS            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/bibmirror/bibmirror.toml (Linux)                         │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/bibmirror/mirror.db"
//!
//! [api]
//! base_url = "https://api.zotero.org"
//! timeout_secs = 300
//! max_attempts = 3
//!
//! [sync]
//! item_page_size = 50
//! placeholder_styles = ["", "default", "none"]
//!
//! [[libraries]]
//! title = "Lab Publications"
//! library_type = "group"
//! remote_id = "2234567"
//! api_key = "..."
//! citation_style = "apa"
//! citation_locale = "en-US"
//! sync_interval_minutes = 60
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use bibmirror_core::validation::{
    validate_new_library, validate_page_size, DEFAULT_PLACEHOLDER_STYLES,
};
use bibmirror_core::{NewLibrary, API_VERSION, DEFAULT_API_BASE_URL};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Created on first run.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("org", "bibmirror", "bibmirror")
        .map(|dirs| dirs.data_dir().join("mirror.db"))
        .unwrap_or_else(|| PathBuf::from("mirror.db"))
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
        }
    }
}

// =============================================================================
// API Settings
// =============================================================================

/// Remote API client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sent as the `Zotero-API-Version` header.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-request timeout. Large libraries answer slowly.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Attempts per request when rate limited (HTTP 429).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Sleep used when a 429 carries no `Retry-After`.
    #[serde(default = "default_retry_after")]
    pub default_retry_after_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}
fn default_api_version() -> String {
    API_VERSION.to_string()
}
fn default_timeout() -> u64 {
    300
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_after() -> u64 {
    60
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            api_version: default_api_version(),
            timeout_secs: default_timeout(),
            max_attempts: default_max_attempts(),
            default_retry_after_secs: default_retry_after(),
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Orchestrator behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_collection_page_size")]
    pub collection_page_size: i64,

    #[serde(default = "default_item_page_size")]
    pub item_page_size: i64,

    /// Page size for collection membership key lists.
    #[serde(default = "default_member_page_size")]
    pub member_page_size: i64,

    /// Citation style values treated as "no style": the style parameter is
    /// then left out of item requests.
    #[serde(default = "default_placeholder_styles")]
    pub placeholder_styles: Vec<String>,

    /// Mirror attachment metadata for each synced item.
    #[serde(default = "default_true")]
    pub fetch_attachments: bool,
}

fn default_collection_page_size() -> i64 {
    100
}
fn default_item_page_size() -> i64 {
    50
}
fn default_member_page_size() -> i64 {
    100
}
fn default_placeholder_styles() -> Vec<String> {
    DEFAULT_PLACEHOLDER_STYLES.iter().map(|s| s.to_string()).collect()
}
fn default_true() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            collection_page_size: default_collection_page_size(),
            item_page_size: default_item_page_size(),
            member_page_size: default_member_page_size(),
            placeholder_styles: default_placeholder_styles(),
            fetch_attachments: true,
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    /// Libraries registered on startup.
    #[serde(default)]
    pub libraries: Vec<NewLibrary>,
}

impl MirrorConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (bibmirror.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document without touching the environment.
    pub fn from_toml(contents: &str) -> SyncResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    pub fn validate(&self) -> SyncResult<()> {
        let url = url::Url::parse(&self.api.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "API base URL must be http(s), got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if self.api.max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "max_attempts must be at least 1".into(),
            ));
        }

        validate_page_size("collection_page_size", self.sync.collection_page_size)?;
        validate_page_size("item_page_size", self.sync.item_page_size)?;
        validate_page_size("member_page_size", self.sync.member_page_size)?;

        for library in &self.libraries {
            validate_new_library(library)
                .map_err(|e| SyncError::InvalidConfig(format!("library '{}': {}", library.title, e)))?;
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("BIBMIRROR_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(url) = std::env::var("BIBMIRROR_API_BASE_URL") {
            debug!(url = %url, "Overriding API base URL from environment");
            self.api.base_url = url;
        }

        if let Ok(timeout) = std::env::var("BIBMIRROR_API_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.api.timeout_secs = secs,
                Err(_) => warn!(value = %timeout, "Ignoring invalid BIBMIRROR_API_TIMEOUT_SECS"),
            }
        }

        if let Ok(attempts) = std::env::var("BIBMIRROR_API_MAX_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(n) => self.api.max_attempts = n,
                Err(_) => warn!(value = %attempts, "Ignoring invalid BIBMIRROR_API_MAX_ATTEMPTS"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "bibmirror", "bibmirror")
            .map(|dirs| dirs.config_dir().join("bibmirror.toml"))
    }
}
