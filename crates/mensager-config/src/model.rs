// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level Mensager configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MensagerConfig {
    /// HTTP listener and logging.
    #[serde(default)]
    pub server: ServerConfig,

    /// Token verification.
    #[serde(default)]
    pub auth: AuthConfig,

    /// SQLite database.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Realtime hub and streaming sessions.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Re-hosted media.
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4120
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Bearer token verification settings. Tokens are issued elsewhere.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// HS256 secret shared with the token issuer.
    #[serde(default)]
    pub jwt_secret: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("mensager").join("mensager.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("mensager.db"))
        .display()
        .to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeConfig {
    /// Bounded outbox size per subscriber. Events beyond it are dropped.
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,

    /// Seconds between heartbeat frames on an idle stream.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: default_outbox_capacity(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
        }
    }
}

fn default_outbox_capacity() -> usize {
    10
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MediaConfig {
    /// Directory downloaded media is written to and served from.
    #[serde(default = "default_storage_path")]
    pub storage_path: String,

    /// Public URL prefix under which `storage_path` is served.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Downloads larger than this are abandoned and the remote URL is kept.
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            base_url: default_base_url(),
            download_timeout_secs: default_download_timeout_secs(),
            max_download_bytes: default_max_download_bytes(),
        }
    }
}

fn default_storage_path() -> String {
    "./media".to_string()
}

fn default_base_url() -> String {
    "http://localhost:4120/media".to_string()
}

fn default_download_timeout_secs() -> u64 {
    300
}

fn default_max_download_bytes() -> u64 {
    64 * 1024 * 1024
}
