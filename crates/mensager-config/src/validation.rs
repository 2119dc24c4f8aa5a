// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::MensagerConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &MensagerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.server.port == 0 {
        errors.push(ConfigError::Validation {
            message: "server.port must not be 0".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.realtime.outbox_capacity == 0 {
        errors.push(ConfigError::Validation {
            message: "realtime.outbox_capacity must be at least 1".to_string(),
        });
    }

    if config.realtime.heartbeat_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "realtime.heartbeat_interval_secs must be at least 1".to_string(),
        });
    }

    let base_url = config.media.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        errors.push(ConfigError::Validation {
            message: format!("media.base_url `{base_url}` must start with http:// or https://"),
        });
    }

    if config.media.download_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "media.download_timeout_secs must be at least 1".to_string(),
        });
    }

    if config.media.max_download_bytes == 0 {
        errors.push(ConfigError::Validation {
            message: "media.max_download_bytes must be at least 1".to_string(),
        });
    }

    if let Some(secret) = &config.auth.jwt_secret
        && secret.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "auth.jwt_secret must not be empty when set".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks that only matter when the HTTP server is about to start.
pub fn validate_for_serve(config: &MensagerConfig) -> Result<(), Vec<ConfigError>> {
    if config.auth.jwt_secret.is_none() {
        return Err(vec![ConfigError::MissingKey {
            key: "auth.jwt_secret".to_string(),
        }]);
    }
    Ok(())
}
