// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered config merging with Figment.
//!
//! `./mensager.toml` > `~/.config/mensager/mensager.toml` > `/etc/mensager/mensager.toml`,
//! with `MENSAGER_*` environment variables on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::MensagerConfig;

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/mensager/mensager.toml";

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/mensager/mensager.toml`
/// 3. `~/.config/mensager/mensager.toml`
/// 4. `./mensager.toml`
/// 5. `MENSAGER_*` environment variables
pub fn load_config() -> Result<MensagerConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<MensagerConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MensagerConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MensagerConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MensagerConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(MensagerConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("mensager/mensager.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("mensager.toml"))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` so that
/// `MENSAGER_AUTH_JWT_SECRET` maps to `auth.jwt_secret`, not `auth.jwt.secret`.
fn env_provider() -> Env {
    Env::prefixed("MENSAGER_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env var name to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    const SECTIONS: [&str; 5] = ["server", "auth", "storage", "realtime", "media"];
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_on_first_section_only() {
        assert_eq!(map_env_key("auth_jwt_secret"), "auth.jwt_secret");
        assert_eq!(
            map_env_key("realtime_heartbeat_interval_secs"),
            "realtime.heartbeat_interval_secs"
        );
        assert_eq!(map_env_key("server_port"), "server.port");
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }
}
