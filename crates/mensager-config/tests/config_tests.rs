// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Mensager configuration system.

use mensager_config::diagnostic::ConfigError;
use mensager_config::model::MensagerConfig;
use mensager_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[server]
host = "0.0.0.0"
port = 8080
log_level = "debug"

[auth]
jwt_secret = "top-secret"

[storage]
database_path = "/tmp/mensager-test.db"
wal_mode = false

[realtime]
outbox_capacity = 32
heartbeat_interval_secs = 15

[media]
storage_path = "/var/lib/mensager/media"
base_url = "https://chat.example.com/media"
download_timeout_secs = 60
max_download_bytes = 1048576
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.log_level, "debug");
    assert_eq!(config.auth.jwt_secret.as_deref(), Some("top-secret"));
    assert_eq!(config.storage.database_path, "/tmp/mensager-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.realtime.outbox_capacity, 32);
    assert_eq!(config.realtime.heartbeat_interval_secs, 15);
    assert_eq!(config.media.storage_path, "/var/lib/mensager/media");
    assert_eq!(config.media.base_url, "https://chat.example.com/media");
    assert_eq!(config.media.download_timeout_secs, 60);
    assert_eq!(config.media.max_download_bytes, 1_048_576);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 4120);
    assert_eq!(config.server.log_level, "info");
    assert!(config.auth.jwt_secret.is_none());
    assert!(config.storage.database_path.ends_with("mensager.db"));
    assert!(config.storage.wal_mode);
    assert_eq!(config.realtime.outbox_capacity, 10);
    assert_eq!(config.realtime.heartbeat_interval_secs, 30);
    assert_eq!(config.media.storage_path, "./media");
    assert_eq!(config.media.base_url, "http://localhost:4120/media");
    assert_eq!(config.media.download_timeout_secs, 300);
    assert_eq!(config.media.max_download_bytes, 64 * 1024 * 1024);
}

#[test]
fn unknown_key_is_rejected_with_suggestion() {
    let toml = r#"
[realtime]
outbox_capasity = 5
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown key");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "outbox_capasity");
            assert_eq!(suggestion.as_deref(), Some("outbox_capacity"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[telegram]\nbot_token = \"x\"\n")
        .expect_err("unknown section should fail");
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[server]\nport = \"eighty\"\n")
        .expect_err("string port should fail");
    assert!(
        matches!(&errors[0], ConfigError::InvalidType { .. }),
        "got {:?}",
        errors[0]
    );
}

#[test]
fn validation_errors_are_collected() {
    let toml = r#"
[server]
port = 0

[realtime]
outbox_capacity = 0
heartbeat_interval_secs = 0

[media]
base_url = "localhost/media"
"#;

    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert_eq!(errors.len(), 4, "got {errors:?}");
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

#[test]
fn env_style_override_wins_over_toml() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let config: MensagerConfig = Figment::new()
        .merge(Serialized::defaults(MensagerConfig::default()))
        .merge(Toml::string("[realtime]\noutbox_capacity = 4\n"))
        .merge(("realtime.outbox_capacity", 64))
        .extract()
        .expect("should merge override");

    assert_eq!(config.realtime.outbox_capacity, 64);
}

#[test]
fn load_from_file_path() {
    let dir = std::env::temp_dir().join(format!("mensager-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("mensager.toml");
    std::fs::write(&path, "[server]\nport = 9999\n").unwrap();

    let config = load_and_validate_path(&path).expect("file config should load");
    assert_eq!(config.server.port, 9999);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn auth_debug_redacts_secret() {
    let config = load_config_from_str("[auth]\njwt_secret = \"hunter2\"\n").unwrap();
    let debug = format!("{:?}", config.auth);
    assert!(!debug.contains("hunter2"));
    assert!(debug.contains("REDACTED"));
}
