use super::load_config;
use super::settings::{PartialSettings, Settings};
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.url, "ws://127.0.0.1:8080/ws");
    assert_eq!(settings.server.connect_timeout_ms, 10_000);
    assert!(settings.auth.token.is_none());
    assert_eq!(settings.reconnect.base_interval_ms, 3000);
    assert_eq!(settings.reconnect.max_delay_ms, 30000);
    assert_eq!(settings.reconnect.max_attempts, 10);
    assert_eq!(settings.heartbeat.interval_ms, 30000);
    assert_eq!(settings.channels.default, vec!["payments", "notifications"]);
    assert_eq!(settings.logging.level, "info");
}

#[test]
fn test_empty_partial_keeps_defaults() {
    let merged = PartialSettings::default().merge(Settings::default());
    assert_eq!(merged.server.url, Settings::default().server.url);
    assert_eq!(merged.reconnect.max_attempts, 10);
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [server]
        url = "ws://pay.example:9000/ws"

        [auth]
        token = "file-token"

        [reconnect]
        base_interval_ms = 500
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();
    env::set_current_dir(orig).expect("restore cwd");

    let cfg = cfg.expect("load_config failed");
    assert_eq!(cfg.server.url, "ws://pay.example:9000/ws");
    assert_eq!(cfg.auth.token.as_deref(), Some("file-token"));
    assert!(cfg.auth.user_id.is_none());
    assert_eq!(cfg.reconnect.base_interval_ms, 500);
    // untouched keys keep their defaults
    assert_eq!(cfg.server.connect_timeout_ms, 10_000);
    assert_eq!(cfg.reconnect.max_delay_ms, 30000);
    assert_eq!(cfg.heartbeat.interval_ms, 30000);
}

#[test]
#[serial]
fn load_config_from_environment() {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    let cfg = temp_env::with_vars(
        [
            ("REALTIME__SERVER__URL", Some("ws://env.example/ws")),
            ("REALTIME__SERVER__CONNECT_TIMEOUT_MS", Some("2500")),
            ("REALTIME__AUTH__USER_ID", Some("u-42")),
            ("REALTIME__HEARTBEAT__INTERVAL_MS", Some("1000")),
            ("REALTIME__CHANNELS__DEFAULT", Some("payments,system")),
        ],
        load_config,
    );
    env::set_current_dir(orig).expect("restore cwd");

    let cfg = cfg.expect("load_config failed");
    assert_eq!(cfg.server.url, "ws://env.example/ws");
    assert_eq!(cfg.server.connect_timeout_ms, 2500);
    assert_eq!(cfg.auth.user_id.as_deref(), Some("u-42"));
    assert_eq!(cfg.heartbeat.interval_ms, 1000);
    assert_eq!(cfg.channels.default, vec!["payments", "system"]);
}
