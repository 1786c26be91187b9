use super::settings::Settings;
use super::{load_config, load_config_from};
use crate::transport::codec::MAX_PACKET_SIZE;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 1883);
    assert_eq!(settings.broker.max_connections, 1000);
    assert_eq!(settings.broker.max_packet_size, 256 * 1024);
    assert_eq!(settings.broker.outbound_queue_capacity, 1024);
    assert!(!settings.broker.dedupe_subscriptions);
    assert_eq!(settings.log.level, "info");
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("absent");
    let cfg = load_config_from(path.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg.server.port, 1883);
    assert_eq!(cfg.broker.max_connections, 1000);
}

#[test]
#[serial]
fn test_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let toml = r#"
        [server]
        host = "127.0.0.1"
        port = 9000

        [broker]
        max_connections = 10
        dedupe_subscriptions = true

        [log]
        level = "debug"
    "#;
    fs::write(tmp.path().join("broker.toml"), toml).expect("write config file");

    let path = tmp.path().join("broker");
    let cfg = load_config_from(path.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg.server.host, "127.0.0.1");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.broker.max_connections, 10);
    assert!(cfg.broker.dedupe_subscriptions);
    // not in the file
    assert_eq!(cfg.broker.max_packet_size, 256 * 1024);
    assert_eq!(cfg.log.level, "debug");
}

#[test]
#[serial]
fn test_env_overrides_defaults() {
    temp_env::with_vars(
        [
            ("POPMQTT__SERVER__PORT", Some("1999")),
            ("POPMQTT__BROKER__MAX_PACKET_SIZE", Some("4096")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.server.port, 1999);
            assert_eq!(cfg.broker.max_packet_size, 4096);
            assert_eq!(cfg.server.host, "0.0.0.0");
        },
    );
}

#[test]
#[serial]
fn test_out_of_range_limits_are_clamped() {
    let tmp = TempDir::new().expect("create tempdir");
    let toml = r#"
        [broker]
        max_packet_size = 4294967296
        outbound_queue_capacity = 0
    "#;
    fs::write(tmp.path().join("limits.toml"), toml).expect("write config file");

    let path = tmp.path().join("limits");
    let cfg = load_config_from(path.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg.broker.max_packet_size, MAX_PACKET_SIZE);
    assert_eq!(cfg.broker.outbound_queue_capacity, 1);
}

#[test]
#[serial]
fn test_env_sets_outbound_queue_capacity() {
    temp_env::with_var("POPMQTT__BROKER__OUTBOUND_QUEUE_CAPACITY", Some("8"), || {
        let cfg = load_config().expect("load_config failed");
        assert_eq!(cfg.broker.outbound_queue_capacity, 8);
    });
}
