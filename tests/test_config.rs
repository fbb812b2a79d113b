use rootserve::config::Config;
use std::collections::HashMap;
use std::time::Duration;

fn no_env(_: &str) -> Option<String> {
    None
}

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn test_config_defaults() {
    let cfg = Config::from_sources(None, no_env).unwrap();

    assert_eq!(cfg.server.address, "127.0.0.1");
    assert_eq!(cfg.server.port, 8080);
    assert!(cfg.server.workers >= 1);
    assert_eq!(cfg.server.idle_timeout_secs, 30);
    assert_eq!(cfg.server.max_header_bytes, 8192);
    assert_eq!(cfg.logging.level, "info");
}

#[test]
fn test_config_from_yaml() {
    let yaml = r#"
server:
  address: 0.0.0.0
  port: 3000
  workers: 7
static_files:
  root: /srv/www
"#;
    let cfg = Config::from_sources(Some(yaml), no_env).unwrap();

    assert_eq!(cfg.server.address, "0.0.0.0");
    assert_eq!(cfg.server.port, 3000);
    assert_eq!(cfg.server.workers, 7);
    // Unset fields keep their defaults
    assert_eq!(cfg.server.idle_timeout_secs, 30);
    assert_eq!(cfg.static_files.root.to_str(), Some("/srv/www"));
}

#[test]
fn test_config_env_overrides_yaml() {
    let yaml = "server:\n  port: 3000\n";
    let env = env_from(&[
        ("ROOTSERVE_PORT", "5000"),
        ("ROOTSERVE_ADDRESS", "::1"),
        ("ROOTSERVE_WORKERS", "2"),
        ("ROOTSERVE_IDLE_TIMEOUT_SECS", "5"),
        ("ROOTSERVE_MAX_HEADER_BYTES", "1024"),
        ("ROOTSERVE_LOG", "debug"),
    ]);
    let cfg = Config::from_sources(Some(yaml), env).unwrap();

    assert_eq!(cfg.server.port, 5000);
    assert_eq!(cfg.server.address, "::1");
    assert_eq!(cfg.server.workers, 2);
    assert_eq!(cfg.server.idle_timeout_secs, 5);
    assert_eq!(cfg.server.max_header_bytes, 1024);
    assert_eq!(cfg.logging.level, "debug");
}

#[test]
fn test_config_rejects_non_numeric_port_env() {
    let env = env_from(&[("ROOTSERVE_PORT", "http")]);
    assert!(Config::from_sources(None, env).is_err());
}

#[test]
fn test_config_rejects_non_numeric_header_limit_env() {
    let env = env_from(&[("ROOTSERVE_MAX_HEADER_BYTES", "8k")]);
    assert!(Config::from_sources(None, env).is_err());
}

#[test]
fn test_config_rejects_invalid_yaml() {
    assert!(Config::from_sources(Some("server: [1, 2"), no_env).is_err());
}

#[test]
fn test_validate_canonicalizes_root() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("site");
    std::fs::create_dir(&nested).unwrap();

    let env = env_from(&[("ROOTSERVE_ROOT", nested.join("..").join("site").to_str().unwrap())]);
    let cfg = Config::from_sources(None, env).unwrap().validate().unwrap();

    assert_eq!(cfg.root, std::fs::canonicalize(&nested).unwrap());
    assert!(cfg.root.is_absolute());
    assert_eq!(cfg.idle_timeout, Duration::from_secs(30));
    assert_eq!(cfg.log_level, tracing::Level::INFO);
}

#[test]
fn test_validate_bind_addr() {
    let dir = tempfile::tempdir().unwrap();
    let env = env_from(&[
        ("ROOTSERVE_ROOT", dir.path().to_str().unwrap()),
        ("ROOTSERVE_ADDRESS", "0.0.0.0"),
        ("ROOTSERVE_PORT", "8000"),
    ]);
    let cfg = Config::from_sources(None, env).unwrap().validate().unwrap();

    assert_eq!(cfg.bind_addr().to_string(), "0.0.0.0:8000");
}

#[test]
fn test_validate_rejects_missing_root() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");
    let env = env_from(&[("ROOTSERVE_ROOT", missing.to_str().unwrap())]);

    let err = Config::from_sources(None, env).unwrap().validate().unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn test_validate_rejects_file_as_root() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("plain.txt");
    std::fs::write(&file, b"x").unwrap();
    let env = env_from(&[("ROOTSERVE_ROOT", file.to_str().unwrap())]);

    assert!(Config::from_sources(None, env).unwrap().validate().is_err());
}

#[test]
fn test_validate_rejects_bad_values() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_str().unwrap();

    for (key, value) in [
        ("ROOTSERVE_PORT", "0"),
        ("ROOTSERVE_PORT", "70000"),
        ("ROOTSERVE_ADDRESS", "localhost"),
        ("ROOTSERVE_ADDRESS", "999.1.1.1"),
        ("ROOTSERVE_WORKERS", "0"),
        ("ROOTSERVE_IDLE_TIMEOUT_SECS", "0"),
        ("ROOTSERVE_MAX_HEADER_BYTES", "0"),
        ("ROOTSERVE_LOG", "chatty"),
    ] {
        let env = env_from(&[("ROOTSERVE_ROOT", root), (key, value)]);
        let cfg = Config::from_sources(None, env).unwrap();
        assert!(cfg.validate().is_err(), "{key}={value} should be rejected");
    }
}

#[test]
fn test_config_clone() {
    let cfg1 = Config::from_sources(None, no_env).unwrap();
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1.server.port, cfg2.server.port);
}
