// Integration tests for configuration file loading

use adasa_watch::config::{Action, MemLimit, WatchConfig};
use adasa_watch::error::WatchError;
use nix::sys::signal::Signal;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn write(temp_dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = temp_dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_toml_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        &temp_dir,
        "watch.toml",
        r#"
socket_path = "/tmp/adasa-test.sock"
rpc_timeout_secs = 2

[statsd]
host = "10.0.0.5"

[[resource_watchers]]
watcher = "web"
max_cpu = 80
max_mem = "512M"
min_mem = "10M"
health_threshold = "none"
max_count = 5
loop_rate = 10

[[resource_watchers]]
watcher = "worker"
action = "SIGTERM"
per_process = true
debounce_secs = 30

[[command_reloaders]]
watchers = "web, worker"
use_reload = true
"#,
    );

    let config = WatchConfig::from_file(&path).unwrap();
    assert_eq!(config.socket_path, PathBuf::from("/tmp/adasa-test.sock"));
    assert_eq!(config.rpc_timeout(), Duration::from_secs(2));

    let statsd = config.statsd.as_ref().unwrap();
    assert_eq!(statsd.host, "10.0.0.5");
    assert_eq!(statsd.port, 8125);
    assert_eq!(statsd.prefix, "adasa");

    let watchers = config.resource_watcher_configs().unwrap();
    assert_eq!(watchers.len(), 2);

    let web = &watchers[0];
    assert_eq!(web.watcher, "web");
    assert_eq!(web.thresholds.max_cpu, Some(80.0));
    assert_eq!(web.thresholds.max_mem, Some(MemLimit::Bytes(512 * 1024 * 1024)));
    assert_eq!(web.thresholds.min_mem, Some(MemLimit::Bytes(10 * 1024 * 1024)));
    assert_eq!(web.thresholds.health_threshold, None);
    assert_eq!(web.thresholds.max_count, 5);
    assert_eq!(web.thresholds.action, Action::Restart);
    assert_eq!(web.loop_rate, Duration::from_secs(10));
    assert_eq!(web.debounce, Duration::from_secs(5));

    let worker = &watchers[1];
    assert_eq!(worker.thresholds.action, Action::Signal(Signal::SIGTERM));
    assert!(worker.thresholds.per_process);
    assert_eq!(worker.thresholds.max_cpu, Some(90.0));
    assert_eq!(worker.debounce, Duration::from_secs(30));

    let reloaders = config.command_reloader_configs().unwrap();
    assert_eq!(
        reloaders[0].watchers,
        Some(vec!["web".to_string(), "worker".to_string()])
    );
    assert!(reloaders[0].use_reload);
    assert!(!reloaders[0].use_working_dir);
}

#[test]
fn test_load_json_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        &temp_dir,
        "watch.json",
        r#"{
  "resource_watchers": [
    { "service": "legacy", "use_reload": true, "min_cpu": "5" }
  ]
}"#,
    );

    let config = WatchConfig::from_file(&path).unwrap();
    assert!(config.statsd.is_none());
    assert!(config.command_reloaders.is_empty());

    let watchers = config.resource_watcher_configs().unwrap();
    assert_eq!(watchers[0].watcher, "legacy");
    assert_eq!(watchers[0].thresholds.action, Action::Reload);
    assert_eq!(watchers[0].thresholds.min_cpu, Some(5.0));
}

#[test]
fn test_socket_path_env_expansion() {
    std::env::set_var("ADASA_WATCH_TEST_RUN_DIR", "/run/adasa-test");
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        &temp_dir,
        "watch.toml",
        r#"
socket_path = "${ADASA_WATCH_TEST_RUN_DIR}/adasa.sock"

[[resource_watchers]]
watcher = "web"
"#,
    );

    let config = WatchConfig::from_file(&path).unwrap();
    assert_eq!(
        config.socket_path,
        PathBuf::from("/run/adasa-test/adasa.sock")
    );
}

#[test]
fn test_invalid_configs_are_rejected() {
    let temp_dir = TempDir::new().unwrap();

    let empty = write(&temp_dir, "empty.toml", "socket_path = \"/tmp/a.sock\"\n");
    assert!(matches!(
        WatchConfig::from_file(&empty),
        Err(WatchError::InvalidConfig(_))
    ));

    let missing_watcher = write(
        &temp_dir,
        "missing.toml",
        "[[resource_watchers]]\nmax_cpu = 50\n",
    );
    assert!(matches!(
        WatchConfig::from_file(&missing_watcher),
        Err(WatchError::MissingConfigField(_))
    ));

    let group_signal = write(
        &temp_dir,
        "signal.toml",
        "[[resource_watchers]]\nwatcher = \"web\"\naction = \"SIGKILL\"\n",
    );
    assert!(matches!(
        WatchConfig::from_file(&group_signal),
        Err(WatchError::ConfigValidationError(_))
    ));

    let bad_mem = write(
        &temp_dir,
        "mem.toml",
        "[[resource_watchers]]\nwatcher = \"web\"\nmax_mem = \"lots\"\n",
    );
    assert!(matches!(
        WatchConfig::from_file(&bad_mem),
        Err(WatchError::ConfigValidationError(_))
    ));

    let yaml = write(&temp_dir, "watch.yaml", "resource_watchers: []\n");
    assert!(matches!(
        WatchConfig::from_file(&yaml),
        Err(WatchError::InvalidConfig(_))
    ));
}

#[test]
fn test_missing_file() {
    let result = WatchConfig::from_file(std::path::Path::new("/nonexistent/adasa-watch.toml"));
    assert!(matches!(result, Err(WatchError::ConfigError(_))));
}
