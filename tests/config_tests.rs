use std::io::Write;
use std::time::Duration;

use connsoak::cli::RunArgs;
use connsoak::config::Config;
use connsoak::error::{ConfigError, Error};
use tempfile::NamedTempFile;

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn full_file_round_trips_into_typed_config() {
    let file = write_temp_config(
        r#"
[target]
addresses = ["10.0.0.1:6379", "10.0.0.2", "[::1]"]
tls = true
tls_verify = true

[connection]
count = 250
db = 2
username = "soak"
ping_interval = "10s"
read_timeout = "750ms"
idle_timeout = "5m"
connect_timeout = "3s"
open_rate = 25

[backoff]
min = "100ms"
max = "2s"

[metrics]
report_interval = "1s"

[logging]
level = "debug"
format = "json"
"#,
    );

    let mut config = Config::from_file(file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(
        config.target.addresses,
        vec![
            "10.0.0.1:6379".to_string(),
            "10.0.0.2:6379".to_string(),
            "[::1]:6379".to_string()
        ]
    );
    assert!(config.target.tls && config.target.tls_verify);
    assert_eq!(config.connection.count, 250);
    assert_eq!(config.connection.db, 2);
    assert_eq!(config.connection.read_timeout, Duration::from_millis(750));
    assert_eq!(config.connection.idle_timeout, Duration::from_secs(300));
    assert_eq!(config.connection.open_rate, 25);
    assert_eq!(config.backoff.max, Duration::from_secs(2));
    assert_eq!(config.metrics.report_interval, Duration::from_secs(1));
    assert!(config.logging.is_json());
    assert!(config.targets().iter().all(|t| t.use_tls));
}

#[test]
fn empty_file_uses_defaults() {
    let file = write_temp_config("");
    let mut config = Config::from_file(file.path()).unwrap();
    config.validate().unwrap();
    assert_eq!(config.target.addresses, vec!["localhost:6379".to_string()]);
    assert_eq!(config.connection.count, 1000);
}

#[test]
fn password_in_file_is_ignored() {
    let file = write_temp_config(
        r#"
[connection]
password = "from-file"
"#,
    );
    let config = Config::from_file(file.path()).unwrap();
    assert!(config.connection.password.is_none());
}

#[test]
fn zero_connections_rejected() {
    let file = write_temp_config("[connection]\ncount = 0\n");
    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::InvalidValue {
            field: "connection.count",
            ..
        })) => {}
        other => panic!("expected invalid count, got {other:?}"),
    }
}

#[test]
fn zero_open_rate_rejected() {
    let file = write_temp_config("[connection]\nopen_rate = 0\n");
    let mut config = Config::from_file(file.path()).unwrap();
    assert!(matches!(
        config.validate(),
        Err(Error::Config(ConfigError::InvalidValue {
            field: "connection.open_rate",
            ..
        }))
    ));
}

#[test]
fn malformed_duration_is_a_parse_error() {
    let file = write_temp_config("[connection]\nping_interval = \"often\"\n");
    assert!(matches!(
        Config::from_file(file.path()),
        Err(Error::Config(ConfigError::Parse(_)))
    ));
}

#[test]
fn missing_file_is_a_read_error() {
    assert!(matches!(
        Config::from_file("/nonexistent/connsoak.toml"),
        Err(Error::Config(ConfigError::ReadFile(_)))
    ));
}

#[test]
fn precedence_is_file_then_env_then_flags() {
    let file = write_temp_config(
        r#"
[target]
addresses = ["file-host"]

[connection]
count = 10
db = 1
"#,
    );
    let mut config = Config::from_file(file.path()).unwrap();
    config.apply_env_with(|key| match key {
        "CONNECTIONS" => Some("20".into()),
        "REDIS_DB" => Some("5".into()),
        _ => None,
    });
    assert_eq!(config.connection.count, 20);

    let flags = RunArgs {
        connections: Some(30),
        ..RunArgs::default()
    };
    flags.apply_overrides(&mut config);
    config.validate().unwrap();

    assert_eq!(config.connection.count, 30);
    assert_eq!(config.connection.db, 5);
    assert_eq!(config.target.addresses, vec!["file-host:6379".to_string()]);
}
