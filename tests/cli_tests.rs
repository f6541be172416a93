use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use connsoak::testkit::server::{unused_addr, FakeKvServer};
use connsoak::testkit::wait_until;
use tempfile::NamedTempFile;

const ENV_KEYS: &[&str] = &[
    "REDIS_ADDRESSES",
    "CONNECTIONS",
    "REDIS_USERNAME",
    "REDIS_PASSWORD",
    "REDIS_DB",
    "REDIS_TLS",
    "PING_INTERVAL",
    "READ_TIMEOUT",
    "IDLE_TIMEOUT",
    "CONNECT_TIMEOUT",
    "OPEN_RATE",
    "RUST_LOG",
];

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

fn connsoak() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_connsoak"));
    for key in ENV_KEYS {
        cmd.env_remove(key);
    }
    cmd
}

fn combined(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

#[test]
fn check_config_accepts_valid_file_and_masks_password() {
    let file = write_temp_config("[target]\naddresses = [\"10.1.1.1\"]\n");
    let output = connsoak()
        .args(["check", "config", "--config"])
        .arg(file.path())
        .env("REDIS_PASSWORD", "hunter2")
        .output()
        .expect("run connsoak");

    let text = combined(&output);
    assert!(output.status.success(), "{text}");
    assert!(text.contains("Configuration is valid"));
    assert!(text.contains("10.1.1.1:6379"));
    assert!(!text.contains("hunter2"), "password leaked: {text}");
}

#[test]
fn check_config_returns_nonzero_on_invalid_value() {
    let file = write_temp_config("[connection]\ncount = 0\n");
    let output = connsoak()
        .args(["check", "config", "--config"])
        .arg(file.path())
        .output()
        .expect("run connsoak");

    assert!(!output.status.success(), "Expected nonzero exit code");
    let text = combined(&output);
    assert!(
        text.contains("invalid value for connection.count"),
        "Expected error about connection.count.\n{text}"
    );
}

#[test]
fn unknown_subcommand_is_a_usage_error() {
    let output = connsoak().arg("frobnicate").output().expect("run connsoak");
    assert!(!output.status.success());
}

#[tokio::test(flavor = "multi_thread")]
async fn check_connection_reports_unreachable_target() {
    let addr = unused_addr().await;
    let file = write_temp_config(&format!(
        "[target]\naddresses = [\"{addr}\"]\n[connection]\nconnect_timeout = \"500ms\"\n"
    ));

    let output = tokio::task::spawn_blocking(move || {
        connsoak()
            .args(["check", "connection", "--config"])
            .arg(file.path())
            .output()
            .expect("run connsoak")
    })
    .await
    .unwrap();

    assert!(!output.status.success());
    assert!(combined(&output).contains("failed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn check_connection_probes_live_server() {
    let server = FakeKvServer::builder().password("pw").start().await;
    let file = write_temp_config(&format!(
        "[target]\naddresses = [\"{}\"]\n[connection]\ndb = 2\n",
        server.addr()
    ));

    let output = tokio::task::spawn_blocking(move || {
        connsoak()
            .args(["check", "connection", "--config"])
            .arg(file.path())
            .env("REDIS_PASSWORD", "pw")
            .output()
            .expect("run connsoak")
    })
    .await
    .unwrap();

    let text = combined(&output);
    assert!(output.status.success(), "{text}");
    assert!(text.contains("All targets reachable"));
    let stats = server.stats();
    assert_eq!((stats.auths, stats.selects, stats.pings), (1, 1, 1));
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn run_drains_on_sigterm_and_prints_summary() {
    let server = FakeKvServer::start().await;
    let child = connsoak()
        .args(["run", "--json-logs", "--connections", "3", "--addrs"])
        .arg(server.addr())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn connsoak");

    wait_until(Duration::from_secs(10), || server.stats().open == 3).await;

    let status = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .expect("send SIGTERM");
    assert!(status.success());

    let output = tokio::task::spawn_blocking(move || child.wait_with_output())
        .await
        .unwrap()
        .expect("wait for connsoak");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{}", combined(&output));

    let summary: serde_json::Value = stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .find(|v| v.get("opened").is_some())
        .expect("final JSON summary");
    assert_eq!(summary["opened"], 3);
    assert_eq!(summary["active"], 0);
    assert_eq!(summary["restarts"], 3);
}
