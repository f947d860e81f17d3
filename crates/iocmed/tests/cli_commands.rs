#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "iocmed-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn iocmed() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_iocmed"));
    cmd.arg("--log-level").arg("error");
    cmd
}

fn run_to_end(cmd: &mut Command) -> Output {
    cmd.output().expect("iocmed should start")
}

/// A config with only the virtual UART, so no CBC device nodes are needed.
fn write_uart_only_config(dir: &Path) -> PathBuf {
    let path = dir.join("iocmed.json");
    std::fs::write(
        &path,
        r#"{
            "virtual_uart": "",
            "pool_size": 8,
            "channels": [{ "id": "virtual_uart" }]
        }"#,
    )
    .expect("config should be writable");
    path
}

fn wait_for_link(path: &Path, child: &mut Child) {
    let start = Instant::now();
    while std::fs::symlink_metadata(path).is_err() {
        if let Ok(Some(status)) = child.try_wait() {
            panic!("mediator exited before the link appeared: {status}");
        }
        assert!(start.elapsed() < WAIT, "virtual uart link never appeared");
        thread::sleep(Duration::from_millis(20));
    }
}

fn wait_for_exit(child: &mut Child) -> ExitStatus {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().expect("child status should be readable") {
            return status;
        }
        if start.elapsed() >= WAIT {
            let _ = child.kill();
            panic!("mediator did not exit after SIGINT");
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn interrupt(child: &Child) {
    let pid = i32::try_from(child.id()).expect("pid fits in i32");
    // SAFETY: plain signal delivery to a child process we own.
    let rc = unsafe { libc::kill(pid, libc::SIGINT) };
    assert_eq!(rc, 0, "SIGINT should be delivered");
}

#[test]
fn version_prints_package_version() {
    let output = run_to_end(iocmed().arg("version"));
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn channels_json_lists_every_channel() {
    let output = run_to_end(iocmed().args(["--format", "json", "channels"]));
    assert!(output.status.success());

    let rows: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("channels output should be json");
    let rows = rows.as_array().expect("channels output should be an array");
    assert_eq!(rows.len(), 20);

    let lifecycle = rows
        .iter()
        .find(|row| row["channel"] == "lifecycle")
        .expect("lifecycle row should exist");
    assert_eq!(lifecycle["mux"], 1);
    assert_eq!(lifecycle["critical"], true);
}

#[test]
fn doctor_json_reports_overall_status() {
    let output = run_to_end(iocmed().args(["--format", "json", "doctor"]));
    let code = output.status.code().expect("doctor should exit normally");
    assert!(code == 0 || code == 30, "unexpected doctor exit code {code}");

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("doctor output should be json");
    let overall = report["overall"].as_str().expect("overall should be a string");
    assert_eq!(overall == "pass", code == 0);
}

#[test]
fn send_to_missing_path_fails() {
    let dir = unique_temp_dir("send-missing");
    let output = run_to_end(iocmed().arg("send").arg(dir.join("absent")).args([
        "--mux",
        "1",
        "--command",
        "0x10",
    ]));
    assert_eq!(output.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn run_without_boot_reason_is_a_usage_error() {
    let dir = unique_temp_dir("no-boot");
    let config = write_uart_only_config(&dir);
    let vuart = dir.join("vuart");

    let output = run_to_end(
        iocmed()
            .arg("run")
            .arg(&vuart)
            .arg("--config")
            .arg(&config)
            .arg("--skip-platform-check"),
    );
    assert_eq!(output.status.code(), Some(64));
    assert!(std::fs::symlink_metadata(&vuart).is_err());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn run_answers_boot_reason_query_and_stops_on_sigint() {
    let dir = unique_temp_dir("run");
    let config = write_uart_only_config(&dir);
    let vuart = dir.join("vuart");

    let mut child = iocmed()
        .args(["--format", "json", "run"])
        .arg(&vuart)
        .arg("--config")
        .arg(&config)
        .args(["--boot-reason", "0x20", "--skip-platform-check"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("run should start");
    wait_for_link(&vuart, &mut child);

    let reply = run_to_end(iocmed().args(["--format", "json", "send"]).arg(&vuart).args([
        "--mux",
        "1",
        "--command",
        "0x10",
        "--wait",
        "--wait-timeout",
        "3s",
    ]));
    assert!(
        reply.status.success(),
        "send failed: {}",
        String::from_utf8_lossy(&reply.stderr)
    );
    let frame: serde_json::Value =
        serde_json::from_slice(&reply.stdout).expect("reply should be json");
    assert_eq!(frame["channel"], "lifecycle");
    assert_eq!(frame["command"], 0x11);
    assert_eq!(frame["payload"], "20000000");

    interrupt(&child);
    let status = wait_for_exit(&mut child);
    assert!(status.success(), "run exited with {status}");
    assert!(std::fs::symlink_metadata(&vuart).is_err());

    let output = child.wait_with_output().expect("run output should be readable");
    let summary: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("run summary should be json");
    assert_eq!(summary["core_exited_early"], false);
    assert_eq!(summary["frames_dropped"], 0);

    let _ = std::fs::remove_dir_all(&dir);
}
