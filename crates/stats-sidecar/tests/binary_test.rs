//! Process-level behaviour of the `stats-sidecar` binary
#![cfg(unix)]

mod support;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use support::SHARED_KEY;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

const IDENTITY_VARS: [&str; 5] = [
    "POD_NAME",
    "HOST",
    "PORT",
    "AZURE_CUSTOMER_ID",
    "AZURE_SHARED_KEY",
];

const DEADLINE: Duration = Duration::from_secs(10);

/// Command with a clean identity environment and a throwaway working dir
fn sidecar(dir: &tempfile::TempDir, vars: &[(&str, &str)]) -> Command {
    let config = dir.path().join("sidecar.yaml");
    std::fs::write(&config, "schedule:\n  interval: 100ms\n").unwrap();

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stats-sidecar"));
    for name in IDENTITY_VARS {
        cmd.env_remove(name);
        cmd.env_remove(format!("SIDECAR_{}", name));
    }
    cmd.current_dir(dir.path())
        .env("SIDECAR_CONFIG", &config)
        .env("RUST_LOG", "info")
        .envs(vars.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    cmd
}

fn full_identity() -> Vec<(&'static str, &'static str)> {
    vec![
        ("POD_NAME", "pod-1"),
        ("HOST", "127.0.0.1"),
        // Nothing listens here, every cycle fails at the probe
        ("PORT", "1"),
        ("AZURE_CUSTOMER_ID", "cust"),
        ("AZURE_SHARED_KEY", SHARED_KEY),
    ]
}

/// Read stdout until the scheduler reports it is running, then keep draining
async fn wait_until_running(child: &mut Child) {
    let stdout = child.stdout.take().unwrap();
    let mut lines = BufReader::new(stdout).lines();

    tokio::time::timeout(DEADLINE, async {
        while let Some(line) = lines.next_line().await.unwrap() {
            if line.contains("Scheduler started") {
                return;
            }
        }
        panic!("sidecar exited before the scheduler started");
    })
    .await
    .expect("scheduler never started");

    tokio::spawn(async move { while let Ok(Some(_)) = lines.next_line().await {} });
}

async fn exit_status(child: &mut Child) -> ExitStatus {
    tokio::time::timeout(DEADLINE, child.wait())
        .await
        .expect("sidecar did not exit in time")
        .unwrap()
}

async fn assert_signal_exits_cleanly(signal: Signal) {
    let dir = tempfile::tempdir().unwrap();
    let mut child = sidecar(&dir, &full_identity()).spawn().unwrap();
    wait_until_running(&mut child).await;

    // Let a few failing cycles go by first
    tokio::time::sleep(Duration::from_millis(350)).await;
    let pid = Pid::from_raw(child.id().unwrap() as i32);
    kill(pid, signal).unwrap();

    let status = exit_status(&mut child).await;
    assert!(status.success(), "{:?} gave {:?}", signal, status);
}

#[tokio::test]
async fn test_sigterm_exits_with_success() {
    assert_signal_exits_cleanly(Signal::SIGTERM).await;
}

#[tokio::test]
async fn test_sigint_exits_with_success() {
    assert_signal_exits_cleanly(Signal::SIGINT).await;
}

async fn assert_startup_aborts(vars: &[(&str, &str)]) {
    let dir = tempfile::tempdir().unwrap();
    let mut child = sidecar(&dir, vars).spawn().unwrap();

    let stdout = child.stdout.take().unwrap();
    let output = tokio::time::timeout(DEADLINE, async {
        let mut lines = BufReader::new(stdout).lines();
        let mut output = String::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            output.push_str(&line);
            output.push('\n');
        }
        output
    })
    .await
    .expect("sidecar kept running with an invalid identity");

    let status = exit_status(&mut child).await;
    assert!(!status.success(), "expected a failing exit, got {:?}", status);
    assert!(
        !output.contains("Scheduler started"),
        "polling started despite invalid identity:\n{}",
        output
    );
}

#[tokio::test]
async fn test_missing_customer_id_aborts() {
    let vars: Vec<_> = full_identity()
        .into_iter()
        .filter(|(name, _)| *name != "AZURE_CUSTOMER_ID")
        .collect();
    assert_startup_aborts(&vars).await;
}

#[tokio::test]
async fn test_blank_host_aborts() {
    let mut vars = full_identity();
    vars[1] = ("HOST", "   ");
    assert_startup_aborts(&vars).await;
}

#[tokio::test]
async fn test_zero_port_aborts() {
    let mut vars = full_identity();
    vars[2] = ("PORT", "0");
    assert_startup_aborts(&vars).await;
}
