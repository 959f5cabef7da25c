//! Runs that need no MongoDB server

use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::{closed_port, wait_for, Workspace};

#[test]
fn test_unreachable_set_exhausts_bounded_retries() {
    let ws = Workspace::new();
    ws.write_members("rs", &[format!("127.0.0.1:{}", closed_port())]);

    let status = ws
        .command()
        .args(["--max-attempts", "2", "--interval-ms", "600", "--timeout-ms", "200"])
        .status()
        .expect("Failed to run verifier");

    assert_eq!(status.code(), Some(1));

    let verdict = ws.verdict().expect("Failure verdict should be published");
    assert_eq!(verdict["success"], false);
    assert_eq!(verdict["attempts"], 2);
    assert_eq!(verdict["replica_set"], "rs");

    let log = ws.status_log();
    assert!(log.contains("attempt 1: connection failed"), "log: {log}");
    assert!(log.contains("attempt 2: connection failed"), "log: {log}");
    assert!(!log.contains("attempt 3"), "log: {log}");
    assert!(log.contains("state Failed(ConnectionFailed) -> Exhausted"), "log: {log}");
    assert!(log.lines().last().unwrap().contains("verdict=failure attempts=2"));
}

#[test]
fn test_skipped_entries_are_logged() {
    let ws = Workspace::new();
    let port = closed_port();
    ws.write_topology(&format!(
        "# hand edited\nname=rs\nthis line is broken\npath=127.0.0.1:{port}\npath=missing-colon\n"
    ));

    let status = ws
        .command()
        .args(["--max-attempts", "1", "--interval-ms", "600", "--timeout-ms", "200"])
        .status()
        .expect("Failed to run verifier");
    assert_eq!(status.code(), Some(1));

    let log = ws.status_log();
    assert!(log.contains("config: Skipping line 3"), "log: {log}");
    assert!(log.contains("config: Skipping line 5"), "log: {log}");
    assert!(log.contains(&format!("seeds: 127.0.0.1:{port}")), "log: {log}");
}

#[test]
fn test_missing_topology_falls_back_to_localhost() {
    let ws = Workspace::new();

    let status = ws
        .command()
        .args(["--max-attempts", "1", "--interval-ms", "600", "--timeout-ms", "200"])
        .status()
        .expect("Failed to run verifier");

    // Whatever localhost answers, the run must end with a verdict
    assert!(matches!(status.code(), Some(0) | Some(1)));
    let log = ws.status_log();
    assert!(log.contains("config: Failed to open config source"), "log: {log}");
    assert!(log.contains("seeds: localhost:27017"), "log: {log}");
    assert!(ws.verdict().is_some());
}

#[test]
fn test_empty_topology_is_a_config_error() {
    let ws = Workspace::new();
    ws.write_topology("name=rs\nnumber_of_servers=3\n");

    let status = ws.command().status().expect("Failed to run verifier");

    assert_eq!(status.code(), Some(2));
    assert!(ws.verdict().is_none());
    assert!(ws.status_log().contains("No members configured"));
}

#[test]
fn test_timeout_not_shorter_than_interval_is_rejected() {
    let ws = Workspace::new();
    ws.write_members("rs", &["127.0.0.1:27017".to_string()]);

    let status = ws
        .command()
        .args(["--interval-ms", "1000", "--timeout-ms", "1000"])
        .status()
        .expect("Failed to run verifier");

    assert_eq!(status.code(), Some(2));
    assert!(ws.verdict().is_none());
}

#[test]
fn test_sigterm_during_backoff_leaves_no_verdict() {
    let ws = Workspace::new();
    ws.write_members("rs", &[format!("127.0.0.1:{}", closed_port())]);

    let mut child = ws
        .command()
        .args(["--interval-ms", "30000", "--timeout-ms", "200"])
        .spawn()
        .expect("Failed to spawn verifier");

    let backing_off = wait_for(Duration::from_secs(10), || {
        ws.status_log().contains("state Failed(ConnectionFailed) -> Backoff")
    });
    assert!(backing_off, "log: {}", ws.status_log());

    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).expect("Failed to signal verifier");
    let status = child.wait().expect("Failed to wait for verifier");

    assert_eq!(status.code(), Some(0));
    assert!(ws.verdict().is_none());
    assert!(ws.status_log().contains("no verdict written"));
}

#[test]
fn test_check_mode_reads_token() {
    let ws = Workspace::new();
    let check = |ws: &Workspace| {
        ws.command()
            .arg("--check")
            .status()
            .expect("Failed to run verifier")
            .code()
    };

    assert_eq!(check(&ws), Some(1));

    std::fs::write(
        ws.verdict_path(),
        r#"{"success":false,"timestamp":"2026-10-14T08:00:00Z","replica_set":"rs","attempts":10}"#,
    )
    .unwrap();
    assert_eq!(check(&ws), Some(1));

    std::fs::write(
        ws.verdict_path(),
        r#"{"success":true,"timestamp":"2026-10-14T08:00:05Z","replica_set":"rs","attempts":3}"#,
    )
    .unwrap();
    assert_eq!(check(&ws), Some(0));
}
