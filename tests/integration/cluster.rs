//! Checks against a live replica set

use crate::{get_seeds, get_set_name, skip_if_not_enabled, Workspace};

#[test]
fn test_live_replica_set_is_ready() {
    skip_if_not_enabled!();

    let ws = Workspace::new();
    ws.write_members(&get_set_name(), &get_seeds());

    let status = ws
        .command()
        .args(["--max-attempts", "3", "--interval-ms", "2000", "--timeout-ms", "1500"])
        .status()
        .expect("Failed to run verifier");

    assert_eq!(status.code(), Some(0), "log: {}", ws.status_log());
    let verdict = ws.verdict().expect("Verdict should be published");
    assert_eq!(verdict["success"], true);
    assert!(ws.status_log().contains("connection OK!."));
}

#[test]
fn test_live_wrong_set_name() {
    skip_if_not_enabled!();

    let ws = Workspace::new();
    ws.write_members("not-the-configured-set", &get_seeds());

    let status = ws
        .command()
        .args(["--max-attempts", "1", "--interval-ms", "2000", "--timeout-ms", "1500"])
        .status()
        .expect("Failed to run verifier");

    assert_eq!(status.code(), Some(1));
    let log = ws.status_log();
    assert!(
        log.contains("Given rs name doesn't match this replica set."),
        "log: {log}"
    );
}
