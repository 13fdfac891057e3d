//! Readiness-gated log presence.
//!
//! `start` is gated on `server.log` existing. Once it returns, the file must
//! exist and every line must carry the bootstrap prefix of the logger hint.

use e2e_tests::assertions::{assert_console_silent, assert_every_line_matches, bootstrap_line_regex};
use e2e_tests::TestServer;
use ember_common::ProcessKind;
use ember_process_management::{LoggerHint, StopOutcome};
use ember_process_state::ProcessState;

async fn check_bootstrap_log(kind: ProcessKind, hint: LoggerHint) {
    let mut server = TestServer::started(kind, hint).await;
    assert_eq!(server.handle.state(), ProcessState::Running);

    let log = server.server_log();
    assert!(log.is_file(), "{} missing after start", log.display());
    assert_every_line_matches(&log, &bootstrap_line_regex(hint)).unwrap();
    assert_console_silent(&server.console).unwrap();

    assert_eq!(server.stop().await, StopOutcome::Stopped);
    assert_every_line_matches(&log, &bootstrap_line_regex(hint)).unwrap();
}

#[tokio::test]
async fn test_standalone_default_hint() {
    check_bootstrap_log(ProcessKind::Standalone, LoggerHint::Default).await;
}

#[tokio::test]
async fn test_standalone_compact_hint() {
    check_bootstrap_log(ProcessKind::Standalone, LoggerHint::Compact).await;
}

#[tokio::test]
async fn test_standalone_json_hint() {
    check_bootstrap_log(ProcessKind::Standalone, LoggerHint::Json).await;
}

#[tokio::test]
async fn test_host_controller_default_hint() {
    check_bootstrap_log(ProcessKind::HostController, LoggerHint::Default).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_multi_threaded_runtime() {
    check_bootstrap_log(ProcessKind::Standalone, LoggerHint::Default).await;
}
