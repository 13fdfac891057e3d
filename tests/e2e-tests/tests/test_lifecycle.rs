//! Lifecycle scenarios: double start, timeout, stop idempotence.

use e2e_tests::TestServer;
use ember_common::{ProcessError, ProcessKind};
use ember_logging::CapturedConsole;
use ember_process_management::{
    readiness, Configuration, ControllerOptions, EmbeddedServer, LoggerHint,
    ProcessLifecycleController, StopOutcome,
};
use ember_process_state::ProcessState;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_stop_twice() {
    let mut server = TestServer::started(ProcessKind::Standalone, LoggerHint::Default).await;

    assert_eq!(server.stop().await, StopOutcome::Stopped);
    assert_eq!(server.stop().await, StopOutcome::AlreadyStopped);
    assert_eq!(server.handle.state(), ProcessState::Stopped);
    assert!(server.handle.management_client().is_err());
}

#[tokio::test]
async fn test_start_twice() {
    let mut server = TestServer::started(ProcessKind::Standalone, LoggerHint::Default).await;

    let err = server.start().await.unwrap_err();
    assert!(matches!(err, ProcessError::InvalidState { .. }));
    assert_eq!(server.handle.state(), ProcessState::Running);

    server.stop().await;
}

#[tokio::test]
async fn test_startup_timeout_requires_explicit_stop() {
    let dir = TempDir::new().unwrap();
    let console = CapturedConsole::new();
    let controller = ProcessLifecycleController::with_options(ControllerOptions {
        poll_interval: Duration::from_millis(5),
        console: Arc::new(console.clone()),
    });
    let config = Configuration::builder()
        .log_directory(dir.path().join("log"))
        .build()
        .unwrap();
    let server = EmbeddedServer::new(
        "slow-1".into(),
        ProcessKind::Standalone,
        config.clone(),
        Arc::new(console.clone()),
    )
    .with_boot_delay(Duration::from_secs(60));
    let mut handle = controller
        .create_with(ProcessKind::Standalone, config, Box::new(server))
        .unwrap();

    let err = controller
        .start(
            &mut handle,
            readiness::server_log_exists(),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessError::StartupTimeout { .. }));
    assert_eq!(handle.state(), ProcessState::Starting);
    assert!(handle.management_client().is_err());

    assert_eq!(controller.stop(&mut handle).await, StopOutcome::Stopped);
    assert_eq!(handle.state(), ProcessState::Stopped);
    // the aborted boot never created the log
    assert!(!handle.server_log_path().exists());
    assert!(console.is_empty());
}

#[tokio::test]
async fn test_console_output_when_capture_disabled() {
    let dir = TempDir::new().unwrap();
    let console = CapturedConsole::new();
    let controller = ProcessLifecycleController::with_options(ControllerOptions {
        poll_interval: Duration::from_millis(5),
        console: Arc::new(console.clone()),
    });
    let config = Configuration::builder()
        .log_directory(dir.path().join("log"))
        .console_capture_enabled(false)
        .build()
        .unwrap();
    let mut handle = controller.create(config).unwrap();

    controller
        .start(&mut handle, readiness::booted(), Duration::from_secs(30))
        .await
        .unwrap();
    assert!(console.stdout().contains("[org.ember.server]"));

    controller.stop(&mut handle).await;
}
