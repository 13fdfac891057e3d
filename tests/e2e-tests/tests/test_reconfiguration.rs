//! Reconfiguration correctness.
//!
//! A file handler installed through the configurator receives every later
//! record with its literal prefix, nothing reaches the console, and removing
//! it restores the logging subtree.

use e2e_tests::assertions::{
    assert_console_silent, assert_message_absent, assert_prefixed_message,
};
use e2e_tests::{TestServer, TEST_PATTERN, TEST_PREFIX};
use ember_common::{ManagementError, ProcessKind};
use ember_logging::{HandlerConfig, LoggingConfigurator};
use ember_management::ExecutableExt;
use ember_process_management::{LoggerHint, StopOutcome};
use serde_json::json;

async fn configure_log_and_remove(kind: ProcessKind) {
    let mut server = TestServer::started(kind, LoggerHint::Default).await;
    let addresses = server.addresses();
    let root = addresses.root_logger().clone();
    let handler = addresses.file_handler("FILE-TEST").unwrap();
    let handler_log = server.log_dir().join("file-test.log");

    let handlers_before = server.client().read_attribute(&root, "handlers").unwrap();
    assert_eq!(handlers_before, json!(["FILE"]));

    let configurator = LoggingConfigurator::new(server.client());
    let config = HandlerConfig::new("FILE-TEST", "INFO", TEST_PATTERN, &handler_log);
    configurator
        .configure_file_handler(&root, &handler, &config)
        .unwrap();

    assert_eq!(
        server.client().read_attribute(&root, "handlers").unwrap(),
        json!(["FILE", "FILE-TEST"])
    );

    server.logger("org.ember.test").info("Test message");
    assert_prefixed_message(&handler_log, TEST_PREFIX, "Test message").unwrap();
    // the bootstrap handler still receives records
    assert!(std::fs::read_to_string(server.server_log())
        .unwrap()
        .contains("Test message"));
    assert_console_silent(&server.console).unwrap();

    configurator
        .remove_file_handler(&root, &handler, "FILE-TEST")
        .unwrap();
    assert_eq!(
        server.client().read_attribute(&root, "handlers").unwrap(),
        handlers_before
    );
    assert!(matches!(
        server.client().read_resource(&handler),
        Err(ManagementError::NotFound { .. })
    ));

    server.logger("org.ember.test").info("After removal");
    assert_message_absent(&handler_log, "After removal").unwrap();
    assert_console_silent(&server.console).unwrap();

    assert_eq!(server.stop().await, StopOutcome::Stopped);
}

#[tokio::test]
async fn test_reconfigure_standalone() {
    configure_log_and_remove(ProcessKind::Standalone).await;
}

#[tokio::test]
async fn test_reconfigure_host_controller() {
    configure_log_and_remove(ProcessKind::HostController).await;
}

#[tokio::test]
async fn test_repeated_round_trips() {
    let mut server = TestServer::started(ProcessKind::Standalone, LoggerHint::Default).await;
    let addresses = server.addresses();
    let root = addresses.root_logger().clone();
    let handler = addresses.file_handler("FILE-TEST").unwrap();
    let handler_log = server.log_dir().join("file-test.log");
    let config = HandlerConfig::new("FILE-TEST", "INFO", TEST_PATTERN, &handler_log);
    let configurator = LoggingConfigurator::new(server.client());

    for round in 0..3 {
        configurator
            .configure_file_handler(&root, &handler, &config)
            .unwrap();
        server
            .logger("org.ember.test")
            .info(format!("round {}", round));
        configurator
            .remove_file_handler(&root, &handler, "FILE-TEST")
            .unwrap();
    }

    for round in 0..3 {
        assert_prefixed_message(&handler_log, TEST_PREFIX, &format!("round {}", round)).unwrap();
    }
    assert_eq!(server.stop().await, StopOutcome::Stopped);
}

#[tokio::test]
async fn test_handler_in_same_file_as_server_log() {
    let mut server = TestServer::started(ProcessKind::Standalone, LoggerHint::Default).await;
    let addresses = server.addresses();
    let root = addresses.root_logger().clone();
    let handler = addresses.file_handler("FILE-TEST").unwrap();
    let server_log = server.server_log();

    let configurator = LoggingConfigurator::new(server.client());
    let config = HandlerConfig::new("FILE-TEST", "INFO", TEST_PATTERN, &server_log);
    configurator
        .configure_file_handler(&root, &handler, &config)
        .unwrap();
    server.logger("org.ember.test").info("Test message");
    configurator
        .remove_file_handler(&root, &handler, "FILE-TEST")
        .unwrap();

    let content = std::fs::read_to_string(&server_log).unwrap();
    // once through the bootstrap handler, once through FILE-TEST
    assert_eq!(content.matches("Test message").count(), 2);
    assert_prefixed_message(&server_log, TEST_PREFIX, "Test message").unwrap();
    assert_eq!(server.stop().await, StopOutcome::Stopped);
}
