//! All-or-nothing composites against a running server.

use e2e_tests::{TestServer, TEST_PATTERN};
use ember_common::{CompositeError, ManagementError, ProcessKind, RollbackOutcome};
use ember_logging::{CompositeState, HandlerConfig, LoggingConfigurator};
use ember_management::ExecutableExt;
use ember_process_management::LoggerHint;
use serde_json::json;

#[tokio::test]
async fn test_step_two_failure_leaves_no_handler_behind() {
    let mut server = TestServer::started(ProcessKind::Standalone, LoggerHint::Default).await;
    let addresses = server.addresses();
    let root = addresses.root_logger().clone();
    let handler = addresses.file_handler("FILE-TEST").unwrap();

    // "FILE" is already attached to the root logger, so the append fails
    let config = HandlerConfig::new("FILE", "INFO", TEST_PATTERN, server.log_dir().join("x.log"));
    let configurator = LoggingConfigurator::new(server.client());
    let err = configurator
        .configure_file_handler(&root, &handler, &config)
        .unwrap_err();

    assert!(matches!(
        err,
        CompositeError::OperationFailed {
            step: 2,
            cause: ManagementError::DuplicateValue { .. },
            rollback: RollbackOutcome::RolledBack { compensations: 1 },
            ..
        }
    ));
    assert_eq!(
        configurator.last_transitions().last(),
        Some(&CompositeState::RolledBack)
    );
    assert_eq!(
        server.client().read_attribute(&root, "handlers").unwrap(),
        json!(["FILE"])
    );

    // the handler address is free again
    server
        .client()
        .add_resource(&handler, HandlerConfig::new("FILE-TEST", "INFO", TEST_PATTERN, "y.log").to_attributes())
        .unwrap();
    server.client().remove_resource(&handler).unwrap();

    server.stop().await;
}

#[tokio::test]
async fn test_duplicate_attach_is_rejected() {
    let mut server = TestServer::started(ProcessKind::Standalone, LoggerHint::Default).await;
    let root = server.addresses().root_logger().clone();

    let err = server
        .client()
        .append_to_list(&root, "handlers", "FILE")
        .unwrap_err();
    assert!(matches!(err, ManagementError::DuplicateValue { .. }));

    let err = server
        .client()
        .append_to_list(&root, "handlers", "NO-SUCH-HANDLER")
        .unwrap_err();
    assert!(matches!(err, ManagementError::NotFound { .. }));

    server.stop().await;
}

#[tokio::test]
async fn test_attached_handler_cannot_be_removed() {
    let mut server = TestServer::started(ProcessKind::Standalone, LoggerHint::Default).await;
    let file = server.addresses().file_handler("FILE").unwrap();

    let err = server.client().remove_resource(&file).unwrap_err();
    assert!(matches!(err, ManagementError::ResourceInUse { .. }));
    assert!(server.client().read_resource(&file).is_ok());

    server.stop().await;
}
