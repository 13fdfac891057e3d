//! E2E integration tests for the ember embedded host

// Bootstrap logging
mod test_readiness_log_presence;

// Runtime reconfiguration
mod test_reconfiguration;
mod test_composite_rollback;

// Lifecycle
mod test_lifecycle;
