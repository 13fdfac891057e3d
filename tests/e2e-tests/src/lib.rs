// E2E test framework for embedded ember servers

pub mod assertions;
pub mod harness;
pub mod log_parser;

pub use harness::TestServer;
pub use log_parser::LogParser;

/// Pattern used by the reconfiguration scenarios.
pub const TEST_PATTERN: &str = "[test-prefix] %d{HH:mm:ss,SSS} %-5p [%c] (%t) %s%e%n";

/// Literal prefix produced by [`TEST_PATTERN`].
pub const TEST_PREFIX: &str = "[test-prefix] ";
