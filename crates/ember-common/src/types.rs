//! Core identifiers used throughout the ember crates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one managed process for the lifetime of its handle.
///
/// # Example
/// ```
/// use ember_common::ProcessId;
///
/// let id = ProcessId::from("standalone-1");
/// assert_eq!(id.as_str(), "standalone-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(String);

impl ProcessId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProcessId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProcessId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two kinds of embedded process that can be hosted.
///
/// They differ only in where the logging subsystem sits in the management
/// tree: a host controller nests it under a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessKind {
    Standalone,
    HostController,
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessKind::Standalone => write!(f, "standalone"),
            ProcessKind::HostController => write!(f, "host-controller"),
        }
    }
}
