//! Ready-made readiness checks for `ProcessLifecycleController::start`.
//!
//! Any `Fn(&ProcessHandle) -> bool` works; these cover the common cases.

use crate::handle::ProcessHandle;
use std::path::PathBuf;

/// Ready once `path` exists as a regular file.
pub fn log_file_exists(path: impl Into<PathBuf>) -> impl Fn(&ProcessHandle) -> bool {
    let path = path.into();
    move |_: &ProcessHandle| path.is_file()
}

/// Ready once the handle's `server.log` exists.
pub fn server_log_exists() -> impl Fn(&ProcessHandle) -> bool {
    |handle: &ProcessHandle| handle.server_log_path().is_file()
}

/// Ready once the process finished booting.
pub fn booted() -> impl Fn(&ProcessHandle) -> bool {
    |handle: &ProcessHandle| handle.is_booted()
}
