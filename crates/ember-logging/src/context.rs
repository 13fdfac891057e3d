//! The log context: handler registry plus the root logger.

use crate::handler::Handler;
use crate::types::{LogLevel, LogRecord};
use ember_common::{LoggingError, LoggingResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

struct RootLogger {
    level: LogLevel,
    handlers: Vec<Arc<dyn Handler>>,
}

/// Registry of named handlers and the ordered handler list of the root
/// logger.
///
/// Publication holds the root read lock for the whole dispatch, so a record
/// reaches exactly the handlers attached when it was published.
pub struct LogContext {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
    root: RwLock<RootLogger>,
    publish_failures: AtomicU64,
}

impl fmt::Debug for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogContext")
            .field("handlers", &self.handler_names())
            .field("attached", &self.attached_handlers())
            .field("root_level", &self.root_level())
            .finish()
    }
}

impl Default for LogContext {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

impl LogContext {
    pub fn new(root_level: LogLevel) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            root: RwLock::new(RootLogger {
                level: root_level,
                handlers: Vec::new(),
            }),
            publish_failures: AtomicU64::new(0),
        }
    }

    pub fn register_handler(&self, handler: Arc<dyn Handler>) -> LoggingResult<()> {
        let mut handlers = self.handlers.write();
        if handlers.contains_key(handler.name()) {
            return Err(LoggingError::DuplicateHandler(handler.name().to_string()));
        }
        debug!(handler = handler.name(), "Handler registered");
        handlers.insert(handler.name().to_string(), handler);
        Ok(())
    }

    /// Remove a detached handler from the registry and return it. The caller
    /// decides whether to close it.
    pub fn unregister_handler(&self, name: &str) -> LoggingResult<Arc<dyn Handler>> {
        let mut handlers = self.handlers.write();
        if !handlers.contains_key(name) {
            return Err(LoggingError::UnknownHandler(name.to_string()));
        }
        if self.is_attached(name) {
            return Err(LoggingError::StillAttached(name.to_string()));
        }
        let handler = handlers
            .remove(name)
            .ok_or_else(|| LoggingError::UnknownHandler(name.to_string()))?;
        debug!(handler = name, "Handler unregistered");
        Ok(handler)
    }

    pub fn handler(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.read().get(name).cloned()
    }

    pub fn handler_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Append a registered handler to the root logger.
    pub fn attach(&self, name: &str) -> LoggingResult<()> {
        self.attach_at(name, usize::MAX)
    }

    /// Insert a registered handler into the root logger's dispatch order at
    /// `index`, clamped to the end of the list.
    pub fn attach_at(&self, name: &str, index: usize) -> LoggingResult<()> {
        let handler = self
            .handler(name)
            .ok_or_else(|| LoggingError::UnknownHandler(name.to_string()))?;
        let mut root = self.root.write();
        if root.handlers.iter().any(|h| h.name() == name) {
            return Err(LoggingError::AlreadyAttached(name.to_string()));
        }
        let index = index.min(root.handlers.len());
        root.handlers.insert(index, handler);
        debug!(handler = name, index, "Handler attached to root logger");
        Ok(())
    }

    pub fn detach(&self, name: &str) -> LoggingResult<()> {
        let mut root = self.root.write();
        let position = root
            .handlers
            .iter()
            .position(|h| h.name() == name)
            .ok_or_else(|| LoggingError::UnknownHandler(name.to_string()))?;
        root.handlers.remove(position);
        debug!(handler = name, "Handler detached from root logger");
        Ok(())
    }

    /// Detach every handler from the root logger.
    pub fn detach_all(&self) {
        self.root.write().handlers.clear();
    }

    pub fn is_attached(&self, name: &str) -> bool {
        self.root.read().handlers.iter().any(|h| h.name() == name)
    }

    /// Names of the root logger's handlers in attachment order.
    pub fn attached_handlers(&self) -> Vec<String> {
        self.root
            .read()
            .handlers
            .iter()
            .map(|h| h.name().to_string())
            .collect()
    }

    pub fn root_level(&self) -> LogLevel {
        self.root.read().level
    }

    pub fn set_root_level(&self, level: LogLevel) {
        self.root.write().level = level;
    }

    pub fn logger(self: &Arc<Self>, category: impl Into<String>) -> Logger {
        Logger {
            category: category.into(),
            context: Arc::clone(self),
        }
    }

    /// Dispatch a record to the attached handlers. Handler failures are
    /// counted, never propagated to the caller.
    pub fn publish(&self, record: &LogRecord) {
        let root = self.root.read();
        if !root.level.admits(record.level) {
            return;
        }
        for handler in &root.handlers {
            if let Err(e) = handler.publish(record) {
                self.publish_failures.fetch_add(1, Ordering::Relaxed);
                warn!(handler = handler.name(), error = %e, "Failed to publish log record");
            }
        }
    }

    pub fn publish_failures(&self) -> u64 {
        self.publish_failures.load(Ordering::Relaxed)
    }

    /// Detach, unregister and close every handler.
    pub fn close_all(&self) -> Vec<LoggingError> {
        self.detach_all();
        let handlers: Vec<Arc<dyn Handler>> =
            self.handlers.write().drain().map(|(_, h)| h).collect();
        handlers.iter().filter_map(|h| h.close().err()).collect()
    }
}

/// A named logger bound to a context.
#[derive(Debug, Clone)]
pub struct Logger {
    category: String,
    context: Arc<LogContext>,
}

impl Logger {
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.context
            .publish(&LogRecord::new(level, self.category.as_str(), message));
    }

    pub fn log_error(&self, level: LogLevel, message: impl Into<String>, error: &dyn std::error::Error) {
        self.context.publish(
            &LogRecord::new(level, self.category.as_str(), message).with_error(error),
        );
    }

    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }
}
