//! The logging subsystem: the runtime stage behind `subsystem=logging`.
//!
//! Resources under the subsystem map onto the live [`LogContext`]:
//!
//! | model change | runtime effect |
//! |---|---|
//! | add `file-handler=N` | open a [`FileHandler`] named `N` |
//! | add `console-handler=N` | create a [`ConsoleHandler`] named `N` |
//! | add `root-logger=ROOT` | set the root level, attach listed handlers |
//! | list-add `handlers` on the root logger | attach |
//! | list-remove `handlers` on the root logger | detach |
//! | remove a handler | unregister and close |

use crate::console::{ConsoleSink, ConsoleStream};
use crate::context::LogContext;
use crate::formatter::{FormatterSpec, DEFAULT_PATTERN};
use crate::handler::{ConsoleHandler, FileHandler, Handler};
use crate::types::LogLevel;
use ember_common::{LoggingError, LoggingResult, ManagementError, ManagementResult, ProcessKind};
use ember_management::{
    ManagementTree, Operation, PathElement, ResourceAddress, RuntimeStage, Value,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub const SUBSYSTEM: &str = "subsystem";
pub const LOGGING: &str = "logging";
pub const PROFILE: &str = "profile";
pub const DEFAULT_PROFILE: &str = "default";
pub const ROOT_LOGGER: &str = "root-logger";
pub const ROOT_LOGGER_NAME: &str = "ROOT";
pub const FILE_HANDLER: &str = "file-handler";
pub const CONSOLE_HANDLER: &str = "console-handler";

/// Attribute names understood by the subsystem.
pub mod attributes {
    pub const LEVEL: &str = "level";
    pub const FORMATTER: &str = "formatter";
    pub const NAMED_FORMATTER: &str = "named-formatter";
    pub const FILE: &str = "file";
    pub const PATH: &str = "path";
    pub const TARGET: &str = "target";
    pub const HANDLERS: &str = "handlers";
}

/// Value of `named-formatter` selecting JSON output.
pub const JSON_FORMATTER: &str = "JSON";

/// Bootstrap file handler name and file.
pub const BOOTSTRAP_FILE_HANDLER: &str = "FILE";
pub const BOOTSTRAP_CONSOLE_HANDLER: &str = "CONSOLE";
pub const SERVER_LOG: &str = "server.log";

/// Addresses of the logging subtree for one process kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingAddresses {
    subsystem: ResourceAddress,
    root_logger: ResourceAddress,
}

impl LoggingAddresses {
    pub fn for_kind(kind: ProcessKind) -> ManagementResult<Self> {
        let subsystem = match kind {
            ProcessKind::Standalone => ResourceAddress::of(SUBSYSTEM, LOGGING)?,
            ProcessKind::HostController => ResourceAddress::new(vec![
                PathElement::new(PROFILE, DEFAULT_PROFILE),
                PathElement::new(SUBSYSTEM, LOGGING),
            ])?,
        };
        let root_logger = subsystem.append(PathElement::new(ROOT_LOGGER, ROOT_LOGGER_NAME))?;
        Ok(Self {
            subsystem,
            root_logger,
        })
    }

    pub fn subsystem(&self) -> &ResourceAddress {
        &self.subsystem
    }

    pub fn root_logger(&self) -> &ResourceAddress {
        &self.root_logger
    }

    pub fn file_handler(&self, name: &str) -> ManagementResult<ResourceAddress> {
        self.subsystem.append(PathElement::new(FILE_HANDLER, name))
    }

    pub fn console_handler(&self, name: &str) -> ManagementResult<ResourceAddress> {
        self.subsystem.append(PathElement::new(CONSOLE_HANDLER, name))
    }
}

/// Handler setup applied before the tree accepts client operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapLogging {
    pub formatter: FormatterSpec,
    pub level: LogLevel,
    pub file_name: String,
    /// Also install `console-handler=CONSOLE` writing to the console sink.
    pub console: bool,
}

impl Default for BootstrapLogging {
    fn default() -> Self {
        Self {
            formatter: FormatterSpec::Pattern(DEFAULT_PATTERN.to_string()),
            level: LogLevel::Info,
            file_name: SERVER_LOG.to_string(),
            console: false,
        }
    }
}

/// Attributes selecting `spec` on a handler resource.
pub fn formatter_attributes(spec: &FormatterSpec) -> BTreeMap<String, Value> {
    match spec {
        FormatterSpec::Pattern(pattern) => {
            BTreeMap::from([(attributes::FORMATTER.to_string(), json!(pattern))])
        }
        FormatterSpec::Json => {
            BTreeMap::from([(attributes::NAMED_FORMATTER.to_string(), json!(JSON_FORMATTER))])
        }
    }
}

/// Runtime stage for the logging subtree.
#[derive(Debug)]
pub struct LoggingSubsystem {
    context: Arc<LogContext>,
    log_directory: PathBuf,
    console: Arc<dyn ConsoleSink>,
    addresses: LoggingAddresses,
}

impl LoggingSubsystem {
    pub fn new(
        context: Arc<LogContext>,
        log_directory: impl Into<PathBuf>,
        console: Arc<dyn ConsoleSink>,
        addresses: LoggingAddresses,
    ) -> Self {
        Self {
            context,
            log_directory: log_directory.into(),
            console,
            addresses,
        }
    }

    pub fn addresses(&self) -> &LoggingAddresses {
        &self.addresses
    }

    pub fn context(&self) -> &Arc<LogContext> {
        &self.context
    }

    /// Relative handler paths live in the log directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.log_directory.join(path)
        }
    }

    /// Register this stage with `tree` and create the bootstrap resources.
    pub fn install(
        self: &Arc<Self>,
        tree: &ManagementTree,
        bootstrap: &BootstrapLogging,
    ) -> ManagementResult<()> {
        tree.register_stage(
            self.addresses.subsystem.clone(),
            Arc::clone(self) as Arc<dyn RuntimeStage>,
        );

        let mut operations = Vec::new();
        let elements = self.addresses.subsystem.elements();
        for depth in 1..=elements.len() {
            let address = ResourceAddress::new(elements[..depth].to_vec())?;
            if !tree.contains(&address) {
                operations.push(Operation::add_resource(address, BTreeMap::new()));
            }
        }

        let mut handler_attributes = formatter_attributes(&bootstrap.formatter);
        handler_attributes.insert(attributes::LEVEL.to_string(), json!(bootstrap.level));

        let mut file_attributes = handler_attributes.clone();
        file_attributes.insert(
            attributes::FILE.to_string(),
            json!({ attributes::PATH: bootstrap.file_name }),
        );
        operations.push(Operation::add_resource(
            self.addresses.file_handler(BOOTSTRAP_FILE_HANDLER)?,
            file_attributes,
        ));

        let mut root_handlers = vec![BOOTSTRAP_FILE_HANDLER];
        if bootstrap.console {
            let mut console_attributes = handler_attributes;
            console_attributes.insert(
                attributes::TARGET.to_string(),
                json!(ConsoleStream::Stdout.to_string()),
            );
            operations.push(Operation::add_resource(
                self.addresses.console_handler(BOOTSTRAP_CONSOLE_HANDLER)?,
                console_attributes,
            ));
            root_handlers.push(BOOTSTRAP_CONSOLE_HANDLER);
        }

        operations.push(Operation::add_resource(
            self.addresses.root_logger.clone(),
            BTreeMap::from([
                (attributes::LEVEL.to_string(), json!(bootstrap.level)),
                (attributes::HANDLERS.to_string(), json!(root_handlers)),
            ]),
        ));

        for operation in &operations {
            tree.execute(operation).into_result()?;
        }
        debug!(subsystem = %self.addresses.subsystem, "Logging subsystem installed");
        Ok(())
    }

    fn add_file_handler(&self, name: &str, attrs: &BTreeMap<String, Value>) -> LoggingResult<()> {
        let level = level_attribute(attrs)?;
        let formatter = formatter_attribute(name, attrs)?.build()?;
        let path = attrs
            .get(attributes::FILE)
            .and_then(|file| file.get(attributes::PATH))
            .and_then(Value::as_str)
            .ok_or_else(|| LoggingError::invalid_handler_config(name, "missing file.path"))?;

        let handler = FileHandler::open(name, level, formatter, self.resolve_path(path))?;
        self.context.register_handler(Arc::new(handler))
    }

    fn add_console_handler(
        &self,
        name: &str,
        attrs: &BTreeMap<String, Value>,
    ) -> LoggingResult<()> {
        let level = level_attribute(attrs)?;
        let formatter = formatter_attribute(name, attrs)?.build()?;
        let stream = match attrs.get(attributes::TARGET).and_then(Value::as_str) {
            None | Some("stdout") | Some("System.out") => ConsoleStream::Stdout,
            Some("stderr") | Some("System.err") => ConsoleStream::Stderr,
            Some(other) => {
                return Err(LoggingError::invalid_handler_config(
                    name,
                    format!("unknown console target '{}'", other),
                ))
            }
        };
        let handler = ConsoleHandler::new(name, level, formatter, Arc::clone(&self.console), stream);
        self.context.register_handler(Arc::new(handler))
    }

    fn configure_root(&self, attrs: &BTreeMap<String, Value>) -> LoggingResult<()> {
        let level = level_attribute(attrs)?;
        let names = match attrs.get(attributes::HANDLERS) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => values
                .iter()
                .map(handler_name)
                .collect::<LoggingResult<Vec<_>>>()?,
            Some(other) => {
                return Err(LoggingError::invalid_handler_config(
                    ROOT_LOGGER_NAME,
                    format!("'{}' must be a list, got {}", attributes::HANDLERS, other),
                ))
            }
        };

        // check everything up front so a rejection attaches nothing
        for (i, name) in names.iter().enumerate() {
            if self.context.handler(name).is_none() {
                return Err(LoggingError::UnknownHandler(name.to_string()));
            }
            if names[..i].contains(name) || self.context.is_attached(name) {
                return Err(LoggingError::AlreadyAttached(name.to_string()));
            }
        }

        self.context.set_root_level(level);
        for name in names {
            self.context.attach(name)?;
        }
        Ok(())
    }

    fn remove_handler(&self, name: &str) -> LoggingResult<()> {
        let handler = self.context.unregister_handler(name)?;
        if let Err(e) = handler.close() {
            // the handler is gone either way
            warn!(handler = name, error = %e, "Failed to close removed handler");
        }
        Ok(())
    }

    fn dispatch(&self, operation: &Operation) -> LoggingResult<()> {
        let target = operation.address().last();
        let name = target.name.as_str();

        match (operation, target.kind.as_str()) {
            (Operation::AddResource { attributes, .. }, FILE_HANDLER) => {
                self.add_file_handler(name, attributes)
            }
            (Operation::AddResource { attributes, .. }, CONSOLE_HANDLER) => {
                self.add_console_handler(name, attributes)
            }
            (Operation::AddResource { attributes, .. }, ROOT_LOGGER) => {
                self.configure_root(attributes)
            }
            (Operation::RemoveResource { .. }, FILE_HANDLER | CONSOLE_HANDLER) => {
                self.remove_handler(name)
            }
            (Operation::RemoveResource { .. }, ROOT_LOGGER) => {
                self.context.detach_all();
                Ok(())
            }
            (
                Operation::ListAppend {
                    attribute,
                    value,
                    index,
                    ..
                },
                ROOT_LOGGER,
            ) if attribute == attributes::HANDLERS => match index {
                Some(index) => self.context.attach_at(handler_name(value)?, *index),
                None => self.context.attach(handler_name(value)?),
            },
            (
                Operation::ListRemove {
                    attribute, value, ..
                },
                ROOT_LOGGER,
            ) if attribute == attributes::HANDLERS => self.context.detach(handler_name(value)?),
            _ => Ok(()),
        }
    }
}

impl RuntimeStage for LoggingSubsystem {
    fn apply(&self, operation: &Operation) -> ManagementResult<()> {
        self.dispatch(operation).map_err(|e| {
            ManagementError::runtime_failure(operation.name(), operation.address(), e.to_string())
        })
    }
}

fn handler_name(value: &Value) -> LoggingResult<&str> {
    value
        .as_str()
        .ok_or_else(|| LoggingError::UnknownHandler(value.to_string()))
}

fn level_attribute(attrs: &BTreeMap<String, Value>) -> LoggingResult<LogLevel> {
    match attrs.get(attributes::LEVEL) {
        None | Some(Value::Null) => Ok(LogLevel::Info),
        Some(Value::String(level)) => level.parse(),
        Some(other) => Err(LoggingError::InvalidLevel(other.to_string())),
    }
}

fn formatter_attribute(handler: &str, attrs: &BTreeMap<String, Value>) -> LoggingResult<FormatterSpec> {
    if let Some(named) = attrs.get(attributes::NAMED_FORMATTER) {
        return match named.as_str() {
            Some(JSON_FORMATTER) => Ok(FormatterSpec::Json),
            _ => Err(LoggingError::invalid_handler_config(
                handler,
                format!("unknown named formatter {}", named),
            )),
        };
    }
    match attrs.get(attributes::FORMATTER) {
        None | Some(Value::Null) => Ok(FormatterSpec::Pattern(DEFAULT_PATTERN.to_string())),
        Some(Value::String(pattern)) => Ok(FormatterSpec::Pattern(pattern.clone())),
        Some(other) => Err(LoggingError::invalid_handler_config(
            handler,
            format!("formatter must be a pattern string, got {}", other),
        )),
    }
}
