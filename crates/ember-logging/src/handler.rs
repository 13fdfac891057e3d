//! Log handlers: named, level-filtered outputs.

use crate::console::{ConsoleSink, ConsoleStream};
use crate::formatter::Formatter;
use crate::types::{LogLevel, LogRecord};
use ember_common::{LoggingError, LoggingResult};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Trait for writing log records to an output.
pub trait Handler: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn level(&self) -> LogLevel;

    fn set_level(&self, level: LogLevel);

    /// Write a record if it passes this handler's level.
    fn publish(&self, record: &LogRecord) -> LoggingResult<()>;

    fn flush(&self) -> LoggingResult<()>;

    /// Flush and release the output. Later publishes fail with `Closed`.
    fn close(&self) -> LoggingResult<()>;
}

/// Appends formatted records to a UTF-8 file, flushing after each one.
#[derive(Debug)]
pub struct FileHandler {
    name: String,
    level: RwLock<LogLevel>,
    formatter: Box<dyn Formatter>,
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FileHandler {
    /// Open (or create) `path` for appending. Parent directories are created.
    pub fn open(
        name: impl Into<String>,
        level: LogLevel,
        formatter: Box<dyn Formatter>,
        path: impl Into<PathBuf>,
    ) -> LoggingResult<Self> {
        let name = name.into();
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LoggingError::io(&name, parent.display(), &e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LoggingError::io(&name, path.display(), &e))?;

        debug!(handler = %name, path = %path.display(), "File handler opened");

        Ok(Self {
            name,
            level: RwLock::new(level),
            formatter,
            path,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Handler for FileHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> LogLevel {
        *self.level.read()
    }

    fn set_level(&self, level: LogLevel) {
        *self.level.write() = level;
    }

    fn publish(&self, record: &LogRecord) -> LoggingResult<()> {
        if !self.level().admits(record.level) {
            return Ok(());
        }

        let line = self.formatter.format(record);
        let mut guard = self.writer.lock();
        let writer = guard
            .as_mut()
            .ok_or_else(|| LoggingError::Closed(self.name.clone()))?;
        writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| LoggingError::io(&self.name, self.path.display(), &e))
    }

    fn flush(&self) -> LoggingResult<()> {
        match self.writer.lock().as_mut() {
            Some(writer) => writer
                .flush()
                .map_err(|e| LoggingError::io(&self.name, self.path.display(), &e)),
            None => Ok(()),
        }
    }

    fn close(&self) -> LoggingResult<()> {
        let writer = self.writer.lock().take();
        match writer {
            Some(mut writer) => {
                debug!(handler = %self.name, "File handler closed");
                writer
                    .flush()
                    .map_err(|e| LoggingError::io(&self.name, self.path.display(), &e))
            }
            None => Ok(()),
        }
    }
}

/// Writes formatted records to a console sink.
#[derive(Debug)]
pub struct ConsoleHandler {
    name: String,
    level: RwLock<LogLevel>,
    formatter: Box<dyn Formatter>,
    sink: Arc<dyn ConsoleSink>,
    stream: ConsoleStream,
}

impl ConsoleHandler {
    pub fn new(
        name: impl Into<String>,
        level: LogLevel,
        formatter: Box<dyn Formatter>,
        sink: Arc<dyn ConsoleSink>,
        stream: ConsoleStream,
    ) -> Self {
        Self {
            name: name.into(),
            level: RwLock::new(level),
            formatter,
            sink,
            stream,
        }
    }
}

impl Handler for ConsoleHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> LogLevel {
        *self.level.read()
    }

    fn set_level(&self, level: LogLevel) {
        *self.level.write() = level;
    }

    fn publish(&self, record: &LogRecord) -> LoggingResult<()> {
        if !self.level().admits(record.level) {
            return Ok(());
        }
        let line = self.formatter.format(record);
        self.sink
            .write(self.stream, line.as_bytes())
            .map_err(|e| LoggingError::io(&self.name, self.stream, &e))
    }

    fn flush(&self) -> LoggingResult<()> {
        self.sink
            .flush()
            .map_err(|e| LoggingError::io(&self.name, self.stream, &e))
    }

    fn close(&self) -> LoggingResult<()> {
        self.flush()
    }
}
