//! Console sinks.
//!
//! Handlers never touch stdio directly; they write through a [`ConsoleSink`]
//! so a host can redirect or capture what an embedded server prints.

use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

/// Which console stream a write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleStream {
    Stdout,
    Stderr,
}

impl fmt::Display for ConsoleStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleStream::Stdout => write!(f, "stdout"),
            ConsoleStream::Stderr => write!(f, "stderr"),
        }
    }
}

pub trait ConsoleSink: Send + Sync + fmt::Debug {
    fn write(&self, stream: ConsoleStream, bytes: &[u8]) -> io::Result<()>;

    fn flush(&self) -> io::Result<()>;
}

/// The real process stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdConsole;

impl ConsoleSink for StdConsole {
    fn write(&self, stream: ConsoleStream, bytes: &[u8]) -> io::Result<()> {
        match stream {
            ConsoleStream::Stdout => io::stdout().lock().write_all(bytes),
            ConsoleStream::Stderr => io::stderr().lock().write_all(bytes),
        }
    }

    fn flush(&self) -> io::Result<()> {
        io::stdout().flush()?;
        io::stderr().flush()
    }
}

#[derive(Debug, Default)]
struct Captured {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// In-memory console. Clones share the same buffers.
#[derive(Debug, Clone, Default)]
pub struct CapturedConsole {
    buffers: Arc<Mutex<Captured>>,
}

impl CapturedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.buffers.lock().stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.buffers.lock().stderr).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        let buffers = self.buffers.lock();
        buffers.stdout.is_empty() && buffers.stderr.is_empty()
    }

    pub fn clear(&self) {
        let mut buffers = self.buffers.lock();
        buffers.stdout.clear();
        buffers.stderr.clear();
    }
}

impl ConsoleSink for CapturedConsole {
    fn write(&self, stream: ConsoleStream, bytes: &[u8]) -> io::Result<()> {
        let mut buffers = self.buffers.lock();
        match stream {
            ConsoleStream::Stdout => buffers.stdout.extend_from_slice(bytes),
            ConsoleStream::Stderr => buffers.stderr.extend_from_slice(bytes),
        }
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}
