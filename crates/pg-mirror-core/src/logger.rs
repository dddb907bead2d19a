//! Logging interface handed to every pipeline stage.
//!
//! Stages never reach for a process-wide logger directly; they receive a
//! `&dyn MirrorLogger`. The binary passes [`FacadeLogger`], which forwards to
//! the `log` facade, and tests pass [`RecordingLogger`].

use std::fmt;

use log::Level;
use parking_lot::Mutex;

pub const LOG_TARGET: &str = "pg_mirror";

pub trait MirrorLogger: Send + Sync {
    fn log(&self, level: Level, args: fmt::Arguments<'_>);

    fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }
}

/// Forwards to the `log` crate under the `pg_mirror` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeLogger;

impl MirrorLogger for FacadeLogger {
    fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        log::log!(target: LOG_TARGET, level, "{args}");
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<(Level, String)>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.lock().clone()
    }

    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(lvl, _)| *lvl == level)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    /// True when any recorded message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.lock().iter().any(|(_, msg)| msg.contains(needle))
    }
}

impl MirrorLogger for RecordingLogger {
    fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        self.entries.lock().push((level, args.to_string()));
    }
}
