//! Leveled log-line emission passed explicitly through every component.
//!
//! The binary uses [`TracingReporter`]; tests use [`MemoryReporter`] to
//! inspect exactly which lines a call produced.

use std::sync::Mutex;
use tracing::Level;

pub trait Reporter {
    fn log(&self, level: Level, message: &str);

    fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }
}

/// Forwards every line to the installed tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn log(&self, level: Level, message: &str) {
        if level == Level::ERROR {
            tracing::error!("{}", message);
        } else if level == Level::WARN {
            tracing::warn!("{}", message);
        } else if level == Level::INFO {
            tracing::info!("{}", message);
        } else if level == Level::DEBUG {
            tracing::debug!("{}", message);
        } else {
            tracing::trace!("{}", message);
        }
    }
}

/// Records lines in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    lines: Mutex<Vec<(Level, String)>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded line in emission order.
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// Whether an exact `(level, message)` pair was recorded.
    pub fn contains(&self, level: Level, message: &str) -> bool {
        self.lines()
            .iter()
            .any(|(l, m)| *l == level && m == message)
    }

    /// Number of recorded lines at `level` whose text contains `fragment`.
    pub fn count_matching(&self, level: Level, fragment: &str) -> usize {
        self.lines()
            .iter()
            .filter(|(l, m)| *l == level && m.contains(fragment))
            .count()
    }
}

impl Reporter for MemoryReporter {
    fn log(&self, level: Level, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, message.to_string()));
        }
    }
}
