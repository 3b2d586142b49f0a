//! Leveled message sink for check output
//!
//! The check engine never decides what is visible. It emits every message
//! with a level and the sink filters:
//! - `Level::Normal` is always shown
//! - `Level::Verbose` is shown only when verbose output was requested

use std::io::Write;
use std::sync::Mutex;

/// Visibility tier of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Always shown
    Normal = 0,
    /// Shown with `--verbose`
    Verbose = 1,
}

/// Destination for check messages
///
/// Shared by every check worker at once, so implementations must serialize
/// their own writes. One call is one message; messages from a single caller
/// must come out in call order.
pub trait LogSink: Sync {
    fn log(&self, message: &str, level: Level);
}

impl<F> LogSink for F
where
    F: Fn(&str, Level) + Sync,
{
    fn log(&self, message: &str, level: Level) {
        self(message, level)
    }
}

/// Line-oriented sink writing visible messages to a writer
pub struct ConsoleSink<W: Write + Send> {
    /// Highest level that gets written
    max_level: Level,
    /// Output, locked for the duration of one line
    out: Mutex<W>,
}

impl Level {
    /// Highest visible level for the `--verbose` setting
    pub fn max_for(verbose: bool) -> Self {
        if verbose { Level::Verbose } else { Level::Normal }
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W, max_level: Level) -> Self {
        Self {
            max_level,
            out: Mutex::new(out),
        }
    }

    /// Recover the writer
    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> LogSink for ConsoleSink<W> {
    fn log(&self, message: &str, level: Level) {
        if level > self.max_level {
            return;
        }
        // A poisoned lock only means another writer panicked mid-line
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(out, "{}", message).and_then(|_| out.flush()) {
            tracing::warn!(error = %e, "failed to write check output");
        }
    }
}

/// Sink decorator attributing every message to one service
///
/// Renders `"<name> | <message>"` and keeps the level of the inner call.
pub struct ServiceLog<'a> {
    name: &'a str,
    inner: &'a dyn LogSink,
}

impl<'a> ServiceLog<'a> {
    pub fn new(name: &'a str, inner: &'a dyn LogSink) -> Self {
        Self { name, inner }
    }
}

impl LogSink for ServiceLog<'_> {
    fn log(&self, message: &str, level: Level) {
        self.inner.log(&format!("{} | {}", self.name, message), level);
    }
}

/// Sink that records everything it is given, for assertions in tests
#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(String, Level)>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded lines in arrival order
    pub fn lines(&self) -> Vec<(String, Level)> {
        self.lines.lock().unwrap().clone()
    }

    /// Whether an exact message was recorded at an exact level
    pub fn contains(&self, message: &str, level: Level) -> bool {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .any(|(m, l)| m == message && *l == level)
    }

    /// Number of recorded messages equal to `message`, at any level
    pub fn count(&self, message: &str) -> usize {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == message)
            .count()
    }

    /// Messages whose text starts with `prefix`, in arrival order
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m.starts_with(prefix))
            .map(|(m, _)| m.clone())
            .collect()
    }
}

#[cfg(test)]
impl LogSink for MemorySink {
    fn log(&self, message: &str, level: Level) {
        self.lines.lock().unwrap().push((message.to_string(), level));
    }
}
