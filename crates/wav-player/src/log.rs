//! Logger sink collaborator.
//!
//! The player reports user-facing events (load failures, redundant stops, volume rejections)
//! through an optional [`LogSink`]. Without a sink those messages are dropped.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        })
    }
}

pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Forwards player messages to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => tracing::info!(target: "wav_player", "{message}"),
            LogLevel::Warning => tracing::warn!(target: "wav_player", "{message}"),
            LogLevel::Error => tracing::error!(target: "wav_player", "{message}"),
        }
    }
}

/// Swappable slot holding the optional sink.
#[derive(Default)]
pub(crate) struct Diagnostics {
    sink: RwLock<Option<Arc<dyn LogSink>>>,
}

impl Diagnostics {
    pub(crate) fn set_sink(&self, sink: Option<Arc<dyn LogSink>>) {
        *self.sink.write().unwrap_or_else(PoisonError::into_inner) = sink;
    }

    fn emit(&self, level: LogLevel, message: &str) {
        let sink = self
            .sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(sink) = sink {
            sink.log(level, message);
        }
    }

    pub(crate) fn info(&self, message: impl AsRef<str>) {
        self.emit(LogLevel::Info, message.as_ref());
    }

    pub(crate) fn warn(&self, message: impl AsRef<str>) {
        self.emit(LogLevel::Warning, message.as_ref());
    }

    pub(crate) fn error(&self, message: impl AsRef<str>) {
        self.emit(LogLevel::Error, message.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingSink;

    #[test]
    fn messages_without_sink_are_dropped() {
        let diag = Diagnostics::default();
        diag.error("nobody listens");
    }

    #[test]
    fn messages_reach_attached_sink_until_cleared() {
        let diag = Diagnostics::default();
        let sink = Arc::new(RecordingSink::default());
        diag.set_sink(Some(sink.clone()));
        diag.warn("first");
        diag.set_sink(None);
        diag.info("second");

        assert_eq!(sink.entries(), vec![(LogLevel::Warning, "first".to_string())]);
    }
}
