//! Verbosity-gated logging.
//!
//! Components that report progress own a [`ForecastLogger`] built from the
//! configured [`Verbosity`]. Events go through `tracing`; installing a
//! subscriber is left to the application.

use serde::{Deserialize, Serialize};

/// Verbosity level for processing output.
///
/// Levels are ordered, so `verbosity >= Verbosity::Info` reads as
/// "at least informational output".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// No output.
    #[default]
    Silent,
    /// Errors and warnings only.
    Warning,
    /// Progress and important information.
    Info,
    /// Detailed debugging information.
    Debug,
}

impl std::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verbosity::Silent => "silent",
            Verbosity::Warning => "warning",
            Verbosity::Info => "info",
            Verbosity::Debug => "debug",
        };
        f.write_str(s)
    }
}

/// Logger that drops events above its verbosity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForecastLogger {
    verbosity: Verbosity,
}

impl ForecastLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    #[inline]
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    #[inline]
    pub fn enabled(&self, level: Verbosity) -> bool {
        level != Verbosity::Silent && self.verbosity >= level
    }

    pub fn warn(&self, message: &str) {
        if self.enabled(Verbosity::Warning) {
            tracing::warn!(target: "wqf", "{message}");
        }
    }

    pub fn info(&self, message: &str) {
        if self.enabled(Verbosity::Info) {
            tracing::info!(target: "wqf", "{message}");
        }
    }

    pub fn debug(&self, message: &str) {
        if self.enabled(Verbosity::Debug) {
            tracing::debug!(target: "wqf", "{message}");
        }
    }

    /// Log a `name = value` configuration entry.
    pub fn config(&self, name: &str, value: &str) {
        if self.enabled(Verbosity::Info) {
            tracing::info!(target: "wqf", config = name, value, "config: {name} = {value}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_is_ordered() {
        assert!(Verbosity::Debug > Verbosity::Info);
        assert!(Verbosity::Info > Verbosity::Warning);
        assert!(Verbosity::Warning > Verbosity::Silent);
    }

    #[test]
    fn silent_logger_enables_nothing() {
        let logger = ForecastLogger::new(Verbosity::Silent);
        assert!(!logger.enabled(Verbosity::Warning));
        assert!(!logger.enabled(Verbosity::Silent));
    }

    #[test]
    fn info_logger_gates_debug() {
        let logger = ForecastLogger::new(Verbosity::Info);
        assert!(logger.enabled(Verbosity::Warning));
        assert!(logger.enabled(Verbosity::Info));
        assert!(!logger.enabled(Verbosity::Debug));
    }

    #[test]
    fn verbosity_serializes_lowercase() {
        let json = serde_json::to_string(&Verbosity::Debug).unwrap();
        assert_eq!(json, "\"debug\"");
    }
}
