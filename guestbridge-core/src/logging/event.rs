//! Log line types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Log severity level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debugging information.
    Debug,
    /// Informational messages.
    #[default]
    Info,
    /// Warning messages.
    Warn,
    /// Error messages.
    Error,
}

impl LogLevel {
    /// Parse a log level from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSource {
    /// The bridge itself (loads, skipped exports, faults).
    Host,
    /// Text the guest sent through the `log` import.
    Guest,
}

/// One collected log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    /// Sequence number, assigned by the collector.
    pub id: u64,
    /// Severity.
    pub level: LogLevel,
    /// Origin.
    pub source: LogSource,
    /// Message text.
    pub message: String,
}

impl LogLine {
    /// Create a line. The id is filled in on collection.
    pub fn new(level: LogLevel, source: LogSource, message: impl Into<String>) -> Self {
        Self {
            id: 0,
            level,
            source,
            message: message.into(),
        }
    }

    /// Host info line.
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, LogSource::Host, message)
    }

    /// Host warning line.
    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, LogSource::Host, message)
    }

    /// Host error line.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, LogSource::Host, message)
    }

    /// Line sent by the guest.
    pub fn guest(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, LogSource::Guest, message)
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.source {
            LogSource::Host => "host",
            LogSource::Guest => "guest",
        };
        write!(f, "[{}] {} {}", self.level, source, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn line_display() {
        let line = LogLine::guest("hello");
        assert_eq!(line.to_string(), "[info] guest hello");
    }
}
