//! Logging settings, part of [`BridgeConfig`](crate::config::BridgeConfig).

use guestbridge_core::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::IsTerminal;
use std::str::FromStr;

/// How log lines are rendered on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event, fields flattened.
    Json,
    /// Multi-line, colored.
    Pretty,
    /// One line per event.
    Compact,
}

impl LogFormat {
    /// `Pretty` on a terminal, `Compact` otherwise.
    pub fn detect() -> Self {
        if std::io::stderr().is_terminal() {
            Self::Pretty
        } else {
            Self::Compact
        }
    }
}

impl FromStr for LogFormat {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(BridgeError::Config {
                field: "logging.format".to_string(),
                cause: format!("unknown log format '{other}'"),
            }),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        })
    }
}

/// The `logging` section.
///
/// ```yaml
/// logging:
///   format: json
///   filter: warn,guestbridge_runtime=debug
///   location: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Output format. Detected from the terminal when unset.
    pub format: Option<LogFormat>,
    /// `EnvFilter` directives.
    pub filter: String,
    /// Include file and line.
    pub location: bool,
    /// Include thread ids.
    pub thread_ids: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: None,
            filter: "info".to_string(),
            location: false,
            thread_ids: false,
        }
    }
}

impl LogSettings {
    /// Effective output format.
    pub fn format(&self) -> LogFormat {
        self.format.unwrap_or_else(LogFormat::detect)
    }

    /// Filter for a `-v` count: 0 is warn, then info, debug, trace.
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        self.filter = match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
        .to_string();
        self
    }

    /// Apply `GUESTBRIDGE_LOG_FORMAT`, `GUESTBRIDGE_LOG` (or `RUST_LOG`)
    /// and `GUESTBRIDGE_LOG_LOCATION`.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup("GUESTBRIDGE_LOG_FORMAT") {
            self.format = Some(raw.parse()?);
        }
        if let Some(filter) = lookup("GUESTBRIDGE_LOG").or_else(|| lookup("RUST_LOG")) {
            self.filter = filter;
        }
        if let Some(raw) = lookup("GUESTBRIDGE_LOG_LOCATION") {
            self.location = matches!(raw.trim(), "1" | "true" | "yes");
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("xml".parse::<LogFormat>().unwrap_err().code(), "E501");
        assert_eq!(LogFormat::Pretty.to_string(), "pretty");
    }

    #[test]
    fn verbosity_sets_filter() {
        assert_eq!(LogSettings::default().with_verbosity(0).filter, "warn");
        assert_eq!(LogSettings::default().with_verbosity(2).filter, "debug");
        assert_eq!(LogSettings::default().with_verbosity(9).filter, "trace");
    }

    #[test]
    fn guestbridge_log_wins_over_rust_log() {
        let settings = LogSettings::default()
            .with_overrides_from(|key| match key {
                "GUESTBRIDGE_LOG" => Some("guestbridge_runtime=trace".to_string()),
                "RUST_LOG" => Some("error".to_string()),
                "GUESTBRIDGE_LOG_FORMAT" => Some("json".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(settings.filter, "guestbridge_runtime=trace");
        assert_eq!(settings.format(), LogFormat::Json);
        assert!(!settings.location);
    }

    #[test]
    fn rust_log_is_the_fallback() {
        let settings = LogSettings::default()
            .with_overrides_from(|key| (key == "RUST_LOG").then(|| "debug".to_string()))
            .unwrap();
        assert_eq!(settings.filter, "debug");
    }
}
