//! Error types for deferral

use std::fmt;
use thiserror::Error;

/// Main error type for deferral
#[derive(Error, Debug)]
pub enum Error {
    /// Delay or interval outside the accepted range; no timer was armed
    #[error("RangeError: invalid delay {delay_ms}ms: {reason}")]
    InvalidDelay { delay_ms: i64, reason: String },

    /// Error returned by a callback that was invoked manually
    #[error(transparent)]
    Callback(#[from] anyhow::Error),

    /// Invalid configuration value
    #[error("ConfigError: {0}")]
    Config(String),

    /// IO error
    #[error("IOError: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON (de)serialization error
    #[error("JSONError: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl Error {
    /// Create an invalid delay error
    pub fn invalid_delay(delay_ms: i64, reason: impl Into<String>) -> Self {
        Error::InvalidDelay {
            delay_ms,
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Whether this error came out of user callback code
    pub fn is_callback_error(&self) -> bool {
        matches!(self, Error::Callback(_))
    }
}

/// Result type alias for deferral
pub type Result<T> = std::result::Result<T, Error>;

/// Identifier of a timer armed on a [`TimerHost`](crate::event_loop::TimerHost)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Standardized error message templates
pub mod messages {
    pub const NEGATIVE_DELAY: &str = "delay must not be negative";
    pub const DELAY_TOO_LARGE: &str = "delay exceeds the maximum of";

    /// Format a "delay exceeds the maximum of Nms" message
    pub fn delay_too_large(max_ms: u64) -> String {
        format!("{} {}ms", DELAY_TOO_LARGE, max_ms)
    }

    /// Format a "X must be Y" error message
    pub fn must_be(what: &str, requirement: &str) -> String {
        format!("{} must be {}", what, requirement)
    }
}
