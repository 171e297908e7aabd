//! Timer configuration
//!
//! [`TimerConfig`] holds the limits an [`EventLoop`](crate::event_loop::EventLoop)
//! enforces. It can be built in code or loaded from JSON; keys that are
//! omitted fall back to their defaults.

use crate::error::{messages, Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Largest delay a browser timer accepts before overflowing (2^31 - 1 ms)
pub const DEFAULT_MAX_DELAY_MS: u64 = 2_147_483_647;

/// Timer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Smallest interval a repeating timer runs at; shorter intervals are clamped up
    pub min_interval_ms: u64,
    /// Largest accepted delay or interval
    pub max_delay_ms: u64,
    /// Maximum firings processed by a single `run_*` call
    pub max_ticks_per_run: usize,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            max_ticks_per_run: 100_000,
        }
    }
}

impl TimerConfig {
    /// Parse a configuration from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: TimerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every limit is usable
    pub fn validate(&self) -> Result<()> {
        if self.min_interval_ms == 0 {
            return Err(Error::config(messages::must_be("min_interval_ms", "at least 1")));
        }
        if self.max_delay_ms < self.min_interval_ms {
            return Err(Error::config(messages::must_be(
                "max_delay_ms",
                "greater than or equal to min_interval_ms",
            )));
        }
        if self.max_ticks_per_run == 0 {
            return Err(Error::config(messages::must_be("max_ticks_per_run", "at least 1")));
        }
        Ok(())
    }
}
