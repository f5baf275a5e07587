//! Engine configuration
//!
//! Timing and sizing knobs for the rule engine and its worker. Loaded from
//! the host's JSON settings; every field has a default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Delay between a successful update and the auto-action sweep
    pub auto_action_delay_ms: u64,
    /// Number of characters of a result's text compared between sweeps
    pub auto_action_text_prefix: usize,
    /// Minimum interval between two automatic `moveto` of the same rule
    pub moveto_cooldown_ms: u64,
    /// Worker wake-up interval when no message arrives
    pub poll_interval_ms: u64,
    pub path_cache_capacity: usize,
    /// Minimum number of context roots searched in parallel
    pub parallel_roots_threshold: usize,
    pub cancel_superseded_builds: bool,
    pub title_separator: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_action_delay_ms: 1000,
            auto_action_text_prefix: 100,
            moveto_cooldown_ms: 4000,
            poll_interval_ms: 500,
            path_cache_capacity: 64,
            parallel_roots_threshold: 4,
            cancel_superseded_builds: true,
            title_separator: " - ".to_string(),
        }
    }
}

impl Config {
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    #[must_use]
    pub fn auto_action_delay(&self) -> Duration {
        Duration::from_millis(self.auto_action_delay_ms)
    }

    #[must_use]
    pub fn moveto_cooldown(&self) -> Duration {
        Duration::from_millis(self.moveto_cooldown_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{"movetoCooldownMs": 2500, "titleSeparator": " | "}"#)
            .unwrap();
        assert_eq!(config.moveto_cooldown(), Duration::from_millis(2500));
        assert_eq!(config.title_separator, " | ");
        assert_eq!(config.auto_action_text_prefix, 100);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = Config::from_json("{\"pollIntervalMs\": \"soon\"}").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}
