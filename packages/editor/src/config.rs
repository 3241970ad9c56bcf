//! Editor configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.
//! A few knobs can also be overridden from the environment.

use pagecraft_document::RepairMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Exponential backoff: `base * 2^(attempt - 1)`, capped at `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.base.saturating_mul(1u32 << exponent).min(self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutosaveConfig {
    /// Quiet period before a draft is written
    pub debounce_ms: u64,
    pub retries: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1500,
            retries: 5,
            retry_base_ms: 200,
            retry_max_ms: 10_000,
        }
    }
}

impl AutosaveConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            base: Duration::from_millis(self.retry_base_ms),
            max: Duration::from_millis(self.retry_max_ms),
        }
    }
}

/// Retries for the published write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublishConfig {
    pub retries: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_base_ms: 200,
            retry_max_ms: 5000,
        }
    }
}

impl PublishConfig {
    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            base: Duration::from_millis(self.retry_base_ms),
            max: Duration::from_millis(self.retry_max_ms),
        }
    }
}

/// Background retries for a failed cache invalidation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvalidationConfig {
    pub retries: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_base_ms: 250,
            retry_max_ms: 5000,
        }
    }
}

impl InvalidationConfig {
    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            base: Duration::from_millis(self.retry_base_ms),
            max: Duration::from_millis(self.retry_max_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    /// Undo levels kept per session (0 = unlimited)
    pub history_limit: usize,

    /// Load policy for persisted documents
    pub repair: RepairMode,

    pub autosave: AutosaveConfig,

    pub publish: PublishConfig,
    pub invalidation: InvalidationConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            repair: RepairMode::Strict,
            autosave: AutosaveConfig::default(),
            publish: PublishConfig::default(),
            invalidation: InvalidationConfig::default(),
        }
    }
}

impl EditorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Apply `PAGECRAFT_*` environment overrides; unparsable values are ignored
    pub fn with_env_overrides(mut self) -> Self {
        self.history_limit = env_parse("PAGECRAFT_HISTORY_LIMIT", self.history_limit);
        self.autosave.debounce_ms =
            env_parse("PAGECRAFT_AUTOSAVE_DEBOUNCE_MS", self.autosave.debounce_ms);
        self.autosave.retries = env_parse("PAGECRAFT_AUTOSAVE_RETRIES", self.autosave.retries);
        self
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
