//! Configuration for timeline reconstruction.

use std::collections::HashMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};

/// Label carried by Prometheus `ALERTS` series for the pending/firing sub-state.
pub const DEFAULT_STATE_LABEL: &str = "alertstate";

/// Upper bound for the step and lookback settings (in seconds), about 100 years.
pub const MAX_WINDOW_SECS: u64 = 100 * 365 * 86_400;

/// Configuration for building a timeline from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Sampling interval assumed when a series has fewer than two samples (in seconds).
    pub default_step_secs: u64,
    /// Width of the range query window (in seconds).
    ///
    /// The caller uses it to bound the range query it fetches; the engine
    /// reconstructs whatever samples it is given.
    pub lookback_secs: u64,
    /// Label excluded from alert identity.
    pub state_label: String,
    /// Labels an alerting rule must carry to be tracked as a health check.
    /// Empty means every alerting rule is tracked.
    pub health_check_labels: HashMap<String, String>,
    /// Annotations consulted for the message template, in preference order.
    pub message_annotations: Vec<String>,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            default_step_secs: 60,
            lookback_secs: 86_400, // 24 hours
            state_label: DEFAULT_STATE_LABEL.to_string(),
            health_check_labels: HashMap::new(),
            message_annotations: vec![
                "message".to_string(),
                "description".to_string(),
                "summary".to_string(),
            ],
        }
    }
}

impl TimelineConfig {
    /// Parses a configuration from JSON, filling absent fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns `TimelineError::Decode` for malformed JSON and
    /// `TimelineError::InvalidConfig` if validation fails.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `TimelineError::InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.default_step_secs == 0 {
            return Err(TimelineError::InvalidConfig {
                reason: "default step must be positive".to_string(),
            });
        }
        if self.default_step_secs > MAX_WINDOW_SECS || self.lookback_secs > MAX_WINDOW_SECS {
            return Err(TimelineError::InvalidConfig {
                reason: format!("step and lookback must not exceed {MAX_WINDOW_SECS} seconds"),
            });
        }
        if self.lookback_secs < self.default_step_secs {
            return Err(TimelineError::InvalidConfig {
                reason: "lookback must cover at least one step".to_string(),
            });
        }
        if self.state_label.is_empty() {
            return Err(TimelineError::InvalidConfig {
                reason: "state label must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Requires rules to carry `key=value` to be tracked.
    #[must_use]
    pub fn with_health_check_label(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.health_check_labels.insert(key.into(), value.into());
        self
    }

    /// Sets the fallback sampling interval.
    #[must_use]
    pub const fn with_default_step_secs(mut self, secs: u64) -> Self {
        self.default_step_secs = secs;
        self
    }

    /// Returns the fallback sampling interval as a duration.
    #[must_use]
    pub fn default_step(&self) -> Duration {
        secs_to_duration(self.default_step_secs)
    }

    /// Returns the lookback window as a duration, for building the range query.
    #[must_use]
    pub fn lookback(&self) -> Duration {
        secs_to_duration(self.lookback_secs)
    }
}

fn secs_to_duration(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}
