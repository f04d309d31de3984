//! Monitor configuration
//!
//! Loaded from and saved to JSON. Every field has a default so a partial
//! file only overrides what it names.

use crate::error::MonitorError;
use crate::thresholds::StressThresholds;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default half-period of the moderate-stress blink (ms)
pub const DEFAULT_BLINK_PERIOD_MS: u64 = 500;

/// Default number of alerts kept in the in-memory history
pub const DEFAULT_ALERT_HISTORY_LIMIT: usize = 20;

/// Default capacity of the monitor event and command channels
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub thresholds: StressThresholds,
    pub blink_period_ms: u64,
    pub alert_history_limit: usize,
    pub event_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            thresholds: StressThresholds::default(),
            blink_period_ms: DEFAULT_BLINK_PERIOD_MS,
            alert_history_limit: DEFAULT_ALERT_HISTORY_LIMIT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl MonitorConfig {
    pub fn blink_period(&self) -> Duration {
        Duration::from_millis(self.blink_period_ms)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        self.thresholds.validate()?;
        if self.blink_period_ms == 0 {
            return Err(MonitorError::InvalidConfig(
                "blink_period_ms must be greater than zero".to_string(),
            ));
        }
        if self.alert_history_limit == 0 {
            return Err(MonitorError::InvalidConfig(
                "alert_history_limit must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(MonitorError::InvalidConfig(
                "event_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, MonitorError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, MonitorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
