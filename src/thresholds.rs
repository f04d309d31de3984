//! Stress level thresholds
//!
//! Three ordered cut points split the score line into four levels:
//! `Relaxed < low <= Moderate < high <= High < critical <= Critical`.

use crate::error::MonitorError;
use crate::types::StressLevel;
use serde::{Deserialize, Serialize};

/// Lower bound of the moderate band
pub const DEFAULT_LOW_THRESHOLD: f64 = 0.3;
/// Lower bound of the high band
pub const DEFAULT_HIGH_THRESHOLD: f64 = 0.7;
/// Lower bound of the critical band.
///
/// Earlier dashboard builds used 0.85; 0.90 is the current device value.
pub const DEFAULT_CRITICAL_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressThresholds {
    pub low: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for StressThresholds {
    fn default() -> Self {
        Self {
            low: DEFAULT_LOW_THRESHOLD,
            high: DEFAULT_HIGH_THRESHOLD,
            critical: DEFAULT_CRITICAL_THRESHOLD,
        }
    }
}

impl StressThresholds {
    pub fn new(low: f64, high: f64, critical: f64) -> Result<Self, MonitorError> {
        let thresholds = Self {
            low,
            high,
            critical,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Map a score to its level
    pub fn classify(&self, score: f64) -> StressLevel {
        if score >= self.critical {
            StressLevel::Critical
        } else if score >= self.high {
            StressLevel::High
        } else if score >= self.low {
            StressLevel::Moderate
        } else {
            StressLevel::Relaxed
        }
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        if !(self.low.is_finite() && self.high.is_finite() && self.critical.is_finite()) {
            return Err(MonitorError::InvalidConfig(
                "thresholds must be finite".to_string(),
            ));
        }
        if !(self.low > 0.0 && self.low < self.high && self.high < self.critical) {
            return Err(MonitorError::InvalidConfig(format!(
                "thresholds must satisfy 0 < low < high < critical (got {}, {}, {})",
                self.low, self.high, self.critical
            )));
        }
        Ok(())
    }
}

/// Classify a score against the default thresholds
pub fn classify(score: f64) -> StressLevel {
    StressThresholds::default().classify(score)
}
