//! Stress scoring
//!
//! Converts the four wearable readings into a single stress score. Each
//! reading contributes a factor measuring how far it sits past its normal
//! value, scaled so that the device's alert threshold maps to 1.0. The
//! factors are combined with fixed weights that sum to 1.0.
//!
//! Factors are not clamped from above: a reading far beyond its threshold
//! yields a factor above 1 and a score above 1.

use crate::types::BiometricSample;
use serde::{Deserialize, Serialize};

pub const GSR_NORMAL: f64 = 1500.0;
pub const GSR_THRESHOLD: f64 = 2500.0;
pub const HR_NORMAL: f64 = 72.0;
pub const HR_THRESHOLD: f64 = 80.0;
pub const TEMP_NORMAL: f64 = 36.5;
pub const TEMP_THRESHOLD: f64 = 37.2;
pub const SPO2_NORMAL: f64 = 98.0;
pub const SPO2_THRESHOLD: f64 = 95.0;

pub const GSR_WEIGHT: f64 = 0.30;
pub const HR_WEIGHT: f64 = 0.25;
pub const TEMP_WEIGHT: f64 = 0.20;
pub const SPO2_WEIGHT: f64 = 0.25;

/// Values used when a reading is missing
pub const DEFAULT_GSR: f64 = 0.0;
pub const DEFAULT_HEARTBEAT: f64 = 0.0;
pub const DEFAULT_SPO2: f64 = 100.0;
pub const DEFAULT_TEMPERATURE: f64 = 0.0;

/// Per-signal contributions before weighting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressFactors {
    pub gsr: f64,
    pub heart_rate: f64,
    pub temperature: f64,
    pub spo2: f64,
}

impl StressFactors {
    /// Compute factors from raw readings
    pub fn from_readings(gsr: f64, heartbeat: f64, spo2: f64, temperature: f64) -> Self {
        Self {
            gsr: (gsr - GSR_NORMAL).max(0.0) / (GSR_THRESHOLD - GSR_NORMAL),
            heart_rate: (heartbeat - HR_NORMAL).max(0.0) / (HR_THRESHOLD - HR_NORMAL),
            temperature: (temperature - TEMP_NORMAL).max(0.0) / (TEMP_THRESHOLD - TEMP_NORMAL),
            spo2: (SPO2_NORMAL - spo2).max(0.0) / (SPO2_NORMAL - SPO2_THRESHOLD),
        }
    }

    /// Compute factors from a sample, defaulting missing readings
    pub fn from_sample(sample: &BiometricSample) -> Self {
        Self::from_readings(
            sample.gsr.unwrap_or(DEFAULT_GSR),
            sample.heartbeat.map(f64::from).unwrap_or(DEFAULT_HEARTBEAT),
            sample.spo2.unwrap_or(DEFAULT_SPO2),
            sample.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        )
    }

    /// Weighted sum of the factors
    pub fn score(&self) -> f64 {
        self.gsr * GSR_WEIGHT
            + self.heart_rate * HR_WEIGHT
            + self.temperature * TEMP_WEIGHT
            + self.spo2 * SPO2_WEIGHT
    }
}

/// Compute the stress score of a sample from its raw readings.
///
/// Any stored `stress_score` on the sample is ignored here; see
/// [`effective_score`] for the stored-first lookup.
pub fn compute_stress_score(sample: &BiometricSample) -> f64 {
    StressFactors::from_sample(sample).score()
}

/// Stored score when the sample carries one, computed score otherwise.
///
/// A stored score of zero is a real score and is returned as-is.
pub fn effective_score(sample: &BiometricSample) -> f64 {
    sample
        .stress_score
        .unwrap_or_else(|| compute_stress_score(sample))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn sample(gsr: f64, heartbeat: i32, spo2: f64, temperature: f64) -> BiometricSample {
        BiometricSample::new(UserId::new("u1"), gsr, heartbeat, spo2, temperature, Utc::now())
    }

    fn empty_sample() -> BiometricSample {
        BiometricSample {
            gsr: None,
            heartbeat: None,
            spo2: None,
            temperature: None,
            ..sample(0.0, 0, 0.0, 0.0)
        }
    }

    #[test]
    fn test_normal_readings_score_zero() {
        let score = compute_stress_score(&sample(1500.0, 72, 98.0, 36.5));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_threshold_readings_score_one() {
        let score = compute_stress_score(&sample(2500.0, 80, 95.0, 37.2));
        assert!((score - 1.0).abs() < 1e-9, "score = {score}");
    }

    #[test]
    fn test_score_is_not_clamped() {
        let score = compute_stress_score(&sample(4500.0, 120, 88.0, 39.0));
        assert!(score > 1.0, "score = {score}");
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let score = compute_stress_score(&empty_sample());
        assert_eq!(score, 0.0);

        let factors = StressFactors::from_sample(&empty_sample());
        assert_eq!(
            factors,
            StressFactors {
                gsr: 0.0,
                heart_rate: 0.0,
                temperature: 0.0,
                spo2: 0.0,
            }
        );
    }

    #[test]
    fn test_negative_inputs_are_absorbed() {
        let score = compute_stress_score(&sample(-50.0, -10, 120.0, -5.0));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_single_factor_weights() {
        // Heart rate exactly at threshold, everything else normal
        let score = compute_stress_score(&sample(1500.0, 80, 98.0, 36.5));
        assert!((score - HR_WEIGHT).abs() < 1e-9);

        // SpO2 at threshold
        let score = compute_stress_score(&sample(1500.0, 72, 95.0, 36.5));
        assert!((score - SPO2_WEIGHT).abs() < 1e-9);

        // GSR halfway to threshold
        let score = compute_stress_score(&sample(2000.0, 72, 98.0, 36.5));
        assert!((score - GSR_WEIGHT * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_deterministic() {
        let s = sample(2100.0, 91, 96.0, 37.0);
        assert_eq!(compute_stress_score(&s), compute_stress_score(&s));
    }

    #[test]
    fn test_heartbeat_monotonic() {
        let mut previous = f64::MIN;
        for hr in 73..200 {
            let score = compute_stress_score(&sample(1800.0, hr, 97.0, 36.8));
            assert!(score >= previous, "score dropped at hr={hr}");
            previous = score;
        }
    }

    #[test]
    fn test_effective_score_prefers_stored() {
        let s = sample(2500.0, 80, 95.0, 37.2).with_stress_score(0.0);
        assert_eq!(effective_score(&s), 0.0);

        let s = sample(1500.0, 80, 98.0, 36.5);
        assert!((effective_score(&s) - HR_WEIGHT).abs() < 1e-9);
    }
}
