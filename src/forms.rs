//! Dashboard form inputs
//!
//! Typed versions of the biometrics and profile forms, validated before
//! anything reaches the data source.

use crate::error::MonitorError;
use crate::types::{AlertPreferences, BiometricSample, Profile, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use uuid::Uuid;

pub const HEARTBEAT_RANGE: RangeInclusive<i32> = 40..=200;
pub const SPO2_RANGE: RangeInclusive<f64> = 80.0..=100.0;
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 35.0..=42.0;

/// Manually logged biometric reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleInput {
    pub gsr: f64,
    pub heartbeat: i32,
    pub spo2: f64,
    pub temperature: f64,
}

impl Default for SampleInput {
    /// The form's initial slider positions
    fn default() -> Self {
        Self {
            gsr: 50.0,
            heartbeat: 70,
            spo2: 98.0,
            temperature: 36.5,
        }
    }
}

impl SampleInput {
    pub fn validate(&self) -> Result<(), MonitorError> {
        // GSR has no upper bound: device values run on a wider scale than the form
        if !self.gsr.is_finite() || self.gsr < 0.0 {
            return Err(MonitorError::InvalidSample(format!(
                "gsr must be a non-negative number (got {})",
                self.gsr
            )));
        }
        if !HEARTBEAT_RANGE.contains(&self.heartbeat) {
            return Err(MonitorError::InvalidSample(format!(
                "heartbeat must be within {}-{} bpm (got {})",
                HEARTBEAT_RANGE.start(),
                HEARTBEAT_RANGE.end(),
                self.heartbeat
            )));
        }
        if !SPO2_RANGE.contains(&self.spo2) {
            return Err(MonitorError::InvalidSample(format!(
                "spo2 must be within {}-{}% (got {})",
                SPO2_RANGE.start(),
                SPO2_RANGE.end(),
                self.spo2
            )));
        }
        if !TEMPERATURE_RANGE.contains(&self.temperature) {
            return Err(MonitorError::InvalidSample(format!(
                "temperature must be within {}-{} °C (got {})",
                TEMPERATURE_RANGE.start(),
                TEMPERATURE_RANGE.end(),
                self.temperature
            )));
        }
        Ok(())
    }

    /// Validate and turn into a stored sample
    pub fn into_sample(
        self,
        user_id: UserId,
        recorded_at: DateTime<Utc>,
    ) -> Result<BiometricSample, MonitorError> {
        self.validate()?;
        Ok(BiometricSample {
            id: Uuid::new_v4(),
            user_id,
            gsr: Some(self.gsr),
            heartbeat: Some(self.heartbeat),
            spo2: Some(self.spo2),
            temperature: Some(self.temperature),
            recorded_at,
            stress_score: None,
        })
    }
}

/// Raw profile form fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub alerts: AlertPreferences,
}

/// Empty, unparsable and zero values all mean "not set"
fn parse_positive(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v != 0.0)
}

impl ProfileUpdate {
    pub fn into_profile(self, id: UserId) -> Profile {
        let age = parse_positive(&self.age)
            .filter(|v| *v > 0.0 && *v <= u32::MAX as f64)
            .map(|v| v.round() as u32);
        let height = parse_positive(&self.height);

        Profile {
            id,
            username: self.username.trim().to_string(),
            age,
            height,
            avatar_url: self.avatar_url.filter(|url| !url.trim().is_empty()),
            alerts: self.alerts,
        }
    }
}
