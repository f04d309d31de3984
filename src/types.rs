//! Core types for MindEase
//!
//! Records that flow between the data source, the stress monitor and the
//! notification sink: biometric samples, alert records, profiles and the
//! read model rendered by the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One stored biometric reading.
///
/// Every raw field is optional at the storage boundary; the scorer applies
/// its own defaults when a field is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricSample {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub user_id: UserId,
    /// Galvanic skin response (device scale, typically hundreds to low thousands)
    #[serde(default)]
    pub gsr: Option<f64>,
    /// Heart rate (bpm)
    #[serde(default)]
    pub heartbeat: Option<i32>,
    /// Blood oxygen saturation (percentage)
    #[serde(default)]
    pub spo2: Option<f64>,
    /// Body temperature (celsius)
    #[serde(default)]
    pub temperature: Option<f64>,
    pub recorded_at: DateTime<Utc>,
    /// Score precomputed by the device, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress_score: Option<f64>,
}

impl BiometricSample {
    /// Create a sample with all four readings present and no stored score
    pub fn new(
        user_id: UserId,
        gsr: f64,
        heartbeat: i32,
        spo2: f64,
        temperature: f64,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            gsr: Some(gsr),
            heartbeat: Some(heartbeat),
            spo2: Some(spo2),
            temperature: Some(temperature),
            recorded_at,
            stress_score: None,
        }
    }

    pub fn with_stress_score(mut self, score: f64) -> Self {
        self.stress_score = Some(score);
        self
    }
}

/// Discrete stress bucket derived from a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressLevel {
    Relaxed,
    Moderate,
    High,
    Critical,
}

impl StressLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StressLevel::Relaxed => "relaxed",
            StressLevel::Moderate => "moderate",
            StressLevel::High => "high",
            StressLevel::Critical => "critical",
        }
    }

    /// Human-readable label for the status badge
    pub fn label(&self) -> &'static str {
        match self {
            StressLevel::Relaxed => "Relaxed",
            StressLevel::Moderate => "Moderate Stress",
            StressLevel::High => "High Stress",
            StressLevel::Critical => "Critical Stress",
        }
    }

    pub fn indicator(&self) -> &'static str {
        match self {
            StressLevel::Relaxed => "🟢",
            StressLevel::Moderate => "🟡",
            StressLevel::High => "🔴",
            StressLevel::Critical => "🚨",
        }
    }

    /// Levels at which an automatic alert is raised
    pub fn is_alerting(&self) -> bool {
        matches!(self, StressLevel::High | StressLevel::Critical)
    }
}

impl std::fmt::Display for StressLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an alert was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Automatic,
    Manual,
}

/// Alert lifecycle tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Triggered,
}

pub const REASON_CRITICAL: &str = "Critical stress level detected";
pub const REASON_HIGH: &str = "High stress level detected";
pub const REASON_MANUAL: &str = "Manually triggered alert";

/// A persisted alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: Uuid,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub reason: String,
    /// Stress score at trigger time
    pub stress_level: f64,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn triggered(
        user_id: UserId,
        alert_type: AlertType,
        reason: impl Into<String>,
        score: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            alert_type,
            reason: reason.into(),
            stress_level: score,
            status: AlertStatus::Triggered,
            created_at: Utc::now(),
        }
    }
}

/// Alert delivery settings stored on the profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertPreferences {
    #[serde(default)]
    pub alert_enabled: bool,
    #[serde(default)]
    pub doctor_alert_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
}

/// Stored user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub age: Option<u32>,
    /// Height in centimeters
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(flatten)]
    pub alerts: AlertPreferences,
}

impl Profile {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            username: String::new(),
            age: None,
            height: None,
            avatar_url: None,
            alerts: AlertPreferences::default(),
        }
    }
}

/// Read model for the dashboard status badge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorState {
    pub score: f64,
    pub level: StressLevel,
    pub blinking: bool,
}

impl MonitorState {
    /// Score as a whole percentage, as shown next to the badge
    pub fn percent(&self) -> i64 {
        (self.score * 100.0).round() as i64
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self {
            score: 0.0,
            level: StressLevel::Relaxed,
            blinking: false,
        }
    }
}

/// Who a delivery went to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientKind {
    User,
    Doctor,
    EmergencyContact,
}

impl RecipientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientKind::User => "user",
            RecipientKind::Doctor => "doctor",
            RecipientKind::EmergencyContact => "emergency_contact",
        }
    }
}

/// Outcome of one delivery attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub recipient: RecipientKind,
    pub phone: String,
    pub delivered: bool,
}

/// Events published by a running monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// An alert was recorded and delivery attempted
    AlertRaised {
        alert: AlertRecord,
        deliveries: Vec<DeliveryOutcome>,
    },
    /// A transient, user-facing notice (e.g. a failed read)
    Notice { message: String },
}
