//! Alert delivery
//!
//! Messages go out through a [`NotificationSink`]. Each recipient is
//! attempted independently: a failed send is logged and the remaining
//! recipients are still tried.

use crate::error::MonitorError;
use crate::types::{AlertPreferences, AlertRecord, DeliveryOutcome, RecipientKind, StressLevel};
use parking_lot::Mutex;
use std::collections::HashSet;

/// Outbound text message channel
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sink name, used in logs
    fn name(&self) -> &str;

    /// Send `text` to `phone`
    async fn send_message(&self, phone: &str, text: &str) -> Result<(), MonitorError>;
}

/// A planned delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub kind: RecipientKind,
    pub phone: String,
}

fn present(phone: &Option<String>) -> Option<String> {
    phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

/// Work out who receives an alert raised at `level`
pub fn plan_recipients(prefs: &AlertPreferences, level: StressLevel) -> Vec<Recipient> {
    let mut recipients = Vec::new();

    if prefs.alert_enabled {
        if let Some(phone) = present(&prefs.phone) {
            recipients.push(Recipient {
                kind: RecipientKind::User,
                phone,
            });
        }
    }

    if prefs.doctor_alert_enabled {
        if let Some(phone) = present(&prefs.doctor_phone) {
            recipients.push(Recipient {
                kind: RecipientKind::Doctor,
                phone,
            });
        }
    }

    if level == StressLevel::Critical {
        if let Some(phone) = present(&prefs.emergency_contact) {
            recipients.push(Recipient {
                kind: RecipientKind::EmergencyContact,
                phone,
            });
        }
    }

    recipients
}

/// Message body for one recipient
pub fn compose_message(alert: &AlertRecord, level: StressLevel, recipient: RecipientKind) -> String {
    let percent = (alert.stress_level * 100.0).round() as i64;
    let time = alert.created_at.format("%Y-%m-%d %H:%M UTC");

    match recipient {
        RecipientKind::User => format!(
            "MindEase: {}. Stress {}% ({}) at {}.",
            alert.reason,
            percent,
            level.label(),
            time
        ),
        RecipientKind::Doctor => format!(
            "MindEase patient alert for {}: {}. Stress {}% ({}) at {}.",
            alert.user_id,
            alert.reason,
            percent,
            level.label(),
            time
        ),
        RecipientKind::EmergencyContact => format!(
            "MindEase emergency: {} may need help. {} ({}%) at {}.",
            alert.user_id, alert.reason, percent, time
        ),
    }
}

/// Send an alert to every planned recipient, returning each outcome
pub async fn deliver(
    sink: &dyn NotificationSink,
    alert: &AlertRecord,
    level: StressLevel,
    recipients: &[Recipient],
) -> Vec<DeliveryOutcome> {
    let mut outcomes = Vec::with_capacity(recipients.len());

    for recipient in recipients {
        let text = compose_message(alert, level, recipient.kind);
        let delivered = match sink.send_message(&recipient.phone, &text).await {
            Ok(()) => {
                tracing::info!(
                    alert_id = %alert.id,
                    recipient = recipient.kind.as_str(),
                    sink = sink.name(),
                    "Alert delivered"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    alert_id = %alert.id,
                    recipient = recipient.kind.as_str(),
                    sink = sink.name(),
                    error = %e,
                    "Alert delivery failed"
                );
                false
            }
        };

        outcomes.push(DeliveryOutcome {
            recipient: recipient.kind,
            phone: recipient.phone.clone(),
            delivered,
        });
    }

    outcomes
}

/// Sink that only writes messages to the log
pub struct LogSink;

#[async_trait::async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_message(&self, phone: &str, text: &str) -> Result<(), MonitorError> {
        tracing::info!(phone, text, "Would send message");
        Ok(())
    }
}

/// A message captured by [`RecordingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub phone: String,
    pub text: String,
}

/// Sink that keeps every message in memory.
///
/// Numbers registered with [`RecordingSink::fail_for`] reject sends; the
/// attempt is still recorded.
#[derive(Default)]
pub struct RecordingSink {
    attempts: Mutex<Vec<SentMessage>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, phone: impl Into<String>) {
        self.failing.lock().insert(phone.into());
    }

    /// Every attempted send, including failed ones
    pub fn attempts(&self) -> Vec<SentMessage> {
        self.attempts.lock().clone()
    }

    pub fn attempted_phones(&self) -> Vec<String> {
        self.attempts.lock().iter().map(|m| m.phone.clone()).collect()
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_message(&self, phone: &str, text: &str) -> Result<(), MonitorError> {
        self.attempts.lock().push(SentMessage {
            phone: phone.to_string(),
            text: text.to_string(),
        });

        if self.failing.lock().contains(phone) {
            return Err(MonitorError::Delivery {
                recipient: phone.to_string(),
                reason: "carrier rejected message".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertType, UserId, REASON_CRITICAL};
    use pretty_assertions::assert_eq;

    fn prefs() -> AlertPreferences {
        AlertPreferences {
            alert_enabled: true,
            doctor_alert_enabled: true,
            phone: Some("+100".to_string()),
            doctor_phone: Some("+200".to_string()),
            emergency_contact: Some("+300".to_string()),
        }
    }

    fn kinds(recipients: &[Recipient]) -> Vec<RecipientKind> {
        recipients.iter().map(|r| r.kind).collect()
    }

    #[test]
    fn test_emergency_contact_only_when_critical() {
        assert_eq!(
            kinds(&plan_recipients(&prefs(), StressLevel::Critical)),
            vec![
                RecipientKind::User,
                RecipientKind::Doctor,
                RecipientKind::EmergencyContact
            ]
        );
        assert_eq!(
            kinds(&plan_recipients(&prefs(), StressLevel::High)),
            vec![RecipientKind::User, RecipientKind::Doctor]
        );
    }

    #[test]
    fn test_disabled_and_missing_numbers_are_skipped() {
        let p = AlertPreferences {
            alert_enabled: false,
            doctor_alert_enabled: true,
            doctor_phone: Some("   ".to_string()),
            ..prefs()
        };
        assert_eq!(
            kinds(&plan_recipients(&p, StressLevel::Critical)),
            vec![RecipientKind::EmergencyContact]
        );
        assert!(plan_recipients(&AlertPreferences::default(), StressLevel::Critical).is_empty());
    }

    #[test]
    fn test_message_mentions_reason_and_percent() {
        let alert = AlertRecord::triggered(UserId::new("u1"), AlertType::Automatic, REASON_CRITICAL, 0.934);
        let text = compose_message(&alert, StressLevel::Critical, RecipientKind::User);
        assert!(text.contains(REASON_CRITICAL));
        assert!(text.contains("93%"));
    }

    #[tokio::test]
    async fn test_failed_recipient_does_not_block_others() {
        let sink = RecordingSink::new();
        sink.fail_for("+100");

        let alert = AlertRecord::triggered(UserId::new("u1"), AlertType::Automatic, REASON_CRITICAL, 1.2);
        let recipients = plan_recipients(&prefs(), StressLevel::Critical);
        let outcomes = deliver(&sink, &alert, StressLevel::Critical, &recipients).await;

        let delivered: Vec<bool> = outcomes.iter().map(|o| o.delivered).collect();
        assert_eq!(delivered, vec![false, true, true]);
        assert_eq!(sink.attempted_phones(), vec!["+100", "+200", "+300"]);
    }
}
