//! Stress monitor
//!
//! The per-user state machine. Each new sample yields a score (the stored
//! one when present, otherwise computed), the score is classified, the read
//! model and blink timer are updated, and an alert is raised when the level
//! is high or critical and the user has alerts enabled.
//!
//! Level is a function of the latest score only: there is no decay, no
//! hysteresis and no de-duplication, so every qualifying sample alerts.

use crate::blink::BlinkTimer;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::forms::{ProfileUpdate, SampleInput};
use crate::notify::{deliver, plan_recipients, NotificationSink};
use crate::scorer::effective_score;
use crate::source::{DataSource, SampleQuery, SortOrder};
use crate::types::{
    AlertPreferences, AlertRecord, AlertType, BiometricSample, MonitorEvent, MonitorState,
    Profile, StressLevel, UserId, REASON_CRITICAL, REASON_HIGH, REASON_MANUAL,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Alert an automatic trigger should raise at `level`, if any
pub fn automatic_reason(level: StressLevel, alert_enabled: bool) -> Option<&'static str> {
    if !alert_enabled {
        return None;
    }
    match level {
        StressLevel::Critical => Some(REASON_CRITICAL),
        StressLevel::High => Some(REASON_HIGH),
        StressLevel::Relaxed | StressLevel::Moderate => None,
    }
}

pub struct StressMonitor {
    user_id: UserId,
    config: MonitorConfig,
    source: Arc<dyn DataSource>,
    sink: Arc<dyn NotificationSink>,
    state: Arc<watch::Sender<MonitorState>>,
    events: broadcast::Sender<MonitorEvent>,
    blink: BlinkTimer,
    preferences: AlertPreferences,
    alert_history: Vec<AlertRecord>,
}

impl StressMonitor {
    pub fn new(
        user_id: UserId,
        config: MonitorConfig,
        source: Arc<dyn DataSource>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, MonitorError> {
        config.validate()?;

        let (state_tx, _) = watch::channel(MonitorState::default());
        let state = Arc::new(state_tx);
        let (events, _) = broadcast::channel(config.event_capacity);
        let blink = BlinkTimer::new(config.blink_period(), Arc::clone(&state));

        Ok(Self {
            user_id,
            config,
            source,
            sink,
            state,
            events,
            blink,
            preferences: AlertPreferences::default(),
            alert_history: Vec::new(),
        })
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Live read model for the status badge
    pub fn state(&self) -> watch::Receiver<MonitorState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> MonitorState {
        *self.state.borrow()
    }

    /// Alerts and notices raised from now on
    pub fn events(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<MonitorEvent> {
        self.events.clone()
    }

    pub fn source(&self) -> Arc<dyn DataSource> {
        Arc::clone(&self.source)
    }

    pub fn preferences(&self) -> &AlertPreferences {
        &self.preferences
    }

    /// Recent alerts, newest first
    pub fn alert_history(&self) -> &[AlertRecord] {
        &self.alert_history
    }

    pub fn is_blinking_active(&self) -> bool {
        self.blink.is_running()
    }

    /// Load preferences, alert history and the latest stored sample.
    ///
    /// The latest sample only seeds the read model; it does not alert.
    /// Read failures are published as notices and leave the current state
    /// untouched.
    pub async fn prime(&mut self) {
        self.reload_preferences().await;
        self.refresh_alert_history().await;

        match self
            .source
            .query_samples(&self.user_id, &SampleQuery::latest())
            .await
        {
            Ok(samples) => {
                if let Some(latest) = samples.into_iter().next() {
                    let level = self.apply_score(effective_score(&latest));
                    tracing::info!(user_id = %self.user_id, level = %level, "Primed from latest sample");
                }
            }
            Err(e) => self.notice(format!("Could not load latest reading: {}", e)),
        }
    }

    /// Re-read alert preferences from the stored profile
    pub async fn reload_preferences(&mut self) {
        match self.source.get_profile(&self.user_id).await {
            Ok(Some(profile)) => self.preferences = profile.alerts,
            Ok(None) => {
                tracing::debug!(user_id = %self.user_id, "No profile stored; alerts disabled");
                self.preferences = AlertPreferences::default();
            }
            Err(e) => self.notice(format!("Could not load profile: {}", e)),
        }
    }

    /// Handle one newly inserted sample.
    ///
    /// Returns the alert raised for it, if any. Fails only when an alert was
    /// due and could not be recorded.
    pub async fn observe(
        &mut self,
        sample: &BiometricSample,
    ) -> Result<Option<AlertRecord>, MonitorError> {
        if sample.user_id != self.user_id {
            tracing::warn!(
                sample_user = %sample.user_id,
                user_id = %self.user_id,
                "Ignoring sample for another user"
            );
            return Ok(None);
        }

        let score = effective_score(sample);
        let level = self.apply_score(score);
        tracing::debug!(sample_id = %sample.id, score, level = %level, "Sample observed");

        match automatic_reason(level, self.preferences.alert_enabled) {
            Some(reason) => self
                .emit(AlertType::Automatic, reason, score, level)
                .await
                .map(Some),
            None => Ok(None),
        }
    }

    /// Raise a manual alert at the current score.
    ///
    /// Always records an alert, whatever the level or alert setting.
    pub async fn trigger_alert(&mut self) -> Result<AlertRecord, MonitorError> {
        let current = self.current_state();
        self.emit(AlertType::Manual, REASON_MANUAL, current.score, current.level)
            .await
    }

    /// Validate a form reading and store it for this user.
    ///
    /// The sample reaches [`observe`](Self::observe) through the insert
    /// subscription, not from here.
    pub async fn record_sample(&self, input: SampleInput) -> Result<BiometricSample, MonitorError> {
        input.validate()?;
        let latest = self
            .source
            .query_samples(&self.user_id, &SampleQuery::latest())
            .await?;

        let mut recorded_at = Utc::now();
        if let Some(previous) = latest.first() {
            if recorded_at <= previous.recorded_at {
                recorded_at = previous.recorded_at + Duration::microseconds(1);
            }
        }

        let sample = input.into_sample(self.user_id.clone(), recorded_at)?;
        self.source.insert_sample(sample.clone()).await?;
        tracing::info!(sample_id = %sample.id, user_id = %self.user_id, "Sample recorded");
        Ok(sample)
    }

    /// Samples oldest first, optionally only the most recent `limit`
    pub async fn history(&self, limit: Option<usize>) -> Result<Vec<BiometricSample>, MonitorError> {
        match limit {
            None => {
                self.source
                    .query_samples(&self.user_id, &SampleQuery::history())
                    .await
            }
            Some(limit) => {
                let query = SampleQuery {
                    order: SortOrder::Descending,
                    ..SampleQuery::history().with_limit(limit)
                };
                let mut recent = self.source.query_samples(&self.user_id, &query).await?;
                recent.reverse();
                Ok(recent)
            }
        }
    }

    /// Save the profile form and pick up its alert preferences
    pub async fn save_profile(&mut self, update: ProfileUpdate) -> Result<Profile, MonitorError> {
        let profile = update.into_profile(self.user_id.clone());
        self.source.upsert_profile(profile.clone()).await?;
        self.preferences = profile.alerts.clone();
        tracing::info!(user_id = %self.user_id, "Profile saved");
        Ok(profile)
    }

    /// Stop the blink timer
    pub fn shutdown(&mut self) {
        self.blink.stop();
    }

    fn apply_score(&mut self, score: f64) -> StressLevel {
        let level = self.config.thresholds.classify(score);
        let previous = self.current_state().level;

        self.state.send_modify(|s| {
            s.score = score;
            s.level = level;
        });
        self.blink.set_active(level == StressLevel::Moderate);

        if previous != level {
            tracing::info!(user_id = %self.user_id, from = %previous, to = %level, score, "Stress level changed");
        }
        level
    }

    async fn emit(
        &mut self,
        alert_type: AlertType,
        reason: &str,
        score: f64,
        level: StressLevel,
    ) -> Result<AlertRecord, MonitorError> {
        let record = AlertRecord::triggered(self.user_id.clone(), alert_type, reason, score);

        if let Err(e) = self.source.insert_alert(record.clone()).await {
            tracing::warn!(alert_id = %record.id, error = %e, "Alert could not be recorded; not delivering");
            self.notice(format!("Alert could not be recorded: {}", e));
            return Err(MonitorError::AlertPersistence(e.to_string()));
        }

        tracing::info!(
            alert_id = %record.id,
            alert_type = ?alert_type,
            level = %level,
            score,
            "Alert recorded"
        );

        let recipients = plan_recipients(&self.preferences, level);
        let deliveries = deliver(self.sink.as_ref(), &record, level, &recipients).await;

        self.refresh_alert_history().await;

        // No subscribers is fine
        let _ = self.events.send(MonitorEvent::AlertRaised {
            alert: record.clone(),
            deliveries,
        });

        Ok(record)
    }

    async fn refresh_alert_history(&mut self) {
        match self
            .source
            .query_alerts(
                &self.user_id,
                SortOrder::Descending,
                self.config.alert_history_limit,
            )
            .await
        {
            Ok(alerts) => self.alert_history = alerts,
            Err(e) => self.notice(format!("Could not load alert history: {}", e)),
        }
    }

    fn notice(&self, message: String) {
        tracing::warn!(user_id = %self.user_id, %message, "Notice");
        let _ = self.events.send(MonitorEvent::Notice { message });
    }
}

impl Drop for StressMonitor {
    fn drop(&mut self) {
        self.blink.stop();
    }
}
