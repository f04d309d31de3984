//! Monitor service
//!
//! Runs a [`StressMonitor`] on its own task. Realtime sample inserts and
//! requests from the interface are consumed by a single loop, one event at a
//! time, so the state machine never sees overlapping evaluations. Pending
//! samples are drained before commands, which keeps a shutdown from racing
//! ahead of samples that were already delivered.
//!
//! Teardown (explicit [`MonitorHandle::shutdown`] or dropping the handle)
//! stops the blink timer and releases the insert subscription.

use crate::error::MonitorError;
use crate::forms::{ProfileUpdate, SampleInput};
use crate::monitor::StressMonitor;
use crate::source::Subscription;
use crate::types::{AlertRecord, BiometricSample, MonitorEvent, MonitorState, Profile};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

type Reply<T> = oneshot::Sender<Result<T, MonitorError>>;

enum Command {
    TriggerAlert(Reply<AlertRecord>),
    RecordSample(SampleInput, Reply<BiometricSample>),
    SaveProfile(ProfileUpdate, Reply<Profile>),
    AlertHistory(oneshot::Sender<Vec<AlertRecord>>),
    SampleHistory(Option<usize>, Reply<Vec<BiometricSample>>),
    Shutdown,
}

/// Handle to a running monitor
pub struct MonitorHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<MonitorState>,
    events: broadcast::Sender<MonitorEvent>,
    task: JoinHandle<()>,
}

/// Subscribe to the user's inserts, prime the monitor and start its loop
pub async fn spawn(mut monitor: StressMonitor) -> Result<MonitorHandle, MonitorError> {
    let source = monitor.source();
    let subscription = source.subscribe_to_inserts(monitor.user_id()).await?;

    monitor.prime().await;

    let (commands, receiver) = mpsc::channel(monitor.config().event_capacity);
    let state = monitor.state();
    let events = monitor.event_sender();

    tracing::info!(user_id = %monitor.user_id(), subscription = %subscription.id, "Monitor started");
    let task = tokio::spawn(run(monitor, subscription, receiver));

    Ok(MonitorHandle {
        commands,
        state,
        events,
        task,
    })
}

async fn run(
    mut monitor: StressMonitor,
    mut subscription: Subscription,
    mut commands: mpsc::Receiver<Command>,
) {
    let mut feed_open = true;

    loop {
        tokio::select! {
            biased;

            sample = subscription.receiver.recv(), if feed_open => match sample {
                Some(sample) => {
                    if let Err(e) = monitor.observe(&sample).await {
                        tracing::warn!(sample_id = %sample.id, error = %e, "Sample handling failed");
                    }
                }
                None => {
                    tracing::warn!(user_id = %monitor.user_id(), "Insert feed closed");
                    feed_open = false;
                }
            },

            command = commands.recv() => match command {
                Some(Command::Shutdown) | None => break,
                Some(command) => handle(&mut monitor, command).await,
            },
        }
    }

    monitor.shutdown();
    if let Err(e) = monitor.source().unsubscribe(subscription.id).await {
        tracing::warn!(subscription = %subscription.id, error = %e, "Failed to release subscription");
    }
    tracing::info!(user_id = %monitor.user_id(), "Monitor stopped");
}

async fn handle(monitor: &mut StressMonitor, command: Command) {
    // A dropped reply channel means the caller gave up waiting
    match command {
        Command::TriggerAlert(reply) => {
            let _ = reply.send(monitor.trigger_alert().await);
        }
        Command::RecordSample(input, reply) => {
            let _ = reply.send(monitor.record_sample(input).await);
        }
        Command::SaveProfile(update, reply) => {
            let _ = reply.send(monitor.save_profile(update).await);
        }
        Command::AlertHistory(reply) => {
            let _ = reply.send(monitor.alert_history().to_vec());
        }
        Command::SampleHistory(limit, reply) => {
            let _ = reply.send(monitor.history(limit).await);
        }
        Command::Shutdown => {}
    }
}

impl MonitorHandle {
    pub fn state(&self) -> watch::Receiver<MonitorState> {
        self.state.clone()
    }

    pub fn current_state(&self) -> MonitorState {
        *self.state.borrow()
    }

    pub fn events(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Raise a manual alert
    pub async fn trigger_alert(&self) -> Result<AlertRecord, MonitorError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::TriggerAlert(reply)).await?;
        response.await.map_err(|_| MonitorError::MonitorStopped)?
    }

    /// Validate and store a form reading
    pub async fn record_sample(&self, input: SampleInput) -> Result<BiometricSample, MonitorError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::RecordSample(input, reply)).await?;
        response.await.map_err(|_| MonitorError::MonitorStopped)?
    }

    pub async fn save_profile(&self, update: ProfileUpdate) -> Result<Profile, MonitorError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::SaveProfile(update, reply)).await?;
        response.await.map_err(|_| MonitorError::MonitorStopped)?
    }

    /// Recent alerts, newest first
    pub async fn alert_history(&self) -> Result<Vec<AlertRecord>, MonitorError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::AlertHistory(reply)).await?;
        response.await.map_err(|_| MonitorError::MonitorStopped)
    }

    /// Stored samples, oldest first
    pub async fn history(&self, limit: Option<usize>) -> Result<Vec<BiometricSample>, MonitorError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::SampleHistory(limit, reply)).await?;
        response.await.map_err(|_| MonitorError::MonitorStopped)?
    }

    /// Stop the loop and wait for teardown to finish
    pub async fn shutdown(self) -> Result<(), MonitorError> {
        // The loop may already be gone; joining below still reports that
        let _ = self.commands.send(Command::Shutdown).await;
        self.task.await.map_err(|e| {
            tracing::warn!(error = %e, "Monitor task ended abnormally");
            MonitorError::MonitorStopped
        })
    }

    async fn send(&self, command: Command) -> Result<(), MonitorError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| MonitorError::MonitorStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::memory::InMemoryDataSource;
    use crate::notify::RecordingSink;
    use crate::source::DataSource;
    use crate::types::{AlertPreferences, AlertType, StressLevel, UserId};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn start(alert_enabled: bool) -> (MonitorHandle, Arc<InMemoryDataSource>, Arc<RecordingSink>) {
        let source = Arc::new(InMemoryDataSource::new());
        let sink = Arc::new(RecordingSink::new());
        let user = UserId::new("user-1");

        let mut profile = Profile::new(user.clone());
        profile.alerts = AlertPreferences {
            alert_enabled,
            phone: Some("+15550100".to_string()),
            ..Default::default()
        };
        source.upsert_profile(profile).await.unwrap();

        let monitor =
            StressMonitor::new(user, MonitorConfig::default(), source.clone(), sink.clone()).unwrap();
        let handle = spawn(monitor).await.unwrap();
        (handle, source, sink)
    }

    fn scored(score: f64) -> BiometricSample {
        BiometricSample::new(UserId::new("user-1"), 1500.0, 72, 98.0, 36.5, Utc::now())
            .with_stress_score(score)
    }

    #[tokio::test]
    async fn test_inserts_drive_state_and_alerts() {
        let (handle, source, sink) = start(true).await;
        let mut events = handle.events();

        source.insert_sample(scored(0.95)).await.unwrap();

        match events.recv().await.unwrap() {
            MonitorEvent::AlertRaised { alert, deliveries } => {
                assert_eq!(alert.alert_type, AlertType::Automatic);
                assert_eq!(deliveries.len(), 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(handle.current_state().level, StressLevel::Critical);
        assert_eq!(sink.attempts().len(), 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_manual_alert_through_handle() {
        let (handle, source, _) = start(false).await;

        let alert = handle.trigger_alert().await.unwrap();
        assert_eq!(alert.alert_type, AlertType::Manual);
        assert_eq!(source.all_alerts().len(), 1);
        assert_eq!(handle.alert_history().await.unwrap().len(), 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_recorded_sample_is_observed() {
        let (handle, _, _) = start(false).await;
        let mut state = handle.state();

        let input = SampleInput {
            gsr: 2500.0,
            heartbeat: 80,
            spo2: 95.0,
            temperature: 37.2,
        };
        handle.record_sample(input).await.unwrap();

        state
            .wait_for(|s| s.level == StressLevel::Critical)
            .await
            .unwrap();
        assert_eq!(handle.history(None).await.unwrap().len(), 1);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_releases_subscription() {
        let (handle, source, _) = start(false).await;
        assert_eq!(source.subscription_count(), 1);

        handle.shutdown().await.unwrap();
        assert_eq!(source.subscription_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_in_moderate_cancels_blinking() {
        let (handle, source, _) = start(false).await;
        let mut state = handle.state();

        source.insert_sample(scored(0.5)).await.unwrap();
        state
            .wait_for(|s| s.level == StressLevel::Moderate)
            .await
            .unwrap();
        // Let the blink run for a few periods first
        state.wait_for(|s| s.blinking).await.unwrap();

        handle.shutdown().await.unwrap();
        assert!(!state.borrow().blinking);

        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert!(!state.borrow().blinking);
        assert_eq!(state.borrow().level, StressLevel::Moderate);
    }

    #[tokio::test]
    async fn test_pending_samples_processed_before_shutdown() {
        let (handle, source, _) = start(true).await;

        for score in [0.91, 0.92, 0.93] {
            source.insert_sample(scored(score)).await.unwrap();
        }
        handle.shutdown().await.unwrap();

        assert_eq!(source.all_alerts().len(), 3);
    }

    #[tokio::test]
    async fn test_handle_fails_after_shutdown_of_loop() {
        let (handle, _, _) = start(false).await;
        let commands = handle.commands.clone();
        commands.send(Command::Shutdown).await.unwrap();

        // Wait for the loop to exit and drop its receiver
        commands.closed().await;
        assert!(matches!(
            handle.trigger_alert().await,
            Err(MonitorError::MonitorStopped)
        ));
    }
}
