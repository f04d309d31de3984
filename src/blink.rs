//! Moderate-stress blink timer
//!
//! While the monitor sits in the moderate band the status badge blinks: a
//! background task flips `blinking` on the shared read model once per
//! period. The task is aborted and the flag cleared as soon as the level
//! changes or the timer is dropped.

use crate::types::MonitorState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub struct BlinkTimer {
    period: Duration,
    state: Arc<watch::Sender<MonitorState>>,
    task: Option<(JoinHandle<()>, Arc<AtomicBool>)>,
}

impl BlinkTimer {
    pub fn new(period: Duration, state: Arc<watch::Sender<MonitorState>>) -> Self {
        Self {
            period,
            state,
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Start toggling; no-op if already running
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }

        let period = self.period;
        let state = Arc::clone(&self.state);
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Under the channel lock, so no toggle lands after stop()
                state.send_if_modified(|s| {
                    if flag.load(Ordering::SeqCst) {
                        return false;
                    }
                    s.blinking = !s.blinking;
                    true
                });
            }
        });
        self.task = Some((task, cancelled));
        tracing::debug!(period_ms = period.as_millis() as u64, "Blink timer started");
    }

    /// Abort the task and clear the flag; no-op if not running
    pub fn stop(&mut self) {
        if let Some((task, cancelled)) = self.task.take() {
            cancelled.store(true, Ordering::SeqCst);
            task.abort();
            tracing::debug!("Blink timer stopped");
        }
        self.state.send_if_modified(|s| {
            let was = s.blinking;
            s.blinking = false;
            was
        });
    }

    /// Run the timer only while `active` holds
    pub fn set_active(&mut self, active: bool) {
        if active {
            self.start();
        } else {
            self.stop();
        }
    }
}

impl Drop for BlinkTimer {
    fn drop(&mut self) {
        if let Some((task, cancelled)) = self.task.take() {
            cancelled.store(true, Ordering::SeqCst);
            task.abort();
        }
    }
}
