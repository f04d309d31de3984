//! Guided breathing exercise
//!
//! Box-style breathing: inhale, hold, exhale, each for a fixed duration. A
//! cycle completes every time the session wraps back to inhale; the session
//! ends after the target number of cycles.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_PHASE_DURATION: Duration = Duration::from_secs(4);
pub const DEFAULT_TOTAL_CYCLES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreathPhase {
    Inhale,
    Hold,
    Exhale,
}

impl BreathPhase {
    pub fn next(&self) -> Self {
        match self {
            BreathPhase::Inhale => BreathPhase::Hold,
            BreathPhase::Hold => BreathPhase::Exhale,
            BreathPhase::Exhale => BreathPhase::Inhale,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BreathPhase::Inhale => "Inhale",
            BreathPhase::Hold => "Hold",
            BreathPhase::Exhale => "Exhale",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreathingSession {
    phase: BreathPhase,
    cycles: u32,
    total_cycles: u32,
    running: bool,
    phase_duration: Duration,
}

impl Default for BreathingSession {
    fn default() -> Self {
        Self::new(DEFAULT_TOTAL_CYCLES)
    }
}

impl BreathingSession {
    pub fn new(total_cycles: u32) -> Self {
        Self {
            phase: BreathPhase::Inhale,
            cycles: 0,
            total_cycles,
            running: false,
            phase_duration: DEFAULT_PHASE_DURATION,
        }
    }

    pub fn with_phase_duration(mut self, duration: Duration) -> Self {
        self.phase_duration = duration;
        self
    }

    pub fn phase(&self) -> BreathPhase {
        self.phase
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn total_cycles(&self) -> u32 {
        self.total_cycles
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn phase_duration(&self) -> Duration {
        self.phase_duration
    }

    /// Reset to the first inhale and start
    pub fn start(&mut self) {
        self.phase = BreathPhase::Inhale;
        self.cycles = 0;
        self.running = self.total_cycles > 0;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Move to the next phase once the current one has elapsed.
    ///
    /// Returns the new phase, or `None` if the session is not running.
    pub fn advance(&mut self) -> Option<BreathPhase> {
        if !self.running {
            return None;
        }

        self.phase = self.phase.next();
        if self.phase == BreathPhase::Inhale {
            self.cycles += 1;
            if self.cycles >= self.total_cycles {
                self.running = false;
            }
        }
        Some(self.phase)
    }
}

/// Run a session to completion in real time, calling `on_phase` at the
/// start of every phase. Returns the number of completed cycles.
pub async fn run_session<F>(session: &mut BreathingSession, mut on_phase: F) -> u32
where
    F: FnMut(BreathPhase, u32),
{
    session.start();
    while session.is_running() {
        on_phase(session.phase(), session.cycles());
        tokio::time::sleep(session.phase_duration()).await;
        session.advance();
    }
    session.cycles()
}
