//! MindEase core - stress scoring and threshold alerting for wearable biometrics
//!
//! Readings from the wearable (GSR, heart rate, SpO2, skin temperature) are
//! folded into a single stress score, classified into levels, and fed to a
//! per-user state machine that blinks on moderate stress and raises alerts on
//! high and critical stress:
//! sample insert → score → classify → blink / alert → notify.
//!
//! ## Modules
//!
//! - **Scoring**: [`scorer`] and [`thresholds`] turn one sample into a level
//! - **Monitor**: [`monitor`] holds the state machine, [`service`] runs it on a task
//! - **Seams**: [`source::DataSource`] for storage, [`notify::NotificationSink`] for SMS

pub mod blink;
pub mod breathing;
pub mod config;
pub mod error;
pub mod forms;
pub mod memory;
pub mod monitor;
pub mod notify;
pub mod scorer;
pub mod service;
pub mod source;
pub mod thresholds;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::MonitorConfig;
pub use error::MonitorError;
pub use memory::InMemoryDataSource;
pub use monitor::StressMonitor;
pub use notify::{LogSink, NotificationSink, RecordingSink};
pub use scorer::{compute_stress_score, effective_score};
pub use service::{spawn, MonitorHandle};
pub use source::DataSource;
pub use thresholds::{classify, StressThresholds};
pub use types::{
    AlertPreferences, AlertRecord, AlertType, BiometricSample, MonitorEvent, MonitorState,
    Profile, StressLevel, UserId,
};

/// MindEase core version
pub const MINDEASE_VERSION: &str = env!("CARGO_PKG_VERSION");
