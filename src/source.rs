//! Data source capability
//!
//! The hosted backend (row storage plus realtime change feed) is consumed
//! through the [`DataSource`] trait so the monitor never depends on a
//! particular backend.

use crate::error::MonitorError;
use crate::types::{AlertRecord, BiometricSample, Profile, UserId};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Sort direction on a timestamp column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Filters for [`DataSource::query_samples`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleQuery {
    /// Only samples recorded at or after this instant
    pub since: Option<DateTime<Utc>>,
    /// Ordering on `recorded_at`
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl SampleQuery {
    /// Most recent sample only
    pub fn latest() -> Self {
        Self {
            since: None,
            order: SortOrder::Descending,
            limit: Some(1),
        }
    }

    /// Full history, oldest first
    pub fn history() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }
}

/// Handle identifying a live insert subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newly inserted samples for one user, in insertion order.
///
/// Must be handed back through [`DataSource::unsubscribe`] when no longer
/// needed.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub receiver: mpsc::UnboundedReceiver<BiometricSample>,
}

/// Storage and change feed for samples, alerts and profiles
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    async fn insert_sample(&self, sample: BiometricSample) -> Result<(), MonitorError>;

    async fn query_samples(
        &self,
        user_id: &UserId,
        query: &SampleQuery,
    ) -> Result<Vec<BiometricSample>, MonitorError>;

    /// Subscribe to samples inserted for `user_id` from now on
    async fn subscribe_to_inserts(&self, user_id: &UserId) -> Result<Subscription, MonitorError>;

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), MonitorError>;

    async fn insert_alert(&self, record: AlertRecord) -> Result<(), MonitorError>;

    async fn query_alerts(
        &self,
        user_id: &UserId,
        order: SortOrder,
        limit: usize,
    ) -> Result<Vec<AlertRecord>, MonitorError>;

    /// Profile for `user_id`, or `None` if it was never saved
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>, MonitorError>;

    async fn upsert_profile(&self, profile: Profile) -> Result<(), MonitorError>;
}
