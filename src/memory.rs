//! In-memory backend
//!
//! A process-local [`DataSource`] with a realtime insert feed. Used by the
//! CLI replay mode and by tests.

use crate::error::MonitorError;
use crate::source::{DataSource, SampleQuery, SortOrder, Subscription, SubscriptionId};
use crate::types::{AlertRecord, BiometricSample, Profile, UserId};
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::mpsc;

struct Subscriber {
    user_id: UserId,
    sender: mpsc::UnboundedSender<BiometricSample>,
}

/// Process-local data source
#[derive(Default)]
pub struct InMemoryDataSource {
    samples: RwLock<Vec<BiometricSample>>,
    alerts: RwLock<Vec<AlertRecord>>,
    profiles: RwLock<HashMap<UserId, Profile>>,
    subscribers: RwLock<HashMap<SubscriptionId, Subscriber>>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live insert subscriptions
    pub fn subscription_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Every stored alert, in insertion order
    pub fn all_alerts(&self) -> Vec<AlertRecord> {
        self.alerts.read().clone()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.read().len()
    }
}

#[async_trait::async_trait]
impl DataSource for InMemoryDataSource {
    async fn insert_sample(&self, sample: BiometricSample) -> Result<(), MonitorError> {
        self.samples.write().push(sample.clone());

        let mut closed = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for (id, subscriber) in subscribers.iter() {
                if subscriber.user_id != sample.user_id {
                    continue;
                }
                if subscriber.sender.send(sample.clone()).is_err() {
                    closed.push(*id);
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in closed {
                tracing::debug!(subscription = %id, "Dropping closed subscription");
                subscribers.remove(&id);
            }
        }

        Ok(())
    }

    async fn query_samples(
        &self,
        user_id: &UserId,
        query: &SampleQuery,
    ) -> Result<Vec<BiometricSample>, MonitorError> {
        let mut samples: Vec<BiometricSample> = self
            .samples
            .read()
            .iter()
            .filter(|s| &s.user_id == user_id)
            .filter(|s| query.since.map_or(true, |since| s.recorded_at >= since))
            .cloned()
            .collect();

        samples.sort_by_key(|s| s.recorded_at);
        if query.order == SortOrder::Descending {
            samples.reverse();
        }
        if let Some(limit) = query.limit {
            samples.truncate(limit);
        }

        Ok(samples)
    }

    async fn subscribe_to_inserts(&self, user_id: &UserId) -> Result<Subscription, MonitorError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();

        self.subscribers.write().insert(
            id,
            Subscriber {
                user_id: user_id.clone(),
                sender,
            },
        );
        tracing::debug!(subscription = %id, user_id = %user_id, "Subscribed to sample inserts");

        Ok(Subscription { id, receiver })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), MonitorError> {
        match self.subscribers.write().remove(&id) {
            Some(_) => Ok(()),
            None => Err(MonitorError::DataSource(format!(
                "unknown subscription {}",
                id
            ))),
        }
    }

    async fn insert_alert(&self, record: AlertRecord) -> Result<(), MonitorError> {
        self.alerts.write().push(record);
        Ok(())
    }

    async fn query_alerts(
        &self,
        user_id: &UserId,
        order: SortOrder,
        limit: usize,
    ) -> Result<Vec<AlertRecord>, MonitorError> {
        // Insertion order is creation order
        let alerts = self.alerts.read();
        let owned = alerts.iter().filter(|a| &a.user_id == user_id).cloned();

        let result = match order {
            SortOrder::Ascending => owned.take(limit).collect(),
            SortOrder::Descending => {
                let mut all: Vec<AlertRecord> = owned.collect();
                all.reverse();
                all.truncate(limit);
                all
            }
        };

        Ok(result)
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>, MonitorError> {
        Ok(self.profiles.read().get(user_id).cloned())
    }

    async fn upsert_profile(&self, profile: Profile) -> Result<(), MonitorError> {
        self.profiles.write().insert(profile.id.clone(), profile);
        Ok(())
    }
}
