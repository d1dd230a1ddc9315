use crate::models::BrokerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Run-scoped options that control how optimization is performed.
///
/// Read-only for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationOptions {
    /// Brokers whose replicas may be rebalanced; empty means all brokers
    pub balance_brokers: BTreeSet<BrokerId>,

    /// Brokers excluded from receiving new replicas or leadership
    pub offline_brokers: BTreeSet<BrokerId>,

    /// Topics whose replicas are never selected for movement
    pub excluded_topics: BTreeSet<String>,

    /// Maximum total actions in a single plan
    pub max_actions_per_plan: usize,
}

impl Default for OptimizationOptions {
    fn default() -> Self {
        Self {
            balance_brokers: BTreeSet::new(),
            offline_brokers: BTreeSet::new(),
            excluded_topics: BTreeSet::new(),
            max_actions_per_plan: 10_000,
        }
    }
}

impl OptimizationOptions {
    /// Restrict rebalancing to the given brokers
    pub fn for_brokers(broker_ids: impl IntoIterator<Item = BrokerId>) -> Self {
        Self {
            balance_brokers: broker_ids.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Keep the given brokers from receiving replicas or leadership.
    ///
    /// Replicas already on them stay put unless some goal moves them for its
    /// own reasons; nothing here drains a broker.
    pub fn excluding_brokers(broker_ids: impl IntoIterator<Item = BrokerId>) -> Self {
        Self::default().with_offline_brokers(broker_ids)
    }

    pub fn with_offline_brokers(mut self, broker_ids: impl IntoIterator<Item = BrokerId>) -> Self {
        self.offline_brokers.extend(broker_ids);
        self
    }

    pub fn with_excluded_topics<S: Into<String>>(mut self, topics: impl IntoIterator<Item = S>) -> Self {
        self.excluded_topics.extend(topics.into_iter().map(Into::into));
        self
    }

    pub fn with_max_actions(mut self, max_actions_per_plan: usize) -> Self {
        self.max_actions_per_plan = max_actions_per_plan;
        self
    }

    /// Check if a broker is in the set being rebalanced
    pub fn is_balance_broker(&self, broker_id: BrokerId) -> bool {
        self.balance_brokers.is_empty() || self.balance_brokers.contains(&broker_id)
    }

    /// Check if a broker can receive new replicas or leadership
    pub fn is_offline(&self, broker_id: BrokerId) -> bool {
        self.offline_brokers.contains(&broker_id)
    }

    /// Check if a topic can be rebalanced
    pub fn can_rebalance_topic(&self, topic: &str) -> bool {
        !self.excluded_topics.contains(topic)
    }
}
