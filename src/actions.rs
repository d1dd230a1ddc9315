use crate::models::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Kind of movement a balancing action performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// Move a replica to a log directory on another broker
    ReplicaMovement,

    /// Hand leadership to a follower replica on another broker
    LeadershipMovement,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ReplicaMovement => "REPLICA_MOVEMENT",
            ActionType::LeadershipMovement => "LEADERSHIP_MOVEMENT",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed or committed move. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancingAction {
    topic_partition: TopicPartition,
    source_broker: BrokerId,
    source_log_dir: String,
    destination_broker: BrokerId,
    destination_log_dir: String,
    action_type: ActionType,
}

impl BalancingAction {
    pub fn new(
        topic_partition: TopicPartition,
        source_broker: BrokerId,
        source_log_dir: impl Into<String>,
        destination_broker: BrokerId,
        destination_log_dir: impl Into<String>,
        action_type: ActionType,
    ) -> Self {
        Self {
            topic_partition,
            source_broker,
            source_log_dir: source_log_dir.into(),
            destination_broker,
            destination_log_dir: destination_log_dir.into(),
            action_type,
        }
    }

    pub fn topic_partition(&self) -> &TopicPartition {
        &self.topic_partition
    }

    pub fn source_broker(&self) -> BrokerId {
        self.source_broker
    }

    pub fn source_log_dir(&self) -> &str {
        &self.source_log_dir
    }

    pub fn destination_broker(&self) -> BrokerId {
        self.destination_broker
    }

    pub fn destination_log_dir(&self) -> &str {
        &self.destination_log_dir
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn source(&self) -> LogDirId {
        LogDirId::new(self.source_broker, self.source_log_dir.clone())
    }

    pub fn destination(&self) -> LogDirId {
        LogDirId::new(self.destination_broker, self.destination_log_dir.clone())
    }

    /// Get the brokers affected by this action
    pub fn affected_brokers(&self) -> Vec<BrokerId> {
        vec![self.source_broker, self.destination_broker]
    }
}

impl fmt::Display for BalancingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action_type {
            ActionType::ReplicaMovement => write!(
                f,
                "Move replica of {} from {}:{} to {}:{}",
                self.topic_partition,
                self.source_broker,
                self.source_log_dir,
                self.destination_broker,
                self.destination_log_dir
            ),
            ActionType::LeadershipMovement => write!(
                f,
                "Move leadership of {} from broker {} to {}",
                self.topic_partition, self.source_broker, self.destination_broker
            ),
        }
    }
}

/// An action that was applied to the cluster model, tagged with the goal that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedAction {
    pub goal: String,
    pub label: String,
    pub replica_size_bytes: u64,
    pub action: BalancingAction,
}

impl CommittedAction {
    /// Estimate the cost/impact of this action
    pub fn cost(&self) -> ActionCost {
        match self.action.action_type() {
            ActionType::ReplicaMovement => ActionCost {
                data_transfer_bytes: self.replica_size_bytes,
                leader_movement: false,
            },
            ActionType::LeadershipMovement => ActionCost {
                data_transfer_bytes: 0,
                leader_movement: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ActionCost {
    pub data_transfer_bytes: u64,
    pub leader_movement: bool,
}

/// The output of one optimization run: committed actions in commit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalancePlan {
    pub actions: Vec<CommittedAction>,
    pub total_data_transfer_bytes: u64,
    pub actions_per_goal: BTreeMap<String, usize>,
    pub metadata: PlanMetadata,
}

impl RebalancePlan {
    pub fn new(actions: Vec<CommittedAction>) -> Self {
        let total_data_transfer_bytes = actions
            .iter()
            .map(|a| a.cost().data_transfer_bytes)
            .sum();

        let mut actions_per_goal = BTreeMap::new();
        for action in &actions {
            *actions_per_goal.entry(action.goal.clone()).or_insert(0) += 1;
        }

        Self {
            actions,
            total_data_transfer_bytes,
            actions_per_goal,
            metadata: PlanMetadata::default(),
        }
    }

    /// Group actions into batches that can be executed concurrently.
    ///
    /// A batch never touches the same broker twice and keeps plan order, so
    /// executing batches one after another preserves the commit order per
    /// broker.
    pub fn batch_actions(&self, max_concurrent: usize) -> Vec<Vec<&CommittedAction>> {
        let mut batches = Vec::new();
        let mut current_batch = Vec::new();
        let mut affected_brokers = HashSet::new();

        for action in &self.actions {
            let action_brokers = action.action.affected_brokers();

            let has_conflict = action_brokers
                .iter()
                .any(|b| affected_brokers.contains(b));

            if (has_conflict || current_batch.len() >= max_concurrent.max(1))
                && !current_batch.is_empty()
            {
                batches.push(current_batch);
                current_batch = Vec::new();
                affected_brokers.clear();
            }

            current_batch.push(action);
            affected_brokers.extend(action_brokers);
        }

        if !current_batch.is_empty() {
            batches.push(current_batch);
        }

        batches
    }

    /// Check if this plan is empty
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn replica_movements(&self) -> impl Iterator<Item = &CommittedAction> {
        self.actions
            .iter()
            .filter(|a| a.action.action_type() == ActionType::ReplicaMovement)
    }

    pub fn leadership_movements(&self) -> impl Iterator<Item = &CommittedAction> {
        self.actions
            .iter()
            .filter(|a| a.action.action_type() == ActionType::LeadershipMovement)
    }

    /// Get summary statistics
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            total_actions: self.actions.len(),
            replica_movement_count: self.replica_movements().count(),
            leadership_movement_count: self.leadership_movements().count(),
            total_data_transfer_bytes: self.total_data_transfer_bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Goals in the order they were optimized
    pub goals_used: Vec<String>,
    pub cluster_stats: Option<ClusterStats>,
}

impl Default for PlanMetadata {
    fn default() -> Self {
        Self {
            created_at: Some(chrono::Utc::now()),
            goals_used: Vec::new(),
            cluster_stats: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub broker_count: usize,
    pub log_dir_count: usize,
    pub partition_count: usize,
    pub replica_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSummary {
    pub total_actions: usize,
    pub replica_movement_count: usize,
    pub leadership_movement_count: usize,
    pub total_data_transfer_bytes: u64,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total Actions: {}, Replica Moves: {}, Leadership Moves: {}, Data Transfer: {} bytes",
            self.total_actions,
            self.replica_movement_count,
            self.leadership_movement_count,
            self.total_data_transfer_bytes
        )
    }
}
