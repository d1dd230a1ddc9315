use std::collections::BTreeSet;
use crate::acceptance::ActionAcceptance;
use crate::actions::BalancingAction;
use crate::models::{BrokerId, ClusterModel, LogDirId, Replica};
use crate::options::OptimizationOptions;
use crate::RebalancerError;

/// Priority level for goals
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GoalPriority {
    Critical = 0,  // Must be satisfied
    High = 1,
    Medium = 2,
    Low = 3,
}

#[derive(Debug, Clone)]
pub struct GoalViolation {
    pub goal_name: String,
    pub severity: ViolationSeverity,
    pub description: String,
    pub affected_brokers: Vec<BrokerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationSeverity {
    Critical,
    High,
    Medium,
    Low,
}

/// Core trait for optimization goals
pub trait Goal: Send + Sync {
    /// Name of this goal, used to label committed actions
    fn name(&self) -> &str;

    /// Priority of this goal; lower runs first
    fn priority(&self) -> GoalPriority;

    /// Run this goal's full pass over the cluster, committing accepted moves
    /// into `cluster`.
    fn optimize(
        &mut self,
        cluster: &mut ClusterModel,
        optimized_goals: &OptimizedGoals<'_>,
        options: &OptimizationOptions,
    ) -> Result<(), RebalancerError>;

    /// Whether applying `action` keeps this goal's criterion as it was left
    /// by this goal's own pass.
    fn action_acceptance(&self, action: &BalancingAction, cluster: &ClusterModel) -> ActionAcceptance;

    /// Check if the cluster satisfies this goal
    fn check(&self, cluster: &ClusterModel) -> Vec<GoalViolation>;

    fn is_satisfied(&self, cluster: &ClusterModel) -> bool {
        self.check(cluster).is_empty()
    }

    /// Check if this is a hard goal (must be satisfied)
    fn is_hard_goal(&self) -> bool {
        matches!(self.priority(), GoalPriority::Critical)
    }
}

/// Goals that already finished their pass in the current run.
///
/// Later goals may not commit an action any of these would reject.
#[derive(Clone, Copy)]
pub struct OptimizedGoals<'a> {
    goals: &'a [Box<dyn Goal>],
}

impl<'a> OptimizedGoals<'a> {
    pub fn new(goals: &'a [Box<dyn Goal>]) -> Self {
        Self { goals }
    }

    pub fn empty() -> Self {
        Self { goals: &[] }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a dyn Goal> + 'a {
        self.goals.iter().map(|g| g.as_ref())
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.iter().any(|g| g.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.iter().map(|g| g.name().to_string()).collect()
    }
}

/// Inclusive band of acceptable per-unit counts around the average.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountBand {
    pub lower: usize,
    pub upper: usize,
}

impl CountBand {
    pub fn around_average(total: usize, units: usize, allowed_variance: f64) -> Self {
        if units == 0 {
            return Self { lower: 0, upper: 0 };
        }
        let avg = total as f64 / units as f64;
        Self {
            lower: (avg * (1.0 - allowed_variance)).floor().max(0.0) as usize,
            upper: (avg * (1.0 + allowed_variance)).ceil() as usize,
        }
    }

    pub fn contains(&self, count: usize) -> bool {
        count >= self.lower && count <= self.upper
    }

    /// Whether moving one unit from a broker holding `source` to one holding
    /// `destination` keeps the destination under the upper bound and the
    /// source over the lower one
    pub fn admits_move(&self, source: usize, destination: usize) -> bool {
        destination + 1 <= self.upper && source.saturating_sub(1) >= self.lower
    }
}

/// Band of acceptable utilization ratios around the cluster average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtilizationBand {
    pub average: f64,
    pub lower: f64,
    pub upper: f64,
}

impl UtilizationBand {
    pub fn around_average(used_bytes: u64, capacity_bytes: u64, balance_percentage: f64) -> Self {
        let average = if capacity_bytes == 0 {
            0.0
        } else {
            used_bytes as f64 / capacity_bytes as f64
        };
        Self {
            average,
            lower: average * (1.0 - balance_percentage),
            upper: average * (1.0 + balance_percentage),
        }
    }

    pub fn contains(&self, utilization: f64) -> bool {
        utilization >= self.lower && utilization <= self.upper
    }
}

/// Every broker in the model, ascending
pub(crate) fn all_brokers(cluster: &ClusterModel) -> BTreeSet<BrokerId> {
    cluster.brokers().map(|b| b.id).collect()
}

/// Brokers covered by this run, ascending
pub(crate) fn brokers_in_scope(cluster: &ClusterModel, options: &OptimizationOptions) -> BTreeSet<BrokerId> {
    cluster
        .brokers()
        .map(|b| b.id)
        .filter(|id| options.is_balance_broker(*id))
        .collect()
}

/// Replicas on `broker_id` a goal may pick for movement, by partition
pub(crate) fn movable_replicas(
    cluster: &ClusterModel,
    broker_id: BrokerId,
    options: &OptimizationOptions,
) -> Vec<Replica> {
    cluster
        .broker(broker_id)
        .map(|b| {
            b.replicas()
                .filter(|r| options.can_rebalance_topic(&r.topic_partition.topic))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Log directories on in-scope brokers other than `exclude`
pub(crate) fn log_dirs_outside(
    cluster: &ClusterModel,
    scope: &BTreeSet<BrokerId>,
    exclude: BrokerId,
) -> Vec<LogDirId> {
    cluster
        .log_dirs()
        .filter(|d| d.broker_id != exclude && scope.contains(&d.broker_id))
        .map(|d| d.id())
        .collect()
}

/// Size of the replica an action moves, as the model sees it now
pub(crate) fn moved_size(cluster: &ClusterModel, action: &BalancingAction) -> u64 {
    cluster
        .replica(action.topic_partition(), action.source_broker())
        .map(|r| r.size_bytes)
        .unwrap_or(0)
}

// Module declarations
pub mod log_dir_goal;
mod rack_aware;
mod disk_capacity;
mod disk_distribution;
mod replica_distribution;
mod leader_distribution;
mod preferred_leader;

// Re-exports
pub use log_dir_goal::{eligible_log_dirs, maybe_apply_balancing_action, optimize_log_dir_goal, LogDirGoal};
pub use rack_aware::RackAwareGoal;
pub use disk_capacity::DiskCapacityGoal;
pub use disk_distribution::DiskDistributionGoal;
pub use replica_distribution::ReplicaDistributionGoal;
pub use leader_distribution::LeaderDistributionGoal;
pub use preferred_leader::PreferredLeaderElectionGoal;
