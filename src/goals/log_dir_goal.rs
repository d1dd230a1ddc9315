//! Shared driver for goals that move replicas between log directories or
//! move leadership between replicas.
//!
//! A goal only supplies its per-run state, its per-broker strategy and its
//! own satisfaction check; broker ordering, candidate filtering, legality,
//! arbitration and committing live here.

use tracing::{debug, trace, warn};

use crate::acceptance::{is_proposal_acceptable_for_optimized_goals, ActionAcceptance};
use crate::actions::{ActionType, BalancingAction};
use crate::models::{BrokerId, ClusterModel, LogDirId, Replica};
use crate::options::OptimizationOptions;
use crate::RebalancerError;
use super::{brokers_in_scope, Goal, OptimizedGoals};

/// Hooks a goal plugs into the log-dir driver.
pub trait LogDirGoal: Goal {
    /// Precompute whatever the goal needs for this run (target bands etc.)
    fn init_goal_state(&mut self, cluster: &ClusterModel, options: &OptimizationOptions);

    /// Try to fix this broker, calling [`maybe_apply_balancing_action`] for
    /// each replica the goal wants to move.
    fn rebalance_for_broker(
        &mut self,
        broker_id: BrokerId,
        cluster: &mut ClusterModel,
        optimized_goals: &OptimizedGoals<'_>,
        options: &OptimizationOptions,
    ) -> Result<(), RebalancerError>;

    /// Whether the proposed action improves or keeps this goal's criterion
    /// without breaking its own limits.
    fn self_satisfied(&self, cluster: &ClusterModel, action: &BalancingAction) -> bool;
}

/// Run a full pass of `goal`: init its state, then rebalance every in-scope
/// broker in ascending id order.
pub fn optimize_log_dir_goal<G: LogDirGoal + ?Sized>(
    goal: &mut G,
    cluster: &mut ClusterModel,
    optimized_goals: &OptimizedGoals<'_>,
    options: &OptimizationOptions,
) -> Result<(), RebalancerError> {
    goal.init_goal_state(cluster, options);

    for broker_id in brokers_in_scope(cluster, options) {
        goal.rebalance_for_broker(broker_id, cluster, optimized_goals, options)?;
    }
    Ok(())
}

/// Try the candidates in order and commit the first acceptable action.
///
/// Returns the chosen log directory, or `None` when the replica stays where
/// it is. Errors only come from the model's mutators and mean the run must be
/// abandoned.
pub fn maybe_apply_balancing_action<G: LogDirGoal + ?Sized>(
    goal: &G,
    cluster: &mut ClusterModel,
    replica: &Replica,
    candidate_log_dirs: &[LogDirId],
    action_type: ActionType,
    optimized_goals: &OptimizedGoals<'_>,
    options: &OptimizationOptions,
) -> Result<Option<LogDirId>, RebalancerError> {
    let tp = &replica.topic_partition;

    // Moving two replicas of one partition in the same run can pass them
    // through each other's brokers (KAFKA-9087), so only one replica move
    // per partition is allowed.
    if action_type == ActionType::ReplicaMovement && cluster.has_moved(tp) {
        debug!(goal = goal.name(), partition = %tp, "partition already moved in this run");
        return Ok(None);
    }

    if cluster.committed_actions().len() >= options.max_actions_per_plan {
        warn!(
            goal = goal.name(),
            max_actions = options.max_actions_per_plan,
            "action limit reached"
        );
        return Ok(None);
    }

    // Decide on the model's current view of the replica
    let replica = match cluster.replica(tp, replica.broker_id) {
        Some(current) if current.log_dir == replica.log_dir => current.clone(),
        _ => {
            debug!(goal = goal.name(), partition = %tp, broker = replica.broker_id, "replica no longer in place");
            return Ok(None);
        }
    };

    for log_dir in eligible_log_dirs(&replica, candidate_log_dirs, action_type, options) {
        let proposal = BalancingAction::new(
            tp.clone(),
            replica.broker_id,
            replica.log_dir.clone(),
            log_dir.broker_id,
            log_dir.name.clone(),
            action_type,
        );

        if !legit_move(cluster, &replica, log_dir.broker_id, action_type) {
            trace!(goal = goal.name(), action = %proposal, "illegal move");
            continue;
        }
        if !goal.self_satisfied(cluster, &proposal) {
            trace!(goal = goal.name(), action = %proposal, "not self satisfied");
            continue;
        }
        if is_proposal_acceptable_for_optimized_goals(optimized_goals, &proposal, cluster)
            != ActionAcceptance::Accept
        {
            continue;
        }

        match action_type {
            ActionType::LeadershipMovement => cluster.relocate_leadership(
                goal.name(),
                action_type.as_str(),
                tp,
                replica.broker_id,
                log_dir.broker_id,
            )?,
            ActionType::ReplicaMovement => cluster.relocate_replica(
                goal.name(),
                action_type.as_str(),
                tp,
                replica.broker_id,
                &replica.log_dir,
                log_dir.broker_id,
                &log_dir.name,
            )?,
        }
        debug!(goal = goal.name(), action = %proposal, "applied balancing action");
        return Ok(Some(log_dir));
    }

    Ok(None)
}

/// Legality of a move against the current model:
/// a replica may only move to a broker that does not host the partition,
/// leadership may only move from the leader to a broker hosting a follower.
fn legit_move(
    cluster: &ClusterModel,
    replica: &Replica,
    destination_broker: BrokerId,
    action_type: ActionType,
) -> bool {
    let Some(destination) = cluster.broker(destination_broker) else {
        return false;
    };
    match action_type {
        ActionType::ReplicaMovement => destination.replica(&replica.topic_partition).is_none(),
        ActionType::LeadershipMovement => {
            replica.is_leader
                && destination
                    .replica(&replica.topic_partition)
                    .map(|r| !r.is_leader)
                    .unwrap_or(false)
        }
    }
}

/// Candidates left after dropping offline brokers.
pub fn eligible_log_dirs(
    replica: &Replica,
    candidates: &[LogDirId],
    action_type: ActionType,
    options: &OptimizationOptions,
) -> Vec<LogDirId> {
    let mut eligible = candidates.to_vec();
    filter_out_brokers_excluded_for_leadership(&mut eligible, options, replica, action_type);
    filter_out_brokers_excluded_for_replica_move(&mut eligible, options, action_type);
    eligible
}

/// Offline brokers must not receive leadership, either directly or by
/// receiving a leader replica.
pub fn filter_out_brokers_excluded_for_leadership(
    eligible: &mut Vec<LogDirId>,
    options: &OptimizationOptions,
    replica: &Replica,
    action_type: ActionType,
) {
    if !options.offline_brokers.is_empty()
        && (action_type == ActionType::LeadershipMovement || replica.is_leader)
    {
        eligible.retain(|d| !options.is_offline(d.broker_id));
    }
}

/// Offline brokers must not receive new replicas.
pub fn filter_out_brokers_excluded_for_replica_move(
    eligible: &mut Vec<LogDirId>,
    options: &OptimizationOptions,
    action_type: ActionType,
) {
    if !options.offline_brokers.is_empty() && action_type == ActionType::ReplicaMovement {
        eligible.retain(|d| !options.is_offline(d.broker_id));
    }
}
