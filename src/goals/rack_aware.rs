use std::collections::{BTreeMap, BTreeSet};
use crate::acceptance::ActionAcceptance;
use crate::actions::{ActionType, BalancingAction};
use crate::models::{BrokerId, ClusterModel, LogDirId, TopicPartition};
use crate::options::OptimizationOptions;
use crate::RebalancerError;
use super::log_dir_goal::{maybe_apply_balancing_action, optimize_log_dir_goal, LogDirGoal};
use super::{brokers_in_scope, log_dirs_outside, movable_replicas};
use super::{Goal, GoalPriority, GoalViolation, OptimizedGoals, ViolationSeverity};

/// Ensures all replicas are assigned in a rack-aware manner
#[derive(Debug, Default)]
pub struct RackAwareGoal {
    scope: BTreeSet<BrokerId>,
}

impl RackAwareGoal {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Racks holding a replica of `tp`, ignoring the replica on `exclude`
fn racks_of_other_replicas(cluster: &ClusterModel, tp: &TopicPartition, exclude: BrokerId) -> BTreeSet<String> {
    cluster
        .assignment(tp)
        .unwrap_or_default()
        .iter()
        .filter(|id| **id != exclude)
        .filter_map(|id| cluster.rack_of(*id).map(str::to_string))
        .collect()
}

fn keeps_racks_distinct(cluster: &ClusterModel, action: &BalancingAction) -> bool {
    match cluster.rack_of(action.destination_broker()) {
        Some(rack) => !racks_of_other_replicas(cluster, action.topic_partition(), action.source_broker())
            .contains(rack),
        None => true,
    }
}

impl Goal for RackAwareGoal {
    fn name(&self) -> &str {
        "RackAwareGoal"
    }

    fn priority(&self) -> GoalPriority {
        GoalPriority::Critical
    }

    fn optimize(
        &mut self,
        cluster: &mut ClusterModel,
        optimized_goals: &OptimizedGoals<'_>,
        options: &OptimizationOptions,
    ) -> Result<(), RebalancerError> {
        optimize_log_dir_goal(self, cluster, optimized_goals, options)
    }

    fn action_acceptance(&self, action: &BalancingAction, cluster: &ClusterModel) -> ActionAcceptance {
        match action.action_type() {
            ActionType::ReplicaMovement if !keeps_racks_distinct(cluster, action) => ActionAcceptance::Reject,
            _ => ActionAcceptance::Accept,
        }
    }

    fn check(&self, cluster: &ClusterModel) -> Vec<GoalViolation> {
        let mut violations = Vec::new();

        for tp in cluster.partitions() {
            let assignment = cluster.assignment(tp).unwrap_or_default();
            let mut rack_counts: BTreeMap<&str, usize> = BTreeMap::new();

            for broker_id in assignment {
                if let Some(rack) = cluster.rack_of(*broker_id) {
                    *rack_counts.entry(rack).or_insert(0) += 1;
                }
            }

            // Check if any rack has more than one replica
            for (rack, count) in rack_counts {
                if count > 1 {
                    violations.push(GoalViolation {
                        goal_name: self.name().to_string(),
                        severity: ViolationSeverity::Critical,
                        description: format!(
                            "Partition {} has {} replicas in rack {}",
                            tp, count, rack
                        ),
                        affected_brokers: assignment.to_vec(),
                    });
                }
            }
        }

        violations
    }
}

impl LogDirGoal for RackAwareGoal {
    fn init_goal_state(&mut self, cluster: &ClusterModel, options: &OptimizationOptions) {
        self.scope = brokers_in_scope(cluster, options);
    }

    fn rebalance_for_broker(
        &mut self,
        broker_id: BrokerId,
        cluster: &mut ClusterModel,
        optimized_goals: &OptimizedGoals<'_>,
        options: &OptimizationOptions,
    ) -> Result<(), RebalancerError> {
        let Some(rack) = cluster.rack_of(broker_id).map(str::to_string) else {
            return Ok(());
        };

        for replica in movable_replicas(cluster, broker_id, options) {
            let tp = &replica.topic_partition;
            let used_racks = racks_of_other_replicas(cluster, tp, broker_id);
            if !used_racks.contains(&rack) {
                continue;
            }

            // Least loaded brokers first, then emptiest directory
            let mut candidates: Vec<_> = log_dirs_outside(cluster, &self.scope, broker_id)
                .into_iter()
                .filter(|d| {
                    cluster
                        .rack_of(d.broker_id)
                        .map(|r| !used_racks.contains(r))
                        .unwrap_or(true)
                })
                .collect();
            candidates.sort_by(|a, b| {
                let load = |id: BrokerId| cluster.broker(id).map(|x| x.replica_count()).unwrap_or(0);
                let util = |d: &LogDirId| cluster.log_dir(d).map(|x| x.utilization()).unwrap_or(0.0);
                load(a.broker_id)
                    .cmp(&load(b.broker_id))
                    .then(util(a).total_cmp(&util(b)))
                    .then(a.cmp(b))
            });

            if maybe_apply_balancing_action(
                &*self,
                cluster,
                &replica,
                &candidates,
                ActionType::ReplicaMovement,
                optimized_goals,
                options,
            )?
            .is_none()
            {
                tracing::debug!(partition = %tp, broker = broker_id, "no rack-aware destination");
            }
        }
        Ok(())
    }

    fn self_satisfied(&self, cluster: &ClusterModel, action: &BalancingAction) -> bool {
        match action.action_type() {
            ActionType::ReplicaMovement => keeps_racks_distinct(cluster, action),
            ActionType::LeadershipMovement => true,
        }
    }
}
