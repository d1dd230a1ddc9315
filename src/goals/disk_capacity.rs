use std::collections::BTreeSet;
use crate::acceptance::ActionAcceptance;
use crate::actions::{ActionType, BalancingAction};
use crate::models::{BrokerId, ClusterModel, LogDirId};
use crate::options::OptimizationOptions;
use crate::RebalancerError;
use super::log_dir_goal::{maybe_apply_balancing_action, optimize_log_dir_goal, LogDirGoal};
use super::{brokers_in_scope, log_dirs_outside, movable_replicas, moved_size};
use super::{Goal, GoalPriority, GoalViolation, OptimizedGoals, ViolationSeverity};

/// Ensures no log directory fills beyond a utilization threshold
#[derive(Debug)]
pub struct DiskCapacityGoal {
    pub threshold: f64, // e.g., 0.8 for 80%
    scope: BTreeSet<BrokerId>,
}

impl DiskCapacityGoal {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            scope: BTreeSet::new(),
        }
    }

    fn destination_fits(&self, cluster: &ClusterModel, action: &BalancingAction) -> bool {
        let size = moved_size(cluster, action);
        cluster
            .log_dir(&action.destination())
            .map(|d| d.utilization_after_adding(size) <= self.threshold)
            .unwrap_or(false)
    }
}

impl Default for DiskCapacityGoal {
    fn default() -> Self {
        Self::new(0.8)
    }
}

impl Goal for DiskCapacityGoal {
    fn name(&self) -> &str {
        "DiskCapacityGoal"
    }

    fn priority(&self) -> GoalPriority {
        GoalPriority::High
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
            ActionType::ReplicaMovement if !self.destination_fits(cluster, action) => ActionAcceptance::Reject,
            _ => ActionAcceptance::Accept,
        }
    }

    fn check(&self, cluster: &ClusterModel) -> Vec<GoalViolation> {
        let mut violations = Vec::new();

        for dir in cluster.log_dirs() {
            let utilization = dir.utilization();

            if utilization > self.threshold {
                violations.push(GoalViolation {
                    goal_name: self.name().to_string(),
                    severity: if utilization > 0.95 {
                        ViolationSeverity::Critical
                    } else {
                        ViolationSeverity::High
                    },
                    description: format!(
                        "Log dir {} utilization: {:.1}% (threshold: {:.1}%)",
                        dir.id(),
                        utilization * 100.0,
                        self.threshold * 100.0
                    ),
                    affected_brokers: vec![dir.broker_id],
                });
            }
        }

        violations
    }
}

impl LogDirGoal for DiskCapacityGoal {
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
        let overfull: Vec<LogDirId> = cluster
            .broker(broker_id)
            .map(|b| {
                b.log_dirs()
                    .filter(|d| d.utilization() > self.threshold)
                    .map(|d| d.id())
                    .collect()
            })
            .unwrap_or_default();

        for dir_id in overfull {
            // Largest replicas first for better impact
            let mut replicas: Vec<_> = movable_replicas(cluster, broker_id, options)
                .into_iter()
                .filter(|r| r.log_dir == dir_id.name)
                .collect();
            replicas.sort_by(|a, b| {
                b.size_bytes
                    .cmp(&a.size_bytes)
                    .then_with(|| a.topic_partition.cmp(&b.topic_partition))
            });

            for replica in replicas {
                let still_overfull = cluster
                    .log_dir(&dir_id)
                    .map(|d| d.utilization() > self.threshold)
                    .unwrap_or(false);
                if !still_overfull {
                    break;
                }

                let mut candidates: Vec<LogDirId> = log_dirs_outside(cluster, &self.scope, broker_id)
                    .into_iter()
                    .filter(|d| {
                        cluster
                            .log_dir(d)
                            .map(|x| x.utilization() <= self.threshold)
                            .unwrap_or(false)
                    })
                    .collect();
                candidates.sort_by(|a, b| {
                    let util = |d: &LogDirId| cluster.log_dir(d).map(|x| x.utilization()).unwrap_or(0.0);
                    util(a).total_cmp(&util(b)).then(a.cmp(b))
                });

                maybe_apply_balancing_action(
                    &*self,
                    cluster,
                    &replica,
                    &candidates,
                    ActionType::ReplicaMovement,
                    optimized_goals,
                    options,
                )?;
            }
        }
        Ok(())
    }

    fn self_satisfied(&self, cluster: &ClusterModel, action: &BalancingAction) -> bool {
        match action.action_type() {
            ActionType::ReplicaMovement => self.destination_fits(cluster, action),
            ActionType::LeadershipMovement => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TopicPartition;
    use crate::snapshot::ClusterSnapshot;

    fn snapshot() -> ClusterSnapshot {
        ClusterSnapshot::new()
            .with_broker(1, None, &[("/d1", 1000)])
            .with_broker(2, None, &[("/d1", 1000)])
            .with_broker(3, None, &[("/d1", 1000)])
            .with_partition("T", 0, &[(1, "/d1", 500)], 1)
            .with_partition("T", 1, &[(1, "/d1", 400)], 1)
            .with_partition("T", 2, &[(2, "/d1", 700)], 2)
    }

    #[test]
    fn test_check_flags_overfull_dirs() {
        let model = ClusterModel::from_snapshot(&snapshot()).unwrap();
        let violations = DiskCapacityGoal::new(0.8).check(&model);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].affected_brokers, vec![1]);
        assert_eq!(violations[0].severity, ViolationSeverity::High);
    }

    #[test]
    fn test_optimize_moves_largest_replica_to_emptiest_dir() {
        let mut model = ClusterModel::from_snapshot(&snapshot()).unwrap();
        let mut goal = DiskCapacityGoal::new(0.8);

        goal.optimize(&mut model, &OptimizedGoals::empty(), &OptimizationOptions::default())
            .unwrap();

        assert!(goal.is_satisfied(&model));
        assert_eq!(model.committed_actions().len(), 1);
        let action = &model.committed_actions()[0].action;
        assert_eq!(action.topic_partition(), &TopicPartition::new("T", 0));
        assert_eq!(action.destination_broker(), 3);
    }

    #[test]
    fn test_acceptance_rejects_filling_a_dir() {
        let model = ClusterModel::from_snapshot(&snapshot()).unwrap();
        let goal = DiskCapacityGoal::new(0.8);

        let onto_two = BalancingAction::new(TopicPartition::new("T", 1), 1, "/d1", 2, "/d1", ActionType::ReplicaMovement);
        assert_eq!(goal.action_acceptance(&onto_two, &model), ActionAcceptance::Reject);

        let onto_three = BalancingAction::new(TopicPartition::new("T", 1), 1, "/d1", 3, "/d1", ActionType::ReplicaMovement);
        assert_eq!(goal.action_acceptance(&onto_three, &model), ActionAcceptance::Accept);
    }
}
