use crate::acceptance::ActionAcceptance;
use crate::actions::{ActionType, BalancingAction};
use crate::models::{BrokerId, ClusterModel, Replica};
use crate::options::OptimizationOptions;
use crate::RebalancerError;
use super::log_dir_goal::{maybe_apply_balancing_action, optimize_log_dir_goal, LogDirGoal};
use super::{Goal, GoalPriority, GoalViolation, OptimizedGoals, ViolationSeverity};

/// Preferred leader election - move leaders to first replica
#[derive(Debug, Default)]
pub struct PreferredLeaderElectionGoal;

impl PreferredLeaderElectionGoal {
    pub fn new() -> Self {
        Self
    }
}

fn leads_from_preferred(cluster: &ClusterModel, action: &BalancingAction) -> bool {
    cluster.preferred_leader(action.topic_partition()) == Some(action.source_broker())
}

impl Goal for PreferredLeaderElectionGoal {
    fn name(&self) -> &str {
        "PreferredLeaderElectionGoal"
    }

    fn priority(&self) -> GoalPriority {
        GoalPriority::Low
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
            ActionType::LeadershipMovement if leads_from_preferred(cluster, action) => ActionAcceptance::Reject,
            _ => ActionAcceptance::Accept,
        }
    }

    fn check(&self, cluster: &ClusterModel) -> Vec<GoalViolation> {
        let mut violations = Vec::new();

        for tp in cluster.partitions() {
            let (Some(preferred), Some(leader)) = (cluster.preferred_leader(tp), cluster.leader_of(tp)) else {
                continue;
            };
            if leader.broker_id != preferred {
                violations.push(GoalViolation {
                    goal_name: self.name().to_string(),
                    severity: ViolationSeverity::Low,
                    description: format!(
                        "Partition {} leader is on broker {} instead of preferred broker {}",
                        tp, leader.broker_id, preferred
                    ),
                    affected_brokers: vec![leader.broker_id, preferred],
                });
            }
        }

        violations
    }
}

impl LogDirGoal for PreferredLeaderElectionGoal {
    fn init_goal_state(&mut self, _cluster: &ClusterModel, _options: &OptimizationOptions) {}

    fn rebalance_for_broker(
        &mut self,
        broker_id: BrokerId,
        cluster: &mut ClusterModel,
        optimized_goals: &OptimizedGoals<'_>,
        options: &OptimizationOptions,
    ) -> Result<(), RebalancerError> {
        let misplaced: Vec<Replica> = cluster
            .broker(broker_id)
            .map(|b| {
                b.leader_replicas()
                    .filter(|r| options.can_rebalance_topic(&r.topic_partition.topic))
                    .filter(|r| cluster.preferred_leader(&r.topic_partition) != Some(broker_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        for leader in misplaced {
            let Some(preferred) = cluster
                .preferred_leader(&leader.topic_partition)
                .and_then(|id| cluster.replica(&leader.topic_partition, id))
                .map(|r| r.log_dir_id())
            else {
                continue;
            };

            if maybe_apply_balancing_action(
                &*self,
                cluster,
                &leader,
                &[preferred],
                ActionType::LeadershipMovement,
                optimized_goals,
                options,
            )?
            .is_none()
            {
                tracing::debug!(partition = %leader.topic_partition, "preferred leader not elected");
            }
        }
        Ok(())
    }

    fn self_satisfied(&self, cluster: &ClusterModel, action: &BalancingAction) -> bool {
        match action.action_type() {
            ActionType::LeadershipMovement => {
                cluster.preferred_leader(action.topic_partition()) == Some(action.destination_broker())
            }
            ActionType::ReplicaMovement => true,
        }
    }
}
