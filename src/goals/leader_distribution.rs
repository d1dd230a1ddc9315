use std::collections::BTreeSet;
use crate::acceptance::ActionAcceptance;
use crate::actions::{ActionType, BalancingAction};
use crate::models::{BrokerId, ClusterModel, LogDirId, Replica};
use crate::options::OptimizationOptions;
use crate::RebalancerError;
use super::log_dir_goal::{maybe_apply_balancing_action, optimize_log_dir_goal, LogDirGoal};
use super::{all_brokers, brokers_in_scope};
use super::{CountBand, Goal, GoalPriority, GoalViolation, OptimizedGoals, ViolationSeverity};

/// Attempts to distribute leader replicas evenly
#[derive(Debug)]
pub struct LeaderDistributionGoal {
    pub allowed_variance: f64,
    state: Option<DistributionState>,
}

#[derive(Debug)]
struct DistributionState {
    band: CountBand,
    brokers: BTreeSet<BrokerId>,
}

fn leader_count(cluster: &ClusterModel, broker_id: BrokerId) -> usize {
    cluster.broker(broker_id).map(|b| b.leader_count()).unwrap_or(0)
}

fn band_for(cluster: &ClusterModel, brokers: &BTreeSet<BrokerId>, allowed_variance: f64) -> CountBand {
    let total: usize = brokers.iter().map(|id| leader_count(cluster, *id)).sum();
    CountBand::around_average(total, brokers.len(), allowed_variance)
}

/// Whether the action takes leadership away from its source broker
fn moves_leadership(cluster: &ClusterModel, action: &BalancingAction) -> bool {
    match action.action_type() {
        ActionType::LeadershipMovement => true,
        ActionType::ReplicaMovement => cluster
            .replica(action.topic_partition(), action.source_broker())
            .map(|r| r.is_leader)
            .unwrap_or(false),
    }
}

impl LeaderDistributionGoal {
    pub fn new(allowed_variance: f64) -> Self {
        Self {
            allowed_variance,
            state: None,
        }
    }

    fn keeps_band(&self, cluster: &ClusterModel, action: &BalancingAction) -> bool {
        let Some(state) = &self.state else {
            return true;
        };
        if !moves_leadership(cluster, action) {
            return true;
        }
        let source = action.source_broker();
        let destination = action.destination_broker();

        let destination_ok = !state.brokers.contains(&destination)
            || leader_count(cluster, destination) + 1 <= state.band.upper;
        let source_ok = !state.brokers.contains(&source)
            || leader_count(cluster, source).saturating_sub(1) >= state.band.lower;
        destination_ok && source_ok
    }

    /// Same test against the band `check` judges, over every broker
    fn keeps_cluster_band(&self, cluster: &ClusterModel, action: &BalancingAction) -> bool {
        if !moves_leadership(cluster, action) {
            return true;
        }
        let band = band_for(cluster, &all_brokers(cluster), self.allowed_variance);
        band.admits_move(
            leader_count(cluster, action.source_broker()),
            leader_count(cluster, action.destination_broker()),
        )
    }

    /// Hand leadership of this broker's partitions to followers elsewhere
    fn shed_leadership(
        &self,
        broker_id: BrokerId,
        band: CountBand,
        brokers: &BTreeSet<BrokerId>,
        cluster: &mut ClusterModel,
        optimized_goals: &OptimizedGoals<'_>,
        options: &OptimizationOptions,
    ) -> Result<(), RebalancerError> {
        let leaders: Vec<Replica> = cluster
            .broker(broker_id)
            .map(|b| {
                b.leader_replicas()
                    .filter(|r| options.can_rebalance_topic(&r.topic_partition.topic))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        for leader in leaders {
            if leader_count(cluster, broker_id) <= band.upper {
                break;
            }

            let mut candidates: Vec<LogDirId> = cluster
                .replicas_of(&leader.topic_partition)
                .into_iter()
                .filter(|r| !r.is_leader && brokers.contains(&r.broker_id))
                .filter(|r| leader_count(cluster, r.broker_id) < band.upper)
                .map(|r| r.log_dir_id())
                .collect();
            candidates.sort_by(|a, b| {
                leader_count(cluster, a.broker_id)
                    .cmp(&leader_count(cluster, b.broker_id))
                    .then(a.cmp(b))
            });

            maybe_apply_balancing_action(
                self,
                cluster,
                &leader,
                &candidates,
                ActionType::LeadershipMovement,
                optimized_goals,
                options,
            )?;
        }
        Ok(())
    }

    /// Take leadership of partitions this broker follows from busier leaders
    fn gain_leadership(
        &self,
        broker_id: BrokerId,
        band: CountBand,
        brokers: &BTreeSet<BrokerId>,
        cluster: &mut ClusterModel,
        optimized_goals: &OptimizedGoals<'_>,
        options: &OptimizationOptions,
    ) -> Result<(), RebalancerError> {
        let followers: Vec<Replica> = cluster
            .broker(broker_id)
            .map(|b| {
                b.replicas()
                    .filter(|r| !r.is_leader && options.can_rebalance_topic(&r.topic_partition.topic))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        for follower in followers {
            if leader_count(cluster, broker_id) >= band.lower {
                break;
            }
            let Some(leader) = cluster.leader_of(&follower.topic_partition).cloned() else {
                continue;
            };
            if !brokers.contains(&leader.broker_id) || leader_count(cluster, leader.broker_id) <= band.lower {
                continue;
            }

            maybe_apply_balancing_action(
                self,
                cluster,
                &leader,
                &[follower.log_dir_id()],
                ActionType::LeadershipMovement,
                optimized_goals,
                options,
            )?;
        }
        Ok(())
    }
}

impl Default for LeaderDistributionGoal {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl Goal for LeaderDistributionGoal {
    fn name(&self) -> &str {
        "LeaderDistributionGoal"
    }

    fn priority(&self) -> GoalPriority {
        GoalPriority::Medium
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
        if self.keeps_band(cluster, action) && self.keeps_cluster_band(cluster, action) {
            ActionAcceptance::Accept
        } else {
            ActionAcceptance::Reject
        }
    }

    fn check(&self, cluster: &ClusterModel) -> Vec<GoalViolation> {
        let mut violations = Vec::new();

        let brokers = all_brokers(cluster);
        if brokers.is_empty() {
            return violations;
        }
        let band = band_for(cluster, &brokers, self.allowed_variance);

        for broker_id in brokers {
            let count = leader_count(cluster, broker_id);
            if !band.contains(count) {
                violations.push(GoalViolation {
                    goal_name: self.name().to_string(),
                    severity: ViolationSeverity::Medium,
                    description: format!(
                        "Broker {} leads {} partitions (allowed range: {}-{})",
                        broker_id, count, band.lower, band.upper
                    ),
                    affected_brokers: vec![broker_id],
                });
            }
        }

        violations
    }
}

impl LogDirGoal for LeaderDistributionGoal {
    fn init_goal_state(&mut self, cluster: &ClusterModel, options: &OptimizationOptions) {
        let brokers = brokers_in_scope(cluster, options);
        let band = band_for(cluster, &brokers, self.allowed_variance);
        tracing::debug!(goal = self.name(), lower = band.lower, upper = band.upper, "leader count band");
        self.state = Some(DistributionState { band, brokers });
    }

    fn rebalance_for_broker(
        &mut self,
        broker_id: BrokerId,
        cluster: &mut ClusterModel,
        optimized_goals: &OptimizedGoals<'_>,
        options: &OptimizationOptions,
    ) -> Result<(), RebalancerError> {
        let Some(state) = &self.state else {
            return Ok(());
        };
        let band = state.band;
        let brokers = state.brokers.clone();

        let count = leader_count(cluster, broker_id);
        if count > band.upper {
            self.shed_leadership(broker_id, band, &brokers, cluster, optimized_goals, options)?;
        } else if count < band.lower {
            self.gain_leadership(broker_id, band, &brokers, cluster, optimized_goals, options)?;
        }
        Ok(())
    }

    fn self_satisfied(&self, cluster: &ClusterModel, action: &BalancingAction) -> bool {
        self.keeps_band(cluster, action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TopicPartition;
    use crate::snapshot::ClusterSnapshot;

    /// Broker 1 leads everything; even partitions follow on 2, odd on 3
    fn snapshot() -> ClusterSnapshot {
        let mut snapshot = ClusterSnapshot::new()
            .with_broker(1, None, &[("/d1", 10_000)])
            .with_broker(2, None, &[("/d1", 10_000)])
            .with_broker(3, None, &[("/d1", 10_000)]);
        for p in 0..6 {
            let follower = if p % 2 == 0 { 2 } else { 3 };
            snapshot = snapshot.with_partition("T", p, &[(1, "/d1", 10), (follower, "/d1", 10)], 1);
        }
        snapshot
    }

    #[test]
    fn test_check_counts_leaders() {
        let model = ClusterModel::from_snapshot(&snapshot()).unwrap();
        let violations = LeaderDistributionGoal::new(0.1).check(&model);

        // avg 2, band 1..=3
        let brokers: Vec<BrokerId> = violations.iter().flat_map(|v| v.affected_brokers.clone()).collect();
        assert_eq!(brokers, vec![1, 2, 3]);
    }

    #[test]
    fn test_optimize_moves_only_leadership() {
        let mut model = ClusterModel::from_snapshot(&snapshot()).unwrap();
        let mut goal = LeaderDistributionGoal::new(0.1);

        goal.optimize(&mut model, &OptimizedGoals::empty(), &OptimizationOptions::default())
            .unwrap();

        assert!(goal.is_satisfied(&model), "{:?}", goal.check(&model));
        assert!(model
            .committed_actions()
            .iter()
            .all(|c| c.action.action_type() == ActionType::LeadershipMovement));
        assert!(model.balance_action_history().is_empty());
        assert_eq!(model.leader_of(&TopicPartition::new("T", 0)).unwrap().broker_id, 2);
        assert_eq!(model.leader_of(&TopicPartition::new("T", 1)).unwrap().broker_id, 3);
    }

    #[test]
    fn test_acceptance_tracks_leader_replica_moves() {
        let mut model = ClusterModel::from_snapshot(&snapshot()).unwrap();
        let mut goal = LeaderDistributionGoal::new(0.0);
        goal.optimize(&mut model, &OptimizedGoals::empty(), &OptimizationOptions::default())
            .unwrap();
        assert!(goal.is_satisfied(&model), "{:?}", goal.check(&model));

        // Every broker now leads two partitions and the band is 2..=2
        let leader = model.leader_of(&TopicPartition::new("T", 0)).unwrap().clone();
        let moving_leader = BalancingAction::new(
            leader.topic_partition.clone(),
            leader.broker_id,
            leader.log_dir.clone(),
            3,
            "/d1",
            ActionType::ReplicaMovement,
        );
        assert_eq!(goal.action_acceptance(&moving_leader, &model), ActionAcceptance::Reject);

        let follower = model
            .replicas_of(&TopicPartition::new("T", 0))
            .into_iter()
            .find(|r| !r.is_leader)
            .unwrap()
            .clone();
        let moving_follower = BalancingAction::new(
            follower.topic_partition.clone(),
            follower.broker_id,
            follower.log_dir.clone(),
            3,
            "/d1",
            ActionType::ReplicaMovement,
        );
        assert_eq!(goal.action_acceptance(&moving_follower, &model), ActionAcceptance::Accept);
    }

    #[test]
    fn test_acceptance_guards_brokers_outside_the_scope() {
        // Brokers 1, 2 and 3 lead 3, 5 and 4 partitions: band 3..=5 everywhere
        let mut snapshot = ClusterSnapshot::new()
            .with_broker(1, None, &[("/d1", 10_000)])
            .with_broker(2, None, &[("/d1", 10_000)])
            .with_broker(3, None, &[("/d1", 10_000)]);
        for p in 0..12u32 {
            let (leader, follower) = match p {
                0..=2 => (1, 3),
                3..=7 => (2, 1),
                _ => (3, 2),
            };
            snapshot = snapshot.with_partition("T", p, &[(leader, "/d1", 10), (follower, "/d1", 10)], leader);
        }
        let mut model = ClusterModel::from_snapshot(&snapshot).unwrap();
        let mut goal = LeaderDistributionGoal::new(0.1);
        goal.optimize(&mut model, &OptimizedGoals::empty(), &OptimizationOptions::for_brokers([3]))
            .unwrap();
        assert!(model.committed_actions().is_empty());
        assert!(goal.is_satisfied(&model));

        // Broker 2 is outside the pass but already leads the most it may
        let onto_busy =
            BalancingAction::new(TopicPartition::new("T", 8), 3, "/d1", 2, "/d1", ActionType::LeadershipMovement);
        assert_eq!(goal.action_acceptance(&onto_busy, &model), ActionAcceptance::Reject);

        let between_outsiders =
            BalancingAction::new(TopicPartition::new("T", 3), 2, "/d1", 1, "/d1", ActionType::LeadershipMovement);
        assert_eq!(goal.action_acceptance(&between_outsiders, &model), ActionAcceptance::Accept);
    }
}
