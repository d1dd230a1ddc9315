use std::collections::BTreeSet;
use crate::acceptance::ActionAcceptance;
use crate::actions::{ActionType, BalancingAction};
use crate::models::{BrokerId, ClusterModel, LogDirId};
use crate::options::OptimizationOptions;
use crate::RebalancerError;
use super::log_dir_goal::{maybe_apply_balancing_action, optimize_log_dir_goal, LogDirGoal};
use super::{all_brokers, brokers_in_scope, log_dirs_outside, movable_replicas};
use super::{CountBand, Goal, GoalPriority, GoalViolation, OptimizedGoals, ViolationSeverity};

/// Attempts to distribute replicas evenly across brokers
#[derive(Debug)]
pub struct ReplicaDistributionGoal {
    pub allowed_variance: f64, // e.g., 0.1 for 10% variance from average
    state: Option<DistributionState>,
}

#[derive(Debug)]
struct DistributionState {
    band: CountBand,
    brokers: BTreeSet<BrokerId>,
}

fn replica_count(cluster: &ClusterModel, broker_id: BrokerId) -> usize {
    cluster.broker(broker_id).map(|b| b.replica_count()).unwrap_or(0)
}

fn band_for(cluster: &ClusterModel, brokers: &BTreeSet<BrokerId>, allowed_variance: f64) -> CountBand {
    let total: usize = brokers.iter().map(|id| replica_count(cluster, *id)).sum();
    CountBand::around_average(total, brokers.len(), allowed_variance)
}

impl ReplicaDistributionGoal {
    pub fn new(allowed_variance: f64) -> Self {
        Self {
            allowed_variance,
            state: None,
        }
    }

    /// Counts after the move must stay inside the band on both ends
    fn keeps_band(&self, cluster: &ClusterModel, action: &BalancingAction) -> bool {
        let Some(state) = &self.state else {
            return true;
        };
        let source = action.source_broker();
        let destination = action.destination_broker();

        let destination_ok = !state.brokers.contains(&destination)
            || replica_count(cluster, destination) + 1 <= state.band.upper;
        let source_ok = !state.brokers.contains(&source)
            || replica_count(cluster, source).saturating_sub(1) >= state.band.lower;
        destination_ok && source_ok
    }

    /// Same test against the band `check` judges, over every broker
    fn keeps_cluster_band(&self, cluster: &ClusterModel, action: &BalancingAction) -> bool {
        let band = band_for(cluster, &all_brokers(cluster), self.allowed_variance);
        band.admits_move(
            replica_count(cluster, action.source_broker()),
            replica_count(cluster, action.destination_broker()),
        )
    }

    fn push_replicas(
        &self,
        broker_id: BrokerId,
        band: CountBand,
        brokers: &BTreeSet<BrokerId>,
        cluster: &mut ClusterModel,
        optimized_goals: &OptimizedGoals<'_>,
        options: &OptimizationOptions,
    ) -> Result<(), RebalancerError> {
        for replica in movable_replicas(cluster, broker_id, options) {
            if replica_count(cluster, broker_id) <= band.upper {
                break;
            }

            let mut candidates: Vec<LogDirId> = log_dirs_outside(cluster, brokers, broker_id)
                .into_iter()
                .filter(|d| replica_count(cluster, d.broker_id) < band.upper)
                .collect();
            candidates.sort_by(|a, b| {
                let util = |d: &LogDirId| cluster.log_dir(d).map(|x| x.utilization()).unwrap_or(0.0);
                replica_count(cluster, a.broker_id)
                    .cmp(&replica_count(cluster, b.broker_id))
                    .then(util(a).total_cmp(&util(b)))
                    .then(a.cmp(b))
            });

            maybe_apply_balancing_action(
                self,
                cluster,
                &replica,
                &candidates,
                ActionType::ReplicaMovement,
                optimized_goals,
                options,
            )?;
        }
        Ok(())
    }

    fn pull_replicas(
        &self,
        broker_id: BrokerId,
        band: CountBand,
        brokers: &BTreeSet<BrokerId>,
        cluster: &mut ClusterModel,
        optimized_goals: &OptimizedGoals<'_>,
        options: &OptimizationOptions,
    ) -> Result<(), RebalancerError> {
        // Fullest donors first
        let mut donors: Vec<BrokerId> = brokers
            .iter()
            .copied()
            .filter(|id| *id != broker_id && replica_count(cluster, *id) > band.lower)
            .collect();
        donors.sort_by(|a, b| {
            replica_count(cluster, *b)
                .cmp(&replica_count(cluster, *a))
                .then(a.cmp(b))
        });

        let mut own_dirs: Vec<LogDirId> = cluster
            .broker(broker_id)
            .map(|b| b.log_dirs().map(|d| d.id()).collect())
            .unwrap_or_default();

        for donor in donors {
            for replica in movable_replicas(cluster, donor, options) {
                if replica_count(cluster, broker_id) >= band.lower {
                    return Ok(());
                }
                if cluster.replica(&replica.topic_partition, broker_id).is_some() {
                    continue;
                }

                own_dirs.sort_by(|a, b| {
                    let util = |d: &LogDirId| cluster.log_dir(d).map(|x| x.utilization()).unwrap_or(0.0);
                    util(a).total_cmp(&util(b)).then(a.cmp(b))
                });
                maybe_apply_balancing_action(
                    self,
                    cluster,
                    &replica,
                    &own_dirs,
                    ActionType::ReplicaMovement,
                    optimized_goals,
                    options,
                )?;
            }
        }
        Ok(())
    }
}

impl Default for ReplicaDistributionGoal {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl Goal for ReplicaDistributionGoal {
    fn name(&self) -> &str {
        "ReplicaDistributionGoal"
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
        match action.action_type() {
            ActionType::ReplicaMovement
                if !self.keeps_band(cluster, action) || !self.keeps_cluster_band(cluster, action) =>
            {
                ActionAcceptance::Reject
            }
            _ => ActionAcceptance::Accept,
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
            let count = replica_count(cluster, broker_id);
            if !band.contains(count) {
                violations.push(GoalViolation {
                    goal_name: self.name().to_string(),
                    severity: ViolationSeverity::Medium,
                    description: format!(
                        "Broker {} has {} replicas (allowed range: {}-{})",
                        broker_id, count, band.lower, band.upper
                    ),
                    affected_brokers: vec![broker_id],
                });
            }
        }

        violations
    }
}

impl LogDirGoal for ReplicaDistributionGoal {
    fn init_goal_state(&mut self, cluster: &ClusterModel, options: &OptimizationOptions) {
        let brokers = brokers_in_scope(cluster, options);
        let band = band_for(cluster, &brokers, self.allowed_variance);
        tracing::debug!(goal = self.name(), lower = band.lower, upper = band.upper, "replica count band");
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

        let count = replica_count(cluster, broker_id);
        if count > band.upper {
            self.push_replicas(broker_id, band, &brokers, cluster, optimized_goals, options)?;
        } else if count < band.lower {
            self.pull_replicas(broker_id, band, &brokers, cluster, optimized_goals, options)?;
        }
        Ok(())
    }

    fn self_satisfied(&self, cluster: &ClusterModel, action: &BalancingAction) -> bool {
        match action.action_type() {
            ActionType::ReplicaMovement => self.keeps_band(cluster, action),
            ActionType::LeadershipMovement => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TopicPartition;
    use crate::snapshot::ClusterSnapshot;

    /// Broker 1 holds six replicas, 2 holds none, 3 holds two
    fn skewed() -> ClusterSnapshot {
        let mut snapshot = ClusterSnapshot::new()
            .with_broker(1, None, &[("/d1", 10_000)])
            .with_broker(2, None, &[("/d1", 10_000), ("/d2", 10_000)])
            .with_broker(3, None, &[("/d1", 10_000)]);
        for p in 0..6 {
            snapshot = snapshot.with_partition("T", p, &[(1, "/d1", 10)], 1);
        }
        snapshot
            .with_partition("U", 0, &[(3, "/d1", 10)], 3)
            .with_partition("U", 1, &[(3, "/d1", 10)], 3)
    }

    #[test]
    fn test_check_reports_out_of_band_brokers() {
        let model = ClusterModel::from_snapshot(&skewed()).unwrap();
        let violations = ReplicaDistributionGoal::new(0.1).check(&model);

        let brokers: Vec<BrokerId> = violations.iter().flat_map(|v| v.affected_brokers.clone()).collect();
        assert_eq!(brokers, vec![1, 2]);
    }

    #[test]
    fn test_optimize_evens_out_counts() {
        let mut model = ClusterModel::from_snapshot(&skewed()).unwrap();
        let mut goal = ReplicaDistributionGoal::new(0.1);

        goal.optimize(&mut model, &OptimizedGoals::empty(), &OptimizationOptions::default())
            .unwrap();

        assert!(goal.is_satisfied(&model), "{:?}", goal.check(&model));
        assert_eq!(model.replica_count(), 8);
    }

    #[test]
    fn test_acceptance_uses_band_from_pass() {
        let mut model = ClusterModel::from_snapshot(&skewed()).unwrap();
        let mut goal = ReplicaDistributionGoal::new(0.0);
        goal.optimize(&mut model, &OptimizedGoals::empty(), &OptimizationOptions::default())
            .unwrap();

        // avg 8/3 with no variance: band 2..=3
        let donor = model
            .brokers()
            .find(|b| b.replica_count() == 3)
            .map(|b| b.id)
            .unwrap();
        let receiver = model
            .brokers()
            .find(|b| b.replica_count() == 3 && b.id != donor)
            .map(|b| b.id)
            .unwrap();
        let tp = model.broker(donor).unwrap().replicas().next().unwrap().topic_partition.clone();
        let dir = model.broker(receiver).unwrap().log_dirs().next().unwrap().name.clone();
        let source_dir = model.replica(&tp, donor).unwrap().log_dir.clone();

        let action = BalancingAction::new(tp, donor, source_dir, receiver, dir, ActionType::ReplicaMovement);
        assert_eq!(goal.action_acceptance(&action, &model), ActionAcceptance::Reject);
    }

    #[test]
    fn test_acceptance_guards_brokers_outside_the_scope() {
        // Brokers 1, 2 and 3 hold 3, 5 and 4 replicas: band 3..=5 everywhere
        let mut snapshot = ClusterSnapshot::new()
            .with_broker(1, None, &[("/d1", 10_000)])
            .with_broker(2, None, &[("/d1", 10_000)])
            .with_broker(3, None, &[("/d1", 10_000)]);
        for p in 0..12u32 {
            let broker = match p {
                0..=2 => 1,
                3..=7 => 2,
                _ => 3,
            };
            snapshot = snapshot.with_partition("T", p, &[(broker, "/d1", 10)], broker);
        }
        let mut model = ClusterModel::from_snapshot(&snapshot).unwrap();
        let mut goal = ReplicaDistributionGoal::new(0.1);
        goal.optimize(&mut model, &OptimizedGoals::empty(), &OptimizationOptions::for_brokers([3]))
            .unwrap();
        assert!(model.committed_actions().is_empty());
        assert!(goal.is_satisfied(&model));

        // Broker 2 is outside the pass but already at the top of the band
        let onto_full = BalancingAction::new(TopicPartition::new("T", 8), 3, "/d1", 2, "/d1", ActionType::ReplicaMovement);
        assert_eq!(goal.action_acceptance(&onto_full, &model), ActionAcceptance::Reject);

        let between_outsiders =
            BalancingAction::new(TopicPartition::new("T", 3), 2, "/d1", 1, "/d1", ActionType::ReplicaMovement);
        assert_eq!(goal.action_acceptance(&between_outsiders, &model), ActionAcceptance::Accept);
    }
}
