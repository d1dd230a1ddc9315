use std::collections::BTreeSet;
use crate::acceptance::ActionAcceptance;
use crate::actions::{ActionType, BalancingAction};
use crate::models::{BrokerId, ClusterModel, LogDirId};
use crate::options::OptimizationOptions;
use crate::RebalancerError;
use super::log_dir_goal::{maybe_apply_balancing_action, optimize_log_dir_goal, LogDirGoal};
use super::{all_brokers, brokers_in_scope, log_dirs_outside, movable_replicas, moved_size};
use super::{Goal, GoalPriority, GoalViolation, OptimizedGoals, UtilizationBand, ViolationSeverity};

/// Keeps every log directory's utilization close to the cluster average
#[derive(Debug)]
pub struct DiskDistributionGoal {
    pub balance_percentage: f64, // e.g., 0.1 for +/-10% around the average
    state: Option<DistributionState>,
}

#[derive(Debug)]
struct DistributionState {
    band: UtilizationBand,
    brokers: BTreeSet<BrokerId>,
    dirs: BTreeSet<LogDirId>,
}

/// Directories on `brokers` that can hold data at all
fn sized_dirs(cluster: &ClusterModel, brokers: &BTreeSet<BrokerId>) -> BTreeSet<LogDirId> {
    cluster
        .log_dirs()
        .filter(|d| d.capacity_bytes > 0 && brokers.contains(&d.broker_id))
        .map(|d| d.id())
        .collect()
}

fn band_for(cluster: &ClusterModel, dirs: &BTreeSet<LogDirId>, balance_percentage: f64) -> UtilizationBand {
    let (used, capacity) = dirs
        .iter()
        .filter_map(|id| cluster.log_dir(id))
        .fold((0u64, 0u64), |(used, capacity), d| {
            (used.saturating_add(d.used_bytes()), capacity.saturating_add(d.capacity_bytes))
        });
    UtilizationBand::around_average(used, capacity, balance_percentage)
}

fn utilization(cluster: &ClusterModel, id: &LogDirId) -> f64 {
    cluster.log_dir(id).map(|d| d.utilization()).unwrap_or(0.0)
}

impl DiskDistributionGoal {
    pub fn new(balance_percentage: f64) -> Self {
        Self {
            balance_percentage,
            state: None,
        }
    }

    /// The destination must not rise above the band and the source must not
    /// fall below it
    fn keeps_band(&self, cluster: &ClusterModel, action: &BalancingAction) -> bool {
        let Some(state) = &self.state else {
            return true;
        };
        let size = moved_size(cluster, action);
        let source = action.source();
        let destination = action.destination();

        let destination_ok = !state.dirs.contains(&destination)
            || cluster
                .log_dir(&destination)
                .map(|d| d.utilization_after_adding(size) <= state.band.upper)
                .unwrap_or(false);
        let source_ok = !state.dirs.contains(&source)
            || cluster
                .log_dir(&source)
                .map(|d| d.utilization_after_removing(size) >= state.band.lower)
                .unwrap_or(false);
        destination_ok && source_ok
    }

    /// Same test against the band `check` judges, over every sized dir.
    /// Moving data between a sized and an unsized dir would shift that band,
    /// so those moves are refused outright.
    fn keeps_cluster_band(&self, cluster: &ClusterModel, action: &BalancingAction) -> bool {
        let size = moved_size(cluster, action);
        let dirs = sized_dirs(cluster, &all_brokers(cluster));
        let source = action.source();
        let destination = action.destination();

        match (dirs.contains(&source), dirs.contains(&destination)) {
            (false, false) => true,
            (true, true) => {
                let band = band_for(cluster, &dirs, self.balance_percentage);
                let destination_ok = cluster
                    .log_dir(&destination)
                    .map(|d| d.utilization_after_adding(size) <= band.upper)
                    .unwrap_or(false);
                let source_ok = cluster
                    .log_dir(&source)
                    .map(|d| d.utilization_after_removing(size) >= band.lower)
                    .unwrap_or(false);
                destination_ok && source_ok
            }
            _ => size == 0,
        }
    }

    fn push_from(
        &self,
        dir_id: &LogDirId,
        state: &DistributionState,
        cluster: &mut ClusterModel,
        optimized_goals: &OptimizedGoals<'_>,
        options: &OptimizationOptions,
    ) -> Result<(), RebalancerError> {
        let mut replicas: Vec<_> = movable_replicas(cluster, dir_id.broker_id, options)
            .into_iter()
            .filter(|r| r.log_dir == dir_id.name)
            .collect();
        replicas.sort_by(|a, b| {
            b.size_bytes
                .cmp(&a.size_bytes)
                .then_with(|| a.topic_partition.cmp(&b.topic_partition))
        });

        for replica in replicas {
            if utilization(cluster, dir_id) <= state.band.upper {
                break;
            }

            let mut candidates: Vec<LogDirId> = log_dirs_outside(cluster, &state.brokers, dir_id.broker_id)
                .into_iter()
                .filter(|d| state.dirs.contains(d) && utilization(cluster, d) < state.band.upper)
                .collect();
            candidates.sort_by(|a, b| {
                utilization(cluster, a)
                    .total_cmp(&utilization(cluster, b))
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

    fn pull_into(
        &self,
        dir_id: &LogDirId,
        state: &DistributionState,
        cluster: &mut ClusterModel,
        optimized_goals: &OptimizedGoals<'_>,
        options: &OptimizationOptions,
    ) -> Result<(), RebalancerError> {
        // Fullest donors first
        let mut donors: Vec<LogDirId> = log_dirs_outside(cluster, &state.brokers, dir_id.broker_id)
            .into_iter()
            .filter(|d| state.dirs.contains(d) && utilization(cluster, d) > state.band.average)
            .collect();
        donors.sort_by(|a, b| {
            utilization(cluster, b)
                .total_cmp(&utilization(cluster, a))
                .then(a.cmp(b))
        });

        let target = [dir_id.clone()];
        for donor in donors {
            let mut replicas: Vec<_> = movable_replicas(cluster, donor.broker_id, options)
                .into_iter()
                .filter(|r| r.log_dir == donor.name)
                .collect();
            replicas.sort_by(|a, b| {
                b.size_bytes
                    .cmp(&a.size_bytes)
                    .then_with(|| a.topic_partition.cmp(&b.topic_partition))
            });

            for replica in replicas {
                if utilization(cluster, dir_id) >= state.band.lower {
                    return Ok(());
                }
                maybe_apply_balancing_action(
                    self,
                    cluster,
                    &replica,
                    &target,
                    ActionType::ReplicaMovement,
                    optimized_goals,
                    options,
                )?;
            }
        }
        Ok(())
    }
}

impl Default for DiskDistributionGoal {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl Goal for DiskDistributionGoal {
    fn name(&self) -> &str {
        "DiskDistributionGoal"
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

        let dirs = sized_dirs(cluster, &all_brokers(cluster));
        let band = band_for(cluster, &dirs, self.balance_percentage);

        for dir_id in dirs {
            let utilization = utilization(cluster, &dir_id);
            if !band.contains(utilization) {
                violations.push(GoalViolation {
                    goal_name: self.name().to_string(),
                    severity: ViolationSeverity::Medium,
                    description: format!(
                        "Log dir {} utilization {:.1}% outside {:.1}%-{:.1}% (average {:.1}%)",
                        dir_id,
                        utilization * 100.0,
                        band.lower * 100.0,
                        band.upper * 100.0,
                        band.average * 100.0
                    ),
                    affected_brokers: vec![dir_id.broker_id],
                });
            }
        }

        violations
    }
}

impl LogDirGoal for DiskDistributionGoal {
    fn init_goal_state(&mut self, cluster: &ClusterModel, options: &OptimizationOptions) {
        let brokers = brokers_in_scope(cluster, options);
        let dirs = sized_dirs(cluster, &brokers);
        let band = band_for(cluster, &dirs, self.balance_percentage);
        tracing::debug!(
            goal = self.name(),
            average = band.average,
            lower = band.lower,
            upper = band.upper,
            "disk utilization band"
        );
        self.state = Some(DistributionState { band, brokers, dirs });
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

        let own_dirs: Vec<LogDirId> = state
            .dirs
            .iter()
            .filter(|d| d.broker_id == broker_id)
            .cloned()
            .collect();

        for dir_id in own_dirs {
            let current = utilization(cluster, &dir_id);
            if current > state.band.upper {
                self.push_from(&dir_id, state, cluster, optimized_goals, options)?;
            } else if current < state.band.lower {
                self.pull_into(&dir_id, state, cluster, optimized_goals, options)?;
            }
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
