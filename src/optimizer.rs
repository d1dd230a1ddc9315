use crate::actions::RebalancePlan;
use crate::goals::{Goal, GoalPriority, GoalViolation, OptimizedGoals};
use crate::models::ClusterModel;
use crate::options::OptimizationOptions;
use crate::RebalancerError;
use tracing::{info, warn};

/// The optimizer coordinates multiple goals to generate a rebalance plan
pub struct Optimizer {
    goals: Vec<Box<dyn Goal>>,
    strict_hard_goals: bool,
}

impl Optimizer {
    pub fn new(goals: Vec<Box<dyn Goal>>) -> Self {
        let mut goals = goals;
        // Stable: goals of equal priority keep the order they were given in
        goals.sort_by_key(|g| g.priority());
        Self {
            goals,
            strict_hard_goals: false,
        }
    }

    /// Fail the run when a hard goal is still violated after its pass
    pub fn with_strict_hard_goals(mut self, strict: bool) -> Self {
        self.strict_hard_goals = strict;
        self
    }

    /// Goals in the order they are optimized
    pub fn goals(&self) -> impl Iterator<Item = &dyn Goal> {
        self.goals.iter().map(|g| g.as_ref())
    }

    /// Run every goal in priority order against `cluster`, mutating it.
    ///
    /// Each goal sees the goals before it as already optimized and may not
    /// commit an action they reject. Committed actions are never rolled
    /// back, so on error `cluster` holds whatever was committed so far.
    pub fn optimize(
        &mut self,
        cluster: &mut ClusterModel,
        options: &OptimizationOptions,
    ) -> Result<RebalancePlan, RebalancerError> {
        let start = cluster.committed_actions().len();
        info!(
            goals = self.goals.len(),
            brokers = cluster.broker_ids().len(),
            partitions = cluster.partition_count(),
            "starting optimization"
        );

        for i in 0..self.goals.len() {
            let (optimized, remaining) = self.goals.split_at_mut(i);
            let goal = &mut remaining[0];
            let optimized_goals = OptimizedGoals::new(optimized);
            let before = cluster.committed_actions().len();

            info!(goal = goal.name(), optimized_goals = optimized_goals.len(), "optimizing goal");
            goal.optimize(cluster, &optimized_goals, options)?;

            let committed = cluster.committed_actions().len() - before;
            let violations = goal.check(cluster);
            if violations.is_empty() {
                info!(goal = goal.name(), committed, "goal satisfied");
            } else if goal.is_hard_goal() && self.strict_hard_goals {
                return Err(RebalancerError::OptimizationFailed(format!(
                    "Hard goal '{}' cannot be satisfied: {} violations remain",
                    goal.name(),
                    violations.len()
                )));
            } else {
                warn!(
                    goal = goal.name(),
                    committed,
                    violations = violations.len(),
                    hard = goal.is_hard_goal(),
                    "goal not satisfied after optimization"
                );
            }
        }

        let mut plan = RebalancePlan::new(cluster.committed_actions()[start..].to_vec());
        plan.metadata.goals_used = self.goals.iter().map(|g| g.name().to_string()).collect();
        plan.metadata.cluster_stats = Some(cluster.stats());

        info!(summary = %plan.summary(), "optimization finished");
        Ok(plan)
    }

    /// Check for goal violations without generating a plan
    pub fn check_violations(&self, cluster: &ClusterModel) -> Vec<GoalViolation> {
        self.goals
            .iter()
            .flat_map(|goal| goal.check(cluster))
            .collect()
    }

    /// Get a report on how well each goal is satisfied
    pub fn goal_report(&self, cluster: &ClusterModel) -> Vec<GoalReport> {
        self.goals
            .iter()
            .map(|goal| GoalReport {
                name: goal.name().to_string(),
                priority: goal.priority(),
                hard: goal.is_hard_goal(),
                violations: goal.check(cluster),
            })
            .collect()
    }
}

/// Report on a single goal's state
#[derive(Debug, Clone)]
pub struct GoalReport {
    pub name: String,
    pub priority: GoalPriority,
    pub hard: bool,
    pub violations: Vec<GoalViolation>,
}

impl GoalReport {
    pub fn is_satisfied(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} (Priority: {:?}): {}, {} violations",
            self.name,
            self.priority,
            if self.is_satisfied() { "satisfied" } else { "violated" },
            self.violations.len()
        )
    }
}

/// Builder for creating an Optimizer with a fluent API
pub struct OptimizerBuilder {
    goals: Vec<Box<dyn Goal>>,
    strict_hard_goals: bool,
}

impl OptimizerBuilder {
    pub fn new() -> Self {
        Self {
            goals: Vec::new(),
            strict_hard_goals: false,
        }
    }

    pub fn add_goal(mut self, goal: Box<dyn Goal>) -> Self {
        self.goals.push(goal);
        self
    }

    pub fn add_goals(mut self, goals: impl IntoIterator<Item = Box<dyn Goal>>) -> Self {
        self.goals.extend(goals);
        self
    }

    pub fn with_strict_hard_goals(mut self, strict: bool) -> Self {
        self.strict_hard_goals = strict;
        self
    }

    pub fn build(self) -> Optimizer {
        Optimizer::new(self.goals).with_strict_hard_goals(self.strict_hard_goals)
    }
}

impl Default for OptimizerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goals::*;
    use crate::snapshot::ClusterSnapshot;

    fn optimizer() -> Optimizer {
        OptimizerBuilder::new()
            .add_goal(Box::new(PreferredLeaderElectionGoal::new()))
            .add_goal(Box::new(ReplicaDistributionGoal::new(0.1)))
            .add_goal(Box::new(LeaderDistributionGoal::new(0.1)))
            .add_goal(Box::new(RackAwareGoal::new()))
            .build()
    }

    #[test]
    fn test_goals_sorted_by_priority_keeping_given_order() {
        let optimizer = optimizer();
        let names: Vec<&str> = optimizer.goals().map(|g| g.name()).collect();
        assert_eq!(
            names,
            vec![
                "RackAwareGoal",
                "ReplicaDistributionGoal",
                "LeaderDistributionGoal",
                "PreferredLeaderElectionGoal"
            ]
        );
    }

    #[test]
    fn test_empty_cluster_optimization() {
        let mut cluster = ClusterModel::new();
        let mut optimizer = Optimizer::new(vec![]);

        let plan = optimizer.optimize(&mut cluster, &OptimizationOptions::default()).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.metadata.cluster_stats.unwrap().broker_count, 0);
    }

    #[test]
    fn test_plan_lists_committed_actions_in_order() {
        let snapshot = ClusterSnapshot::new()
            .with_broker(1, Some("a"), &[("/d1", 1000)])
            .with_broker(2, Some("a"), &[("/d1", 1000)])
            .with_broker(3, Some("b"), &[("/d1", 1000)])
            .with_partition("T", 0, &[(1, "/d1", 10), (2, "/d1", 10)], 2);
        let mut cluster = ClusterModel::from_snapshot(&snapshot).unwrap();
        let mut optimizer = optimizer();

        let plan = optimizer.optimize(&mut cluster, &OptimizationOptions::default()).unwrap();

        assert_eq!(plan.actions, cluster.committed_actions().to_vec());
        assert_eq!(plan.actions[0].goal, "RackAwareGoal");
        assert_eq!(plan.metadata.goals_used.len(), 4);
        assert!(optimizer.check_violations(&cluster).iter().all(|v| v.goal_name != "RackAwareGoal"));
    }

    #[test]
    fn test_strict_hard_goal_fails_the_run() {
        // Two brokers in one rack: nowhere to go
        let snapshot = ClusterSnapshot::new()
            .with_broker(1, Some("a"), &[("/d1", 1000)])
            .with_broker(2, Some("a"), &[("/d1", 1000)])
            .with_partition("T", 0, &[(1, "/d1", 10), (2, "/d1", 10)], 1);
        let mut cluster = ClusterModel::from_snapshot(&snapshot).unwrap();

        let mut lenient = OptimizerBuilder::new().add_goal(Box::new(RackAwareGoal::new())).build();
        assert!(lenient.optimize(&mut cluster, &OptimizationOptions::default()).is_ok());

        let mut strict = OptimizerBuilder::new()
            .add_goal(Box::new(RackAwareGoal::new()))
            .with_strict_hard_goals(true)
            .build();
        let result = strict.optimize(&mut cluster, &OptimizationOptions::default());
        assert!(matches!(result, Err(RebalancerError::OptimizationFailed(_))));
    }

    #[test]
    fn test_goal_report() {
        let snapshot = ClusterSnapshot::new()
            .with_broker(1, Some("a"), &[("/d1", 1000)])
            .with_broker(2, Some("a"), &[("/d1", 1000)])
            .with_partition("T", 0, &[(1, "/d1", 10), (2, "/d1", 10)], 1);
        let cluster = ClusterModel::from_snapshot(&snapshot).unwrap();

        let report = optimizer().goal_report(&cluster);

        assert_eq!(report.len(), 4);
        assert!(report[0].hard);
        assert!(!report[0].is_satisfied());
        assert!(report[0].summary().starts_with("RackAwareGoal"));
    }
}
