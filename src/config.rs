//! JSON-loadable rebalancer configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::goals::{
    DiskCapacityGoal, DiskDistributionGoal, Goal, LeaderDistributionGoal, PreferredLeaderElectionGoal,
    RackAwareGoal, ReplicaDistributionGoal,
};
use crate::optimizer::{Optimizer, OptimizerBuilder};
use crate::options::OptimizationOptions;
use crate::{Rebalancer, RebalancerError};

fn default_threshold() -> f64 {
    0.8
}

fn default_variance() -> f64 {
    0.1
}

/// One goal and its thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "goal", rename_all = "snake_case")]
pub enum GoalConfig {
    RackAware,
    DiskCapacity {
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
    ReplicaDistribution {
        #[serde(default = "default_variance")]
        allowed_variance: f64,
    },
    DiskDistribution {
        #[serde(default = "default_variance")]
        balance_percentage: f64,
    },
    LeaderDistribution {
        #[serde(default = "default_variance")]
        allowed_variance: f64,
    },
    PreferredLeaderElection,
}

impl GoalConfig {
    pub fn build(&self) -> Box<dyn Goal> {
        match self {
            GoalConfig::RackAware => Box::new(RackAwareGoal::new()),
            GoalConfig::DiskCapacity { threshold } => Box::new(DiskCapacityGoal::new(*threshold)),
            GoalConfig::ReplicaDistribution { allowed_variance } => {
                Box::new(ReplicaDistributionGoal::new(*allowed_variance))
            }
            GoalConfig::DiskDistribution { balance_percentage } => {
                Box::new(DiskDistributionGoal::new(*balance_percentage))
            }
            GoalConfig::LeaderDistribution { allowed_variance } => {
                Box::new(LeaderDistributionGoal::new(*allowed_variance))
            }
            GoalConfig::PreferredLeaderElection => Box::new(PreferredLeaderElectionGoal::new()),
        }
    }

    fn validate(&self) -> Result<(), RebalancerError> {
        let (name, value) = match self {
            GoalConfig::DiskCapacity { threshold } => ("threshold", *threshold),
            GoalConfig::ReplicaDistribution { allowed_variance }
            | GoalConfig::LeaderDistribution { allowed_variance } => ("allowed_variance", *allowed_variance),
            GoalConfig::DiskDistribution { balance_percentage } => ("balance_percentage", *balance_percentage),
            GoalConfig::RackAware | GoalConfig::PreferredLeaderElection => return Ok(()),
        };
        if !(0.0..=1.0).contains(&value) {
            return Err(RebalancerError::Config(format!(
                "{} must be within 0.0..=1.0, got {}",
                name, value
            )));
        }
        Ok(())
    }
}

/// Goals to run plus the options for every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebalanceConfig {
    pub goals: Vec<GoalConfig>,
    pub options: OptimizationOptions,
    /// Fail a run when a hard goal stays violated
    pub strict_hard_goals: bool,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            goals: vec![
                GoalConfig::RackAware,
                GoalConfig::DiskCapacity {
                    threshold: default_threshold(),
                },
                GoalConfig::ReplicaDistribution {
                    allowed_variance: default_variance(),
                },
                GoalConfig::DiskDistribution {
                    balance_percentage: default_variance(),
                },
                GoalConfig::LeaderDistribution {
                    allowed_variance: default_variance(),
                },
                GoalConfig::PreferredLeaderElection,
            ],
            options: OptimizationOptions::default(),
            strict_hard_goals: false,
        }
    }
}

impl RebalanceConfig {
    pub fn from_json_str(json: &str) -> Result<Self, RebalancerError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RebalancerError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), RebalancerError> {
        if self.goals.is_empty() {
            return Err(RebalancerError::Config("at least one goal is required".to_string()));
        }
        for goal in &self.goals {
            goal.validate()?;
        }
        if self.options.max_actions_per_plan == 0 {
            tracing::warn!("max_actions_per_plan is 0, plans will be empty");
        }
        Ok(())
    }

    pub fn build_goals(&self) -> Vec<Box<dyn Goal>> {
        self.goals.iter().map(GoalConfig::build).collect()
    }

    pub fn build_optimizer(&self) -> Optimizer {
        OptimizerBuilder::new()
            .add_goals(self.build_goals())
            .with_strict_hard_goals(self.strict_hard_goals)
            .build()
    }

    pub fn build_rebalancer(&self) -> Rebalancer {
        Rebalancer::from_optimizer(self.build_optimizer())
    }
}
