// Kafka Log-Dir Rebalancer Library
// Goal-based replica and leadership planning in the style of LinkedIn's Cruise Control

pub mod models;
pub mod actions;
pub mod options;
pub mod snapshot;
pub mod config;
pub mod acceptance;
pub mod goals;
pub mod optimizer;

pub use models::{Broker, BrokerId, ClusterModel, LogDir, LogDirId, ModelError, Replica, TopicPartition};
pub use goals::{Goal, GoalPriority, GoalViolation, OptimizedGoals};
pub use acceptance::ActionAcceptance;
pub use optimizer::{GoalReport, Optimizer, OptimizerBuilder};
pub use actions::{ActionType, BalancingAction, CommittedAction, RebalancePlan};
pub use options::OptimizationOptions;
pub use snapshot::{CachedSnapshotProvider, ClusterSnapshot, SnapshotProvider};
pub use config::{GoalConfig, RebalanceConfig};

/// Main entry point for generating rebalance proposals
pub struct Rebalancer {
    optimizer: Optimizer,
}

/// A plan together with the cluster state it leads to
#[derive(Debug, Clone)]
pub struct RebalanceOutcome {
    pub plan: RebalancePlan,
    pub cluster: ClusterModel,
}

impl Rebalancer {
    pub fn new(goals: Vec<Box<dyn Goal>>) -> Self {
        Self {
            optimizer: Optimizer::new(goals),
        }
    }

    pub fn from_optimizer(optimizer: Optimizer) -> Self {
        Self { optimizer }
    }

    /// Generate a rebalance plan for the given cluster state.
    ///
    /// The input model is left untouched; the outcome carries the model with
    /// every planned action applied.
    pub fn generate_plan(
        &mut self,
        cluster: &ClusterModel,
        options: &OptimizationOptions,
    ) -> Result<RebalanceOutcome, RebalancerError> {
        cluster
            .validate()
            .map_err(|e| RebalancerError::InvalidClusterState(e.to_string()))?;

        let mut working = cluster.clone();
        let plan = self.optimizer.optimize(&mut working, options)?;
        Ok(RebalanceOutcome {
            plan,
            cluster: working,
        })
    }

    /// Build the model from a snapshot and plan against it
    pub fn plan_for_snapshot(
        &mut self,
        snapshot: &ClusterSnapshot,
        options: &OptimizationOptions,
    ) -> Result<RebalanceOutcome, RebalancerError> {
        let cluster = ClusterModel::from_snapshot(snapshot)?;
        self.generate_plan(&cluster, options)
    }

    /// Check if the cluster violates any goals
    pub fn check_violations(&self, cluster: &ClusterModel) -> Vec<GoalViolation> {
        self.optimizer.check_violations(cluster)
    }

    pub fn goal_report(&self, cluster: &ClusterModel) -> Vec<GoalReport> {
        self.optimizer.goal_report(cluster)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RebalancerError {
    #[error("Optimization failed: {0}")]
    OptimizationFailed(String),

    #[error("Invalid cluster state: {0}")]
    InvalidClusterState(String),

    #[error("Cluster model error: {0}")]
    Model(#[from] ModelError),

    #[error("Snapshot unavailable: {0}")]
    Snapshot(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
