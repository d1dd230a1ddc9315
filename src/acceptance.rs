//! Cross-goal arbitration of proposed actions.

use tracing::trace;

use crate::actions::BalancingAction;
use crate::goals::OptimizedGoals;
use crate::models::ClusterModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionAcceptance {
    Accept,
    Reject,
}

/// Ask every already-optimized goal whether `action` would undo its balance.
///
/// Rejects at the first goal that objects.
pub fn is_proposal_acceptable_for_optimized_goals(
    optimized_goals: &OptimizedGoals<'_>,
    action: &BalancingAction,
    cluster: &ClusterModel,
) -> ActionAcceptance {
    for goal in optimized_goals.iter() {
        if goal.action_acceptance(action, cluster) == ActionAcceptance::Reject {
            trace!(goal = goal.name(), %action, "proposal rejected by optimized goal");
            return ActionAcceptance::Reject;
        }
    }
    ActionAcceptance::Accept
}
