//! Per-drone execution outcomes

use crate::pose::Pose;
use crate::state_machine::Violation;
use crate::DroneId;
use serde::{Deserialize, Serialize};

/// Why an advance was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    BoundaryViolation,
    CollisionRisk,
}

/// Result of running one drone's command sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// Every token was applied
    Completed { pose: Pose },
    /// The token at `failed_at` was refused. `pose` is the pose held just
    /// before that step, which is also the drone's committed pose.
    Rejected {
        failed_at: usize,
        reason: RejectReason,
        pose: Pose,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        blocked_by: Option<DroneId>,
    },
    /// The call was aborted before this drone started
    NotAttempted,
}

impl ExecutionOutcome {
    pub fn rejected(failed_at: usize, violation: Violation, pose: Pose) -> Self {
        let (reason, blocked_by) = match violation {
            Violation::Boundary { .. } => (RejectReason::BoundaryViolation, None),
            Violation::Collision { occupant, .. } => (RejectReason::CollisionRisk, Some(occupant)),
        };

        ExecutionOutcome::Rejected {
            failed_at,
            reason,
            pose,
            blocked_by,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed { .. })
    }

    /// Whether this run committed at least one step
    pub fn made_progress(&self) -> bool {
        match self {
            ExecutionOutcome::Completed { .. } => true,
            ExecutionOutcome::Rejected { failed_at, .. } => *failed_at > 0,
            ExecutionOutcome::NotAttempted => false,
        }
    }

    /// Pose the drone holds after this run, if it ran at all
    pub fn pose(&self) -> Option<Pose> {
        match self {
            ExecutionOutcome::Completed { pose } | ExecutionOutcome::Rejected { pose, .. } => {
                Some(*pose)
            }
            ExecutionOutcome::NotAttempted => None,
        }
    }
}
