//! Drone Move State Machine
//!
//! The pose is the state; the three command tokens are the transitions.
//! Turns always succeed. An advance is checked against the matrix bounds
//! first and then against occupancy by the matrix's other drones.

use crate::command::{CommandSequence, CommandToken};
use crate::error::{FleetError, Result};
use crate::matrix::Matrix;
use crate::outcome::ExecutionOutcome;
use crate::pose::Pose;
use crate::DroneId;

/// A rule an advance would break
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// Target cell lies outside the matrix. Coordinates may be negative.
    Boundary { x: i64, y: i64 },
    /// Target cell is held by another drone
    Collision { x: u32, y: u32, occupant: DroneId },
}

/// Result of a transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and the pose changed
    Success(Pose),
    /// Transition was refused; the pose is unchanged
    Rejected { from: Pose, violation: Violation },
}

/// Move state machine for one drone on one matrix
#[derive(Debug)]
pub struct DroneStateMachine {
    drone_id: DroneId,
    current_pose: Pose,
}

impl DroneStateMachine {
    pub fn new(drone_id: DroneId, pose: Pose) -> Self {
        Self {
            drone_id,
            current_pose: pose,
        }
    }

    /// Get current pose
    pub fn pose(&self) -> Pose {
        self.current_pose
    }

    /// Apply one token against `matrix` and return the transition result.
    /// The matrix is only read; committing the new pose is the caller's job.
    pub fn process(&mut self, token: CommandToken, matrix: &Matrix) -> TransitionResult {
        let next = match token {
            CommandToken::TurnLeft => self.current_pose.turned_left(),
            CommandToken::TurnRight => self.current_pose.turned_right(),
            CommandToken::Advance => match self.advance_target(matrix) {
                Ok(pose) => pose,
                Err(violation) => {
                    return TransitionResult::Rejected {
                        from: self.current_pose,
                        violation,
                    }
                }
            },
        };

        self.current_pose = next;
        TransitionResult::Success(next)
    }

    fn advance_target(&self, matrix: &Matrix) -> std::result::Result<Pose, Violation> {
        let pose = self.current_pose;
        let bounds = matrix.bounds();

        let (x, y) = match pose.cell_ahead() {
            Some((x, y)) if bounds.contains(x, y) => (x, y),
            _ => {
                let (dx, dy) = pose.orientation.delta();
                return Err(Violation::Boundary {
                    x: pose.x as i64 + dx as i64,
                    y: pose.y as i64 + dy as i64,
                });
            }
        };

        if let Some(occupant) = matrix.occupant_at(x, y, Some(self.drone_id)) {
            return Err(Violation::Collision { x, y, occupant });
        }

        Ok(Pose::new(x, y, pose.orientation))
    }
}

/// Run `sequence` for one drone, committing every successful step to the
/// matrix immediately. Stops at the first rejected advance; progress made
/// before it is kept.
pub fn run_sequence(
    matrix: &mut Matrix,
    drone_id: DroneId,
    sequence: &CommandSequence,
) -> Result<ExecutionOutcome> {
    let start = matrix
        .drone(drone_id)
        .ok_or(FleetError::UnknownDrone(drone_id))?
        .pose();

    let mut fsm = DroneStateMachine::new(drone_id, start);

    for (step, token) in sequence.iter() {
        match fsm.process(token, matrix) {
            TransitionResult::Success(pose) => matrix.commit_pose(drone_id, pose)?,
            TransitionResult::Rejected { from, violation } => {
                return Ok(ExecutionOutcome::rejected(step, violation, from));
            }
        }
    }

    Ok(ExecutionOutcome::Completed { pose: fsm.pose() })
}
