//! Request-level error taxonomy
//!
//! These errors stop a request before any drone moves. Rule violations hit
//! while executing (boundary, collision) are not errors: they are recorded
//! per drone in [`crate::outcome::ExecutionOutcome`].

use crate::command::CommandParseError;
use crate::{DroneId, MatrixId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FleetError {
    #[error("{}", invalid_command_message(.drone_id, .source))]
    InvalidCommand {
        drone_id: Option<DroneId>,
        source: CommandParseError,
    },

    #[error("Unknown drone: {0}")]
    UnknownDrone(DroneId),

    #[error("Unknown matrix: {0}")]
    UnknownMatrix(MatrixId),

    #[error("Drone {drone_id} belongs to matrix {actual}, not matrix {expected}")]
    MatrixMismatch {
        drone_id: DroneId,
        expected: MatrixId,
        actual: MatrixId,
    },

    #[error("Drone {0} is addressed more than once in the same request")]
    DuplicateDrone(DroneId),

    #[error("Position ({x}, {y}) is outside matrix bounds [0, {max_x}] x [0, {max_y}]")]
    InvalidPlacement {
        x: u32,
        y: u32,
        max_x: u32,
        max_y: u32,
    },

    #[error("Position ({x}, {y}) is already occupied by drone {occupant}")]
    PositionOccupied { x: u32, y: u32, occupant: DroneId },

    #[error("Matrix {matrix_id} still owns {drones} drone(s)")]
    MatrixNotEmpty { matrix_id: MatrixId, drones: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

fn invalid_command_message(drone_id: &Option<DroneId>, source: &CommandParseError) -> String {
    match drone_id {
        Some(id) => format!("{} (drone {})", source, id),
        None => source.to_string(),
    }
}

impl From<CommandParseError> for FleetError {
    fn from(source: CommandParseError) -> Self {
        FleetError::InvalidCommand {
            drone_id: None,
            source,
        }
    }
}

impl FleetError {
    /// Attach the drone whose command input failed to parse
    pub fn for_drone(self, id: DroneId) -> Self {
        match self {
            FleetError::InvalidCommand { source, .. } => FleetError::InvalidCommand {
                drone_id: Some(id),
                source,
            },
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FleetError::InvalidCommand { .. } => ErrorKind::InvalidCommand,
            FleetError::UnknownDrone(_) => ErrorKind::UnknownDrone,
            FleetError::UnknownMatrix(_) => ErrorKind::UnknownMatrix,
            FleetError::MatrixMismatch { .. } => ErrorKind::MatrixMismatch,
            FleetError::DuplicateDrone(_) => ErrorKind::DuplicateDrone,
            FleetError::InvalidPlacement { .. } => ErrorKind::InvalidPlacement,
            FleetError::PositionOccupied { .. } => ErrorKind::PositionOccupied,
            FleetError::MatrixNotEmpty { .. } => ErrorKind::MatrixNotEmpty,
            FleetError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }
}

/// Stable error identifiers carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidCommand,
    UnknownDrone,
    UnknownMatrix,
    MatrixMismatch,
    DuplicateDrone,
    InvalidPlacement,
    PositionOccupied,
    MatrixNotEmpty,
    InvalidRequest,
}

pub type Result<T> = std::result::Result<T, FleetError>;
