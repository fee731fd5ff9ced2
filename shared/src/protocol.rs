//! Wire protocol between fleet clients and the fleet server
//!
//! Every frame carries one [`Envelope`]: a header plus either a request or
//! a response. The server answers each request with exactly one response
//! whose header echoes the request's `sequence_id`.

use crate::command::CommandInput;
use crate::error::{ErrorKind, FleetError};
use crate::matrix::{Drone, Matrix};
use crate::outcome::ExecutionOutcome;
use crate::pose::{Orientation, Pose};
use crate::{now_ms, DroneId, MatrixId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub header: Header,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub client_id: String,
    pub sequence_id: u64,
    pub timestamp_ms: u64,
}

impl Header {
    /// Create a new header stamped with the current time
    pub fn new(client_id: impl Into<String>, sequence_id: u64) -> Self {
        Self {
            client_id: client_id.into(),
            sequence_id,
            timestamp_ms: now_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Payload {
    Request(Request),
    Response(Response),
}

impl Envelope {
    pub fn request(client_id: impl Into<String>, sequence_id: u64, request: Request) -> Self {
        Self {
            header: Header::new(client_id, sequence_id),
            payload: Payload::Request(request),
        }
    }

    pub fn response(client_id: impl Into<String>, sequence_id: u64, response: Response) -> Self {
        Self {
            header: Header::new(client_id, sequence_id),
            payload: Payload::Response(response),
        }
    }
}

/// Operations a client may ask for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    ListMatrices,
    GetMatrix {
        id: MatrixId,
    },
    CreateMatrix {
        #[serde(rename = "maxX")]
        max_x: u32,
        #[serde(rename = "maxY")]
        max_y: u32,
    },
    UpdateMatrix {
        id: MatrixId,
        #[serde(rename = "maxX")]
        max_x: u32,
        #[serde(rename = "maxY")]
        max_y: u32,
    },
    DeleteMatrix {
        id: MatrixId,
    },
    ListDrones,
    GetDrone {
        id: DroneId,
    },
    CreateDrone(NewDrone),
    UpdateDrone {
        id: DroneId,
        changes: DroneChanges,
    },
    DeleteDrone {
        id: DroneId,
    },
    /// One drone, one command sequence
    DroneCommands {
        #[serde(rename = "droneId")]
        drone_id: DroneId,
        commands: CommandInput,
    },
    /// Same sequence for several drones, run in the listed order
    MatrixDroneCommands {
        #[serde(rename = "matrixId", default, skip_serializing_if = "Option::is_none")]
        matrix_id: Option<MatrixId>,
        #[serde(rename = "droneIds")]
        drone_ids: Vec<DroneId>,
        commands: CommandInput,
    },
    /// A distinct sequence per drone, run in the listed order
    BatchCommands {
        #[serde(rename = "matrixId", default, skip_serializing_if = "Option::is_none")]
        matrix_id: Option<MatrixId>,
        commands: Vec<BatchEntry>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDrone {
    pub name: String,
    pub model: String,
    pub x: u32,
    pub y: u32,
    pub orientation: Orientation,
    pub matrix_id: MatrixId,
}

/// Partial drone update; absent fields are left as they are
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroneChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix_id: Option<MatrixId>,
}

impl DroneChanges {
    /// Whether the update touches position, heading or owning matrix
    pub fn relocates(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.orientation.is_some() || self.matrix_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntry {
    pub drone_id: DroneId,
    pub commands: CommandInput,
}

/// Drone as exposed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroneRecord {
    pub id: DroneId,
    pub name: String,
    pub model: String,
    pub x: u32,
    pub y: u32,
    pub orientation: Orientation,
    pub matrix_id: MatrixId,
}

impl DroneRecord {
    pub fn pose(&self) -> Pose {
        Pose::new(self.x, self.y, self.orientation)
    }
}

impl From<&Drone> for DroneRecord {
    fn from(drone: &Drone) -> Self {
        let pose = drone.pose();
        Self {
            id: drone.id,
            name: drone.name.clone(),
            model: drone.model.clone(),
            x: pose.x,
            y: pose.y,
            orientation: pose.orientation,
            matrix_id: drone.matrix_id,
        }
    }
}

/// Matrix as exposed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixView {
    pub id: MatrixId,
    pub max_x: u32,
    pub max_y: u32,
    pub drones: Vec<DroneRecord>,
}

impl From<&Matrix> for MatrixView {
    fn from(matrix: &Matrix) -> Self {
        let bounds = matrix.bounds();
        Self {
            id: matrix.id(),
            max_x: bounds.max_x,
            max_y: bounds.max_y,
            drones: matrix.drones().map(DroneRecord::from).collect(),
        }
    }
}

/// Result of a single-drone command request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleReport {
    pub outcome: ExecutionOutcome,
    pub drone: DroneRecord,
}

/// Outcome of one drone within a multi-drone request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroneOutcome {
    pub drone_id: DroneId,
    pub outcome: ExecutionOutcome,
}

/// Result of a multi-drone command request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// One entry per addressed drone, in the order they were processed
    pub outcomes: Vec<DroneOutcome>,
    /// Updated records of drones that completed or made partial progress
    pub drones: Vec<DroneRecord>,
}

impl BatchReport {
    pub fn outcome(&self, drone_id: DroneId) -> Option<&ExecutionOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.drone_id == drone_id)
            .map(|o| &o.outcome)
    }

    pub fn drone(&self, drone_id: DroneId) -> Option<&DroneRecord> {
        self.drones.iter().find(|d| d.id == drone_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&FleetError> for ErrorBody {
    fn from(err: &FleetError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Response {
    Matrix(MatrixView),
    Matrices(Vec<MatrixView>),
    Drone(DroneRecord),
    Drones(Vec<DroneRecord>),
    Deleted { id: u64 },
    Single(SingleReport),
    Batch(BatchReport),
    Error(ErrorBody),
}

impl From<FleetError> for Response {
    fn from(err: FleetError) -> Self {
        Response::Error(ErrorBody::from(&err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_names() {
        let request: Request = serde_json::from_value(json!({
            "op": "matrix_drone_commands",
            "droneIds": [1, 2, 3],
            "commands": "AALR"
        }))
        .unwrap();

        assert_eq!(
            request,
            Request::MatrixDroneCommands {
                matrix_id: None,
                drone_ids: vec![1, 2, 3],
                commands: CommandInput::from("AALR"),
            }
        );
    }

    #[test]
    fn test_batch_request_accepts_element_lists() {
        let request: Request = serde_json::from_value(json!({
            "op": "batch_commands",
            "commands": [
                {"droneId": 1, "commands": ["A", "R"]},
                {"droneId": 2, "commands": "LA"}
            ]
        }))
        .unwrap();

        match request {
            Request::BatchCommands { commands, .. } => {
                assert_eq!(commands.len(), 2);
                assert_eq!(commands[0].commands.parse().unwrap().to_string(), "AR");
                assert_eq!(commands[1].commands.parse().unwrap().to_string(), "LA");
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_update_drone_partial_changes() {
        let request: Request = serde_json::from_value(json!({
            "op": "update_drone",
            "id": 4,
            "changes": {"name": "Scout", "orientation": "O"}
        }))
        .unwrap();

        match request {
            Request::UpdateDrone { id, changes } => {
                assert_eq!(id, 4);
                assert_eq!(changes.name.as_deref(), Some("Scout"));
                assert_eq!(changes.orientation, Some(Orientation::West));
                assert_eq!(changes.model, None);
                assert!(changes.relocates());
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_matrix_view_shape() {
        let view = MatrixView {
            id: 1,
            max_x: 5,
            max_y: 5,
            drones: vec![DroneRecord {
                id: 7,
                name: "Alpha".into(),
                model: "X1".into(),
                x: 0,
                y: 1,
                orientation: Orientation::North,
                matrix_id: 1,
            }],
        };

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["maxX"], 5);
        assert_eq!(json["drones"][0]["orientation"], "N");
        assert_eq!(json["drones"][0]["matrixId"], 1);
    }

    #[test]
    fn test_error_response_carries_kind() {
        let response = Response::from(FleetError::UnknownDrone(9));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["data"]["kind"], "unknown_drone");
        assert_eq!(json["data"]["message"], "Unknown drone: 9");
    }
}
