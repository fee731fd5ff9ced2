//! Request dispatcher: maps one decoded request onto fleet operations

use crate::fleet::{AbortSignal, DronePlan, FleetCoordinator, FleetRegistry};
use aeromatrix_shared::error::Result;
use aeromatrix_shared::protocol::BatchEntry;
use aeromatrix_shared::{Bounds, CommandSequence, FleetError, Request, Response};
use std::sync::Arc;
use tracing::{debug, warn};

/// Answers requests against a shared fleet
#[derive(Clone)]
pub struct RequestDispatcher {
    registry: Arc<FleetRegistry>,
    coordinator: Arc<FleetCoordinator>,
    abort: AbortSignal,
}

impl RequestDispatcher {
    pub fn new(registry: Arc<FleetRegistry>, abort: AbortSignal) -> Self {
        let coordinator = Arc::new(FleetCoordinator::new(registry.clone()));
        Self {
            registry,
            coordinator,
            abort,
        }
    }

    pub fn registry(&self) -> &Arc<FleetRegistry> {
        &self.registry
    }

    /// Handle a request. Structural failures come back as `Response::Error`.
    pub async fn dispatch(&self, request: Request) -> Response {
        match self.handle(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(kind = ?e.kind(), "Request refused: {}", e);
                Response::from(e)
            }
        }
    }

    async fn handle(&self, request: Request) -> Result<Response> {
        let registry = &self.registry;

        match request {
            Request::ListMatrices => Ok(Response::Matrices(registry.list_matrices().await)),
            Request::GetMatrix { id } => Ok(Response::Matrix(registry.get_matrix(id).await?)),
            Request::CreateMatrix { max_x, max_y } => {
                let view = registry.create_matrix(Bounds::new(max_x, max_y)).await;
                Ok(Response::Matrix(view))
            }
            Request::UpdateMatrix { id, max_x, max_y } => {
                let view = registry.update_matrix(id, Bounds::new(max_x, max_y)).await?;
                Ok(Response::Matrix(view))
            }
            Request::DeleteMatrix { id } => {
                registry.delete_matrix(id).await?;
                Ok(Response::Deleted { id })
            }
            Request::ListDrones => Ok(Response::Drones(registry.list_drones().await)),
            Request::GetDrone { id } => Ok(Response::Drone(registry.get_drone(id).await?)),
            Request::CreateDrone(new) => Ok(Response::Drone(registry.create_drone(new).await?)),
            Request::UpdateDrone { id, changes } => {
                Ok(Response::Drone(registry.update_drone(id, changes).await?))
            }
            Request::DeleteDrone { id } => {
                registry.delete_drone(id).await?;
                Ok(Response::Deleted { id })
            }
            Request::DroneCommands { drone_id, commands } => {
                let sequence = commands
                    .parse()
                    .map_err(|e| FleetError::from(e).for_drone(drone_id))?;
                debug!(drone_id, commands = %sequence, "Single-drone commands");

                let report = self
                    .coordinator
                    .execute_single(drone_id, &sequence, &self.abort)
                    .await?;
                Ok(Response::Single(report))
            }
            Request::MatrixDroneCommands {
                matrix_id,
                drone_ids,
                commands,
            } => {
                let sequence = commands.parse()?;
                debug!(?matrix_id, drones = drone_ids.len(), commands = %sequence, "Shared-sequence commands");

                let report = self
                    .coordinator
                    .execute_same_sequence_on_many(matrix_id, &drone_ids, &sequence, &self.abort)
                    .await?;
                Ok(Response::Batch(report))
            }
            Request::BatchCommands { matrix_id, commands } => {
                let plans = parse_batch(&commands)?;
                debug!(?matrix_id, drones = plans.len(), "Batch commands");

                let report = self
                    .coordinator
                    .execute_batch(matrix_id, plans, &self.abort)
                    .await?;
                Ok(Response::Batch(report))
            }
        }
    }
}

/// Parse every entry up front so a bad sequence anywhere moves nothing
fn parse_batch(entries: &[BatchEntry]) -> Result<Vec<DronePlan>> {
    entries
        .iter()
        .map(|entry| {
            let sequence: CommandSequence = entry
                .commands
                .parse()
                .map_err(|e| FleetError::from(e).for_drone(entry.drone_id))?;
            Ok(DronePlan::new(entry.drone_id, sequence))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aeromatrix_shared::protocol::{DroneChanges, NewDrone};
    use aeromatrix_shared::{CommandInput, ErrorKind, ExecutionOutcome, Orientation, Pose};

    async fn dispatcher() -> RequestDispatcher {
        let dispatcher = RequestDispatcher::new(Arc::new(FleetRegistry::new()), AbortSignal::new());
        dispatcher
            .dispatch(Request::CreateMatrix { max_x: 5, max_y: 5 })
            .await;
        for (name, y) in [("d1", 0), ("d2", 2)] {
            dispatcher
                .dispatch(Request::CreateDrone(NewDrone {
                    name: name.into(),
                    model: "quad".into(),
                    x: 0,
                    y,
                    orientation: Orientation::North,
                    matrix_id: 1,
                }))
                .await;
        }
        dispatcher
    }

    fn error_kind(response: &Response) -> Option<ErrorKind> {
        match response {
            Response::Error(body) => Some(body.kind),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_single_commands() {
        let dispatcher = dispatcher().await;
        let response = dispatcher
            .dispatch(Request::DroneCommands {
                drone_id: 1,
                commands: "RAL".into(),
            })
            .await;

        match response {
            Response::Single(report) => {
                assert!(report.outcome.is_completed());
                assert_eq!(report.drone.pose(), Pose::new(1, 0, Orientation::North));
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_command_changes_nothing() {
        let dispatcher = dispatcher().await;
        let response = dispatcher
            .dispatch(Request::DroneCommands {
                drone_id: 1,
                commands: "AXR".into(),
            })
            .await;

        match &response {
            Response::Error(body) => {
                assert_eq!(body.kind, ErrorKind::InvalidCommand);
                assert!(body.message.contains("index 1"));
            }
            other => panic!("unexpected response: {:?}", other),
        }

        let drone = dispatcher.registry().get_drone(1).await.unwrap();
        assert_eq!(drone.pose(), Pose::new(0, 0, Orientation::North));
    }

    #[tokio::test]
    async fn test_batch_with_one_bad_sequence_moves_nothing() {
        let dispatcher = dispatcher().await;
        let response = dispatcher
            .dispatch(Request::BatchCommands {
                matrix_id: None,
                commands: vec![
                    BatchEntry {
                        drone_id: 1,
                        commands: "A".into(),
                    },
                    BatchEntry {
                        drone_id: 2,
                        commands: CommandInput::Elements(vec!["A".into(), "AA".into()]),
                    },
                ],
            })
            .await;

        assert_eq!(error_kind(&response), Some(ErrorKind::InvalidCommand));
        let drone = dispatcher.registry().get_drone(1).await.unwrap();
        assert_eq!(drone.pose(), Pose::new(0, 0, Orientation::North));
    }

    #[tokio::test]
    async fn test_shared_sequence_reports_each_drone() {
        let dispatcher = dispatcher().await;
        let response = dispatcher
            .dispatch(Request::MatrixDroneCommands {
                matrix_id: Some(1),
                drone_ids: vec![1, 2],
                commands: "A".into(),
            })
            .await;

        match response {
            Response::Batch(report) => {
                // d1 advances into the free cell below d2, then d2 moves on
                assert!(report.outcome(1).unwrap().is_completed());
                assert_eq!(
                    report.outcome(2),
                    Some(&ExecutionOutcome::Completed {
                        pose: Pose::new(0, 3, Orientation::North)
                    })
                );
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_structural_errors_map_to_kinds() {
        let dispatcher = dispatcher().await;

        let unknown = dispatcher.dispatch(Request::GetDrone { id: 42 }).await;
        assert_eq!(error_kind(&unknown), Some(ErrorKind::UnknownDrone));

        let empty = dispatcher
            .dispatch(Request::MatrixDroneCommands {
                matrix_id: None,
                drone_ids: vec![],
                commands: "A".into(),
            })
            .await;
        assert_eq!(error_kind(&empty), Some(ErrorKind::InvalidRequest));

        let occupied = dispatcher
            .dispatch(Request::UpdateDrone {
                id: 1,
                changes: DroneChanges {
                    y: Some(2),
                    ..Default::default()
                },
            })
            .await;
        assert_eq!(error_kind(&occupied), Some(ErrorKind::PositionOccupied));

        let not_empty = dispatcher.dispatch(Request::DeleteMatrix { id: 1 }).await;
        assert_eq!(error_kind(&not_empty), Some(ErrorKind::MatrixNotEmpty));
    }

    #[tokio::test]
    async fn test_aborted_dispatcher_reports_not_attempted() {
        let abort = AbortSignal::new();
        let dispatcher = dispatcher().await;
        let dispatcher = RequestDispatcher::new(dispatcher.registry().clone(), abort.clone());
        abort.abort();

        let response = dispatcher
            .dispatch(Request::DroneCommands {
                drone_id: 1,
                commands: "A".into(),
            })
            .await;

        match response {
            Response::Single(report) => assert_eq!(report.outcome, ExecutionOutcome::NotAttempted),
            other => panic!("unexpected response: {:?}", other),
        }
    }
}
