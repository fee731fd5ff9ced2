//! Fleet coordinator: runs command sequences against one or many drones
//!
//! Within one call, drones run strictly one after another in caller order,
//! each to completion before the next starts, all under the owning
//! matrix's lock. Drone k's occupancy checks therefore see drones 1..k-1
//! where they ended up and drones k+1..n where they started.

use super::registry::{FleetRegistry, MatrixGuard};
use super::report::{self, ReportBuilder};
use aeromatrix_shared::error::Result;
use aeromatrix_shared::protocol::{BatchReport, SingleReport};
use aeromatrix_shared::state_machine::run_sequence;
use aeromatrix_shared::{CommandSequence, DroneId, ExecutionOutcome, FleetError, MatrixId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cooperative abort flag, checked before each drone starts
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One drone's share of a call
#[derive(Debug, Clone)]
pub struct DronePlan {
    pub drone_id: DroneId,
    pub sequence: CommandSequence,
}

impl DronePlan {
    pub fn new(drone_id: DroneId, sequence: CommandSequence) -> Self {
        Self { drone_id, sequence }
    }
}

pub struct FleetCoordinator {
    registry: Arc<FleetRegistry>,
}

impl FleetCoordinator {
    pub fn new(registry: Arc<FleetRegistry>) -> Self {
        Self { registry }
    }

    /// Run one drone's sequence to completion or first rejection
    pub async fn execute_single(
        &self,
        drone_id: DroneId,
        sequence: &CommandSequence,
        abort: &AbortSignal,
    ) -> Result<SingleReport> {
        let (_, mut guard) = self.registry.lock_drone(drone_id).await?;

        let outcome = if abort.is_aborted() {
            warn!(drone_id, "Call aborted before drone started");
            ExecutionOutcome::NotAttempted
        } else {
            run_one(&mut guard, drone_id, sequence)?
        };

        report::single(&guard.matrix, drone_id, outcome)
    }

    /// Apply the same sequence to each drone, in the given order
    pub async fn execute_same_sequence_on_many(
        &self,
        matrix_id: Option<MatrixId>,
        drone_ids: &[DroneId],
        sequence: &CommandSequence,
        abort: &AbortSignal,
    ) -> Result<BatchReport> {
        let plans = drone_ids
            .iter()
            .map(|&id| DronePlan::new(id, sequence.clone()))
            .collect();

        self.execute_batch(matrix_id, plans, abort).await
    }

    /// Run a distinct sequence per drone, in the given order. One drone's
    /// rejection never stops the others.
    pub async fn execute_batch(
        &self,
        matrix_id: Option<MatrixId>,
        plans: Vec<DronePlan>,
        abort: &AbortSignal,
    ) -> Result<BatchReport> {
        let first = plans
            .first()
            .map(|p| p.drone_id)
            .ok_or_else(|| FleetError::InvalidRequest("no drones addressed".into()))?;

        let mut seen = HashSet::with_capacity(plans.len());
        for plan in &plans {
            if !seen.insert(plan.drone_id) {
                return Err(FleetError::DuplicateDrone(plan.drone_id));
            }
        }

        // Without an explicit matrix, the first drone's owner is implied
        let (matrix_id, mut guard) = match matrix_id {
            Some(id) => (id, self.registry.lock(id).await?),
            None => self.registry.lock_drone(first).await?,
        };

        // Structural checks all happen before anything moves
        for plan in &plans {
            self.check_ownership(&guard, matrix_id, plan.drone_id).await?;
        }

        let mut builder = ReportBuilder::with_capacity(plans.len());
        for plan in &plans {
            if abort.is_aborted() {
                builder.record(plan.drone_id, ExecutionOutcome::NotAttempted);
                continue;
            }
            let outcome = run_one(&mut guard, plan.drone_id, &plan.sequence)?;
            builder.record(plan.drone_id, outcome);
        }

        let summary = builder.summary();
        info!(matrix_id, drones = plans.len(), "Batch finished: {}", summary);
        if summary.not_attempted > 0 {
            warn!(matrix_id, skipped = summary.not_attempted, "Batch aborted part way");
        }

        Ok(builder.finish(&guard.matrix))
    }

    /// Fail with the right structural error if `drone_id` is not on the locked matrix
    async fn check_ownership(
        &self,
        guard: &MatrixGuard,
        matrix_id: MatrixId,
        drone_id: DroneId,
    ) -> Result<()> {
        if guard.matrix.contains_drone(drone_id) {
            return Ok(());
        }

        match self.registry.matrix_of(drone_id).await {
            Ok(actual) => Err(FleetError::MatrixMismatch {
                drone_id,
                expected: matrix_id,
                actual,
            }),
            Err(err) => Err(err),
        }
    }
}

fn run_one(
    guard: &mut MatrixGuard,
    drone_id: DroneId,
    sequence: &CommandSequence,
) -> Result<ExecutionOutcome> {
    let outcome = run_sequence(&mut guard.matrix, drone_id, sequence)?;

    match &outcome {
        ExecutionOutcome::Completed { pose } => {
            debug!(drone_id, steps = sequence.len(), pose = %pose, "Sequence completed");
        }
        ExecutionOutcome::Rejected {
            failed_at,
            reason,
            pose,
            ..
        } => {
            info!(
                drone_id,
                step = failed_at,
                reason = ?reason,
                pose = %pose,
                "Sequence rejected"
            );
        }
        ExecutionOutcome::NotAttempted => {}
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aeromatrix_shared::protocol::{DroneChanges, NewDrone};
    use std::time::Duration;
    use aeromatrix_shared::{Bounds, ErrorKind, Orientation, Pose, RejectReason};

    async fn fleet(max: u32, drones: &[(u32, u32, Orientation)]) -> (Arc<FleetRegistry>, FleetCoordinator) {
        let registry = Arc::new(FleetRegistry::new());
        registry.create_matrix(Bounds::new(max, max)).await;
        for &(x, y, orientation) in drones {
            registry
                .create_drone(NewDrone {
                    name: "d".into(),
                    model: "m".into(),
                    x,
                    y,
                    orientation,
                    matrix_id: 1,
                })
                .await
                .unwrap();
        }
        let coordinator = FleetCoordinator::new(registry.clone());
        (registry, coordinator)
    }

    fn seq(raw: &str) -> CommandSequence {
        CommandSequence::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_single_updates_record() {
        let (registry, coordinator) = fleet(5, &[(0, 0, Orientation::North)]).await;

        let report = coordinator
            .execute_single(1, &seq("AARA"), &AbortSignal::new())
            .await
            .unwrap();

        let expected = Pose::new(1, 2, Orientation::East);
        assert_eq!(report.outcome, ExecutionOutcome::Completed { pose: expected });
        assert_eq!(report.drone.pose(), expected);
        assert_eq!(registry.get_drone(1).await.unwrap().pose(), expected);
    }

    #[tokio::test]
    async fn test_later_drone_sees_earlier_drone_new_position() {
        // d1 at (0,0,N), d2 at (0,1,N): d2 moves first out of d1's way
        let (_, coordinator) =
            fleet(5, &[(0, 0, Orientation::North), (0, 1, Orientation::North)]).await;

        let report = coordinator
            .execute_same_sequence_on_many(None, &[2, 1], &seq("A"), &AbortSignal::new())
            .await
            .unwrap();

        assert_eq!(
            report.outcome(2),
            Some(&ExecutionOutcome::Completed {
                pose: Pose::new(0, 2, Orientation::North)
            })
        );
        assert_eq!(
            report.outcome(1),
            Some(&ExecutionOutcome::Completed {
                pose: Pose::new(0, 1, Orientation::North)
            })
        );
    }

    #[tokio::test]
    async fn test_follower_enters_cell_vacated_by_leader() {
        // d1 at (0,1,N) leads, d2 at (0,0,N) follows into the cell d1 left
        let (_, coordinator) =
            fleet(5, &[(0, 1, Orientation::North), (0, 0, Orientation::North)]).await;

        let report = coordinator
            .execute_same_sequence_on_many(None, &[1, 2], &seq("A"), &AbortSignal::new())
            .await
            .unwrap();

        assert_eq!(
            report.outcome(1),
            Some(&ExecutionOutcome::Completed {
                pose: Pose::new(0, 2, Orientation::North)
            })
        );
        assert_eq!(
            report.outcome(2),
            Some(&ExecutionOutcome::Completed {
                pose: Pose::new(0, 1, Orientation::North)
            })
        );
        assert_eq!(report.drones.len(), 2);
    }

    #[tokio::test]
    async fn test_later_drone_sees_earlier_drone_unmoved_position() {
        // Order [d1, d2]: d1 advances into d2's still-occupied cell
        let (_, coordinator) =
            fleet(5, &[(0, 0, Orientation::North), (0, 1, Orientation::North)]).await;

        let report = coordinator
            .execute_same_sequence_on_many(None, &[1, 2], &seq("A"), &AbortSignal::new())
            .await
            .unwrap();

        assert_eq!(
            report.outcome(1),
            Some(&ExecutionOutcome::Rejected {
                failed_at: 0,
                reason: RejectReason::CollisionRisk,
                pose: Pose::new(0, 0, Orientation::North),
                blocked_by: Some(2),
            })
        );
        assert!(report.outcome(2).unwrap().is_completed());
        assert!(report.drone(1).is_none());
        assert_eq!(report.drone(2).unwrap().pose(), Pose::new(0, 2, Orientation::North));
    }

    #[tokio::test]
    async fn test_batch_rejection_does_not_stop_siblings() {
        let (_, coordinator) = fleet(
            3,
            &[(3, 0, Orientation::East), (0, 0, Orientation::North)],
        )
        .await;

        let plans = vec![
            DronePlan::new(1, seq("A")),
            DronePlan::new(2, seq("AAR")),
        ];
        let report = coordinator
            .execute_batch(None, plans, &AbortSignal::new())
            .await
            .unwrap();

        assert!(matches!(
            report.outcome(1),
            Some(ExecutionOutcome::Rejected {
                reason: RejectReason::BoundaryViolation,
                ..
            })
        ));
        assert_eq!(
            report.outcome(2),
            Some(&ExecutionOutcome::Completed {
                pose: Pose::new(0, 2, Orientation::East)
            })
        );
    }

    #[tokio::test]
    async fn test_structural_errors_move_nothing() {
        let registry = Arc::new(FleetRegistry::new());
        registry.create_matrix(Bounds::new(5, 5)).await;
        registry.create_matrix(Bounds::new(5, 5)).await;
        for matrix_id in [1, 2] {
            registry
                .create_drone(NewDrone {
                    name: "d".into(),
                    model: "m".into(),
                    x: 0,
                    y: 0,
                    orientation: Orientation::North,
                    matrix_id,
                })
                .await
                .unwrap();
        }
        let coordinator = FleetCoordinator::new(registry.clone());
        let abort = AbortSignal::new();

        let mismatch = coordinator
            .execute_same_sequence_on_many(None, &[1, 2], &seq("A"), &abort)
            .await
            .unwrap_err();
        assert_eq!(
            mismatch,
            FleetError::MatrixMismatch {
                drone_id: 2,
                expected: 1,
                actual: 2
            }
        );

        let unknown = coordinator
            .execute_same_sequence_on_many(Some(1), &[1, 99], &seq("A"), &abort)
            .await
            .unwrap_err();
        assert_eq!(unknown, FleetError::UnknownDrone(99));

        let duplicate = coordinator
            .execute_same_sequence_on_many(None, &[1, 1], &seq("A"), &abort)
            .await
            .unwrap_err();
        assert_eq!(duplicate, FleetError::DuplicateDrone(1));

        let empty = coordinator
            .execute_batch(None, vec![], &abort)
            .await
            .unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::InvalidRequest);

        let wrong_matrix = coordinator
            .execute_same_sequence_on_many(Some(7), &[1], &seq("A"), &abort)
            .await
            .unwrap_err();
        assert_eq!(wrong_matrix, FleetError::UnknownMatrix(7));

        for id in [1, 2] {
            assert_eq!(
                registry.get_drone(id).await.unwrap().pose(),
                Pose::new(0, 0, Orientation::North)
            );
        }
    }

    #[tokio::test]
    async fn test_aborted_call_reports_not_attempted() {
        let (registry, coordinator) =
            fleet(5, &[(0, 0, Orientation::North), (1, 0, Orientation::North)]).await;
        let abort = AbortSignal::new();
        abort.abort();

        let report = coordinator
            .execute_same_sequence_on_many(None, &[1, 2], &seq("A"), &abort)
            .await
            .unwrap();

        assert_eq!(report.outcome(1), Some(&ExecutionOutcome::NotAttempted));
        assert_eq!(report.outcome(2), Some(&ExecutionOutcome::NotAttempted));
        assert!(report.drones.is_empty());
        assert_eq!(
            registry.get_drone(1).await.unwrap().pose(),
            Pose::new(0, 0, Orientation::North)
        );

        let single = coordinator
            .execute_single(1, &seq("A"), &abort)
            .await
            .unwrap();
        assert_eq!(single.outcome, ExecutionOutcome::NotAttempted);
    }

    #[tokio::test]
    async fn test_calls_on_one_matrix_are_serialized() {
        // Two drones racing toward the same cell from opposite sides
        let (registry, coordinator) =
            fleet(4, &[(0, 2, Orientation::East), (4, 2, Orientation::West)]).await;
        let coordinator = Arc::new(coordinator);

        let a = {
            let c = coordinator.clone();
            tokio::spawn(async move {
                let abort = AbortSignal::new();
                let result = c.execute_single(1, &seq("AA"), &abort).await;
                result
            })
        };
        let b = {
            let c = coordinator.clone();
            tokio::spawn(async move {
                let abort = AbortSignal::new();
                let result = c.execute_single(2, &seq("AA"), &abort).await;
                result
            })
        };

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        // Exactly one drone reaches (2, 2); the other is stopped one short
        let completed = [a.outcome.is_completed(), b.outcome.is_completed()];
        assert_eq!(completed.iter().filter(|c| **c).count(), 1);

        let d1 = registry.get_drone(1).await.unwrap();
        let d2 = registry.get_drone(2).await.unwrap();
        assert_ne!((d1.x, d1.y), (d2.x, d2.y));
    }

    #[tokio::test]
    async fn test_calls_follow_drone_moved_while_waiting() {
        let (registry, coordinator) = fleet(5, &[(0, 0, Orientation::North)]).await;
        registry.create_matrix(Bounds::new(5, 5)).await;
        let coordinator = Arc::new(coordinator);

        // The move takes matrix 1, then parks on matrix 2
        let held = registry.lock(2).await.unwrap();
        let mover = {
            let registry = registry.clone();
            tokio::spawn(async move {
                let changes = DroneChanges {
                    matrix_id: Some(2),
                    ..Default::default()
                };
                registry.update_drone(1, changes).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Both calls resolve matrix 1 and queue behind the move. Their
        // turns cancel out, so the order they run in does not matter.
        let single = {
            let c = coordinator.clone();
            tokio::spawn(async move {
                let abort = AbortSignal::new();
                let result = c.execute_single(1, &seq("L"), &abort).await;
                result
            })
        };
        let many = {
            let c = coordinator.clone();
            tokio::spawn(async move {
                let abort = AbortSignal::new();
                let result = c
                    .execute_same_sequence_on_many(None, &[1], &seq("R"), &abort)
                    .await;
                result
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        assert_eq!(mover.await.unwrap().unwrap().matrix_id, 2);

        let single = single.await.unwrap().unwrap();
        assert!(single.outcome.is_completed());
        assert_eq!(single.drone.matrix_id, 2);

        let many = many.await.unwrap().unwrap();
        assert!(many.outcome(1).unwrap().is_completed());
        assert_eq!(many.drone(1).unwrap().matrix_id, 2);

        let drone = registry.get_drone(1).await.unwrap();
        assert_eq!(drone.matrix_id, 2);
        assert_eq!(drone.pose(), Pose::new(0, 0, Orientation::North));
    }

    #[tokio::test]
    async fn test_explicit_matrix_still_reports_mismatch() {
        let (registry, coordinator) = fleet(5, &[(0, 0, Orientation::North)]).await;
        registry.create_matrix(Bounds::new(5, 5)).await;

        let err = coordinator
            .execute_same_sequence_on_many(Some(2), &[1], &seq("A"), &AbortSignal::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FleetError::MatrixMismatch {
                drone_id: 1,
                expected: 2,
                actual: 1
            }
        );
    }
}
