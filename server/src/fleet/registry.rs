//! Fleet registry: every matrix behind its own lock
//!
//! A matrix's mutex is its serialization token. Command execution and
//! configuration changes against one matrix are strictly ordered; calls
//! against different matrices run independently.
//!
//! Matrix slots are taken in ascending id and the drone index is taken
//! last. The map lock is held only briefly and never while waiting on a slot.

use aeromatrix_shared::error::Result;
use aeromatrix_shared::protocol::{DroneChanges, DroneRecord, MatrixView, NewDrone};
use aeromatrix_shared::{Bounds, Drone, DroneId, FleetError, Matrix, MatrixId, Pose};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

/// A matrix plus a tombstone flag so holders of a stale handle notice deletion
#[derive(Debug)]
pub struct MatrixSlot {
    retired: bool,
    pub matrix: Matrix,
}

/// Exclusive access to one matrix
pub type MatrixGuard = OwnedMutexGuard<MatrixSlot>;

/// Owns every matrix and the drone -> matrix index
pub struct FleetRegistry {
    matrices: RwLock<BTreeMap<MatrixId, Arc<Mutex<MatrixSlot>>>>,
    drone_index: RwLock<HashMap<DroneId, MatrixId>>,
    next_matrix_id: AtomicU64,
    next_drone_id: AtomicU64,
}

impl FleetRegistry {
    pub fn new() -> Self {
        Self {
            matrices: RwLock::new(BTreeMap::new()),
            drone_index: RwLock::new(HashMap::new()),
            next_matrix_id: AtomicU64::new(0),
            next_drone_id: AtomicU64::new(0),
        }
    }

    /// Acquire a matrix's serialization token
    pub async fn lock(&self, id: MatrixId) -> Result<MatrixGuard> {
        let slot = self
            .matrices
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(FleetError::UnknownMatrix(id))?;

        let guard = slot.lock_owned().await;
        if guard.retired {
            return Err(FleetError::UnknownMatrix(id));
        }
        Ok(guard)
    }

    /// Matrix currently owning a drone
    pub async fn matrix_of(&self, drone_id: DroneId) -> Result<MatrixId> {
        self.drone_index
            .read()
            .await
            .get(&drone_id)
            .copied()
            .ok_or(FleetError::UnknownDrone(drone_id))
    }

    pub async fn list_matrices(&self) -> Vec<MatrixView> {
        let slots: Vec<_> = self.matrices.read().await.values().cloned().collect();

        let mut views = Vec::with_capacity(slots.len());
        for slot in slots {
            let guard = slot.lock().await;
            if !guard.retired {
                views.push(MatrixView::from(&guard.matrix));
            }
        }
        views
    }

    pub async fn get_matrix(&self, id: MatrixId) -> Result<MatrixView> {
        let guard = self.lock(id).await?;
        Ok(MatrixView::from(&guard.matrix))
    }

    pub async fn create_matrix(&self, bounds: Bounds) -> MatrixView {
        let id = self.next_matrix_id.fetch_add(1, Ordering::SeqCst) + 1;
        let matrix = Matrix::new(id, bounds);
        let view = MatrixView::from(&matrix);

        let slot = MatrixSlot {
            retired: false,
            matrix,
        };
        self.matrices
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(slot)));

        info!(matrix_id = id, max_x = bounds.max_x, max_y = bounds.max_y, "Matrix created");
        view
    }

    pub async fn update_matrix(&self, id: MatrixId, bounds: Bounds) -> Result<MatrixView> {
        let mut guard = self.lock(id).await?;
        guard.matrix.resize(bounds)?;

        info!(matrix_id = id, max_x = bounds.max_x, max_y = bounds.max_y, "Matrix resized");
        Ok(MatrixView::from(&guard.matrix))
    }

    /// Delete an empty matrix. A matrix that still owns drones is refused.
    pub async fn delete_matrix(&self, id: MatrixId) -> Result<()> {
        let mut guard = self.lock(id).await?;
        if !guard.matrix.is_empty() {
            return Err(FleetError::MatrixNotEmpty {
                matrix_id: id,
                drones: guard.matrix.len(),
            });
        }

        guard.retired = true;
        self.matrices.write().await.remove(&id);

        info!(matrix_id = id, "Matrix deleted");
        Ok(())
    }

    /// All drones, ordered by id
    pub async fn list_drones(&self) -> Vec<DroneRecord> {
        let mut drones: Vec<DroneRecord> = self
            .list_matrices()
            .await
            .into_iter()
            .flat_map(|view| view.drones)
            .collect();
        drones.sort_by_key(|d| d.id);
        drones
    }

    pub async fn get_drone(&self, id: DroneId) -> Result<DroneRecord> {
        let (_, guard) = self.lock_drone(id).await?;
        guard
            .matrix
            .drone(id)
            .map(DroneRecord::from)
            .ok_or(FleetError::UnknownDrone(id))
    }

    pub async fn create_drone(&self, new: NewDrone) -> Result<DroneRecord> {
        let mut guard = self.lock(new.matrix_id).await?;
        let pose = Pose::new(new.x, new.y, new.orientation);
        guard.matrix.check_placement(&pose, None)?;

        let id = self.next_drone_id.fetch_add(1, Ordering::SeqCst) + 1;
        guard.matrix.place(Drone::new(id, new.name, new.model, pose))?;
        self.drone_index.write().await.insert(id, new.matrix_id);

        info!(drone_id = id, matrix_id = new.matrix_id, pose = %pose, "Drone created");
        guard
            .matrix
            .drone(id)
            .map(DroneRecord::from)
            .ok_or(FleetError::UnknownDrone(id))
    }

    /// Apply a partial update. Metadata always applies; pose or matrix
    /// changes are validated like a fresh placement on the target matrix.
    pub async fn update_drone(&self, id: DroneId, changes: DroneChanges) -> Result<DroneRecord> {
        loop {
            let (source_id, mut source) = self.lock_drone(id).await?;
            let target_id = changes.matrix_id.unwrap_or(source_id);

            if target_id == source_id {
                return self.update_in_place(&mut source.matrix, id, changes);
            }

            // Cross-matrix move: both tokens in ascending id order
            let (source, target) = if source_id < target_id {
                let target = self.lock(target_id).await?;
                (source, target)
            } else {
                drop(source);
                let target = self.lock(target_id).await?;
                match self.lock(source_id).await {
                    Ok(source) if source.matrix.contains_drone(id) => (source, target),
                    // Moved while both tokens were released; start over
                    _ => continue,
                }
            };

            return self
                .move_between(id, (source_id, source), (target_id, target), &changes)
                .await;
        }
    }

    async fn move_between(
        &self,
        id: DroneId,
        (source_id, mut source): (MatrixId, MatrixGuard),
        (target_id, mut target): (MatrixId, MatrixGuard),
        changes: &DroneChanges,
    ) -> Result<DroneRecord> {
        let current = source
            .matrix
            .drone(id)
            .map(Drone::pose)
            .ok_or(FleetError::UnknownDrone(id))?;
        let pose = relocated_pose(current, changes);
        target.matrix.check_placement(&pose, None)?;

        let mut drone = source.matrix.remove(id).ok_or(FleetError::UnknownDrone(id))?;
        apply_metadata(&mut drone, changes);
        target.matrix.place(Drone::new(id, drone.name, drone.model, pose))?;
        self.drone_index.write().await.insert(id, target_id);

        info!(
            drone_id = id,
            from_matrix = source_id,
            to_matrix = target_id,
            pose = %pose,
            "Drone moved to another matrix"
        );
        target
            .matrix
            .drone(id)
            .map(DroneRecord::from)
            .ok_or(FleetError::UnknownDrone(id))
    }

    fn update_in_place(
        &self,
        matrix: &mut Matrix,
        id: DroneId,
        changes: DroneChanges,
    ) -> Result<DroneRecord> {
        let current = matrix.drone(id).ok_or(FleetError::UnknownDrone(id))?.pose();

        if changes.relocates() {
            let pose = relocated_pose(current, &changes);
            matrix.commit_pose(id, pose)?;
            debug!(drone_id = id, pose = %pose, "Drone relocated");
        }
        matrix.rename(id, changes.name, changes.model)?;

        matrix
            .drone(id)
            .map(DroneRecord::from)
            .ok_or(FleetError::UnknownDrone(id))
    }

    pub async fn delete_drone(&self, id: DroneId) -> Result<DroneRecord> {
        let (matrix_id, mut guard) = self.lock_drone(id).await?;
        let drone = guard.matrix.remove(id).ok_or(FleetError::UnknownDrone(id))?;
        self.drone_index.write().await.remove(&id);

        info!(drone_id = id, matrix_id, "Drone deleted");
        Ok(DroneRecord::from(&drone))
    }

    /// Lock the matrix owning `drone_id`. If the drone moves to another
    /// matrix while we wait, follow it there.
    pub async fn lock_drone(&self, drone_id: DroneId) -> Result<(MatrixId, MatrixGuard)> {
        let mut matrix_id = self.matrix_of(drone_id).await?;

        loop {
            match self.lock(matrix_id).await {
                Ok(guard) if guard.matrix.contains_drone(drone_id) => return Ok((matrix_id, guard)),
                Ok(guard) => drop(guard),
                Err(FleetError::UnknownMatrix(_)) => {}
                Err(e) => return Err(e),
            }

            // Moves update the index under both tokens, so it is current now
            let owner = self.matrix_of(drone_id).await?;
            if owner == matrix_id {
                return Err(FleetError::UnknownDrone(drone_id));
            }
            debug!(drone_id, from = matrix_id, to = owner, "Drone changed matrix while waiting");
            matrix_id = owner;
        }
    }
}

impl Default for FleetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn relocated_pose(current: Pose, changes: &DroneChanges) -> Pose {
    Pose::new(
        changes.x.unwrap_or(current.x),
        changes.y.unwrap_or(current.y),
        changes.orientation.unwrap_or(current.orientation),
    )
}

fn apply_metadata(drone: &mut Drone, changes: &DroneChanges) {
    if let Some(name) = &changes.name {
        drone.name = name.clone();
    }
    if let Some(model) = &changes.model {
        drone.model = model.clone();
    }
}
