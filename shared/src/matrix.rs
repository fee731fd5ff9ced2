//! Matrix and drone model
//!
//! A [`Matrix`] owns its drones and a cell index over their positions, so
//! the one-drone-per-cell invariant is enforced by construction: every
//! placement and every pose commit goes through the matrix.

use crate::error::{FleetError, Result};
use crate::pose::Pose;
use crate::{DroneId, MatrixId};
use std::collections::{BTreeMap, HashMap};

/// Inclusive grid bounds: valid cells are `[0, max_x] x [0, max_y]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub max_x: u32,
    pub max_y: u32,
}

impl Bounds {
    pub fn new(max_x: u32, max_y: u32) -> Self {
        Self { max_x, max_y }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x <= self.max_x && y <= self.max_y
    }

    fn check(&self, x: u32, y: u32) -> Result<()> {
        if self.contains(x, y) {
            Ok(())
        } else {
            Err(FleetError::InvalidPlacement {
                x,
                y,
                max_x: self.max_x,
                max_y: self.max_y,
            })
        }
    }
}

/// A drone placed on a matrix. Name and model are opaque metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drone {
    pub id: DroneId,
    pub matrix_id: MatrixId,
    pub name: String,
    pub model: String,
    pose: Pose,
}

impl Drone {
    pub fn new(
        id: DroneId,
        name: impl Into<String>,
        model: impl Into<String>,
        pose: Pose,
    ) -> Self {
        Self {
            id,
            matrix_id: 0,
            name: name.into(),
            model: model.into(),
            pose,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }
}

/// A bounded grid and the drones it owns
#[derive(Debug, Clone)]
pub struct Matrix {
    id: MatrixId,
    bounds: Bounds,
    drones: BTreeMap<DroneId, Drone>,
    cells: HashMap<(u32, u32), DroneId>,
}

impl Matrix {
    pub fn new(id: MatrixId, bounds: Bounds) -> Self {
        Self {
            id,
            bounds,
            drones: BTreeMap::new(),
            cells: HashMap::new(),
        }
    }

    pub fn id(&self) -> MatrixId {
        self.id
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn drone(&self, id: DroneId) -> Option<&Drone> {
        self.drones.get(&id)
    }

    pub fn contains_drone(&self, id: DroneId) -> bool {
        self.drones.contains_key(&id)
    }

    /// Drones ordered by id
    pub fn drones(&self) -> impl Iterator<Item = &Drone> {
        self.drones.values()
    }

    pub fn len(&self) -> usize {
        self.drones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drones.is_empty()
    }

    /// Drone occupying `(x, y)`, not counting `ignoring`
    pub fn occupant_at(&self, x: u32, y: u32, ignoring: Option<DroneId>) -> Option<DroneId> {
        self.cells
            .get(&(x, y))
            .copied()
            .filter(|occupant| Some(*occupant) != ignoring)
    }

    /// Check that `pose` is inside the bounds and on a free cell
    pub fn check_placement(&self, pose: &Pose, ignoring: Option<DroneId>) -> Result<()> {
        self.bounds.check(pose.x, pose.y)?;

        match self.occupant_at(pose.x, pose.y, ignoring) {
            Some(occupant) => Err(FleetError::PositionOccupied {
                x: pose.x,
                y: pose.y,
                occupant,
            }),
            None => Ok(()),
        }
    }

    /// Place a drone on this matrix, taking ownership of it
    pub fn place(&mut self, mut drone: Drone) -> Result<()> {
        if self.drones.contains_key(&drone.id) {
            return Err(FleetError::DuplicateDrone(drone.id));
        }
        self.check_placement(&drone.pose, None)?;

        drone.matrix_id = self.id;
        self.cells.insert((drone.pose.x, drone.pose.y), drone.id);
        self.drones.insert(drone.id, drone);
        Ok(())
    }

    /// Remove a drone, releasing its cell
    pub fn remove(&mut self, id: DroneId) -> Option<Drone> {
        let drone = self.drones.remove(&id)?;
        self.cells.remove(&(drone.pose.x, drone.pose.y));
        Some(drone)
    }

    /// Replace a drone's pose. The target cell must be free and in bounds.
    pub fn commit_pose(&mut self, id: DroneId, pose: Pose) -> Result<()> {
        self.check_placement(&pose, Some(id))?;

        let drone = self.drones.get_mut(&id).ok_or(FleetError::UnknownDrone(id))?;
        if !drone.pose.same_cell(&pose) {
            self.cells.remove(&(drone.pose.x, drone.pose.y));
            self.cells.insert((pose.x, pose.y), id);
        }
        drone.pose = pose;
        Ok(())
    }

    /// Update a drone's descriptive metadata
    pub fn rename(&mut self, id: DroneId, name: Option<String>, model: Option<String>) -> Result<()> {
        let drone = self.drones.get_mut(&id).ok_or(FleetError::UnknownDrone(id))?;
        if let Some(name) = name {
            drone.name = name;
        }
        if let Some(model) = model {
            drone.model = model;
        }
        Ok(())
    }

    /// Change the bounds. Refused if any owned drone would end up outside.
    pub fn resize(&mut self, bounds: Bounds) -> Result<()> {
        for drone in self.drones.values() {
            bounds.check(drone.pose.x, drone.pose.y)?;
        }
        self.bounds = bounds;
        Ok(())
    }
}
