//! Fleet state and command execution
//!
//! This module handles:
//! - Owning matrices and their drones behind per-matrix locks
//! - Running command sequences for one or many drones in caller order
//! - Assembling per-drone and per-batch reports

mod coordinator;
mod registry;
mod report;

pub use coordinator::{AbortSignal, DronePlan, FleetCoordinator};
pub use registry::{FleetRegistry, MatrixGuard};
pub use report::{ReportBuilder, Summary};
