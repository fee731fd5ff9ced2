//! Result reporter: turns per-drone outcomes into caller-facing reports

use aeromatrix_shared::error::Result;
use aeromatrix_shared::protocol::{BatchReport, DroneOutcome, DroneRecord, SingleReport};
use aeromatrix_shared::{DroneId, ExecutionOutcome, FleetError, Matrix};
use std::fmt;

/// Collects outcomes in processing order
#[derive(Debug, Default)]
pub struct ReportBuilder {
    outcomes: Vec<DroneOutcome>,
}

impl ReportBuilder {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            outcomes: Vec::with_capacity(n),
        }
    }

    pub fn record(&mut self, drone_id: DroneId, outcome: ExecutionOutcome) {
        self.outcomes.push(DroneOutcome { drone_id, outcome });
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for entry in &self.outcomes {
            match entry.outcome {
                ExecutionOutcome::Completed { .. } => summary.completed += 1,
                ExecutionOutcome::Rejected { .. } => summary.rejected += 1,
                ExecutionOutcome::NotAttempted => summary.not_attempted += 1,
            }
        }
        summary
    }

    /// Build the multi-drone report, reading updated records from `matrix`.
    /// Only drones that committed at least one step are included.
    pub fn finish(self, matrix: &Matrix) -> BatchReport {
        let drones = self
            .outcomes
            .iter()
            .filter(|entry| entry.outcome.made_progress())
            .filter_map(|entry| matrix.drone(entry.drone_id))
            .map(DroneRecord::from)
            .collect();

        BatchReport {
            outcomes: self.outcomes,
            drones,
        }
    }
}

/// Build the single-drone report with the drone's full updated record
pub fn single(matrix: &Matrix, drone_id: DroneId, outcome: ExecutionOutcome) -> Result<SingleReport> {
    let drone = matrix
        .drone(drone_id)
        .map(DroneRecord::from)
        .ok_or(FleetError::UnknownDrone(drone_id))?;

    Ok(SingleReport { outcome, drone })
}

/// Tally of outcomes, for logs
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub completed: usize,
    pub rejected: usize,
    pub not_attempted: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} completed, {} rejected, {} not attempted",
            self.completed, self.rejected, self.not_attempted
        )
    }
}
