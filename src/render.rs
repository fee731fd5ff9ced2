//! Human-readable rendering of server responses

use aeromatrix_shared::protocol::{BatchReport, DroneRecord, MatrixView, SingleReport};
use aeromatrix_shared::{ExecutionOutcome, RejectReason, Response};
use std::fmt::Write;

pub fn response(response: &Response) -> String {
    let mut out = String::new();
    match response {
        Response::Matrix(view) => matrix(&mut out, view),
        Response::Matrices(views) => {
            if views.is_empty() {
                out.push_str("no matrices\n");
            }
            for view in views {
                matrix(&mut out, view);
            }
        }
        Response::Drone(record) => drone(&mut out, record),
        Response::Drones(records) => {
            if records.is_empty() {
                out.push_str("no drones\n");
            }
            for record in records {
                drone(&mut out, record);
            }
        }
        Response::Deleted { id } => {
            let _ = writeln!(out, "deleted {}", id);
        }
        Response::Single(report) => single(&mut out, report),
        Response::Batch(report) => batch(&mut out, report),
        Response::Error(body) => {
            let _ = writeln!(out, "error [{:?}]: {}", body.kind, body.message);
        }
    }
    out
}

fn matrix(out: &mut String, view: &MatrixView) {
    let _ = writeln!(
        out,
        "matrix {}  {}x{}  ({} drones)",
        view.id,
        view.max_x,
        view.max_y,
        view.drones.len()
    );
    for record in &view.drones {
        out.push_str("  ");
        drone(out, record);
    }
}

fn drone(out: &mut String, record: &DroneRecord) {
    let _ = writeln!(
        out,
        "drone {} '{}' [{}] at {} in matrix {}",
        record.id,
        record.name,
        record.model,
        record.pose(),
        record.matrix_id
    );
}

fn outcome(outcome: &ExecutionOutcome) -> String {
    match outcome {
        ExecutionOutcome::Completed { pose } => format!("completed at {}", pose),
        ExecutionOutcome::Rejected {
            failed_at,
            reason,
            pose,
            blocked_by,
        } => {
            let why = match (reason, blocked_by) {
                (RejectReason::CollisionRisk, Some(other)) => format!("collision risk with drone {}", other),
                (RejectReason::CollisionRisk, None) => "collision risk".to_string(),
                (RejectReason::BoundaryViolation, _) => "boundary violation".to_string(),
            };
            format!("rejected at command {} ({}), holding {}", failed_at, why, pose)
        }
        ExecutionOutcome::NotAttempted => "not attempted".to_string(),
    }
}

fn single(out: &mut String, report: &SingleReport) {
    let _ = writeln!(out, "drone {}: {}", report.drone.id, outcome(&report.outcome));
}

fn batch(out: &mut String, report: &BatchReport) {
    for entry in &report.outcomes {
        let _ = writeln!(out, "drone {}: {}", entry.drone_id, outcome(&entry.outcome));
    }
}
