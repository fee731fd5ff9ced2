//! AeroMatrix Shared Core
//!
//! Domain model, command interpreter and wire codec shared by the fleet
//! server and its clients. Everything here is synchronous, in-memory and
//! free of I/O.

pub mod codec;
pub mod command;
pub mod error;
pub mod matrix;
pub mod outcome;
pub mod pose;
pub mod protocol;
pub mod state_machine;

use std::time::{SystemTime, UNIX_EPOCH};

pub use command::{CommandInput, CommandParseError, CommandSequence, CommandToken};
pub use error::{ErrorKind, FleetError};
pub use matrix::{Bounds, Drone, Matrix};
pub use outcome::{ExecutionOutcome, RejectReason};
pub use pose::{Orientation, Pose};
pub use protocol::{Envelope, Header, Payload, Request, Response};

pub type MatrixId = u64;
pub type DroneId = u64;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Network defaults shared by server and clients
pub mod net {
    /// Default fleet server port
    pub const DEFAULT_PORT: u16 = 7070;

    /// Default frame size limit for a session (1 MiB)
    pub const DEFAULT_MAX_FRAME_BYTES: u32 = 1024 * 1024;

    /// Sessions idle longer than this are closed by the server
    pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

    /// How long a client waits for the response to one request
    pub const RESPONSE_TIMEOUT_MS: u64 = 10_000;
}
