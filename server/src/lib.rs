//! AeroMatrix fleet server
//!
//! Owns matrices and drones in memory and answers framed JSON requests
//! over TCP. Commands against one matrix are serialized; different
//! matrices run independently.

pub mod command;
pub mod config;
pub mod fleet;
pub mod logger;
pub mod server;
pub mod session;

pub use command::RequestDispatcher;
pub use config::{ConfigError, ServerArgs, ServerConfig};
pub use fleet::{AbortSignal, FleetCoordinator, FleetRegistry};
pub use server::FleetServer;
