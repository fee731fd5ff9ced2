//! Request/response client for the fleet server
//!
//! This module handles:
//! - Connecting with retries and exponential backoff
//! - Framing requests and matching responses by sequence ID
//! - Bounding how long one request may wait for its answer

mod client;

pub use client::{ClientConfig, FleetClient};
