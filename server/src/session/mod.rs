//! Session management for connected clients
//!
//! This module handles:
//! - Reading length-prefixed request frames from each client
//! - Answering each request with a response echoing its sequence ID
//! - Closing idle sessions and sessions that send undecodable frames

mod connection;
mod manager;

pub use connection::{ClientSession, SessionError, SessionHandle, SERVER_ID};
pub use manager::SessionManager;
