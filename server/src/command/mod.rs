//! Request dispatch for the fleet server
//!
//! This module handles:
//! - Parsing every command sequence in a request before anything runs
//! - Mapping each request onto registry or coordinator operations
//! - Turning structural errors into error responses

mod dispatcher;

pub use dispatcher::RequestDispatcher;
