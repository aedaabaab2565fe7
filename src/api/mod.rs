//! HTTP API module.
//!
//! This module provides the HTTP server and API types for rowtag.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{start_server, start_server_with_engine};
pub use types::*;
