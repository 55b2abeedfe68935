//! Command-line interface module.
//!
//! This module provides the CLI functionality for:
//! - Running the HTTP gateway
//! - Listing and tailing upstream streams
//! - Inspecting the effective configuration

pub mod commands;
pub mod handlers;

pub use handlers::{handle_config, handle_serve, handle_streams, handle_tail, init_logging};
