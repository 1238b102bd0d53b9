//! AWS-oriented adapters and handlers for draining a DynamoDB table.
//!
//! This crate owns runtime integration details (the DynamoDB backend, the
//! Lambda handler, environment configuration and log setup). The drain loop
//! itself lives in `table_drain_core`.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod logging;
