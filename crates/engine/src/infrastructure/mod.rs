//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod cache;
pub mod clock;
pub mod config;
pub mod master_data;
pub mod persistence;
pub mod ports;
pub mod retry;
pub mod telemetry;
