//! # envoyweb Domain
//!
//! Domain types for the Enlighten battery-profile client.
//!
//! This crate contains:
//! - Profile data types (`BatteryProfile`, `ProfileState`)
//! - Credentials and client configuration
//! - Error types and `Result` definition
//! - Wire-level constants (endpoints, cookie and header names)
//!
//! ## Architecture
//! - No dependencies on other envoyweb crates
//! - No I/O; pure data structures and validation

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
