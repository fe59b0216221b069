//! Core functionality for the sortie fleet tasking engine.
//!
//! This crate provides the fundamental types and collaborator contracts
//! shared by every other sortie crate:
//! - Actor `Address`es
//! - Geographic primitives (`GeoPoint`, `Waypoint`) and great-circle helpers
//! - Clocks reporting Unix-epoch milliseconds (`SystemClock`, `TokioClock`)
//! - The delayed-delivery `Scheduler` contract with a Tokio implementation
//!   and a virtual-clock implementation for deterministic tests
//! - Structured logging initialization and TOML configuration loading

#![warn(missing_docs)]

pub mod address;
pub mod clock;
pub mod config;
pub mod error;
pub mod geo;
pub mod logging;
pub mod scheduler;

pub use address::Address;
pub use clock::{Clock, SystemClock, Timestamp, TokioClock};
pub use error::{CoreError, Result};
pub use geo::{GeoPoint, Waypoint};
pub use logging::LogFormat;
pub use scheduler::{ManualScheduler, Scheduler, TokioScheduler};
