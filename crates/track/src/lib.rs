//! Sortie Track - where is a resource between two fixes?
//!
//! This crate provides:
//! - `RouteTrack`: a time-anchored sequence of position fixes that answers
//!   "where am I at time T" by linear interpolation and "am I there yet"
//! - `RoutingService`: the contract of the external routing engine that turns
//!   an origin/destination pair into a timestamped polyline
//! - `StraightLineRouter`: a great-circle travel simulator implementing
//!   `RoutingService` for simulations and tests

#![warn(missing_docs)]

pub mod routing;
pub mod track;

pub use routing::{ComputedRoute, RoutingError, RoutingService, StraightLineRouter, TrackPoint};
pub use track::{RouteTrack, TrackError};
