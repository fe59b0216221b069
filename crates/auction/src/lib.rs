//! Sortie Auction
//!
//! This crate provides:
//! - `Task`: an immutable field task broadcast to candidate resources
//! - `Bid`: one resource's estimated arrival time for a task
//! - `TaskAuction`: the ranked candidate set a requester picks winners from,
//!   with deterministic fallback when a chosen resource declines

#![warn(missing_docs)]

pub mod auction;
pub mod error;
pub mod task;

pub use auction::{Bid, TaskAuction};
pub use error::{AuctionError, Result};
pub use task::Task;
