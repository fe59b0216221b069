//! Sortie Coordinator
//!
//! The actors that match resources to tasks and execute the result.
//!
//! This crate provides:
//! - `ResourceAgent`: evaluates task broadcasts and bids, accepts or declines
//!   assignments, and drives its plan leg by leg along routed tracks
//! - `RequesterAgent`: publishes tasks, collects bids for a window, assigns
//!   the best bidder and falls back to the next one on decline
//! - `FleetView`: bounded status snapshot of every resource under a tag
//! - `Fleet`: wiring of bus, directory, routing and clock for a set of agents
//!
//! Every agent is a single Tokio task handling one message at a time. Waits
//! (bid windows, travel, dwell) are scheduled deliveries to the agent's own
//! mailbox, never sleeps inside a handler.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod fleet;
pub mod protocol;
pub mod requester;
pub mod resource;
pub mod status;

pub use config::{RequesterConfig, ResourceConfig};
pub use error::{CoordinatorError, Result};
pub use fleet::{Fleet, FleetSnapshot, FleetView};
pub use protocol::{Assignment, AssignmentReply, DeclineReason, Message};
pub use requester::{EscalationReason, RequesterAgent, RequesterEvent, RequesterHandle};
pub use resource::{DeploymentState, ResourceAgent};
pub use status::ResourceStatus;
