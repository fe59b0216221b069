//! Sortie Plans
//!
//! Per-assignment state machines that drive a resource through the legs of a
//! task.
//!
//! This crate provides:
//! - `Plan`: trigger registration and scheduled state entry shared by all
//!   plan types
//! - `Goto`, `GotoAndStay` (and its `RoadBlock` preset), `Evac`: the concrete
//!   plan variants, each with an explicit transition table
//! - Plan construction from an assignment's plan name and opaque parameters

#![warn(missing_docs)]

pub mod error;
pub mod evac;
pub mod goto;
pub mod plan;
pub mod request;
pub mod state;

pub use error::{PlanError, Result};
pub use evac::{Evac, EvacState, EvacTiming};
pub use goto::{Goto, GotoAndStay, GotoAndStayState, GotoState};
pub use plan::{Plan, PlanKind};
pub use request::PlanType;
pub use state::{PlanEvent, PlanState, Trigger};
