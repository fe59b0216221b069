//! End-to-end scenarios for the sortie fleet
//!
//! This test suite validates:
//! - Task auctions: bidding, best-bid assignment, decline fallback, escalation
//! - Plan execution on resources after placement (Goto, RoadBlock, Evac)
//! - Operator commands (stop, repeat, relocate) against running resources
//! - Fleet status snapshots with silent resources

pub mod test_utils;

#[cfg(test)]
mod auction_flow_tests;

#[cfg(test)]
mod plan_execution_tests;

#[cfg(test)]
mod fleet_snapshot_tests;
