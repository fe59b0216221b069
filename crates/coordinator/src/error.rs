//! Coordinator errors

use sortie_auction::AuctionError;
use sortie_core::Address;
use sortie_fabric::DeliveryError;
use sortie_plans::PlanError;
use thiserror::Error;

/// Coordinator errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoordinatorError {
    /// Message delivery failed
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Plan could not be built or advanced
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// Auction bookkeeping failed
    #[error("Auction error: {0}")]
    Auction(#[from] AuctionError),

    /// Agent is no longer running
    #[error("Agent {0} stopped")]
    AgentStopped(Address),

    /// Configuration values are inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;
