//! Auction errors

use sortie_core::{Address, Timestamp};
use thiserror::Error;

/// Auction errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuctionError {
    /// Bid would arrive at or after the task deadline
    #[error("Bid from {bidder} (eta {eta}) misses deadline {deadline}")]
    PastDeadline {
        /// Bidder
        bidder: Address,
        /// Offered eta
        eta: Timestamp,
        /// Task deadline
        deadline: Timestamp,
    },

    /// No open auction for the task
    #[error("No open auction for task {0}")]
    UnknownTask(String),
}

/// Result type for auction operations
pub type Result<T> = std::result::Result<T, AuctionError>;
