//! Delivery errors

use sortie_core::Address;
use thiserror::Error;

/// Message delivery errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// No mailbox is bound to the address
    #[error("Address unreachable: {0}")]
    Unreachable(Address),

    /// No reply arrived in time
    #[error("Call to {0} timed out")]
    Timeout(Address),

    /// The receiver went away before answering
    #[error("Mailbox of {0} closed")]
    Closed(Address),

    /// Another mailbox is already bound to the address
    #[error("Address already bound: {0}")]
    AddressInUse(Address),

    /// Message did not expect a reply
    #[error("No reply expected by {0}")]
    NoReplyExpected(Address),
}

/// Result type for delivery operations
pub type Result<T> = std::result::Result<T, DeliveryError>;
