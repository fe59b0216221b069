//! Plan errors

use thiserror::Error;

use crate::state::PlanState;

/// Plan construction and transition errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlanError {
    /// Plan name does not match any known plan type
    #[error("Unknown plan type: {0}")]
    UnknownPlanType(String),

    /// Plan parameters could not be turned into a plan
    #[error("Invalid parameters for {plan}: {reason}")]
    InvalidParams {
        /// Plan type name
        plan: String,
        /// What was wrong
        reason: String,
    },

    /// State does not exist in this plan type
    #[error("{plan} has no state {state}")]
    InvalidState {
        /// Plan type name
        plan: String,
        /// Requested state
        state: PlanState,
    },
}

/// Result type for plan operations
pub type Result<T> = std::result::Result<T, PlanError>;
