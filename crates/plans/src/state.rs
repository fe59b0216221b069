//! Plan states, events and trigger requests

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every state a plan can be in, across all plan types.
///
/// Each plan type uses a subset; triggers are registered against these names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanState {
    /// Not started
    Init,
    /// Traveling towards the goal
    Travel,
    /// Holding the goal location
    Stay,
    /// Traveling to the pickup point
    ToPickup,
    /// Dwelling at the pickup point
    Pickup,
    /// Traveling to the drop-off point
    ToDropOff,
    /// Dwelling at the drop-off point
    DropOff,
    /// Terminal state
    Finished,
}

impl PlanState {
    /// Wire name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanState::Init => "init",
            PlanState::Travel => "travel",
            PlanState::Stay => "stay",
            PlanState::ToPickup => "toPickup",
            PlanState::Pickup => "pickup",
            PlanState::ToDropOff => "toDropOff",
            PlanState::DropOff => "dropOff",
            PlanState::Finished => "finished",
        }
    }
}

impl fmt::Display for PlanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to a plan's transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanEvent {
    /// The resource reached the current target
    Arrival,
    /// Explicit entry into a state (scheduled dwell expiry or external request)
    Enter(PlanState),
}

/// Side-effecting request dispatched through the scheduler on state entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", content = "state", rename_all = "camelCase")]
pub enum Trigger {
    /// Route to the plan's new target
    PlanNextLeg,
    /// Restart the plan from `init`
    Repeat,
    /// Drop the plan and become available again
    Stop,
    /// Enter a plan state
    StateChange(PlanState),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_wire_names() {
        assert_eq!(
            serde_json::to_string(&PlanState::ToDropOff).unwrap(),
            "\"toDropOff\""
        );
        let parsed: PlanState = serde_json::from_str("\"pickup\"").unwrap();
        assert_eq!(parsed, PlanState::Pickup);
        assert_eq!(PlanState::Finished.to_string(), "finished");
    }

    #[test]
    fn test_trigger_serialization() {
        let json = serde_json::to_value(Trigger::StateChange(PlanState::Finished)).unwrap();
        assert_eq!(json["request"], "stateChange");
        assert_eq!(json["state"], "finished");
    }
}
