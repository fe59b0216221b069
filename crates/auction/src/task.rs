//! Field tasks

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sortie_core::{Address, Timestamp, Waypoint};

/// A field task looking for a resource.
///
/// Immutable once broadcast; only its auction's candidate set changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Opaque task identifier
    pub id: String,

    /// Where the task takes place
    pub target: Waypoint,

    /// Work must start before this time (Unix epoch milliseconds)
    pub deadline_ms: Timestamp,

    /// Required resource type, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,

    /// Plan type the winner will run
    pub plan: String,

    /// Plan parameters, passed through to the winner
    #[serde(default)]
    pub params: Value,

    /// Who collects the bids
    pub report_to: Address,
}

impl Task {
    /// Create a task with a fresh identifier
    pub fn new(
        target: Waypoint,
        deadline_ms: Timestamp,
        plan: impl Into<String>,
        report_to: Address,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            target,
            deadline_ms,
            resource_type: None,
            plan: plan.into(),
            params: Value::Null,
            report_to,
        }
    }

    /// Use an explicit identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Require a resource type
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    /// Attach plan parameters
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Whether a resource of `resource_type` may bid
    pub fn accepts_type(&self, resource_type: &str) -> bool {
        self.resource_type
            .as_deref()
            .map_or(true, |required| required == resource_type)
    }

    /// Whether an arrival at `eta` makes the deadline
    pub fn is_reachable_by(&self, eta: Timestamp) -> bool {
        eta < self.deadline_ms
    }
}
