//! Resource status reports

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sortie_core::{Address, GeoPoint, Timestamp, Waypoint};

use crate::resource::DeploymentState;

/// Snapshot of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    /// Resource name
    pub name: String,

    /// Bus address
    pub address: Address,

    /// Resource type
    pub resource_type: String,

    /// Deployment state
    pub deployment: DeploymentState,

    /// Interpolated position at report time
    pub position: GeoPoint,

    /// Destination of the active leg
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<Waypoint>,

    /// Arrival time of the active leg
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_ms: Option<Timestamp>,

    /// Arrival time, RFC 3339
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,

    /// Arrival time, wall clock `HH:MM:SS` (UTC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_clock: Option<String>,

    /// Assigned task id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    /// "plan title (current step)"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,

    /// Plan state name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_status: Option<String>,

    /// Points of interest of the plan
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<String>,

    /// Fixes still ahead on the active route
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub route_ahead: Vec<GeoPoint>,

    /// Report time
    pub reported_at: Timestamp,
}

impl ResourceStatus {
    /// Fill the rendered eta fields from `eta_ms`
    pub fn with_eta(mut self, eta_ms: Timestamp) -> Self {
        self.eta_ms = Some(eta_ms);
        if let Some(at) = Utc.timestamp_millis_opt(eta_ms as i64).single() {
            self.eta = Some(at.to_rfc3339());
            self.eta_clock = Some(at.format("%H:%M:%S").to_string());
        }
        self
    }

    /// Whether the resource is free to bid
    pub fn is_available(&self) -> bool {
        self.deployment == DeploymentState::Unassigned
    }
}
