//! Messages exchanged between requesters, resources and observers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sortie_auction::Task;
use sortie_core::{GeoPoint, Timestamp, Waypoint};
use std::fmt;

use crate::status::ResourceStatus;

/// Bus message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum Message {
    /// A task looking for bids
    TaskBroadcast(Task),

    /// Offer to take a task; the bidder is the sender
    #[serde(rename_all = "camelCase")]
    Bid {
        /// Task bid for
        task_id: String,
        /// Estimated arrival time
        eta: Timestamp,
    },

    /// Direct order to run a plan
    Assignment(Assignment),

    /// Answer to a correlated assignment
    AssignmentReply(AssignmentReply),

    /// Drop the current plan
    Stop,

    /// Restart the current plan from its first leg
    Repeat,

    /// Place an idle resource somewhere else
    Relocate {
        /// New static position
        position: GeoPoint,
    },

    /// Ask for a status report
    StatusRequest,

    /// Status report
    Status(Box<ResourceStatus>),
}

impl Message {
    /// Method name, for logs
    pub fn method(&self) -> &'static str {
        match self {
            Message::TaskBroadcast(_) => "taskBroadcast",
            Message::Bid { .. } => "bid",
            Message::Assignment(_) => "assignment",
            Message::AssignmentReply(_) => "assignmentReply",
            Message::Stop => "stop",
            Message::Repeat => "repeat",
            Message::Relocate { .. } => "relocate",
            Message::StatusRequest => "statusRequest",
            Message::Status(_) => "status",
        }
    }
}

/// Order to run a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Task being placed, if the order comes from an auction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    /// Plan type name
    pub plan: String,

    /// Plan parameters
    #[serde(default)]
    pub params: Value,

    /// Task location, used when the parameters name no goal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Waypoint>,

    /// Restart the plan when it finishes instead of stopping
    #[serde(default)]
    pub repeat: bool,

    /// When present the resource answers accept/decline before acting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl Assignment {
    /// Uncorrelated order for `plan`
    pub fn new(plan: impl Into<String>, params: Value) -> Self {
        Self {
            task_id: None,
            plan: plan.into(),
            params,
            target: None,
            repeat: false,
            correlation_id: None,
        }
    }

    /// Place the order on behalf of an auctioned task
    pub fn for_task(task: &Task, correlation_id: impl Into<String>) -> Self {
        Self {
            task_id: Some(task.id.clone()),
            plan: task.plan.clone(),
            params: task.params.clone(),
            target: Some(task.target.clone()),
            repeat: false,
            correlation_id: Some(correlation_id.into()),
        }
    }

    /// Travel goal used when the parameters name none
    pub fn with_target(mut self, target: Waypoint) -> Self {
        self.target = Some(target);
        self
    }

    /// Restart instead of stopping when finished
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Ask for an explicit accept/decline
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Why a resource refused an assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum DeclineReason {
    /// Already running an unfinished plan
    Busy,
    /// Plan type unknown or parameters unusable
    InvalidPlan(String),
    /// Resource could not be reached or did not answer in time
    Unreachable(String),
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclineReason::Busy => f.write_str("busy"),
            DeclineReason::InvalidPlan(detail) => write!(f, "invalid plan: {}", detail),
            DeclineReason::Unreachable(detail) => write!(f, "unreachable: {}", detail),
        }
    }
}

/// Accept/decline answer to a correlated assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentReply {
    /// Task the assignment was for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    /// Correlation id of the assignment
    pub correlation_id: String,

    /// Whether the plan was started
    pub accepted: bool,

    /// Reason for a decline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DeclineReason>,
}

impl AssignmentReply {
    /// Acceptance of `assignment`
    pub fn accept(assignment: &Assignment, correlation_id: &str) -> Self {
        Self {
            task_id: assignment.task_id.clone(),
            correlation_id: correlation_id.to_string(),
            accepted: true,
            reason: None,
        }
    }

    /// Refusal of `assignment`
    pub fn decline(assignment: &Assignment, correlation_id: &str, reason: DeclineReason) -> Self {
        Self {
            task_id: assignment.task_id.clone(),
            correlation_id: correlation_id.to_string(),
            accepted: false,
            reason: Some(reason),
        }
    }
}
