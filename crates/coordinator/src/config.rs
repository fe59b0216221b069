//! Agent configuration

use serde::{Deserialize, Serialize};
use sortie_core::{Address, GeoPoint};
use sortie_plans::{EvacTiming, PlanType};

use crate::error::{CoordinatorError, Result};

/// Directory tag every resource registers under by default
pub const DEFAULT_RESOURCE_TAG: &str = "resources";

/// Resource agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource name, also its bus address
    pub name: String,

    /// Resource type tasks may require (e.g. "ambulance")
    pub resource_type: String,

    /// Directory tags to register under
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,

    /// Plan types this resource can run
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<String>,

    /// Starting position
    pub home: GeoPoint,

    /// Upper bound of the random delay added to bid etas
    #[serde(default = "default_bid_jitter_ms")]
    pub bid_jitter_ms: u64,

    /// Evacuation dwell times
    #[serde(default)]
    pub evac: EvacTiming,
}

fn default_tags() -> Vec<String> {
    vec![DEFAULT_RESOURCE_TAG.to_string()]
}

fn default_capabilities() -> Vec<String> {
    [PlanType::Goto, PlanType::GotoAndStay, PlanType::RoadBlock, PlanType::Evac]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_bid_jitter_ms() -> u64 {
    2_000
}

impl ResourceConfig {
    /// Resource at `home` with default tags, capabilities and timings
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>, home: GeoPoint) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            tags: default_tags(),
            capabilities: default_capabilities(),
            home,
            bid_jitter_ms: default_bid_jitter_ms(),
            evac: EvacTiming::default(),
        }
    }

    /// Restrict the plan types this resource bids for
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Set the bid jitter bound
    pub fn with_bid_jitter(mut self, bid_jitter_ms: u64) -> Self {
        self.bid_jitter_ms = bid_jitter_ms;
        self
    }

    /// Bus address of the resource
    pub fn address(&self) -> Address {
        Address::new(self.name.clone())
    }

    /// Whether the resource can run plans named `plan`
    pub fn can_run(&self, plan: &str) -> bool {
        self.capabilities.iter().any(|c| c == plan)
    }

    /// Check names and capabilities
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoordinatorError::InvalidConfig(
                "resource name must not be empty".to_string(),
            ));
        }
        for capability in &self.capabilities {
            capability.parse::<PlanType>()?;
        }
        Ok(())
    }
}

/// Requester agent configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterConfig {
    /// Requester name, also its bus address
    #[serde(default = "default_requester_name")]
    pub name: String,

    /// Directory tag of the resources tasks are broadcast to
    #[serde(default = "default_candidate_tag")]
    pub candidate_tag: String,

    /// How long bids are collected before deciding
    #[serde(default = "default_bid_window_ms")]
    pub bid_window_ms: u64,

    /// How long a resource may take to answer an assignment
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
}

fn default_requester_name() -> String {
    "requester".to_string()
}

fn default_candidate_tag() -> String {
    DEFAULT_RESOURCE_TAG.to_string()
}

fn default_bid_window_ms() -> u64 {
    10_000
}

fn default_reply_timeout_ms() -> u64 {
    30_000
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self {
            name: default_requester_name(),
            candidate_tag: default_candidate_tag(),
            bid_window_ms: default_bid_window_ms(),
            reply_timeout_ms: default_reply_timeout_ms(),
        }
    }
}

impl RequesterConfig {
    /// Bus address of the requester
    pub fn address(&self) -> Address {
        Address::new(self.name.clone())
    }

    /// Check names and timeouts
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoordinatorError::InvalidConfig(
                "requester name must not be empty".to_string(),
            ));
        }
        if self.bid_window_ms == 0 || self.reply_timeout_ms == 0 {
            return Err(CoordinatorError::InvalidConfig(
                "bid window and reply timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
