//! Node configuration file.

use anyhow::{Context, Result};
use serde::Deserialize;
use sortie_core::LogFormat;
use sortie_coordinator::{RequesterConfig, ResourceConfig};
use sortie_track::StraightLineRouter;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub node: NodeSection,
    #[serde(default)]
    pub requester: RequesterConfig,
    #[serde(default)]
    pub routing: RoutingSection,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeSection {
    pub id: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Address status snapshots and operator commands are sent from
    #[serde(default = "default_operator")]
    pub operator: String,
}

fn default_operator() -> String {
    "operator".to_string()
}

/// Simulated travel
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingSection {
    #[serde(default = "default_speed_mps")]
    pub speed_mps: f64,
    #[serde(default = "default_fix_interval_ms")]
    pub fix_interval_ms: u64,
    pub max_range_m: Option<f64>,
}

fn default_speed_mps() -> f64 {
    13.9
}

fn default_fix_interval_ms() -> u64 {
    5_000
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            speed_mps: default_speed_mps(),
            fix_interval_ms: default_fix_interval_ms(),
            max_range_m: None,
        }
    }
}

impl RoutingSection {
    pub fn router(&self) -> StraightLineRouter {
        let router = StraightLineRouter::new(self.speed_mps).with_fix_interval(self.fix_interval_ms);
        match self.max_range_m {
            Some(range) => router.with_max_range(range),
            None => router,
        }
    }
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config: NodeConfig = sortie_core::config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.node.id.trim().is_empty(), "node id must not be empty");
        anyhow::ensure!(
            self.routing.speed_mps > 0.0,
            "routing speed must be positive, got {}",
            self.routing.speed_mps
        );
        self.requester.validate()?;
        for resource in &self.resources {
            resource
                .validate()
                .with_context(|| format!("resource {}", resource.name))?;
        }
        Ok(())
    }
}
