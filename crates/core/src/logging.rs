//! Process-wide logging setup.
//!
//! The node picks the output format from its `[node] log_format` setting;
//! libraries only emit `tracing` events and never install a subscriber.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the log stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human readable, one line per event
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Filter used when `RUST_LOG` is unset: sortie crates at `info`,
/// everything else at `warn`.
pub const DEFAULT_DIRECTIVES: &str = "warn,sortie_core=info,sortie_track=info,sortie_plans=info,\
sortie_auction=info,sortie_fabric=info,sortie_coordinator=info,sortie_node=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install the global subscriber for a sortie process.
///
/// Agents log with `resource`, `requester` and `task_id` fields, so the JSON
/// format is the one to feed into anything that groups events per task. Set
/// `RUST_LOG=sortie_coordinator=debug` to follow every delivery an agent drops
/// as stale.
///
/// # Example
/// ```no_run
/// use sortie_core::{logging, LogFormat};
///
/// logging::init_with(LogFormat::Json);
/// tracing::info!(resource = "amb-1", task_id = "task-1", "Starting plan");
/// ```
pub fn init_with(format: LogFormat) {
    let registry = tracing_subscriber::registry().with(env_filter());
    match format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_current_span(false))
            .init(),
    }
}
