//! Sortie node.
//!
//! Boots a simulated fleet and a requester on one in-process bus, then reads
//! commands as JSON lines on stdin:
//!
//! ```text
//! {"command":"task","target":{"lat":51.92,"lon":4.48},"deadlineInMs":900000,"plan":"Goto"}
//! {"command":"snapshot"}
//! {"command":"stop","resource":"amb-1"}
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sortie_auction::Task;
use sortie_core::{logging, Address, Clock, TokioClock, Waypoint};
use sortie_coordinator::{Assignment, Fleet, Message, RequesterEvent, RequesterHandle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

mod config;

use config::NodeConfig;

const NODE_PROTOCOL_VERSION: u32 = 1;
const NODE_RUNTIME_VERSION: u32 = 1;
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct NodeVersionHandshake {
    version: &'static str,
    runtime_version: u32,
    protocol_version: u32,
}

/// One stdin line
#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
enum Command {
    #[serde(rename_all = "camelCase")]
    Task {
        target: Waypoint,
        deadline_in_ms: u64,
        plan: String,
        #[serde(default)]
        params: Value,
        resource_type: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Cancel { task_id: String },
    #[serde(rename_all = "camelCase")]
    Assign {
        resource: String,
        assignment: Assignment,
    },
    Stop { resource: String },
    Repeat { resource: String },
    Snapshot {
        #[serde(default = "default_snapshot_tag")]
        tag: String,
    },
}

fn default_snapshot_tag() -> String {
    sortie_coordinator::config::DEFAULT_RESOURCE_TAG.to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--version-json") {
        let handshake = NodeVersionHandshake {
            version: env!("CARGO_PKG_VERSION"),
            runtime_version: NODE_RUNTIME_VERSION,
            protocol_version: NODE_PROTOCOL_VERSION,
        };
        println!("{}", serde_json::to_string(&handshake)?);
        return Ok(());
    }

    let config_path = parse_config_path(&args)?;
    let config = NodeConfig::load(&config_path)?;
    logging::init_with(config.node.log_format);

    info!(
        node_id = %config.node.id,
        resources = config.resources.len(),
        speed_mps = config.routing.speed_mps,
        "Sortie node starting"
    );

    let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
    let mut fleet = Fleet::new(Arc::new(config.routing.router()), Arc::clone(&clock));
    for resource in config.resources.clone() {
        fleet.spawn_resource(resource)?;
    }
    let requester = fleet.spawn_requester(config.requester.clone())?;
    tokio::spawn(log_events(requester.subscribe()));

    let operator = Address::new(config.node.operator.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("failed to read stdin")? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    if let Err(e) = handle_line(&fleet, &requester, &operator, clock.as_ref(), &line).await {
                        warn!(error = %format!("{:#}", e), "Command rejected");
                    }
                }
                None => {
                    info!("stdin closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    fleet.shutdown().await;
    info!(node_id = %config.node.id, "Sortie node stopped");
    Ok(())
}

async fn handle_line(
    fleet: &Fleet,
    requester: &RequesterHandle,
    operator: &Address,
    clock: &dyn Clock,
    line: &str,
) -> Result<()> {
    let command: Command = serde_json::from_str(line).context("malformed command")?;

    match command {
        Command::Task {
            target,
            deadline_in_ms,
            plan,
            params,
            resource_type,
        } => {
            let mut task = Task::new(
                target,
                clock.now_ms() + deadline_in_ms,
                plan,
                requester.address().clone(),
            )
            .with_params(params);
            if let Some(resource_type) = resource_type {
                task = task.with_resource_type(resource_type);
            }
            let task_id = requester.publish(task)?;
            println!("{}", serde_json::json!({ "taskId": task_id }));
        }
        Command::Cancel { task_id } => requester.cancel(task_id)?,
        Command::Assign {
            resource,
            assignment,
        } => {
            fleet
                .send(operator, &Address::new(resource), Message::Assignment(assignment))
                .await?
        }
        Command::Stop { resource } => {
            fleet.send(operator, &Address::new(resource), Message::Stop).await?
        }
        Command::Repeat { resource } => {
            fleet.send(operator, &Address::new(resource), Message::Repeat).await?
        }
        Command::Snapshot { tag } => {
            let snapshot = fleet
                .view(operator.clone())
                .snapshot(&tag, SNAPSHOT_TIMEOUT)
                .await;
            println!("{}", serde_json::to_string(&snapshot)?);
        }
    }
    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<RequesterEvent>) {
    loop {
        match events.recv().await {
            Ok(RequesterEvent::Escalated { task_id, reason }) => {
                error!(task_id = %task_id, ?reason, "Task needs a supervisor");
            }
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => println!("{}", json),
                Err(e) => warn!(error = %e, "Failed to encode event"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event feed lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn parse_config_path(args: &[String]) -> Result<PathBuf> {
    let mut args_iter = args.iter();
    while let Some(arg) = args_iter.next() {
        if arg == "--config" {
            if let Some(path) = args_iter.next() {
                return Ok(PathBuf::from(path));
            }
            bail!("--config was provided without a path");
        }
    }

    bail!("missing required --config <path> argument")
}
