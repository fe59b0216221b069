//! Fleet wiring and status snapshots.
//!
//! [`Fleet`] owns the shared bus, directory, routing service and clock, and
//! spawns agents bound to them. [`FleetView`] asks every resource under a tag
//! for its status in one bounded round.

use serde::Serialize;
use sortie_core::{Address, Clock};
use sortie_fabric::{gather, Directory, LocalBus, Transport};
use sortie_track::RoutingService;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{RequesterConfig, ResourceConfig};
use crate::error::Result;
use crate::protocol::Message;
use crate::requester::{RequesterAgent, RequesterHandle};
use crate::resource::ResourceAgent;
use crate::status::ResourceStatus;

/// Statuses collected in one round
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSnapshot {
    /// Reports that arrived in time, sorted by resource name
    pub statuses: Vec<ResourceStatus>,
    /// Resources that did not answer
    pub missing: Vec<Address>,
}

impl FleetSnapshot {
    /// Status of one resource, if it answered
    pub fn get(&self, name: &str) -> Option<&ResourceStatus> {
        self.statuses.iter().find(|s| s.name == name)
    }
}

/// Observer querying resource statuses
#[derive(Clone)]
pub struct FleetView {
    address: Address,
    transport: Arc<dyn Transport<Message>>,
    directory: Arc<Directory>,
}

impl FleetView {
    /// Observer sending from `address`
    pub fn new(
        address: Address,
        transport: Arc<dyn Transport<Message>>,
        directory: Arc<Directory>,
    ) -> Self {
        Self {
            address,
            transport,
            directory,
        }
    }

    /// Ask every resource under `tag` for its status, waiting at most `timeout`
    pub async fn snapshot(&self, tag: &str, timeout: Duration) -> FleetSnapshot {
        let targets = self.directory.list_by_tag(tag);
        let gathered = gather(
            self.transport.as_ref(),
            &self.address,
            &targets,
            Message::StatusRequest,
            timeout,
        )
        .await;

        let mut snapshot = FleetSnapshot::default();
        for (address, reply) in gathered.replies {
            match reply {
                Message::Status(status) => snapshot.statuses.push(*status),
                other => {
                    warn!(resource = %address, method = other.method(), "Unexpected status reply");
                    snapshot.missing.push(address);
                }
            }
        }
        snapshot
            .missing
            .extend(gathered.failures.into_iter().map(|(address, _)| address));
        snapshot.statuses.sort_by(|a, b| a.name.cmp(&b.name));
        snapshot.missing.sort();
        snapshot
    }
}

/// A set of agents sharing one bus
pub struct Fleet {
    bus: Arc<LocalBus<Message>>,
    directory: Arc<Directory>,
    routing: Arc<dyn RoutingService>,
    clock: Arc<dyn Clock>,
    agents: Vec<(Address, JoinHandle<()>)>,
}

impl Fleet {
    /// Empty fleet over a fresh bus and directory
    pub fn new(routing: Arc<dyn RoutingService>, clock: Arc<dyn Clock>) -> Self {
        Self {
            bus: Arc::new(LocalBus::new()),
            directory: Arc::new(Directory::new()),
            routing,
            clock,
            agents: Vec::new(),
        }
    }

    /// Shared bus
    pub fn bus(&self) -> Arc<LocalBus<Message>> {
        Arc::clone(&self.bus)
    }

    /// Shared directory
    pub fn directory(&self) -> Arc<Directory> {
        Arc::clone(&self.directory)
    }

    /// Bind, register and start a resource agent
    pub fn spawn_resource(&mut self, config: ResourceConfig) -> Result<Address> {
        config.validate()?;
        let address = config.address();
        let inbox = self.bus.bind(address.clone())?;
        for tag in &config.tags {
            self.directory.register(address.clone(), tag.clone());
        }

        let agent = ResourceAgent::new(
            config,
            inbox,
            self.bus.clone(),
            Arc::clone(&self.routing),
            Arc::clone(&self.clock),
        );
        self.agents.push((address.clone(), agent.spawn()));
        info!(resource = %address, "Resource joined fleet");
        Ok(address)
    }

    /// Bind and start a requester agent
    pub fn spawn_requester(&mut self, config: RequesterConfig) -> Result<RequesterHandle> {
        config.validate()?;
        let address = config.address();
        let inbox = self.bus.bind(address.clone())?;

        let agent = RequesterAgent::new(
            config,
            inbox,
            self.bus.clone(),
            Arc::clone(&self.directory),
            Arc::clone(&self.clock),
        );
        let (handle, join) = agent.spawn();
        self.agents.push((address, join));
        Ok(handle)
    }

    /// Status observer sending from `address`
    pub fn view(&self, address: impl Into<Address>) -> FleetView {
        FleetView::new(address.into(), self.bus.clone(), Arc::clone(&self.directory))
    }

    /// Send a one-way command to an agent
    pub async fn send(&self, from: &Address, to: &Address, message: Message) -> Result<()> {
        self.bus.send(from, to, message).await?;
        Ok(())
    }

    /// Addresses of the running agents
    pub fn agents(&self) -> Vec<Address> {
        self.agents.iter().map(|(address, _)| address.clone()).collect()
    }

    /// Close every agent's mailbox and wait for it to stop
    pub async fn shutdown(self) {
        for (address, _) in &self.agents {
            self.directory.unregister(address);
            self.bus.unbind(address);
        }
        for (address, join) in self.agents {
            if let Err(e) = join.await {
                warn!(agent = %address, error = %e, "Agent task failed");
            }
        }
        info!("Fleet shut down");
    }
}
