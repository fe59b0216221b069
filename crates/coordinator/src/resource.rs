//! Resource agent.
//!
//! One Tokio task per resource. It reacts to bus messages (task broadcasts,
//! assignments, stop/repeat/relocate, status requests) and to deliveries on
//! its own mailbox: plan triggers, arrival checks and route results.
//!
//! Every scheduled or spawned delivery carries the plan epoch it was issued
//! under; stopping or replacing the plan bumps the epoch so late deliveries
//! are dropped. Route results additionally carry a leg number, and at most
//! one route request is outstanding at a time.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sortie_auction::Task;
use sortie_core::{Address, Clock, GeoPoint, Scheduler, Timestamp, TokioScheduler, Waypoint};
use sortie_fabric::{Envelope, Reply, Transport};
use sortie_plans::{Plan, PlanState, Trigger};
use sortie_track::{ComputedRoute, RouteTrack, RoutingError, RoutingService};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ResourceConfig;
use crate::protocol::{Assignment, AssignmentReply, DeclineReason, Message};
use crate::status::ResourceStatus;

/// High-level availability of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeploymentState {
    /// Free; the only state in which the resource bids
    #[default]
    Unassigned,
    /// Reserved for a task but not yet moving
    Assigned,
    /// Running a plan
    Active,
    /// Taken out of service
    Withdrawn,
    /// Standing by at a post
    Post,
}

/// Deliveries to the agent's own mailbox
#[derive(Debug)]
enum Mail {
    Trigger {
        epoch: u64,
        trigger: Trigger,
    },
    CheckArrival {
        epoch: u64,
        leg: u64,
    },
    RouteReady {
        epoch: u64,
        leg: u64,
        anchor_ms: Timestamp,
        result: Result<ComputedRoute, RoutingError>,
    },
    EstimateReady {
        task: Task,
        anchor_ms: Timestamp,
        result: Result<ComputedRoute, RoutingError>,
    },
}

/// Tags plan triggers with the epoch they were issued under
struct PlanScheduler<'a> {
    inner: &'a TokioScheduler<Mail>,
    epoch: u64,
}

impl Scheduler<Trigger> for PlanScheduler<'_> {
    fn now_ms(&self) -> Timestamp {
        self.inner.now_ms()
    }

    fn after(&self, delay_ms: u64, trigger: Trigger) {
        self.inner.after(
            delay_ms,
            Mail::Trigger {
                epoch: self.epoch,
                trigger,
            },
        );
    }
}

/// A simulated fleet resource
pub struct ResourceAgent {
    config: ResourceConfig,
    address: Address,
    transport: Arc<dyn Transport<Message>>,
    routing: Arc<dyn RoutingService>,
    clock: Arc<dyn Clock>,
    scheduler: TokioScheduler<Mail>,
    mail_tx: mpsc::UnboundedSender<Mail>,
    mailbox: mpsc::UnboundedReceiver<Mail>,
    inbox: mpsc::UnboundedReceiver<Envelope<Message>>,

    deployment: DeploymentState,
    plan: Option<Plan>,
    task_id: Option<String>,
    track: RouteTrack,
    goal: Option<Waypoint>,
    epoch: u64,
    leg: u64,
    route_pending: bool,
    leg_queued: bool,
}

impl ResourceAgent {
    /// Create an agent reading bus messages from `inbox`
    pub fn new(
        config: ResourceConfig,
        inbox: mpsc::UnboundedReceiver<Envelope<Message>>,
        transport: Arc<dyn Transport<Message>>,
        routing: Arc<dyn RoutingService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (mail_tx, mailbox) = mpsc::unbounded_channel();
        let scheduler = TokioScheduler::new(mail_tx.clone(), Arc::clone(&clock));
        let track = RouteTrack::stationary(config.home);

        Self {
            address: config.address(),
            config,
            transport,
            routing,
            clock,
            scheduler,
            mail_tx,
            mailbox,
            inbox,
            deployment: DeploymentState::Unassigned,
            plan: None,
            task_id: None,
            track,
            goal: None,
            epoch: 0,
            leg: 0,
            route_pending: false,
            leg_queued: false,
        }
    }

    /// Run the agent on its own task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process messages until the bus mailbox closes
    pub async fn run(mut self) {
        info!(resource = %self.address, resource_type = %self.config.resource_type, "Resource agent started");

        loop {
            // Own deliveries first, so bus requests see their effects.
            tokio::select! {
                biased;
                Some(mail) = self.mailbox.recv() => self.handle_mail(mail).await,
                envelope = self.inbox.recv() => match envelope {
                    Some(envelope) => self.handle_envelope(envelope).await,
                    None => break,
                },
            }
        }

        info!(resource = %self.address, "Resource agent stopped");
    }

    async fn handle_envelope(&mut self, envelope: Envelope<Message>) {
        let (from, message, reply) = envelope.into_parts();
        debug!(resource = %self.address, from = %from, method = message.method(), "Message received");

        match message {
            Message::TaskBroadcast(task) => self.on_task_broadcast(task),
            Message::Assignment(assignment) => self.on_assignment(&from, assignment, reply).await,
            Message::Stop => self.stop(),
            Message::Repeat => self.repeat(),
            Message::Relocate { position } => self.relocate(position),
            Message::StatusRequest => {
                let status = Message::Status(Box::new(self.status()));
                self.respond(&from, reply, status).await;
            }
            other => {
                debug!(resource = %self.address, method = other.method(), "Ignoring message");
            }
        }
    }

    async fn handle_mail(&mut self, mail: Mail) {
        match mail {
            Mail::Trigger { epoch, trigger } => {
                if epoch != self.epoch {
                    debug!(resource = %self.address, ?trigger, "Dropping stale trigger");
                    return;
                }
                self.on_trigger(trigger);
            }
            Mail::CheckArrival { epoch, leg } => self.check_arrival(epoch, leg),
            Mail::RouteReady {
                epoch,
                leg,
                anchor_ms,
                result,
            } => self.on_route_ready(epoch, leg, anchor_ms, result),
            Mail::EstimateReady {
                task,
                anchor_ms,
                result,
            } => self.on_estimate_ready(task, anchor_ms, result).await,
        }
    }

    fn on_task_broadcast(&mut self, task: Task) {
        if !task.accepts_type(&self.config.resource_type) {
            debug!(resource = %self.address, task_id = %task.id, "Not bidding: resource type mismatch");
            return;
        }
        if self.deployment != DeploymentState::Unassigned {
            debug!(resource = %self.address, task_id = %task.id, state = ?self.deployment, "Not bidding: not available");
            return;
        }
        if !self.config.can_run(&task.plan) {
            debug!(resource = %self.address, task_id = %task.id, plan = %task.plan, "Not bidding: plan not supported");
            return;
        }

        let now = self.clock.now_ms();
        let from = self.track.position_at(now);
        let to = task.target.position();
        let routing = Arc::clone(&self.routing);
        let tx = self.mail_tx.clone();

        tokio::spawn(async move {
            let result = routing.compute_route(from, to).await;
            let _ = tx.send(Mail::EstimateReady {
                task,
                anchor_ms: now,
                result,
            });
        });
    }

    async fn on_estimate_ready(
        &mut self,
        task: Task,
        anchor_ms: Timestamp,
        result: Result<ComputedRoute, RoutingError>,
    ) {
        let route = match result {
            Ok(route) => route,
            Err(e) => {
                warn!(resource = %self.address, task_id = %task.id, error = %e, "Route estimate failed, not bidding");
                return;
            }
        };

        let eta = route.eta_from(anchor_ms);
        if !task.is_reachable_by(eta) {
            debug!(resource = %self.address, task_id = %task.id, eta, deadline = task.deadline_ms, "Not bidding: cannot make deadline");
            return;
        }
        if self.deployment != DeploymentState::Unassigned {
            debug!(resource = %self.address, task_id = %task.id, "Not bidding: assigned while estimating");
            return;
        }

        let eta = self.jittered(eta, task.deadline_ms);
        let bid = Message::Bid {
            task_id: task.id.clone(),
            eta,
        };
        match self.transport.send(&self.address, &task.report_to, bid).await {
            Ok(()) => info!(resource = %self.address, task_id = %task.id, eta, "Bid submitted"),
            Err(e) => warn!(resource = %self.address, task_id = %task.id, error = %e, "Bid delivery failed"),
        }
    }

    /// Add up to `bid_jitter_ms`, keeping the eta strictly before the deadline
    fn jittered(&self, eta: Timestamp, deadline_ms: Timestamp) -> Timestamp {
        let headroom = deadline_ms.saturating_sub(eta).saturating_sub(1);
        let bound = self.config.bid_jitter_ms.min(headroom);
        if bound == 0 {
            return eta;
        }
        eta + rand::thread_rng().gen_range(0..=bound)
    }

    fn is_busy(&self) -> bool {
        self.plan.as_ref().map_or(false, |plan| !plan.is_finished())
    }

    async fn on_assignment(
        &mut self,
        from: &Address,
        assignment: Assignment,
        reply: Option<Reply<Message>>,
    ) {
        let Some(correlation_id) = assignment.correlation_id.clone() else {
            self.on_direct_assignment(assignment);
            return;
        };

        if self.is_busy() {
            info!(
                resource = %self.address,
                task_id = ?assignment.task_id,
                correlation_id = %correlation_id,
                "Declining assignment: already running a plan"
            );
            let answer = AssignmentReply::decline(&assignment, &correlation_id, DeclineReason::Busy);
            self.respond(from, reply, Message::AssignmentReply(answer)).await;
            return;
        }

        let plan = match self.build_plan(&assignment) {
            Ok(plan) => plan,
            Err(e) => {
                error!(resource = %self.address, plan = %assignment.plan, error = %e, "Declining assignment: invalid plan");
                let reason = DeclineReason::InvalidPlan(e.to_string());
                let answer = AssignmentReply::decline(&assignment, &correlation_id, reason);
                self.respond(from, reply, Message::AssignmentReply(answer)).await;
                return;
            }
        };

        let answer = AssignmentReply::accept(&assignment, &correlation_id);
        self.respond(from, reply, Message::AssignmentReply(answer)).await;
        self.start_plan(plan, assignment.task_id, assignment.repeat);
    }

    /// Uncorrelated orders replace whatever the resource is doing
    fn on_direct_assignment(&mut self, assignment: Assignment) {
        let plan = match self.build_plan(&assignment) {
            Ok(plan) => plan,
            Err(e) => {
                error!(resource = %self.address, plan = %assignment.plan, error = %e, "Rejecting assignment: invalid plan");
                return;
            }
        };
        if self.is_busy() {
            info!(resource = %self.address, task_id = ?self.task_id, "Replacing running plan on direct order");
        }
        self.start_plan(plan, assignment.task_id, assignment.repeat);
    }

    fn build_plan(&self, assignment: &Assignment) -> sortie_plans::Result<Plan> {
        Plan::from_request(
            &assignment.plan,
            &assignment.params,
            assignment.target.as_ref(),
            self.config.evac,
        )
    }

    fn start_plan(&mut self, mut plan: Plan, task_id: Option<String>, repeat: bool) {
        let now = self.clock.now_ms();
        self.epoch += 1;
        self.track.clear(now);
        self.goal = None;
        self.route_pending = false;
        self.leg_queued = false;

        for state in [PlanState::Travel, PlanState::ToPickup, PlanState::ToDropOff] {
            plan.on_state_change(state, Trigger::PlanNextLeg);
        }
        let on_finish = if repeat { Trigger::Repeat } else { Trigger::Stop };
        plan.on_state_change(PlanState::Finished, on_finish);

        info!(resource = %self.address, task_id = ?task_id, plan = plan.name(), repeat, "Starting plan");

        self.deployment = DeploymentState::Active;
        self.task_id = task_id;
        let scheduler = PlanScheduler {
            inner: &self.scheduler,
            epoch: self.epoch,
        };
        plan.arrival(&scheduler);
        self.plan = Some(plan);
    }

    fn on_trigger(&mut self, trigger: Trigger) {
        match trigger {
            Trigger::PlanNextLeg => self.plan_next_leg(),
            Trigger::Stop => self.stop(),
            Trigger::Repeat => self.repeat(),
            Trigger::StateChange(state) => {
                let scheduler = PlanScheduler {
                    inner: &self.scheduler,
                    epoch: self.epoch,
                };
                if let Some(plan) = self.plan.as_mut() {
                    if let Err(e) = plan.do_state_change(state, &scheduler) {
                        error!(resource = %self.address, error = %e, "State change failed");
                    }
                }
            }
        }
    }

    fn plan_next_leg(&mut self) {
        let Some(target) = self.plan.as_ref().and_then(|p| p.target_location()).cloned() else {
            debug!(resource = %self.address, "No travel leg in current state");
            return;
        };
        if self.route_pending {
            self.leg_queued = true;
            return;
        }

        self.leg += 1;
        self.route_pending = true;
        self.goal = Some(target.clone());

        let now = self.clock.now_ms();
        let from = self.track.position_at(now);
        let (epoch, leg) = (self.epoch, self.leg);
        let routing = Arc::clone(&self.routing);
        let tx = self.mail_tx.clone();

        debug!(resource = %self.address, leg, target = ?target.id, "Requesting route");
        tokio::spawn(async move {
            let result = routing.compute_route(from, target.position()).await;
            let _ = tx.send(Mail::RouteReady {
                epoch,
                leg,
                anchor_ms: now,
                result,
            });
        });
    }

    fn on_route_ready(
        &mut self,
        epoch: u64,
        leg: u64,
        anchor_ms: Timestamp,
        result: Result<ComputedRoute, RoutingError>,
    ) {
        if epoch != self.epoch || leg != self.leg {
            debug!(resource = %self.address, epoch, leg, "Dropping stale route");
            return;
        }
        self.route_pending = false;

        if self.leg_queued {
            self.leg_queued = false;
            self.plan_next_leg();
            return;
        }

        let now = self.clock.now_ms();
        let started = result
            .map_err(|e| e.to_string())
            .and_then(|route| self.track.start(route, anchor_ms).map_err(|e| e.to_string()));

        match started {
            Ok(()) => {
                let eta = self.track.eta_time();
                debug!(resource = %self.address, leg, eta, "Route started");
                // A leg that is already over is checked on the next tick, never
                // in the same instant, so a repeating zero-length plan paces itself.
                self.scheduler.at(eta.max(now + 1), Mail::CheckArrival { epoch, leg });
            }
            Err(e) => {
                warn!(resource = %self.address, leg, error = %e, "Routing unavailable, holding position");
                self.track.clear(now);
                self.goal = None;
            }
        }
    }

    fn check_arrival(&mut self, epoch: u64, leg: u64) {
        if epoch != self.epoch || leg != self.leg || self.plan.is_none() {
            debug!(resource = %self.address, epoch, leg, "Dropping stale arrival check");
            return;
        }

        let now = self.clock.now_ms();
        if !self.track.is_arrived(now) {
            let remaining = self.track.eta_time().saturating_sub(now).max(1);
            self.scheduler.after(remaining, Mail::CheckArrival { epoch, leg });
            return;
        }

        self.track.position_at(now);
        self.goal = None;
        let scheduler = PlanScheduler {
            inner: &self.scheduler,
            epoch: self.epoch,
        };
        if let Some(plan) = self.plan.as_mut() {
            if let Some(state) = plan.arrival(&scheduler) {
                info!(resource = %self.address, state = %state, "Arrived");
            }
        }
    }

    /// Drop plan and route; safe to call at any time
    fn stop(&mut self) {
        if self.plan.is_none() && self.deployment == DeploymentState::Unassigned {
            debug!(resource = %self.address, "Already stopped");
            return;
        }

        let now = self.clock.now_ms();
        info!(resource = %self.address, task_id = ?self.task_id, "Stopping");
        self.epoch += 1;
        self.plan = None;
        self.task_id = None;
        self.goal = None;
        self.track.clear(now);
        self.route_pending = false;
        self.leg_queued = false;
        self.deployment = DeploymentState::Unassigned;
    }

    fn repeat(&mut self) {
        if self.plan.is_none() {
            debug!(resource = %self.address, "Nothing to repeat");
            return;
        }

        // Pending dwells and routes belong to the previous run.
        let now = self.clock.now_ms();
        self.epoch += 1;
        self.track.clear(now);
        self.goal = None;
        self.route_pending = false;
        self.leg_queued = false;

        let scheduler = PlanScheduler {
            inner: &self.scheduler,
            epoch: self.epoch,
        };
        if let Some(plan) = self.plan.as_mut() {
            info!(resource = %self.address, plan = plan.name(), "Repeating plan");
            plan.restart(&scheduler);
        }
    }

    fn relocate(&mut self, position: GeoPoint) {
        if self.plan.is_some() {
            warn!(resource = %self.address, "Ignoring relocation while running a plan");
            return;
        }
        self.track.relocate(position, self.clock.now_ms());
        info!(resource = %self.address, lat = position.lat, lon = position.lon, "Relocated");
    }

    fn status(&mut self) -> ResourceStatus {
        let now = self.clock.now_ms();
        let position = self.track.position_at(now);

        let mut status = ResourceStatus {
            name: self.config.name.clone(),
            address: self.address.clone(),
            resource_type: self.config.resource_type.clone(),
            deployment: self.deployment,
            position,
            goal: None,
            eta_ms: None,
            eta: None,
            eta_clock: None,
            task_id: self.task_id.clone(),
            task: None,
            plan_status: None,
            locations: Vec::new(),
            route_ahead: self.track.remaining(now),
            reported_at: now,
        };

        if let Some(plan) = &self.plan {
            status.task = Some(plan.description());
            status.plan_status = Some(plan.status().to_string());
            status.locations = plan.locations();
        }
        if self.track.has_route() {
            if let Some(goal) = &self.goal {
                status.goal = Some(goal.clone());
                status = status.with_eta(self.track.eta_time());
            }
        }
        status
    }

    /// Answer through the call's reply handle, or by a plain send
    async fn respond(&self, to: &Address, reply: Option<Reply<Message>>, message: Message) {
        let result = match reply {
            Some(reply) => reply.send(message),
            None => self.transport.send(&self.address, to, message).await,
        };
        if let Err(e) = result {
            warn!(resource = %self.address, to = %to, error = %e, "Reply delivery failed");
        }
    }
}
