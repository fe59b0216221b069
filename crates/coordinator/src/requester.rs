//! Requester agent.
//!
//! Publishes tasks to every resource registered under the candidate tag,
//! collects bids for the configured window, then offers the task to the best
//! bidder with a correlated assignment. A decline, a failed delivery or a
//! missed reply moves the offer to the next candidate; running out of
//! candidates escalates. Progress is published as [`RequesterEvent`]s.

use serde::{Deserialize, Serialize};
use sortie_auction::{AuctionError, Bid, Task, TaskAuction};
use sortie_core::{Address, Clock, Scheduler, Timestamp, TokioScheduler};
use sortie_fabric::{DeliveryError, Directory, Envelope, Transport};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RequesterConfig;
use crate::error::{CoordinatorError, Result};
use crate::protocol::{Assignment, AssignmentReply, DeclineReason, Message};

/// Why a task could not be placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EscalationReason {
    /// No resource bid within the window
    NoBids,
    /// Every bidder declined or could not be reached
    CandidatesExhausted,
}

/// Progress of the tasks a requester handles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RequesterEvent {
    /// Task broadcast to candidates
    #[serde(rename_all = "camelCase")]
    Published {
        /// Task
        task_id: String,
        /// Number of resources the task was sent to
        candidates: usize,
    },
    /// Bid recorded
    #[serde(rename_all = "camelCase")]
    BidReceived {
        /// Task
        task_id: String,
        /// Bidder
        bidder: Address,
        /// Offered eta
        eta: Timestamp,
    },
    /// Task offered to a bidder
    #[serde(rename_all = "camelCase")]
    Assigned {
        /// Task
        task_id: String,
        /// Chosen bidder
        bidder: Address,
        /// Correlation id of the offer
        correlation_id: String,
    },
    /// Bidder refused or did not answer
    #[serde(rename_all = "camelCase")]
    Declined {
        /// Task
        task_id: String,
        /// Bidder
        bidder: Address,
        /// Why
        reason: DeclineReason,
    },
    /// Bidder accepted; the task is placed
    #[serde(rename_all = "camelCase")]
    Placed {
        /// Task
        task_id: String,
        /// Resource running the task
        bidder: Address,
    },
    /// Task could not be placed and needs a supervisor
    #[serde(rename_all = "camelCase")]
    Escalated {
        /// Task
        task_id: String,
        /// Why
        reason: EscalationReason,
    },
}

#[derive(Debug)]
enum Mail {
    Publish(Task),
    Cancel(String),
    DecideTask(String),
    AssignmentOutcome {
        task_id: String,
        bidder: Address,
        correlation_id: String,
        result: std::result::Result<Message, DeliveryError>,
    },
}

/// Offer waiting for an answer
#[derive(Debug, Clone)]
struct PendingOffer {
    bidder: Address,
    correlation_id: String,
}

/// Handle for submitting tasks to a running requester
#[derive(Debug, Clone)]
pub struct RequesterHandle {
    address: Address,
    mail_tx: mpsc::UnboundedSender<Mail>,
    events: broadcast::Sender<RequesterEvent>,
}

impl RequesterHandle {
    /// Requester address; tasks report bids here
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Publish `task`, returning its id.
    ///
    /// The task's reporting address is set to this requester.
    pub fn publish(&self, mut task: Task) -> Result<String> {
        task.report_to = self.address.clone();
        let task_id = task.id.clone();
        self.mail_tx
            .send(Mail::Publish(task))
            .map_err(|_| CoordinatorError::AgentStopped(self.address.clone()))?;
        Ok(task_id)
    }

    /// Abandon a task; late bids for it are dropped
    pub fn cancel(&self, task_id: impl Into<String>) -> Result<()> {
        self.mail_tx
            .send(Mail::Cancel(task_id.into()))
            .map_err(|_| CoordinatorError::AgentStopped(self.address.clone()))
    }

    /// Subscribe to task progress events
    pub fn subscribe(&self) -> broadcast::Receiver<RequesterEvent> {
        self.events.subscribe()
    }
}

/// Task requester
pub struct RequesterAgent {
    config: RequesterConfig,
    address: Address,
    transport: Arc<dyn Transport<Message>>,
    directory: Arc<Directory>,
    scheduler: TokioScheduler<Mail>,
    mail_tx: mpsc::UnboundedSender<Mail>,
    mailbox: mpsc::UnboundedReceiver<Mail>,
    inbox: mpsc::UnboundedReceiver<Envelope<Message>>,
    events: broadcast::Sender<RequesterEvent>,

    auctions: HashMap<String, TaskAuction>,
    pending: HashMap<String, PendingOffer>,
}

impl RequesterAgent {
    /// Create a requester reading bus messages from `inbox`
    pub fn new(
        config: RequesterConfig,
        inbox: mpsc::UnboundedReceiver<Envelope<Message>>,
        transport: Arc<dyn Transport<Message>>,
        directory: Arc<Directory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (mail_tx, mailbox) = mpsc::unbounded_channel();
        let scheduler = TokioScheduler::new(mail_tx.clone(), clock);
        let (events, _) = broadcast::channel(1000);

        Self {
            address: config.address(),
            config,
            transport,
            directory,
            scheduler,
            mail_tx,
            mailbox,
            inbox,
            events,
            auctions: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Handle for publishing tasks and observing progress
    pub fn handle(&self) -> RequesterHandle {
        RequesterHandle {
            address: self.address.clone(),
            mail_tx: self.mail_tx.clone(),
            events: self.events.clone(),
        }
    }

    /// Run the agent on its own task
    pub fn spawn(self) -> (RequesterHandle, JoinHandle<()>) {
        let handle = self.handle();
        (handle, tokio::spawn(self.run()))
    }

    /// Process messages until the bus mailbox closes
    pub async fn run(mut self) {
        info!(requester = %self.address, tag = %self.config.candidate_tag, "Requester agent started");

        loop {
            // Own deliveries first, so bus requests see their effects.
            tokio::select! {
                biased;
                Some(mail) = self.mailbox.recv() => self.handle_mail(mail).await,
                envelope = self.inbox.recv() => match envelope {
                    Some(envelope) => self.handle_envelope(envelope),
                    None => break,
                },
            }
        }

        info!(requester = %self.address, "Requester agent stopped");
    }

    fn emit(&self, event: RequesterEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn handle_envelope(&mut self, envelope: Envelope<Message>) {
        let (from, message, _) = envelope.into_parts();
        match message {
            Message::Bid { task_id, eta } => {
                if let Err(e) = self.record_bid(&task_id, Bid::new(eta, from)) {
                    debug!(requester = %self.address, task_id = %task_id, error = %e, "Bid dropped");
                }
            }
            Message::AssignmentReply(reply) => {
                // Replies sent as plain messages instead of call answers.
                if let Some(task_id) = reply.task_id.clone() {
                    let correlation_id = reply.correlation_id.clone();
                    self.on_assignment_outcome(
                        task_id,
                        from,
                        correlation_id,
                        Ok(Message::AssignmentReply(reply)),
                    );
                }
            }
            other => {
                debug!(requester = %self.address, method = other.method(), "Ignoring message");
            }
        }
    }

    async fn handle_mail(&mut self, mail: Mail) {
        match mail {
            Mail::Publish(task) => self.publish(task).await,
            Mail::Cancel(task_id) => {
                if self.auctions.remove(&task_id).is_some() {
                    self.pending.remove(&task_id);
                    info!(requester = %self.address, task_id = %task_id, "Task cancelled");
                }
            }
            Mail::DecideTask(task_id) => self.decide(&task_id),
            Mail::AssignmentOutcome {
                task_id,
                bidder,
                correlation_id,
                result,
            } => self.on_assignment_outcome(task_id, bidder, correlation_id, result),
        }
    }

    async fn publish(&mut self, task: Task) {
        let task_id = task.id.clone();
        let candidates = self.directory.list_by_tag(&self.config.candidate_tag);

        info!(
            requester = %self.address,
            task_id = %task_id,
            plan = %task.plan,
            candidates = candidates.len(),
            "Publishing task"
        );

        self.auctions
            .insert(task_id.clone(), TaskAuction::new(task.clone()));

        for candidate in &candidates {
            let message = Message::TaskBroadcast(task.clone());
            if let Err(e) = self.transport.send(&self.address, candidate, message).await {
                warn!(requester = %self.address, task_id = %task_id, resource = %candidate, error = %e, "Broadcast delivery failed");
            }
        }

        self.emit(RequesterEvent::Published {
            task_id: task_id.clone(),
            candidates: candidates.len(),
        });
        self.scheduler
            .after(self.config.bid_window_ms, Mail::DecideTask(task_id));
    }

    fn record_bid(&mut self, task_id: &str, bid: Bid) -> Result<()> {
        let auction = self
            .auctions
            .get_mut(task_id)
            .ok_or_else(|| AuctionError::UnknownTask(task_id.to_string()))?;
        auction.add_bid(bid.clone())?;

        self.emit(RequesterEvent::BidReceived {
            task_id: task_id.to_string(),
            bidder: bid.bidder,
            eta: bid.eta,
        });
        Ok(())
    }

    fn decide(&mut self, task_id: &str) {
        let Some(auction) = self.auctions.get(task_id) else {
            debug!(requester = %self.address, task_id = %task_id, "Auction already closed");
            return;
        };

        match auction.best().cloned() {
            Some(bid) => self.offer(task_id, bid),
            None => self.escalate(task_id, EscalationReason::NoBids),
        }
    }

    fn offer(&mut self, task_id: &str, bid: Bid) {
        let Some(auction) = self.auctions.get_mut(task_id) else {
            return;
        };
        auction.mark_assigned(bid.clone());

        let correlation_id = uuid::Uuid::new_v4().to_string();
        let assignment = Assignment::for_task(auction.task(), correlation_id.clone());
        self.pending.insert(
            task_id.to_string(),
            PendingOffer {
                bidder: bid.bidder.clone(),
                correlation_id: correlation_id.clone(),
            },
        );

        info!(
            requester = %self.address,
            task_id = %task_id,
            resource = %bid.bidder,
            eta = bid.eta,
            correlation_id = %correlation_id,
            "Assigning task"
        );
        self.emit(RequesterEvent::Assigned {
            task_id: task_id.to_string(),
            bidder: bid.bidder.clone(),
            correlation_id: correlation_id.clone(),
        });

        let transport = Arc::clone(&self.transport);
        let from = self.address.clone();
        let tx = self.mail_tx.clone();
        let timeout = Duration::from_millis(self.config.reply_timeout_ms);
        let task_id = task_id.to_string();

        tokio::spawn(async move {
            let result = transport
                .call(&from, &bid.bidder, Message::Assignment(assignment), timeout)
                .await;
            let _ = tx.send(Mail::AssignmentOutcome {
                task_id,
                bidder: bid.bidder,
                correlation_id,
                result,
            });
        });
    }

    fn on_assignment_outcome(
        &mut self,
        task_id: String,
        bidder: Address,
        correlation_id: String,
        result: std::result::Result<Message, DeliveryError>,
    ) {
        let current = self
            .pending
            .get(&task_id)
            .map_or(false, |offer| offer.correlation_id == correlation_id && offer.bidder == bidder);
        if !current {
            debug!(requester = %self.address, task_id = %task_id, correlation_id = %correlation_id, "Dropping stale assignment outcome");
            return;
        }
        self.pending.remove(&task_id);

        let reason = match result {
            Ok(Message::AssignmentReply(AssignmentReply {
                accepted: true, ..
            })) => {
                info!(requester = %self.address, task_id = %task_id, resource = %bidder, "Task placed");
                self.auctions.remove(&task_id);
                self.emit(RequesterEvent::Placed { task_id, bidder });
                return;
            }
            Ok(Message::AssignmentReply(reply)) => reply.reason.unwrap_or(DeclineReason::Busy),
            Ok(other) => DeclineReason::Unreachable(format!("unexpected reply {}", other.method())),
            Err(e) => {
                warn!(requester = %self.address, task_id = %task_id, resource = %bidder, error = %e, "Assignment delivery failed");
                DeclineReason::Unreachable(e.to_string())
            }
        };

        info!(requester = %self.address, task_id = %task_id, resource = %bidder, reason = %reason, "Assignment declined");
        self.emit(RequesterEvent::Declined {
            task_id: task_id.clone(),
            bidder: bidder.clone(),
            reason,
        });

        let next = self
            .auctions
            .get_mut(&task_id)
            .and_then(|auction| auction.next_after_rejecting(&bidder));
        match next {
            Some(bid) => self.offer(&task_id, bid),
            None => self.escalate(&task_id, EscalationReason::CandidatesExhausted),
        }
    }

    fn escalate(&mut self, task_id: &str, reason: EscalationReason) {
        if self.auctions.remove(task_id).is_none() {
            return;
        }
        warn!(requester = %self.address, task_id = %task_id, ?reason, "No candidates left, escalating");
        self.emit(RequesterEvent::Escalated {
            task_id: task_id.to_string(),
            reason,
        });
    }

    /// Tasks still being auctioned or offered
    pub fn open_tasks(&self) -> usize {
        self.auctions.len()
    }
}
