//! Messaging substrate.
//!
//! [`Transport`] is the contract actors use to reach each other.
//! [`LocalBus`] implements it in-process: every bound address owns an
//! unbounded mailbox of [`Envelope`]s. Calls carry a one-shot reply channel
//! that the receiver answers through [`Envelope::reply`].

use async_trait::async_trait;
use sortie_core::Address;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{DeliveryError, Result};

/// A delivered message
#[derive(Debug)]
pub struct Envelope<M> {
    /// Sender address
    pub from: Address,
    /// Payload
    pub message: M,
    reply: Option<oneshot::Sender<M>>,
}

impl<M> Envelope<M> {
    /// Wrap a fire-and-forget message
    pub fn new(from: Address, message: M) -> Self {
        Self {
            from,
            message,
            reply: None,
        }
    }

    /// Whether the sender awaits a reply
    pub fn expects_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Answer the sender.
    ///
    /// Fails when no reply was expected, or when the caller stopped waiting.
    pub fn reply(&mut self, message: M) -> Result<()> {
        let tx = self
            .reply
            .take()
            .ok_or_else(|| DeliveryError::NoReplyExpected(self.from.clone()))?;
        tx.send(message)
            .map_err(|_| DeliveryError::Closed(self.from.clone()))
    }

    /// Split into sender, payload and reply handle
    pub fn into_parts(self) -> (Address, M, Option<Reply<M>>) {
        let reply = self.reply.map(|tx| Reply {
            to: self.from.clone(),
            tx,
        });
        (self.from, self.message, reply)
    }
}

/// Handle answering one call
#[derive(Debug)]
pub struct Reply<M> {
    to: Address,
    tx: oneshot::Sender<M>,
}

impl<M> Reply<M> {
    /// Send the answer; fails when the caller stopped waiting
    pub fn send(self, message: M) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| DeliveryError::Closed(self.to))
    }
}

/// Message delivery between addresses
#[async_trait]
pub trait Transport<M: Send + 'static>: Send + Sync {
    /// Deliver `message` to `to` without waiting for an answer
    async fn send(&self, from: &Address, to: &Address, message: M) -> Result<()>;

    /// Deliver `message` to `to` and wait up to `timeout` for the reply
    async fn call(&self, from: &Address, to: &Address, message: M, timeout: Duration) -> Result<M>;
}

/// In-process transport
#[derive(Debug)]
pub struct LocalBus<M> {
    mailboxes: RwLock<HashMap<Address, mpsc::UnboundedSender<Envelope<M>>>>,
}

impl<M> Default for LocalBus<M> {
    fn default() -> Self {
        Self {
            mailboxes: RwLock::new(HashMap::new()),
        }
    }
}

impl<M: Send + 'static> LocalBus<M> {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a mailbox to `address`.
    ///
    /// A mailbox whose receiver was dropped is replaced.
    pub fn bind(&self, address: Address) -> Result<mpsc::UnboundedReceiver<Envelope<M>>> {
        let mut mailboxes = self
            .mailboxes
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = mailboxes.get(&address) {
            if !existing.is_closed() {
                return Err(DeliveryError::AddressInUse(address));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        debug!(address = %address, "Mailbox bound");
        mailboxes.insert(address, tx);
        Ok(rx)
    }

    /// Remove the mailbox bound to `address`
    pub fn unbind(&self, address: &Address) -> bool {
        self.mailboxes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(address)
            .is_some()
    }

    /// Whether a live mailbox is bound to `address`
    pub fn is_bound(&self, address: &Address) -> bool {
        self.mailboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .map_or(false, |tx| !tx.is_closed())
    }

    fn deliver(&self, to: &Address, envelope: Envelope<M>) -> Result<()> {
        let tx = self
            .mailboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(to)
            .cloned()
            .ok_or_else(|| DeliveryError::Unreachable(to.clone()))?;

        tx.send(envelope).map_err(|_| {
            warn!(address = %to, "Delivery failed: mailbox closed");
            DeliveryError::Closed(to.clone())
        })
    }
}

#[async_trait]
impl<M: Send + 'static> Transport<M> for LocalBus<M> {
    async fn send(&self, from: &Address, to: &Address, message: M) -> Result<()> {
        self.deliver(to, Envelope::new(from.clone(), message))
    }

    async fn call(&self, from: &Address, to: &Address, message: M, timeout: Duration) -> Result<M> {
        let (tx, rx) = oneshot::channel();
        self.deliver(
            to,
            Envelope {
                from: from.clone(),
                message,
                reply: Some(tx),
            },
        )?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(DeliveryError::Closed(to.clone())),
            Err(_) => Err(DeliveryError::Timeout(to.clone())),
        }
    }
}
