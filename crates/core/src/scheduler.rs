//! Delayed message delivery.
//!
//! A scheduled callback in sortie is the delivery of a message to the
//! mailbox of the actor that scheduled it. Actors never sleep inside a
//! handler: arrival checks, dwell delays and auction windows are all
//! expressed as messages delivered later through a [`Scheduler`].
//!
//! Schedulers make no cancellation guarantee. Receivers must detect stale
//! deliveries themselves (sortie actors tag scheduled messages with an epoch).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::clock::{Clock, Timestamp};

/// Delivers messages of type `M` after a delay or at an absolute time
pub trait Scheduler<M>: Send + Sync {
    /// Current time as seen by this scheduler
    fn now_ms(&self) -> Timestamp;

    /// Deliver `message` after `delay_ms` milliseconds
    fn after(&self, delay_ms: u64, message: M);

    /// Deliver `message` at `at_ms` (immediately if already past)
    fn at(&self, at_ms: Timestamp, message: M) {
        let delay = at_ms.saturating_sub(self.now_ms());
        self.after(delay, message);
    }
}

/// Scheduler backed by Tokio timers feeding an actor mailbox.
///
/// Zero-delay messages are sent synchronously so that triggers scheduled in
/// sequence are delivered in that sequence. Must be used from within a Tokio
/// runtime.
#[derive(Debug)]
pub struct TokioScheduler<M> {
    tx: mpsc::UnboundedSender<M>,
    clock: Arc<dyn Clock>,
}

impl<M> TokioScheduler<M> {
    /// Create a scheduler delivering into `tx`
    pub fn new(tx: mpsc::UnboundedSender<M>, clock: Arc<dyn Clock>) -> Self {
        Self { tx, clock }
    }
}

impl<M> Clone for TokioScheduler<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<M: Send + 'static> Scheduler<M> for TokioScheduler<M> {
    fn now_ms(&self) -> Timestamp {
        self.clock.now_ms()
    }

    fn after(&self, delay_ms: u64, message: M) {
        if delay_ms == 0 {
            if self.tx.send(message).is_err() {
                debug!("Scheduled message dropped: mailbox closed");
            }
            return;
        }

        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            if tx.send(message).is_err() {
                debug!("Scheduled message dropped: mailbox closed");
            }
        });
    }
}

/// Virtual-clock scheduler for deterministic tests and simulations.
///
/// Time only moves when [`ManualScheduler::advance`] is called. Due messages
/// are returned ordered by due time, then by scheduling order.
#[derive(Debug)]
pub struct ManualScheduler<M> {
    state: Mutex<ManualState<M>>,
}

#[derive(Debug)]
struct ManualState<M> {
    now: Timestamp,
    seq: u64,
    queue: BTreeMap<(Timestamp, u64), M>,
}

impl<M> ManualScheduler<M> {
    /// Create a scheduler whose clock starts at `start_ms`
    pub fn new(start_ms: Timestamp) -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: start_ms,
                seq: 0,
                queue: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManualState<M>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Move the clock forward by `delta_ms` and return every message now due
    pub fn advance(&self, delta_ms: u64) -> Vec<M> {
        let target = self.lock().now + delta_ms;
        self.advance_to(target)
    }

    /// Move the clock to `at_ms` (never backwards) and return every message now due
    pub fn advance_to(&self, at_ms: Timestamp) -> Vec<M> {
        let mut state = self.lock();
        state.now = state.now.max(at_ms);
        Self::drain(&mut state)
    }

    /// Return messages already due without moving the clock
    pub fn drain_due(&self) -> Vec<M> {
        let mut state = self.lock();
        Self::drain(&mut state)
    }

    /// Due time of the earliest pending message
    pub fn next_due(&self) -> Option<Timestamp> {
        self.lock().queue.keys().next().map(|(due, _)| *due)
    }

    /// Number of messages not yet delivered
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    fn drain(state: &mut ManualState<M>) -> Vec<M> {
        let later = state.queue.split_off(&(state.now + 1, 0));
        let due = std::mem::replace(&mut state.queue, later);
        due.into_values().collect()
    }
}

impl<M: Send> Scheduler<M> for ManualScheduler<M> {
    fn now_ms(&self) -> Timestamp {
        self.lock().now
    }

    fn after(&self, delay_ms: u64, message: M) {
        let mut state = self.lock();
        let due = state.now + delay_ms;
        let seq = state.seq;
        state.seq += 1;
        state.queue.insert((due, seq), message);
    }
}
