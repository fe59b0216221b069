//! Bounded scatter/gather.
//!
//! Fans a call out to many addresses concurrently and collects whatever
//! answers within the timeout. Slow or unreachable targets show up as
//! per-target failures; nothing waits past the bound.

use futures_util::future::join_all;
use sortie_core::Address;
use std::time::Duration;
use tracing::debug;

use crate::bus::Transport;
use crate::error::DeliveryError;

/// Outcome of a scatter/gather round
#[derive(Debug)]
pub struct Gathered<M> {
    /// Replies that arrived in time, in target order
    pub replies: Vec<(Address, M)>,
    /// Targets that failed or did not answer in time
    pub failures: Vec<(Address, DeliveryError)>,
}

impl<M> Gathered<M> {
    /// Whether every target answered
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Call every target with a clone of `message`, waiting at most `timeout`
pub async fn gather<M, T>(
    transport: &T,
    from: &Address,
    targets: &[Address],
    message: M,
    timeout: Duration,
) -> Gathered<M>
where
    M: Clone + Send + 'static,
    T: Transport<M> + ?Sized,
{
    let calls = targets.iter().map(|target| {
        let message = message.clone();
        async move {
            let result = transport.call(from, target, message, timeout).await;
            (target.clone(), result)
        }
    });

    let mut gathered = Gathered {
        replies: Vec::new(),
        failures: Vec::new(),
    };
    for (target, result) in join_all(calls).await {
        match result {
            Ok(reply) => gathered.replies.push((target, reply)),
            Err(e) => {
                debug!(target = %target, error = %e, "No reply in gather round");
                gathered.failures.push((target, e));
            }
        }
    }
    gathered
}
