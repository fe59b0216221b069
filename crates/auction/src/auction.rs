//! Per-task auction.
//!
//! Bids are keyed by bidder and ranked by `(eta, bidder)`, so identical etas
//! from different resources are both kept and the ranking does not depend on
//! arrival order. A repeated bid from the same resource replaces its earlier
//! one.

use serde::{Deserialize, Serialize};
use sortie_core::{Address, Timestamp};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::{AuctionError, Result};
use crate::task::Task;

/// A resource's estimated arrival time for a task
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Bid {
    /// Estimated arrival time (Unix epoch milliseconds)
    pub eta: Timestamp,
    /// Bidding resource
    pub bidder: Address,
}

impl Bid {
    /// Create a bid
    pub fn new(eta: Timestamp, bidder: Address) -> Self {
        Self { eta, bidder }
    }
}

/// A task and its ranked candidate bids
#[derive(Debug, Clone)]
pub struct TaskAuction {
    task: Task,
    by_bidder: BTreeMap<Address, Timestamp>,
    ranking: BTreeSet<Bid>,
    last_assigned: Option<Bid>,
}

impl TaskAuction {
    /// Open an auction for `task`
    pub fn new(task: Task) -> Self {
        Self {
            task,
            by_bidder: BTreeMap::new(),
            ranking: BTreeSet::new(),
            last_assigned: None,
        }
    }

    /// Task under auction
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Record or replace a bid.
    ///
    /// Bids that miss the task deadline are refused. Returns the bidder's
    /// previous eta, if any.
    pub fn add_bid(&mut self, bid: Bid) -> Result<Option<Timestamp>> {
        if !self.task.is_reachable_by(bid.eta) {
            return Err(AuctionError::PastDeadline {
                bidder: bid.bidder,
                eta: bid.eta,
                deadline: self.task.deadline_ms,
            });
        }

        let previous = self.by_bidder.insert(bid.bidder.clone(), bid.eta);
        if let Some(eta) = previous {
            self.ranking.remove(&Bid::new(eta, bid.bidder.clone()));
        }
        debug!(task_id = %self.task.id, bidder = %bid.bidder, eta = bid.eta, "Bid recorded");
        self.ranking.insert(bid);
        Ok(previous)
    }

    /// Bid with the smallest eta
    pub fn best(&self) -> Option<&Bid> {
        self.ranking.iter().next()
    }

    /// Drop `bidder` and pick the next candidate.
    ///
    /// The next candidate is the first remaining bid whose eta is not earlier
    /// than the reference eta: the dropped bid's eta, or the last eta recorded
    /// with [`TaskAuction::mark_assigned`] when `bidder` had no bid. Bids tied
    /// with the reference stay eligible on purpose, so every equally fast
    /// bidder gets an offer. Without any reference the best remaining bid is
    /// returned.
    pub fn next_after_rejecting(&mut self, bidder: &Address) -> Option<Bid> {
        let reference = match self.remove(bidder) {
            Some(eta) => Some(eta),
            None => self.last_assigned.as_ref().map(|bid| bid.eta),
        };

        match reference {
            Some(eta) => self.ranking.iter().find(|bid| bid.eta >= eta).cloned(),
            None => self.best().cloned(),
        }
    }

    /// Record that `bid` was offered the assignment
    pub fn mark_assigned(&mut self, bid: Bid) {
        self.last_assigned = Some(bid);
    }

    /// Most recent assignment offer
    pub fn last_assigned(&self) -> Option<&Bid> {
        self.last_assigned.as_ref()
    }

    /// Remove a bidder's bid, returning its eta
    pub fn remove(&mut self, bidder: &Address) -> Option<Timestamp> {
        let eta = self.by_bidder.remove(bidder)?;
        self.ranking.remove(&Bid::new(eta, bidder.clone()));
        Some(eta)
    }

    /// Current eta offered by `bidder`
    pub fn eta_of(&self, bidder: &Address) -> Option<Timestamp> {
        self.by_bidder.get(bidder).copied()
    }

    /// Bids in ranking order
    pub fn bids(&self) -> impl Iterator<Item = &Bid> {
        self.ranking.iter()
    }

    /// Number of bids
    pub fn len(&self) -> usize {
        self.ranking.len()
    }

    /// Whether no bids are recorded
    pub fn is_empty(&self) -> bool {
        self.ranking.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sortie_core::Waypoint;

    const DEADLINE: Timestamp = 10_000_000;

    fn auction() -> TaskAuction {
        TaskAuction::new(
            Task::new(Waypoint::new(51.9, 4.47), DEADLINE, "Goto", Address::new("requester"))
                .with_id("task-1"),
        )
    }

    fn bid(eta: Timestamp, bidder: &str) -> Bid {
        Bid::new(eta, Address::new(bidder))
    }

    #[test]
    fn test_identical_etas_are_both_retained() {
        let mut auction = auction();
        auction.add_bid(bid(5_000, "ambulance-1")).unwrap();
        auction.add_bid(bid(5_000, "ambulance-2")).unwrap();

        assert_eq!(auction.len(), 2);
        assert_eq!(auction.best(), Some(&bid(5_000, "ambulance-1")));
        assert_eq!(
            auction.next_after_rejecting(&Address::new("ambulance-1")),
            Some(bid(5_000, "ambulance-2"))
        );
    }

    #[test]
    fn test_rebid_replaces_previous() {
        let mut auction = auction();
        assert_eq!(auction.add_bid(bid(9_000, "a")), Ok(None));
        auction.add_bid(bid(7_000, "b")).unwrap();
        assert_eq!(auction.add_bid(bid(6_000, "a")), Ok(Some(9_000)));

        assert_eq!(auction.len(), 2);
        assert_eq!(auction.best(), Some(&bid(6_000, "a")));
        assert_eq!(auction.eta_of(&Address::new("a")), Some(6_000));
    }

    #[test]
    fn test_late_bid_refused() {
        let mut auction = auction();
        let result = auction.add_bid(bid(DEADLINE, "slow"));
        assert!(matches!(result, Err(AuctionError::PastDeadline { .. })));
        assert!(auction.is_empty());
    }

    #[test]
    fn test_empty_auction_has_no_candidate() {
        let mut auction = auction();
        assert!(auction.best().is_none());
        assert!(auction.next_after_rejecting(&Address::new("ghost")).is_none());
    }

    #[test]
    fn test_rejecting_absent_bidder_uses_last_assignment() {
        let mut auction = auction();
        auction.add_bid(bid(1_000, "a")).unwrap();
        auction.add_bid(bid(2_000, "b")).unwrap();
        auction.add_bid(bid(3_000, "c")).unwrap();

        // "b" was offered the task, then its bid vanished (e.g. withdrawn).
        auction.mark_assigned(bid(2_000, "b"));
        auction.remove(&Address::new("b"));

        assert_eq!(
            auction.next_after_rejecting(&Address::new("b")),
            Some(bid(3_000, "c"))
        );
    }

    #[test]
    fn test_rejecting_absent_bidder_without_history_falls_back_to_best() {
        let mut auction = auction();
        auction.add_bid(bid(4_000, "a")).unwrap();
        assert_eq!(
            auction.next_after_rejecting(&Address::new("ghost")),
            Some(bid(4_000, "a"))
        );
    }

    fn distinct_bids() -> impl Strategy<Value = Vec<Bid>> {
        prop::collection::btree_set(0u64..DEADLINE, 1..24).prop_map(|etas| {
            etas.into_iter()
                .enumerate()
                .map(|(i, eta)| Bid::new(eta, Address::new(format!("resource-{i}"))))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn test_best_is_minimum_eta(bids in distinct_bids().prop_shuffle()) {
            let mut auction = auction();
            for bid in &bids {
                auction.add_bid(bid.clone()).unwrap();
            }
            let min = bids.iter().min_by_key(|b| b.eta).cloned();
            prop_assert_eq!(auction.best().cloned(), min);
        }

        #[test]
        fn test_rejecting_walks_etas_in_order(bids in distinct_bids().prop_shuffle()) {
            let mut auction = auction();
            for bid in &bids {
                auction.add_bid(bid.clone()).unwrap();
            }
            let mut expected = bids.clone();
            expected.sort();

            let mut current = auction.best().cloned();
            for next in expected.iter().skip(1) {
                let rejected = current.take();
                prop_assert!(rejected.is_some());
                if let Some(rejected) = rejected {
                    current = auction.next_after_rejecting(&rejected.bidder);
                }
                prop_assert_eq!(current.as_ref(), Some(next));
            }

            if let Some(last) = current {
                prop_assert!(auction.next_after_rejecting(&last.bidder).is_none());
            }
            prop_assert!(auction.is_empty());
        }

        #[test]
        fn test_ranking_independent_of_arrival_order(
            bids in prop::collection::vec((0u64..50, 0usize..8), 1..32),
        ) {
            let bids: Vec<Bid> = bids
                .into_iter()
                .map(|(eta, who)| Bid::new(eta, Address::new(format!("resource-{who}"))))
                .collect();

            // Last bid per bidder wins regardless of the order bidders interleave.
            let mut forward = auction();
            for bid in &bids {
                forward.add_bid(bid.clone()).unwrap();
            }
            let mut latest: BTreeMap<Address, Timestamp> = BTreeMap::new();
            for bid in &bids {
                latest.insert(bid.bidder.clone(), bid.eta);
            }
            let mut direct = auction();
            for (bidder, eta) in latest.into_iter().rev() {
                direct.add_bid(Bid::new(eta, bidder)).unwrap();
            }

            let a: Vec<Bid> = forward.bids().cloned().collect();
            let b: Vec<Bid> = direct.bids().cloned().collect();
            prop_assert_eq!(a, b);
        }
    }
}
