//! Task auctions across the requester and several resources

use crate::test_utils::*;
use serde_json::json;
use sortie_coordinator::{Assignment, DeclineReason, DeploymentState, EscalationReason, Message, RequesterEvent};
use sortie_core::{Address, Timestamp};

fn eta_close(eta: Timestamp, expected: Timestamp) -> bool {
    eta.abs_diff(expected) <= 5
}

/// Give `resource` an unrelated direct order so it is busy
async fn keep_busy(fleet: &TestFleet, resource: &str) {
    let elsewhere = north_of(incident(), -5_000.0);
    fleet
        .command(
            resource,
            Message::Assignment(Assignment::new(
                "RoadBlock",
                json!({ "goal": { "lat": elsewhere.lat, "lon": elsewhere.lon } }),
            )),
        )
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_busy_winner_declines_and_next_bidder_is_placed() {
    let mut f = TestFleet::new();
    f.add(ambulance("amb-a", minutes_north(incident(), 10)));
    f.add(ambulance("amb-b", minutes_north(incident(), 15)));

    let task_id = f
        .requester
        .publish(f.task(incident(), 20 * MINUTE_MS, "Goto"))
        .unwrap();

    // Both bid with their route estimates.
    let mut etas = Vec::new();
    while etas.len() < 2 {
        if let RequesterEvent::BidReceived { bidder, eta, .. } =
            f.wait_for(|e| matches!(e, RequesterEvent::BidReceived { .. })).await
        {
            etas.push((bidder, eta));
        }
    }
    etas.sort();
    assert_eq!(etas[0].0, Address::new("amb-a"));
    assert!(eta_close(etas[0].1, T0 + 10 * MINUTE_MS), "eta {}", etas[0].1);
    assert_eq!(etas[1].0, Address::new("amb-b"));
    assert!(eta_close(etas[1].1, T0 + 15 * MINUTE_MS), "eta {}", etas[1].1);

    // The winner gets another job before the window closes.
    keep_busy(&f, "amb-a").await;

    let events = f.until_settled().await;
    let decisions: Vec<_> = events
        .into_iter()
        .filter(|e| !matches!(e, RequesterEvent::BidReceived { .. }))
        .collect();
    assert_eq!(decisions.len(), 4, "{:?}", decisions);
    assert!(matches!(&decisions[0], RequesterEvent::Assigned { bidder, .. } if bidder.as_str() == "amb-a"));
    assert!(matches!(
        &decisions[1],
        RequesterEvent::Declined { bidder, reason: DeclineReason::Busy, .. } if bidder.as_str() == "amb-a"
    ));
    assert!(matches!(&decisions[2], RequesterEvent::Assigned { bidder, .. } if bidder.as_str() == "amb-b"));
    assert_eq!(
        decisions[3],
        RequesterEvent::Placed {
            task_id: task_id.clone(),
            bidder: Address::new("amb-b"),
        }
    );

    // Let the first leg's route come back.
    advance(1_000).await;
    let b = f.status("amb-b").await;
    assert_eq!(b.deployment, DeploymentState::Active);
    assert_eq!(b.task_id.as_deref(), Some(task_id.as_str()));
    assert_eq!(b.plan_status.as_deref(), Some("travel"));
    let goal = b.goal.expect("travelling to the task");
    assert!(near(goal.position(), incident(), 1.0));

    // Busy resource kept its own order.
    let a = f.status("amb-a").await;
    assert_eq!(a.deployment, DeploymentState::Active);
    assert_eq!(a.task_id, None);

    // 15 minutes of travel after the 10 s bid window.
    advance(16 * MINUTE_MS).await;
    let b = f.status("amb-b").await;
    assert_eq!(b.deployment, DeploymentState::Unassigned);
    assert!(near(b.position, incident(), 1.0), "at {:?}", b.position);
}

#[tokio::test(start_paused = true)]
async fn test_every_bidder_declines_escalates() {
    let mut f = TestFleet::new();
    f.add(ambulance("amb-a", minutes_north(incident(), 5)));
    f.add(ambulance("amb-b", minutes_north(incident(), 6)));

    let task_id = f
        .requester
        .publish(f.task(incident(), 20 * MINUTE_MS, "Goto"))
        .unwrap();
    for _ in 0..2 {
        f.wait_for(|e| matches!(e, RequesterEvent::BidReceived { .. })).await;
    }
    keep_busy(&f, "amb-a").await;
    keep_busy(&f, "amb-b").await;

    let events = f.until_settled().await;
    let declined = events
        .iter()
        .filter(|e| matches!(e, RequesterEvent::Declined { .. }))
        .count();
    assert_eq!(declined, 2);
    assert_eq!(
        events.last(),
        Some(&RequesterEvent::Escalated {
            task_id,
            reason: EscalationReason::CandidatesExhausted,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_deadline_gets_no_bids() {
    let mut f = TestFleet::new();
    f.add(ambulance("amb-far", minutes_north(incident(), 30)));

    let task_id = f
        .requester
        .publish(f.task(incident(), 20 * MINUTE_MS, "Goto"))
        .unwrap();

    let events = f.until_settled().await;
    assert!(!events
        .iter()
        .any(|e| matches!(e, RequesterEvent::BidReceived { .. })));
    assert_eq!(
        events.last(),
        Some(&RequesterEvent::Escalated {
            task_id,
            reason: EscalationReason::NoBids,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_resource_type_filters_bidders() {
    let mut f = TestFleet::new();
    f.add(ambulance("amb-a", minutes_north(incident(), 2)));
    f.add(
        sortie_coordinator::ResourceConfig::new("police-1", "police", minutes_north(incident(), 8))
            .with_bid_jitter(0),
    );

    let task = f
        .task(incident(), 20 * MINUTE_MS, "RoadBlock")
        .with_resource_type("police");
    f.requester.publish(task).unwrap();

    let events = f.until_settled().await;
    let bidders: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            RequesterEvent::BidReceived { bidder, .. } => Some(bidder.as_str().to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(bidders, vec!["police-1".to_string()]);
    assert!(matches!(events.last(), Some(RequesterEvent::Placed { bidder, .. }) if bidder.as_str() == "police-1"));
}

#[tokio::test(start_paused = true)]
async fn test_unusable_plan_parameters_declined() {
    let mut f = TestFleet::new();
    f.add(ambulance("amb-a", minutes_north(incident(), 3)));

    // Evac needs a hospital.
    let task_id = f
        .requester
        .publish(f.task(incident(), 20 * MINUTE_MS, "Evac"))
        .unwrap();

    let events = f.until_settled().await;
    assert!(events.iter().any(|e| matches!(
        e,
        RequesterEvent::Declined { reason: DeclineReason::InvalidPlan(_), .. }
    )));
    assert_eq!(
        events.last(),
        Some(&RequesterEvent::Escalated {
            task_id,
            reason: EscalationReason::CandidatesExhausted,
        })
    );
    assert_eq!(
        f.status("amb-a").await.deployment,
        DeploymentState::Unassigned
    );
}
