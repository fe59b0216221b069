//! Fleet-wide status snapshots

use crate::test_utils::*;
use sortie_coordinator::{DeploymentState, RequesterEvent};
use sortie_core::Address;
use tokio::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_snapshot_mixes_idle_and_travelling_resources() {
    let start = tokio::time::Instant::now();
    let mut f = TestFleet::new();
    f.add(ambulance("amb-1", minutes_north(incident(), 4)));
    f.add(ambulance("amb-2", minutes_north(incident(), 25)));

    f.requester
        .publish(f.task(incident(), 20 * MINUTE_MS, "Goto"))
        .unwrap();
    f.wait_for(|e| matches!(e, RequesterEvent::Placed { .. })).await;

    at_second(start, 60).await;
    let snapshot = f
        .fleet
        .view("dashboard")
        .snapshot("resources", Duration::from_secs(5))
        .await;
    assert!(snapshot.missing.is_empty());
    assert_eq!(snapshot.statuses.len(), 2);

    let busy = snapshot.get("amb-1").unwrap();
    assert_eq!(busy.deployment, DeploymentState::Active);
    assert_eq!(busy.task.as_deref(), Some("Go to goal location. (Traveling towards goal)"));
    // Placed at 10 s with a 240 s trip.
    assert_eq!(busy.eta_ms.map(|eta| eta / 1_000), Some((T0 + 250_000) / 1_000));
    assert!(busy.eta_clock.is_some());
    assert!(!busy.route_ahead.is_empty());
    assert!(near(*busy.route_ahead.last().unwrap(), incident(), 1.0));

    let idle = snapshot.get("amb-2").unwrap();
    assert!(idle.is_available());
    assert!(idle.goal.is_none());
    assert!(idle.route_ahead.is_empty());
    assert!(near(idle.position, minutes_north(incident(), 25), 1.0));
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_does_not_wait_for_silent_resources() {
    let mut f = TestFleet::new();
    f.add(ambulance("amb-1", incident()));

    // Registered, bound, never answers.
    let silent = Address::new("amb-silent");
    let _inbox = f.fleet.bus().bind(silent.clone()).unwrap();
    f.fleet.directory().register(silent.clone(), "resources");

    let started = tokio::time::Instant::now();
    let snapshot = f
        .fleet
        .view("dashboard")
        .snapshot("resources", Duration::from_secs(3))
        .await;

    assert!(started.elapsed() <= Duration::from_secs(3) + Duration::from_millis(10));
    assert_eq!(snapshot.statuses.len(), 1);
    assert_eq!(snapshot.missing, vec![silent]);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["missing"][0], "amb-silent");
    assert_eq!(json["statuses"][0]["deployment"], "unassigned");
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_every_agent() {
    let mut f = TestFleet::new();
    let a = f.add(ambulance("amb-1", incident()));
    let bus = f.fleet.bus();

    let TestFleet { fleet, .. } = f;
    fleet.shutdown().await;
    assert!(!bus.is_bound(&a));
    assert!(!bus.is_bound(&Address::new("requester")));
}
