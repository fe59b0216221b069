//! Plans running on resources after an auction places them

use crate::test_utils::*;
use serde_json::json;
use sortie_coordinator::{DeploymentState, Message, RequesterEvent, ResourceConfig};
use sortie_core::GeoPoint;

fn hospital() -> GeoPoint {
    north_of(incident(), -3_000.0)
}

/// Ambulance two minutes from the incident with short dwell times
fn quick_ambulance() -> ResourceConfig {
    let mut config = ambulance("amb-1", minutes_north(incident(), 2));
    config.evac.pickup_delay_ms = 60_000;
    config.evac.drop_off_delay_ms = 30_000;
    config
}

async fn place_evac(f: &mut TestFleet) -> String {
    let h = hospital();
    let task = f
        .task(incident(), 20 * MINUTE_MS, "Evac")
        .with_params(json!({ "hospital": { "id": "hospital-1", "lat": h.lat, "lon": h.lon } }));
    let task_id = f.requester.publish(task).unwrap();
    let placed = f
        .wait_for(|e| matches!(e, RequesterEvent::Placed { .. } | RequesterEvent::Escalated { .. }))
        .await;
    assert!(matches!(placed, RequesterEvent::Placed { .. }), "{:?}", placed);
    task_id
}

#[tokio::test(start_paused = true)]
async fn test_evac_timeline() {
    let start = tokio::time::Instant::now();
    let mut f = TestFleet::new();
    f.add(quick_ambulance());
    let task_id = place_evac(&mut f).await;

    // Placed after the 10 s window; 120 s to the pickup.
    at_second(start, 60).await;
    let s = f.status("amb-1").await;
    assert_eq!(s.deployment, DeploymentState::Active);
    assert_eq!(s.task_id.as_deref(), Some(task_id.as_str()));
    assert_eq!(s.plan_status.as_deref(), Some("toPickup"));
    assert!(near(s.goal.unwrap().position(), incident(), 1.0));
    assert!(s.eta_clock.is_some());
    assert_eq!(
        s.task.as_deref(),
        Some("Evacuate wounded to hospital (Proceed to rendezvous point)")
    );
    assert!(s.locations.contains(&"hospital-1".to_string()));

    // Loading the patient until 190 s.
    at_second(start, 160).await;
    let s = f.status("amb-1").await;
    assert_eq!(s.plan_status.as_deref(), Some("pickup"));
    assert!(near(s.position, incident(), 1.0));
    assert!(s.goal.is_none());

    // 300 s to the hospital.
    at_second(start, 250).await;
    let s = f.status("amb-1").await;
    assert_eq!(s.plan_status.as_deref(), Some("toDropOff"));
    assert!(near(s.goal.unwrap().position(), hospital(), 1.0));
    assert!(!near(s.position, incident(), 100.0));

    // Handing over until 520 s.
    at_second(start, 505).await;
    let s = f.status("amb-1").await;
    assert_eq!(s.plan_status.as_deref(), Some("dropOff"));

    at_second(start, 540).await;
    let s = f.status("amb-1").await;
    assert_eq!(s.deployment, DeploymentState::Unassigned);
    assert_eq!(s.task_id, None);
    assert!(near(s.position, hospital(), 1.0));
}

#[tokio::test(start_paused = true)]
async fn test_repeat_command_restarts_evac() {
    let start = tokio::time::Instant::now();
    let mut f = TestFleet::new();
    f.add(quick_ambulance());
    place_evac(&mut f).await;

    at_second(start, 250).await;
    assert_eq!(
        f.status("amb-1").await.plan_status.as_deref(),
        Some("toDropOff")
    );

    f.command("amb-1", Message::Repeat).await;
    advance(1_000).await;
    let s = f.status("amb-1").await;
    assert_eq!(s.plan_status.as_deref(), Some("toPickup"));
    assert!(near(s.goal.unwrap().position(), incident(), 1.0));

    // The old drop-off leg never completes.
    at_second(start, 500).await;
    assert_ne!(
        f.status("amb-1").await.plan_status.as_deref(),
        Some("dropOff")
    );
}

#[tokio::test(start_paused = true)]
async fn test_road_block_holds_until_stopped() {
    let start = tokio::time::Instant::now();
    let mut f = TestFleet::new();
    f.add(ambulance("amb-1", minutes_north(incident(), 3)));

    f.requester
        .publish(f.task(incident(), 20 * MINUTE_MS, "RoadBlock"))
        .unwrap();
    f.wait_for(|e| matches!(e, RequesterEvent::Placed { .. })).await;

    at_second(start, 600).await;
    let s = f.status("amb-1").await;
    assert_eq!(s.deployment, DeploymentState::Active);
    assert_eq!(s.plan_status.as_deref(), Some("stay"));
    assert!(near(s.position, incident(), 1.0));

    f.command("amb-1", Message::Stop).await;
    f.command("amb-1", Message::Stop).await;
    let s = f.status("amb-1").await;
    assert_eq!(s.deployment, DeploymentState::Unassigned);
    assert_eq!(s.plan_status, None);
    assert!(near(s.position, incident(), 1.0));

    // Idle again, so it can be moved.
    let depot = GeoPoint::new(51.95, 4.45);
    f.command("amb-1", Message::Relocate { position: depot }).await;
    assert_eq!(f.status("amb-1").await.position, depot);
}

#[tokio::test(start_paused = true)]
async fn test_stop_mid_route_freezes_position() {
    let start = tokio::time::Instant::now();
    let mut f = TestFleet::new();
    let home = minutes_north(incident(), 10);
    f.add(ambulance("amb-1", home));

    f.requester
        .publish(f.task(incident(), 20 * MINUTE_MS, "Goto"))
        .unwrap();
    f.wait_for(|e| matches!(e, RequesterEvent::Placed { .. })).await;

    // Halfway: 10 s window plus 300 s of a 600 s trip.
    at_second(start, 310).await;
    f.command("amb-1", Message::Stop).await;
    let stopped = f.status("amb-1").await.position;
    assert!(near(stopped, minutes_north(incident(), 5), 50.0), "at {:?}", stopped);

    at_second(start, 900).await;
    let s = f.status("amb-1").await;
    assert_eq!(s.deployment, DeploymentState::Unassigned);
    assert_eq!(s.position, stopped);
}
