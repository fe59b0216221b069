//! Shared fixtures for the end-to-end scenarios

use sortie_auction::Task;
use sortie_coordinator::{
    Fleet, Message, RequesterConfig, RequesterEvent, RequesterHandle, ResourceConfig,
    ResourceStatus,
};
use sortie_core::geo::EARTH_RADIUS_M;
use sortie_core::{Address, GeoPoint, Timestamp, TokioClock, Waypoint};
use sortie_track::StraightLineRouter;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{Duration, Instant};

/// Virtual epoch every scenario starts at (2023-11-14T22:13:20Z)
pub const T0: Timestamp = 1_700_000_000_000;

/// Simulated travel speed
pub const SPEED_MPS: f64 = 10.0;

pub const MINUTE_MS: u64 = 60_000;

/// Install a test log subscriber once; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Point `meters` due north of `from`
pub fn north_of(from: GeoPoint, meters: f64) -> GeoPoint {
    GeoPoint::new(from.lat + (meters / EARTH_RADIUS_M).to_degrees(), from.lon)
}

/// Point `minutes` of travel at [`SPEED_MPS`] due north of `from`
pub fn minutes_north(from: GeoPoint, minutes: u64) -> GeoPoint {
    north_of(from, SPEED_MPS * (minutes * 60) as f64)
}

/// Incident location shared by the scenarios
pub fn incident() -> GeoPoint {
    GeoPoint::new(51.90, 4.40)
}

/// Resource config with deterministic bids
pub fn ambulance(name: &str, home: GeoPoint) -> ResourceConfig {
    ResourceConfig::new(name, "ambulance", home).with_bid_jitter(0)
}

/// A fleet on a paused clock with one requester
pub struct TestFleet {
    pub fleet: Fleet,
    pub requester: RequesterHandle,
    pub events: broadcast::Receiver<RequesterEvent>,
    pub operator: Address,
}

impl TestFleet {
    /// Must be called inside a paused-time runtime
    pub fn new() -> Self {
        Self::with_requester(RequesterConfig::default())
    }

    pub fn with_requester(config: RequesterConfig) -> Self {
        init_tracing();
        let mut fleet = Fleet::new(
            Arc::new(StraightLineRouter::new(SPEED_MPS)),
            Arc::new(TokioClock::starting_at(T0)),
        );
        let requester = fleet.spawn_requester(config).unwrap();
        let events = requester.subscribe();

        Self {
            fleet,
            requester,
            events,
            operator: Address::new("operator"),
        }
    }

    pub fn add(&mut self, config: ResourceConfig) -> Address {
        self.fleet.spawn_resource(config).unwrap()
    }

    /// Task at `target` due `deadline_in_ms` after [`T0`]
    pub fn task(&self, target: GeoPoint, deadline_in_ms: u64, plan: &str) -> Task {
        Task::new(
            Waypoint::from(target),
            T0 + deadline_in_ms,
            plan,
            self.requester.address().clone(),
        )
    }

    pub async fn command(&self, resource: &str, message: Message) {
        self.fleet
            .send(&self.operator, &Address::new(resource), message)
            .await
            .unwrap();
    }

    pub async fn status(&self, resource: &str) -> ResourceStatus {
        let snapshot = self
            .fleet
            .view(self.operator.clone())
            .snapshot("resources", Duration::from_secs(5))
            .await;
        snapshot
            .get(resource)
            .cloned()
            .unwrap_or_else(|| panic!("no status from {}", resource))
    }

    /// Next event matching `pred`, skipping others
    pub async fn wait_for<F>(&mut self, mut pred: F) -> RequesterEvent
    where
        F: FnMut(&RequesterEvent) -> bool,
    {
        let deadline = Duration::from_secs(3_600);
        tokio::time::timeout(deadline, async {
            loop {
                let event = self.events.recv().await.unwrap();
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("event did not arrive")
    }

    /// Events up to and including the first `Placed` or `Escalated`
    pub async fn until_settled(&mut self) -> Vec<RequesterEvent> {
        let mut seen = Vec::new();
        loop {
            let event = self.wait_for(|_| true).await;
            let settled = matches!(
                event,
                RequesterEvent::Placed { .. } | RequesterEvent::Escalated { .. }
            );
            seen.push(event);
            if settled {
                return seen;
            }
        }
    }
}

/// Advance the paused clock
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Advance the paused clock to `secs` after `start`
pub async fn at_second(start: Instant, secs: u64) {
    tokio::time::sleep_until(start + Duration::from_secs(secs)).await;
}

/// Whether two positions are within `meters`
pub fn near(a: GeoPoint, b: GeoPoint, meters: f64) -> bool {
    a.distance_m(&b) <= meters
}
