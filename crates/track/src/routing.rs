//! Routing service contract
//!
//! The routing engine is an external collaborator: it converts an
//! origin/destination pair into a timestamped polyline. Sortie only consumes
//! it through [`RoutingService`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sortie_core::{GeoPoint, Timestamp};
use thiserror::Error;
use tracing::debug;

/// Routing errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RoutingError {
    /// No route exists between the two points
    #[error("No route from ({from_lat}, {from_lon}) to ({to_lat}, {to_lon})")]
    Unreachable {
        /// Origin latitude
        from_lat: f64,
        /// Origin longitude
        from_lon: f64,
        /// Destination latitude
        to_lat: f64,
        /// Destination longitude
        to_lon: f64,
    },

    /// Routing engine could not be reached or failed internally
    #[error("Routing service unavailable: {0}")]
    Unavailable(String),

    /// Routing engine returned a polyline violating track invariants
    #[error("Malformed route: {0}")]
    MalformedRoute(String),
}

impl RoutingError {
    /// Build an `Unreachable` error for a leg
    pub fn unreachable(from: GeoPoint, to: GeoPoint) -> Self {
        RoutingError::Unreachable {
            from_lat: from.lat,
            from_lon: from.lon,
            to_lat: to.lat,
            to_lon: to.lon,
        }
    }
}

/// One timestamped fix of a route polyline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Longitude
    pub lon: f64,
    /// Latitude
    pub lat: f64,
    /// Elevation in meters (0 when unknown)
    pub elevation: f64,
    /// Milliseconds elapsed since the route anchor
    pub elapsed_ms: u64,
}

impl TrackPoint {
    /// Create a new fix
    pub fn new(lon: f64, lat: f64, elevation: f64, elapsed_ms: u64) -> Self {
        Self {
            lon,
            lat,
            elevation,
            elapsed_ms,
        }
    }

    /// Position of the fix
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// Result of a route computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedRoute {
    /// Fixes sorted by elapsed time, the first at 0 ms
    pub fixes: Vec<TrackPoint>,
    /// Travel time for the whole route in milliseconds
    pub total_duration_ms: u64,
}

impl ComputedRoute {
    /// Absolute arrival time for a route started at `anchor_ms`
    pub fn eta_from(&self, anchor_ms: Timestamp) -> Timestamp {
        anchor_ms + self.total_duration_ms
    }

    /// Final fix of the route
    pub fn destination(&self) -> Option<GeoPoint> {
        self.fixes.last().map(TrackPoint::position)
    }
}

/// Routing engine contract
#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Compute a route from `from` to `to`
    async fn compute_route(&self, from: GeoPoint, to: GeoPoint)
        -> Result<ComputedRoute, RoutingError>;
}

/// Great-circle travel simulator.
///
/// Moves at a constant speed along the straight segment between the two
/// points, emitting a fix every `fix_interval_ms` plus one at the destination.
#[derive(Debug, Clone)]
pub struct StraightLineRouter {
    speed_mps: f64,
    fix_interval_ms: u64,
    max_range_m: Option<f64>,
}

impl StraightLineRouter {
    /// Default fix spacing (10 seconds of travel)
    pub const DEFAULT_FIX_INTERVAL_MS: u64 = 10_000;

    /// Create a router moving at `speed_mps` meters per second
    pub fn new(speed_mps: f64) -> Self {
        Self {
            speed_mps,
            fix_interval_ms: Self::DEFAULT_FIX_INTERVAL_MS,
            max_range_m: None,
        }
    }

    /// Set the spacing between emitted fixes
    pub fn with_fix_interval(mut self, fix_interval_ms: u64) -> Self {
        self.fix_interval_ms = fix_interval_ms.max(1);
        self
    }

    /// Refuse legs longer than `max_range_m`
    pub fn with_max_range(mut self, max_range_m: f64) -> Self {
        self.max_range_m = Some(max_range_m);
        self
    }

    /// Compute the route synchronously
    pub fn plan(&self, from: GeoPoint, to: GeoPoint) -> Result<ComputedRoute, RoutingError> {
        if !(self.speed_mps > 0.0) {
            return Err(RoutingError::Unavailable(format!(
                "invalid simulated speed {} m/s",
                self.speed_mps
            )));
        }

        let distance_m = from.distance_m(&to);
        if let Some(max_range_m) = self.max_range_m {
            if distance_m > max_range_m {
                return Err(RoutingError::unreachable(from, to));
            }
        }

        let total_duration_ms = (distance_m / self.speed_mps * 1000.0).ceil() as u64;
        let mut fixes = vec![TrackPoint::new(from.lon, from.lat, 0.0, 0)];

        let mut elapsed = self.fix_interval_ms;
        while elapsed < total_duration_ms {
            let p = from.lerp(&to, elapsed as f64 / total_duration_ms as f64);
            fixes.push(TrackPoint::new(p.lon, p.lat, 0.0, elapsed));
            elapsed += self.fix_interval_ms;
        }
        if total_duration_ms > 0 {
            fixes.push(TrackPoint::new(to.lon, to.lat, 0.0, total_duration_ms));
        }

        Ok(ComputedRoute {
            fixes,
            total_duration_ms,
        })
    }
}

#[async_trait]
impl RoutingService for StraightLineRouter {
    async fn compute_route(
        &self,
        from: GeoPoint,
        to: GeoPoint,
    ) -> Result<ComputedRoute, RoutingError> {
        let route = self.plan(from, to)?;
        debug!(
            fixes = route.fixes.len(),
            duration_ms = route.total_duration_ms,
            "Simulated route computed"
        );
        Ok(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_line_duration_matches_speed() {
        // ~111.2 km at 20 m/s is ~5560 s
        let router = StraightLineRouter::new(20.0).with_fix_interval(60_000);
        let route = router
            .plan(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0))
            .unwrap();

        assert!((route.total_duration_ms as i64 - 5_559_750).abs() < 10_000);
        assert_eq!(route.fixes.first().unwrap().elapsed_ms, 0);
        assert_eq!(route.fixes.last().unwrap().elapsed_ms, route.total_duration_ms);
        assert_eq!(route.destination(), Some(GeoPoint::new(1.0, 0.0)));
    }

    #[test]
    fn test_straight_line_fixes_are_sorted() {
        let router = StraightLineRouter::new(15.0);
        let route = router
            .plan(GeoPoint::new(51.9, 4.47), GeoPoint::new(52.06, 4.64))
            .unwrap();

        assert!(route
            .fixes
            .windows(2)
            .all(|pair| pair[0].elapsed_ms < pair[1].elapsed_ms));
    }

    #[test]
    fn test_zero_length_route() {
        let router = StraightLineRouter::new(10.0);
        let here = GeoPoint::new(51.9, 4.47);
        let route = router.plan(here, here).unwrap();

        assert_eq!(route.total_duration_ms, 0);
        assert_eq!(route.fixes.len(), 1);
        assert_eq!(route.eta_from(1_000), 1_000);
    }

    #[test]
    fn test_out_of_range_is_unreachable() {
        let router = StraightLineRouter::new(10.0).with_max_range(1_000.0);
        let result = router.plan(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        assert!(matches!(result, Err(RoutingError::Unreachable { .. })));
    }

    #[test]
    fn test_invalid_speed_is_unavailable() {
        let router = StraightLineRouter::new(0.0);
        let result = router.plan(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        assert!(matches!(result, Err(RoutingError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_router_through_trait_object() {
        let router: Box<dyn RoutingService> = Box::new(StraightLineRouter::new(10.0));
        let route = router
            .compute_route(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.01))
            .await
            .unwrap();
        assert!(route.total_duration_ms > 0);
    }
}
