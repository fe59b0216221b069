//! Time-anchored route track with position interpolation.

use serde::{Deserialize, Serialize};
use sortie_core::{GeoPoint, Timestamp};
use thiserror::Error;

use crate::routing::{ComputedRoute, TrackPoint};

/// Track errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TrackError {
    /// First fix is not at the route anchor
    #[error("First fix must be at 0 ms, got {0} ms")]
    FirstFixNotAnchored(u64),

    /// Fixes are not sorted by elapsed time
    #[error("Fixes out of order at index {index}")]
    Unsorted {
        /// Index of the first out-of-order fix
        index: usize,
    },
}

/// Where a resource is along its current route.
///
/// Holds the fixes of the active route relative to an anchor time. Without a
/// route the track reports a static position (the last known one).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteTrack {
    /// Route start time (Unix epoch milliseconds)
    anchor_ms: Timestamp,

    /// Fixes sorted by elapsed time
    fixes: Vec<TrackPoint>,

    /// Index of the last fix consulted
    cursor: usize,

    /// Travel time of the whole route
    total_duration_ms: u64,

    /// Last reported (or statically set) position
    last_position: GeoPoint,

    /// Set once a query at or past the eta returned the final fix
    exhausted: bool,
}

impl RouteTrack {
    /// Create a track for a resource standing still at `position`
    pub fn stationary(position: GeoPoint) -> Self {
        Self {
            anchor_ms: 0,
            fixes: Vec::new(),
            cursor: 0,
            total_duration_ms: 0,
            last_position: position,
            exhausted: false,
        }
    }

    /// Replace the route; the cursor restarts at the first fix
    pub fn start_route(
        &mut self,
        fixes: Vec<TrackPoint>,
        total_duration_ms: u64,
        anchor_ms: Timestamp,
    ) -> Result<(), TrackError> {
        validate(&fixes)?;

        self.anchor_ms = anchor_ms;
        self.fixes = fixes;
        self.cursor = 0;
        self.total_duration_ms = total_duration_ms;
        self.exhausted = false;
        if let Some(first) = self.fixes.first() {
            self.last_position = first.position();
        }
        Ok(())
    }

    /// Replace the route with a computed one anchored at `anchor_ms`
    pub fn start(&mut self, route: ComputedRoute, anchor_ms: Timestamp) -> Result<(), TrackError> {
        self.start_route(route.fixes, route.total_duration_ms, anchor_ms)
    }

    /// Drop the route, freezing the resource where it is at `now`
    pub fn clear(&mut self, now: Timestamp) {
        let position = self.position_at(now);
        self.freeze(position, now);
    }

    /// Drop the route and place the resource at `position`
    pub fn relocate(&mut self, position: GeoPoint, now: Timestamp) {
        self.freeze(position, now);
    }

    fn freeze(&mut self, position: GeoPoint, now: Timestamp) {
        self.anchor_ms = now;
        self.fixes.clear();
        self.cursor = 0;
        self.total_duration_ms = 0;
        self.last_position = position;
        self.exhausted = false;
    }

    /// Whether a route is loaded
    pub fn has_route(&self) -> bool {
        !self.fixes.is_empty()
    }

    /// Position at `now`.
    ///
    /// At or past the eta this is the final fix and the route is marked
    /// exhausted. Before that, the position is interpolated linearly between
    /// the fixes surrounding `now`. Without a route the last known position
    /// is returned.
    pub fn position_at(&mut self, now: Timestamp) -> GeoPoint {
        let Some(last) = self.fixes.last().copied() else {
            return self.last_position;
        };

        if now >= self.eta_time() {
            self.exhausted = true;
            self.cursor = self.fixes.len() - 1;
            self.last_position = last.position();
            return self.last_position;
        }

        let elapsed = now.saturating_sub(self.anchor_ms);

        // Queries earlier than the cursor fix rescan from the start.
        if self.fixes[self.cursor].elapsed_ms > elapsed {
            self.cursor = 0;
        }

        let mut position = last.position();
        for i in self.cursor..self.fixes.len() {
            let fix = self.fixes[i];
            if fix.elapsed_ms > elapsed {
                position = match i.checked_sub(1).map(|p| self.fixes[p]) {
                    Some(prev) => interpolate(&prev, &fix, elapsed),
                    None => fix.position(),
                };
                // Keep the preceding fix so a slightly earlier query still finds it.
                self.cursor = i.saturating_sub(1);
                self.last_position = position;
                return position;
            }
        }

        // Total duration extends past the final fix's timestamp.
        self.cursor = self.fixes.len() - 1;
        self.last_position = position;
        position
    }

    /// Absolute arrival time of the current route
    pub fn eta_time(&self) -> Timestamp {
        self.anchor_ms + self.total_duration_ms
    }

    /// Whether the route end has been reached at `now`
    pub fn is_arrived(&self, now: Timestamp) -> bool {
        now >= self.eta_time()
    }

    /// Whether a query already returned the final fix
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Final fix of the route, if any
    pub fn destination(&self) -> Option<GeoPoint> {
        self.fixes.last().map(TrackPoint::position)
    }

    /// Fixes still ahead at `now`
    pub fn remaining(&self, now: Timestamp) -> Vec<GeoPoint> {
        let elapsed = now.saturating_sub(self.anchor_ms);
        self.fixes
            .iter()
            .filter(|fix| fix.elapsed_ms > elapsed)
            .map(TrackPoint::position)
            .collect()
    }

    /// Route anchor time
    pub fn anchor_ms(&self) -> Timestamp {
        self.anchor_ms
    }

    /// Index of the last fix consulted
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

fn validate(fixes: &[TrackPoint]) -> Result<(), TrackError> {
    if let Some(first) = fixes.first() {
        if first.elapsed_ms != 0 {
            return Err(TrackError::FirstFixNotAnchored(first.elapsed_ms));
        }
    }
    if let Some(index) = fixes
        .windows(2)
        .position(|pair| pair[1].elapsed_ms < pair[0].elapsed_ms)
    {
        return Err(TrackError::Unsorted { index: index + 1 });
    }
    Ok(())
}

fn interpolate(prev: &TrackPoint, next: &TrackPoint, elapsed: u64) -> GeoPoint {
    let span = (next.elapsed_ms - prev.elapsed_ms) as f64;
    let part = elapsed.saturating_sub(prev.elapsed_ms) as f64;
    prev.position().lerp(&next.position(), part / span)
}
