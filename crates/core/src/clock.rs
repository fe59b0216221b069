//! Wall clocks reporting Unix-epoch milliseconds.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Unix epoch milliseconds
pub type Timestamp = u64;

/// Source of the current absolute time
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in Unix epoch milliseconds
    fn now_ms(&self) -> Timestamp;
}

/// Operating system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Timestamp {
        current_timestamp_ms()
    }
}

/// Clock that advances with Tokio's timer.
///
/// The clock is anchored to an epoch time and Tokio's `Instant` at creation.
/// When Tokio time is paused (`start_paused` tests) the absolute time moves
/// only as the runtime auto-advances, so travel times and dwell delays elapse
/// instantly while staying consistent with scheduled timers.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base_epoch_ms: Timestamp,
    base_instant: tokio::time::Instant,
}

impl TokioClock {
    /// Anchor the clock at the current system time
    pub fn new() -> Self {
        Self::starting_at(current_timestamp_ms())
    }

    /// Anchor the clock at an explicit epoch time
    pub fn starting_at(epoch_ms: Timestamp) -> Self {
        Self {
            base_epoch_ms: epoch_ms,
            base_instant: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> Timestamp {
        self.base_epoch_ms + self.base_instant.elapsed().as_millis() as u64
    }
}

fn current_timestamp_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
