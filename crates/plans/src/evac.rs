//! Casualty evacuation plan

use serde::{Deserialize, Serialize};
use sortie_core::Waypoint;

use crate::error::{PlanError, Result};
use crate::state::{PlanEvent, PlanState};

/// States of an [`Evac`] plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EvacState {
    /// Not started
    Init,
    /// Traveling to the rendezvous point
    ToPickup,
    /// Loading the patient
    Pickup,
    /// Traveling to the hospital
    ToDropOff,
    /// Handing over the patient
    DropOff,
    /// Patient delivered
    Finished,
}

impl From<EvacState> for PlanState {
    fn from(state: EvacState) -> Self {
        match state {
            EvacState::Init => PlanState::Init,
            EvacState::ToPickup => PlanState::ToPickup,
            EvacState::Pickup => PlanState::Pickup,
            EvacState::ToDropOff => PlanState::ToDropOff,
            EvacState::DropOff => PlanState::DropOff,
            EvacState::Finished => PlanState::Finished,
        }
    }
}

impl TryFrom<PlanState> for EvacState {
    type Error = PlanError;

    fn try_from(state: PlanState) -> Result<Self> {
        match state {
            PlanState::Init => Ok(EvacState::Init),
            PlanState::ToPickup => Ok(EvacState::ToPickup),
            PlanState::Pickup => Ok(EvacState::Pickup),
            PlanState::ToDropOff => Ok(EvacState::ToDropOff),
            PlanState::DropOff => Ok(EvacState::DropOff),
            PlanState::Finished => Ok(EvacState::Finished),
            other => Err(PlanError::InvalidState {
                plan: Evac::NAME.to_string(),
                state: other,
            }),
        }
    }
}

/// Dwell times of an evacuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvacTiming {
    /// Time spent loading the patient
    #[serde(default = "default_pickup_delay_ms")]
    pub pickup_delay_ms: u64,

    /// Time spent handing over the patient
    #[serde(default = "default_drop_off_delay_ms")]
    pub drop_off_delay_ms: u64,
}

fn default_pickup_delay_ms() -> u64 {
    160_000
}

fn default_drop_off_delay_ms() -> u64 {
    120_000
}

impl Default for EvacTiming {
    fn default() -> Self {
        Self {
            pickup_delay_ms: default_pickup_delay_ms(),
            drop_off_delay_ms: default_drop_off_delay_ms(),
        }
    }
}

/// Pick up a casualty and deliver them to a hospital.
///
/// The two dwell states advance on their own after the configured delays;
/// only the travel legs wait for an arrival.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evac {
    pickup: Waypoint,
    hospital: Waypoint,
    timing: EvacTiming,
    state: EvacState,
}

impl Evac {
    /// Plan type name
    pub const NAME: &'static str = "Evac";

    /// Plan title
    pub const TITLE: &'static str = "Evacuate wounded to hospital";

    /// Create an evacuation from `pickup` to `hospital`
    pub fn new(pickup: Waypoint, hospital: Waypoint, timing: EvacTiming) -> Self {
        Self {
            pickup,
            hospital,
            timing,
            state: EvacState::Init,
        }
    }

    /// Current state
    pub fn state(&self) -> EvacState {
        self.state
    }

    /// Dwell times
    pub fn timing(&self) -> EvacTiming {
        self.timing
    }

    /// Apply `event`; returns the entered state, if any
    pub fn advance(&mut self, event: PlanEvent) -> Result<Option<PlanState>> {
        let next = match event {
            PlanEvent::Arrival => match self.state {
                EvacState::Init => Some(EvacState::ToPickup),
                EvacState::ToPickup => Some(EvacState::Pickup),
                EvacState::ToDropOff => Some(EvacState::DropOff),
                EvacState::Pickup | EvacState::DropOff | EvacState::Finished => None,
            },
            PlanEvent::Enter(state) => Some(EvacState::try_from(state)?),
        };

        if let Some(next) = next {
            self.state = next;
        }
        Ok(next.map(PlanState::from))
    }

    /// Delayed transition owed by the current state: `(delay, next state)`
    pub fn dwell(&self) -> Option<(u64, PlanState)> {
        match self.state {
            EvacState::Pickup => Some((self.timing.pickup_delay_ms, PlanState::ToDropOff)),
            EvacState::DropOff => Some((self.timing.drop_off_delay_ms, PlanState::Finished)),
            _ => None,
        }
    }

    /// Pickup point while heading there, hospital while heading there
    pub fn target_location(&self) -> Option<&Waypoint> {
        match self.state {
            EvacState::ToPickup => Some(&self.pickup),
            EvacState::ToDropOff => Some(&self.hospital),
            _ => None,
        }
    }

    /// Description of the current state
    pub fn current_title(&self) -> &'static str {
        match self.state {
            EvacState::Init => "Task not started",
            EvacState::ToPickup => "Proceed to rendezvous point",
            EvacState::Pickup => "Pickup patient",
            EvacState::ToDropOff => "Proceed to hospital",
            EvacState::DropOff => "Drop off patient",
            EvacState::Finished => "Task finished",
        }
    }

    /// Pickup point
    pub fn pickup(&self) -> &Waypoint {
        &self.pickup
    }

    /// Drop-off point
    pub fn hospital(&self) -> &Waypoint {
        &self.hospital
    }
}
