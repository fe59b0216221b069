//! Travel-to-goal plans

use serde::{Deserialize, Serialize};
use sortie_core::Waypoint;

use crate::error::{PlanError, Result};
use crate::state::{PlanEvent, PlanState};

/// States of a [`Goto`] plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GotoState {
    /// Not started
    Init,
    /// Traveling towards the goal
    Travel,
    /// Goal reached
    Finished,
}

impl From<GotoState> for PlanState {
    fn from(state: GotoState) -> Self {
        match state {
            GotoState::Init => PlanState::Init,
            GotoState::Travel => PlanState::Travel,
            GotoState::Finished => PlanState::Finished,
        }
    }
}

impl TryFrom<PlanState> for GotoState {
    type Error = PlanError;

    fn try_from(state: PlanState) -> Result<Self> {
        match state {
            PlanState::Init => Ok(GotoState::Init),
            PlanState::Travel => Ok(GotoState::Travel),
            PlanState::Finished => Ok(GotoState::Finished),
            other => Err(PlanError::InvalidState {
                plan: Goto::NAME.to_string(),
                state: other,
            }),
        }
    }
}

/// Travel to a single goal, then finish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goto {
    goal: Waypoint,
    state: GotoState,
}

impl Goto {
    /// Plan type name
    pub const NAME: &'static str = "Goto";

    /// Plan title
    pub const TITLE: &'static str = "Go to goal location.";

    /// Create a plan traveling to `goal`
    pub fn new(goal: Waypoint) -> Self {
        Self {
            goal,
            state: GotoState::Init,
        }
    }

    /// Current state
    pub fn state(&self) -> GotoState {
        self.state
    }

    /// Goal of the plan
    pub fn goal(&self) -> &Waypoint {
        &self.goal
    }

    /// Apply `event`; returns the entered state, if any
    pub fn advance(&mut self, event: PlanEvent) -> Result<Option<PlanState>> {
        let next = match event {
            PlanEvent::Arrival => match self.state {
                GotoState::Init => Some(GotoState::Travel),
                GotoState::Travel => Some(GotoState::Finished),
                GotoState::Finished => None,
            },
            PlanEvent::Enter(state) => Some(GotoState::try_from(state)?),
        };

        if let Some(next) = next {
            self.state = next;
        }
        Ok(next.map(PlanState::from))
    }

    /// Goal while traveling
    pub fn target_location(&self) -> Option<&Waypoint> {
        match self.state {
            GotoState::Travel => Some(&self.goal),
            GotoState::Init | GotoState::Finished => None,
        }
    }

    /// Description of the current state
    pub fn current_title(&self) -> &'static str {
        match self.state {
            GotoState::Init => "Task not started",
            GotoState::Travel => "Traveling towards goal",
            GotoState::Finished => "Task finished",
        }
    }
}

/// States of a [`GotoAndStay`] plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GotoAndStayState {
    /// Not started
    Init,
    /// Traveling towards the location
    Travel,
    /// Holding the location until stopped or repeated
    Stay,
    /// Location reached without holding
    Finished,
}

impl From<GotoAndStayState> for PlanState {
    fn from(state: GotoAndStayState) -> Self {
        match state {
            GotoAndStayState::Init => PlanState::Init,
            GotoAndStayState::Travel => PlanState::Travel,
            GotoAndStayState::Stay => PlanState::Stay,
            GotoAndStayState::Finished => PlanState::Finished,
        }
    }
}

impl TryFrom<PlanState> for GotoAndStayState {
    type Error = PlanError;

    fn try_from(state: PlanState) -> Result<Self> {
        match state {
            PlanState::Init => Ok(GotoAndStayState::Init),
            PlanState::Travel => Ok(GotoAndStayState::Travel),
            PlanState::Stay => Ok(GotoAndStayState::Stay),
            PlanState::Finished => Ok(GotoAndStayState::Finished),
            other => Err(PlanError::InvalidState {
                plan: GotoAndStay::NAME.to_string(),
                state: other,
            }),
        }
    }
}

/// Travel to a location and optionally hold it.
///
/// With `stay` set, the plan parks in `stay` after arriving and never leaves
/// it on its own; only a stop or repeat request ends it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GotoAndStay {
    goal: Waypoint,
    title: String,
    stay: bool,
    state: GotoAndStayState,
}

impl GotoAndStay {
    /// Plan type name
    pub const NAME: &'static str = "GotoAndStay";

    /// Default title
    pub const TITLE: &'static str = "Go towards goal location.";

    /// Create a plan traveling to `goal`
    pub fn new(goal: Waypoint, title: impl Into<String>, stay: bool) -> Self {
        Self {
            goal,
            title: title.into(),
            stay,
            state: GotoAndStayState::Init,
        }
    }

    /// Road block preset: hold the location once reached
    pub fn road_block(goal: Waypoint) -> Self {
        Self::new(goal, Self::TITLE, true)
    }

    /// Current state
    pub fn state(&self) -> GotoAndStayState {
        self.state
    }

    /// Goal of the plan
    pub fn goal(&self) -> &Waypoint {
        &self.goal
    }

    /// Whether the plan holds the location after arriving
    pub fn stays(&self) -> bool {
        self.stay
    }

    /// Plan title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Apply `event`; returns the entered state, if any
    pub fn advance(&mut self, event: PlanEvent) -> Result<Option<PlanState>> {
        let next = match event {
            PlanEvent::Arrival => match self.state {
                GotoAndStayState::Init => Some(GotoAndStayState::Travel),
                GotoAndStayState::Travel if self.stay => Some(GotoAndStayState::Stay),
                GotoAndStayState::Travel => Some(GotoAndStayState::Finished),
                GotoAndStayState::Stay | GotoAndStayState::Finished => None,
            },
            PlanEvent::Enter(state) => Some(GotoAndStayState::try_from(state)?),
        };

        if let Some(next) = next {
            self.state = next;
        }
        Ok(next.map(PlanState::from))
    }

    /// Goal while traveling
    pub fn target_location(&self) -> Option<&Waypoint> {
        match self.state {
            GotoAndStayState::Travel => Some(&self.goal),
            _ => None,
        }
    }

    /// Description of the current state
    pub fn current_title(&self) -> &'static str {
        match self.state {
            GotoAndStayState::Init => "Task not started",
            GotoAndStayState::Travel => "Traveling towards location",
            GotoAndStayState::Stay => "Keep location",
            GotoAndStayState::Finished => "Task finished",
        }
    }
}
