//! Plan state machine shared by all plan types.
//!
//! A [`Plan`] owns one concrete variant and the triggers registered against
//! its states. Every state entry, whether caused by an arrival or by an
//! explicit state change, dispatches the registered triggers through the
//! scheduler (delay 0, registration order) and then schedules any dwell
//! transition the variant owes.

use serde::{Deserialize, Serialize};
use sortie_core::{Scheduler, Waypoint};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::Result;
use crate::evac::Evac;
use crate::goto::{Goto, GotoAndStay};
use crate::state::{PlanEvent, PlanState, Trigger};

/// Concrete plan variant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlanKind {
    /// Travel to a goal
    Goto(Goto),
    /// Travel to a goal and optionally hold it
    GotoAndStay(GotoAndStay),
    /// Evacuate a casualty
    Evac(Evac),
}

/// One assignment's lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    kind: PlanKind,
    triggers: BTreeMap<PlanState, Vec<Trigger>>,
}

impl Plan {
    /// Wrap a plan variant with no triggers registered
    pub fn new(kind: PlanKind) -> Self {
        Self {
            kind,
            triggers: BTreeMap::new(),
        }
    }

    /// Concrete variant
    pub fn kind(&self) -> &PlanKind {
        &self.kind
    }

    /// Plan type name
    pub fn name(&self) -> &'static str {
        match &self.kind {
            PlanKind::Goto(_) => Goto::NAME,
            PlanKind::GotoAndStay(_) => GotoAndStay::NAME,
            PlanKind::Evac(_) => Evac::NAME,
        }
    }

    /// Register `trigger` to be dispatched whenever the plan enters `state`
    pub fn on_state_change(&mut self, state: PlanState, trigger: Trigger) {
        self.triggers.entry(state).or_default().push(trigger);
    }

    /// Triggers registered for `state`, in registration order
    pub fn triggers_for(&self, state: PlanState) -> &[Trigger] {
        self.triggers.get(&state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Enter `state`, dispatching its triggers and any dwell transition
    pub fn do_state_change(
        &mut self,
        state: PlanState,
        scheduler: &dyn Scheduler<Trigger>,
    ) -> Result<()> {
        self.apply(PlanEvent::Enter(state), scheduler).map(|_| ())
    }

    /// The resource reached the current target.
    ///
    /// Returns the entered state, or `None` when the plan ignores arrivals in
    /// its current state (dwelling, holding, finished). Repeated calls without
    /// a new target are therefore harmless.
    pub fn arrival(&mut self, scheduler: &dyn Scheduler<Trigger>) -> Option<PlanState> {
        // Arrivals never name a state, so the transition tables cannot fail.
        self.apply(PlanEvent::Arrival, scheduler).ok().flatten()
    }

    /// Re-enter `init` and start the first leg again
    pub fn restart(&mut self, scheduler: &dyn Scheduler<Trigger>) -> Option<PlanState> {
        if self.do_state_change(PlanState::Init, scheduler).is_err() {
            return None;
        }
        self.arrival(scheduler)
    }

    fn apply(
        &mut self,
        event: PlanEvent,
        scheduler: &dyn Scheduler<Trigger>,
    ) -> Result<Option<PlanState>> {
        let entered = match &mut self.kind {
            PlanKind::Goto(plan) => plan.advance(event)?,
            PlanKind::GotoAndStay(plan) => plan.advance(event)?,
            PlanKind::Evac(plan) => plan.advance(event)?,
        };

        let Some(state) = entered else {
            return Ok(None);
        };

        debug!(plan = self.name(), state = %state, "Plan state change");

        for trigger in self.triggers_for(state) {
            scheduler.after(0, *trigger);
        }

        if let PlanKind::Evac(evac) = &self.kind {
            if let Some((delay_ms, next)) = evac.dwell() {
                scheduler.after(delay_ms, Trigger::StateChange(next));
            }
        }

        Ok(Some(state))
    }

    /// Current state
    pub fn state(&self) -> PlanState {
        match &self.kind {
            PlanKind::Goto(plan) => plan.state().into(),
            PlanKind::GotoAndStay(plan) => plan.state().into(),
            PlanKind::Evac(plan) => plan.state().into(),
        }
    }

    /// Name of the current state
    pub fn status(&self) -> &'static str {
        self.state().as_str()
    }

    /// Whether the plan reached its terminal state
    pub fn is_finished(&self) -> bool {
        self.state() == PlanState::Finished
    }

    /// Destination of the active travel leg, if any
    pub fn target_location(&self) -> Option<&Waypoint> {
        match &self.kind {
            PlanKind::Goto(plan) => plan.target_location(),
            PlanKind::GotoAndStay(plan) => plan.target_location(),
            PlanKind::Evac(plan) => plan.target_location(),
        }
    }

    /// Plan title
    pub fn title(&self) -> &str {
        match &self.kind {
            PlanKind::Goto(_) => Goto::TITLE,
            PlanKind::GotoAndStay(plan) => plan.title(),
            PlanKind::Evac(_) => Evac::TITLE,
        }
    }

    /// Description of the current state
    pub fn current_title(&self) -> &'static str {
        match &self.kind {
            PlanKind::Goto(plan) => plan.current_title(),
            PlanKind::GotoAndStay(plan) => plan.current_title(),
            PlanKind::Evac(plan) => plan.current_title(),
        }
    }

    /// "title (current state description)"
    pub fn description(&self) -> String {
        format!("{} ({})", self.title(), self.current_title())
    }

    /// Identifiers of the points of interest this plan visits
    pub fn locations(&self) -> Vec<String> {
        let waypoints: Vec<&Waypoint> = match &self.kind {
            PlanKind::Goto(plan) => vec![plan.goal()],
            PlanKind::GotoAndStay(plan) => vec![plan.goal()],
            PlanKind::Evac(plan) => vec![plan.hospital(), plan.pickup()],
        };
        waypoints.into_iter().filter_map(|w| w.id.clone()).collect()
    }
}
