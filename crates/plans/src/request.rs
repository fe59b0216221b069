//! Plan construction from an assignment request.
//!
//! Assignments name a plan type and carry opaque JSON parameters. Travel
//! plans fall back to the task target when no explicit goal is given.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sortie_core::Waypoint;
use std::fmt;
use std::str::FromStr;

use crate::error::{PlanError, Result};
use crate::evac::{Evac, EvacTiming};
use crate::goto::{Goto, GotoAndStay};
use crate::plan::{Plan, PlanKind};

/// Plan types a resource can be asked to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanType {
    /// Travel to a goal
    Goto,
    /// Travel to a goal and optionally hold it
    GotoAndStay,
    /// Travel to a goal and hold it
    RoadBlock,
    /// Evacuate a casualty to a hospital
    Evac,
}

impl PlanType {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Goto => "Goto",
            PlanType::GotoAndStay => "GotoAndStay",
            PlanType::RoadBlock => "RoadBlock",
            PlanType::Evac => "Evac",
        }
    }

    /// Build a plan of this type from request parameters
    pub fn build(
        self,
        params: &Value,
        task_target: Option<&Waypoint>,
        timing: EvacTiming,
    ) -> Result<Plan> {
        let kind = match self {
            PlanType::Goto => {
                let p: TravelParams = parse(self, params)?;
                PlanKind::Goto(Goto::new(goal_or_target(self, p.goal, task_target)?))
            }
            PlanType::GotoAndStay => {
                let p: TravelParams = parse(self, params)?;
                let goal = goal_or_target(self, p.goal, task_target)?;
                PlanKind::GotoAndStay(GotoAndStay::new(
                    goal,
                    p.title.unwrap_or_else(|| GotoAndStay::TITLE.to_string()),
                    p.stay.unwrap_or(true),
                ))
            }
            PlanType::RoadBlock => {
                let p: TravelParams = parse(self, params)?;
                PlanKind::GotoAndStay(GotoAndStay::road_block(goal_or_target(
                    self,
                    p.goal,
                    task_target,
                )?))
            }
            PlanType::Evac => {
                let p: EvacParams = parse(self, params)?;
                let hospital = p.hospital.ok_or_else(|| PlanError::InvalidParams {
                    plan: self.to_string(),
                    reason: "missing hospital".to_string(),
                })?;
                let pickup = goal_or_target(self, p.pickup, task_target)?;
                let timing = EvacTiming {
                    pickup_delay_ms: p.pickup_delay_ms.unwrap_or(timing.pickup_delay_ms),
                    drop_off_delay_ms: p.drop_off_delay_ms.unwrap_or(timing.drop_off_delay_ms),
                };
                PlanKind::Evac(Evac::new(pickup, hospital, timing))
            }
        };
        Ok(Plan::new(kind))
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanType {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Goto" => Ok(PlanType::Goto),
            "GotoAndStay" => Ok(PlanType::GotoAndStay),
            "RoadBlock" => Ok(PlanType::RoadBlock),
            "Evac" => Ok(PlanType::Evac),
            other => Err(PlanError::UnknownPlanType(other.to_string())),
        }
    }
}

impl Plan {
    /// Build a plan from a plan type name and its parameters
    pub fn from_request(
        plan: &str,
        params: &Value,
        task_target: Option<&Waypoint>,
        timing: EvacTiming,
    ) -> Result<Plan> {
        plan.parse::<PlanType>()?.build(params, task_target, timing)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TravelParams {
    goal: Option<Waypoint>,
    stay: Option<bool>,
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvacParams {
    pickup: Option<Waypoint>,
    hospital: Option<Waypoint>,
    pickup_delay_ms: Option<u64>,
    drop_off_delay_ms: Option<u64>,
}

fn parse<T: for<'de> Deserialize<'de> + Default>(plan: PlanType, params: &Value) -> Result<T> {
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params.clone()).map_err(|e| PlanError::InvalidParams {
        plan: plan.to_string(),
        reason: e.to_string(),
    })
}

fn goal_or_target(
    plan: PlanType,
    goal: Option<Waypoint>,
    task_target: Option<&Waypoint>,
) -> Result<Waypoint> {
    goal.or_else(|| task_target.cloned())
        .ok_or_else(|| PlanError::InvalidParams {
            plan: plan.to_string(),
            reason: "no goal location".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PlanState;
    use serde_json::json;

    fn target() -> Waypoint {
        Waypoint::named("task-target", 51.95, 4.40)
    }

    #[test]
    fn test_goto_falls_back_to_task_target() {
        let plan = Plan::from_request("Goto", &Value::Null, Some(&target()), EvacTiming::default())
            .unwrap();
        assert_eq!(plan.name(), "Goto");
        assert_eq!(plan.locations(), vec!["task-target".to_string()]);
    }

    #[test]
    fn test_explicit_goal_wins() {
        let params = json!({ "goal": { "id": "bridge", "lat": 52.0, "lon": 4.5 } });
        let plan =
            Plan::from_request("Goto", &params, Some(&target()), EvacTiming::default()).unwrap();
        assert_eq!(plan.locations(), vec!["bridge".to_string()]);
    }

    #[test]
    fn test_road_block_is_stay_variant() {
        let plan = Plan::from_request("RoadBlock", &json!({}), Some(&target()), EvacTiming::default())
            .unwrap();
        assert_eq!(plan.name(), "GotoAndStay");
        assert_eq!(plan.title(), "Go towards goal location.");
        match plan.kind() {
            PlanKind::GotoAndStay(p) => assert!(p.stays()),
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn test_goto_and_stay_params() {
        let params = json!({ "stay": false, "title": "Sweep the dike" });
        let plan =
            Plan::from_request("GotoAndStay", &params, Some(&target()), EvacTiming::default())
                .unwrap();
        assert_eq!(plan.title(), "Sweep the dike");
        assert_eq!(plan.state(), PlanState::Init);
    }

    #[test]
    fn test_evac_requires_hospital() {
        let result = Plan::from_request("Evac", &json!({}), Some(&target()), EvacTiming::default());
        assert!(matches!(result, Err(PlanError::InvalidParams { .. })));
    }

    #[test]
    fn test_evac_delay_overrides() {
        let params = json!({
            "hospital": { "id": "hospital-2", "lat": 51.91, "lon": 4.47 },
            "pickupDelayMs": 1000
        });
        let plan = Plan::from_request("Evac", &params, Some(&target()), EvacTiming::default())
            .unwrap();
        match plan.kind() {
            PlanKind::Evac(evac) => {
                assert_eq!(evac.timing().pickup_delay_ms, 1_000);
                assert_eq!(evac.timing().drop_off_delay_ms, 120_000);
                assert_eq!(evac.pickup(), &target());
            }
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn test_unknown_plan_type() {
        let result = Plan::from_request("Teleport", &Value::Null, None, EvacTiming::default());
        assert_eq!(result.unwrap_err(), PlanError::UnknownPlanType("Teleport".to_string()));
    }

    #[test]
    fn test_missing_goal_without_target() {
        let result = Plan::from_request("Goto", &Value::Null, None, EvacTiming::default());
        assert!(matches!(result, Err(PlanError::InvalidParams { .. })));
    }

    #[test]
    fn test_malformed_params() {
        let result = Plan::from_request(
            "Goto",
            &json!({ "goal": "north" }),
            Some(&target()),
            EvacTiming::default(),
        );
        assert!(matches!(result, Err(PlanError::InvalidParams { .. })));
    }
}
