//! Commands issued by the UI layer.
//!
//! The UI never mutates simulation entities directly. It submits
//! [`PlayerCommand`]s, which are validated on submission and applied at
//! the start of the next orchestrator cycle.

use serde::{Deserialize, Serialize};

use crate::math::TilePos;
use crate::mission::{Mission, MissionKind};
use crate::state_ref::StateRef;
use crate::vehicle::Vehicle;

/// A mission requested by the player, resolved against the vehicle's
/// state when it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissionOrder {
    /// Fly to a tile.
    GotoLocation(TilePos),
    /// Fly to a building and land.
    GotoBuilding(String),
    /// Leave the city through a portal.
    GotoPortal(TilePos),
    /// Follow a vehicle.
    FollowVehicle(String),
    /// Attack a vehicle.
    AttackVehicle(String),
    /// Attack a building.
    AttackBuilding(String),
    /// Wait.
    Snooze(u64),
    /// Patrol random tiles.
    Patrol(u32),
    /// Infiltrate a building.
    Infiltrate(String),
    /// Subvert a building.
    Subvert(String),
}

impl MissionOrder {
    /// Building referenced by this order.
    #[must_use]
    pub fn building(&self) -> Option<&str> {
        match self {
            Self::GotoBuilding(b)
            | Self::AttackBuilding(b)
            | Self::Infiltrate(b)
            | Self::Subvert(b) => Some(b),
            _ => None,
        }
    }

    /// Vehicle referenced by this order.
    #[must_use]
    pub fn target_vehicle(&self) -> Option<&str> {
        match self {
            Self::FollowVehicle(v) | Self::AttackVehicle(v) => Some(v),
            _ => None,
        }
    }

    /// Expand into missions for `vehicle`, adding take-off and landing
    /// manoeuvres as its state requires.
    #[must_use]
    pub fn build(&self, vehicle: &Vehicle) -> Vec<Mission> {
        match self {
            Self::GotoLocation(t) => Mission::goto_location(vehicle, *t),
            Self::GotoBuilding(b) => Mission::goto_building(vehicle, StateRef::new(b.as_str())),
            Self::GotoPortal(t) => Mission::goto_portal(vehicle, *t),
            Self::FollowVehicle(v) => Mission::follow_vehicle(vehicle, StateRef::new(v.as_str())),
            Self::AttackVehicle(v) => Mission::attack_vehicle(vehicle, StateRef::new(v.as_str())),
            Self::AttackBuilding(b) => {
                Mission::attack_building(vehicle, StateRef::new(b.as_str()))
            }
            Self::Snooze(ticks) => vec![Mission::snooze(*ticks)],
            Self::Patrol(legs) => Mission::departing(vehicle, Mission::patrol(*legs)),
            Self::Infiltrate(b) => {
                Mission::departing(vehicle, Mission::infiltrate(StateRef::new(b.as_str())))
            }
            Self::Subvert(b) => {
                Mission::departing(vehicle, Mission::subvert(StateRef::new(b.as_str())))
            }
        }
    }

    /// Expand a sequence of orders.
    ///
    /// Each order is resolved against the state the vehicle will be in
    /// after the previous ones, so an order following a landing starts
    /// with a take-off.
    #[must_use]
    pub fn build_sequence(vehicle: &Vehicle, orders: &[Self]) -> Vec<Mission> {
        let mut probe = vehicle.clone();
        let mut missions = Vec::new();
        for order in orders {
            let built = order.build(&probe);
            match built.last().map(|m| &m.kind) {
                Some(MissionKind::Land { target, .. }) => {
                    probe.currently_landed_building = target.clone();
                }
                Some(MissionKind::Snooze { .. }) | None => {}
                Some(_) => probe.currently_landed_building.clear(),
            }
            missions.extend(built);
        }
        missions
    }
}

/// A command from the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerCommand {
    /// Put an order ahead of the vehicle's active mission.
    PushMissionFront {
        /// Vehicle id.
        vehicle: String,
        /// Order to run.
        order: MissionOrder,
    },
    /// Queue an order after the vehicle's existing missions.
    PushMissionBack {
        /// Vehicle id.
        vehicle: String,
        /// Order to run.
        order: MissionOrder,
    },
    /// Replace the vehicle's missions.
    ReplaceMissions {
        /// Vehicle id.
        vehicle: String,
        /// Orders to run, in sequence.
        orders: Vec<MissionOrder>,
    },
    /// Switch the active city between the human and alien cities.
    ToggleActiveCity,
}

impl PlayerCommand {
    /// Vehicle this command addresses.
    #[must_use]
    pub fn vehicle(&self) -> Option<&str> {
        match self {
            Self::PushMissionFront { vehicle, .. }
            | Self::PushMissionBack { vehicle, .. }
            | Self::ReplaceMissions { vehicle, .. } => Some(vehicle),
            Self::ToggleActiveCity => None,
        }
    }

    /// Orders carried by this command.
    #[must_use]
    pub fn orders(&self) -> &[MissionOrder] {
        match self {
            Self::PushMissionFront { order, .. } | Self::PushMissionBack { order, .. } => {
                std::slice::from_ref(order)
            }
            Self::ReplaceMissions { orders, .. } => orders,
            Self::ToggleActiveCity => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::VehicleType;

    fn parked() -> Vehicle {
        let kind = VehicleType {
            id: "HAWK".into(),
            name: "Hawk".into(),
            health: 100,
            speed: 8,
            aggressiveness: 3,
            default_equipment: Vec::new(),
            num_created: 0,
        };
        let mut v = Vehicle::new("VEHICLE_1", &kind, "ORG_PLAYER".into(), "CITY".into());
        v.currently_landed_building = "BLD_HQ".into();
        v
    }

    fn names(missions: &[Mission]) -> Vec<&'static str> {
        missions.iter().map(Mission::name).collect()
    }

    #[test]
    fn test_snooze_needs_no_take_off() {
        assert_eq!(names(&MissionOrder::Snooze(5).build(&parked())), vec!["Snooze"]);
    }

    #[test]
    fn test_sequence_tracks_landing() {
        let orders = [
            MissionOrder::GotoBuilding("BLD_A".into()),
            MissionOrder::GotoLocation(TilePos::new(1, 1, 3)),
            MissionOrder::Patrol(2),
        ];
        let missions = MissionOrder::build_sequence(&parked(), &orders);
        assert_eq!(
            names(&missions),
            vec!["TakeOff", "GotoBuilding", "Land", "TakeOff", "GotoLocation", "Patrol"]
        );
        match &missions[3].kind {
            MissionKind::TakeOff { from, .. } => assert_eq!(from, &StateRef::new("BLD_A")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_command_accessors() {
        let cmd = PlayerCommand::PushMissionBack {
            vehicle: "VEHICLE_1".into(),
            order: MissionOrder::Infiltrate("BLD_A".into()),
        };
        assert_eq!(cmd.vehicle(), Some("VEHICLE_1"));
        assert_eq!(cmd.orders()[0].building(), Some("BLD_A"));
        assert!(PlayerCommand::ToggleActiveCity.orders().is_empty());
    }
}
