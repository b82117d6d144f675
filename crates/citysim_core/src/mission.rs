//! Per-vehicle mission state machine.
//!
//! Each vehicle owns a queue of [`Mission`]s; the front one is active.
//! [`update_missions`] drives the queue once per orchestrator cycle:
//!
//! 1. an active mission that has not been started yet runs
//!    [`Mission::start`] (exactly once),
//! 2. the active mission is updated with the elapsed ticks,
//! 3. while the active mission reports [`Mission::is_finished`], it is
//!    popped and its successor is started.
//!
//! An empty queue means the vehicle holds position.
//!
//! Missions never touch other entities directly. Anything that affects a
//! building or another city is recorded as a [`MissionEvent`] and applied
//! by the orchestrator after every vehicle has been updated.
//!
//! # Example
//!
//! ```
//! use citysim_core::mission::{Mission, MissionKind};
//!
//! let snooze = Mission::snooze(120);
//! assert_eq!(snooze.name(), "Snooze");
//! assert!(matches!(snooze.kind, MissionKind::Snooze { remaining: 120 }));
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::city::{Building, City};
use crate::math::{Fixed, TilePos, Vec3Fixed};
use crate::pathfinding::PathPlanner;
use crate::rng::SimRng;
use crate::state_ref::{Registry, StateRef};
use crate::time::TICKS_PER_SECOND;
use crate::vehicle::{Vehicle, VehicleType};

/// Ticks spent lifting off a landing pad.
pub const TAKE_OFF_TICKS: u64 = TICKS_PER_SECOND;

/// Ticks spent settling onto a landing pad.
pub const LAND_TICKS: u64 = TICKS_PER_SECOND;

/// Waypoints visited by a default patrol.
pub const DEFAULT_PATROL_LEGS: u32 = 10;

/// Random destinations tried per patrol leg before the patrol gives up.
const PATROL_ATTEMPTS: usize = 8;

/// Behaviour-specific payload of a mission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissionKind {
    /// Fly to a tile.
    GotoLocation {
        /// Destination tile.
        target: TilePos,
    },
    /// Fly to a building's landing pad.
    GotoBuilding {
        /// Destination building.
        target: StateRef<Building>,
    },
    /// Stay close to another vehicle until it leaves the map.
    FollowVehicle {
        /// Vehicle to follow.
        target: StateRef<Vehicle>,
    },
    /// Chase another vehicle until it is destroyed or leaves the map.
    AttackVehicle {
        /// Vehicle to attack.
        target: StateRef<Vehicle>,
    },
    /// Fly to a building to attack it.
    AttackBuilding {
        /// Building to attack.
        target: StateRef<Building>,
    },
    /// Wait in place.
    Snooze {
        /// Ticks left to wait.
        remaining: u64,
    },
    /// Leave a building onto the city map.
    TakeOff {
        /// Building being left.
        from: StateRef<Building>,
        /// Ticks left in the manoeuvre.
        remaining: u64,
    },
    /// Park inside a building.
    Land {
        /// Building to park in.
        target: StateRef<Building>,
        /// Ticks left in the manoeuvre.
        remaining: u64,
    },
    /// Fall to the ground.
    Crash,
    /// Visit random tiles.
    Patrol {
        /// Legs still to fly.
        remaining_legs: u32,
        /// Destination of the current leg.
        target: Option<TilePos>,
    },
    /// Fly to a portal and leave through it.
    GotoPortal {
        /// Portal tile.
        target: TilePos,
    },
    /// Fly to a building and infiltrate it.
    Infiltrate {
        /// Building to infiltrate.
        target: StateRef<Building>,
    },
    /// Fly to a building and subvert it.
    Subvert {
        /// Building to subvert.
        target: StateRef<Building>,
    },
}

impl MissionKind {
    /// Display name of this mission kind.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GotoLocation { .. } => "GotoLocation",
            Self::GotoBuilding { .. } => "GotoBuilding",
            Self::FollowVehicle { .. } => "FollowVehicle",
            Self::AttackVehicle { .. } => "AttackVehicle",
            Self::AttackBuilding { .. } => "AttackBuilding",
            Self::Snooze { .. } => "Snooze",
            Self::TakeOff { .. } => "TakeOff",
            Self::Land { .. } => "Land",
            Self::Crash => "Crash",
            Self::Patrol { .. } => "Patrol",
            Self::GotoPortal { .. } => "GotoPortal",
            Self::Infiltrate { .. } => "Infiltrate",
            Self::Subvert { .. } => "Subvert",
        }
    }

    /// Whether this mission moves the vehicle along a planned path.
    #[must_use]
    pub const fn follows_path(&self) -> bool {
        !matches!(
            self,
            Self::Snooze { .. } | Self::TakeOff { .. } | Self::Land { .. }
        )
    }

    /// Whether this mission can run while the vehicle is off the map.
    #[must_use]
    pub const fn runs_off_map(&self) -> bool {
        matches!(self, Self::TakeOff { .. } | Self::Snooze { .. })
    }

    /// Building targeted by this mission, if any.
    #[must_use]
    pub const fn target_building(&self) -> Option<&StateRef<Building>> {
        match self {
            Self::GotoBuilding { target }
            | Self::AttackBuilding { target }
            | Self::Land { target, .. }
            | Self::Infiltrate { target }
            | Self::Subvert { target } => Some(target),
            _ => None,
        }
    }
}

/// Lazily computed route for a mission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlannedPath {
    /// No path requested yet.
    #[default]
    NotPlanned,
    /// Remaining waypoints; empty once the destination is reached.
    Planned(VecDeque<TilePos>),
    /// The planner found no route within budget.
    Failed,
}

/// Side effects produced by missions, applied after the vehicle phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissionEvent {
    /// A mission finished normally.
    Completed {
        /// Vehicle that ran the mission.
        vehicle: StateRef<Vehicle>,
        /// Mission name.
        mission: &'static str,
    },
    /// A mission gave up: no route, or its target building vanished.
    Failed {
        /// Vehicle that ran the mission.
        vehicle: StateRef<Vehicle>,
        /// Mission name.
        mission: &'static str,
    },
    /// A vehicle left a building.
    TookOff {
        /// Vehicle.
        vehicle: StateRef<Vehicle>,
        /// City of the building.
        city: StateRef<City>,
        /// Building left.
        building: StateRef<Building>,
    },
    /// A vehicle parked in a building.
    Landed {
        /// Vehicle.
        vehicle: StateRef<Vehicle>,
        /// City of the building.
        city: StateRef<City>,
        /// Building entered.
        building: StateRef<Building>,
    },
    /// A vehicle infiltrated a building.
    Infiltrated {
        /// Vehicle.
        vehicle: StateRef<Vehicle>,
        /// City of the building.
        city: StateRef<City>,
        /// Building infiltrated.
        building: StateRef<Building>,
    },
    /// A vehicle subverted a building.
    Subverted {
        /// Vehicle.
        vehicle: StateRef<Vehicle>,
        /// City of the building.
        city: StateRef<City>,
        /// Building subverted.
        building: StateRef<Building>,
    },
    /// A vehicle flew through a portal out of `city`.
    LeftViaPortal {
        /// Vehicle.
        vehicle: StateRef<Vehicle>,
        /// City being left.
        city: StateRef<City>,
    },
    /// A vehicle started crashing.
    Crashed {
        /// Vehicle.
        vehicle: StateRef<Vehicle>,
    },
}

/// Read-only world view plus the shared RNG, lent to missions for one
/// vehicle update.
///
/// The vehicle being updated is not in `vehicles` while the view is alive.
pub struct MissionEnv<'a> {
    /// All cities.
    pub cities: &'a Registry<City>,
    /// All other vehicles.
    pub vehicles: &'a Registry<Vehicle>,
    /// Vehicle type table.
    pub vehicle_types: &'a Registry<VehicleType>,
    /// Simulation RNG.
    pub rng: &'a mut SimRng,
    /// Sink for side effects.
    pub events: &'a mut Vec<MissionEvent>,
    /// Pathfinding iteration ceiling.
    pub path_budget: usize,
}

impl<'a> MissionEnv<'a> {
    /// City the vehicle is in.
    #[must_use]
    pub fn city(&self, vehicle: &Vehicle) -> Option<&'a City> {
        let cities: &'a Registry<City> = self.cities;
        cities.get(&vehicle.city)
    }

    /// A building in the vehicle's city.
    #[must_use]
    pub fn building(&self, vehicle: &Vehicle, building: &StateRef<Building>) -> Option<&'a Building> {
        self.city(vehicle).and_then(|c| c.buildings.get(building))
    }

    fn live_target(&self, vehicle: &Vehicle, target: &StateRef<Vehicle>) -> Option<&'a Vehicle> {
        let vehicles: &'a Registry<Vehicle> = self.vehicles;
        vehicles
            .get(target)
            .filter(|t| t.is_on_map() && t.city == vehicle.city)
    }
}

/// One unit of autonomous vehicle behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mission {
    /// What the mission does.
    pub kind: MissionKind,
    /// Route being followed.
    pub path: PlannedPath,
    /// Set once [`Mission::start`] has run.
    pub started: bool,
}

impl Mission {
    /// Wrap a mission kind, not yet started.
    #[must_use]
    pub const fn new(kind: MissionKind) -> Self {
        Self {
            kind,
            path: PlannedPath::NotPlanned,
            started: false,
        }
    }

    /// Display name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind.name()
    }

    // Internal: only valid while the vehicle is parked.
    fn take_off(vehicle: &Vehicle) -> Option<Self> {
        vehicle.is_landed().then(|| {
            Self::new(MissionKind::TakeOff {
                from: vehicle.currently_landed_building.clone(),
                remaining: TAKE_OFF_TICKS,
            })
        })
    }

    // Internal: only valid once the vehicle is over the pad.
    fn land(target: StateRef<Building>) -> Self {
        Self::new(MissionKind::Land {
            target,
            remaining: LAND_TICKS,
        })
    }

    /// Prefix `mission` with a take-off if `vehicle` is parked.
    #[must_use]
    pub fn departing(vehicle: &Vehicle, mission: Self) -> Vec<Self> {
        Self::take_off(vehicle).into_iter().chain([mission]).collect()
    }

    /// Fly to a tile.
    #[must_use]
    pub fn goto_location(vehicle: &Vehicle, target: TilePos) -> Vec<Self> {
        Self::departing(vehicle, Self::new(MissionKind::GotoLocation { target }))
    }

    /// Fly to a portal and leave the city through it.
    #[must_use]
    pub fn goto_portal(vehicle: &Vehicle, target: TilePos) -> Vec<Self> {
        Self::departing(vehicle, Self::new(MissionKind::GotoPortal { target }))
    }

    /// Fly to a building and land in it.
    ///
    /// Empty when the vehicle is already parked there.
    #[must_use]
    pub fn goto_building(vehicle: &Vehicle, target: StateRef<Building>) -> Vec<Self> {
        if vehicle.currently_landed_building == target {
            return Vec::new();
        }
        let mut missions = Self::departing(
            vehicle,
            Self::new(MissionKind::GotoBuilding {
                target: target.clone(),
            }),
        );
        missions.push(Self::land(target));
        missions
    }

    /// Fly to a building to attack it.
    #[must_use]
    pub fn attack_building(vehicle: &Vehicle, target: StateRef<Building>) -> Vec<Self> {
        Self::departing(vehicle, Self::new(MissionKind::AttackBuilding { target }))
    }

    /// Follow another vehicle.
    #[must_use]
    pub fn follow_vehicle(vehicle: &Vehicle, target: StateRef<Vehicle>) -> Vec<Self> {
        Self::departing(vehicle, Self::new(MissionKind::FollowVehicle { target }))
    }

    /// Chase and attack another vehicle.
    #[must_use]
    pub fn attack_vehicle(vehicle: &Vehicle, target: StateRef<Vehicle>) -> Vec<Self> {
        Self::departing(vehicle, Self::new(MissionKind::AttackVehicle { target }))
    }

    /// Infiltrate a building. Assumes the vehicle is airborne.
    #[must_use]
    pub const fn infiltrate(target: StateRef<Building>) -> Self {
        Self::new(MissionKind::Infiltrate { target })
    }

    /// Subvert a building. Assumes the vehicle is airborne.
    #[must_use]
    pub const fn subvert(target: StateRef<Building>) -> Self {
        Self::new(MissionKind::Subvert { target })
    }

    /// Wait for `ticks`.
    #[must_use]
    pub const fn snooze(ticks: u64) -> Self {
        Self::new(MissionKind::Snooze { remaining: ticks })
    }

    /// Fall to the ground.
    #[must_use]
    pub const fn crash() -> Self {
        Self::new(MissionKind::Crash)
    }

    /// Fly `legs` random legs.
    #[must_use]
    pub const fn patrol(legs: u32) -> Self {
        Self::new(MissionKind::Patrol {
            remaining_legs: legs,
            target: None,
        })
    }

    /// Forget progress so the mission starts afresh when next active.
    ///
    /// Only path-following missions are affected; manoeuvres and waits
    /// keep their state.
    pub fn suspend(&mut self) {
        if self.started && self.kind.follows_path() {
            self.started = false;
            self.path = PlannedPath::NotPlanned;
        }
    }

    /// One-time setup when the mission becomes active.
    pub fn start(&mut self, vehicle: &mut Vehicle, env: &mut MissionEnv<'_>) {
        self.started = true;
        tracing::trace!(vehicle = %vehicle.id, mission = self.name(), "Mission started");

        match &self.kind {
            MissionKind::TakeOff { from, .. } => {
                let pad = env.building(vehicle, from).map(|b| b.pad);
                env.events.push(MissionEvent::TookOff {
                    vehicle: vehicle.to_ref(),
                    city: vehicle.city.clone(),
                    building: from.clone(),
                });
                vehicle.currently_landed_building.clear();
                vehicle.launch(pad.map_or(vehicle.position, TilePos::center));
            }
            MissionKind::Crash => {
                vehicle.crashed = true;
                env.events.push(MissionEvent::Crashed {
                    vehicle: vehicle.to_ref(),
                });
                let here = vehicle.tile();
                self.plan(vehicle, TilePos::new(here.x, here.y, 0), env);
            }
            MissionKind::Patrol { .. } => self.next_patrol_leg(vehicle, env),
            MissionKind::FollowVehicle { target } | MissionKind::AttackVehicle { target } => {
                // A missing target finishes the mission; nothing to plan.
                if let Some(tile) = env.live_target(vehicle, target).map(Vehicle::tile) {
                    self.plan(vehicle, tile, env);
                }
            }
            MissionKind::Snooze { .. } | MissionKind::Land { .. } => {}
            MissionKind::GotoLocation { target } | MissionKind::GotoPortal { target } => {
                let target = *target;
                self.plan(vehicle, target, env);
            }
            MissionKind::GotoBuilding { target }
            | MissionKind::AttackBuilding { target }
            | MissionKind::Infiltrate { target }
            | MissionKind::Subvert { target } => {
                match env.building(vehicle, target).map(|b| b.pad) {
                    Some(pad) => self.plan(vehicle, pad, env),
                    None => self.path = PlannedPath::Failed,
                }
            }
        }
    }

    /// Advance mission progress by `ticks`.
    pub fn update(&mut self, vehicle: &mut Vehicle, env: &mut MissionEnv<'_>, ticks: u64) {
        match &mut self.kind {
            MissionKind::Snooze { remaining }
            | MissionKind::TakeOff { remaining, .. }
            | MissionKind::Land { remaining, .. } => {
                *remaining = remaining.saturating_sub(ticks);
                return;
            }
            _ => {}
        }

        self.follow_path(vehicle, env, ticks);

        match &mut self.kind {
            MissionKind::Patrol { remaining_legs, .. } => {
                if self.path.is_arrived() && *remaining_legs > 0 {
                    *remaining_legs -= 1;
                    if *remaining_legs > 0 {
                        self.next_patrol_leg(vehicle, env);
                    }
                }
            }
            MissionKind::FollowVehicle { target } | MissionKind::AttackVehicle { target } => {
                let Some(goal) = env.live_target(vehicle, target).map(Vehicle::tile) else {
                    return;
                };
                let idle = matches!(self.path, PlannedPath::NotPlanned) || self.path.is_arrived();
                if idle && vehicle.tile().chebyshev_distance(goal) > 1 {
                    self.plan(vehicle, goal, env);
                }
            }
            _ => {}
        }
    }

    /// Whether the mission is done, successfully or not.
    #[must_use]
    pub fn is_finished(&self, vehicle: &Vehicle, env: &MissionEnv<'_>) -> bool {
        if self.has_failed(vehicle, env) {
            return true;
        }
        match &self.kind {
            MissionKind::Snooze { remaining }
            | MissionKind::TakeOff { remaining, .. }
            | MissionKind::Land { remaining, .. } => *remaining == 0,
            MissionKind::Patrol { remaining_legs, .. } => *remaining_legs == 0,
            MissionKind::FollowVehicle { target } => env.live_target(vehicle, target).is_none(),
            MissionKind::AttackVehicle { target } => env
                .live_target(vehicle, target)
                .map_or(true, Vehicle::is_crashed),
            MissionKind::GotoLocation { .. }
            | MissionKind::GotoBuilding { .. }
            | MissionKind::AttackBuilding { .. }
            | MissionKind::Crash
            | MissionKind::GotoPortal { .. }
            | MissionKind::Infiltrate { .. }
            | MissionKind::Subvert { .. } => self.started && self.path.is_arrived(),
        }
    }

    /// Whether the mission gave up rather than completed.
    #[must_use]
    pub fn has_failed(&self, vehicle: &Vehicle, env: &MissionEnv<'_>) -> bool {
        if self.path == PlannedPath::Failed {
            return true;
        }
        self.kind
            .target_building()
            .is_some_and(|b| env.building(vehicle, b).is_none())
    }

    /// The next waypoint, in world coordinates.
    #[must_use]
    pub fn next_destination(&self) -> Option<Vec3Fixed> {
        match &self.path {
            PlannedPath::Planned(path) => path.front().map(|t| t.center()),
            _ => None,
        }
    }

    /// Drop the current waypoint. Returns `false` when there was none.
    pub fn advance_along_path(&mut self) -> bool {
        match &mut self.path {
            PlannedPath::Planned(path) => path.pop_front().is_some(),
            _ => false,
        }
    }

    /// Ask `planner` for a route, recording failure if none is found
    /// within `max_iterations`.
    pub fn set_path_to(
        &mut self,
        planner: &dyn PathPlanner,
        from: TilePos,
        to: TilePos,
        max_iterations: usize,
    ) {
        self.path = match planner.compute_path(from, to, max_iterations) {
            Some(path) => PlannedPath::Planned(path.into()),
            None => {
                tracing::debug!(?from, ?to, max_iterations, "No path within budget");
                PlannedPath::Failed
            }
        };
    }

    fn plan(&mut self, vehicle: &Vehicle, target: TilePos, env: &MissionEnv<'_>) {
        match env.city(vehicle).and_then(|c| c.map.as_ref()) {
            Some(map) => {
                let from = map.clamp(vehicle.tile());
                self.set_path_to(map, from, target, env.path_budget);
            }
            None => {
                tracing::warn!(vehicle = %vehicle.id, city = %vehicle.city, "No map to plan on");
                self.path = PlannedPath::Failed;
            }
        }
    }

    fn follow_path(&mut self, vehicle: &mut Vehicle, env: &MissionEnv<'_>, ticks: u64) {
        let Some(vehicle_type) = env.vehicle_types.get(&vehicle.vehicle_type) else {
            tracing::warn!(vehicle = %vehicle.id, "Unknown vehicle type, cannot move");
            return;
        };
        let mut budget = vehicle_type.travel_distance(ticks);
        while budget > Fixed::ZERO {
            let Some(dest) = self.next_destination() else {
                break;
            };
            budget -= vehicle.step_toward(dest, budget);
            if vehicle.position != dest {
                break;
            }
            self.advance_along_path();
        }
    }

    fn next_patrol_leg(&mut self, vehicle: &Vehicle, env: &mut MissionEnv<'_>) {
        let Some(map) = env.city(vehicle).and_then(|c| c.map.as_ref()) else {
            self.path = PlannedPath::Failed;
            return;
        };
        let size = map.size();
        for _ in 0..PATROL_ATTEMPTS {
            let goal = TilePos::new(
                env.rng.range_inclusive(0, size.x - 1),
                env.rng.range_inclusive(0, size.y - 1),
                env.rng.range_inclusive(size.z / 2, size.z - 1),
            );
            self.plan(vehicle, goal, env);
            if self.path != PlannedPath::Failed {
                if let MissionKind::Patrol { target, .. } = &mut self.kind {
                    *target = Some(goal);
                }
                return;
            }
        }
    }

    /// Apply completion side effects and report the outcome.
    fn finish(&self, vehicle: &mut Vehicle, env: &mut MissionEnv<'_>) {
        let vehicle_ref = vehicle.to_ref();
        if self.has_failed(vehicle, env) {
            tracing::debug!(vehicle = %vehicle.id, mission = self.name(), "Mission failed");
            env.events.push(MissionEvent::Failed {
                vehicle: vehicle_ref,
                mission: self.name(),
            });
            return;
        }

        let city = vehicle.city.clone();
        match &self.kind {
            MissionKind::Land { target, .. } => {
                vehicle.remove_from_map();
                vehicle.currently_landed_building = target.clone();
                env.events.push(MissionEvent::Landed {
                    vehicle: vehicle_ref.clone(),
                    city,
                    building: target.clone(),
                });
            }
            MissionKind::Infiltrate { target } => env.events.push(MissionEvent::Infiltrated {
                vehicle: vehicle_ref.clone(),
                city,
                building: target.clone(),
            }),
            MissionKind::Subvert { target } => env.events.push(MissionEvent::Subverted {
                vehicle: vehicle_ref.clone(),
                city,
                building: target.clone(),
            }),
            MissionKind::GotoPortal { .. } => {
                vehicle.remove_from_map();
                env.events.push(MissionEvent::LeftViaPortal {
                    vehicle: vehicle_ref.clone(),
                    city,
                });
            }
            _ => {}
        }
        env.events.push(MissionEvent::Completed {
            vehicle: vehicle_ref,
            mission: self.name(),
        });
    }
}

impl PlannedPath {
    /// Planned and every waypoint consumed.
    #[must_use]
    pub fn is_arrived(&self) -> bool {
        matches!(self, Self::Planned(path) if path.is_empty())
    }
}

/// Start the front mission if it has not been started.
pub fn start_front_mission(vehicle: &mut Vehicle, env: &mut MissionEnv<'_>) {
    let Some(mut mission) = vehicle.missions.pop_front() else {
        return;
    };
    if !mission.started {
        mission.start(vehicle, env);
    }
    vehicle.missions.push_front(mission);
}

/// Drive a vehicle's mission queue for `ticks`.
///
/// Vehicles off the map only run missions that make sense there. After
/// a mission finishes its successor becomes active and is started before
/// this returns.
pub fn update_missions(vehicle: &mut Vehicle, env: &mut MissionEnv<'_>, ticks: u64) {
    let runnable = vehicle.is_on_map()
        || vehicle
            .current_mission()
            .is_some_and(|m| m.kind.runs_off_map());
    if !runnable {
        return;
    }
    let Some(mut mission) = vehicle.missions.pop_front() else {
        return;
    };
    if !mission.started {
        mission.start(vehicle, env);
    }
    mission.update(vehicle, env, ticks);

    loop {
        if !mission.is_finished(vehicle, env) {
            vehicle.missions.push_front(mission);
            return;
        }
        mission.finish(vehicle, env);
        match vehicle.missions.pop_front() {
            Some(next) => {
                mission = next;
                if !mission.started {
                    mission.start(vehicle, env);
                }
            }
            None => return,
        }
    }
}
