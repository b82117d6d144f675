//! Vehicles and vehicle types.
//!
//! A vehicle is either parked inside a building, staged in a city whose
//! map is not initialised yet, or flying on a city map. Only the last
//! state owns a [`Mover`], the transient movement handle that is never
//! persisted and is always torn down before the vehicle is released.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::city::{Building, City};
use crate::math::{Fixed, TilePos, Vec3Fixed};
use crate::mission::Mission;
use crate::organisation::Organisation;
use crate::state_ref::StateRef;
use crate::time::TICKS_PER_SECOND;

/// Altitude layer grown and staged vehicles start at.
pub const DEFAULT_ALTITUDE: i32 = 5;

/// Static description of a kind of vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleType {
    /// Registry key.
    pub id: String,
    /// Display name, also the prefix for generated vehicle names.
    pub name: String,
    /// Starting health.
    pub health: u32,
    /// Flight speed in tiles per second.
    pub speed: u32,
    /// Zero for civilian craft. Aggressive hostile craft block fast-forward.
    #[serde(default)]
    pub aggressiveness: u32,
    /// Equipment fitted to newly created vehicles.
    #[serde(default)]
    pub default_equipment: Vec<String>,
    /// Count of vehicles created so far, used for naming.
    #[serde(default)]
    pub num_created: u32,
}

impl VehicleType {
    /// Distance covered in `ticks` at full speed.
    ///
    /// Saturates at `Fixed::MAX` for steps longer than any map.
    #[must_use]
    pub fn travel_distance(&self, ticks: u64) -> Fixed {
        let scaled = u64::from(self.speed).saturating_mul(ticks);
        let whole = Fixed::saturating_from_num(scaled / TICKS_PER_SECOND);
        let part = Fixed::from_num(scaled % TICKS_PER_SECOND) / Fixed::from_num(TICKS_PER_SECOND);
        whole.saturating_add(part)
    }
}

/// Transient movement handle for a vehicle on a city map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mover {
    /// Unit direction of the last movement step.
    pub heading: Vec3Fixed,
    /// Distance covered since launch.
    pub travelled: Fixed,
}

/// A single vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Registry key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Kind of vehicle.
    pub vehicle_type: StateRef<VehicleType>,
    /// Owning organisation.
    pub owner: StateRef<Organisation>,
    /// City the vehicle is in.
    pub city: StateRef<City>,
    /// Building the vehicle is based at.
    pub home_building: StateRef<Building>,
    /// Building the vehicle is parked in, empty while flying.
    pub currently_landed_building: StateRef<Building>,
    /// Position in tile units.
    pub position: Vec3Fixed,
    /// Remaining health.
    pub health: u32,
    /// Set once the vehicle has been shot down.
    pub crashed: bool,
    /// Mission queue; the front is the active mission.
    pub missions: VecDeque<Mission>,
    /// Fitted equipment identifiers.
    pub equipment: Vec<String>,
    #[serde(skip)]
    mover: Option<Mover>,
}

impl Vehicle {
    /// Create a vehicle of `vehicle_type` at full health, off the map.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        vehicle_type: &VehicleType,
        owner: StateRef<Organisation>,
        city: StateRef<City>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            vehicle_type: StateRef::new(vehicle_type.id.as_str()),
            owner,
            city,
            home_building: StateRef::empty(),
            currently_landed_building: StateRef::empty(),
            position: Vec3Fixed::ZERO,
            health: vehicle_type.health,
            crashed: false,
            missions: VecDeque::new(),
            equipment: Vec::new(),
            mover: None,
        }
    }

    /// A reference to this vehicle.
    #[must_use]
    pub fn to_ref(&self) -> StateRef<Vehicle> {
        StateRef::new(self.id.as_str())
    }

    /// Fit the type's default equipment, replacing anything fitted.
    pub fn equip_default_equipment(&mut self, vehicle_type: &VehicleType) {
        self.equipment.clone_from(&vehicle_type.default_equipment);
    }

    /// Place the vehicle on its city map at `position`.
    pub fn launch(&mut self, position: Vec3Fixed) {
        self.position = position;
        self.mover = Some(Mover::default());
        tracing::debug!(vehicle = %self.id, city = %self.city, "Vehicle launched");
    }

    /// Take the vehicle off its city map, keeping its position.
    pub fn remove_from_map(&mut self) {
        if self.mover.take().is_some() {
            tracing::debug!(vehicle = %self.id, "Vehicle removed from map");
        }
    }

    /// Whether the vehicle is flying on a map.
    #[must_use]
    pub const fn is_on_map(&self) -> bool {
        self.mover.is_some()
    }

    /// The movement handle, present while on a map.
    #[must_use]
    pub const fn mover(&self) -> Option<&Mover> {
        self.mover.as_ref()
    }

    /// Whether the vehicle is parked in a building.
    #[must_use]
    pub const fn is_landed(&self) -> bool {
        !self.currently_landed_building.is_empty()
    }

    /// Whether the vehicle has been shot down.
    #[must_use]
    pub const fn is_crashed(&self) -> bool {
        self.crashed
    }

    /// Tile the vehicle occupies.
    #[must_use]
    pub fn tile(&self) -> TilePos {
        self.position.tile()
    }

    /// Move toward `target` by at most `max_step`, returning distance covered.
    pub(crate) fn step_toward(&mut self, target: Vec3Fixed, max_step: Fixed) -> Fixed {
        let (next, covered) = self.position.step_toward(target, max_step);
        if let Some(mover) = &mut self.mover {
            if covered > Fixed::ZERO {
                mover.heading = (next - self.position).normalize();
                mover.travelled += covered;
            }
        }
        self.position = next;
        covered
    }

    /// The active mission, if any.
    #[must_use]
    pub fn current_mission(&self) -> Option<&Mission> {
        self.missions.front()
    }

    /// Replace the mission queue wholesale.
    pub fn set_missions(&mut self, missions: impl IntoIterator<Item = Mission>) {
        self.missions = missions.into_iter().collect();
    }

    /// Put missions ahead of the active one.
    ///
    /// The displaced mission is suspended so it replans when it becomes
    /// active again.
    pub fn push_missions_front(&mut self, missions: Vec<Mission>) {
        if let Some(active) = self.missions.front_mut() {
            active.suspend();
        }
        for mission in missions.into_iter().rev() {
            self.missions.push_front(mission);
        }
    }

    /// Queue missions after everything already queued.
    pub fn push_missions_back(&mut self, missions: Vec<Mission>) {
        self.missions.extend(missions);
    }

    /// Clear every outward reference and drop the movement handle.
    ///
    /// Called before the vehicle is released so no reference it holds can
    /// keep a cycle alive.
    pub fn release_references(&mut self) {
        self.remove_from_map();
        self.missions.clear();
        self.equipment.clear();
        self.vehicle_type.clear();
        self.owner.clear();
        self.city.clear();
        self.home_building.clear();
        self.currently_landed_building.clear();
    }
}
