//! Cities, buildings and in-flight projectiles.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::math::{Fixed, TilePos, Vec3Fixed};
use crate::organisation::Organisation;
use crate::pathfinding::TileMap;
use crate::rng::SimRng;
use crate::state_ref::{Registry, StateRef};
use crate::vehicle::Vehicle;

/// Number of portals generated for a city with a map but none defined.
pub const GENERATED_PORTALS: usize = 3;

/// A building with a landing pad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    /// Registry key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Owning organisation.
    pub owner: StateRef<Organisation>,
    /// Tile vehicles fly to when visiting this building.
    pub pad: TilePos,
    /// Vehicles currently parked inside.
    pub landed_vehicles: BTreeSet<StateRef<Vehicle>>,
    /// Completed alien infiltrations.
    pub infiltrations: u32,
    /// Completed alien subversions.
    pub subversions: u32,
}

impl Building {
    /// Create an empty building.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        owner: StateRef<Organisation>,
        pad: TilePos,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner,
            pad,
            landed_vehicles: BTreeSet::new(),
            infiltrations: 0,
            subversions: 0,
        }
    }
}

/// A projectile in flight. Combat resolution lives elsewhere; the city
/// only moves projectiles and expires them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projectile {
    /// Current position.
    pub position: Vec3Fixed,
    /// Displacement per tick.
    pub velocity: Vec3Fixed,
    /// Ticks left before the projectile burns out.
    pub remaining_ticks: u64,
    /// Vehicle that fired it.
    pub firer: StateRef<Vehicle>,
}

/// One simulated city (dimension).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    /// Registry key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Buildings in this city.
    pub buildings: Registry<Building>,
    /// Map entry and exit points.
    pub portals: Vec<TilePos>,
    /// Projectiles in flight.
    pub projectiles: Vec<Projectile>,
    /// Tile map, absent until the city is initialised.
    pub map: Option<TileMap>,
}

impl City {
    /// Create a city with no map.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            buildings: Registry::new(),
            portals: Vec::new(),
            projectiles: Vec::new(),
            map: None,
        }
    }

    /// Attach a map.
    #[must_use]
    pub fn with_map(mut self, map: TileMap) -> Self {
        self.map = Some(map);
        self
    }

    /// A reference to this city.
    #[must_use]
    pub fn to_ref(&self) -> StateRef<City> {
        StateRef::new(self.id.as_str())
    }

    /// Add a building, returning its reference.
    pub fn add_building(&mut self, building: Building) -> StateRef<Building> {
        let id = building.id.clone();
        self.buildings.insert(id, building)
    }

    /// Move projectiles and drop those that burned out or left the map.
    ///
    /// Returns the number of projectiles removed.
    pub fn update(&mut self, ticks: u64) -> usize {
        if ticks == 0 {
            return 0;
        }
        let before = self.projectiles.len();
        let map = self.map.as_ref();
        self.projectiles.retain_mut(|p| {
            let steps = ticks.min(p.remaining_ticks);
            p.remaining_ticks -= steps;
            if p.remaining_ticks == 0 {
                return false;
            }
            // Overflow means the projectile is far outside any map.
            let Some(position) = Fixed::checked_from_num(steps)
                .and_then(|s| p.velocity.checked_scale(s))
                .and_then(|offset| p.position.checked_add(offset))
            else {
                return false;
            };
            p.position = position;
            map.map_or(true, |m| m.in_bounds(p.position.tile()))
        });
        before - self.projectiles.len()
    }

    /// Generate portals on the top layer of the map if none exist.
    ///
    /// Does nothing for a city without a map.
    pub fn generate_portals(&mut self, rng: &mut SimRng, count: usize) {
        let Some(map) = &self.map else {
            return;
        };
        if !self.portals.is_empty() {
            return;
        }
        let size = map.size();
        let top = size.z - 1;
        // Bounded so a fully blocked top layer cannot stall initialisation.
        let mut attempts = count * 16;
        while self.portals.len() < count && attempts > 0 {
            attempts -= 1;
            let pos = TilePos::new(
                rng.range_inclusive(0, size.x - 1),
                rng.range_inclusive(0, size.y - 1),
                top,
            );
            if map.is_passable(pos) && !self.portals.contains(&pos) {
                self.portals.push(pos);
            }
        }
        tracing::debug!(city = %self.id, portals = self.portals.len(), "Generated portals");
    }

    /// A building chosen uniformly at random.
    pub fn random_building(&self, rng: &mut SimRng) -> Option<StateRef<Building>> {
        rng.index(self.buildings.len())
            .and_then(|i| self.buildings.nth_ref(i))
    }

    /// A portal chosen uniformly at random.
    pub fn random_portal(&self, rng: &mut SimRng) -> Option<TilePos> {
        rng.index(self.portals.len()).map(|i| self.portals[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinding::CellType;

    fn projectile(velocity_x: i32, ticks: u64) -> Projectile {
        Projectile {
            position: Vec3Fixed::from_ints(5, 5, 1),
            velocity: Vec3Fixed::from_ints(velocity_x, 0, 0),
            remaining_ticks: ticks,
            firer: StateRef::empty(),
        }
    }

    #[test]
    fn test_projectiles_expire() {
        let mut city = City::new("CITY", "City");
        city.projectiles.push(projectile(0, 3));
        city.projectiles.push(projectile(0, 10));
        assert_eq!(city.update(3), 1);
        assert_eq!(city.projectiles.len(), 1);
        assert_eq!(city.update(0), 0);
    }

    #[test]
    fn test_projectiles_leaving_map_are_removed() {
        let mut city = City::new("CITY", "City").with_map(TileMap::new(8, 8, 2));
        city.projectiles.push(projectile(1, 100));
        assert_eq!(city.update(1), 0);
        assert_eq!(city.update(5), 1);
        assert!(city.projectiles.is_empty());
    }

    #[test]
    fn test_long_step_moves_at_most_lifetime() {
        let mut city = City::new("CITY", "City");
        city.projectiles.push(projectile(2, u64::MAX));
        assert_eq!(city.update(10), 0);
        assert_eq!(city.projectiles[0].position, Vec3Fixed::from_ints(25, 5, 1));

        // Far beyond the fixed-point range: dropped instead of overflowing.
        assert_eq!(city.update(1 << 40), 1);
        assert!(city.projectiles.is_empty());

        city.projectiles.push(projectile(1, 4));
        assert_eq!(city.update(u64::MAX), 1);
    }

    #[test]
    fn test_portals_generated_on_top_layer() {
        let mut city = City::new("CITY", "City").with_map(TileMap::new(16, 16, 4));
        let mut rng = SimRng::new(1);
        city.generate_portals(&mut rng, GENERATED_PORTALS);
        assert_eq!(city.portals.len(), GENERATED_PORTALS);
        assert!(city.portals.iter().all(|p| p.z == 3));

        let before = city.portals.clone();
        city.generate_portals(&mut rng, GENERATED_PORTALS);
        assert_eq!(city.portals, before);
    }

    #[test]
    fn test_no_portals_without_map() {
        let mut city = City::new("CITY", "City");
        city.generate_portals(&mut SimRng::new(1), GENERATED_PORTALS);
        assert!(city.portals.is_empty());
    }

    #[test]
    fn test_blocked_top_layer_terminates() {
        let mut map = TileMap::new(2, 2, 1);
        for x in 0..2 {
            for y in 0..2 {
                map.set_cell(TilePos::new(x, y, 0), CellType::Blocked);
            }
        }
        let mut city = City::new("CITY", "City").with_map(map);
        city.generate_portals(&mut SimRng::new(1), GENERATED_PORTALS);
        assert!(city.portals.is_empty());
    }

    #[test]
    fn test_random_building_empty_city() {
        let city = City::new("CITY", "City");
        assert!(city.random_building(&mut SimRng::new(1)).is_none());
        assert!(city.random_portal(&mut SimRng::new(1)).is_none());
    }
}
