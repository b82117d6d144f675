//! Test fixtures and helpers.
//!
//! A small two-city world (human city plus alien dimension) that tests
//! can extend with vehicle types, growth tables, incursion rules and
//! roster vehicles before building a [`Simulation`].

use std::collections::BTreeMap;

use citysim_core::config::SimConfig;
use citysim_core::math::TilePos;
use citysim_core::rules::{
    BuildingDef, CityDef, GrowthKey, GrowthTable, IncursionRule, OrganisationDef, PrimaryMission,
    RuleSet, VehicleDef,
};
use citysim_core::simulation::Simulation;
use citysim_core::state_ref::StateRef;
use citysim_core::vehicle::{Vehicle, VehicleType, DEFAULT_ALTITUDE};

/// Human city id.
pub const HUMAN_CITY: &str = "CITYMAP_HUMAN";
/// Alien city id.
pub const ALIEN_CITY: &str = "CITYMAP_ALIEN";
/// Alien organisation id.
pub const ALIEN_ORG: &str = "ORG_ALIEN";
/// Player organisation id.
pub const PLAYER_ORG: &str = "ORG_PLAYER";
/// Neutral civilian organisation id.
pub const CIVILIAN_ORG: &str = "ORG_MEGAPOL";
/// Fixture map edge length.
pub const MAP_SIZE: i32 = 32;
/// Fixture map height.
pub const MAP_HEIGHT: i32 = 8;

/// Builder for a two-city rule set.
#[derive(Debug, Clone)]
pub struct WorldBuilder {
    rules: RuleSet,
}

impl Default for WorldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldBuilder {
    /// Player, civilian and alien organisations; two 32x32x8 cities.
    ///
    /// The human city has an HQ, a senate and a single portal. The alien
    /// city has one portal and no buildings.
    #[must_use]
    pub fn new() -> Self {
        let org = |id: &str, name: &str, balance: i64, income: i64, alien: bool| OrganisationDef {
            id: id.to_string(),
            name: name.to_string(),
            balance,
            income,
            alien,
            relations: BTreeMap::new(),
        };
        let size = Some(TilePos::new(MAP_SIZE, MAP_SIZE, MAP_HEIGHT));
        let rules = RuleSet {
            organisations: vec![
                org(ALIEN_ORG, "Aliens", 0, 0, true),
                org(PLAYER_ORG, "X-COM", 1000, 100, false),
                org(CIVILIAN_ORG, "Megapol", 500, 20, false),
            ],
            cities: vec![
                CityDef {
                    id: HUMAN_CITY.to_string(),
                    name: "Mega-Primus".to_string(),
                    size,
                    blocked: Vec::new(),
                    buildings: vec![
                        BuildingDef {
                            id: "BLD_HQ".to_string(),
                            name: "X-COM HQ".to_string(),
                            owner: PLAYER_ORG.to_string(),
                            pad: TilePos::new(4, 4, 1),
                        },
                        BuildingDef {
                            id: "BLD_SENATE".to_string(),
                            name: "Senate".to_string(),
                            owner: CIVILIAN_ORG.to_string(),
                            pad: TilePos::new(24, 24, 1),
                        },
                    ],
                    portals: vec![TilePos::new(16, 16, MAP_HEIGHT - 1)],
                },
                CityDef {
                    id: ALIEN_CITY.to_string(),
                    name: "Alien Dimension".to_string(),
                    size,
                    blocked: Vec::new(),
                    buildings: Vec::new(),
                    portals: vec![TilePos::new(8, 8, MAP_HEIGHT - 1)],
                },
            ],
            ..RuleSet::default()
        };
        Self { rules }
    }

    /// Add a vehicle type.
    #[must_use]
    pub fn vehicle_type(mut self, id: &str, speed: u32, aggressiveness: u32) -> Self {
        self.rules.vehicle_types.push(VehicleType {
            id: id.to_string(),
            name: id.to_string(),
            health: 100,
            speed,
            aggressiveness,
            default_equipment: Vec::new(),
            num_created: 0,
        });
        self
    }

    /// Add or replace a growth table.
    #[must_use]
    pub fn growth(mut self, key: GrowthKey, vehicles: &[(&str, u32)]) -> Self {
        self.rules.growth.insert(
            key,
            GrowthTable {
                vehicles: owned_counts(vehicles),
            },
        );
        self
    }

    /// Add an infiltration incursion rule with only a primary list.
    #[must_use]
    pub fn incursion(self, id: &str, priority: i32, primary: &[(&str, u32)]) -> Self {
        self.incursion_rule(IncursionRule {
            id: id.to_string(),
            primary_mission: PrimaryMission::Infiltration,
            priority,
            primary: owned_counts(primary),
            escort: Vec::new(),
            attack: Vec::new(),
        })
    }

    /// Add a fully specified incursion rule.
    #[must_use]
    pub fn incursion_rule(mut self, rule: IncursionRule) -> Self {
        self.rules.incursions.push(rule);
        self
    }

    /// Add a player vehicle parked at a human-city building.
    #[must_use]
    pub fn roster_vehicle(mut self, id: &str, vehicle_type: &str, home_building: &str) -> Self {
        self.rules.vehicles.push(VehicleDef {
            id: id.to_string(),
            vehicle_type: vehicle_type.to_string(),
            owner: PLAYER_ORG.to_string(),
            city: HUMAN_CITY.to_string(),
            home_building: home_building.to_string(),
        });
        self
    }

    /// Store a standing from one organisation toward another.
    #[must_use]
    pub fn relation(mut self, from: &str, to: &str, standing: i32) -> Self {
        if let Some(org) = self.rules.organisations.iter_mut().find(|o| o.id == from) {
            org.relations.insert(to.to_string(), standing);
        }
        self
    }

    /// Remove a city's map so vehicles there are staged off-map.
    #[must_use]
    pub fn without_map(mut self, city: &str) -> Self {
        if let Some(def) = self.rules.cities.iter_mut().find(|c| c.id == city) {
            def.size = None;
            def.portals.clear();
        }
        self
    }

    /// The rule set built so far.
    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Finish and return the rule set.
    #[must_use]
    pub fn into_rules(self) -> RuleSet {
        self.rules
    }

    /// Build a simulation without running initial growth.
    ///
    /// # Panics
    ///
    /// Panics if the fixture rules are inconsistent.
    #[must_use]
    pub fn build(self, config: SimConfig) -> Simulation {
        tracing::debug!(seed = config.seed, "Building fixture world");
        match Simulation::new(config, &self.rules) {
            Ok(sim) => sim,
            Err(e) => panic!("Fixture world is invalid: {e}"),
        }
    }

    /// Build a simulation and run initial growth.
    ///
    /// # Panics
    ///
    /// Panics if the fixture rules are inconsistent.
    #[must_use]
    pub fn build_new_game(self, config: SimConfig) -> Simulation {
        match Simulation::new_game(config, &self.rules) {
            Ok(sim) => sim,
            Err(e) => panic!("Fixture world is invalid: {e}"),
        }
    }
}

fn owned_counts(counts: &[(&str, u32)]) -> Vec<(String, u32)> {
    counts
        .iter()
        .map(|(kind, n)| ((*kind).to_string(), *n))
        .collect()
}

/// The stock fixture: a scout and a fighter type, default growth of two
/// scouts, a small raid rule, and one player interceptor at the HQ.
#[must_use]
pub fn two_city_world(seed: u64) -> Simulation {
    WorldBuilder::new()
        .vehicle_type("UFO_SCOUT", 6, 2)
        .vehicle_type("UFO_FIGHTER", 5, 5)
        .vehicle_type("HAWK", 8, 3)
        .growth(GrowthKey::Default, &[("UFO_SCOUT", 2)])
        .incursion("RAID", 1, &[("UFO_SCOUT", 1)])
        .roster_vehicle("HAWK_1", "HAWK", "BLD_HQ")
        .build_new_game(SimConfig::default().with_seed(seed))
}

/// Put an alien vehicle on the alien city's map.
///
/// # Panics
///
/// Panics if `vehicle_type` is not in the world.
pub fn add_alien_vehicle(sim: &mut Simulation, id: &str, vehicle_type: &str) -> StateRef<Vehicle> {
    let Some(kind) = sim.vehicle_types().get_by_id(vehicle_type).cloned() else {
        panic!("Unknown fixture vehicle type {vehicle_type}");
    };
    let mut vehicle = Vehicle::new(id, &kind, ALIEN_ORG.into(), ALIEN_CITY.into());
    vehicle.launch(TilePos::new(MAP_SIZE / 2, MAP_SIZE / 2, DEFAULT_ALTITUDE).center());
    sim.add_vehicle(vehicle)
}
