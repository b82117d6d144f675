//! Static rule data: organisations, vehicle types, cities, growth tables,
//! incursion rules and research.
//!
//! Rule sets are plain data deserialized from RON. This module does no IO;
//! callers read the file and hand the text to [`RuleSet::from_ron`].
//!
//! # Example RON
//!
//! ```ron
//! RuleSet(
//!     organisations: [
//!         (id: "ORG_ALIEN", name: "Aliens", balance: 0, income: 0, alien: true),
//!     ],
//!     vehicle_types: [
//!         (id: "UFO_SCOUT", name: "Scout", health: 40, speed: 6, aggressiveness: 2),
//!     ],
//!     cities: [
//!         (id: "CITYMAP_ALIEN", name: "Alien Dimension", size: Some((x: 40, y: 40, z: 8))),
//!     ],
//!     growth: {
//!         Week(1): (vehicles: [("UFO_SCOUT", 3)]),
//!         Default: (vehicles: [("UFO_SCOUT", 1)]),
//!     },
//! )
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::math::TilePos;
use crate::research::{Base, ResearchTopic};
use crate::vehicle::VehicleType;

/// Key of a growth table: a specific week, or the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GrowthKey {
    /// Applies to exactly this (1-based) week.
    Week(u32),
    /// Applies to any week without its own table.
    Default,
}

/// Vehicles grown in the alien city at the end of a week.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GrowthTable {
    /// (vehicle type, count) pairs, grown in order.
    pub vehicles: Vec<(String, u32)>,
}

/// Declared purpose of an incursion.
///
/// Carried through to the launch log. Launched vehicles are always sent
/// to infiltrate their target building whatever the declared purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PrimaryMission {
    /// Infiltration of the city's buildings.
    #[default]
    Infiltration,
    /// Subversion of an organisation.
    Subversion,
    /// Open attack.
    Attack,
    /// Flooding the city with craft.
    Overspawn,
}

/// A prioritised incursion rule.
///
/// Fires when the alien city holds at least the listed number of vehicles
/// of every type across all three lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncursionRule {
    /// Identifier.
    pub id: String,
    /// Declared purpose, for logs.
    #[serde(default)]
    pub primary_mission: PrimaryMission,
    /// Higher priorities are checked first.
    pub priority: i32,
    /// Vehicles that are launched, one spawn per vehicle.
    pub primary: Vec<(String, u32)>,
    /// Escort vehicles that must exist.
    #[serde(default)]
    pub escort: Vec<(String, u32)>,
    /// Attack vehicles that must exist.
    #[serde(default)]
    pub attack: Vec<(String, u32)>,
}

impl IncursionRule {
    /// Every (type, count) requirement across all lists.
    pub fn requirements(&self) -> impl Iterator<Item = &(String, u32)> {
        self.primary
            .iter()
            .chain(self.escort.iter())
            .chain(self.attack.iter())
    }

    /// Whether `tally` (vehicles per type) meets every requirement.
    #[must_use]
    pub fn is_satisfied(&self, tally: &BTreeMap<String, u32>) -> bool {
        self.requirements()
            .all(|(kind, count)| tally.get(kind).copied().unwrap_or(0) >= *count)
    }
}

/// Initial organisation definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganisationDef {
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Starting balance.
    pub balance: i64,
    /// Weekly income.
    pub income: i64,
    /// Whether the organisation is alien.
    #[serde(default)]
    pub alien: bool,
    /// Starting standings toward other organisations.
    #[serde(default)]
    pub relations: BTreeMap<String, i32>,
}

/// Building definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingDef {
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Owning organisation.
    pub owner: String,
    /// Landing pad tile.
    pub pad: TilePos,
}

/// City definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityDef {
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Map size; a city without one starts uninitialised.
    #[serde(default)]
    pub size: Option<TilePos>,
    /// Impassable tiles.
    #[serde(default)]
    pub blocked: Vec<TilePos>,
    /// Buildings.
    #[serde(default)]
    pub buildings: Vec<BuildingDef>,
    /// Portals; generated on initialisation if empty.
    #[serde(default)]
    pub portals: Vec<TilePos>,
}

/// A vehicle in the starting roster, parked at its home building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleDef {
    /// Identifier.
    pub id: String,
    /// Vehicle type.
    pub vehicle_type: String,
    /// Owning organisation.
    pub owner: String,
    /// City.
    pub city: String,
    /// Home building in that city.
    pub home_building: String,
}

/// Lab definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabDef {
    /// Identifier.
    pub id: String,
    /// Work contributed per tick.
    pub skill: u64,
    /// Topic assigned at start.
    #[serde(default)]
    pub topic: Option<String>,
}

/// Complete rule set for a game.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleSet {
    /// Organisations.
    pub organisations: Vec<OrganisationDef>,
    /// Vehicle types.
    pub vehicle_types: Vec<VehicleType>,
    /// Cities.
    pub cities: Vec<CityDef>,
    /// Weekly growth tables.
    #[serde(default)]
    pub growth: BTreeMap<GrowthKey, GrowthTable>,
    /// Incursion rules.
    #[serde(default)]
    pub incursions: Vec<IncursionRule>,
    /// Research topics.
    #[serde(default)]
    pub research: Vec<ResearchTopic>,
    /// Labs.
    #[serde(default)]
    pub labs: Vec<LabDef>,
    /// Player bases.
    #[serde(default)]
    pub bases: Vec<Base>,
    /// Starting vehicles.
    #[serde(default)]
    pub vehicles: Vec<VehicleDef>,
}

impl RuleSet {
    /// Parse a rule set from RON text. `source` names the text in errors.
    pub fn from_ron(text: &str, source: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| SimError::RuleParse {
            path: source.to_string(),
            message: e.to_string(),
        })
    }

    /// Serialize to pretty RON.
    pub fn to_ron(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default()).map_err(|e| {
            SimError::RuleParse {
                path: "<memory>".to_string(),
                message: e.to_string(),
            }
        })
    }

    /// Growth table for `week`, falling back to the default table.
    #[must_use]
    pub fn growth_for_week(&self, week: u32) -> Option<&GrowthTable> {
        self.growth
            .get(&GrowthKey::Week(week))
            .or_else(|| self.growth.get(&GrowthKey::Default))
    }

    /// Incursion rules by descending priority; equal priorities keep file
    /// order.
    #[must_use]
    pub fn incursions_by_priority(&self) -> Vec<&IncursionRule> {
        sort_by_priority(&self.incursions)
    }

    fn has_vehicle_type(&self, id: &str) -> bool {
        self.vehicle_types.iter().any(|t| t.id == id)
    }

    fn has_organisation(&self, id: &str) -> bool {
        self.organisations.iter().any(|o| o.id == id)
    }

    /// Check internal consistency, returning every problem found.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        check_unique(
            "organisation",
            self.organisations.iter().map(|o| o.id.as_str()),
            &mut errors,
        );
        check_unique(
            "vehicle type",
            self.vehicle_types.iter().map(|t| t.id.as_str()),
            &mut errors,
        );
        check_unique("city", self.cities.iter().map(|c| c.id.as_str()), &mut errors);
        check_unique(
            "vehicle",
            self.vehicles.iter().map(|v| v.id.as_str()),
            &mut errors,
        );

        for org in &self.organisations {
            for other in org.relations.keys() {
                if !self.has_organisation(other) {
                    errors.push(format!(
                        "Organisation '{}' has relation to unknown organisation '{}'",
                        org.id, other
                    ));
                }
            }
        }

        for vehicle_type in &self.vehicle_types {
            if vehicle_type.speed == 0 {
                errors.push(format!("Vehicle type '{}' has zero speed", vehicle_type.id));
            }
        }

        for city in &self.cities {
            self.validate_city(city, &mut errors);
        }

        for (key, table) in &self.growth {
            for (kind, _) in &table.vehicles {
                if !self.has_vehicle_type(kind) {
                    errors.push(format!(
                        "Growth table {key:?} references unknown vehicle type '{kind}'"
                    ));
                }
            }
        }

        for rule in &self.incursions {
            if rule.primary.is_empty() {
                errors.push(format!("Incursion '{}' has an empty primary list", rule.id));
            }
            for (kind, _) in rule.requirements() {
                if !self.has_vehicle_type(kind) {
                    errors.push(format!(
                        "Incursion '{}' references unknown vehicle type '{}'",
                        rule.id, kind
                    ));
                }
            }
        }

        for lab in &self.labs {
            if let Some(topic) = &lab.topic {
                if !self.research.iter().any(|t| &t.id == topic) {
                    errors.push(format!(
                        "Lab '{}' assigned unknown research topic '{}'",
                        lab.id, topic
                    ));
                }
            }
        }

        for vehicle in &self.vehicles {
            if !self.has_vehicle_type(&vehicle.vehicle_type) {
                errors.push(format!(
                    "Vehicle '{}' has unknown type '{}'",
                    vehicle.id, vehicle.vehicle_type
                ));
            }
            if !self.has_organisation(&vehicle.owner) {
                errors.push(format!(
                    "Vehicle '{}' has unknown owner '{}'",
                    vehicle.id, vehicle.owner
                ));
            }
            match self.cities.iter().find(|c| c.id == vehicle.city) {
                None => errors.push(format!(
                    "Vehicle '{}' is in unknown city '{}'",
                    vehicle.id, vehicle.city
                )),
                Some(city) => {
                    if !city.buildings.iter().any(|b| b.id == vehicle.home_building) {
                        errors.push(format!(
                            "Vehicle '{}' has unknown home building '{}'",
                            vehicle.id, vehicle.home_building
                        ));
                    }
                }
            }
        }

        errors
    }

    fn validate_city(&self, city: &CityDef, errors: &mut Vec<String>) {
        check_unique(
            &format!("building in city '{}'", city.id),
            city.buildings.iter().map(|b| b.id.as_str()),
            errors,
        );

        let in_bounds = |p: &TilePos| match city.size {
            Some(size) => {
                p.x >= 0 && p.y >= 0 && p.z >= 0 && p.x < size.x && p.y < size.y && p.z < size.z
            }
            None => true,
        };

        if let Some(size) = city.size {
            if size.x <= 0 || size.y <= 0 || size.z <= 0 {
                errors.push(format!("City '{}' has non-positive size", city.id));
                return;
            }
        }

        for building in &city.buildings {
            if !self.has_organisation(&building.owner) {
                errors.push(format!(
                    "Building '{}' has unknown owner '{}'",
                    building.id, building.owner
                ));
            }
            if !in_bounds(&building.pad) {
                errors.push(format!(
                    "Building '{}' pad {:?} is outside city '{}'",
                    building.id, building.pad, city.id
                ));
            }
        }
        for portal in &city.portals {
            if !in_bounds(portal) {
                errors.push(format!("Portal {:?} is outside city '{}'", portal, city.id));
            }
        }
        for tile in &city.blocked {
            if !in_bounds(tile) {
                errors.push(format!(
                    "Blocked tile {:?} is outside city '{}'",
                    tile, city.id
                ));
            }
        }
    }
}

/// Stable sort of rules by descending priority.
#[must_use]
pub fn sort_by_priority(rules: &[IncursionRule]) -> Vec<&IncursionRule> {
    let mut sorted: Vec<&IncursionRule> = rules.iter().collect();
    sorted.sort_by_key(|r| std::cmp::Reverse(r.priority));
    sorted
}

fn check_unique<'a>(what: &str, ids: impl Iterator<Item = &'a str>, errors: &mut Vec<String>) {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            errors.push(format!("Duplicate {what} id '{id}'"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = r#"
        RuleSet(
            organisations: [
                (id: "ORG_ALIEN", name: "Aliens", balance: 0, income: 0, alien: true),
                (id: "ORG_PLAYER", name: "X-COM", balance: 1000, income: 50,
                 relations: {"ORG_MEGAPOL": 40}),
                (id: "ORG_MEGAPOL", name: "Megapol", balance: 500, income: 10),
            ],
            vehicle_types: [
                (id: "UFO_SCOUT", name: "Scout", health: 40, speed: 6, aggressiveness: 2),
                (id: "UFO_FIGHTER", name: "Fighter", health: 80, speed: 5, aggressiveness: 5),
            ],
            cities: [
                (id: "CITYMAP_HUMAN", name: "Mega-Primus", size: Some((x: 32, y: 32, z: 8)),
                 buildings: [(id: "BLD_SENATE", name: "Senate", owner: "ORG_MEGAPOL",
                              pad: (x: 10, y: 10, z: 1))]),
                (id: "CITYMAP_ALIEN", name: "Alien Dimension"),
            ],
            growth: {
                Week(3): (vehicles: [("UFO_FIGHTER", 2)]),
                Default: (vehicles: [("UFO_SCOUT", 1)]),
            },
            incursions: [
                (id: "SMALL", priority: 5, primary: [("UFO_SCOUT", 1)]),
                (id: "BIG", priority: 10, primary: [("UFO_SCOUT", 2)],
                 escort: [("UFO_FIGHTER", 1)], primary_mission: Subversion),
            ],
        )
    "#;

    #[test]
    fn test_parse_and_validate() {
        let rules = RuleSet::from_ron(RULES, "test").unwrap();
        assert_eq!(rules.organisations.len(), 3);
        assert_eq!(rules.incursions[1].primary_mission, PrimaryMission::Subversion);
        assert!(rules.validate().is_empty(), "{:?}", rules.validate());
    }

    #[test]
    fn test_growth_week_overrides_default() {
        let rules = RuleSet::from_ron(RULES, "test").unwrap();
        assert_eq!(
            rules.growth_for_week(3).unwrap().vehicles,
            vec![("UFO_FIGHTER".to_string(), 2)]
        );
        assert_eq!(
            rules.growth_for_week(4).unwrap().vehicles,
            vec![("UFO_SCOUT".to_string(), 1)]
        );
    }

    #[test]
    fn test_no_default_growth() {
        let mut rules = RuleSet::from_ron(RULES, "test").unwrap();
        rules.growth.remove(&GrowthKey::Default);
        assert!(rules.growth_for_week(1).is_none());
    }

    #[test]
    fn test_incursions_sorted_by_priority() {
        let rules = RuleSet::from_ron(RULES, "test").unwrap();
        let ids: Vec<_> = rules
            .incursions_by_priority()
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["BIG", "SMALL"]);
    }

    #[test]
    fn test_rule_satisfaction_includes_escorts() {
        let rules = RuleSet::from_ron(RULES, "test").unwrap();
        let big = &rules.incursions[1];
        let mut tally = BTreeMap::new();
        tally.insert("UFO_SCOUT".to_string(), 2);
        assert!(!big.is_satisfied(&tally));
        tally.insert("UFO_FIGHTER".to_string(), 1);
        assert!(big.is_satisfied(&tally));
        tally.insert("UFO_SCOUT".to_string(), 1);
        assert!(!big.is_satisfied(&tally));
    }

    #[test]
    fn test_validation_reports_problems() {
        let mut rules = RuleSet::from_ron(RULES, "test").unwrap();
        rules.growth.insert(
            GrowthKey::Week(9),
            GrowthTable {
                vehicles: vec![("UFO_MISSING".into(), 1)],
            },
        );
        rules.cities[0].portals.push(TilePos::new(99, 0, 0));
        rules.organisations.push(rules.organisations[0].clone());
        let errors = rules.validate();
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("UFO_MISSING")));
        assert!(errors.iter().any(|e| e.contains("Portal")));
        assert!(errors.iter().any(|e| e.contains("Duplicate organisation")));
    }

    #[test]
    fn test_parse_error() {
        let err = RuleSet::from_ron("RuleSet(", "broken.ron").unwrap_err();
        assert!(matches!(err, SimError::RuleParse { ref path, .. } if path == "broken.ron"));
    }

    #[test]
    fn test_ron_roundtrip() {
        let rules = RuleSet::from_ron(RULES, "test").unwrap();
        let text = rules.to_ron().unwrap();
        assert_eq!(RuleSet::from_ron(&text, "again").unwrap(), rules);
    }
}
