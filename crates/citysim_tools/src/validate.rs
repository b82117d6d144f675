//! Rule file validation.
//!
//! A rule file is checked in two passes: [`RuleSet::validate`] for
//! internal consistency, then an attempt to build a [`Simulation`] from it
//! so that problems which only show up against a [`SimConfig`] (a missing
//! human city, an alien organisation without the alien flag) are caught
//! too. Balance issues that do not stop a game from starting are reported
//! as warnings.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use citysim_core::config::SimConfig;
use citysim_core::rules::RuleSet;
use citysim_core::simulation::Simulation;
use serde::Serialize;

use crate::error::{Result, ToolError};

/// Outcome of validating one rule file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// File that was checked.
    pub path: PathBuf,
    /// Problems that stop a game from starting.
    pub problems: Vec<String>,
    /// Suspicious but playable data.
    pub warnings: Vec<String>,
    /// Number of organisations.
    pub organisations: usize,
    /// Number of vehicle types.
    pub vehicle_types: usize,
    /// Number of cities.
    pub cities: usize,
    /// Number of growth tables.
    pub growth_tables: usize,
    /// Number of incursion rules.
    pub incursions: usize,
}

impl ValidationReport {
    /// Whether the file can start a game.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Read and parse a rule file.
pub fn load_rules(path: &Path) -> Result<RuleSet> {
    let text = std::fs::read_to_string(path).map_err(|e| ToolError::io(path, e))?;
    Ok(RuleSet::from_ron(&text, &path.display().to_string())?)
}

/// Read and parse a simulation config file.
pub fn load_config(path: &Path) -> Result<SimConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| ToolError::io(path, e))?;
    Ok(SimConfig::from_ron(&text)?)
}

/// Validate a parsed rule set against `config`.
#[must_use]
pub fn check_rules(path: &Path, rules: &RuleSet, config: &SimConfig) -> ValidationReport {
    let mut problems = rules.validate();
    if problems.is_empty() {
        if let Err(e) = Simulation::new(config.clone(), rules) {
            problems.push(e.to_string());
        }
    }

    ValidationReport {
        path: path.to_path_buf(),
        problems,
        warnings: balance_warnings(rules),
        organisations: rules.organisations.len(),
        vehicle_types: rules.vehicle_types.len(),
        cities: rules.cities.len(),
        growth_tables: rules.growth.len(),
        incursions: rules.incursions.len(),
    }
}

/// Validate one rule file.
///
/// Unreadable or unparsable files are errors. Consistency problems are
/// collected into the report.
pub fn validate_rules_file(path: &Path, config: &SimConfig) -> Result<ValidationReport> {
    let rules = load_rules(path)?;
    let report = check_rules(path, &rules, config);
    tracing::debug!(
        path = %path.display(),
        problems = report.problems.len(),
        warnings = report.warnings.len(),
        "Validated rule file"
    );
    Ok(report)
}

/// Validate a rule file, or every `.ron` file in a directory.
///
/// Directory entries are checked in file name order.
pub fn validate_path(path: &Path, config: &SimConfig) -> Result<Vec<ValidationReport>> {
    if !path.is_dir() {
        return Ok(vec![validate_rules_file(path, config)?]);
    }

    let entries = std::fs::read_dir(path).map_err(|e| ToolError::io(path, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ToolError::io(path, e))?;
        let file = entry.path();
        if file.extension().is_some_and(|ext| ext == "ron") {
            files.push(file);
        }
    }
    files.sort();

    files
        .iter()
        .map(|file| validate_rules_file(file, config))
        .collect()
}

/// Playable-but-odd data: incursions that can never fire, and equal
/// priorities that fall back to file order.
fn balance_warnings(rules: &RuleSet) -> Vec<String> {
    let mut warnings = Vec::new();

    let grown: BTreeSet<&str> = rules
        .growth
        .values()
        .flat_map(|table| table.vehicles.iter().map(|(kind, _)| kind.as_str()))
        .collect();
    for rule in &rules.incursions {
        for (kind, _) in rule.requirements() {
            if !grown.contains(kind.as_str()) {
                warnings.push(format!(
                    "Incursion '{}' needs '{}', which no growth table produces",
                    rule.id, kind
                ));
            }
        }
    }

    let mut by_priority: BTreeMap<i32, Vec<&str>> = BTreeMap::new();
    for rule in &rules.incursions {
        by_priority
            .entry(rule.priority)
            .or_default()
            .push(rule.id.as_str());
    }
    for (priority, ids) in by_priority {
        if ids.len() > 1 {
            warnings.push(format!(
                "Incursions {} share priority {priority}; file order decides",
                ids.join(", ")
            ));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use citysim_core::rules::GrowthKey;
    use citysim_test_utils::fixtures::{WorldBuilder, ALIEN_CITY};

    fn world() -> WorldBuilder {
        WorldBuilder::new()
            .vehicle_type("UFO_SCOUT", 6, 2)
            .vehicle_type("UFO_FIGHTER", 5, 5)
            .growth(GrowthKey::Default, &[("UFO_SCOUT", 2)])
    }

    #[test]
    fn test_clean_rules_have_no_problems() {
        let rules = world().incursion("RAID", 1, &[("UFO_SCOUT", 1)]).into_rules();
        let report = check_rules(Path::new("test.ron"), &rules, &SimConfig::default());
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
        assert_eq!(report.vehicle_types, 2);
        assert_eq!(report.incursions, 1);
    }

    #[test]
    fn test_unreachable_incursion_warns() {
        let rules = world()
            .incursion("ASSAULT", 5, &[("UFO_FIGHTER", 1)])
            .into_rules();
        let report = check_rules(Path::new("test.ron"), &rules, &SimConfig::default());
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("UFO_FIGHTER"));
    }

    #[test]
    fn test_shared_priority_warns() {
        let rules = world()
            .incursion("RAID_A", 3, &[("UFO_SCOUT", 1)])
            .incursion("RAID_B", 3, &[("UFO_SCOUT", 2)])
            .into_rules();
        let report = check_rules(Path::new("test.ron"), &rules, &SimConfig::default());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("RAID_A, RAID_B"));
    }

    #[test]
    fn test_missing_alien_city_is_a_problem() {
        let mut rules = world().into_rules();
        rules.cities.retain(|c| c.id != ALIEN_CITY);
        let report = check_rules(Path::new("test.ron"), &rules, &SimConfig::default());
        assert!(!report.is_valid());
        assert!(report.problems[0].contains(ALIEN_CITY));
    }

    #[test]
    fn test_unknown_growth_type_is_a_problem() {
        let rules = world()
            .growth(GrowthKey::Week(2), &[("UFO_GHOST", 1)])
            .into_rules();
        let report = check_rules(Path::new("test.ron"), &rules, &SimConfig::default());
        assert!(report.problems.iter().any(|p| p.contains("UFO_GHOST")));
    }
}
