//! Simulation configuration.
//!
//! Names the well-known cities and organisations the orchestrator needs
//! and the tunables for fast-forward, pathfinding and incursions. Can be
//! built in code with the `with_*` methods or loaded from RON.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::time::{TICKS_PER_SECOND, TURBO_TICKS};

/// Default pathfinding iteration ceiling.
pub const DEFAULT_PATH_ITERATIONS: usize = 500;

/// Simulation configuration.
///
/// # Example RON
///
/// ```ron
/// SimConfig(
///     human_city: "CITYMAP_HUMAN",
///     alien_city: "CITYMAP_ALIEN",
///     alien_org: "ORG_ALIEN",
///     player_org: "ORG_PLAYER",
///     turbo_interval: 18000,
///     path_iterations: 500,
///     staging_min: 20,
///     staging_max: 120,
///     launch_spacing: 30,
///     seed: 12345,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// City the player defends and incursions target.
    #[serde(default = "default_human_city")]
    pub human_city: String,
    /// City where alien growth spawns.
    #[serde(default = "default_alien_city")]
    pub alien_city: String,
    /// Organisation that owns grown alien vehicles.
    #[serde(default = "default_alien_org")]
    pub alien_org: String,
    /// Organisation controlled by the player.
    #[serde(default = "default_player_org")]
    pub player_org: String,
    /// Fast-forward alignment interval in ticks.
    #[serde(default = "default_turbo_interval")]
    pub turbo_interval: u64,
    /// Pathfinding iteration ceiling per path request.
    #[serde(default = "default_path_iterations")]
    pub path_iterations: usize,
    /// Lower bound of the x/y staging range for grown vehicles.
    #[serde(default = "default_staging_min")]
    pub staging_min: i32,
    /// Upper bound (inclusive) of the x/y staging range for grown vehicles.
    #[serde(default = "default_staging_max")]
    pub staging_max: i32,
    /// Delay between consecutive incursion launches, in ticks.
    #[serde(default = "default_launch_spacing")]
    pub launch_spacing: u64,
    /// Seed for the simulation RNG.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_human_city() -> String {
    "CITYMAP_HUMAN".to_string()
}

fn default_alien_city() -> String {
    "CITYMAP_ALIEN".to_string()
}

fn default_alien_org() -> String {
    "ORG_ALIEN".to_string()
}

fn default_player_org() -> String {
    "ORG_PLAYER".to_string()
}

const fn default_turbo_interval() -> u64 {
    TURBO_TICKS
}

const fn default_path_iterations() -> usize {
    DEFAULT_PATH_ITERATIONS
}

const fn default_staging_min() -> i32 {
    20
}

const fn default_staging_max() -> i32 {
    120
}

const fn default_launch_spacing() -> u64 {
    TICKS_PER_SECOND / 2
}

const fn default_seed() -> u64 {
    12345
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            human_city: default_human_city(),
            alien_city: default_alien_city(),
            alien_org: default_alien_org(),
            player_org: default_player_org(),
            turbo_interval: default_turbo_interval(),
            path_iterations: default_path_iterations(),
            staging_min: default_staging_min(),
            staging_max: default_staging_max(),
            launch_spacing: default_launch_spacing(),
            seed: default_seed(),
        }
    }
}

impl SimConfig {
    /// Parse a configuration from RON text.
    pub fn from_ron(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| SimError::RuleParse {
            path: "<config>".to_string(),
            message: e.to_string(),
        })
    }

    /// Set the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the fast-forward alignment interval.
    #[must_use]
    pub const fn with_turbo_interval(mut self, ticks: u64) -> Self {
        self.turbo_interval = ticks;
        self
    }

    /// Set the pathfinding iteration ceiling.
    #[must_use]
    pub const fn with_path_iterations(mut self, iterations: usize) -> Self {
        self.path_iterations = iterations;
        self
    }

    /// Set the player organisation.
    #[must_use]
    pub fn with_player_org(mut self, org: impl Into<String>) -> Self {
        self.player_org = org.into();
        self
    }
}
