//! # Citysim Core
//!
//! Deterministic simulation core for a two-dimension city strategy game.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No file IO (rule text and save bytes are passed in and out)
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! The same seed and the same commands always produce the same world,
//! which is what makes saves, replays and determinism testing possible.
//!
//! ## Crate Structure
//!
//! - [`simulation`] - The tick orchestrator that owns the world
//! - [`scheduler`] - Deferred spawn events
//! - [`mission`] - Per-vehicle mission state machine
//! - [`organisation`] - Faction standings and relation tiers
//! - [`rules`] - Rule data loaded from RON
//! - [`command`] - Commands issued by the UI layer
//! - [`pathfinding`] - Path planner trait and 3-D grid A*
//! - [`state_ref`] - Keyed references and owning registries

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod city;
pub mod command;
pub mod config;
pub mod error;
pub mod math;
pub mod mission;
pub mod organisation;
pub mod pathfinding;
pub mod research;
pub mod rng;
pub mod rules;
pub mod scheduler;
pub mod simulation;
pub mod state_ref;
pub mod time;
pub mod vehicle;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::city::{Building, City};
    pub use crate::command::{MissionOrder, PlayerCommand};
    pub use crate::config::SimConfig;
    pub use crate::error::{Result, SimError};
    pub use crate::math::{Fixed, TilePos, Vec3Fixed};
    pub use crate::mission::{Mission, MissionEvent, MissionKind};
    pub use crate::organisation::{Organisation, Relation};
    pub use crate::rules::RuleSet;
    pub use crate::scheduler::{SpawnEvent, SpawnQueue};
    pub use crate::simulation::{Simulation, TickEvents, VehicleSnapshot};
    pub use crate::state_ref::{Registry, StateRef};
    pub use crate::time::{GameTime, TICKS_PER_DAY, TICKS_PER_SECOND, TICKS_PER_WEEK};
    pub use crate::vehicle::{Vehicle, VehicleType};
}
