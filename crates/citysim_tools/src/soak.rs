//! Headless soak runs.
//!
//! Runs the simulation for many seeds in parallel using rayon and
//! collects what happened in each: incursions fired, spawn events that
//! found no vehicle, mission outcomes and any reference inconsistencies.
//! Long soaks are the cheapest way to find rule sets that starve the
//! scheduler or missions that fail in bulk.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use citysim_core::config::SimConfig;
use citysim_core::mission::MissionEvent;
use citysim_core::rules::RuleSet;
use citysim_core::simulation::{Simulation, TickEvents};
use citysim_core::time::{TICKS_PER_DAY, TICKS_PER_MINUTE};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, ToolError};

/// Configuration for a soak run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoakConfig {
    /// Simulated days per seed.
    pub days: u64,
    /// Number of seeds to run.
    pub seeds: u32,
    /// First seed; the rest follow consecutively.
    pub seed_start: u64,
    /// Ticks per orchestrator cycle.
    pub step_ticks: u64,
    /// Worker threads (0 = rayon default).
    pub parallel: usize,
    /// Simulation settings; the seed is overridden per run.
    pub sim: SimConfig,
}

impl Default for SoakConfig {
    fn default() -> Self {
        Self {
            days: 7,
            seeds: 8,
            seed_start: 0,
            step_ticks: TICKS_PER_MINUTE,
            parallel: 0,
            sim: SimConfig::default(),
        }
    }
}

impl SoakConfig {
    /// Create a config for `seeds` runs of `days` each.
    pub fn new(days: u64, seeds: u32) -> Self {
        Self {
            days,
            seeds,
            ..Default::default()
        }
    }

    /// Set the first seed.
    pub fn with_seed_start(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set the ticks advanced per cycle.
    pub fn with_step_ticks(mut self, ticks: u64) -> Self {
        self.step_ticks = ticks;
        self
    }

    /// Set the simulation settings.
    pub fn with_sim(mut self, sim: SimConfig) -> Self {
        self.sim = sim;
        self
    }
}

/// What happened in one seed's run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoakRun {
    /// Seed used.
    pub seed: u64,
    /// Tick the run stopped at.
    pub final_tick: u64,
    /// State hash at the end.
    pub state_hash: u64,
    /// Incursion rules fired, in order.
    pub incursions: Vec<String>,
    /// Spawn events that relocated a vehicle.
    pub spawns_materialised: usize,
    /// Spawn events dropped for lack of a vehicle.
    pub spawns_dropped: usize,
    /// Vehicles created by weekly growth.
    pub vehicles_grown: usize,
    /// Missions that completed.
    pub missions_completed: usize,
    /// Missions that failed.
    pub missions_failed: usize,
    /// Buildings infiltrated.
    pub infiltrations: usize,
    /// Buildings subverted.
    pub subversions: usize,
    /// Research topics finished.
    pub research_completed: usize,
    /// Base facilities finished.
    pub facilities_completed: usize,
    /// Vehicles alive at the end.
    pub final_vehicles: usize,
    /// Reference inconsistencies seen at the end.
    pub reference_problems: Vec<String>,
}

impl SoakRun {
    fn record(&mut self, events: &TickEvents) {
        for event in &events.mission_events {
            match event {
                MissionEvent::Completed { .. } => self.missions_completed += 1,
                MissionEvent::Failed { .. } => self.missions_failed += 1,
                MissionEvent::Infiltrated { .. } => self.infiltrations += 1,
                MissionEvent::Subverted { .. } => self.subversions += 1,
                _ => {}
            }
        }
        self.incursions.extend(events.incursion_launched.iter().cloned());
        self.spawns_materialised += events.spawns_materialised.len();
        self.spawns_dropped += events.spawns_dropped.len();
        self.vehicles_grown += events.vehicles_grown.len();
        self.research_completed += events.research_completed.len();
        self.facilities_completed += events.facilities_completed.len();
    }
}

/// Aggregate over all runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoakSummary {
    /// Runs that completed.
    pub runs: usize,
    /// How often each incursion rule fired, across all runs.
    pub incursions_by_rule: BTreeMap<String, u32>,
    /// Mean incursions per run.
    pub mean_incursions: f64,
    /// Spawn events dropped, across all runs.
    pub spawns_dropped: usize,
    /// Missions failed, across all runs.
    pub missions_failed: usize,
    /// Runs that ended with inconsistent references.
    pub runs_with_reference_problems: usize,
}

impl SoakSummary {
    /// Summarise a set of runs.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_runs(runs: &[SoakRun]) -> Self {
        let mut summary = Self {
            runs: runs.len(),
            ..Self::default()
        };
        let mut total_incursions = 0usize;
        for run in runs {
            for rule in &run.incursions {
                *summary.incursions_by_rule.entry(rule.clone()).or_insert(0) += 1;
            }
            total_incursions += run.incursions.len();
            summary.spawns_dropped += run.spawns_dropped;
            summary.missions_failed += run.missions_failed;
            if !run.reference_problems.is_empty() {
                summary.runs_with_reference_problems += 1;
            }
        }
        if !runs.is_empty() {
            summary.mean_incursions = total_incursions as f64 / runs.len() as f64;
        }
        summary
    }
}

/// A seed that could not be run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoakError {
    /// Seed used.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Results of a soak.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoakResults {
    /// Configuration used.
    pub config: SoakConfig,
    /// Per-seed results, in seed order.
    pub runs: Vec<SoakRun>,
    /// Aggregate summary.
    pub summary: SoakSummary,
    /// Seeds that failed to start.
    pub errors: Vec<SoakError>,
    /// Wall-clock runtime.
    pub duration_seconds: f64,
}

impl SoakResults {
    /// Whether every run finished with consistent references.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.summary.runs_with_reference_problems == 0
    }

    /// Pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save to a `.json` or `.ron` file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => self.to_json()?,
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ToolError::Ron(e.to_string()))?,
            _ => return Err(ToolError::UnsupportedFormat(path.to_path_buf())),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ToolError::io(parent, e))?;
        }
        std::fs::write(path, text).map_err(|e| ToolError::io(path, e))
    }

    /// Load from a `.json` or `.ron` file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ToolError::io(path, e))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&text)?),
            Some("ron") => ron::from_str(&text).map_err(|e| ToolError::Ron(e.to_string())),
            _ => Err(ToolError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Run one seed to completion.
pub fn run_seed(rules: &RuleSet, config: &SoakConfig, seed: u64) -> Result<SoakRun> {
    let mut sim = Simulation::new_game(config.sim.clone().with_seed(seed), rules)?;
    let end = sim.ticks() + config.days * TICKS_PER_DAY;
    let step = config.step_ticks.max(1);

    let mut run = SoakRun {
        seed,
        ..SoakRun::default()
    };
    while sim.ticks() < end {
        let events = sim.advance(step.min(end - sim.ticks()));
        run.record(&events);
    }

    run.final_tick = sim.ticks();
    run.state_hash = sim.state_hash();
    run.final_vehicles = sim.vehicles().len();
    run.reference_problems = sim.reference_problems();
    Ok(run)
}

/// Run every seed in `config`, in parallel.
pub fn run_soak(rules: &RuleSet, config: SoakConfig) -> SoakResults {
    let start = Instant::now();
    let completed = AtomicUsize::new(0);

    info!(
        seeds = config.seeds,
        days = config.days,
        "Starting soak run"
    );

    let run_all = || -> Vec<std::result::Result<SoakRun, SoakError>> {
        (0..config.seeds)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed_start.wrapping_add(u64::from(i));
                let result = run_seed(rules, &config, seed).map_err(|e| {
                    warn!(seed, error = %e, "Soak seed failed");
                    SoakError {
                        seed,
                        message: e.to_string(),
                    }
                });
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("Progress: {}/{}", done, config.seeds);
                result
            })
            .collect()
    };

    let results = if config.parallel > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel)
            .build()
        {
            Ok(pool) => pool.install(run_all),
            Err(e) => {
                warn!(error = %e, "Could not build thread pool, using the global pool");
                run_all()
            }
        }
    } else {
        run_all()
    };

    let mut runs = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(run) => runs.push(run),
            Err(e) => errors.push(e),
        }
    }

    let summary = SoakSummary::from_runs(&runs);
    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        runs = runs.len(),
        errors = errors.len(),
        duration_seconds,
        "Soak complete"
    );

    SoakResults {
        config,
        runs,
        summary,
        errors,
        duration_seconds,
    }
}
