//! Citysim - Development Tools
//!
//! ```bash
//! # Check the shipped rules
//! cargo run -p citysim_tools -- validate assets/rules
//!
//! # Two simulated weeks across 16 seeds
//! cargo run -p citysim_tools -- soak --days 14 --seeds 16 --output results/soak.json
//!
//! # Same seed twice, compare hashes
//! cargo run -p citysim_tools -- verify --seed 42 --runs 3
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use citysim_core::config::SimConfig;
use citysim_tools::soak::{run_seed, run_soak, SoakConfig};
use citysim_tools::validate::{load_config, load_rules, validate_path};

#[derive(Parser)]
#[command(name = "citysim-tools")]
#[command(about = "Development tools for the city simulation")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate rule files
    Validate {
        /// Rule file or directory of rule files
        #[arg(default_value = "assets/rules")]
        path: PathBuf,

        /// Simulation config to check the rules against
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run many seeds headless and report what happened
    Soak {
        /// Rule file to load
        #[arg(short, long, default_value = "assets/rules/default.ron")]
        rules: PathBuf,

        /// Simulation config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Simulated days per seed
        #[arg(short, long, default_value = "7")]
        days: u64,

        /// Number of seeds
        #[arg(short, long, default_value = "8")]
        seeds: u32,

        /// First seed
        #[arg(long, default_value = "0")]
        seed_start: u64,

        /// Ticks per orchestrator cycle
        #[arg(long)]
        step_ticks: Option<u64>,

        /// Worker threads (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: usize,

        /// Print the full results as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Write results to a .json or .ron file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify determinism by running the same seed several times
    Verify {
        /// Rule file to load
        #[arg(short, long, default_value = "assets/rules/default.ron")]
        rules: PathBuf,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Simulated days per run
        #[arg(short, long, default_value = "3")]
        days: u64,

        /// Number of runs
        #[arg(long, default_value = "3")]
        runs: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let ok = match cli.command {
        Commands::Validate { path, config } => cmd_validate(&path, config.as_deref()),
        Commands::Soak {
            rules,
            config,
            days,
            seeds,
            seed_start,
            step_ticks,
            parallel,
            json,
            output,
        } => {
            let mut soak = SoakConfig::new(days, seeds).with_seed_start(seed_start);
            if let Some(step) = step_ticks {
                soak = soak.with_step_ticks(step);
            }
            soak.parallel = parallel;
            cmd_soak(&rules, config.as_deref(), soak, json, output.as_deref())
        }
        Commands::Verify {
            rules,
            seed,
            days,
            runs,
        } => cmd_verify(&rules, seed, days, runs),
    };

    if !ok {
        std::process::exit(1);
    }
}

fn sim_config(path: Option<&Path>) -> Option<SimConfig> {
    match path {
        None => Some(SimConfig::default()),
        Some(path) => match load_config(path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::error!("Failed to load config: {e}");
                None
            }
        },
    }
}

fn cmd_validate(path: &Path, config: Option<&Path>) -> bool {
    let Some(config) = sim_config(config) else {
        return false;
    };
    tracing::info!("Validating rule files in: {}", path.display());

    let reports = match validate_path(path, &config) {
        Ok(reports) => reports,
        Err(e) => {
            tracing::error!("Validation failed: {e}");
            return false;
        }
    };

    let mut ok = true;
    for report in &reports {
        for warning in &report.warnings {
            tracing::warn!("{}: {warning}", report.path.display());
        }
        if report.is_valid() {
            tracing::info!(
                "{}: {} organisations, {} vehicle types, {} cities, {} incursions",
                report.path.display(),
                report.organisations,
                report.vehicle_types,
                report.cities,
                report.incursions
            );
        } else {
            ok = false;
            for problem in &report.problems {
                tracing::error!("{}: {problem}", report.path.display());
            }
        }
    }

    if reports.is_empty() {
        tracing::warn!("No rule files found");
    } else if ok {
        tracing::info!("Validation passed");
    }
    ok
}

fn cmd_soak(
    rules_path: &Path,
    config: Option<&Path>,
    mut soak: SoakConfig,
    json: bool,
    output: Option<&Path>,
) -> bool {
    let Some(sim) = sim_config(config) else {
        return false;
    };
    soak.sim = sim;
    let rules = match load_rules(rules_path) {
        Ok(rules) => rules,
        Err(e) => {
            tracing::error!("Failed to load rules: {e}");
            return false;
        }
    };

    let results = run_soak(&rules, soak);

    if let Some(path) = output {
        if let Err(e) = results.save(path) {
            tracing::error!("Failed to save results: {e}");
            return false;
        }
        tracing::info!("Results saved to: {}", path.display());
    }

    if json {
        match results.to_json() {
            Ok(text) => println!("{text}"),
            Err(e) => {
                tracing::error!("Failed to encode results: {e}");
                return false;
            }
        }
    } else {
        let summary = &results.summary;
        println!(
            "{} runs, {:.2} incursions per run, {} spawns dropped, {} missions failed",
            summary.runs, summary.mean_incursions, summary.spawns_dropped, summary.missions_failed
        );
        for (rule, count) in &summary.incursions_by_rule {
            println!("  {rule}: {count}");
        }
        for error in &results.errors {
            println!("  seed {} failed: {}", error.seed, error.message);
        }
    }

    if !results.is_clean() {
        tracing::error!(
            "{} seeds failed, {} runs ended with reference problems",
            results.errors.len(),
            results.summary.runs_with_reference_problems
        );
    }
    results.is_clean()
}

fn cmd_verify(rules_path: &Path, seed: u64, days: u64, runs: u32) -> bool {
    let rules = match load_rules(rules_path) {
        Ok(rules) => rules,
        Err(e) => {
            tracing::error!("Failed to load rules: {e}");
            return false;
        }
    };
    let config = SoakConfig::new(days, 1);

    let mut hashes = Vec::new();
    for run in 0..runs {
        match run_seed(&rules, &config, seed) {
            Ok(result) => {
                tracing::info!("Run {}: hash = {:#018x}", run + 1, result.state_hash);
                hashes.push(result.state_hash);
            }
            Err(e) => {
                tracing::error!("Run {} failed: {e}", run + 1);
                return false;
            }
        }
    }

    let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    if deterministic {
        tracing::info!("Determinism verified: {} runs produced identical hashes", runs);
    } else {
        tracing::error!("Determinism FAILED: hashes differ across runs");
    }
    deterministic
}
