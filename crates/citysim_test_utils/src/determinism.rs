//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation produces
//! identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Saves, replays and bug reports all rely on a seed reproducing a world
//! exactly. Sources of non-determinism include:
//!
//! - **Floating-point math**: We use fixed-point arithmetic via
//!   [`citysim_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Registries are `BTreeMap`-backed and
//!   always iterate in key order.
//!
//! - **System randomness**: Patrol legs, incursion targets and staging
//!   positions all draw from the simulation's seeded RNG.
//!
//! - **Transient state**: Movement handles are not saved, so a loaded
//!   world must rebuild them without touching the RNG.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual subsystem determinism (paths, scheduler)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full simulation scenarios are reproducible
//! 4. **Parallel tests**: Running N simulations on threads all match

use std::thread;

use citysim_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of steps simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Steps: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `steps` - Number of steps to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance the simulation one step
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```ignore
/// use citysim_test_utils::determinism::verify_determinism;
/// use citysim_test_utils::fixtures::two_city_world;
///
/// let result = verify_determinism(
///     3,
///     100,
///     || two_city_world(7),
///     |sim| { sim.advance(60); },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    steps: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..steps {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks: steps,
    }
}

/// Run a [`Simulation`] twice, advancing `ticks_per_step` each step, and
/// compare final hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, steps: u64, ticks_per_step: u64) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        2,
        steps,
        &setup_fn,
        |sim| {
            sim.advance(ticks_per_step);
        },
        |sim| sim.state_hash(),
    )
    .is_deterministic
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// Catches state that leaks between threads or depends on memory layout.
#[must_use]
pub fn run_parallel_simulations<F>(
    setup_fn: F,
    num_sims: usize,
    steps: u64,
    ticks_per_step: u64,
) -> Vec<u64>
where
    F: Fn() -> Simulation + Sync,
{
    thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..steps {
                        sim.advance(ticks_per_step);
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}

/// Compare two runs step-by-step, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs match throughout, `Some(step)` for the first step
/// after which their hashes differ (0 means the initial states differ).
pub fn find_first_divergence<F>(setup_fn: F, steps: u64, ticks_per_step: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for step in 1..=steps {
        sim1.advance(ticks_per_step);
        sim2.advance(ticks_per_step);

        if sim1.state_hash() != sim2.state_hash() {
            return Some(step);
        }
    }

    None
}

/// Verify that a save/load round trip preserves simulation state and
/// that the loaded world continues exactly like the original.
pub fn verify_serialization_determinism<F>(setup_fn: F, steps: u64, ticks_per_step: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();
    for _ in 0..steps {
        sim.advance(ticks_per_step);
    }

    let Ok(bytes) = sim.serialize() else {
        return false;
    };
    let Ok(mut restored) = Simulation::deserialize(&bytes) else {
        return false;
    };
    if restored.state_hash() != sim.state_hash() {
        return false;
    }

    for _ in 0..steps {
        sim.advance(ticks_per_step);
        restored.advance(ticks_per_step);
    }
    restored.state_hash() == sim.state_hash()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::two_city_world;

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
        assert_eq!(result.unique_hashes(), vec![100]);
    }

    #[test]
    fn test_detects_nondeterminism() {
        let counter = std::cell::Cell::new(0u64);
        let result = verify_determinism(
            2,
            1,
            || {
                counter.set(counter.get() + 1);
                counter.get()
            },
            |_| {},
            |n| *n,
        );
        assert!(!result.is_deterministic);
        assert_eq!(result.unique_hashes().len(), 2);
    }

    #[test]
    #[should_panic(expected = "non-deterministic")]
    fn test_assert_deterministic_panics() {
        DeterminismResult {
            is_deterministic: false,
            hashes: vec![1, 2],
            ticks: 1,
        }
        .assert_deterministic();
    }

    #[test]
    fn test_two_city_world_is_deterministic() {
        assert!(verify_simulation_determinism(|| two_city_world(11), 30, 60));
        assert_eq!(find_first_divergence(|| two_city_world(11), 30, 60), None);
    }

    #[test]
    fn test_parallel_runs_match() {
        let hashes = run_parallel_simulations(|| two_city_world(5), 4, 20, 60);
        assert_eq!(hashes.len(), 4);
        assert!(hashes.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_save_load_continues_identically() {
        assert!(verify_serialization_determinism(|| two_city_world(3), 20, 60));
    }
}
