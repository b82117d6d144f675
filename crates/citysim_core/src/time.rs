//! Simulated game time.
//!
//! Time is a monotonically increasing tick counter. Crossing a day or week
//! boundary raises a flag that stays set until [`GameTime::clear_flags`]
//! runs at the end of the orchestrator cycle.

use serde::{Deserialize, Serialize};

/// Ticks per simulated second.
pub const TICKS_PER_SECOND: u64 = 60;

/// Ticks per simulated minute.
pub const TICKS_PER_MINUTE: u64 = TICKS_PER_SECOND * 60;

/// Ticks per simulated hour.
pub const TICKS_PER_HOUR: u64 = TICKS_PER_MINUTE * 60;

/// Ticks per simulated day.
pub const TICKS_PER_DAY: u64 = TICKS_PER_HOUR * 24;

/// Ticks per simulated week.
pub const TICKS_PER_WEEK: u64 = TICKS_PER_DAY * 7;

/// Default fast-forward step: five simulated minutes.
pub const TURBO_TICKS: u64 = TICKS_PER_MINUTE * 5;

/// The simulation clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GameTime {
    ticks: u64,
    day_passed: bool,
    week_passed: bool,
}

impl GameTime {
    /// Create a clock at the given tick with no boundary flags set.
    #[must_use]
    pub const fn new(ticks: u64) -> Self {
        Self {
            ticks,
            day_passed: false,
            week_passed: false,
        }
    }

    /// Noon on the first day, where a new game starts.
    #[must_use]
    pub const fn midday() -> Self {
        Self::new(TICKS_PER_DAY / 2)
    }

    /// Current tick.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Zero-based day index.
    #[must_use]
    pub const fn day(&self) -> u64 {
        self.ticks / TICKS_PER_DAY
    }

    /// One-based week number.
    #[must_use]
    pub const fn week(&self) -> u32 {
        (self.ticks / TICKS_PER_WEEK) as u32 + 1
    }

    /// Whether a day boundary was crossed since the flags were last cleared.
    #[must_use]
    pub const fn day_passed(&self) -> bool {
        self.day_passed
    }

    /// Whether a week boundary was crossed since the flags were last cleared.
    #[must_use]
    pub const fn week_passed(&self) -> bool {
        self.week_passed
    }

    /// Advance the clock, raising boundary flags for any day or week crossed.
    pub fn add_ticks(&mut self, ticks: u64) {
        let before = self.ticks;
        self.ticks += ticks;
        if self.ticks / TICKS_PER_DAY > before / TICKS_PER_DAY {
            self.day_passed = true;
        }
        if self.ticks / TICKS_PER_WEEK > before / TICKS_PER_WEEK {
            self.week_passed = true;
        }
    }

    /// Reset the boundary flags.
    pub fn clear_flags(&mut self) {
        self.day_passed = false;
        self.week_passed = false;
    }

    /// Ticks needed to reach the next multiple of `interval`.
    ///
    /// A clock already on a boundary moves a full interval.
    #[must_use]
    pub const fn ticks_to_next_boundary(&self, interval: u64) -> u64 {
        if interval == 0 {
            return 0;
        }
        interval - self.ticks % interval
    }
}
