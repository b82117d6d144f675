//! Proptest strategies.
//!
//! Generate random but reproducible inputs for property-based tests of
//! the scheduler, relation tiers and command handling.

use citysim_core::command::MissionOrder;
use citysim_core::math::TilePos;
use citysim_core::organisation::{MAX_RELATION, MIN_RELATION};
use proptest::prelude::*;

use crate::fixtures::{MAP_HEIGHT, MAP_SIZE};

/// Any standing in the clamped range.
pub fn arb_standing() -> impl Strategy<Value = i32> {
    MIN_RELATION..=MAX_RELATION
}

/// Any standing, including values far outside the clamped range.
pub fn arb_raw_standing() -> impl Strategy<Value = i32> {
    -1000i32..1000i32
}

/// A tile inside the fixture map.
pub fn arb_tile() -> impl Strategy<Value = TilePos> {
    (0..MAP_SIZE, 0..MAP_SIZE, 1..MAP_HEIGHT).prop_map(|(x, y, z)| TilePos::new(x, y, z))
}

/// Scheduled ticks for a batch of spawn events.
///
/// Range: up to two simulated days, so batches often share ticks.
pub fn arb_spawn_ticks(max_len: usize) -> impl Strategy<Value = Vec<u64>> {
    proptest::collection::vec(0u64..20u64, 0..max_len).prop_map(|offsets| {
        offsets
            .into_iter()
            .map(|o| o * citysim_core::time::TICKS_PER_HOUR * 3)
            .collect()
    })
}

/// Tick counts for a single advance, from zero up to a few seconds.
pub fn arb_advance_ticks() -> impl Strategy<Value = u64> {
    0u64..300u64
}

/// An order that needs no ids beyond the fixture's buildings.
pub fn arb_mission_order() -> impl Strategy<Value = MissionOrder> {
    let building = prop_oneof![Just("BLD_HQ".to_string()), Just("BLD_SENATE".to_string())];
    prop_oneof![
        arb_tile().prop_map(MissionOrder::GotoLocation),
        building.clone().prop_map(MissionOrder::GotoBuilding),
        (1u64..600u64).prop_map(MissionOrder::Snooze),
        (1u32..4u32).prop_map(MissionOrder::Patrol),
        building.prop_map(MissionOrder::Infiltrate),
    ]
}

/// A sequence of orders.
pub fn arb_order_sequence(max_len: usize) -> impl Strategy<Value = Vec<MissionOrder>> {
    proptest::collection::vec(arb_mission_order(), 1..max_len)
}
