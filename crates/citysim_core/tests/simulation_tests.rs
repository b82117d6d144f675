//! End-to-end tests for the tick orchestrator.
//!
//! These drive a full [`Simulation`] built from the shared fixture world
//! and check the cross-subsystem behaviour: incursion selection, weekly
//! growth, fast-forward, command handling and persistence.

use citysim_core::command::{MissionOrder, PlayerCommand};
use citysim_core::config::SimConfig;
use citysim_core::error::SimError;
use citysim_core::math::TilePos;
use citysim_core::mission::PlannedPath;
use citysim_core::mission::MissionKind;
use citysim_core::rules::{GrowthKey, IncursionRule, PrimaryMission};
use citysim_core::simulation::Simulation;
use citysim_core::state_ref::StateRef;
use citysim_core::time::{TICKS_PER_DAY, TICKS_PER_SECOND, TICKS_PER_WEEK};
use citysim_test_utils::determinism::{
    find_first_divergence, verify_serialization_determinism, verify_simulation_determinism,
};
use citysim_test_utils::fixtures::{
    add_alien_vehicle, two_city_world, WorldBuilder, ALIEN_CITY, HUMAN_CITY, PLAYER_ORG,
};

// =============================================================================
// Incursions
// =============================================================================

fn priority_world() -> Simulation {
    WorldBuilder::new()
        .vehicle_type("UFO_TYPE_A", 6, 2)
        .incursion("SMALL_RAID", 5, &[("UFO_TYPE_A", 1)])
        .incursion("LARGE_RAID", 10, &[("UFO_TYPE_A", 2)])
        .build(SimConfig::default().with_seed(99))
}

#[test]
fn test_highest_satisfied_priority_fires() {
    let mut sim = priority_world();
    add_alien_vehicle(&mut sim, "UFO_A1", "UFO_TYPE_A");
    add_alien_vehicle(&mut sim, "UFO_A2", "UFO_TYPE_A");
    let now = sim.ticks();

    let fired = sim.evaluate_incursions();
    assert_eq!(fired, Some(("LARGE_RAID".to_string(), 2)));

    let pending = sim.spawn_queue().pending();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].scheduled_tick, now + TICKS_PER_SECOND / 2);
    assert_eq!(
        pending[1].scheduled_tick - pending[0].scheduled_tick,
        TICKS_PER_SECOND / 2
    );
    for event in pending {
        assert_eq!(event.vehicle_type, StateRef::new("UFO_TYPE_A"));
        assert_eq!(event.missions.len(), 1);
        assert_eq!(event.missions[0].name(), "Infiltrate");
    }
}

#[test]
fn test_crashed_vehicles_do_not_count() {
    let mut sim = priority_world();
    add_alien_vehicle(&mut sim, "UFO_A1", "UFO_TYPE_A");
    add_alien_vehicle(&mut sim, "UFO_A2", "UFO_TYPE_A");
    sim.vehicle_mut("UFO_A2").unwrap().crashed = true;

    assert_eq!(sim.alien_tally().get("UFO_TYPE_A"), Some(&1));
    assert_eq!(
        sim.evaluate_incursions(),
        Some(("SMALL_RAID".to_string(), 1))
    );
}

#[test]
fn test_no_rule_satisfied_schedules_nothing() {
    let mut sim = priority_world();
    assert_eq!(sim.evaluate_incursions(), None);
    assert!(sim.spawn_queue().is_empty());
}

#[test]
fn test_incursion_materialises_in_human_city() {
    let mut sim = priority_world();
    add_alien_vehicle(&mut sim, "UFO_A1", "UFO_TYPE_A");
    add_alien_vehicle(&mut sim, "UFO_A2", "UFO_TYPE_A");

    let events = sim.advance(TICKS_PER_DAY / 2);
    assert!(events.day_passed);
    assert_eq!(events.incursion_launched.as_deref(), Some("LARGE_RAID"));
    assert_eq!(events.spawns_scheduled, 2);
    assert!(events.spawns_materialised.is_empty());

    let events = sim.advance(TICKS_PER_SECOND);
    assert_eq!(events.spawns_materialised.len(), 2);
    assert!(sim.spawn_queue().is_empty());
    for id in ["UFO_A1", "UFO_A2"] {
        let ufo = sim.vehicle(id).unwrap();
        assert_eq!(ufo.city, StateRef::new(HUMAN_CITY));
        assert!(ufo.is_on_map());
        let mission = ufo.current_mission().unwrap();
        assert_eq!(mission.name(), "Infiltrate");
        assert!(mission.started);
    }
    assert!(sim.alien_tally().is_empty());
}

#[test]
fn test_every_purpose_launches_infiltrators() {
    for purpose in [
        PrimaryMission::Infiltration,
        PrimaryMission::Subversion,
        PrimaryMission::Attack,
        PrimaryMission::Overspawn,
    ] {
        let mut sim = WorldBuilder::new()
            .vehicle_type("UFO_TYPE_A", 6, 2)
            .incursion_rule(IncursionRule {
                id: "RAID".to_string(),
                primary_mission: purpose,
                priority: 1,
                primary: vec![("UFO_TYPE_A".to_string(), 2)],
                escort: Vec::new(),
                attack: Vec::new(),
            })
            .build(SimConfig::default().with_seed(5));
        add_alien_vehicle(&mut sim, "UFO_A1", "UFO_TYPE_A");
        add_alien_vehicle(&mut sim, "UFO_A2", "UFO_TYPE_A");

        let events = sim.advance(TICKS_PER_DAY / 2);
        assert_eq!(events.spawns_scheduled, 2, "{purpose:?}");
        for event in sim.spawn_queue().pending() {
            assert_eq!(event.missions.len(), 1);
            assert!(
                matches!(event.missions[0].kind, MissionKind::Infiltrate { .. }),
                "{purpose:?} launched {}",
                event.missions[0].name()
            );
        }
    }
}

#[test]
fn test_only_one_incursion_per_day() {
    let mut sim = priority_world();
    add_alien_vehicle(&mut sim, "UFO_A1", "UFO_TYPE_A");
    add_alien_vehicle(&mut sim, "UFO_A2", "UFO_TYPE_A");
    add_alien_vehicle(&mut sim, "UFO_A3", "UFO_TYPE_A");

    let events = sim.advance(TICKS_PER_DAY / 2);
    assert_eq!(events.incursion_launched.as_deref(), Some("LARGE_RAID"));
    assert_eq!(sim.spawn_queue().len(), 2);
}

// =============================================================================
// Weekly growth
// =============================================================================

#[test]
fn test_week_table_overrides_default() {
    let mut sim = WorldBuilder::new()
        .vehicle_type("UFO_SCOUT", 6, 2)
        .vehicle_type("UFO_FIGHTER", 5, 5)
        .growth(GrowthKey::Default, &[("UFO_SCOUT", 1)])
        .growth(GrowthKey::Week(3), &[("UFO_FIGHTER", 3)])
        .build(SimConfig::default().with_seed(3));

    let mut grown = Vec::new();
    for _ in 0..14 {
        let events = sim.advance(TICKS_PER_DAY);
        if events.week_passed {
            grown.push(events.vehicles_grown);
        }
    }
    assert_eq!(grown.len(), 2);

    // First rollover enters week 2, which has no table of its own.
    assert_eq!(grown[0].len(), 1);
    assert_eq!(
        sim.vehicles().get(&grown[0][0]).unwrap().vehicle_type,
        StateRef::new("UFO_SCOUT")
    );
    assert_eq!(grown[1].len(), 3);
    for r in &grown[1] {
        let v = sim.vehicles().get(r).unwrap();
        assert_eq!(v.vehicle_type, StateRef::new("UFO_FIGHTER"));
        assert_eq!(v.city, StateRef::new(ALIEN_CITY));
    }
}

#[test]
fn test_growth_without_map_is_staged() {
    let mut sim = WorldBuilder::new()
        .vehicle_type("UFO_SCOUT", 6, 2)
        .growth(GrowthKey::Default, &[("UFO_SCOUT", 2)])
        .without_map(ALIEN_CITY)
        .build(SimConfig::default());

    let grown = sim.grow_ufos();
    assert_eq!(grown.len(), 2);
    let config = sim.config().clone();
    for r in &grown {
        let v = sim.vehicles().get(r).unwrap();
        assert!(!v.is_on_map());
        let tile = v.tile();
        assert!((config.staging_min..=config.staging_max).contains(&tile.x));
        assert!((config.staging_min..=config.staging_max).contains(&tile.y));
        assert_eq!(v.current_mission().unwrap().name(), "Patrol");
    }
}

// =============================================================================
// Fast-forward
// =============================================================================

#[test]
fn test_turbo_aligns_to_interval() {
    let mut sim = WorldBuilder::new()
        .vehicle_type("HAWK", 8, 3)
        .roster_vehicle("HAWK_1", "HAWK", "BLD_HQ")
        .build(SimConfig::default().with_turbo_interval(300));
    let midday = sim.ticks();
    assert_eq!(midday % 300, 0);

    sim.advance(37);
    assert!(sim.can_turbo());
    sim.advance_turbo().unwrap();
    assert_eq!(sim.ticks(), midday + 300);

    // Already aligned: a full interval.
    sim.advance_turbo().unwrap();
    assert_eq!(sim.ticks(), midday + 600);
}

#[test]
fn test_turbo_refused_over_hostile_city() {
    let mut sim = two_city_world(21);
    assert!(sim.can_turbo());

    // Aggressive alien scouts patrol the alien city.
    sim.apply_command(PlayerCommand::ToggleActiveCity).unwrap();
    assert!(!sim.can_turbo());
    let before = sim.state_hash();
    assert!(matches!(
        sim.advance_turbo(),
        Err(SimError::TurboUnavailable(_))
    ));
    assert_eq!(sim.state_hash(), before);
}

#[test]
fn test_turbo_ignores_passive_aliens() {
    let mut sim = WorldBuilder::new()
        .vehicle_type("UFO_PROBE", 4, 0)
        .growth(GrowthKey::Default, &[("UFO_PROBE", 2)])
        .build_new_game(SimConfig::default());
    sim.toggle_active_city();
    assert!(sim.can_turbo());
}

// =============================================================================
// Missions via commands
// =============================================================================

#[test]
fn test_successor_started_exactly_once() {
    let mut sim = priority_world();
    add_alien_vehicle(&mut sim, "UFO_A1", "UFO_TYPE_A");
    sim.apply_command(PlayerCommand::ReplaceMissions {
        vehicle: "UFO_A1".into(),
        orders: vec![
            MissionOrder::Snooze(1),
            MissionOrder::GotoLocation(TilePos::new(24, 16, 5)),
        ],
    })
    .unwrap();

    sim.advance(1);
    let front = sim.vehicle("UFO_A1").unwrap().current_mission().unwrap().clone();
    assert_eq!(front.name(), "GotoLocation");
    assert!(front.started);
    assert!(matches!(front.path, PlannedPath::Planned(_)));

    sim.advance(0);
    let again = sim.vehicle("UFO_A1").unwrap().current_mission().unwrap();
    assert_eq!(again.path, front.path);
}

#[test]
fn test_push_front_suspends_active_mission() {
    let mut sim = priority_world();
    add_alien_vehicle(&mut sim, "UFO_A1", "UFO_TYPE_A");
    sim.apply_command(PlayerCommand::ReplaceMissions {
        vehicle: "UFO_A1".into(),
        orders: vec![MissionOrder::GotoLocation(TilePos::new(28, 28, 5))],
    })
    .unwrap();
    sim.advance(1);

    sim.apply_command(PlayerCommand::PushMissionFront {
        vehicle: "UFO_A1".into(),
        order: MissionOrder::Snooze(10),
    })
    .unwrap();
    let missions = &sim.vehicle("UFO_A1").unwrap().missions;
    assert_eq!(missions[0].name(), "Snooze");
    assert!(!missions[1].started);
    assert_eq!(missions[1].path, PlannedPath::NotPlanned);
}

#[test]
fn test_queued_order_after_landing_takes_off_again() {
    let mut sim = two_city_world(4);
    sim.apply_command(PlayerCommand::PushMissionBack {
        vehicle: "HAWK_1".into(),
        order: MissionOrder::GotoBuilding("BLD_SENATE".into()),
    })
    .unwrap();
    sim.apply_command(PlayerCommand::PushMissionBack {
        vehicle: "HAWK_1".into(),
        order: MissionOrder::Patrol(2),
    })
    .unwrap();
    let names: Vec<_> = sim
        .vehicle("HAWK_1")
        .unwrap()
        .missions
        .iter()
        .map(|m| m.name())
        .collect();
    assert_eq!(
        names,
        vec!["TakeOff", "GotoBuilding", "Land", "TakeOff", "Patrol"]
    );
}

#[test]
fn test_stale_command_rejected_at_apply() {
    let mut sim = two_city_world(8);
    sim.submit(PlayerCommand::PushMissionBack {
        vehicle: "HAWK_1".into(),
        order: MissionOrder::Snooze(5),
    })
    .unwrap();
    sim.destroy_vehicle(&StateRef::new("HAWK_1")).unwrap();

    let events = sim.advance(1);
    assert_eq!(events.commands_rejected, 1);
    assert!(sim.reference_problems().is_empty());
}

#[test]
fn test_follow_target_destroyed() {
    let mut sim = priority_world();
    add_alien_vehicle(&mut sim, "UFO_A1", "UFO_TYPE_A");
    add_alien_vehicle(&mut sim, "UFO_A2", "UFO_TYPE_A");
    sim.apply_command(PlayerCommand::ReplaceMissions {
        vehicle: "UFO_A1".into(),
        orders: vec![MissionOrder::FollowVehicle("UFO_A2".into())],
    })
    .unwrap();
    sim.advance(1);
    assert_eq!(
        sim.vehicle("UFO_A1").unwrap().current_mission().unwrap().name(),
        "FollowVehicle"
    );

    sim.destroy_vehicle(&StateRef::new("UFO_A2")).unwrap();
    sim.advance(1);
    assert!(sim.vehicle("UFO_A1").unwrap().missions.is_empty());
}

// =============================================================================
// Time
// =============================================================================

#[test]
fn test_advance_zero_is_idempotent() {
    let mut sim = WorldBuilder::new()
        .vehicle_type("HAWK", 8, 3)
        .roster_vehicle("HAWK_1", "HAWK", "BLD_HQ")
        .build(SimConfig::default());

    // Land exactly on a day boundary.
    let events = sim.advance(TICKS_PER_DAY / 2);
    assert!(events.day_passed);
    let hash = sim.state_hash();

    for _ in 0..3 {
        let events = sim.advance(0);
        assert!(!events.day_passed);
        assert!(!events.week_passed);
        assert_eq!(sim.state_hash(), hash);
        assert_eq!(sim.ticks(), TICKS_PER_DAY);
    }
}

#[test]
fn test_fast_patroller_survives_week_long_step() {
    let mut sim = WorldBuilder::new()
        .vehicle_type("UFO_INTERCEPTOR", 60, 4)
        .growth(GrowthKey::Default, &[("UFO_INTERCEPTOR", 1)])
        .build_new_game(SimConfig::default().with_seed(21));
    let ufo = sim.vehicles().values().next().unwrap().id.clone();
    assert_eq!(sim.vehicle(&ufo).unwrap().current_mission().unwrap().name(), "Patrol");

    let events = sim.advance(TICKS_PER_WEEK);
    assert!(events.week_passed);
    assert!(sim.vehicle(&ufo).unwrap().is_on_map());
    assert!(sim.reference_problems().is_empty());
}

#[test]
fn test_ten_week_step_with_patrol_on_map() {
    let mut sim = two_city_world(22);
    let start = sim.ticks();

    let events = sim.advance(TICKS_PER_WEEK * 10);
    assert!(events.day_passed);
    assert!(events.week_passed);
    assert_eq!(sim.ticks(), start + TICKS_PER_WEEK * 10);
    assert!(sim.reference_problems().is_empty());

    // Beyond the fixed-point tick range.
    sim.advance(1 << 31);
    sim.advance(1 << 40);
    assert_eq!(sim.ticks(), start + TICKS_PER_WEEK * 10 + (1 << 31) + (1 << 40));
}

#[test]
fn test_day_flag_raised_once_per_boundary() {
    let mut sim = two_city_world(2);
    let mut days = 0;
    for _ in 0..(TICKS_PER_DAY / TICKS_PER_SECOND / 60) {
        if sim.advance(TICKS_PER_SECOND * 60).day_passed {
            days += 1;
        }
    }
    assert_eq!(days, 1);
    assert!(!sim.time().day_passed());
}

// =============================================================================
// Relations
// =============================================================================

#[test]
fn test_relations_from_rules() {
    let sim = WorldBuilder::new()
        .relation(PLAYER_ORG, "ORG_MEGAPOL", 80)
        .relation("ORG_MEGAPOL", PLAYER_ORG, -30)
        .build(SimConfig::default());
    let player = sim.organisation(PLAYER_ORG).unwrap();
    let megapol = sim.organisation("ORG_MEGAPOL").unwrap();
    let aliens = sim.organisation("ORG_ALIEN").unwrap();

    assert_eq!(player.relation_to(megapol), 80);
    assert_eq!(megapol.relation_to(player), -30);
    assert!(player.is_positive_to(megapol));
    assert!(megapol.is_negative_to(player));
    assert_eq!(player.relation_to(aliens), -100);
}

// =============================================================================
// Determinism and persistence
// =============================================================================

#[test]
fn test_same_seed_same_world() {
    assert!(verify_simulation_determinism(|| two_city_world(42), 60, TICKS_PER_SECOND));
    assert_eq!(
        find_first_divergence(|| two_city_world(42), 60, TICKS_PER_SECOND),
        None
    );
}

#[test]
fn test_different_seeds_diverge() {
    let a = two_city_world(1);
    let b = two_city_world(2);
    assert_ne!(a.state_hash(), b.state_hash());
}

#[test]
fn test_loaded_game_continues_identically() {
    assert!(verify_serialization_determinism(
        || two_city_world(17),
        30,
        TICKS_PER_SECOND
    ));
}

#[test]
fn test_full_week_keeps_references_consistent() {
    let mut sim = two_city_world(12);
    sim.apply_command(PlayerCommand::ReplaceMissions {
        vehicle: "HAWK_1".into(),
        orders: vec![
            MissionOrder::GotoBuilding("BLD_SENATE".into()),
            MissionOrder::Snooze(TICKS_PER_SECOND * 5),
            MissionOrder::GotoBuilding("BLD_HQ".into()),
        ],
    })
    .unwrap();
    for _ in 0..(7 * 24) {
        sim.advance(TICKS_PER_DAY / 24);
        assert!(sim.reference_problems().is_empty());
    }
    assert!(sim.time().week() >= 2);
}
