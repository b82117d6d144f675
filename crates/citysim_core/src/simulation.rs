//! Core simulation loop.
//!
//! [`Simulation`] owns every entity collection and advances them in a
//! fixed order. Each call to [`Simulation::advance`]:
//!
//! 1. applies queued player commands,
//! 2. updates every city,
//! 3. updates every vehicle's mission queue, then applies the side effects
//!    the missions reported,
//! 4. advances research,
//! 5. moves the clock forward,
//! 6. materialises every spawn event that is now due,
//! 7. runs end-of-day logic if a day boundary was crossed,
//! 8. runs end-of-week logic if a week boundary was crossed,
//! 9. clears the boundary flags.
//!
//! A tick never fails. Lookup misses are logged and skipped.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, VecDeque};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::city::{Building, City, GENERATED_PORTALS};
use crate::command::{MissionOrder, PlayerCommand};
use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::math::{TilePos, Vec3Fixed};
use crate::mission::{
    start_front_mission, update_missions, Mission, MissionEnv, MissionEvent, MissionKind,
    DEFAULT_PATROL_LEGS,
};
use crate::organisation::{Organisation, Relation};
use crate::pathfinding::{CellType, TileMap};
use crate::research::{Base, Lab, Research, ResearchTopic};
use crate::rng::SimRng;
use crate::rules::{sort_by_priority, CityDef, GrowthKey, GrowthTable, IncursionRule, RuleSet};
use crate::scheduler::{SpawnEvent, SpawnQueue};
use crate::state_ref::{Registry, StateRef};
use crate::time::GameTime;
use crate::vehicle::{Vehicle, VehicleType, DEFAULT_ALTITUDE};

/// Events generated during a call to [`Simulation::advance`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Side effects reported by vehicle missions, in the order they ran.
    pub mission_events: Vec<MissionEvent>,
    /// Projectiles that burned out or left their map.
    pub projectiles_expired: usize,
    /// Research topics finished.
    pub research_completed: Vec<StateRef<ResearchTopic>>,
    /// Vehicles relocated by due spawn events.
    pub spawns_materialised: Vec<StateRef<Vehicle>>,
    /// Due spawn events with no vehicle to relocate.
    pub spawns_dropped: Vec<StateRef<VehicleType>>,
    /// Incursion rule that fired at end of day.
    pub incursion_launched: Option<String>,
    /// Spawn events queued by the incursion.
    pub spawns_scheduled: usize,
    /// Base facilities whose construction finished.
    pub facilities_completed: Vec<String>,
    /// Vehicles created by weekly growth.
    pub vehicles_grown: Vec<StateRef<Vehicle>>,
    /// A day boundary was crossed.
    pub day_passed: bool,
    /// A week boundary was crossed.
    pub week_passed: bool,
    /// Queued commands that no longer applied.
    pub commands_rejected: usize,
}

/// Per-vehicle view for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VehicleSnapshot {
    /// Vehicle id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// City id.
    pub city: String,
    /// Position in tile units.
    pub position: Vec3Fixed,
    /// Remaining health.
    pub health: u32,
    /// Flying on the city map.
    pub on_map: bool,
    /// Name of the active mission.
    pub mission: Option<String>,
}

/// The authoritative game world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    config: SimConfig,
    time: GameTime,
    rng: SimRng,
    organisations: Registry<Organisation>,
    vehicle_types: Registry<VehicleType>,
    cities: Registry<City>,
    vehicles: Registry<Vehicle>,
    research: Research,
    bases: Registry<Base>,
    growth: BTreeMap<GrowthKey, GrowthTable>,
    incursions: Vec<IncursionRule>,
    spawn_queue: SpawnQueue,
    active_city: StateRef<City>,
    pending_commands: VecDeque<PlayerCommand>,
    next_vehicle_id: u64,
}

impl Simulation {
    /// Build a world from validated rule data.
    ///
    /// The clock starts at midday on the first day and the human city is
    /// active. Roster vehicles start parked in their home buildings.
    pub fn new(config: SimConfig, rules: &RuleSet) -> Result<Self> {
        let problems = rules.validate();
        if !problems.is_empty() {
            return Err(SimError::RuleValidation(problems));
        }
        check_required(&config, rules)?;

        let mut organisations = Registry::new();
        for def in &rules.organisations {
            let mut org = Organisation::new(def.id.as_str(), def.name.as_str(), def.balance, def.income);
            org.alien = def.alien;
            for (other, standing) in &def.relations {
                org.set_relation(StateRef::new(other.as_str()), *standing);
            }
            organisations.insert(def.id.as_str(), org);
        }

        let mut vehicle_types = Registry::new();
        for vehicle_type in &rules.vehicle_types {
            vehicle_types.insert(vehicle_type.id.as_str(), vehicle_type.clone());
        }

        let mut cities = Registry::new();
        for def in &rules.cities {
            cities.insert(def.id.as_str(), build_city(def));
        }

        let mut research = Research::default();
        for topic in &rules.research {
            research.topics.insert(topic.id.as_str(), topic.clone());
        }
        for def in &rules.labs {
            let current_topic = def
                .topic
                .as_deref()
                .map_or_else(StateRef::empty, StateRef::new);
            research.labs.insert(
                def.id.as_str(),
                Lab {
                    id: def.id.clone(),
                    skill: def.skill,
                    current_topic,
                },
            );
        }

        let mut bases = Registry::new();
        for base in &rules.bases {
            bases.insert(base.id.as_str(), base.clone());
        }

        let mut vehicles = Registry::new();
        for def in &rules.vehicles {
            let Some(vehicle_type) = vehicle_types.get_mut(&StateRef::new(def.vehicle_type.as_str()))
            else {
                continue;
            };
            vehicle_type.num_created += 1;
            let mut vehicle = Vehicle::new(
                def.id.as_str(),
                vehicle_type,
                StateRef::new(def.owner.as_str()),
                StateRef::new(def.city.as_str()),
            );
            vehicle.name = format!("{} {}", vehicle_type.name, vehicle_type.num_created);
            vehicle.equip_default_equipment(vehicle_type);
            vehicle.home_building = StateRef::new(def.home_building.as_str());
            vehicle.currently_landed_building = vehicle.home_building.clone();
            if let Some(building) = cities
                .get_mut(&vehicle.city)
                .and_then(|c| c.buildings.get_mut(&vehicle.home_building))
            {
                vehicle.position = building.pad.center();
                building.landed_vehicles.insert(vehicle.to_ref());
            }
            vehicles.insert(def.id.as_str(), vehicle);
        }

        let mut sim = Self {
            rng: SimRng::new(config.seed),
            active_city: StateRef::new(config.human_city.as_str()),
            config,
            time: GameTime::midday(),
            organisations,
            vehicle_types,
            cities,
            vehicles,
            research,
            bases,
            growth: rules.growth.clone(),
            incursions: rules.incursions.clone(),
            spawn_queue: SpawnQueue::new(),
            pending_commands: VecDeque::new(),
            next_vehicle_id: 1,
        };
        sim.init_state();
        tracing::info!(
            cities = sim.cities.len(),
            vehicles = sim.vehicles.len(),
            seed = sim.config.seed,
            "Simulation created"
        );
        Ok(sim)
    }

    /// Build a world and run the first week's alien growth.
    pub fn new_game(config: SimConfig, rules: &RuleSet) -> Result<Self> {
        let mut sim = Self::new(config, rules)?;
        sim.grow_ufos();
        Ok(sim)
    }

    /// Generate missing portals and put free-flying vehicles back on their
    /// maps.
    ///
    /// Runs after construction and after loading, since movement handles
    /// are not persisted. Parked vehicles and vehicles in a city without a
    /// map stay off the map.
    pub fn init_state(&mut self) {
        for city in self.cities.values_mut() {
            city.generate_portals(&mut self.rng, GENERATED_PORTALS);
        }
        for vehicle in self.vehicles.values_mut() {
            if vehicle.is_on_map() || vehicle.is_landed() {
                continue;
            }
            let Some(map) = self.cities.get(&vehicle.city).and_then(|c| c.map.as_ref()) else {
                continue;
            };
            let position = if map.in_bounds(vehicle.tile()) {
                vehicle.position
            } else {
                map.clamp(vehicle.tile()).center()
            };
            vehicle.launch(position);
        }
    }

    /// Advance the simulation by exactly one tick.
    pub fn advance_one(&mut self) -> TickEvents {
        self.advance(1)
    }

    /// Advance the simulation by `ticks`.
    ///
    /// A day or week boundary crossed anywhere within `ticks` triggers its
    /// rollover logic once, after every due spawn event has been handled.
    ///
    /// `advance(0)` changes nothing: queued commands stay queued, missions
    /// do not start and no spawn event is drained. Only the boundary flags
    /// are recomputed, which for an unchanged clock clears them.
    pub fn advance(&mut self, ticks: u64) -> TickEvents {
        if ticks == 0 {
            self.time.clear_flags();
            return TickEvents::default();
        }

        let mut events = TickEvents {
            commands_rejected: self.apply_pending_commands(),
            ..TickEvents::default()
        };

        for city in self.cities.values_mut() {
            events.projectiles_expired += city.update(ticks);
        }

        let mission_events = self.update_vehicles(ticks);
        self.apply_mission_events(&mission_events);
        events.mission_events = mission_events;

        events.research_completed = self.research.update(ticks);

        self.time.add_ticks(ticks);

        for due in self.spawn_queue.pop_due(self.time.ticks()) {
            self.materialise(due, &mut events);
        }

        if self.time.day_passed() {
            events.day_passed = true;
            self.update_end_of_day(&mut events);
        }
        if self.time.week_passed() {
            events.week_passed = true;
            self.update_end_of_week(&mut events);
        }
        self.time.clear_flags();

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.time.ticks(), state_hash = hash, "Simulation state hash");
        }
        #[cfg(feature = "debug-validation")]
        {
            let problems = self.reference_problems();
            debug_assert!(problems.is_empty(), "Dangling references: {problems:?}");
        }

        events
    }

    /// Skip ahead to the next multiple of the fast-forward interval.
    ///
    /// Refused while projectiles are in flight or an aggressive hostile
    /// vehicle is on the active city's map.
    pub fn advance_turbo(&mut self) -> Result<TickEvents> {
        if let Some(reason) = self.turbo_blocker() {
            tracing::error!(reason = %reason, tick = self.time.ticks(), "Fast-forward requested while unsafe");
            return Err(SimError::TurboUnavailable(reason));
        }
        let ticks = self.time.ticks_to_next_boundary(self.config.turbo_interval);
        Ok(self.advance(ticks))
    }

    /// Whether fast-forward is currently allowed.
    #[must_use]
    pub fn can_turbo(&self) -> bool {
        self.turbo_blocker().is_none()
    }

    /// Why fast-forward is refused, if it is.
    #[must_use]
    pub fn turbo_blocker(&self) -> Option<String> {
        let city = self.cities.get(&self.active_city)?;
        if !city.projectiles.is_empty() {
            return Some(format!(
                "{} projectiles in flight in '{}'",
                city.projectiles.len(),
                city.id
            ));
        }
        let player = self.organisations.get_by_id(&self.config.player_org)?;
        self.vehicles
            .values()
            .find(|v| {
                v.city == self.active_city
                    && v.is_on_map()
                    && !v.is_crashed()
                    && self
                        .vehicle_types
                        .get(&v.vehicle_type)
                        .is_some_and(|t| t.aggressiveness > 0)
                    && self
                        .organisations
                        .get(&v.owner)
                        .is_some_and(|o| o.qualitative_relation(player) == Relation::Hostile)
            })
            .map(|v| format!("hostile vehicle '{}' over '{}'", v.id, city.id))
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Queue a command for the start of the next [`advance`](Self::advance).
    ///
    /// Identifiers are checked now so the caller hears about typos
    /// immediately.
    pub fn submit(&mut self, command: PlayerCommand) -> Result<()> {
        self.check_command(&command)?;
        self.pending_commands.push_back(command);
        Ok(())
    }

    /// Apply a command immediately.
    pub fn apply_command(&mut self, command: PlayerCommand) -> Result<()> {
        self.check_command(&command)?;
        match command {
            PlayerCommand::ToggleActiveCity => self.toggle_active_city(),
            PlayerCommand::PushMissionFront { vehicle, order } => {
                let vehicle = self.vehicle_by_id_mut(&vehicle)?;
                let missions = order.build(vehicle);
                vehicle.push_missions_front(missions);
            }
            PlayerCommand::PushMissionBack { vehicle, order } => {
                let vehicle = self.vehicle_by_id_mut(&vehicle)?;
                // Resolved against where the queue will leave the vehicle.
                let missions = order.build(&queued_outcome(vehicle));
                vehicle.push_missions_back(missions);
            }
            PlayerCommand::ReplaceMissions { vehicle, orders } => {
                let vehicle = self.vehicle_by_id_mut(&vehicle)?;
                let missions = MissionOrder::build_sequence(vehicle, &orders);
                vehicle.set_missions(missions);
            }
        }
        Ok(())
    }

    /// Number of commands waiting for the next cycle.
    #[must_use]
    pub fn pending_command_count(&self) -> usize {
        self.pending_commands.len()
    }

    fn apply_pending_commands(&mut self) -> usize {
        let mut rejected = 0;
        while let Some(command) = self.pending_commands.pop_front() {
            if let Err(e) = self.apply_command(command) {
                tracing::warn!(error = %e, "Dropped queued command");
                rejected += 1;
            }
        }
        rejected
    }

    fn check_command(&self, command: &PlayerCommand) -> Result<()> {
        let Some(id) = command.vehicle() else {
            return Ok(());
        };
        let vehicle = self
            .vehicles
            .get_by_id(id)
            .ok_or_else(|| SimError::UnknownVehicle(id.to_string()))?;
        let city = self.cities.get(&vehicle.city);
        for order in command.orders() {
            if let Some(building) = order.building() {
                if !city.is_some_and(|c| c.buildings.get_by_id(building).is_some()) {
                    return Err(SimError::UnknownBuilding(building.to_string()));
                }
            }
            if let Some(target) = order.target_vehicle() {
                if self.vehicles.get_by_id(target).is_none() {
                    return Err(SimError::UnknownVehicle(target.to_string()));
                }
            }
        }
        Ok(())
    }

    fn vehicle_by_id_mut(&mut self, id: &str) -> Result<&mut Vehicle> {
        self.vehicles
            .get_mut(&StateRef::new(id))
            .ok_or_else(|| SimError::UnknownVehicle(id.to_string()))
    }

    /// Switch the active city between the human and alien cities.
    pub fn toggle_active_city(&mut self) {
        let human = self.human_city();
        self.active_city = if self.active_city == human {
            self.alien_city()
        } else {
            human
        };
        tracing::debug!(city = %self.active_city, "Active city changed");
    }

    // ------------------------------------------------------------------
    // Vehicles
    // ------------------------------------------------------------------

    fn update_vehicles(&mut self, ticks: u64) -> Vec<MissionEvent> {
        let mut events = Vec::new();
        for id in self.vehicles.refs() {
            // Taken out so missions can read every other vehicle.
            let Some(mut vehicle) = self.vehicles.remove(&id) else {
                continue;
            };
            {
                let mut env = MissionEnv {
                    cities: &self.cities,
                    vehicles: &self.vehicles,
                    vehicle_types: &self.vehicle_types,
                    rng: &mut self.rng,
                    events: &mut events,
                    path_budget: self.config.path_iterations,
                };
                update_missions(&mut vehicle, &mut env, ticks);
            }
            self.vehicles.insert(vehicle.id.clone(), vehicle);
        }
        events
    }

    fn apply_mission_events(&mut self, events: &[MissionEvent]) {
        for event in events {
            match event {
                MissionEvent::TookOff {
                    vehicle,
                    city,
                    building,
                } => {
                    if let Some(b) = self.building_mut(city, building) {
                        b.landed_vehicles.remove(vehicle);
                    }
                }
                MissionEvent::Landed {
                    vehicle,
                    city,
                    building,
                } => {
                    if let Some(b) = self.building_mut(city, building) {
                        b.landed_vehicles.insert(vehicle.clone());
                    }
                }
                MissionEvent::Infiltrated {
                    vehicle,
                    city,
                    building,
                } => {
                    if let Some(b) = self.building_mut(city, building) {
                        b.infiltrations += 1;
                        tracing::info!(vehicle = %vehicle, building = %building, "Building infiltrated");
                    }
                }
                MissionEvent::Subverted {
                    vehicle,
                    city,
                    building,
                } => {
                    if let Some(b) = self.building_mut(city, building) {
                        b.subversions += 1;
                        tracing::info!(vehicle = %vehicle, building = %building, "Building subverted");
                    }
                }
                MissionEvent::LeftViaPortal { vehicle, city } => self.cross_portal(vehicle, city),
                MissionEvent::Completed { .. }
                | MissionEvent::Failed { .. }
                | MissionEvent::Crashed { .. } => {}
            }
        }
    }

    fn building_mut(
        &mut self,
        city: &StateRef<City>,
        building: &StateRef<Building>,
    ) -> Option<&mut Building> {
        let found = self
            .cities
            .get_mut(city)
            .and_then(|c| c.buildings.get_mut(building));
        if found.is_none() {
            tracing::warn!(city = %city, building = %building, "Building not found");
        }
        found
    }

    /// Move a vehicle that flew through a portal into the other dimension.
    fn cross_portal(&mut self, vehicle: &StateRef<Vehicle>, from: &StateRef<City>) {
        let destination = if *from == self.human_city() {
            self.alien_city()
        } else if *from == self.alien_city() {
            self.human_city()
        } else {
            tracing::warn!(vehicle = %vehicle, city = %from, "Portal leads nowhere");
            return;
        };
        let exit = match self.cities.get(&destination) {
            Some(city) if city.map.is_some() => city.random_portal(&mut self.rng),
            _ => None,
        };
        let Some(v) = self.vehicles.get_mut(vehicle) else {
            tracing::warn!(vehicle = %vehicle, "Vehicle not found");
            return;
        };
        v.city = destination;
        if let Some(exit) = exit {
            v.launch(exit.center());
        }
    }

    /// Remove a vehicle from the world.
    ///
    /// Landing bookkeeping and every reference the vehicle holds are
    /// cleared before it is dropped. References other objects hold to it
    /// simply stop resolving.
    pub fn destroy_vehicle(&mut self, vehicle: &StateRef<Vehicle>) -> Result<()> {
        let mut removed = self
            .vehicles
            .remove(vehicle)
            .ok_or_else(|| SimError::UnknownVehicle(vehicle.to_string()))?;
        if let Some(city) = self.cities.get_mut(&removed.city) {
            for building in city.buildings.values_mut() {
                building.landed_vehicles.remove(vehicle);
            }
        }
        removed.release_references();
        tracing::debug!(vehicle = %vehicle, "Vehicle destroyed");
        Ok(())
    }

    /// Insert a vehicle, keeping landing bookkeeping in step.
    pub fn add_vehicle(&mut self, vehicle: Vehicle) -> StateRef<Vehicle> {
        if vehicle.is_landed() {
            if let Some(b) = self
                .cities
                .get_mut(&vehicle.city)
                .and_then(|c| c.buildings.get_mut(&vehicle.currently_landed_building))
            {
                b.landed_vehicles.insert(vehicle.to_ref());
            }
        }
        let id = vehicle.id.clone();
        self.vehicles.insert(id, vehicle)
    }

    // ------------------------------------------------------------------
    // Spawns, incursions and growth
    // ------------------------------------------------------------------

    /// Queue a spawn event.
    pub fn schedule_spawn(&mut self, event: SpawnEvent) {
        self.spawn_queue.push(event);
    }

    /// Relocate an existing vehicle into the human city for a due event.
    ///
    /// Vehicles are never created here; an event with no spare vehicle of
    /// its type is dropped and reported.
    fn materialise(&mut self, event: SpawnEvent, tick_events: &mut TickEvents) {
        let destination = self.human_city();
        let candidate = self
            .vehicles
            .iter()
            .find(|(_, v)| {
                v.vehicle_type == event.vehicle_type && v.city != destination && !v.is_crashed()
            })
            .map(|(r, _)| r);
        let Some(vehicle_ref) = candidate else {
            tracing::warn!(
                vehicle_type = %event.vehicle_type,
                scheduled = event.scheduled_tick,
                "No vehicle available for spawn event, dropping"
            );
            tick_events.spawns_dropped.push(event.vehicle_type);
            return;
        };
        let Some(mut vehicle) = self.vehicles.remove(&vehicle_ref) else {
            return;
        };

        if let Some(b) = self
            .cities
            .get_mut(&vehicle.city)
            .and_then(|c| c.buildings.get_mut(&vehicle.currently_landed_building))
        {
            b.landed_vehicles.remove(&vehicle_ref);
        }
        vehicle.currently_landed_building.clear();
        vehicle.remove_from_map();
        vehicle.city = destination.clone();
        vehicle.set_missions(event.missions);
        if self.cities.get(&destination).is_some_and(|c| c.map.is_some()) {
            vehicle.launch(event.position);
        } else {
            vehicle.position = event.position;
        }

        let mut mission_events = Vec::new();
        {
            let mut env = MissionEnv {
                cities: &self.cities,
                vehicles: &self.vehicles,
                vehicle_types: &self.vehicle_types,
                rng: &mut self.rng,
                events: &mut mission_events,
                path_budget: self.config.path_iterations,
            };
            start_front_mission(&mut vehicle, &mut env);
        }
        self.vehicles.insert(vehicle.id.clone(), vehicle);
        self.apply_mission_events(&mission_events);

        tracing::info!(vehicle = %vehicle_ref, city = %destination, "Spawn event materialised");
        tick_events.mission_events.extend(mission_events);
        tick_events.spawns_materialised.push(vehicle_ref);
    }

    fn update_end_of_day(&mut self, events: &mut TickEvents) {
        for base in self.bases.values_mut() {
            events.facilities_completed.extend(base.update_end_of_day());
        }
        if let Some((rule, scheduled)) = self.evaluate_incursions() {
            events.incursion_launched = Some(rule);
            events.spawns_scheduled = scheduled;
        }
    }

    fn update_end_of_week(&mut self, events: &mut TickEvents) {
        events.vehicles_grown = self.grow_ufos();
        for org in self.organisations.values_mut() {
            org.balance = org.balance.saturating_add(org.income);
        }
    }

    /// Count alien vehicles in the alien city and fire the highest
    /// priority incursion rule they satisfy.
    ///
    /// Returns the rule id and the number of spawn events queued. At most
    /// one rule fires per call.
    pub fn evaluate_incursions(&mut self) -> Option<(String, usize)> {
        let tally = self.alien_tally();
        let rule = sort_by_priority(&self.incursions)
            .into_iter()
            .find(|r| r.is_satisfied(&tally))
            .cloned()?;
        let scheduled = self.launch_incursion(&rule);
        (scheduled > 0).then_some((rule.id, scheduled))
    }

    /// Live alien-owned vehicles in the alien city, by type.
    #[must_use]
    pub fn alien_tally(&self) -> BTreeMap<String, u32> {
        let alien_city = self.alien_city();
        let mut tally = BTreeMap::new();
        for vehicle in self.vehicles.values() {
            if vehicle.city != alien_city || vehicle.is_crashed() {
                continue;
            }
            let hostile = self
                .organisations
                .get(&vehicle.owner)
                .is_some_and(Organisation::is_alien);
            if let (true, Some(kind)) = (hostile, vehicle.vehicle_type.id()) {
                *tally.entry(kind.to_string()).or_insert(0) += 1;
            }
        }
        tally
    }

    fn launch_incursion(&mut self, rule: &IncursionRule) -> usize {
        let human = self.human_city();
        let Some(city) = self.cities.get(&human) else {
            tracing::warn!(city = %human, "Human city not found, incursion skipped");
            return 0;
        };
        if city.portals.is_empty() || city.buildings.is_empty() {
            tracing::warn!(
                rule = %rule.id,
                city = %human,
                "No portal or building to target, incursion skipped"
            );
            return 0;
        }

        let mut scheduled_tick = self.time.ticks();
        let mut scheduled = 0;
        for (kind, count) in &rule.primary {
            for _ in 0..*count {
                scheduled_tick += self.config.launch_spacing;
                let (Some(portal), Some(target)) = (
                    city.random_portal(&mut self.rng),
                    city.random_building(&mut self.rng),
                ) else {
                    continue;
                };
                self.spawn_queue.push(SpawnEvent::new(
                    scheduled_tick,
                    kind.as_str(),
                    portal.center(),
                    vec![Mission::infiltrate(target)],
                ));
                scheduled += 1;
            }
        }
        tracing::info!(
            rule = %rule.id,
            purpose = ?rule.primary_mission,
            priority = rule.priority,
            spawns = scheduled,
            "Incursion launched"
        );
        scheduled
    }

    /// Grow alien vehicles for the current week.
    ///
    /// Uses the table for this week if there is one, otherwise the default
    /// table. Vehicles appear on the alien city's map when it has one and
    /// are staged off-map otherwise. Each starts on patrol.
    pub fn grow_ufos(&mut self) -> Vec<StateRef<Vehicle>> {
        let week = self.time.week();
        let Some(table) = self
            .growth
            .get(&GrowthKey::Week(week))
            .or_else(|| self.growth.get(&GrowthKey::Default))
            .cloned()
        else {
            tracing::debug!(week, "No growth table");
            return Vec::new();
        };

        let alien_city = self.alien_city();
        let alien_org = StateRef::new(self.config.alien_org.as_str());
        let map = self.cities.get(&alien_city).and_then(|c| c.map.as_ref());
        let mut grown = Vec::new();

        for (kind, count) in &table.vehicles {
            let Some(vehicle_type) = self.vehicle_types.get_mut(&StateRef::new(kind.as_str())) else {
                tracing::warn!(vehicle_type = %kind, week, "Growth table names unknown vehicle type");
                continue;
            };
            for _ in 0..*count {
                vehicle_type.num_created += 1;
                let id = next_free_id(&mut self.next_vehicle_id, &self.vehicles);
                let mut vehicle =
                    Vehicle::new(id.as_str(), vehicle_type, alien_org.clone(), alien_city.clone());
                vehicle.name = format!("{} {}", vehicle_type.name, vehicle_type.num_created);
                vehicle.equip_default_equipment(vehicle_type);

                let staged = TilePos::new(
                    self.rng
                        .range_inclusive(self.config.staging_min, self.config.staging_max),
                    self.rng
                        .range_inclusive(self.config.staging_min, self.config.staging_max),
                    DEFAULT_ALTITUDE,
                );
                match map {
                    Some(map) => vehicle.launch(map.clamp(staged).center()),
                    None => vehicle.position = staged.center(),
                }
                vehicle.push_missions_front(vec![Mission::patrol(DEFAULT_PATROL_LEGS)]);
                grown.push(self.vehicles.insert(id, vehicle));
            }
        }
        tracing::info!(week, grown = grown.len(), "Alien growth");
        grown
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The clock.
    #[must_use]
    pub const fn time(&self) -> &GameTime {
        &self.time
    }

    /// Current tick.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.time.ticks()
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// All organisations.
    #[must_use]
    pub const fn organisations(&self) -> &Registry<Organisation> {
        &self.organisations
    }

    /// An organisation by id.
    #[must_use]
    pub fn organisation(&self, id: &str) -> Option<&Organisation> {
        self.organisations.get_by_id(id)
    }

    /// An organisation by id, mutably, for diplomacy and mission outcomes.
    pub fn organisation_mut(&mut self, id: &str) -> Result<&mut Organisation> {
        self.organisations
            .get_mut(&StateRef::new(id))
            .ok_or_else(|| SimError::UnknownOrganisation(id.to_string()))
    }

    /// All vehicle types.
    #[must_use]
    pub const fn vehicle_types(&self) -> &Registry<VehicleType> {
        &self.vehicle_types
    }

    /// All vehicles.
    #[must_use]
    pub const fn vehicles(&self) -> &Registry<Vehicle> {
        &self.vehicles
    }

    /// A vehicle by id.
    #[must_use]
    pub fn vehicle(&self, id: &str) -> Option<&Vehicle> {
        self.vehicles.get_by_id(id)
    }

    /// A vehicle by id, mutably.
    pub fn vehicle_mut(&mut self, id: &str) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(&StateRef::new(id))
    }

    /// All cities.
    #[must_use]
    pub const fn cities(&self) -> &Registry<City> {
        &self.cities
    }

    /// A city by id.
    #[must_use]
    pub fn city(&self, id: &str) -> Option<&City> {
        self.cities.get_by_id(id)
    }

    /// A city by id, mutably.
    pub fn city_mut(&mut self, id: &str) -> Result<&mut City> {
        self.cities
            .get_mut(&StateRef::new(id))
            .ok_or_else(|| SimError::UnknownCity(id.to_string()))
    }

    /// The city the player is looking at.
    #[must_use]
    pub const fn active_city(&self) -> &StateRef<City> {
        &self.active_city
    }

    /// Pending spawn events.
    #[must_use]
    pub const fn spawn_queue(&self) -> &SpawnQueue {
        &self.spawn_queue
    }

    /// Research state.
    #[must_use]
    pub const fn research(&self) -> &Research {
        &self.research
    }

    /// Research state, mutably, for assigning labs.
    pub fn research_mut(&mut self) -> &mut Research {
        &mut self.research
    }

    /// All bases.
    #[must_use]
    pub const fn bases(&self) -> &Registry<Base> {
        &self.bases
    }

    fn human_city(&self) -> StateRef<City> {
        StateRef::new(self.config.human_city.as_str())
    }

    fn alien_city(&self) -> StateRef<City> {
        StateRef::new(self.config.alien_city.as_str())
    }

    /// Display data for every vehicle, in id order.
    #[must_use]
    pub fn vehicle_snapshots(&self) -> Vec<VehicleSnapshot> {
        self.vehicles
            .values()
            .map(|v| VehicleSnapshot {
                id: v.id.clone(),
                name: v.name.clone(),
                city: v.city.to_string(),
                position: v.position,
                health: v.health,
                on_map: v.is_on_map(),
                mission: v.current_mission().map(|m| m.name().to_string()),
            })
            .collect()
    }

    /// Calculate a hash of the simulation state for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.time.ticks().hash(&mut hasher);
        self.rng.hash(&mut hasher);
        self.active_city.hash(&mut hasher);

        for org in self.organisations.values() {
            org.id.hash(&mut hasher);
            org.balance.hash(&mut hasher);
            for (other, standing) in &org.relations {
                other.hash(&mut hasher);
                standing.hash(&mut hasher);
            }
        }

        for vehicle in self.vehicles.values() {
            vehicle.id.hash(&mut hasher);
            vehicle.city.hash(&mut hasher);
            vehicle.position.hash(&mut hasher);
            vehicle.health.hash(&mut hasher);
            vehicle.crashed.hash(&mut hasher);
            vehicle.is_on_map().hash(&mut hasher);
            vehicle.currently_landed_building.hash(&mut hasher);
            vehicle.missions.hash(&mut hasher);
        }

        for city in self.cities.values() {
            city.id.hash(&mut hasher);
            city.portals.hash(&mut hasher);
            city.projectiles.len().hash(&mut hasher);
            for building in city.buildings.values() {
                building.id.hash(&mut hasher);
                building.landed_vehicles.hash(&mut hasher);
                building.infiltrations.hash(&mut hasher);
                building.subversions.hash(&mut hasher);
            }
        }

        self.spawn_queue.len().hash(&mut hasher);
        self.spawn_queue.peek_next_tick().hash(&mut hasher);

        for topic in self.research.topics.values() {
            topic.id.hash(&mut hasher);
            topic.progress.hash(&mut hasher);
        }
        for base in self.bases.values() {
            for facility in &base.facilities {
                facility.id.hash(&mut hasher);
                facility.build_time_days.hash(&mut hasher);
            }
        }

        hasher.finish()
    }

    /// Inconsistent cross-references, one message per problem.
    ///
    /// Empty for a healthy world.
    #[must_use]
    pub fn reference_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for vehicle in self.vehicles.values() {
            if !self.cities.contains(&vehicle.city) {
                problems.push(format!("Vehicle '{}' is in unknown city '{}'", vehicle.id, vehicle.city));
            }
            if !self.organisations.contains(&vehicle.owner) {
                problems.push(format!("Vehicle '{}' has unknown owner '{}'", vehicle.id, vehicle.owner));
            }
            if !self.vehicle_types.contains(&vehicle.vehicle_type) {
                problems.push(format!(
                    "Vehicle '{}' has unknown type '{}'",
                    vehicle.id, vehicle.vehicle_type
                ));
            }
            if vehicle.is_landed() {
                let recorded = self
                    .cities
                    .get(&vehicle.city)
                    .and_then(|c| c.buildings.get(&vehicle.currently_landed_building))
                    .is_some_and(|b| b.landed_vehicles.contains(&vehicle.to_ref()));
                if !recorded {
                    problems.push(format!(
                        "Vehicle '{}' is not recorded in building '{}'",
                        vehicle.id, vehicle.currently_landed_building
                    ));
                }
            }
        }
        for city in self.cities.values() {
            for building in city.buildings.values() {
                for landed in &building.landed_vehicles {
                    let parked_here = self
                        .vehicles
                        .get(landed)
                        .is_some_and(|v| v.currently_landed_building.id() == Some(building.id.as_str()));
                    if !parked_here {
                        problems.push(format!(
                            "Building '{}' lists vehicle '{}' that is not parked there",
                            building.id, landed
                        ));
                    }
                }
            }
        }
        problems
    }

    /// Serialize simulation state for saving.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| SimError::Persistence(e.to_string()))
    }

    /// Deserialize simulation state and rebuild transient movement handles.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut sim: Self =
            bincode::deserialize(data).map_err(|e| SimError::Persistence(e.to_string()))?;
        sim.init_state();
        Ok(sim)
    }
}

fn check_required(config: &SimConfig, rules: &RuleSet) -> Result<()> {
    for city in [&config.human_city, &config.alien_city] {
        if !rules.cities.iter().any(|c| &c.id == city) {
            return Err(SimError::MissingRule(format!("city '{city}'")));
        }
    }
    match rules.organisations.iter().find(|o| o.id == config.alien_org) {
        Some(org) if org.alien => {}
        Some(_) => {
            return Err(SimError::MissingRule(format!(
                "organisation '{}' is not flagged alien",
                config.alien_org
            )))
        }
        None => {
            return Err(SimError::MissingRule(format!(
                "organisation '{}'",
                config.alien_org
            )))
        }
    }
    if !rules.organisations.iter().any(|o| o.id == config.player_org) {
        return Err(SimError::MissingRule(format!(
            "organisation '{}'",
            config.player_org
        )));
    }
    Ok(())
}

fn build_city(def: &CityDef) -> City {
    let mut city = City::new(def.id.as_str(), def.name.as_str());
    if let Some(size) = def.size {
        let mut map = TileMap::new(size.x, size.y, size.z);
        for tile in &def.blocked {
            map.set_cell(*tile, CellType::Blocked);
        }
        city = city.with_map(map);
    }
    for b in &def.buildings {
        city.add_building(Building::new(
            b.id.as_str(),
            b.name.as_str(),
            StateRef::new(b.owner.as_str()),
            b.pad,
        ));
    }
    city.portals.clone_from(&def.portals);
    city
}

/// The vehicle as it will be after its queued missions have run, as far
/// as parking is concerned.
fn queued_outcome(vehicle: &Vehicle) -> Vehicle {
    let mut probe = vehicle.clone();
    for mission in &vehicle.missions {
        match &mission.kind {
            MissionKind::Land { target, .. } => {
                probe.currently_landed_building = target.clone();
            }
            MissionKind::TakeOff { .. } => probe.currently_landed_building.clear(),
            _ => {}
        }
    }
    probe
}

fn next_free_id(counter: &mut u64, vehicles: &Registry<Vehicle>) -> String {
    loop {
        let id = format!("VEHICLE_{counter}");
        *counter += 1;
        if vehicles.get_by_id(&id).is_none() {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{TICKS_PER_DAY, TICKS_PER_SECOND, TICKS_PER_WEEK};

    const RULES: &str = r#"
        RuleSet(
            organisations: [
                (id: "ORG_ALIEN", name: "Aliens", balance: 0, income: 0, alien: true),
                (id: "ORG_PLAYER", name: "X-COM", balance: 1000, income: 50),
                (id: "ORG_MEGAPOL", name: "Megapol", balance: 500, income: 10),
            ],
            vehicle_types: [
                (id: "UFO_SCOUT", name: "Scout", health: 40, speed: 6, aggressiveness: 2,
                 default_equipment: ["ALIEN_LASER"]),
                (id: "HAWK", name: "Hawk", health: 100, speed: 8, aggressiveness: 3),
            ],
            cities: [
                (id: "CITYMAP_HUMAN", name: "Mega-Primus", size: Some((x: 32, y: 32, z: 8)),
                 buildings: [
                    (id: "BLD_HQ", name: "HQ", owner: "ORG_PLAYER", pad: (x: 4, y: 4, z: 1)),
                    (id: "BLD_SENATE", name: "Senate", owner: "ORG_MEGAPOL", pad: (x: 20, y: 20, z: 1)),
                 ],
                 portals: [(x: 16, y: 16, z: 7)]),
                (id: "CITYMAP_ALIEN", name: "Alien Dimension", size: Some((x: 32, y: 32, z: 8)),
                 portals: [(x: 10, y: 10, z: 7)]),
            ],
            growth: {
                Default: (vehicles: [("UFO_SCOUT", 2)]),
            },
            incursions: [
                (id: "RAID", priority: 1, primary: [("UFO_SCOUT", 1)]),
            ],
            vehicles: [
                (id: "HAWK_1", vehicle_type: "HAWK", owner: "ORG_PLAYER",
                 city: "CITYMAP_HUMAN", home_building: "BLD_HQ"),
            ],
        )
    "#;

    fn rules() -> RuleSet {
        RuleSet::from_ron(RULES, "test").unwrap()
    }

    fn sim() -> Simulation {
        Simulation::new(SimConfig::default(), &rules()).unwrap()
    }

    #[test]
    fn test_new_starts_at_midday_in_human_city() {
        let sim = sim();
        assert_eq!(sim.ticks(), TICKS_PER_DAY / 2);
        assert_eq!(sim.active_city(), &StateRef::new("CITYMAP_HUMAN"));
        assert!(sim.reference_problems().is_empty());
    }

    #[test]
    fn test_roster_vehicle_parked_at_home() {
        let sim = sim();
        let hawk = sim.vehicle("HAWK_1").unwrap();
        assert!(hawk.is_landed());
        assert!(!hawk.is_on_map());
        assert_eq!(hawk.name, "Hawk 1");
        let hq = sim
            .city("CITYMAP_HUMAN")
            .unwrap()
            .buildings
            .get_by_id("BLD_HQ")
            .unwrap();
        assert!(hq.landed_vehicles.contains(&StateRef::new("HAWK_1")));
    }

    #[test]
    fn test_missing_alien_city_is_fatal() {
        let config = SimConfig {
            alien_city: "CITYMAP_NOWHERE".into(),
            ..SimConfig::default()
        };
        let err = Simulation::new(config, &rules()).unwrap_err();
        assert!(matches!(err, SimError::MissingRule(_)));
    }

    #[test]
    fn test_alien_org_must_be_alien() {
        let config = SimConfig {
            alien_org: "ORG_MEGAPOL".into(),
            ..SimConfig::default()
        };
        assert!(matches!(
            Simulation::new(config, &rules()),
            Err(SimError::MissingRule(_))
        ));
    }

    #[test]
    fn test_invalid_rules_rejected() {
        let mut rules = rules();
        rules.growth.insert(
            GrowthKey::Week(2),
            GrowthTable {
                vehicles: vec![("UFO_GHOST".into(), 1)],
            },
        );
        assert!(matches!(
            Simulation::new(SimConfig::default(), &rules),
            Err(SimError::RuleValidation(_))
        ));
    }

    #[test]
    fn test_new_game_grows_default_table() {
        let sim = Simulation::new_game(SimConfig::default(), &rules()).unwrap();
        let grown: Vec<_> = sim
            .vehicles()
            .values()
            .filter(|v| v.owner == StateRef::new("ORG_ALIEN"))
            .collect();
        assert_eq!(grown.len(), 2);
        for v in grown {
            assert!(v.is_on_map());
            assert_eq!(v.city, StateRef::new("CITYMAP_ALIEN"));
            assert_eq!(v.equipment, vec!["ALIEN_LASER".to_string()]);
            assert_eq!(v.current_mission().unwrap().name(), "Patrol");
        }
        assert!(sim.vehicle("VEHICLE_1").is_some());
        assert_eq!(sim.vehicle("VEHICLE_2").unwrap().name, "Scout 2");
    }

    #[test]
    fn test_submitted_command_applied_next_advance() {
        let mut sim = sim();
        sim.submit(PlayerCommand::PushMissionBack {
            vehicle: "HAWK_1".into(),
            order: MissionOrder::GotoBuilding("BLD_SENATE".into()),
        })
        .unwrap();
        assert_eq!(sim.pending_command_count(), 1);
        assert!(sim.vehicle("HAWK_1").unwrap().missions.is_empty());

        let events = sim.advance(1);
        assert_eq!(events.commands_rejected, 0);
        assert_eq!(sim.pending_command_count(), 0);
        let hawk = sim.vehicle("HAWK_1").unwrap();
        assert!(hawk.is_on_map());
        assert!(!hawk.is_landed());
        let hq = sim
            .city("CITYMAP_HUMAN")
            .unwrap()
            .buildings
            .get_by_id("BLD_HQ")
            .unwrap();
        assert!(hq.landed_vehicles.is_empty());
    }

    #[test]
    fn test_submit_rejects_unknown_ids() {
        let mut sim = sim();
        assert!(matches!(
            sim.submit(PlayerCommand::PushMissionFront {
                vehicle: "NOPE".into(),
                order: MissionOrder::Snooze(1),
            }),
            Err(SimError::UnknownVehicle(_))
        ));
        assert!(matches!(
            sim.submit(PlayerCommand::PushMissionFront {
                vehicle: "HAWK_1".into(),
                order: MissionOrder::Infiltrate("BLD_NOPE".into()),
            }),
            Err(SimError::UnknownBuilding(_))
        ));
        assert_eq!(sim.pending_command_count(), 0);
    }

    #[test]
    fn test_hawk_flies_to_senate_and_lands() {
        let mut sim = sim();
        sim.apply_command(PlayerCommand::ReplaceMissions {
            vehicle: "HAWK_1".into(),
            orders: vec![MissionOrder::GotoBuilding("BLD_SENATE".into())],
        })
        .unwrap();
        for _ in 0..30 {
            sim.advance(TICKS_PER_SECOND);
        }
        let hawk = sim.vehicle("HAWK_1").unwrap();
        assert_eq!(hawk.currently_landed_building, StateRef::new("BLD_SENATE"));
        assert!(hawk.missions.is_empty());
        assert!(sim.reference_problems().is_empty());
    }

    #[test]
    fn test_toggle_active_city() {
        let mut sim = sim();
        sim.apply_command(PlayerCommand::ToggleActiveCity).unwrap();
        assert_eq!(sim.active_city(), &StateRef::new("CITYMAP_ALIEN"));
        sim.toggle_active_city();
        assert_eq!(sim.active_city(), &StateRef::new("CITYMAP_HUMAN"));
    }

    #[test]
    fn test_destroy_vehicle_clears_landing() {
        let mut sim = sim();
        sim.destroy_vehicle(&"HAWK_1".into()).unwrap();
        assert!(sim.vehicle("HAWK_1").is_none());
        assert!(sim.reference_problems().is_empty());
        assert!(matches!(
            sim.destroy_vehicle(&"HAWK_1".into()),
            Err(SimError::UnknownVehicle(_))
        ));
    }

    #[test]
    fn test_due_spawn_relocates_vehicle() {
        let mut sim = Simulation::new_game(SimConfig::default(), &rules()).unwrap();
        let now = sim.ticks();
        sim.schedule_spawn(SpawnEvent::new(
            now + 1,
            "UFO_SCOUT",
            TilePos::new(16, 16, 7).center(),
            vec![Mission::infiltrate("BLD_SENATE".into())],
        ));
        let events = sim.advance(1);
        assert_eq!(events.spawns_materialised, vec![StateRef::new("VEHICLE_1")]);
        let ufo = sim.vehicle("VEHICLE_1").unwrap();
        assert_eq!(ufo.city, StateRef::new("CITYMAP_HUMAN"));
        assert!(ufo.is_on_map());
        let active = ufo.current_mission().unwrap();
        assert_eq!(active.name(), "Infiltrate");
        assert!(active.started);
    }

    #[test]
    fn test_spawn_without_vehicle_is_dropped() {
        let mut sim = sim();
        let now = sim.ticks();
        sim.schedule_spawn(SpawnEvent::new(now, "UFO_SCOUT", Vec3Fixed::ZERO, Vec::new()));
        let events = sim.advance(1);
        assert!(events.spawns_materialised.is_empty());
        assert_eq!(events.spawns_dropped, vec![StateRef::new("UFO_SCOUT")]);
        assert!(sim.spawn_queue().is_empty());
    }

    #[test]
    fn test_zero_advance_leaves_queues_alone() {
        let mut sim = sim();
        let now = sim.ticks();
        sim.schedule_spawn(SpawnEvent::new(now, "UFO_SCOUT", Vec3Fixed::ZERO, Vec::new()));
        sim.submit(PlayerCommand::PushMissionBack {
            vehicle: "HAWK_1".into(),
            order: MissionOrder::GotoBuilding("BLD_SENATE".into()),
        })
        .unwrap();
        let hash = sim.state_hash();

        let events = sim.advance(0);
        assert_eq!(events, TickEvents::default());
        assert_eq!(sim.ticks(), now);
        assert_eq!(sim.spawn_queue().len(), 1);
        assert_eq!(sim.pending_command_count(), 1);
        assert!(sim.vehicle("HAWK_1").unwrap().missions.is_empty());
        assert_eq!(sim.state_hash(), hash);

        let events = sim.advance(1);
        assert_eq!(events.spawns_dropped.len(), 1);
        assert_eq!(sim.pending_command_count(), 0);
    }

    #[test]
    fn test_end_of_day_launches_incursion() {
        let mut sim = Simulation::new_game(SimConfig::default(), &rules()).unwrap();
        let events = sim.advance(TICKS_PER_DAY / 2);
        assert!(events.day_passed);
        assert_eq!(events.incursion_launched.as_deref(), Some("RAID"));
        assert_eq!(events.spawns_scheduled, 1);
        let pending = sim.spawn_queue().pending();
        assert_eq!(pending[0].scheduled_tick, TICKS_PER_DAY + TICKS_PER_SECOND / 2);
    }

    #[test]
    fn test_end_of_week_income() {
        let mut sim = sim();
        let events = sim.advance(TICKS_PER_WEEK - TICKS_PER_DAY / 2);
        assert!(events.week_passed);
        assert_eq!(sim.organisation("ORG_PLAYER").unwrap().balance, 1050);
        assert_eq!(events.vehicles_grown.len(), 2);
    }

    #[test]
    fn test_turbo_blocked_by_projectile() {
        let mut sim = sim();
        assert!(sim.can_turbo());
        sim.city_mut("CITYMAP_HUMAN")
            .unwrap()
            .projectiles
            .push(crate::city::Projectile {
                position: Vec3Fixed::from_ints(1, 1, 1),
                velocity: Vec3Fixed::ZERO,
                remaining_ticks: 1000,
                firer: StateRef::empty(),
            });
        let before = sim.ticks();
        assert!(matches!(
            sim.advance_turbo(),
            Err(SimError::TurboUnavailable(_))
        ));
        assert_eq!(sim.ticks(), before);
    }

    #[test]
    fn test_snapshots() {
        let sim = sim();
        let snapshots = sim.vehicle_snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].id, "HAWK_1");
        assert!(!snapshots[0].on_map);
        assert_eq!(snapshots[0].mission, None);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut sim = Simulation::new_game(SimConfig::default(), &rules()).unwrap();
        for _ in 0..10 {
            sim.advance(TICKS_PER_SECOND);
        }
        let data = sim.serialize().unwrap();
        let restored = Simulation::deserialize(&data).unwrap();
        assert_eq!(restored.state_hash(), sim.state_hash());
        assert!(restored.vehicle("VEHICLE_1").unwrap().is_on_map());
    }

    #[test]
    fn test_deserialize_garbage() {
        assert!(matches!(
            Simulation::deserialize(&[1, 2, 3]),
            Err(SimError::Persistence(_))
        ));
    }
}
