//! The simulation context.
//!
//! [`World`] owns every piece of replicated state: the frame counter, the
//! shared random generator, houses, units, buildings, teams and the map.
//! It advances one frame at a time in a fixed order so that every peer
//! fed the same events computes the same state.
//!
//! # Determinism
//!
//! - Objects live in `BTreeMap`s keyed by id and are always processed in
//!   ascending id order.
//! - Ids are handed out from counters and never reused.
//! - All arithmetic is integer or 16.16 fixed point.
//! - The only source of randomness is [`World::random`].
//!
//! # Example
//!
//! ```
//! use cnc_core::house::House;
//! use cnc_core::math::{CellPos, Dir};
//! use cnc_core::world::World;
//!
//! let mut world = World::new(32, 32, 7);
//! world.add_house(House::new(0, "Greece", true, 1000));
//! let tank = world.spawn_unit(0, 1, CellPos::new(4, 4), Dir::N);
//!
//! world.tick();
//! assert_eq!(world.frame(), 1);
//! assert!(world.units.contains_key(&tank));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::building::{Building, BuildingId};
use crate::combat::{self, DamageEvent};
use crate::config::Rules;
use crate::drive::{CellVisit, DriveEnv, TargetResolver};
use crate::error::{GameError, Result};
use crate::event::{Event, EventKind};
use crate::event_queue::EventQueue;
use crate::house::{House, HouseId, SpecialWeapon};
use crate::map::{Map, MoveResult};
use crate::math::{CellPos, Coord, Dir};
use crate::mission::Mission;
use crate::options::{GameOptions, Pacing};
use crate::pipe::CRC32;
use crate::production::ProductionKind;
use crate::random::Random;
use crate::target::Target;
use crate::team::{Team, TeamId, TeamType};
use crate::unit::{Unit, UnitId};

/// Frames of checksums kept for comparison against remote reports.
pub const CRC_HISTORY: u32 = 32;

/// Frames between checks for computer teams to create.
pub const AUTOCREATE_INTERVAL: u32 = 64;

/// Cells searched around a factory exit for a free spot.
const EXIT_RADIUS: i32 = 4;

/// Radius in cells of a nuclear blast.
const NUKE_RADIUS: i32 = 3;

/// Radius in cells of a bombing run.
const PARABOMB_RADIUS: i32 = 2;

/// A chat line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Frame it was delivered on.
    pub frame: u32,
    /// Sender.
    pub player: HouseId,
    /// Text.
    pub text: String,
}

/// A cosmetic animation for the presentation layer to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnimationRequest {
    /// Animation index.
    pub anim: u8,
    /// House the animation belongs to.
    pub owner: HouseId,
    /// Where it plays.
    pub coord: Coord,
}

/// A finished production item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductionComplete {
    /// Owner.
    pub house: HouseId,
    /// Factory kind.
    pub kind: ProductionKind,
    /// Type produced.
    pub type_id: u8,
    /// The new unit, once it has left the factory.
    pub unit: Option<UnitId>,
}

/// A checksum disagreement with another player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Desync {
    /// Frame whose checksums differ.
    pub frame: u32,
    /// Player that reported the other checksum.
    pub player: HouseId,
    /// Our checksum.
    pub local: u32,
    /// Their checksum.
    pub remote: u32,
}

/// Events generated during a frame.
///
/// These are for the presentation layer and tools; the simulation never
/// reads them back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Frame these events happened on.
    pub frame: u32,
    /// Events executed from the do-list.
    pub executed: usize,
    /// Hits from weapons and special weapons.
    pub damage_events: Vec<DamageEvent>,
    /// Objects removed this frame.
    pub deaths: Vec<Target>,
    /// Units created this frame.
    pub spawned: Vec<UnitId>,
    /// Production finished this frame.
    pub production_complete: Vec<ProductionComplete>,
    /// Animations requested by events.
    pub animations: Vec<AnimationRequest>,
    /// Cells entered by moving units.
    pub cell_visits: Vec<CellVisit>,
    /// Teams that disbanded.
    pub disbanded: Vec<TeamId>,
}

/// Resolves targets against the objects of a world while its map is
/// borrowed for driving.
struct ObjectLookup<'a> {
    units: &'a BTreeMap<UnitId, Unit>,
    buildings: &'a BTreeMap<BuildingId, Building>,
    rules: &'a Rules,
}

impl TargetResolver for ObjectLookup<'_> {
    fn target_coord(&self, target: Target) -> Option<Coord> {
        match target {
            Target::None => None,
            Target::Unit(id) => self.units.get(&id).filter(|u| u.is_alive()).map(|u| u.coord),
            Target::Building(id) => self
                .buildings
                .get(&id)
                .filter(|b| b.is_alive())
                .map(|b| b.center(self.rules)),
            Target::Cell(cell) => Some(cell.center()),
        }
    }
}

/// Hasher that records the bytes it is fed, for checksumming.
///
/// Integers are written little-endian and `usize`/`isize` widened to 64
/// bits, so the CRC of a given state is the same on every platform.
#[derive(Default)]
struct ByteSink(Vec<u8>);

impl Hasher for ByteSink {
    fn finish(&self) -> u64 {
        0
    }

    fn write(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    fn write_u16(&mut self, i: u16) {
        self.write(&i.to_le_bytes());
    }

    fn write_u32(&mut self, i: u32) {
        self.write(&i.to_le_bytes());
    }

    fn write_u64(&mut self, i: u64) {
        self.write(&i.to_le_bytes());
    }

    fn write_u128(&mut self, i: u128) {
        self.write(&i.to_le_bytes());
    }

    fn write_usize(&mut self, i: usize) {
        self.write_u64(i as u64);
    }

    fn write_i16(&mut self, i: i16) {
        self.write(&i.to_le_bytes());
    }

    fn write_i32(&mut self, i: i32) {
        self.write(&i.to_le_bytes());
    }

    fn write_i64(&mut self, i: i64) {
        self.write(&i.to_le_bytes());
    }

    fn write_i128(&mut self, i: i128) {
        self.write(&i.to_le_bytes());
    }

    fn write_isize(&mut self, i: isize) {
        self.write_i64(i as i64);
    }
}

/// The complete simulation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    frame: u32,
    /// Game rules.
    pub rules: Rules,
    /// Terrain and occupancy.
    pub map: Map,
    /// Shared random generator.
    pub random: Random,
    /// Players in ascending id order.
    pub houses: Vec<House>,
    /// Units by id.
    pub units: BTreeMap<UnitId, Unit>,
    /// Buildings by id.
    pub buildings: BTreeMap<BuildingId, Building>,
    /// Live teams by id.
    pub teams: BTreeMap<TeamId, Team>,
    /// Team recipes.
    pub team_types: Vec<TeamType>,
    /// Scenario waypoints.
    pub waypoints: Vec<CellPos>,
    /// Global flags set by team scripts.
    pub globals: BTreeSet<i32>,
    /// Replicated options.
    pub options: GameOptions,
    /// Session pacing.
    pub pacing: Pacing,
    /// Chat log.
    pub messages: Vec<ChatMessage>,
    /// Cleared when the local player leaves.
    pub game_active: bool,
    /// A save was requested this frame.
    pub save_requested: bool,
    /// Events waiting for their frame.
    pub do_list: EventQueue,
    local_player: Option<HouseId>,
    crc_history: BTreeMap<u32, u32>,
    remote_crcs: BTreeMap<(u32, HouseId), u32>,
    desync: Option<Desync>,
    next_unit_id: UnitId,
    next_building_id: BuildingId,
    next_team_id: TeamId,
    #[serde(skip)]
    pending_animations: Vec<AnimationRequest>,
    #[serde(skip)]
    pending_damage: Vec<DamageEvent>,
}

impl World {
    /// Create an empty world of clear terrain with default rules.
    #[must_use]
    pub fn new(width: i32, height: i32, seed: u32) -> Self {
        Self::with_rules(Rules::default(), width, height, seed)
    }

    /// Create an empty world with the given rules.
    #[must_use]
    pub fn with_rules(rules: Rules, width: i32, height: i32, seed: u32) -> Self {
        let pacing = Pacing::new(rules.comm.desired_frame_rate, rules.comm.max_ahead);
        let do_list = EventQueue::new(rules.comm.event_queue_size);
        Self {
            frame: 0,
            rules,
            map: Map::new(width, height),
            random: Random::new(seed),
            houses: Vec::new(),
            units: BTreeMap::new(),
            buildings: BTreeMap::new(),
            teams: BTreeMap::new(),
            team_types: Vec::new(),
            waypoints: Vec::new(),
            globals: BTreeSet::new(),
            options: GameOptions::default(),
            pacing,
            messages: Vec::new(),
            game_active: true,
            save_requested: false,
            do_list,
            local_player: None,
            crc_history: BTreeMap::new(),
            remote_crcs: BTreeMap::new(),
            desync: None,
            next_unit_id: 1,
            next_building_id: 1,
            next_team_id: 1,
            pending_animations: Vec::new(),
            pending_damage: Vec::new(),
        }
    }

    /// Current frame number.
    #[must_use]
    pub const fn frame(&self) -> u32 {
        self.frame
    }

    /// House controlled on this machine, if any.
    #[must_use]
    pub const fn local_player(&self) -> Option<HouseId> {
        self.local_player
    }

    /// Set the house controlled on this machine.
    pub fn set_local_player(&mut self, player: Option<HouseId>) {
        self.local_player = player;
    }

    // ========================================================================
    // Object access
    // ========================================================================

    /// Add a house, keeping houses sorted by id.
    pub fn add_house(&mut self, house: House) {
        let at = self.houses.partition_point(|h| h.id < house.id);
        self.houses.insert(at, house);
    }

    /// House by id.
    #[must_use]
    pub fn house(&self, id: HouseId) -> Option<&House> {
        self.houses.iter().find(|h| h.id == id)
    }

    /// Mutable house by id.
    pub fn house_mut(&mut self, id: HouseId) -> Option<&mut House> {
        self.houses.iter_mut().find(|h| h.id == id)
    }

    /// Create a unit at full strength resting in `cell`.
    pub fn spawn_unit(&mut self, owner: HouseId, type_id: u8, cell: CellPos, facing: Dir) -> UnitId {
        let id = self.next_unit_id;
        self.next_unit_id += 1;
        let strength = self.rules.unit_type(type_id).map_or(1, |t| t.strength);
        let mut unit = Unit::new(id, owner, type_id, cell, facing, strength);
        if self.map.in_bounds(cell) {
            self.map.occupy(cell, id);
            unit.occupied = Some(cell);
        }
        self.units.insert(id, unit);
        id
    }

    /// Put a building on the map if the footprint is clear.
    pub fn place_building(&mut self, owner: HouseId, type_id: u8, cell: CellPos) -> Option<BuildingId> {
        let data = self.rules.building_type(type_id)?;
        let (width, height, strength, factory) = (data.width, data.height, data.strength, data.factory);
        if !self.map.can_place(cell, width, height, &self.rules) {
            return None;
        }
        let id = self.next_building_id;
        self.next_building_id += 1;
        let mut building = Building::new(id, owner, type_id, cell, strength);
        building.is_primary = factory.is_some()
            && !self
                .buildings
                .values()
                .any(|b| b.owner == owner && b.is_primary && b.factory(&self.rules) == factory);
        self.map.place_building(id, cell, width, height);
        self.buildings.insert(id, building);
        tracing::debug!(building = id, owner, type_id, x = cell.x, y = cell.y, "Building placed");
        Some(id)
    }

    /// Create a team of type `type_index` if fewer than its limit exist.
    pub fn create_team(&mut self, type_index: usize) -> Option<TeamId> {
        let team_type = self.team_types.get(type_index)?;
        let live = self.teams.values().filter(|t| t.type_index == type_index).count();
        if live >= usize::from(team_type.max_allowed) {
            return None;
        }
        let id = self.next_team_id;
        self.next_team_id += 1;
        self.teams.insert(id, Team::new(id, type_index, team_type));
        tracing::debug!(team = id, name = %team_type.name, "Team created");
        Some(id)
    }

    /// Position of a target, if it exists.
    #[must_use]
    pub fn target_coord(&self, target: Target) -> Option<Coord> {
        self.lookup().target_coord(target)
    }

    /// Whether a target names a living object or a cell on the map.
    #[must_use]
    pub fn is_target_legal(&self, target: Target) -> bool {
        match target {
            Target::None => false,
            Target::Cell(cell) => self.map.in_bounds(cell),
            _ => self.target_coord(target).is_some(),
        }
    }

    /// The object in a cell: its building, then its unit, else nothing.
    #[must_use]
    pub fn object_at(&self, cell: CellPos) -> Target {
        let Some(data) = self.map.cell(cell) else {
            return Target::None;
        };
        if let Some(id) = data.building {
            return Target::Building(id);
        }
        match data.occupant {
            Some(id) => Target::Unit(id),
            None => Target::None,
        }
    }

    fn lookup(&self) -> ObjectLookup<'_> {
        ObjectLookup {
            units: &self.units,
            buildings: &self.buildings,
            rules: &self.rules,
        }
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// Stop a unit's orders and stand guard. A unit mid-track finishes it.
    pub fn idle_unit(&mut self, id: UnitId) {
        if let Some(unit) = self.units.get_mut(&id) {
            unit.assign_destination(Target::None);
            unit.assign_target(Target::None);
            unit.nav_queue.clear();
            unit.path.clear();
            unit.assign_mission(Mission::Guard);
        }
    }

    /// Take a unit out of its team.
    pub fn leave_team(&mut self, id: UnitId) {
        let Some(unit) = self.units.get_mut(&id) else {
            return;
        };
        let type_id = unit.type_id;
        if let Some(team) = unit.team.take().and_then(|t| self.teams.get_mut(&t)) {
            team.forget(id, &self.team_types, Some(type_id));
        }
        unit.clear_formation();
    }

    /// Place `player`'s completed building at `cell`.
    pub fn place_completed(&mut self, player: HouseId, kind: ProductionKind, cell: CellPos) -> Option<BuildingId> {
        if kind != ProductionKind::Building {
            return None;
        }
        let type_id = self
            .house(player)?
            .factory(kind)
            .filter(|f| f.is_completed)?
            .type_id;
        let id = self.place_building(player, type_id, cell)?;
        if let Some(house) = self.house_mut(player) {
            house.building_factory = None;
        }
        Some(id)
    }

    /// Make a factory the primary one of its kind for its owner.
    pub fn set_primary(&mut self, player: HouseId, id: BuildingId) -> bool {
        let Some(kind) = self
            .buildings
            .get(&id)
            .filter(|b| b.owner == player && b.is_alive())
            .and_then(|b| b.factory(&self.rules))
        else {
            return false;
        };
        for building in self.buildings.values_mut() {
            if building.owner == player && building.factory(&self.rules) == Some(kind) {
                building.is_primary = building.id == id;
            }
        }
        true
    }

    /// Sell one of `player`'s buildings.
    pub fn sell_building(&mut self, player: HouseId, id: BuildingId) -> bool {
        let Some(building) = self.buildings.get(&id).filter(|b| b.owner == player && b.is_alive()) else {
            return false;
        };
        let refund = building.refund(&self.rules);
        let (width, height) = building.size(&self.rules);
        let cell = building.cell;
        self.map.remove_building(id, cell, width, height);
        self.buildings.remove(&id);
        if let Some(house) = self.house_mut(player) {
            house.credits = house.credits.saturating_add(refund);
        }
        true
    }

    /// Sell one of `player`'s wall segments.
    pub fn sell_wall(&mut self, player: HouseId, cell: CellPos) -> bool {
        let owned = self
            .map
            .cell(cell)
            .and_then(|c| c.wall)
            .is_some_and(|w| w.owner == player);
        if !owned {
            return false;
        }
        self.map.remove_wall(cell);
        let refund = self.rules.wall_refund;
        if let Some(house) = self.house_mut(player) {
            house.credits = house.credits.saturating_add(refund);
        }
        true
    }

    /// Fire a charged special weapon at `cell`.
    pub fn fire_special(&mut self, player: HouseId, weapon: SpecialWeapon, cell: CellPos) -> bool {
        let rules = &self.rules;
        let Some(fired) = self
            .houses
            .iter_mut()
            .find(|h| h.id == player)
            .map(|h| h.fire_special(weapon, rules))
        else {
            return false;
        };
        if !fired {
            return false;
        }
        let damage = self.rules.nuke_damage;
        let hits = match weapon {
            SpecialWeapon::Nuke => combat::explode(self, cell, damage, NUKE_RADIUS),
            SpecialWeapon::ParaBomb => combat::explode(self, cell, damage / 4, PARABOMB_RADIUS),
            _ => Vec::new(),
        };
        tracing::info!(player, weapon = ?weapon, x = cell.x, y = cell.y, hits = hits.len(), "Special weapon fired");
        self.pending_damage.extend(hits);
        true
    }

    /// Queue an animation for this frame's [`TickEvents`].
    pub fn request_animation(&mut self, request: AnimationRequest) {
        self.pending_animations.push(request);
    }

    // ========================================================================
    // Synchronisation
    // ========================================================================

    /// Record another player's frame checksum and compare it with ours.
    ///
    /// The checksum describes the frame `delay` frames before `frame`.
    /// Reports for frames outside our history are ignored.
    pub fn record_remote_crc(&mut self, frame: u32, player: HouseId, crc: u32, delay: u8) {
        if frame != self.frame || u32::from(delay) >= CRC_HISTORY {
            return;
        }
        let Some(origin) = frame.checked_sub(u32::from(delay)) else {
            return;
        };
        self.remote_crcs.insert((origin, player), crc);
        if let Some(&local) = self.crc_history.get(&origin) {
            if local != crc && self.desync.is_none() {
                tracing::warn!(frame = origin, player, local, remote = crc, "Frame checksum mismatch");
                self.desync = Some(Desync {
                    frame: origin,
                    player,
                    local,
                    remote: crc,
                });
            }
        }
    }

    /// Our checksum for a recent frame.
    #[must_use]
    pub fn crc_for_frame(&self, frame: u32) -> Option<u32> {
        self.crc_history.get(&frame).copied()
    }

    /// The first checksum disagreement seen, if any.
    #[must_use]
    pub const fn desync(&self) -> Option<Desync> {
        self.desync
    }

    /// Fail if any player reported a different checksum than ours.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DesyncDetected`] naming the first bad frame.
    pub fn check_sync(&self) -> Result<()> {
        match self.desync {
            Some(d) => Err(GameError::DesyncDetected {
                tick: u64::from(d.frame),
                local_hash: u64::from(d.local),
                remote_hash: u64::from(d.remote),
            }),
            None => Ok(()),
        }
    }

    /// Build the FRAMEINFO event describing the current frame.
    #[must_use]
    pub fn frame_info_event(&self, player: HouseId, command_count: u16) -> Event {
        let delay = self.pacing.max_ahead.min(CRC_HISTORY - 1);
        Event::new(
            self.frame + delay,
            player,
            EventKind::FrameInfo {
                crc: self.frame_crc(),
                command_count,
                delay: delay as u8,
            },
        )
    }

    // ========================================================================
    // Frame processing
    // ========================================================================

    /// Advance one frame, tolerating late events.
    ///
    /// Frame order:
    /// 1. record this frame's checksum
    /// 2. execute due events from the do-list
    /// 3. unit missions, turrets and driving, in ascending id order
    /// 4. team scripts
    /// 5. house production, repair and special weapon charge
    /// 6. remove destroyed objects
    /// 7. advance the frame counter
    pub fn tick(&mut self) -> TickEvents {
        match self.advance(false) {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(frame = self.frame, error = %e, "Frame failed");
                TickEvents::default()
            }
        }
    }

    /// Advance one frame, failing if an event arrived after its frame.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::PacketTooLate`] and leaves the frame counter
    /// unchanged when a late event is found.
    pub fn try_tick(&mut self) -> Result<TickEvents> {
        self.advance(true)
    }

    /// Report units the map does not record in the cell they claim.
    #[cfg(feature = "debug-validation")]
    fn validate_occupancy(&self) {
        for (&id, unit) in &self.units {
            let Some(cell) = unit.occupied else {
                continue;
            };
            let data = self.map.cell(cell);
            if data.map_or(true, |c| c.occupant != Some(id) && c.incoming != Some(id)) {
                tracing::error!(frame = self.frame, unit = id, ?cell, "Unit missing from its cell");
            }
        }
    }

    fn advance(&mut self, strict: bool) -> Result<TickEvents> {
        let mut events = TickEvents {
            frame: self.frame,
            ..TickEvents::default()
        };

        let crc = self.frame_crc();
        self.crc_history.insert(self.frame, crc);
        let oldest = self.frame.saturating_sub(CRC_HISTORY - 1);
        self.crc_history.retain(|&f, _| f >= oldest);
        self.remote_crcs.retain(|&(f, _), _| f >= oldest);

        let mut do_list = std::mem::take(&mut self.do_list);
        let executed = do_list.execute_frame(self, strict);
        self.do_list = do_list;
        events.executed = executed?;

        self.run_units(&mut events);
        self.run_teams(&mut events);
        self.run_houses(&mut events);
        self.remove_dead(&mut events);
        #[cfg(feature = "debug-validation")]
        self.validate_occupancy();

        events.damage_events.append(&mut self.pending_damage);
        events.animations.append(&mut self.pending_animations);
        self.frame += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(frame = self.frame, state_hash = hash, "Simulation state hash");
        }

        Ok(events)
    }

    fn run_units(&mut self, events: &mut TickEvents) {
        let ids: Vec<UnitId> = self.units.keys().copied().collect();
        for id in ids {
            let Some(mut unit) = self.units.remove(&id) else {
                continue;
            };
            if !unit.is_alive() {
                self.units.insert(id, unit);
                continue;
            }

            if !self.mission_ai(&mut unit, events) {
                if let Some(cell) = unit.occupied {
                    self.map.vacate(cell, id);
                }
                unit.stop_driver(&mut self.map);
                if let Some(team) = unit.team.and_then(|t| self.teams.get_mut(&t)) {
                    team.forget(id, &self.team_types, Some(unit.type_id));
                }
                continue;
            }

            let aim = self.target_coord(unit.tar_com);
            unit.turret_ai(aim, &self.rules);
            unit.arm = unit.arm.saturating_sub(1);

            let lookup = ObjectLookup {
                units: &self.units,
                buildings: &self.buildings,
                rules: &self.rules,
            };
            let mut env = DriveEnv {
                map: &mut self.map,
                rules: &self.rules,
                observer: &mut events.cell_visits,
                targets: &lookup,
            };
            unit.drive_ai(&mut env);

            self.units.insert(id, unit);
        }
    }

    /// Carry out one frame of a unit's mission.
    ///
    /// Returns false if the unit was consumed, for example by deploying
    /// into a building.
    fn mission_ai(&mut self, unit: &mut Unit, events: &mut TickEvents) -> bool {
        match unit.mission {
            Mission::Move => {
                if !unit.nav_com.is_some() && !unit.drive.is_driving && unit.drive.track.is_none() {
                    unit.assign_mission(Mission::Guard);
                }
            }
            Mission::QMove => {
                if !unit.nav_com.is_some() && unit.drive.track.is_none() {
                    if unit.nav_queue.is_empty() {
                        unit.assign_mission(Mission::Guard);
                    } else {
                        let next = unit.nav_queue.remove(0);
                        unit.assign_destination(next);
                    }
                }
            }
            Mission::Guard | Mission::Ambush => {
                if !self.is_target_legal(unit.tar_com)
                    || self.target_coord(unit.tar_com).is_some_and(|c| !unit.in_range(c, &self.rules))
                {
                    unit.assign_target(combat::threat_in_range(self, unit));
                }
                self.try_fire(unit, events);
            }
            Mission::GuardArea => {
                if !self.is_target_legal(unit.tar_com) {
                    unit.assign_target(combat::threat_in_range(self, unit));
                }
                let post = self.target_coord(unit.archive);
                let strayed = post.is_some_and(|p| unit.coord.distance(p) > self.rules.close_enough_distance * 2);
                if unit.tar_com.is_some() && !strayed {
                    if self.try_fire(unit, events).is_none() && !unit.nav_com.is_some() {
                        if let Some(coord) = self.target_coord(unit.tar_com) {
                            if !unit.in_range(coord, &self.rules) {
                                unit.assign_destination(unit.tar_com);
                            }
                        }
                    }
                } else {
                    unit.assign_target(Target::None);
                    if !unit.nav_com.is_some()
                        && unit.drive.track.is_none()
                        && post.is_some_and(|p| p.cell() != unit.cell())
                    {
                        unit.assign_destination(unit.archive);
                    }
                }
            }
            Mission::Attack | Mission::Hunt => self.attack_ai(unit, events),
            Mission::Unload => return self.unload_ai(unit),
            _ => {}
        }
        true
    }

    fn attack_ai(&mut self, unit: &mut Unit, events: &mut TickEvents) {
        let wall_gone = unit
            .tar_com
            .as_cell()
            .is_some_and(|cell| self.map.cell(cell).map_or(true, |c| c.wall.is_none()));
        if wall_gone || !self.is_target_legal(unit.tar_com) {
            unit.assign_target(Target::None);
            if unit.mission == Mission::Hunt {
                unit.assign_target(combat::nearest_enemy(self, unit.owner, Some(unit.coord)));
            }
            if !unit.tar_com.is_some() {
                if !unit.restore_mission() {
                    unit.assign_mission(Mission::Guard);
                }
                unit.assign_destination(Target::None);
                return;
            }
        }

        let Some(coord) = self.target_coord(unit.tar_com) else {
            return;
        };
        if unit.in_range(coord, &self.rules) {
            if unit.nav_com == unit.tar_com {
                unit.assign_destination(Target::None);
            }
            if let Some(hit) = self.try_fire(unit, events) {
                if hit.destroyed && hit.target.as_cell().is_some() && !unit.restore_mission() {
                    unit.assign_mission(Mission::Guard);
                }
            }
        } else if !unit.nav_com.is_some() && unit.is_armed(&self.rules) {
            unit.assign_destination(unit.tar_com);
        }
    }

    fn try_fire(&mut self, unit: &mut Unit, events: &mut TickEvents) -> Option<DamageEvent> {
        let target = unit.tar_com;
        if !target.is_some() {
            return None;
        }
        let hit = combat::fire(self, unit, target)?;
        if hit.destroyed {
            unit.assign_target(Target::None);
        }
        events.damage_events.push(hit);
        Some(hit)
    }

    /// Deploy a construction vehicle into a construction yard centred on
    /// its cell; any other unit simply unlocks and stands guard.
    fn unload_ai(&mut self, unit: &mut Unit) -> bool {
        if unit.drive.track.is_some() {
            return true;
        }
        let is_mcv = unit.type_data(&self.rules).is_some_and(|t| t.name == "MCV");
        if let (true, Some(yard)) = (is_mcv, self.rules.building_type_id("FACT")) {
            let cell = unit.cell();
            let origin = CellPos::new(cell.x - 1, cell.y - 1);
            self.map.vacate(cell, unit.id);
            if self.place_building(unit.owner, yard, origin).is_some() {
                tracing::debug!(unit = unit.id, "Construction vehicle deployed");
                return false;
            }
            self.map.occupy(cell, unit.id);
        }
        unit.drive.is_turret_locked_down = false;
        unit.assign_mission(Mission::Guard);
        true
    }

    fn run_teams(&mut self, events: &mut TickEvents) {
        if self.frame % AUTOCREATE_INTERVAL == 0 {
            self.autocreate_teams();
        }
        let ids: Vec<TeamId> = self.teams.keys().copied().collect();
        for id in ids {
            let Some(mut team) = self.teams.remove(&id) else {
                continue;
            };
            if team.ai(self) {
                self.teams.insert(id, team);
            } else {
                team.disband(self);
                events.disbanded.push(id);
            }
        }
    }

    /// Create teams that computer houses build on their own.
    fn autocreate_teams(&mut self) {
        for index in 0..self.team_types.len() {
            let team_type = &self.team_types[index];
            if !team_type.is_autocreate {
                continue;
            }
            let is_computer = self.house(team_type.house).is_some_and(|h| !h.is_human && !h.is_defeated);
            if !is_computer {
                continue;
            }
            if team_type.is_prebuilt {
                let ready = team_type.members.iter().all(|m| {
                    let free = self
                        .units
                        .values()
                        .filter(|u| u.owner == team_type.house && u.type_id == m.unit_type && u.team.is_none())
                        .count();
                    free >= usize::from(m.quantity)
                });
                if !ready {
                    continue;
                }
            }
            self.create_team(index);
        }
    }

    fn run_houses(&mut self, events: &mut TickEvents) {
        for index in 0..self.houses.len() {
            let house_id = self.houses[index].id;

            if self.houses[index].to_die {
                self.destroy_house(house_id);
                continue;
            }

            for kind in self.houses[index].production_ai() {
                if kind == ProductionKind::Building {
                    if let Some(factory) = self.houses[index].factory(kind) {
                        events.production_complete.push(ProductionComplete {
                            house: house_id,
                            kind,
                            type_id: factory.type_id,
                            unit: None,
                        });
                    }
                }
            }
            // Finished units wait in the factory until the exit is clear.
            if let Some(type_id) = self.houses[index]
                .unit_factory
                .as_ref()
                .filter(|f| f.is_completed)
                .map(|f| f.type_id)
            {
                if let Some(unit) = self.deliver_unit(house_id, type_id) {
                    self.houses[index].unit_factory = None;
                    events.spawned.push(unit);
                    events.production_complete.push(ProductionComplete {
                        house: house_id,
                        kind: ProductionKind::Unit,
                        type_id,
                        unit: Some(unit),
                    });
                }
            }

            let mut credits = self.houses[index].credits;
            for building in self.buildings.values_mut().filter(|b| b.owner == house_id) {
                building.repair_ai(&mut credits, &self.rules);
            }
            self.houses[index].credits = credits;
            self.houses[index].charge_specials();
        }
    }

    /// Roll a finished unit out of the owner's primary factory.
    fn deliver_unit(&mut self, house: HouseId, type_id: u8) -> Option<UnitId> {
        let factory = self
            .buildings
            .values()
            .filter(|b| b.owner == house && b.is_alive() && b.factory(&self.rules) == Some(ProductionKind::Unit))
            .max_by_key(|b| (b.is_primary, std::cmp::Reverse(b.id)))?;
        let exit = factory.exit_cell(&self.rules);
        let speed = self.rules.unit_type(type_id)?.speed_class;
        let cell = if self.map.can_enter_cell(exit, 0, speed, &self.rules) == MoveResult::Ok {
            exit
        } else {
            self.map.nearby_location(exit, 0, speed, &self.rules, EXIT_RADIUS)?
        };
        let id = self.spawn_unit(house, type_id, cell, Dir::S);
        tracing::debug!(unit = id, house, type_id, "Unit produced");
        Some(id)
    }

    /// Destroy everything a house owns and mark it defeated.
    fn destroy_house(&mut self, house: HouseId) {
        for unit in self.units.values_mut().filter(|u| u.owner == house) {
            unit.strength = 0;
        }
        for building in self.buildings.values_mut().filter(|b| b.owner == house) {
            building.strength = 0;
        }
        if let Some(h) = self.house_mut(house) {
            h.to_die = false;
            h.is_defeated = true;
            h.unit_factory = None;
            h.building_factory = None;
        }
        tracing::info!(house, "House defeated");
    }

    fn remove_dead(&mut self, events: &mut TickEvents) {
        let dead: Vec<UnitId> = self
            .units
            .values()
            .filter(|u| !u.is_alive())
            .map(|u| u.id)
            .collect();
        for id in dead {
            let Some(mut unit) = self.units.remove(&id) else {
                continue;
            };
            unit.stop_driver(&mut self.map);
            if let Some(cell) = unit.occupied {
                self.map.vacate(cell, id);
            }
            if let Some(team) = unit.team.and_then(|t| self.teams.get_mut(&t)) {
                team.forget(id, &self.team_types, Some(unit.type_id));
            }
            events.deaths.push(Target::Unit(id));
        }

        let dead: Vec<BuildingId> = self
            .buildings
            .values()
            .filter(|b| !b.is_alive())
            .map(|b| b.id)
            .collect();
        for id in dead {
            if let Some(building) = self.buildings.remove(&id) {
                let (width, height) = building.size(&self.rules);
                self.map.remove_building(id, building.cell, width, height);
                events.deaths.push(Target::Building(id));
            }
        }
    }

    // ========================================================================
    // Hashing and serialization
    // ========================================================================

    fn hash_state<H: Hasher>(&self, hasher: &mut H) {
        self.frame.hash(hasher);
        self.random.hash(hasher);
        self.houses.hash(hasher);
        self.units.len().hash(hasher);
        for unit in self.units.values() {
            unit.hash(hasher);
        }
        self.buildings.len().hash(hasher);
        for building in self.buildings.values() {
            building.hash(hasher);
        }
        self.teams.len().hash(hasher);
        for team in self.teams.values() {
            team.hash(hasher);
        }
        self.map.hash(hasher);
        self.globals.hash(hasher);
        self.options.hash(hasher);
    }

    /// Hash of the replicated state.
    ///
    /// Two worlds with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_state(&mut hasher);
        hasher.finish()
    }

    /// CRC-32 of the replicated state, as carried in FRAMEINFO events.
    #[must_use]
    pub fn frame_crc(&self) -> u32 {
        let mut sink = ByteSink::default();
        self.hash_state(&mut sink);
        CRC32.checksum(&sink.0)
    }

    /// Serialize the world.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize world: {}", e)))
    }

    /// Deserialize a world.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a serialized world.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize world: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::team::{TeamMember, TeamMission, TeamMissionEntry};

    fn two_player_world() -> World {
        let mut world = World::new(24, 24, 42);
        world.add_house(House::new(0, "Greece", true, 5000));
        world.add_house(House::new(1, "USSR", false, 5000));
        world
    }

    fn run_until<F: Fn(&World) -> bool>(world: &mut World, limit: u32, done: F) -> bool {
        for _ in 0..limit {
            world.tick();
            if done(world) {
                return true;
            }
        }
        false
    }

    #[test]
    fn test_new_world() {
        let world = World::new(8, 8, 1);
        assert_eq!(world.frame(), 0);
        assert!(world.game_active);
        assert!(world.units.is_empty());
    }

    #[test]
    fn test_houses_sorted() {
        let mut world = World::new(8, 8, 1);
        world.add_house(House::new(3, "c", false, 0));
        world.add_house(House::new(1, "a", false, 0));
        let ids: Vec<_> = world.houses.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(world.house(2).is_none());
    }

    #[test]
    fn test_spawn_occupies_cell() {
        let mut world = two_player_world();
        let id = world.spawn_unit(0, 1, CellPos::new(3, 3), Dir::N);
        assert_eq!(world.map.cell(CellPos::new(3, 3)).unwrap().occupant, Some(id));
        assert_eq!(world.object_at(CellPos::new(3, 3)), Target::Unit(id));
        assert_eq!(world.units[&id].strength, 300);
    }

    #[test]
    fn test_move_then_guard() {
        let mut world = two_player_world();
        let id = world.spawn_unit(0, 1, CellPos::new(2, 2), Dir::E);
        let unit = world.units.get_mut(&id).unwrap();
        unit.assign_mission(Mission::Move);
        unit.assign_destination(Target::Cell(CellPos::new(8, 2)));

        assert!(run_until(&mut world, 600, |w| w.units[&id].mission == Mission::Guard));
        assert_eq!(world.units[&id].cell(), CellPos::new(8, 2));
        assert_eq!(world.map.cell(CellPos::new(8, 2)).unwrap().occupant, Some(id));
        assert_eq!(world.map.cell(CellPos::new(2, 2)).unwrap().occupant, None);
    }

    #[test]
    fn test_qmove_visits_queue() {
        let mut world = two_player_world();
        let id = world.spawn_unit(0, 1, CellPos::new(2, 2), Dir::E);
        let unit = world.units.get_mut(&id).unwrap();
        unit.assign_mission(Mission::QMove);
        unit.nav_queue.push(Target::Cell(CellPos::new(5, 2)));
        unit.nav_queue.push(Target::Cell(CellPos::new(5, 6)));

        assert!(run_until(&mut world, 1200, |w| w.units[&id].mission == Mission::Guard));
        assert_eq!(world.units[&id].cell(), CellPos::new(5, 6));
    }

    #[test]
    fn test_guard_fires_on_enemy() {
        let mut world = two_player_world();
        let tank = world.spawn_unit(0, 1, CellPos::new(5, 5), Dir::N);
        let victim = world.spawn_unit(1, 4, CellPos::new(7, 5), Dir::N);
        world.units.get_mut(&victim).unwrap().assign_mission(Mission::Sleep);

        assert!(run_until(&mut world, 600, |w| !w.units.contains_key(&victim)));
        assert_eq!(world.units[&tank].tar_com, Target::None);
    }

    #[test]
    fn test_attack_chases_target() {
        let mut world = two_player_world();
        let tank = world.spawn_unit(0, 1, CellPos::new(2, 10), Dir::E);
        let victim = world.spawn_unit(1, 3, CellPos::new(14, 10), Dir::N);
        let unit = world.units.get_mut(&tank).unwrap();
        unit.assign_mission(Mission::Attack);
        unit.assign_target(Target::Unit(victim));

        assert!(run_until(&mut world, 3000, |w| !w.units.contains_key(&victim)));
        assert!(world.units[&tank].cell().x > 2);
    }

    #[test]
    fn test_production_delivers_at_factory() {
        let mut world = two_player_world();
        let weap = world.place_building(0, 1, CellPos::new(4, 4)).unwrap();
        assert!(world.buildings[&weap].is_primary);
        let rules = world.rules.clone();
        world.houses[0].begin_production(ProductionKind::Unit, 4, &rules);

        let build_time = world.rules.unit_types[4].build_time;
        let mut spawned = Vec::new();
        for _ in 0..=build_time {
            spawned.extend(world.tick().spawned);
        }
        assert_eq!(spawned.len(), 1);
        assert_eq!(world.units[&spawned[0]].cell(), CellPos::new(4, 6));
        assert!(world.houses[0].unit_factory.is_none());
    }

    #[test]
    fn test_building_waits_for_place() {
        let mut world = two_player_world();
        let rules = world.rules.clone();
        world.houses[0].begin_production(ProductionKind::Building, 2, &rules);
        for _ in 0..=world.rules.building_types[2].build_time {
            world.tick();
        }
        assert!(world.houses[0].building_factory.as_ref().unwrap().is_completed);
        assert!(world.place_completed(0, ProductionKind::Building, CellPos::new(10, 10)).is_some());
        assert!(world.houses[0].building_factory.is_none());
        assert!(world.map.cell(CellPos::new(11, 11)).unwrap().building.is_some());
    }

    #[test]
    fn test_primary_switches() {
        let mut world = two_player_world();
        let a = world.place_building(0, 1, CellPos::new(2, 2)).unwrap();
        let b = world.place_building(0, 1, CellPos::new(8, 2)).unwrap();
        assert!(world.buildings[&a].is_primary);
        assert!(!world.buildings[&b].is_primary);
        assert!(world.set_primary(0, b));
        assert!(!world.buildings[&a].is_primary);
        assert!(world.buildings[&b].is_primary);
        assert!(!world.set_primary(1, a));
    }

    #[test]
    fn test_mcv_deploys() {
        let mut world = two_player_world();
        let mcv = world.spawn_unit(0, 0, CellPos::new(6, 6), Dir::N);
        world.units.get_mut(&mcv).unwrap().assign_mission(Mission::Unload);
        world.tick();
        assert!(!world.units.contains_key(&mcv));
        let yard = world.buildings.values().next().unwrap();
        assert_eq!(yard.cell, CellPos::new(5, 5));
        assert_eq!(world.map.cell(CellPos::new(6, 6)).unwrap().occupant, None);
    }

    #[test]
    fn test_destruct_defeats_house() {
        let mut world = two_player_world();
        let unit = world.spawn_unit(1, 1, CellPos::new(3, 3), Dir::N);
        world.houses[1].to_die = true;
        let events = world.tick();
        assert!(world.houses[1].is_defeated);
        assert!(events.deaths.contains(&Target::Unit(unit)));
        assert_eq!(world.map.cell(CellPos::new(3, 3)).unwrap().occupant, None);
    }

    #[test]
    fn test_team_recruits_moves_and_disbands() {
        let mut world = two_player_world();
        world.waypoints = vec![CellPos::new(12, 4)];
        world.team_types.push(TeamType {
            name: "pair".into(),
            house: 1,
            members: vec![TeamMember {
                unit_type: 1,
                quantity: 2,
            }],
            missions: vec![TeamMissionEntry {
                mission: TeamMission::Move,
                argument: 0,
            }],
            recruit_priority: 5,
            max_allowed: 1,
            is_reinforcable: false,
            is_suicide: false,
            is_autocreate: false,
            is_prebuilt: false,
        });
        let a = world.spawn_unit(1, 1, CellPos::new(3, 3), Dir::E);
        let b = world.spawn_unit(1, 1, CellPos::new(3, 5), Dir::E);
        world.spawn_unit(1, 4, CellPos::new(3, 7), Dir::E);
        let team = world.create_team(0).unwrap();
        assert!(world.create_team(0).is_none());

        world.tick();
        world.tick();
        let t = &world.teams[&team];
        assert_eq!(t.members.len(), 2);
        assert!(t.is_member(a) && t.is_member(b));
        assert_eq!(world.units[&a].team, Some(team));

        let mut disbanded = false;
        for _ in 0..3000 {
            if world.tick().disbanded.contains(&team) {
                disbanded = true;
                break;
            }
        }
        assert!(disbanded);
        assert!(world.units[&a].cell().cell_distance(CellPos::new(12, 4)) <= 3);
        assert_eq!(world.units[&a].team, None);
    }

    #[test]
    fn test_state_hash_tracks_changes() {
        let mut a = two_player_world();
        let mut b = two_player_world();
        a.spawn_unit(0, 1, CellPos::new(3, 3), Dir::N);
        b.spawn_unit(0, 1, CellPos::new(3, 3), Dir::N);
        assert_eq!(a.state_hash(), b.state_hash());
        assert_eq!(a.frame_crc(), b.frame_crc());
        b.spawn_unit(0, 1, CellPos::new(4, 3), Dir::N);
        assert_ne!(a.state_hash(), b.state_hash());
        assert_ne!(a.frame_crc(), b.frame_crc());
    }

    #[test]
    fn test_crc_bytes_are_little_endian() {
        let mut sink = ByteSink::default();
        0x0102_0304u32.hash(&mut sink);
        2usize.hash(&mut sink);
        (-2i16).hash(&mut sink);
        [7u8].as_slice().hash(&mut sink);
        assert_eq!(
            sink.0,
            vec![4, 3, 2, 1, 2, 0, 0, 0, 0, 0, 0, 0, 0xFE, 0xFF, 1, 0, 0, 0, 0, 0, 0, 0, 7]
        );
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut world = two_player_world();
        world.spawn_unit(0, 1, CellPos::new(3, 3), Dir::N);
        world.place_building(1, 2, CellPos::new(10, 10));
        for _ in 0..5 {
            world.tick();
        }
        let bytes = world.serialize().unwrap();
        let restored = World::deserialize(&bytes).unwrap();
        assert_eq!(restored.state_hash(), world.state_hash());
        assert_eq!(restored.frame(), 5);
    }

    #[test]
    fn test_frame_info_detects_desync() {
        let mut world = two_player_world();
        let good = world.frame_info_event(1, 0);
        let delay = world.pacing.max_ahead;
        assert_eq!(good.frame, delay);

        let mut bad = good.clone();
        if let EventKind::FrameInfo { crc, .. } = &mut bad.kind {
            *crc ^= 1;
        }
        world.do_list.add(good);
        for _ in 0..=delay {
            world.tick();
        }
        assert!(world.check_sync().is_ok());

        let mut world2 = two_player_world();
        world2.do_list.add(bad);
        for _ in 0..=delay {
            world2.tick();
        }
        assert!(matches!(
            world2.check_sync(),
            Err(GameError::DesyncDetected { tick: 0, .. })
        ));
    }
}
