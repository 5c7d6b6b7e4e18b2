//! Scripted unit groups.
//!
//! A [`TeamType`] is a recipe: which unit types, how many, and a list of
//! [`TeamMission`]s to carry out in order. A [`Team`] is a live instance
//! that recruits matching units, waits until it is at strength, and then
//! walks its mission list, regrouping whenever it falls under strength.
//!
//! Team membership is stored as unit ids on the team and a team id on each
//! unit, so either side can be dropped without dangling references.

use serde::{Deserialize, Serialize};

use crate::combat;
use crate::data::SpeedClass;
use crate::house::HouseId;
use crate::map::MoveResult;
use crate::math::{CellPos, Coord, CELL_LEPTON_W};
use crate::mission::Mission;
use crate::target::Target;
use crate::unit::UnitId;
use crate::world::World;

/// Unique identifier of a live team.
pub type TeamId = u32;

/// Radius searched for open ground around a move destination.
const NEARBY_RADIUS: i32 = 4;

/// One step of a team's script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamMission {
    /// Attack the nearest enemy.
    Attack,
    /// Attack whatever stands at a waypoint.
    AttackWaypoint,
    /// Change formation; argument 0 breaks formation.
    Formation,
    /// Move to a waypoint.
    Move,
    /// Move to a cell (`y * map width + x`).
    MoveCell,
    /// Guard the current area for `argument` tenths of a minute.
    Guard,
    /// Jump to mission number `argument`.
    Loop,
    /// Attack whatever stands at a cell (`y * map width + x`).
    AttackTarcom,
    /// Unload transported units.
    Unload,
    /// Deploy members that can deploy.
    Deploy,
    /// Chase down the nearest enemy.
    HoundDog,
    /// Give every member the mission numbered `argument`.
    Do,
    /// Set global flag `argument`.
    SetGlobal,
    /// Make members briefly invulnerable.
    Invulnerable,
    /// Load into a transport.
    Load,
    /// Infiltrate the building at a waypoint.
    Spy,
    /// Patrol to a waypoint.
    Patrol,
}

/// How many of one unit type a team wants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamMember {
    /// Index into [`crate::config::Rules::unit_types`].
    pub unit_type: u8,
    /// Units of this type wanted.
    pub quantity: u8,
}

/// A mission with its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamMissionEntry {
    /// What to do.
    pub mission: TeamMission,
    /// Mission-specific argument.
    #[serde(default)]
    pub argument: i32,
}

/// Team recipe.
///
/// # Example RON
///
/// ```ron
/// TeamType(
///     name: "strike",
///     house: 1,
///     members: [TeamMember(unit_type: 1, quantity: 3)],
///     missions: [
///         TeamMissionEntry(mission: Move, argument: 0),
///         TeamMissionEntry(mission: Guard, argument: 5),
///     ],
///     recruit_priority: 7,
///     max_allowed: 1,
///     is_reinforcable: true,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamType {
    /// Name, used by scenarios to refer to the type.
    pub name: String,
    /// Owning house.
    pub house: HouseId,
    /// Unit types and counts.
    pub members: Vec<TeamMember>,
    /// Script.
    pub missions: Vec<TeamMissionEntry>,
    /// Teams may take members from teams of lower priority.
    #[serde(default)]
    pub recruit_priority: u8,
    /// Most live teams of this type at once.
    #[serde(default = "default_max_allowed")]
    pub max_allowed: u8,
    /// Keeps recruiting replacements after it starts moving.
    #[serde(default)]
    pub is_reinforcable: bool,
    /// Members hunt when the team disbands.
    #[serde(default)]
    pub is_suicide: bool,
    /// Computer houses create this team on their own.
    #[serde(default)]
    pub is_autocreate: bool,
    /// Only auto-created once every member already exists.
    #[serde(default)]
    pub is_prebuilt: bool,
}

const fn default_max_allowed() -> u8 {
    1
}

impl TeamType {
    /// Total units wanted.
    #[must_use]
    pub fn desired(&self) -> u32 {
        self.members.iter().map(|m| u32::from(m.quantity)).sum()
    }

    /// Check the type for problems.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.members.is_empty() || self.desired() == 0 {
            errors.push(format!("Team type '{}' has no members", self.name));
        }
        for entry in &self.missions {
            if entry.mission == TeamMission::Loop
                && usize::try_from(entry.argument).map_or(true, |i| i >= self.missions.len())
            {
                errors.push(format!("Team type '{}' loops to a missing mission", self.name));
            }
        }
        errors
    }
}

/// A live team.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Team {
    /// Identifier.
    pub id: TeamId,
    /// Index into the world's team types.
    pub type_index: usize,
    /// Owning house.
    pub house: HouseId,
    /// Members in joining order.
    pub members: Vec<UnitId>,
    /// Members per entry of the type's member list.
    pub quantity: Vec<u8>,
    /// Membership changed since the last strength check.
    pub is_altered: bool,
    /// Has every member it wants.
    pub is_full_strength: bool,
    /// Too weak to carry on with its script.
    pub is_under_strength: bool,
    /// Has been at full strength at some point.
    pub is_has_been: bool,
    /// Working through its script.
    pub is_moving: bool,
    /// Gathering members back together.
    pub is_reforming: bool,
    /// Advance to the next mission this frame.
    pub is_next_mission: bool,
    /// Start the script regardless of strength.
    pub is_forced_active: bool,
    /// Frames until a suspended team wakes, `None` when running.
    pub suspended: Option<u32>,
    /// Index of the running mission.
    pub current_mission: Option<usize>,
    /// Rally point, recalculated from the members.
    pub zone: Target,
    /// Member nearest the rally point.
    pub closest_member: Option<UnitId>,
    /// Immediate objective.
    pub target: Target,
    /// Objective of the current mission.
    pub mission_target: Target,
    /// Frames left of a timed mission.
    pub timeout: u32,
}

impl Team {
    /// Create an empty team of the given type.
    #[must_use]
    pub fn new(id: TeamId, type_index: usize, team_type: &TeamType) -> Self {
        Self {
            id,
            type_index,
            house: team_type.house,
            members: Vec::new(),
            quantity: vec![0; team_type.members.len()],
            is_altered: true,
            is_full_strength: false,
            is_under_strength: true,
            is_has_been: false,
            is_moving: false,
            is_reforming: false,
            is_next_mission: false,
            is_forced_active: false,
            suspended: None,
            current_mission: None,
            zone: Target::None,
            closest_member: None,
            target: Target::None,
            mission_target: Target::None,
            timeout: 0,
        }
    }

    /// Number of members.
    #[must_use]
    pub fn total(&self) -> usize {
        self.members.len()
    }

    /// Whether `unit` belongs to this team.
    #[must_use]
    pub fn is_member(&self, unit: UnitId) -> bool {
        self.members.contains(&unit)
    }

    // ========================================================================
    // Membership
    // ========================================================================

    /// Member-list slot `unit` could fill, if it may join.
    #[must_use]
    pub fn can_add(&self, unit: UnitId, world: &World) -> Option<usize> {
        let team_type = world.team_types.get(self.type_index)?;
        let candidate = world.units.get(&unit)?;
        if candidate.team == Some(self.id) || !candidate.is_alive() || candidate.owner != self.house {
            return None;
        }
        if !candidate.mission.is_recruitable() {
            return None;
        }
        if let Some(other) = candidate.team.and_then(|t| world.teams.get(&t)) {
            let other_priority = world
                .team_types
                .get(other.type_index)
                .map_or(u8::MAX, |t| t.recruit_priority);
            if other_priority >= team_type.recruit_priority {
                return None;
            }
        }
        let slot = team_type
            .members
            .iter()
            .position(|m| m.unit_type == candidate.type_id)?;
        (self.quantity[slot] < team_type.members[slot].quantity).then_some(slot)
    }

    /// Take `unit` into the team, pulling it out of any lesser team.
    pub fn add(&mut self, unit: UnitId, world: &mut World) -> bool {
        let Some(slot) = self.can_add(unit, world) else {
            return false;
        };
        let previous = world.units.get(&unit).and_then(|u| u.team);
        if let Some(other) = previous.and_then(|t| world.teams.get_mut(&t)) {
            other.forget(unit, &world.team_types, world.units.get(&unit).map(|u| u.type_id));
        }
        if let Some(member) = world.units.get_mut(&unit) {
            member.team = Some(self.id);
            member.assign_target(Target::None);
        }
        self.members.push(unit);
        self.quantity[slot] += 1;
        self.is_altered = true;
        true
    }

    /// Drop `unit` from the team. Returns false if it was not a member.
    pub fn remove(&mut self, unit: UnitId, world: &mut World) -> bool {
        let type_id = world.units.get(&unit).map(|u| u.type_id);
        if !self.forget(unit, &world.team_types, type_id) {
            return false;
        }
        if let Some(member) = world.units.get_mut(&unit) {
            member.team = None;
            member.clear_formation();
        }
        true
    }

    /// Remove `unit` from the member lists only.
    pub(crate) fn forget(&mut self, unit: UnitId, team_types: &[TeamType], type_id: Option<u8>) -> bool {
        let Some(index) = self.members.iter().position(|&m| m == unit) else {
            return false;
        };
        self.members.remove(index);
        let slot = type_id.and_then(|t| {
            team_types
                .get(self.type_index)
                .and_then(|ty| ty.members.iter().position(|m| m.unit_type == t))
        });
        if let Some(count) = slot.and_then(|s| self.quantity.get_mut(s)) {
            *count = count.saturating_sub(1);
        }
        if self.closest_member == Some(unit) {
            self.closest_member = None;
        }
        self.is_altered = true;
        true
    }

    /// Recruit the eligible unit closest to the rally point for member
    /// slot `slot`. Returns the number of units added.
    pub fn recruit(&mut self, slot: usize, world: &mut World) -> usize {
        let Some(wanted) = world.team_types.get(self.type_index).and_then(|t| t.members.get(slot)) else {
            return 0;
        };
        if self.quantity.get(slot).copied().unwrap_or(u8::MAX) >= wanted.quantity {
            return 0;
        }
        let unit_type = wanted.unit_type;
        let center = world.target_coord(self.zone);

        let mut best: Option<(i32, UnitId)> = None;
        for (&id, unit) in &world.units {
            if unit.owner != self.house || unit.type_id != unit_type {
                continue;
            }
            let distance = center.map_or(0, |c| unit.coord.distance(c));
            if best.map_or(true, |(d, _)| distance < d) && self.can_add(id, world) == Some(slot) {
                best = Some((distance, id));
            }
        }
        match best {
            Some((_, id)) if self.add(id, world) => 1,
            _ => 0,
        }
    }

    /// Release every member.
    pub fn disband(&mut self, world: &mut World) {
        let is_suicide = world
            .team_types
            .get(self.type_index)
            .is_some_and(|t| t.is_suicide);
        for id in std::mem::take(&mut self.members) {
            if let Some(unit) = world.units.get_mut(&id) {
                unit.team = None;
                unit.clear_formation();
                if is_suicide {
                    unit.assign_mission(Mission::Hunt);
                }
            }
        }
        self.quantity.iter_mut().for_each(|q| *q = 0);
        tracing::debug!(team = self.id, "team disbanded");
    }

    /// Pause the team for `frames` frames.
    pub fn suspend(&mut self, frames: u32) {
        self.suspended = Some(frames);
    }

    /// Wake a suspended team.
    pub fn resume(&mut self) {
        self.suspended = None;
    }

    // ========================================================================
    // Coordination
    // ========================================================================

    /// Average member position as a cell, and the member nearest it.
    #[must_use]
    pub fn calc_center(&self, world: &World) -> (Target, Option<UnitId>) {
        let coords: Vec<(UnitId, Coord)> = self
            .members
            .iter()
            .filter_map(|id| world.units.get(id).map(|u| (*id, u.coord)))
            .collect();
        if coords.is_empty() {
            return (Target::None, None);
        }
        let count = i64::try_from(coords.len()).unwrap_or(1);
        let (sx, sy) = coords
            .iter()
            .fold((0i64, 0i64), |(x, y), (_, c)| (x + i64::from(c.x), y + i64::from(c.y)));
        let center = Coord::new(
            i32::try_from(sx / count).unwrap_or(0),
            i32::try_from(sy / count).unwrap_or(0),
        );
        let closest = coords
            .iter()
            .min_by_key(|(id, c)| (c.distance(center), *id))
            .map(|(id, _)| *id);
        (Target::Cell(center.cell()), closest)
    }

    /// Point the team at a new objective.
    pub fn assign_mission_target(&mut self, target: Target) {
        self.target = Target::None;
        self.mission_target = target;
    }

    /// Send stragglers to the objective and idle the ones that arrived.
    pub fn coordinate_move(&mut self, world: &mut World) {
        if !world.is_target_legal(self.target) {
            self.target = self.mission_target;
        }
        let Some(goal) = world.target_coord(self.target) else {
            self.is_next_mission = true;
            return;
        };

        let stray = world.rules.stray_distance;
        let mut finished = true;
        for &id in &self.members {
            let Some(unit) = world.units.get_mut(&id) else {
                continue;
            };
            if !unit.is_alive() {
                continue;
            }
            if unit.mission == Mission::Unload {
                finished = false;
                continue;
            }
            if unit.coord.distance(goal) > stray {
                if unit.mission != Mission::Move {
                    unit.assign_mission(Mission::Move);
                }
                if unit.nav_com != self.target {
                    unit.assign_destination(self.target);
                }
                finished = false;
            } else if unit.mission == Mission::Move
                && (!unit.nav_com.is_some() || unit.coord.distance(goal) < CELL_LEPTON_W)
            {
                unit.assign_destination(Target::None);
                unit.assign_mission(Mission::Guard);
            }
        }

        if finished && self.is_moving {
            self.is_next_mission = true;
        }
    }

    /// Pull members back to the rally point. Returns true once regrouped.
    pub fn coordinate_regroup(&mut self, world: &mut World) -> bool {
        let Some(zone) = world.target_coord(self.zone) else {
            return true;
        };
        let stray = world.rules.stray_distance;
        let mut regrouped = true;
        for &id in &self.members {
            let Some(unit) = world.units.get_mut(&id) else {
                continue;
            };
            if !unit.is_alive() {
                continue;
            }
            let engaged = unit.mission == Mission::GuardArea && unit.tar_com.is_some();
            if unit.coord.distance(zone) > stray && !engaged {
                if !unit.nav_com.is_some() {
                    unit.assign_mission(Mission::Move);
                    unit.assign_destination(self.zone);
                    if !unit.is_formation_move {
                        regrouped = false;
                    }
                }
            } else if unit.mission != Mission::GuardArea {
                unit.assign_mission(Mission::Guard);
                unit.assign_destination(Target::None);
            }
        }
        regrouped
    }

    /// Set every member on the team's target.
    pub fn coordinate_attack(&mut self, world: &mut World) {
        if !world.is_target_legal(self.target) {
            self.target = self.mission_target;
        }
        if let Target::Cell(cell) = self.target {
            self.target = world.object_at(cell);
        }
        if !world.is_target_legal(self.target) {
            self.is_next_mission = true;
            return;
        }
        for &id in &self.members {
            let Some(unit) = world.units.get_mut(&id) else {
                continue;
            };
            if !unit.is_alive() {
                continue;
            }
            if unit.mission != Mission::Attack {
                unit.assign_mission(Mission::Attack);
                unit.assign_target(Target::None);
                unit.assign_destination(Target::None);
            }
            if unit.tar_com != self.target {
                unit.assign_target(self.target);
            }
        }
    }

    /// Give members that are idle and close by the mission `mission`.
    fn coordinate_do(&mut self, mission: Mission, world: &mut World) {
        let stray = world.rules.stray_distance * 2;
        let zone = world.target_coord(self.zone);
        for &id in &self.members {
            let Some(unit) = world.units.get_mut(&id) else {
                continue;
            };
            if unit.tar_com.is_some() || unit.nav_com.is_some() {
                continue;
            }
            if zone.is_some_and(|z| unit.coord.distance(z) > stray) {
                unit.assign_mission(Mission::Move);
                unit.assign_destination(self.zone);
            } else if unit.mission != mission {
                unit.archive = Target::None;
                unit.assign_mission(mission);
                unit.assign_target(Target::None);
                unit.assign_destination(Target::None);
            }
        }
    }

    /// Put members into a tight formation at the pace of the slowest.
    fn set_formation(&mut self, enable: bool, world: &mut World) {
        let slowest = self
            .members
            .iter()
            .filter_map(|id| world.units.get(id))
            .filter_map(|u| u.type_data(&world.rules).map(|t| (t.max_speed, t.speed_class)))
            .min_by_key(|(speed, _)| *speed)
            .unwrap_or((0, SpeedClass::Track));
        for &id in &self.members {
            if let Some(unit) = world.units.get_mut(&id) {
                if enable {
                    unit.is_formation_move = true;
                    unit.formation_max_speed = slowest.0;
                    unit.formation_speed = slowest.1;
                } else {
                    unit.clear_formation();
                }
            }
        }
    }

    fn cell_argument(argument: i32, world: &World) -> Option<CellPos> {
        let width = world.map.width();
        (argument >= 0 && width > 0).then(|| CellPos::new(argument % width, argument / width))
    }

    fn waypoint(argument: i32, world: &World) -> Option<CellPos> {
        usize::try_from(argument)
            .ok()
            .and_then(|i| world.waypoints.get(i).copied())
    }

    /// Nearest enemy object to the team's rally point.
    fn nearest_enemy(&self, world: &World) -> Target {
        let center = world.target_coord(self.zone);
        combat::nearest_enemy(world, self.house, center)
    }

    /// Start mission `index` of the script.
    fn begin_mission(&mut self, entry: TeamMissionEntry, world: &mut World) {
        let per_tenth = world.rules.ticks_per_minute / 10;
        self.timeout = u32::try_from(entry.argument).unwrap_or(0).saturating_mul(per_tenth);
        self.target = Target::None;

        let mission_target = match entry.mission {
            TeamMission::MoveCell => Self::cell_argument(entry.argument, world).map(Target::Cell),
            TeamMission::Move => Self::waypoint(entry.argument, world).map(|cell| {
                let leader = self.members.first().and_then(|id| world.units.get(id));
                let cell = match leader {
                    Some(unit) => {
                        let speed = unit.speed_class(&world.rules);
                        if world.map.can_enter_cell(cell, unit.id, speed, &world.rules) == MoveResult::Ok {
                            cell
                        } else {
                            world
                                .map
                                .nearby_location(cell, unit.id, speed, &world.rules, NEARBY_RADIUS)
                                .unwrap_or(cell)
                        }
                    }
                    None => cell,
                };
                self.target = Target::Cell(cell);
                Target::Cell(cell)
            }),
            TeamMission::AttackWaypoint | TeamMission::Patrol | TeamMission::Spy => {
                Self::waypoint(entry.argument, world).map(Target::Cell)
            }
            TeamMission::AttackTarcom => Self::cell_argument(entry.argument, world).map(Target::Cell),
            _ => None,
        };
        self.assign_mission_target(mission_target.unwrap_or(Target::None));
        if entry.mission == TeamMission::Move {
            self.target = self.mission_target;
        }
    }

    /// Carry out the current mission for one frame.
    fn run_mission(&mut self, entry: TeamMissionEntry, world: &mut World) {
        match entry.mission {
            TeamMission::Move | TeamMission::MoveCell | TeamMission::Patrol => self.coordinate_move(world),
            TeamMission::Guard => {
                self.coordinate_regroup(world);
                if self.timeout == 0 {
                    self.is_next_mission = true;
                }
            }
            TeamMission::Attack | TeamMission::HoundDog => {
                if !world.is_target_legal(self.mission_target) {
                    let enemy = self.nearest_enemy(world);
                    self.assign_mission_target(enemy);
                }
                self.coordinate_attack(world);
            }
            TeamMission::AttackTarcom | TeamMission::AttackWaypoint | TeamMission::Spy => {
                if world.is_target_legal(self.mission_target) {
                    self.coordinate_attack(world);
                } else {
                    self.assign_mission_target(Target::None);
                    self.is_next_mission = true;
                }
            }
            TeamMission::Formation => {
                self.set_formation(entry.argument != 0, world);
                self.is_next_mission = true;
            }
            TeamMission::Loop => {
                self.current_mission = usize::try_from(entry.argument)
                    .ok()
                    .and_then(|i| i.checked_sub(1));
                self.is_next_mission = true;
            }
            TeamMission::Unload | TeamMission::Deploy => {
                for &id in &self.members {
                    if let Some(unit) = world.units.get_mut(&id) {
                        unit.assign_mission(Mission::Unload);
                    }
                }
                self.is_next_mission = true;
            }
            TeamMission::Do => {
                let mission = u8::try_from(entry.argument)
                    .ok()
                    .and_then(Mission::from_u8)
                    .unwrap_or(Mission::Guard);
                self.coordinate_do(mission, world);
            }
            TeamMission::SetGlobal => {
                world.globals.insert(entry.argument);
                self.is_next_mission = true;
            }
            TeamMission::Invulnerable | TeamMission::Load => {
                self.is_next_mission = true;
            }
        }
    }

    /// Re-evaluate strength after a membership change.
    ///
    /// Returns false if the team is empty and should disband.
    fn evaluate_strength(&mut self, desired: u32, is_reinforcable: bool) -> bool {
        let was_under = self.is_under_strength;
        let total = u32::try_from(self.members.len()).unwrap_or(u32::MAX);
        if total > 0 {
            self.is_full_strength = total == desired;
            if self.is_full_strength {
                self.is_has_been = true;
            }
            self.is_under_strength = if is_reinforcable {
                if desired > 2 {
                    total <= desired / 3
                } else {
                    total < desired
                }
            } else {
                !self.is_has_been
            };
            self.is_altered = false;
        } else {
            self.is_under_strength = true;
            self.is_full_strength = false;
            self.zone = Target::None;
            if self.is_has_been {
                return false;
            }
        }
        if was_under != self.is_under_strength {
            self.is_reforming = true;
        }
        true
    }

    /// One frame of team logic. Returns false when the team should disband.
    pub fn ai(&mut self, world: &mut World) -> bool {
        let Some(team_type) = world.team_types.get(self.type_index).cloned() else {
            return false;
        };

        if let Some(frames) = self.suspended {
            if frames > 0 {
                self.suspended = Some(frames - 1);
                return true;
            }
            self.suspended = None;
        }
        self.timeout = self.timeout.saturating_sub(1);

        if self.is_altered && !self.evaluate_strength(team_type.desired(), team_type.is_reinforcable) {
            return false;
        }

        if self.is_moving && self.is_under_strength {
            self.is_moving = false;
            self.current_mission = None;
            if self.members.is_empty() {
                self.zone = Target::None;
            } else {
                let (zone, closest) = self.calc_center(world);
                self.zone = zone;
                self.closest_member = closest;
                self.target = zone;
                self.coordinate_move(world);
                return true;
            }
        }

        if !self.is_moving && (self.is_full_strength || self.is_forced_active) {
            self.is_moving = true;
            self.is_has_been = true;
            self.is_under_strength = false;
            self.current_mission = None;
            self.is_next_mission = true;
        }

        if self.is_reforming || self.is_moving || !self.zone.is_some() || self.closest_member.is_none() {
            let (zone, closest) = self.calc_center(world);
            self.zone = zone;
            self.closest_member = closest;
        }

        let is_human = world.house(self.house).is_some_and(|h| h.is_human);
        if (!self.is_moving || (!self.is_full_strength && team_type.is_reinforcable))
            && (!is_human || !self.is_has_been)
        {
            for slot in 0..team_type.members.len() {
                if self.quantity.get(slot).copied().unwrap_or(0) < team_type.members[slot].quantity {
                    self.recruit(slot, world);
                }
            }
        }

        if self.members.is_empty() && self.is_has_been {
            return false;
        }

        if self.is_moving && !self.is_reforming && self.is_next_mission {
            self.is_next_mission = false;
            let next = self.current_mission.map_or(0, |i| i + 1);
            let Some(entry) = team_type.missions.get(next).copied() else {
                return false;
            };
            self.current_mission = Some(next);
            self.begin_mission(entry, world);
        }

        let current = self.current_mission.and_then(|i| team_type.missions.get(i).copied());
        match current {
            Some(entry) if !self.members.is_empty() && self.is_moving && !self.is_reforming && !self.is_under_strength => {
                if !world.is_target_legal(self.target) {
                    self.target = self.mission_target;
                }
                self.run_mission(entry, world);
            }
            _ => {
                if self.is_moving {
                    self.is_reforming = !self.coordinate_regroup(world);
                } else {
                    self.coordinate_move(world);
                }
            }
        }
        true
    }
}
