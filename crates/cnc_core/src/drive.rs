//! Track-following vehicle movement.
//!
//! A moving vehicle is always on exactly one track from [`crate::tracks`].
//! Each frame the throttle adds leptons to an accumulator and the unit
//! steps along the track ten leptons at a time. Crossing into a new cell
//! triggers per-cell processing, and a vehicle approaching a turn may jump
//! into the follow-on track without stopping.
//!
//! # Determinism
//!
//! Speeds are integers scaled by a 16.16 fraction and rounded once, and the
//! accumulator carries the remainder to the next frame, so two peers
//! walking the same unit produce identical positions every frame.

use serde::{Deserialize, Serialize};

use crate::config::Rules;
use crate::facing::Facing;
use crate::map::{Map, MoveResult};
use crate::math::{scale_int, speed_fraction, CellPos, Coord, Dir, PIXEL_LEPTON_W};
use crate::mission::Mission;
use crate::pathfinding::basic_path;
use crate::target::Target;
use crate::tracks::{track_number, transform_step, turn_track, TrackFlags, TrackStep};
use crate::unit::{Unit, UnitId, PATH_RETRY};

/// Cells searched around a teleport destination for open ground.
const TELEPORT_RADIUS: i32 = 8;

/// Track state of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DriveState {
    /// Track-control index, `None` when not on a track.
    pub track: Option<usize>,
    /// Step within the raw track.
    pub track_index: usize,
    /// Leptons carried over between frames.
    pub speed_accum: i32,
    /// Busy harvesting; may not drive.
    pub is_harvesting: bool,
    /// Deployed; may not drive and the turret stays put.
    pub is_turret_locked_down: bool,
    /// Walking the short start track instead of the full one.
    pub is_on_short_track: bool,
    /// Cell centre the current track ends at.
    pub head_to: Option<Coord>,
    /// Actively driving.
    pub is_driving: bool,
    /// Cell most recently reported to the per-cell observer.
    pub last_cell: Option<CellPos>,
}

/// Point on a track at which per-cell processing runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PerCell {
    /// The unit crossed into an intermediate cell mid-track.
    During,
    /// The unit finished a track at the centre of a cell.
    End,
}

/// One per-cell notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellVisit {
    /// Unit that moved.
    pub unit: UnitId,
    /// Cell it entered.
    pub cell: CellPos,
    /// Where on the track it happened.
    pub stage: PerCell,
}

/// Receives per-cell notifications from the drive logic.
pub trait CellObserver {
    /// Called once for every cell a unit enters.
    fn per_cell(&mut self, unit: UnitId, cell: CellPos, stage: PerCell);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl CellObserver for NullObserver {
    fn per_cell(&mut self, _unit: UnitId, _cell: CellPos, _stage: PerCell) {}
}

impl CellObserver for Vec<CellVisit> {
    fn per_cell(&mut self, unit: UnitId, cell: CellPos, stage: PerCell) {
        self.push(CellVisit { unit, cell, stage });
    }
}

/// Resolves targets to positions for the drive logic.
pub trait TargetResolver {
    /// Position of `target`, or `None` if it does not exist.
    fn target_coord(&self, target: Target) -> Option<Coord>;
}

/// Resolver that only knows about cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellTargets;

impl TargetResolver for CellTargets {
    fn target_coord(&self, target: Target) -> Option<Coord> {
        target.cell_coord()
    }
}

/// Everything outside the unit that driving touches.
pub struct DriveEnv<'a> {
    /// The map, for passability and occupancy.
    pub map: &'a mut Map,
    /// Game rules.
    pub rules: &'a Rules,
    /// Per-cell hook.
    pub observer: &'a mut dyn CellObserver,
    /// Target positions.
    pub targets: &'a dyn TargetResolver,
}

impl Unit {
    // ========================================================================
    // Driver control
    // ========================================================================

    /// Begin driving toward `head_to`, reserving the cells the track needs.
    ///
    /// Returns false if `head_to` lies off the map.
    pub fn start_driver(&mut self, head_to: Coord, map: &mut Map) -> bool {
        self.stop_driver(map);
        if !map.in_bounds(head_to.cell()) {
            return false;
        }
        self.drive.head_to = Some(head_to);
        self.drive.is_driving = true;
        self.mark_track(map, true);
        true
    }

    /// Stop driving and release any reserved cells.
    ///
    /// Returns true if the unit was heading somewhere.
    pub fn stop_driver(&mut self, map: &mut Map) -> bool {
        if self.drive.head_to.is_none() {
            return false;
        }
        self.mark_track(map, false);
        self.drive.head_to = None;
        self.speed = 0;
        self.drive.is_driving = false;
        true
    }

    /// Reserve or release the destination cell and, when the track has not
    /// yet reached it, the intermediate cell.
    fn mark_track(&self, map: &mut Map, reserve: bool) {
        let Some(head_to) = self.drive.head_to else {
            return;
        };
        let mut cells = vec![head_to.cell()];
        if !self.drive.is_on_short_track {
            let raw = self.drive.track.and_then(turn_track).and_then(|t| t.raw(false));
            if let Some((raw, cell_index)) = raw.and_then(|r| r.cell.map(|c| (r, c))) {
                if self.drive.track_index < cell_index {
                    if let Some(step) = raw.steps.get(cell_index) {
                        let mut dir = step.facing;
                        cells.push(self.smooth_turn(step, &mut dir).cell());
                    }
                }
            }
        }
        for cell in cells {
            if reserve {
                map.reserve(cell, self.id);
            } else {
                map.release(cell, self.id);
            }
        }
    }

    /// Put the unit on `track` from its start, optionally driving toward
    /// `head_to`.
    pub fn force_track(&mut self, track: Option<usize>, head_to: Option<Coord>, map: &mut Map) {
        self.drive.track = track;
        self.drive.track_index = 0;
        if let Some(coord) = head_to {
            self.start_driver(coord, map);
        }
    }

    /// Whether the unit is allowed to start moving.
    #[must_use]
    pub const fn ok_to_move(&self) -> bool {
        !self.drive.is_turret_locked_down && !self.drive.is_harvesting
    }

    /// Rotate in place toward `dir`.
    pub fn do_turn(&mut self, dir: Dir) {
        if dir != self.primary_facing.current() {
            self.primary_facing.set_desired(dir);
        }
    }

    /// Set the navigation target, discarding the planned path.
    pub fn assign_destination(&mut self, target: Target) {
        if target == self.nav_com {
            return;
        }
        self.nav_com = target;
        self.path.clear();
        self.try_again = PATH_RETRY;
    }

    /// Move instantly to `cell`, or the nearest open cell to it.
    ///
    /// Returns false if no open cell was found nearby.
    pub fn teleport_to(&mut self, cell: CellPos, env: &mut DriveEnv<'_>) -> bool {
        self.stop_driver(env.map);
        self.force_track(None, None, env.map);
        self.primary_facing.set(self.primary_facing.desired());
        self.assign_destination(Target::None);
        self.assign_target(Target::None);
        self.assign_mission(Mission::Guard);

        let speed = self.speed_class(env.rules);
        let Some(cell) = env.map.nearby_location(cell, self.id, speed, env.rules, TELEPORT_RADIUS) else {
            return false;
        };
        self.coord = cell.center();
        self.per_cell_process(PerCell::End, env);
        true
    }

    // ========================================================================
    // Track walking
    // ========================================================================

    /// Transform a raw track step for the current track and return the
    /// resulting coordinate. `dir` is transformed in place.
    #[must_use]
    pub fn smooth_turn(&self, step: &TrackStep, dir: &mut Dir) -> Coord {
        let flags = self
            .drive
            .track
            .and_then(turn_track)
            .map_or(TrackFlags::empty(), |t| t.flags);
        let (x, y, turned) = transform_step(step.x, step.y, *dir, flags);
        *dir = turned;
        self.drive.head_to.unwrap_or(self.coord).offset(x, y)
    }

    /// Advance along the current track for one frame.
    ///
    /// Returns false if the unit was not driving.
    pub fn while_moving(&mut self, env: &mut DriveEnv<'_>) -> bool {
        let is_turret = self.type_data(env.rules).is_some_and(|t| t.is_turret);
        let Some(track_no) = self.drive.track else {
            self.drive.speed_accum = 0;
            return false;
        };
        if !self.drive.is_driving || (self.primary_facing.is_rotating() && !is_turret) {
            self.drive.speed_accum = 0;
            return false;
        }

        let max_speed = u32::from(self.max_speed(env.rules));
        let gain = i32::try_from(scale_int(max_speed, speed_fraction(self.speed))).unwrap_or(i32::MAX);
        let mut actual = self.drive.speed_accum.saturating_add(gain);
        if actual <= PIXEL_LEPTON_W {
            self.drive.speed_accum = actual;
            return true;
        }

        let (mut control, mut raw) = match turn_track(track_no)
            .and_then(|t| t.raw(self.drive.is_on_short_track).map(|r| (t, r)))
        {
            Some(pair) => pair,
            None => {
                #[cfg(debug_assertions)]
                tracing::warn!(unit = self.id, track = track_no, "unit on a track with no raw data");
                self.stop_driver(env.map);
                self.drive.track = None;
                self.drive.speed_accum = 0;
                return false;
            }
        };
        let next_face = self.path.first().copied();
        let mut adj = next_face.is_some_and(|f| control.facing.to_facing8() != f);
        let speed_class = self.speed_class(env.rules);

        while actual > PIXEL_LEPTON_W {
            actual -= PIXEL_LEPTON_W;
            let index = self.drive.track_index;
            let step = raw.steps.get(index).copied().unwrap_or(TrackStep {
                x: 0,
                y: 0,
                facing: Dir::N,
            });

            if !step.is_zero() || index == 0 {
                let mut dir = step.facing;
                self.coord = self.smooth_turn(&step, &mut dir);
                self.primary_facing.set(dir);

                if index != 0 && raw.cell == Some(index) {
                    self.per_cell_process(PerCell::During, env);
                }

                // Jump into the follow-on track when a turn is coming up.
                if let Some(face) = next_face.filter(|_| adj && index != 0 && raw.jump == Some(index)) {
                    let number = track_number(control.facing.to_facing8(), face);
                    let jump = turn_track(number)
                        .filter(|t| t.exists())
                        .and_then(|t| t.raw(false).map(|r| (t, r)))
                        .and_then(|(t, r)| r.entry.filter(|&e| e > 0).map(|e| (t, r, e)));
                    if let Some((new_control, new_raw, entry)) = jump {
                        let head_to = self.drive.head_to.unwrap_or(self.coord);
                        let next = head_to.adjacent(face);
                        if env.map.can_enter_cell(next.cell(), self.id, speed_class, env.rules) == MoveResult::Ok {
                            self.drive.is_on_short_track = false;
                            self.drive.track = Some(number);
                            control = new_control;
                            raw = new_raw;
                            // The increment below lands on the entry step.
                            self.drive.track_index = entry - 1;
                            adj = false;

                            let old_speed = self.speed;
                            self.stop_driver(env.map);
                            self.drive.is_driving = true;
                            self.per_cell_process(PerCell::End, env);
                            self.drive.is_driving = false;
                            if self.start_driver(next, env.map) {
                                self.speed = old_speed;
                                if !self.path.is_empty() {
                                    self.path.remove(0);
                                }
                            } else {
                                self.path.clear();
                                self.drive.track = None;
                                actual = 0;
                            }
                        }
                    }
                }
                self.drive.track_index += 1;
            } else {
                actual = 0;
                if let Some(head_to) = self.drive.head_to {
                    self.coord = head_to;
                }
                self.stop_driver(env.map);
                self.drive.track = None;
                self.drive.track_index = 0;
                self.per_cell_process(PerCell::End, env);
                break;
            }
        }

        self.drive.speed_accum = actual;
        true
    }

    /// Pick the next track from the path, planning a new path if needed.
    ///
    /// Returns true if the unit should be processed again before moving,
    /// such as when it first has to turn or the way is blocked.
    pub fn start_of_move(&mut self, env: &mut DriveEnv<'_>) -> bool {
        if !self.nav_com.is_some() && self.path.is_empty() {
            self.drive.is_turret_locked_down = false;
            self.stop_driver(env.map);
            if self.mission == Mission::Move {
                self.assign_mission(Mission::Guard);
            }
            return false;
        }

        let speed_class = self.speed_class(env.rules);
        let nav = env.targets.target_coord(self.nav_com);

        if self.path.is_empty() {
            let planned = nav.and_then(|dest| {
                let map = &*env.map;
                let rules = env.rules;
                let id = self.id;
                basic_path(self.cell(), dest.cell(), |cell| {
                    matches!(
                        map.can_enter_cell(cell, id, speed_class, rules),
                        MoveResult::Ok | MoveResult::Temp | MoveResult::MovingBlock
                    )
                })
            });

            match planned {
                Some(path) if !path.is_empty() => {
                    self.path = path;
                    self.try_again = PATH_RETRY;
                }
                _ => {
                    let close = nav.map_or(true, |d| self.coord.distance(d) < env.rules.close_enough_distance);
                    if close && matches!(self.mission, Mission::Move | Mission::GuardArea) {
                        self.assign_destination(Target::None);
                    } else {
                        self.try_again = self.try_again.saturating_sub(1);
                        if self.try_again == 0 {
                            self.assign_destination(Target::None);
                        }
                    }
                    self.stop_driver(env.map);
                    self.drive.track = None;
                    self.drive.is_turret_locked_down = false;
                    return false;
                }
            }
        }

        let facing = self.path[0];
        let mut dest = self.coord.snap().adjacent(facing);
        let dir = facing.to_dir();

        if self.primary_facing.difference_to(dir) != 0 {
            self.do_turn(dir);
            return true;
        }

        let dest_cell = dest.cell();
        let cando = env.map.can_enter_cell(dest_cell, self.id, speed_class, env.rules);
        if cando != MoveResult::Ok {
            if self.mission == Mission::Move
                && nav.is_some_and(|d| self.coord.distance(d) < env.rules.close_enough_distance)
            {
                self.assign_destination(Target::None);
            }
            self.stop_driver(env.map);
            if cando != MoveResult::MovingBlock {
                self.path.clear();
            }
            if cando == MoveResult::Destroyable {
                self.attack_wall(dest_cell, env.rules);
            }
            self.drive.track = None;
            return true;
        }

        let land = env.map.land(dest_cell).unwrap_or_default();
        let cost = env.rules.ground_cost(land, speed_class);
        let mut speed = u8::try_from(scale_int(255, cost)).unwrap_or(u8::MAX);
        if speed == 0 {
            speed = 128;
        }
        if self.health_ratio(env.rules) <= env.rules.condition_yellow() {
            speed -= speed / 4;
        }
        self.speed = speed;

        let next_face = self.path.get(1).copied().unwrap_or(facing);
        self.drive.is_on_short_track = false;
        let number = track_number(facing, next_face);
        let Some(control) = turn_track(number).filter(|t| t.exists()) else {
            #[cfg(debug_assertions)]
            tracing::warn!(unit = self.id, track = number, "no track for turn, rotating in place");
            self.path.clear();
            self.drive.track = None;
            return true;
        };
        self.drive.track = Some(number);

        if control.is_double() {
            dest = dest.adjacent(next_face);
            let far_cell = dest.cell();
            let cando = env.map.can_enter_cell(far_cell, self.id, speed_class, env.rules);
            if cando != MoveResult::Ok {
                self.path.clear();
                self.drive.track = None;
                self.drive.track_index = 0;
                if cando == MoveResult::Destroyable {
                    self.attack_wall(far_cell, env.rules);
                }
                return true;
            }
            self.path.drain(..2.min(self.path.len()));
        } else {
            self.path.remove(0);
        }

        self.drive.track_index = 0;
        if !self.start_driver(dest, env.map) {
            self.drive.track = None;
            self.path.clear();
            self.speed = 0;
        }
        false
    }

    /// Turn a blocking wall into an attack target, if the unit can shoot.
    fn attack_wall(&mut self, cell: CellPos, rules: &Rules) {
        if self.is_armed(rules) {
            self.override_mission(Mission::Attack, Target::Cell(cell));
        }
    }

    /// Update occupancy for the cell the unit is in and run per-cell logic.
    ///
    /// The observer hears about each cell entered once. A jump out of a
    /// two-cell track happens inside the cell already reported mid-track,
    /// so the end-of-cell pass there runs without a second notification.
    pub fn per_cell_process(&mut self, stage: PerCell, env: &mut DriveEnv<'_>) {
        let cell = self.cell();
        match self.occupied {
            Some(previous) => env.map.move_occupant(self.id, previous, cell),
            None => env.map.occupy(cell, self.id),
        }
        self.occupied = Some(cell);
        let is_repeat = self.drive.last_cell == Some(cell);
        self.drive.last_cell = Some(cell);

        if stage == PerCell::End {
            if env.targets.target_coord(self.nav_com).is_some_and(|d| d.cell() == cell) {
                self.drive.is_turret_locked_down = false;
                self.assign_destination(Target::None);
            }
            if matches!(self.mission, Mission::GuardArea | Mission::Attack | Mission::Hunt)
                && env
                    .targets
                    .target_coord(self.tar_com)
                    .is_some_and(|t| self.in_range(t, env.rules))
            {
                self.assign_destination(Target::None);
            }
        }

        if !is_repeat {
            env.observer.per_cell(self.id, cell, stage);
        }
    }

    /// One frame of movement and body rotation.
    pub fn drive_ai(&mut self, env: &mut DriveEnv<'_>) {
        if self.drive.track.is_some() {
            self.while_moving(env);
            if self.drive.track.is_none() && (self.nav_com.is_some() || !self.path.is_empty()) {
                self.start_of_move(env);
                self.while_moving(env);
            }
            return;
        }

        if self.primary_facing.is_rotating() {
            let rot = self.type_data(env.rules).map_or(Facing::MAX_RATE, |t| t.rot);
            self.primary_facing.rotation_adjust(rot);
            return;
        }

        if (self.mission != Mission::Guard || self.nav_com.is_some()) && self.mission != Mission::Unload {
            if !self.ok_to_move() {
                return;
            }
            if self.nav_com.is_some() || !self.path.is_empty() {
                self.start_of_move(env);
                self.while_moving(env);
            } else {
                self.stop_driver(env.map);
            }
        }
    }
}
