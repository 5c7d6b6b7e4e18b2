//! Ground vehicles.
//!
//! A [`Unit`] carries everything the simulation needs to drive, aim and
//! fight. Movement along tracks lives in [`crate::drive`]; target selection
//! and firing in [`crate::combat`].

use serde::{Deserialize, Serialize};

use crate::config::Rules;
use crate::data::{SpeedClass, UnitTypeData};
use crate::drive::DriveState;
use crate::facing::Facing;
use crate::house::HouseId;
use crate::math::{fixed_ratio, CellPos, Coord, Dir, FacingType, Fixed};
use crate::mission::Mission;
use crate::target::Target;
use crate::team::TeamId;

/// Unique, never reused identifier of a unit.
pub type UnitId = u32;

/// Frames a unit keeps retrying a failed path before giving up.
pub const PATH_RETRY: u8 = 10;

/// A vehicle on the map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    /// Identifier.
    pub id: UnitId,
    /// Owning house.
    pub owner: HouseId,
    /// Index into [`Rules::unit_types`].
    pub type_id: u8,
    /// Position in leptons.
    pub coord: Coord,
    /// Cell this unit is registered as occupying on the map.
    pub occupied: Option<CellPos>,
    /// Hit points left.
    pub strength: u16,
    /// Current standing order.
    pub mission: Mission,
    /// Mission to return to once an override finishes.
    pub suspended_mission: Option<Mission>,
    /// Where the unit is driving to.
    pub nav_com: Target,
    /// Destinations queued behind `nav_com`.
    pub nav_queue: Vec<Target>,
    /// What the unit is shooting at.
    pub tar_com: Target,
    /// Remembered location, such as the post of a guard-area mission.
    pub archive: Target,
    /// Facings still to drive, at most [`crate::pathfinding::PATH_MAX`].
    pub path: Vec<FacingType>,
    /// Team this unit is a member of.
    pub team: Option<TeamId>,
    /// Track-following state.
    pub drive: DriveState,
    /// Body facing.
    pub primary_facing: Facing,
    /// Turret facing.
    pub secondary_facing: Facing,
    /// Throttle, 0 to 255 of the maximum speed.
    pub speed: u8,
    /// Moving as part of a formation.
    pub is_formation_move: bool,
    /// Speed class every formation member drives at.
    pub formation_speed: SpeedClass,
    /// Top speed every formation member drives at.
    pub formation_max_speed: u8,
    /// Frames until the weapon can fire again.
    pub arm: u16,
    /// Path failures left before the destination is dropped.
    pub try_again: u8,
}

impl Unit {
    /// Create a unit resting at the centre of `cell`.
    #[must_use]
    pub fn new(id: UnitId, owner: HouseId, type_id: u8, cell: CellPos, facing: Dir, strength: u16) -> Self {
        Self {
            id,
            owner,
            type_id,
            coord: cell.center(),
            occupied: None,
            strength,
            mission: Mission::Guard,
            suspended_mission: None,
            nav_com: Target::None,
            nav_queue: Vec::new(),
            tar_com: Target::None,
            archive: Target::None,
            path: Vec::new(),
            team: None,
            drive: DriveState::default(),
            primary_facing: Facing::new(facing),
            secondary_facing: Facing::new(facing),
            speed: 0,
            is_formation_move: false,
            formation_speed: SpeedClass::Track,
            formation_max_speed: 0,
            arm: 0,
            try_again: PATH_RETRY,
        }
    }

    /// Type data from the rules.
    #[must_use]
    pub fn type_data<'r>(&self, rules: &'r Rules) -> Option<&'r UnitTypeData> {
        rules.unit_type(self.type_id)
    }

    /// Whether the unit still has hit points.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.strength > 0
    }

    /// Cell the unit is in.
    #[must_use]
    pub const fn cell(&self) -> CellPos {
        self.coord.cell()
    }

    /// Remaining strength as a fraction of full.
    #[must_use]
    pub fn health_ratio(&self, rules: &Rules) -> Fixed {
        let max = self.type_data(rules).map_or(1, |t| t.strength);
        fixed_ratio(u32::from(self.strength), u32::from(max))
    }

    /// Movement class used for terrain costs and passability.
    #[must_use]
    pub fn speed_class(&self, rules: &Rules) -> SpeedClass {
        if self.is_formation_move {
            return self.formation_speed;
        }
        self.type_data(rules).map_or(SpeedClass::Track, |t| t.speed_class)
    }

    /// Top speed in leptons per frame.
    #[must_use]
    pub fn max_speed(&self, rules: &Rules) -> u8 {
        if self.is_formation_move {
            return self.formation_max_speed;
        }
        self.type_data(rules).map_or(0, |t| t.max_speed)
    }

    /// Whether the unit can damage anything.
    #[must_use]
    pub fn is_armed(&self, rules: &Rules) -> bool {
        self.type_data(rules).is_some_and(|t| t.weapon.is_some())
    }

    /// Weapon range in leptons, zero when unarmed.
    #[must_use]
    pub fn weapon_range(&self, rules: &Rules) -> i32 {
        self.type_data(rules)
            .and_then(|t| t.weapon.as_ref())
            .map_or(0, |w| w.range)
    }

    /// Whether a target at `coord` is within weapon range.
    #[must_use]
    pub fn in_range(&self, coord: Coord, rules: &Rules) -> bool {
        self.is_armed(rules) && self.coord.distance(coord) <= self.weapon_range(rules)
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// Replace the mission, dropping any suspended one.
    pub fn assign_mission(&mut self, mission: Mission) {
        self.mission = mission;
        self.suspended_mission = None;
    }

    /// Temporarily switch mission, remembering the current one.
    pub fn override_mission(&mut self, mission: Mission, target: Target) {
        if self.suspended_mission.is_none() {
            self.suspended_mission = Some(self.mission);
        }
        self.mission = mission;
        self.tar_com = target;
    }

    /// Return to the mission that was active before an override.
    ///
    /// Returns true if there was one.
    pub fn restore_mission(&mut self) -> bool {
        match self.suspended_mission.take() {
            Some(mission) => {
                self.mission = mission;
                true
            }
            None => false,
        }
    }

    /// Set the attack target.
    pub fn assign_target(&mut self, target: Target) {
        self.tar_com = target;
    }

    /// Leave formation movement.
    pub fn clear_formation(&mut self) {
        self.is_formation_move = false;
        self.formation_max_speed = 0;
    }

    /// Point the turret for this frame.
    ///
    /// A turret tracks `aim` when given and otherwise follows the body.
    /// Units without a turret keep the secondary facing locked to the body.
    pub fn turret_ai(&mut self, aim: Option<Coord>, rules: &Rules) {
        let Some(data) = self.type_data(rules) else {
            return;
        };
        if !data.is_turret {
            self.secondary_facing.set(self.primary_facing.current());
            return;
        }
        let rot = data.rot;
        let desired = match aim {
            Some(coord) if !self.drive.is_turret_locked_down => {
                crate::facing::desired_facing256(self.coord.x, self.coord.y, coord.x, coord.y)
            }
            _ => self.primary_facing.current(),
        };
        self.secondary_facing.set_desired(desired);
        self.secondary_facing.rotation_adjust(rot);
    }

    /// Whether the weapon is pointed at `coord` and ready.
    #[must_use]
    pub fn can_fire_at(&self, coord: Coord, rules: &Rules) -> bool {
        if self.arm > 0 || !self.in_range(coord, rules) {
            return false;
        }
        let is_turret = self.type_data(rules).is_some_and(|t| t.is_turret);
        if is_turret {
            !self.secondary_facing.is_rotating()
        } else {
            !self.primary_facing.is_rotating()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tank() -> Unit {
        Unit::new(1, 0, 1, CellPos::new(4, 4), Dir::N, 300)
    }

    #[test]
    fn test_new_unit_rests_on_cell_centre() {
        let unit = tank();
        assert_eq!(unit.coord, CellPos::new(4, 4).center());
        assert_eq!(unit.cell(), CellPos::new(4, 4));
        assert_eq!(unit.mission, Mission::Guard);
        assert!(unit.is_alive());
    }

    #[test]
    fn test_health_ratio() {
        let rules = Rules::default();
        let mut unit = tank();
        assert_eq!(unit.health_ratio(&rules), Fixed::ONE);
        unit.strength = 150;
        assert!(unit.health_ratio(&rules) <= rules.condition_yellow());
    }

    #[test]
    fn test_override_and_restore() {
        let mut unit = tank();
        unit.override_mission(Mission::Attack, Target::Cell(CellPos::new(5, 4)));
        unit.override_mission(Mission::Attack, Target::Unit(9));
        assert_eq!(unit.tar_com, Target::Unit(9));
        assert!(unit.restore_mission());
        assert_eq!(unit.mission, Mission::Guard);
        assert!(!unit.restore_mission());
    }

    #[test]
    fn test_formation_overrides_speed() {
        let rules = Rules::default();
        let mut unit = tank();
        assert_eq!(unit.max_speed(&rules), 18);
        unit.is_formation_move = true;
        unit.formation_max_speed = 12;
        unit.formation_speed = SpeedClass::Wheel;
        assert_eq!(unit.max_speed(&rules), 12);
        assert_eq!(unit.speed_class(&rules), SpeedClass::Wheel);
        unit.clear_formation();
        assert_eq!(unit.speed_class(&rules), SpeedClass::Track);
    }

    #[test]
    fn test_turret_tracks_target() {
        let rules = Rules::default();
        let mut unit = tank();
        let east = unit.coord.offset(512, 0);
        for _ in 0..20 {
            unit.turret_ai(Some(east), &rules);
        }
        assert_eq!(unit.secondary_facing.current(), Dir::E);
        assert_eq!(unit.primary_facing.current(), Dir::N);
        assert!(unit.can_fire_at(east, &rules));
    }

    #[test]
    fn test_unarmed_cannot_fire() {
        let rules = Rules::default();
        let unit = Unit::new(2, 0, 0, CellPos::new(1, 1), Dir::N, 600);
        assert!(!unit.is_armed(&rules));
        assert!(!unit.can_fire_at(unit.coord, &rules));
    }
}
