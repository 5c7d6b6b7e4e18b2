//! The cell map: terrain, occupancy and movement legality.
//!
//! Occupancy is tracked per cell. A unit at rest is the cell's `occupant`;
//! a unit driving toward a cell holds it as `incoming` until it arrives.
//! Both are replicated state and feed the frame checksum.

use serde::{Deserialize, Serialize};

use crate::building::BuildingId;
use crate::config::Rules;
use crate::data::SpeedClass;
use crate::house::HouseId;
use crate::math::{CellPos, FacingType};
use crate::unit::UnitId;

/// Terrain type of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LandType {
    /// Open ground.
    #[default]
    Clear,
    /// Paved road.
    Road,
    /// Broken ground.
    Rough,
    /// Open water.
    Water,
    /// Impassable rock.
    Rock,
    /// Wall overlay terrain.
    Wall,
    /// Ore field.
    Ore,
    /// Sandy shore.
    Beach,
    /// River.
    River,
}

/// A wall segment overlaid on a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Wall {
    /// House that built the wall.
    pub owner: HouseId,
    /// Remaining strength.
    pub strength: u16,
}

/// Everything the simulation knows about one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CellData {
    /// Terrain.
    pub land: LandType,
    /// Unit standing in the cell.
    pub occupant: Option<UnitId>,
    /// Unit driving into the cell.
    pub incoming: Option<UnitId>,
    /// Building covering the cell.
    pub building: Option<BuildingId>,
    /// Wall overlay.
    pub wall: Option<Wall>,
}

/// Outcome of asking whether a unit may enter a cell.
///
/// Ordered from most to least permissive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MoveResult {
    /// The cell is free.
    Ok,
    /// Another unit is driving into the cell; wait for it.
    MovingBlock,
    /// A wall blocks the cell but can be destroyed.
    Destroyable,
    /// Another unit stands in the cell.
    Temp,
    /// The cell can never be entered.
    No,
}

/// Rectangular cell map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Map {
    width: i32,
    height: i32,
    cells: Vec<CellData>,
}

impl Map {
    /// Create a map of clear cells.
    ///
    /// Non-positive dimensions produce an empty map in which every cell is
    /// out of bounds.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            cells: vec![CellData::default(); (width as usize) * (height as usize)],
        }
    }

    /// Width in cells.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Height in cells.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Whether a cell lies on the map.
    #[must_use]
    pub const fn in_bounds(&self, cell: CellPos) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height
    }

    fn index(&self, cell: CellPos) -> Option<usize> {
        if self.in_bounds(cell) {
            Some((cell.y as usize) * (self.width as usize) + (cell.x as usize))
        } else {
            None
        }
    }

    /// Cell data, if on the map.
    #[must_use]
    pub fn cell(&self, cell: CellPos) -> Option<&CellData> {
        self.index(cell).map(|i| &self.cells[i])
    }

    /// Mutable cell data, if on the map.
    pub fn cell_mut(&mut self, cell: CellPos) -> Option<&mut CellData> {
        self.index(cell).map(|i| &mut self.cells[i])
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &CellData> {
        self.cells.iter()
    }

    /// Terrain of a cell.
    #[must_use]
    pub fn land(&self, cell: CellPos) -> Option<LandType> {
        self.cell(cell).map(|c| c.land)
    }

    /// Set the terrain of a cell. Returns false if off the map.
    pub fn set_land(&mut self, cell: CellPos, land: LandType) -> bool {
        match self.cell_mut(cell) {
            Some(data) => {
                data.land = land;
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Movement legality
    // ========================================================================

    /// Whether `mover` may drive into `cell`.
    ///
    /// The mover's own occupancy and reservation are ignored.
    #[must_use]
    pub fn can_enter_cell(
        &self,
        cell: CellPos,
        mover: UnitId,
        speed: SpeedClass,
        rules: &Rules,
    ) -> MoveResult {
        let Some(data) = self.cell(cell) else {
            return MoveResult::No;
        };
        if data.building.is_some() {
            return MoveResult::No;
        }
        if data.wall.is_some() {
            return MoveResult::Destroyable;
        }
        if !rules.is_passable(data.land, speed) {
            return MoveResult::No;
        }
        if data.incoming.is_some_and(|id| id != mover) {
            return MoveResult::MovingBlock;
        }
        if data.occupant.is_some_and(|id| id != mover) {
            return MoveResult::Temp;
        }
        MoveResult::Ok
    }

    /// Nearest cell to `cell` that `mover` may enter, searching outward in
    /// square rings up to `radius`.
    #[must_use]
    pub fn nearby_location(
        &self,
        cell: CellPos,
        mover: UnitId,
        speed: SpeedClass,
        rules: &Rules,
        radius: i32,
    ) -> Option<CellPos> {
        for ring in 0..=radius {
            for dy in -ring..=ring {
                for dx in -ring..=ring {
                    if dx.abs() != ring && dy.abs() != ring {
                        continue;
                    }
                    let candidate = CellPos::new(cell.x + dx, cell.y + dy);
                    if self.can_enter_cell(candidate, mover, speed, rules) == MoveResult::Ok {
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }

    /// Adjacent cells `mover` may enter, in facing order starting at `first`.
    #[must_use]
    pub fn open_neighbours(
        &self,
        cell: CellPos,
        first: FacingType,
        mover: UnitId,
        speed: SpeedClass,
        rules: &Rules,
    ) -> Vec<CellPos> {
        (0..8u8)
            .map(|step| cell.adjacent(FacingType::from_index(first.index() + step)))
            .filter(|&c| self.can_enter_cell(c, mover, speed, rules) == MoveResult::Ok)
            .collect()
    }

    // ========================================================================
    // Occupancy
    // ========================================================================

    /// Make `unit` the occupant of `cell`.
    pub fn occupy(&mut self, cell: CellPos, unit: UnitId) {
        if let Some(data) = self.cell_mut(cell) {
            data.occupant = Some(unit);
            if data.incoming == Some(unit) {
                data.incoming = None;
            }
        }
    }

    /// Clear `unit` from `cell`, both as occupant and as incoming.
    pub fn vacate(&mut self, cell: CellPos, unit: UnitId) {
        if let Some(data) = self.cell_mut(cell) {
            if data.occupant == Some(unit) {
                data.occupant = None;
            }
            if data.incoming == Some(unit) {
                data.incoming = None;
            }
        }
    }

    /// Reserve `cell` for a unit driving into it.
    ///
    /// An existing reservation by another unit is left alone.
    pub fn reserve(&mut self, cell: CellPos, unit: UnitId) {
        if let Some(data) = self.cell_mut(cell) {
            if data.incoming.is_none() {
                data.incoming = Some(unit);
            }
        }
    }

    /// Drop `unit`'s reservation of `cell`.
    pub fn release(&mut self, cell: CellPos, unit: UnitId) {
        if let Some(data) = self.cell_mut(cell) {
            if data.incoming == Some(unit) {
                data.incoming = None;
            }
        }
    }

    /// Move `unit`'s occupancy from one cell to another.
    pub fn move_occupant(&mut self, unit: UnitId, from: CellPos, to: CellPos) {
        if from == to {
            self.occupy(to, unit);
            return;
        }
        if let Some(data) = self.cell_mut(from) {
            if data.occupant == Some(unit) {
                data.occupant = None;
            }
        }
        self.occupy(to, unit);
    }

    // ========================================================================
    // Buildings and walls
    // ========================================================================

    /// Whether a `width` x `height` footprint at `origin` is on buildable,
    /// empty ground.
    #[must_use]
    pub fn can_place(&self, origin: CellPos, width: u8, height: u8, rules: &Rules) -> bool {
        footprint(origin, width, height).all(|cell| {
            self.cell(cell).is_some_and(|data| {
                rules.is_buildable(data.land)
                    && data.building.is_none()
                    && data.wall.is_none()
                    && data.occupant.is_none()
                    && data.incoming.is_none()
            })
        })
    }

    /// Mark a footprint as covered by `building`.
    pub fn place_building(&mut self, building: BuildingId, origin: CellPos, width: u8, height: u8) {
        for cell in footprint(origin, width, height) {
            if let Some(data) = self.cell_mut(cell) {
                data.building = Some(building);
            }
        }
    }

    /// Clear `building` from a footprint.
    pub fn remove_building(&mut self, building: BuildingId, origin: CellPos, width: u8, height: u8) {
        for cell in footprint(origin, width, height) {
            if let Some(data) = self.cell_mut(cell) {
                if data.building == Some(building) {
                    data.building = None;
                }
            }
        }
    }

    /// Put a wall on a cell. Returns false if off the map.
    pub fn place_wall(&mut self, cell: CellPos, owner: HouseId, strength: u16) -> bool {
        match self.cell_mut(cell) {
            Some(data) => {
                data.wall = Some(Wall { owner, strength });
                true
            }
            None => false,
        }
    }

    /// Remove and return the wall on a cell.
    pub fn remove_wall(&mut self, cell: CellPos) -> Option<Wall> {
        self.cell_mut(cell).and_then(|data| data.wall.take())
    }

    /// Damage a wall, removing it at zero strength. Returns true if the wall
    /// was destroyed.
    pub fn damage_wall(&mut self, cell: CellPos, damage: u16) -> bool {
        let Some(data) = self.cell_mut(cell) else {
            return false;
        };
        let Some(wall) = data.wall.as_mut() else {
            return false;
        };
        wall.strength = wall.strength.saturating_sub(damage);
        if wall.strength == 0 {
            data.wall = None;
            true
        } else {
            false
        }
    }
}

/// Cells of a `width` x `height` footprint at `origin`.
pub fn footprint(origin: CellPos, width: u8, height: u8) -> impl Iterator<Item = CellPos> {
    (0..i32::from(height)).flat_map(move |dy| {
        (0..i32::from(width)).map(move |dx| CellPos::new(origin.x + dx, origin.y + dy))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let map = Map::new(4, 3);
        assert!(map.in_bounds(CellPos::new(3, 2)));
        assert!(!map.in_bounds(CellPos::new(4, 0)));
        assert!(!map.in_bounds(CellPos::new(-1, 0)));
        assert!(map.cell(CellPos::new(0, 3)).is_none());
        assert_eq!(map.cells().count(), 12);
    }

    #[test]
    fn test_can_enter_results() {
        let rules = Rules::default();
        let mut map = Map::new(8, 8);
        let track = SpeedClass::Track;
        let cell = CellPos::new(2, 2);

        assert_eq!(map.can_enter_cell(cell, 1, track, &rules), MoveResult::Ok);
        assert_eq!(
            map.can_enter_cell(CellPos::new(9, 0), 1, track, &rules),
            MoveResult::No
        );

        map.occupy(cell, 2);
        assert_eq!(map.can_enter_cell(cell, 1, track, &rules), MoveResult::Temp);
        assert_eq!(map.can_enter_cell(cell, 2, track, &rules), MoveResult::Ok);
        map.vacate(cell, 2);

        map.reserve(cell, 3);
        assert_eq!(
            map.can_enter_cell(cell, 1, track, &rules),
            MoveResult::MovingBlock
        );
        map.release(cell, 3);

        map.place_wall(cell, 0, 10);
        assert_eq!(
            map.can_enter_cell(cell, 1, track, &rules),
            MoveResult::Destroyable
        );
        assert!(map.damage_wall(cell, 10));

        map.set_land(cell, LandType::Water);
        assert_eq!(map.can_enter_cell(cell, 1, track, &rules), MoveResult::No);
        assert_eq!(
            map.can_enter_cell(cell, 1, SpeedClass::Float, &rules),
            MoveResult::Ok
        );
    }

    #[test]
    fn test_move_occupant() {
        let mut map = Map::new(4, 4);
        let a = CellPos::new(0, 0);
        let b = CellPos::new(1, 0);
        map.occupy(a, 5);
        map.reserve(b, 5);
        map.move_occupant(5, a, b);
        assert_eq!(map.cell(a).unwrap().occupant, None);
        assert_eq!(map.cell(b).unwrap().occupant, Some(5));
        assert_eq!(map.cell(b).unwrap().incoming, None);
    }

    #[test]
    fn test_building_footprint() {
        let rules = Rules::default();
        let mut map = Map::new(6, 6);
        let origin = CellPos::new(1, 1);
        assert!(map.can_place(origin, 2, 2, &rules));
        map.place_building(7, origin, 2, 2);
        assert!(!map.can_place(CellPos::new(2, 2), 2, 2, &rules));
        assert_eq!(map.cell(CellPos::new(2, 2)).unwrap().building, Some(7));
        map.remove_building(7, origin, 2, 2);
        assert!(map.can_place(origin, 2, 2, &rules));
        assert!(!map.can_place(CellPos::new(5, 5), 2, 2, &rules));
    }

    #[test]
    fn test_nearby_location_rings() {
        let rules = Rules::default();
        let mut map = Map::new(5, 5);
        let centre = CellPos::new(2, 2);
        map.occupy(centre, 1);
        let found = map
            .nearby_location(centre, 9, SpeedClass::Track, &rules, 2)
            .unwrap();
        assert_eq!(found.cell_distance(centre), 1);
        assert_eq!(
            map.nearby_location(centre, 1, SpeedClass::Track, &rules, 0),
            Some(centre)
        );
    }
}
