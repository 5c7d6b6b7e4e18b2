//! Structures.

use serde::{Deserialize, Serialize};

use crate::config::Rules;
use crate::data::BuildingTypeData;
use crate::house::HouseId;
use crate::map::footprint;
use crate::math::{CellPos, Coord, CELL_LEPTON_W};
use crate::production::ProductionKind;

/// Unique, never reused identifier of a building.
pub type BuildingId = u32;

/// A structure placed on the map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Building {
    /// Identifier.
    pub id: BuildingId,
    /// Owning house.
    pub owner: HouseId,
    /// Index into [`Rules::building_types`].
    pub type_id: u8,
    /// Top-left cell of the footprint.
    pub cell: CellPos,
    /// Hit points left.
    pub strength: u16,
    /// Preferred factory of its kind for the owner.
    pub is_primary: bool,
    /// Being repaired.
    pub is_repairing: bool,
    /// Frames until the next repair step.
    pub repair_timer: u32,
}

impl Building {
    /// Create a building at full strength.
    #[must_use]
    pub fn new(id: BuildingId, owner: HouseId, type_id: u8, cell: CellPos, strength: u16) -> Self {
        Self {
            id,
            owner,
            type_id,
            cell,
            strength,
            is_primary: false,
            is_repairing: false,
            repair_timer: 0,
        }
    }

    /// Type data from the rules.
    #[must_use]
    pub fn type_data<'r>(&self, rules: &'r Rules) -> Option<&'r BuildingTypeData> {
        rules.building_type(self.type_id)
    }

    /// Whether the building still stands.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.strength > 0
    }

    /// Footprint size in cells.
    #[must_use]
    pub fn size(&self, rules: &Rules) -> (u8, u8) {
        self.type_data(rules).map_or((1, 1), |t| (t.width, t.height))
    }

    /// Cells covered by the building.
    pub fn cells(&self, rules: &Rules) -> impl Iterator<Item = CellPos> {
        let (width, height) = self.size(rules);
        footprint(self.cell, width, height)
    }

    /// Whether `cell` is under the building.
    #[must_use]
    pub fn covers(&self, cell: CellPos, rules: &Rules) -> bool {
        let (width, height) = self.size(rules);
        cell.x >= self.cell.x
            && cell.y >= self.cell.y
            && cell.x < self.cell.x + i32::from(width)
            && cell.y < self.cell.y + i32::from(height)
    }

    /// Centre of the footprint in leptons.
    #[must_use]
    pub fn center(&self, rules: &Rules) -> Coord {
        let (width, height) = self.size(rules);
        let origin = Coord::new(self.cell.x * CELL_LEPTON_W, self.cell.y * CELL_LEPTON_W);
        origin.offset(
            i32::from(width) * CELL_LEPTON_W / 2,
            i32::from(height) * CELL_LEPTON_W / 2,
        )
    }

    /// Cell just below the bottom-left corner where produced units appear.
    #[must_use]
    pub fn exit_cell(&self, rules: &Rules) -> CellPos {
        let (_, height) = self.size(rules);
        CellPos::new(self.cell.x, self.cell.y + i32::from(height))
    }

    /// Factory kind this building produces, if any.
    #[must_use]
    pub fn factory(&self, rules: &Rules) -> Option<ProductionKind> {
        self.type_data(rules).and_then(|t| t.factory)
    }

    /// Credits returned when sold.
    #[must_use]
    pub fn refund(&self, rules: &Rules) -> u32 {
        self.type_data(rules)
            .map_or(0, |t| t.cost * u32::from(rules.refund_percent) / 100)
    }

    /// Run one frame of repair.
    ///
    /// Every `repair_rate` frames the building regains `repair_step`
    /// strength for `repair_step_cost` credits. Repair stops at full
    /// strength or when the owner cannot pay.
    pub fn repair_ai(&mut self, credits: &mut u32, rules: &Rules) {
        if !self.is_repairing {
            return;
        }
        let max = self.type_data(rules).map_or(self.strength, |t| t.strength);
        if self.strength >= max {
            self.is_repairing = false;
            return;
        }
        if self.repair_timer > 0 {
            self.repair_timer -= 1;
            return;
        }
        if *credits < rules.repair_step_cost {
            self.is_repairing = false;
            return;
        }
        *credits -= rules.repair_step_cost;
        self.strength = self.strength.saturating_add(rules.repair_step).min(max);
        self.repair_timer = rules.repair_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footprint_and_exit() {
        let rules = Rules::default();
        let weap = Building::new(1, 0, 1, CellPos::new(4, 4), 1000);
        assert_eq!(weap.size(&rules), (3, 2));
        assert_eq!(weap.cells(&rules).count(), 6);
        assert!(weap.covers(CellPos::new(6, 5), &rules));
        assert!(!weap.covers(CellPos::new(7, 5), &rules));
        assert_eq!(weap.exit_cell(&rules), CellPos::new(4, 6));
        assert_eq!(weap.factory(&rules), Some(ProductionKind::Unit));
        assert_eq!(weap.center(&rules), Coord::new(4 * 256 + 384, 4 * 256 + 256));
    }

    #[test]
    fn test_refund() {
        let rules = Rules::default();
        let powr = Building::new(1, 0, 2, CellPos::new(0, 0), 400);
        assert_eq!(powr.refund(&rules), 150);
    }

    #[test]
    fn test_repair_steps() {
        let rules = Rules::default();
        let mut powr = Building::new(1, 0, 2, CellPos::new(0, 0), 390);
        powr.is_repairing = true;
        let mut credits = 100;
        powr.repair_ai(&mut credits, &rules);
        assert_eq!(powr.strength, 397);
        assert_eq!(credits, 98);
        for _ in 0..rules.repair_rate {
            powr.repair_ai(&mut credits, &rules);
        }
        powr.repair_ai(&mut credits, &rules);
        assert_eq!(powr.strength, 400);
        powr.repair_ai(&mut credits, &rules);
        assert!(!powr.is_repairing);
    }

    #[test]
    fn test_repair_stops_when_broke() {
        let rules = Rules::default();
        let mut powr = Building::new(1, 0, 2, CellPos::new(0, 0), 100);
        powr.is_repairing = true;
        let mut credits = 1;
        powr.repair_ai(&mut credits, &rules);
        assert!(!powr.is_repairing);
        assert_eq!(powr.strength, 100);
    }
}
