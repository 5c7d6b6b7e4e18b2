//! Players and their economies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::Rules;
use crate::production::{Factory, ProductionKind, ProductionStep};

/// Index of a house; also the player number carried in events.
pub type HouseId = u8;

/// Most houses a game can hold; alliances are a bitmask of this width.
pub const MAX_HOUSES: usize = 32;

/// One-shot super weapons a house may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum SpecialWeapon {
    /// Reveal the map around a cell.
    SonarPulse = 0,
    /// Nuclear strike.
    Nuke = 1,
    /// Teleport a vehicle.
    Chronosphere = 2,
    /// Carpet bombing run.
    ParaBomb = 3,
    /// Paratrooper drop.
    ParaInfantry = 4,
    /// Spy plane reconnaissance.
    SpyMission = 5,
    /// Temporary invulnerability.
    IronCurtain = 6,
    /// Reveal the whole map.
    Gps = 7,
}

impl SpecialWeapon {
    /// Weapon for a wire byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::SonarPulse,
            1 => Self::Nuke,
            2 => Self::Chronosphere,
            3 => Self::ParaBomb,
            4 => Self::ParaInfantry,
            5 => Self::SpyMission,
            6 => Self::IronCurtain,
            7 => Self::Gps,
            _ => return None,
        })
    }

    /// Wire byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// A player, human or computer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct House {
    /// Identifier.
    pub id: HouseId,
    /// Display name.
    pub name: String,
    /// Controlled by a person.
    pub is_human: bool,
    /// Bit `n` set when allied with house `n`.
    pub allies: u32,
    /// Money available.
    pub credits: u32,
    /// Unit under construction.
    pub unit_factory: Option<Factory>,
    /// Building under construction.
    pub building_factory: Option<Factory>,
    /// Will be destroyed at the end of the frame.
    pub to_die: bool,
    /// Out of the game.
    pub is_defeated: bool,
    /// Granted special weapons and frames until each is ready.
    pub specials: BTreeMap<SpecialWeapon, u32>,
    /// Average frame processing time reported by this player.
    pub process_time: u16,
    /// This player has proposed a draw.
    pub proposes_draw: bool,
}

impl House {
    /// Create a house allied only with itself.
    #[must_use]
    pub fn new(id: HouseId, name: impl Into<String>, is_human: bool, credits: u32) -> Self {
        Self {
            id,
            name: name.into(),
            is_human,
            allies: ally_bit(id),
            credits,
            unit_factory: None,
            building_factory: None,
            to_die: false,
            is_defeated: false,
            specials: BTreeMap::new(),
            process_time: 0,
            proposes_draw: false,
        }
    }

    // ========================================================================
    // Alliances
    // ========================================================================

    /// Whether this house counts `other` as a friend.
    #[must_use]
    pub const fn is_ally(&self, other: HouseId) -> bool {
        self.allies & ally_bit(other) != 0
    }

    /// Ally with `other`.
    pub fn make_ally(&mut self, other: HouseId) {
        self.allies |= ally_bit(other);
    }

    /// Break an alliance with `other`. A house cannot be its own enemy.
    pub fn make_enemy(&mut self, other: HouseId) {
        if other != self.id {
            self.allies &= !ally_bit(other);
        }
    }

    // ========================================================================
    // Production
    // ========================================================================

    /// Factory slot for `kind`.
    #[must_use]
    pub const fn factory(&self, kind: ProductionKind) -> Option<&Factory> {
        match kind {
            ProductionKind::Unit => self.unit_factory.as_ref(),
            ProductionKind::Building => self.building_factory.as_ref(),
        }
    }

    /// Mutable factory slot for `kind`.
    pub fn factory_slot(&mut self, kind: ProductionKind) -> &mut Option<Factory> {
        match kind {
            ProductionKind::Unit => &mut self.unit_factory,
            ProductionKind::Building => &mut self.building_factory,
        }
    }

    /// Start building `type_id`, or resume it if it is the suspended item.
    ///
    /// Returns false if the type is unknown or the factory is busy with
    /// something else.
    pub fn begin_production(&mut self, kind: ProductionKind, type_id: u8, rules: &Rules) -> bool {
        let (build_time, cost) = match kind {
            ProductionKind::Unit => match rules.unit_type(type_id) {
                Some(t) => (t.build_time, t.cost),
                None => return false,
            },
            ProductionKind::Building => match rules.building_type(type_id) {
                Some(t) => (t.build_time, t.cost),
                None => return false,
            },
        };
        let slot = self.factory_slot(kind);
        if let Some(factory) = slot.as_mut() {
            if factory.type_id == type_id && factory.is_suspended {
                factory.is_suspended = false;
                return true;
            }
            return false;
        }
        *slot = Some(Factory::new(kind, type_id, build_time, cost));
        true
    }

    /// Pause production of `kind`. Returns false if nothing was building.
    pub fn suspend_production(&mut self, kind: ProductionKind) -> bool {
        match self.factory_slot(kind) {
            Some(factory) if !factory.is_completed => {
                factory.is_suspended = true;
                true
            }
            _ => false,
        }
    }

    /// Cancel production of `kind`, refunding what was spent.
    ///
    /// Returns the credits refunded.
    pub fn abandon_production(&mut self, kind: ProductionKind) -> u32 {
        let refund = self.factory_slot(kind).take().map_or(0, |f| f.refund());
        self.credits = self.credits.saturating_add(refund);
        refund
    }

    /// Advance both factories one frame. Returns the kinds that completed.
    pub fn production_ai(&mut self) -> Vec<ProductionKind> {
        let mut completed = Vec::new();
        let mut credits = self.credits;
        for kind in [ProductionKind::Unit, ProductionKind::Building] {
            if let Some(factory) = self.factory_slot(kind) {
                if factory.advance(&mut credits) == ProductionStep::Completed {
                    completed.push(kind);
                }
            }
        }
        self.credits = credits;
        completed
    }

    // ========================================================================
    // Special weapons
    // ========================================================================

    /// Grant a special weapon, starting its charge.
    pub fn grant_special(&mut self, weapon: SpecialWeapon, rules: &Rules) {
        self.specials.entry(weapon).or_insert(rules.special_charge_time);
    }

    /// Whether `weapon` is granted and fully charged.
    #[must_use]
    pub fn is_special_ready(&self, weapon: SpecialWeapon) -> bool {
        self.specials.get(&weapon) == Some(&0)
    }

    /// Count down every charging special weapon by one frame.
    pub fn charge_specials(&mut self) {
        for remaining in self.specials.values_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }

    /// Use a charged special weapon, restarting its charge.
    ///
    /// Returns false if the weapon is missing or not ready.
    pub fn fire_special(&mut self, weapon: SpecialWeapon, rules: &Rules) -> bool {
        if !self.is_special_ready(weapon) {
            return false;
        }
        self.specials.insert(weapon, rules.special_charge_time);
        true
    }
}

const fn ally_bit(house: HouseId) -> u32 {
    1u32 << (house as u32 % MAX_HOUSES as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alliances() {
        let mut house = House::new(2, "Greece", true, 0);
        assert!(house.is_ally(2));
        assert!(!house.is_ally(3));
        house.make_ally(3);
        assert!(house.is_ally(3));
        house.make_enemy(3);
        house.make_enemy(2);
        assert!(!house.is_ally(3));
        assert!(house.is_ally(2));
    }

    #[test]
    fn test_production_lifecycle() {
        let rules = Rules::default();
        let mut house = House::new(0, "USSR", false, 10_000);
        assert!(house.begin_production(ProductionKind::Unit, 1, &rules));
        assert!(!house.begin_production(ProductionKind::Unit, 2, &rules));
        assert!(!house.begin_production(ProductionKind::Unit, 99, &rules));

        let build_time = rules.unit_types[1].build_time;
        let mut done = Vec::new();
        for _ in 0..build_time {
            done.extend(house.production_ai());
        }
        assert_eq!(done, vec![ProductionKind::Unit]);
        assert_eq!(house.credits, 10_000 - rules.unit_types[1].cost);
    }

    #[test]
    fn test_suspend_resume_abandon() {
        let rules = Rules::default();
        let mut house = House::new(0, "USSR", false, 10_000);
        assert!(!house.suspend_production(ProductionKind::Building));
        house.begin_production(ProductionKind::Building, 2, &rules);
        for _ in 0..10 {
            house.production_ai();
        }
        assert!(house.suspend_production(ProductionKind::Building));
        let before = house.credits;
        house.production_ai();
        assert_eq!(house.credits, before);

        assert!(house.begin_production(ProductionKind::Building, 2, &rules));
        let spent = 10_000 - house.credits;
        assert_eq!(house.abandon_production(ProductionKind::Building), spent);
        assert_eq!(house.credits, 10_000);
        assert!(house.factory(ProductionKind::Building).is_none());
    }

    #[test]
    fn test_special_charge() {
        let mut rules = Rules::default();
        rules.special_charge_time = 3;
        let mut house = House::new(0, "USSR", false, 0);
        assert!(!house.fire_special(SpecialWeapon::Nuke, &rules));
        house.grant_special(SpecialWeapon::Nuke, &rules);
        for _ in 0..3 {
            assert!(!house.is_special_ready(SpecialWeapon::Nuke));
            house.charge_specials();
        }
        assert!(house.fire_special(SpecialWeapon::Nuke, &rules));
        assert!(!house.is_special_ready(SpecialWeapon::Nuke));
    }

    #[test]
    fn test_special_wire_values() {
        for value in 0..8 {
            let weapon = SpecialWeapon::from_u8(value).unwrap();
            assert_eq!(weapon.as_u8(), value);
        }
        assert_eq!(SpecialWeapon::from_u8(8), None);
    }
}
