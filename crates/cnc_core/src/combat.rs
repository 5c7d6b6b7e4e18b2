//! Target acquisition and damage.
//!
//! Weapons hit instantly: a unit whose weapon is ready and aimed deals its
//! damage the frame it fires. Target scans walk units and then buildings in
//! ascending id order so every peer picks the same target.

use serde::{Deserialize, Serialize};

use crate::house::HouseId;
use crate::math::{CellPos, Coord, CELL_LEPTON_W};
use crate::options::SpecialFlags;
use crate::target::Target;
use crate::unit::{Unit, UnitId};
use crate::world::World;

/// Damage dealt to one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Unit that fired, `None` for special weapons.
    pub attacker: Option<UnitId>,
    /// Object hit.
    pub target: Target,
    /// Strength removed.
    pub damage: u16,
    /// The hit destroyed the object.
    pub destroyed: bool,
}

/// Whether `house` treats `other` as hostile.
#[must_use]
pub fn is_enemy(world: &World, house: HouseId, other: HouseId) -> bool {
    world.house(house).map_or(house != other, |h| !h.is_ally(other))
}

/// Every hostile, living object of `house` with its position.
fn enemies(world: &World, house: HouseId) -> impl Iterator<Item = (Target, Coord)> + '_ {
    let units = world
        .units
        .values()
        .filter(move |u| u.is_alive() && is_enemy(world, house, u.owner))
        .map(|u| (Target::Unit(u.id), u.coord));
    let buildings = world
        .buildings
        .values()
        .filter(move |b| b.is_alive() && is_enemy(world, house, b.owner))
        .map(|b| (Target::Building(b.id), b.center(&world.rules)));
    units.chain(buildings)
}

/// Closest hostile object to `from` anywhere on the map.
///
/// Without a reference point the first enemy in scan order is returned.
#[must_use]
pub fn nearest_enemy(world: &World, house: HouseId, from: Option<Coord>) -> Target {
    let mut best: Option<(i32, Target)> = None;
    for (target, coord) in enemies(world, house) {
        let distance = from.map_or(0, |f| f.distance(coord));
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, target));
        }
    }
    best.map_or(Target::None, |(_, t)| t)
}

/// Closest hostile object inside `unit`'s weapon range.
#[must_use]
pub fn threat_in_range(world: &World, unit: &Unit) -> Target {
    if !unit.is_armed(&world.rules) {
        return Target::None;
    }
    let range = unit.weapon_range(&world.rules);
    let mut best: Option<(i32, Target)> = None;
    for (target, coord) in enemies(world, unit.owner) {
        let distance = unit.coord.distance(coord);
        if distance <= range && best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, target));
        }
    }
    best.map_or(Target::None, |(_, t)| t)
}

/// Remove `damage` strength from `target`.
///
/// Inert games deal no damage. Cell targets damage the wall in the cell.
/// Returns `None` if nothing was hit.
pub fn apply_damage(
    world: &mut World,
    target: Target,
    damage: u16,
    attacker: Option<UnitId>,
) -> Option<DamageEvent> {
    if world.options.special.contains(SpecialFlags::INERT) {
        return None;
    }
    let destroyed = match target {
        Target::None => return None,
        Target::Unit(id) => {
            let unit = world.units.get_mut(&id).filter(|u| u.is_alive())?;
            unit.strength = unit.strength.saturating_sub(damage);
            unit.strength == 0
        }
        Target::Building(id) => {
            let building = world.buildings.get_mut(&id).filter(|b| b.is_alive())?;
            building.strength = building.strength.saturating_sub(damage);
            building.strength == 0
        }
        Target::Cell(cell) => {
            world.map.cell(cell)?.wall?;
            world.map.damage_wall(cell, damage)
        }
    };
    Some(DamageEvent {
        attacker,
        target,
        damage,
        destroyed,
    })
}

/// Fire `unit`'s weapon at `target` if it is aimed, loaded and in range.
pub fn fire(world: &mut World, unit: &mut Unit, target: Target) -> Option<DamageEvent> {
    let coord = world.target_coord(target)?;
    if !unit.can_fire_at(coord, &world.rules) {
        return None;
    }
    let weapon = unit.type_data(&world.rules)?.weapon.clone()?;
    unit.arm = weapon.rate;
    apply_damage(world, target, weapon.damage, Some(unit.id))
}

/// Damage every object within `radius` cells of `cell`.
///
/// Damage falls off linearly with distance from the centre.
pub fn explode(world: &mut World, cell: CellPos, damage: u16, radius: i32) -> Vec<DamageEvent> {
    let center = cell.center();
    let reach = (radius * CELL_LEPTON_W).max(1);
    let falloff = |coord: Coord| {
        let distance = center.distance(coord);
        (distance <= reach).then(|| {
            let scaled = i64::from(damage) * i64::from(reach - distance) / i64::from(reach);
            u16::try_from(scaled).unwrap_or(damage).max(1)
        })
    };

    let mut hits: Vec<(Target, u16)> = Vec::new();
    for unit in world.units.values().filter(|u| u.is_alive()) {
        if let Some(amount) = falloff(unit.coord) {
            hits.push((Target::Unit(unit.id), amount));
        }
    }
    for building in world.buildings.values().filter(|b| b.is_alive()) {
        if let Some(amount) = falloff(building.center(&world.rules)) {
            hits.push((Target::Building(building.id), amount));
        }
    }
    hits.into_iter()
        .filter_map(|(target, amount)| apply_damage(world, target, amount, None))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::building::Building;
    use crate::house::House;
    use crate::math::Dir;

    fn world() -> World {
        let mut world = World::new(16, 16, 1);
        world.add_house(House::new(0, "Greece", true, 0));
        world.add_house(House::new(1, "USSR", false, 0));
        world
    }

    #[test]
    fn test_threat_picks_closest_enemy() {
        let mut world = world();
        let shooter = world.spawn_unit(0, 1, CellPos::new(4, 4), Dir::N);
        world.spawn_unit(1, 1, CellPos::new(7, 4), Dir::N);
        let near = world.spawn_unit(1, 1, CellPos::new(5, 5), Dir::N);
        world.spawn_unit(0, 1, CellPos::new(4, 5), Dir::N);

        let unit = world.units[&shooter].clone();
        assert_eq!(threat_in_range(&world, &unit), Target::Unit(near));
    }

    #[test]
    fn test_allies_are_not_threats() {
        let mut world = world();
        let shooter = world.spawn_unit(0, 1, CellPos::new(4, 4), Dir::N);
        world.spawn_unit(1, 1, CellPos::new(5, 4), Dir::N);
        world.houses[0].make_ally(1);
        let unit = world.units[&shooter].clone();
        assert_eq!(threat_in_range(&world, &unit), Target::None);
    }

    #[test]
    fn test_nearest_enemy_includes_buildings() {
        let mut world = world();
        world
            .buildings
            .insert(9, Building::new(9, 1, 2, CellPos::new(10, 10), 400));
        assert_eq!(
            nearest_enemy(&world, 0, Some(CellPos::new(0, 0).center())),
            Target::Building(9)
        );
        assert_eq!(nearest_enemy(&world, 1, None), Target::None);
    }

    #[test]
    fn test_damage_and_destroy() {
        let mut world = world();
        let victim = world.spawn_unit(1, 4, CellPos::new(3, 3), Dir::N);
        let hit = apply_damage(&mut world, Target::Unit(victim), 100, None).unwrap();
        assert!(!hit.destroyed);
        let hit = apply_damage(&mut world, Target::Unit(victim), 100, None).unwrap();
        assert!(hit.destroyed);
        assert!(apply_damage(&mut world, Target::Unit(victim), 1, None).is_none());
    }

    #[test]
    fn test_inert_deals_no_damage() {
        let mut world = world();
        world.options.special |= SpecialFlags::INERT;
        let victim = world.spawn_unit(1, 4, CellPos::new(3, 3), Dir::N);
        assert!(apply_damage(&mut world, Target::Unit(victim), 100, None).is_none());
        assert_eq!(world.units[&victim].strength, 150);
    }

    #[test]
    fn test_wall_damage() {
        let mut world = world();
        let cell = CellPos::new(2, 2);
        world.map.place_wall(cell, 1, 50);
        assert!(!apply_damage(&mut world, Target::Cell(cell), 30, None).unwrap().destroyed);
        assert!(apply_damage(&mut world, Target::Cell(cell), 30, None).unwrap().destroyed);
        assert!(apply_damage(&mut world, Target::Cell(cell), 30, None).is_none());
    }

    #[test]
    fn test_explosion_falls_off() {
        let mut world = world();
        let close = world.spawn_unit(1, 3, CellPos::new(5, 5), Dir::N);
        let far = world.spawn_unit(1, 3, CellPos::new(7, 5), Dir::N);
        let distant = world.spawn_unit(1, 3, CellPos::new(12, 5), Dir::N);
        let hits = explode(&mut world, CellPos::new(5, 5), 300, 3);
        assert_eq!(hits.len(), 2);
        assert_eq!(world.units[&close].strength, 300);
        assert!(world.units[&far].strength > 300);
        assert_eq!(world.units[&distant].strength, 600);
    }
}
