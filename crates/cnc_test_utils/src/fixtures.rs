//! Test fixtures and helpers.
//!
//! Pre-built worlds and object layouts
//! for consistent testing.

use cnc_core::house::House;
use cnc_core::math::{CellPos, Dir, Fixed};
use cnc_core::scenario::Scenario;
use cnc_core::unit::UnitId;
use cnc_core::world::World;

/// Seed shared by every fixture world.
pub const FIXTURE_SEED: u32 = 0x00C0_FFEE;

/// Default rules type index of the light tank.
pub const LIGHT_TANK: u8 = 1;

/// Default rules type index of the jeep.
pub const JEEP: u8 = 4;

/// Default rules type index of the war factory.
pub const WAR_FACTORY: u8 = 1;

/// Create a fixed-point fraction from an integer.
#[must_use]
pub fn fixed(n: u16) -> Fixed {
    Fixed::from_num(n)
}

/// Create a fixed-point fraction from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> Fixed {
    Fixed::from_num(n)
}

/// A 16x16 world with no houses.
#[must_use]
pub fn empty_world() -> World {
    World::new(16, 16, FIXTURE_SEED)
}

/// A 16x16 world with a human house 0 and a computer house 1, each
/// holding one light tank in opposite corners.
///
/// Unit 1 belongs to house 0 at (2, 2); unit 2 belongs to house 1 at
/// (13, 13).
#[must_use]
pub fn two_house_world() -> World {
    let mut world = empty_world();
    world.add_house(House::new(0, "Greece", true, 5000));
    world.add_house(House::new(1, "USSR", false, 5000));
    world.set_local_player(Some(0));
    world.spawn_unit(0, LIGHT_TANK, CellPos::new(2, 2), Dir::E);
    world.spawn_unit(1, LIGHT_TANK, CellPos::new(13, 13), Dir::W);
    world
}

/// Two light tanks on guard, in range of each other.
#[must_use]
pub fn duel_world() -> World {
    let mut world = empty_world();
    world.add_house(House::new(0, "Greece", true, 0));
    world.add_house(House::new(1, "USSR", false, 0));
    world.spawn_unit(0, LIGHT_TANK, CellPos::new(5, 8), Dir::E);
    world.spawn_unit(1, LIGHT_TANK, CellPos::new(8, 8), Dir::W);
    world
}

/// Spawn a row of `count` units for `owner` starting at `origin`.
pub fn spawn_row(world: &mut World, owner: u8, type_id: u8, origin: CellPos, count: i32) -> Vec<UnitId> {
    (0..count)
        .map(|i| world.spawn_unit(owner, type_id, CellPos::new(origin.x + i, origin.y), Dir::N))
        .collect()
}

/// Scenario text exercising houses, units, a factory and a wall.
pub const SKIRMISH_RON: &str = r#"(
    name: "Skirmish",
    seed: 12648430,
    width: 24,
    height: 24,
    houses: [
        (id: 0, name: "Greece", is_human: true, credits: 5000),
        (id: 1, name: "USSR", credits: 5000),
    ],
    local_player: Some(0),
    units: [
        (owner: 0, unit_type: "1TNK", x: 3, y: 3, facing: 64),
        (owner: 0, unit_type: "JEEP", x: 4, y: 3, facing: 64),
        (owner: 1, unit_type: "1TNK", x: 20, y: 20, facing: 192),
    ],
    buildings: [
        (owner: 0, building_type: "WEAP", x: 2, y: 6),
    ],
    walls: [
        (owner: 1, x: 12, y: 12),
    ],
    waypoints: [(12, 4)],
    frames: 300,
)"#;

/// Parsed [`SKIRMISH_RON`].
///
/// # Panics
///
/// Panics if the fixture text does not parse.
#[must_use]
pub fn skirmish_scenario() -> Scenario {
    Scenario::from_ron_str(SKIRMISH_RON).expect("skirmish fixture parses")
}

/// World built from [`skirmish_scenario`].
///
/// # Panics
///
/// Panics if the fixture scenario is invalid.
#[must_use]
pub fn skirmish_world() -> World {
    World::from_scenario(&skirmish_scenario()).expect("skirmish fixture builds")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_house_world_layout() {
        let world = two_house_world();
        assert_eq!(world.houses.len(), 2);
        assert_eq!(world.units[&1].owner, 0);
        assert_eq!(world.units[&1].cell(), CellPos::new(2, 2));
        assert_eq!(world.units[&2].owner, 1);
    }

    #[test]
    fn test_spawn_row() {
        let mut world = empty_world();
        let ids = spawn_row(&mut world, 0, JEEP, CellPos::new(1, 1), 3);
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(world.units[&3].cell(), CellPos::new(3, 1));
    }

    #[test]
    fn test_skirmish_fixture_builds() {
        let world = skirmish_world();
        assert_eq!(world.units.len(), 3);
        assert_eq!(world.buildings.len(), 1);
        assert_eq!(world.local_player(), Some(0));
    }

    #[test]
    fn test_fixed_helpers() {
        assert_eq!(fixed(1), Fixed::ONE);
        assert_eq!(fixed_f(0.5) * fixed(2), Fixed::ONE);
    }
}
