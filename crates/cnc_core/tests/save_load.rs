//! Save games restore a world that keeps playing the same game.

use cnc_core::event::{Event, EventKind};
use cnc_core::house::House;
use cnc_core::math::{CellPos, Dir};
use cnc_core::mission::Mission;
use cnc_core::pipe::{BufferPipe, CrcPipe, CRC32};
use cnc_core::production::ProductionKind;
use cnc_core::save::{load_from_file, load_world, save_to_file, save_world};
use cnc_core::straw::BufferStraw;
use cnc_core::target::Target;
use cnc_core::world::World;
use cnc_test_utils::fixtures::{skirmish_world, WAR_FACTORY};

fn busy_world() -> World {
    let mut world = skirmish_world();
    let rules = world.rules.clone();
    world.houses[0].begin_production(ProductionKind::Unit, 4, &rules);
    world.do_list.add(Event::new(
        5,
        0,
        EventKind::MegaMission {
            whom: Target::Unit(1),
            mission: Mission::Move,
            target: Target::None,
            destination: Target::Cell(CellPos::new(10, 3)),
        },
    ));
    for _ in 0..25 {
        world.tick();
    }
    world
}

#[test]
fn test_saved_world_continues_identically() {
    let mut original = busy_world();
    let mut pipe = BufferPipe::new();
    save_world(&original, &mut pipe).unwrap();
    let mut restored = load_world(BufferStraw::new(pipe.as_bytes())).unwrap();

    assert_eq!(restored.frame(), original.frame());
    assert_eq!(restored.do_list.count(), original.do_list.count());
    for _ in 0..300 {
        let a = original.tick();
        let b = restored.tick();
        assert_eq!(a.deaths, b.deaths);
        assert_eq!(a.production_complete, b.production_complete);
    }
    assert_eq!(restored.state_hash(), original.state_hash());
}

#[test]
fn test_file_round_trip() {
    let path = std::env::temp_dir().join("cnc_core_save_load_test.sav");
    let world = busy_world();
    let written = save_to_file(&world, &path).unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, written);

    let loaded = load_from_file(&path).unwrap();
    assert_eq!(loaded.state_hash(), world.state_hash());
    assert_eq!(loaded.local_player(), Some(0));

    let _ = std::fs::remove_file(path);
}

#[test]
fn test_save_compresses_repetitive_maps() {
    let mut world = World::new(64, 64, 7);
    world.add_house(House::new(0, "Greece", true, 0));
    world.place_building(0, WAR_FACTORY, CellPos::new(10, 10)).unwrap();
    world.spawn_unit(0, 1, CellPos::new(20, 20), Dir::S);

    let raw = world.serialize().unwrap();
    let mut checked = CrcPipe::new(BufferPipe::new());
    let written = save_world(&world, &mut checked).unwrap();
    assert!(written < raw.len(), "{written} >= {}", raw.len());

    let crc = checked.result();
    let out = checked.into_inner();
    assert_eq!(out.as_bytes().len(), written);
    assert_eq!(crc, CRC32.checksum(out.as_bytes()));
}

#[test]
fn test_corrupt_body_is_rejected() {
    let world = busy_world();
    let mut pipe = BufferPipe::new();
    save_world(&world, &mut pipe).unwrap();
    let mut bytes = pipe.into_bytes();

    // Past the 44-byte header and the first block header.
    let at = 44 + 4 + 10;
    bytes[at] ^= 0x55;
    assert!(load_world(BufferStraw::new(&bytes)).is_err());
}
