//! Simulation benchmarks for cnc_core.
//!
//! Run with: `cargo bench -p cnc_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use cnc_core::comm_queue::CommBuffer;
use cnc_core::event::{decode_packet, encode_packet, Event, EventKind};
use cnc_core::math::CellPos;
use cnc_core::mission::Mission;
use cnc_core::pipe::{BufferPipe, DeflatePipe, Pipe};
use cnc_core::target::Target;
use cnc_core::world::World;
use cnc_test_utils::fixtures::{duel_world, spawn_row, two_house_world, LIGHT_TANK};

fn order_batch() -> Vec<Event> {
    (0..16)
        .map(|i| {
            Event::new(
                100 + i,
                0,
                EventKind::MegaMission {
                    whom: Target::Unit(i + 1),
                    mission: Mission::Move,
                    target: Target::None,
                    destination: Target::Cell(CellPos::new(i as i32, 12)),
                },
            )
        })
        .collect()
}

/// Convoy of tanks driving across the map, exercising track walking.
fn convoy_world() -> World {
    let mut world = two_house_world();
    let ids = spawn_row(&mut world, 0, LIGHT_TANK, CellPos::new(2, 4), 8);
    for id in ids {
        if let Some(unit) = world.units.get_mut(&id) {
            unit.assign_mission(Mission::Move);
            unit.assign_destination(Target::Cell(CellPos::new(13, 10)));
        }
    }
    world
}

pub fn event_benchmark(c: &mut Criterion) {
    let events = order_batch();
    let packet = encode_packet(&events).unwrap_or_default();

    c.bench_function("event_encode_16", |b| b.iter(|| encode_packet(black_box(&events))));
    c.bench_function("event_decode_16", |b| b.iter(|| decode_packet(black_box(&packet))));
}

pub fn comm_buffer_benchmark(c: &mut Criterion) {
    let payload = [0xA5u8; 200];
    c.bench_function("comm_buffer_cycle_64", |b| {
        b.iter_batched(
            || CommBuffer::new(64, 64, 512),
            |mut buffer| {
                for _ in 0..64 {
                    buffer.queue_send(black_box(&payload));
                }
                while buffer.unqueue_next_send().is_some() {}
                buffer
            },
            BatchSize::SmallInput,
        );
    });
}

pub fn simulation_benchmark(c: &mut Criterion) {
    c.bench_function("tick_duel", |b| {
        b.iter_batched(
            duel_world,
            |mut world| {
                for _ in 0..10 {
                    black_box(world.tick());
                }
                world
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("tick_convoy_drive", |b| {
        b.iter_batched(
            convoy_world,
            |mut world| {
                for _ in 0..30 {
                    black_box(world.tick());
                }
                world
            },
            BatchSize::SmallInput,
        );
    });

    let world = convoy_world();
    c.bench_function("state_hash", |b| b.iter(|| black_box(&world).state_hash()));
    c.bench_function("frame_crc", |b| b.iter(|| black_box(&world).frame_crc()));
}

pub fn persistence_benchmark(c: &mut Criterion) {
    let body = convoy_world().serialize().unwrap_or_default();
    c.bench_function("deflate_world", |b| {
        b.iter(|| {
            let mut sink = BufferPipe::new();
            let mut deflate = DeflatePipe::new(&mut sink);
            let _ = deflate.put(black_box(&body));
            let _ = deflate.flush();
            drop(deflate);
            sink.into_bytes().len()
        });
    });
}

criterion_group!(
    benches,
    event_benchmark,
    comm_buffer_benchmark,
    simulation_benchmark,
    persistence_benchmark
);
criterion_main!(benches);
