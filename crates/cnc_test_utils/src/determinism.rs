//! Lockstep determinism harness.
//!
//! Peers exchange only events, so every peer fed the same event stream
//! must compute the same game: the same frame CRC on every frame and the
//! same final state. [`verify_lockstep`] plays one stream on several
//! worlds, each on its own thread, and reports the first frame on which
//! any of them disagrees.
//!
//! Sources of divergence this guards against:
//!
//! - **Floating-point math**: leptons are integers and speed fractions use
//!   [`cnc_core::math::Fixed`].
//! - **Hash map iteration order**: objects live in `BTreeMap`s and run in
//!   id order.
//! - **Unseeded randomness**: the only random source is the world's
//!   [`cnc_core::random::Random`].

use std::thread;

use cnc_core::event::Event;
use cnc_core::world::World;

/// One peer's view of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerTrace {
    /// Frame CRC taken before each frame ran.
    pub crcs: Vec<u32>,
    /// State hash after the last frame.
    pub final_hash: u64,
}

/// Traces from every peer of a lockstep run.
#[derive(Debug, Clone)]
pub struct LockstepResult {
    /// One trace per peer, in peer order.
    pub peers: Vec<PeerTrace>,
    /// Frames each peer ran.
    pub frames: u32,
}

impl LockstepResult {
    /// First `(peer, frame)` whose CRC differs from peer 0's.
    ///
    /// A peer whose final state differs with matching CRCs reports the
    /// frame count.
    #[must_use]
    pub fn divergence(&self) -> Option<(usize, u32)> {
        let reference = self.peers.first()?;
        self.peers.iter().enumerate().skip(1).find_map(|(peer, trace)| {
            first_divergence(&reference.crcs, &trace.crcs)
                .or_else(|| (trace.final_hash != reference.final_hash).then_some(self.frames))
                .map(|frame| (peer, frame))
        })
    }

    /// Assert every peer computed the same game.
    ///
    /// # Panics
    ///
    /// Panics naming the first peer and frame that diverged.
    pub fn assert_in_sync(&self) {
        if let Some((peer, frame)) = self.divergence() {
            panic!(
                "Peers diverged!\n\
                 Peer: {peer} (of {})\n\
                 Frame: {frame} (of {})\n\
                 Final hashes: {:?}",
                self.peers.len(),
                self.frames,
                self.peers.iter().map(|p| p.final_hash).collect::<Vec<_>>()
            );
        }
    }
}

/// Index of the first frame on which two CRC traces differ.
///
/// A trace that stops early diverges at its length.
#[must_use]
pub fn first_divergence(a: &[u32], b: &[u32]) -> Option<u32> {
    a.iter()
        .zip(b)
        .position(|(x, y)| x != y)
        .or_else(|| (a.len() != b.len()).then(|| a.len().min(b.len())))
        .map(|frame| frame as u32)
}

/// Run a world with a scripted event stream, queueing each event on the
/// frame it is due, and return the per-frame CRCs.
///
/// Events must be sorted by frame.
pub fn run_with_events(mut world: World, events: &[Event], num_frames: u32) -> (World, Vec<u32>) {
    let mut crcs = Vec::with_capacity(num_frames as usize);
    let mut next = 0;
    for _ in 0..num_frames {
        while let Some(event) = events.get(next) {
            if event.frame > world.frame() {
                break;
            }
            if !world.do_list.add(event.clone()) {
                tracing::warn!(frame = world.frame(), "Scripted event dropped: do-list full");
            }
            next += 1;
        }
        crcs.push(world.frame_crc());
        world.tick();
    }
    (world, crcs)
}

/// Play `events` on `peers` worlds built by `setup`, one thread each.
///
/// # Panics
///
/// Panics if a peer thread panics.
pub fn verify_lockstep<F>(setup: F, peers: usize, events: &[Event], num_frames: u32) -> LockstepResult
where
    F: Fn() -> World + Sync,
{
    let traces = thread::scope(|s| {
        let handles: Vec<_> = (0..peers)
            .map(|_| {
                s.spawn(|| {
                    let (world, crcs) = run_with_events(setup(), events, num_frames);
                    PeerTrace {
                        crcs,
                        final_hash: world.state_hash(),
                    }
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    LockstepResult {
        peers: traces,
        frames: num_frames,
    }
}

/// Proptest strategies for player orders.
///
/// Streams generated here are what a human could issue from the UI, so
/// every event passes the wire codec and reaches `Event::execute`.
pub mod strategies {
    use cnc_core::event::{Event, EventKind};
    use cnc_core::house::{HouseId, SpecialWeapon};
    use cnc_core::math::CellPos;
    use cnc_core::mission::Mission;
    use cnc_core::production::ProductionKind;
    use cnc_core::target::Target;
    use cnc_core::unit::UnitId;
    use proptest::prelude::*;

    /// Generate a cell inside a `width` by `height` map.
    pub fn arb_cell(width: i32, height: i32) -> impl Strategy<Value = CellPos> {
        (0..width, 0..height).prop_map(|(x, y)| CellPos::new(x, y))
    }

    /// Generate a mission with a wire encoding.
    pub fn arb_mission() -> impl Strategy<Value = Mission> {
        (0u8..32).prop_filter_map("not a mission", Mission::from_u8)
    }

    /// Generate a production kind.
    pub fn arb_production_kind() -> impl Strategy<Value = ProductionKind> {
        prop_oneof![Just(ProductionKind::Unit), Just(ProductionKind::Building)]
    }

    /// Generate a special weapon.
    pub fn arb_special() -> impl Strategy<Value = SpecialWeapon> {
        (0u8..8).prop_filter_map("not a special", SpecialWeapon::from_u8)
    }

    /// Generate a target naming a unit id up to `max_unit`, or a cell.
    pub fn arb_target(max_unit: UnitId, width: i32, height: i32) -> impl Strategy<Value = Target> {
        prop_oneof![
            Just(Target::None),
            (1..=max_unit).prop_map(Target::Unit),
            arb_cell(width, height).prop_map(Target::Cell),
        ]
    }

    /// Generate a player order.
    pub fn arb_order(max_unit: UnitId, width: i32, height: i32) -> impl Strategy<Value = EventKind> {
        let unit = (1..=max_unit).prop_map(Target::Unit);
        prop_oneof![
            4 => (
                unit.clone(),
                arb_mission(),
                arb_target(max_unit, width, height),
                arb_target(max_unit, width, height),
            )
                .prop_map(|(whom, mission, target, destination)| EventKind::MegaMission {
                    whom,
                    mission,
                    target,
                    destination,
                }),
            1 => unit.clone().prop_map(|whom| EventKind::Idle { whom }),
            1 => unit.clone().prop_map(|whom| EventKind::Scatter { whom }),
            1 => unit.prop_map(|whom| EventKind::Deploy { whom }),
            1 => (arb_production_kind(), 0u8..4)
                .prop_map(|(kind, type_id)| EventKind::Produce { kind, type_id }),
            1 => arb_production_kind().prop_map(|kind| EventKind::Suspend { kind }),
            1 => arb_production_kind().prop_map(|kind| EventKind::Abandon { kind }),
            1 => (arb_special(), arb_cell(width, height))
                .prop_map(|(special, cell)| EventKind::SpecialPlace { special, cell }),
        ]
    }

    /// Generate an event with a frame below `max_frame` from one of
    /// `houses` players.
    pub fn arb_event(
        max_frame: u32,
        houses: HouseId,
        max_unit: UnitId,
        width: i32,
        height: i32,
    ) -> impl Strategy<Value = Event> {
        (0..max_frame, 0..houses, arb_order(max_unit, width, height))
            .prop_map(|(frame, player, kind)| Event::new(frame, player, kind))
    }

    /// Generate an event stream for a 16x16 map, sorted by frame.
    pub fn arb_event_sequence(
        max_len: usize,
        max_frame: u32,
        houses: HouseId,
        max_unit: UnitId,
    ) -> impl Strategy<Value = Vec<Event>> {
        proptest::collection::vec(arb_event(max_frame, houses, max_unit, 16, 16), 0..max_len).prop_map(
            |mut events| {
                events.sort_by_key(|e| e.frame);
                events
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{duel_world, two_house_world};
    use cnc_core::event::EventKind;
    use cnc_core::math::CellPos;
    use cnc_core::mission::Mission;
    use cnc_core::target::Target;

    #[test]
    fn test_first_divergence() {
        assert_eq!(first_divergence(&[1, 2, 3], &[1, 2, 3]), None);
        assert_eq!(first_divergence(&[1, 2, 3], &[1, 9, 3]), Some(1));
        assert_eq!(first_divergence(&[1, 2], &[1, 2, 3]), Some(2));
        assert_eq!(first_divergence(&[], &[]), None);
    }

    #[test]
    fn test_divergence_names_peer_and_frame() {
        let trace = |crcs: Vec<u32>, final_hash| PeerTrace { crcs, final_hash };
        let result = LockstepResult {
            peers: vec![trace(vec![1, 2, 3], 7), trace(vec![1, 2, 3], 7), trace(vec![1, 2, 4], 8)],
            frames: 3,
        };
        assert_eq!(result.divergence(), Some((2, 2)));

        let late = LockstepResult {
            peers: vec![trace(vec![1, 2], 7), trace(vec![1, 2], 8)],
            frames: 2,
        };
        assert_eq!(late.divergence(), Some((1, 2)));
    }

    #[test]
    #[should_panic(expected = "Peers diverged")]
    fn test_assert_in_sync_panics() {
        LockstepResult {
            peers: vec![
                PeerTrace { crcs: vec![1], final_hash: 1 },
                PeerTrace { crcs: vec![2], final_hash: 1 },
            ],
            frames: 1,
        }
        .assert_in_sync();
    }

    #[test]
    fn test_battle_without_orders_stays_in_sync() {
        verify_lockstep(duel_world, 3, &[], 150).assert_in_sync();
    }

    #[test]
    fn test_scripted_orders_take_effect() {
        let events = vec![
            Event::new(
                2,
                0,
                EventKind::MegaMission {
                    whom: Target::Unit(1),
                    mission: Mission::Move,
                    target: Target::None,
                    destination: Target::Cell(CellPos::new(10, 3)),
                },
            ),
            Event::new(5, 1, EventKind::Idle { whom: Target::Unit(2) }),
        ];
        let (world, crcs) = run_with_events(two_house_world(), &events, 120);
        assert_eq!(crcs.len(), 120);
        assert_ne!(world.units[&1].cell(), CellPos::new(2, 2));
        // The order changes the game from frame 3 on.
        let (idle, idle_crcs) = run_with_events(two_house_world(), &[], 120);
        assert_eq!(first_divergence(&crcs, &idle_crcs).map(|f| f <= 4), Some(true));
        assert_ne!(idle.state_hash(), world.state_hash());
    }
}
