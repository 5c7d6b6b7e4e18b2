//! Two peers playing one game over a lossy loopback link.
//!
//! Each peer schedules its orders `max_ahead` frames into the future,
//! sends them through a [`Connection`] and only advances a frame once the
//! other peer's orders for it have arrived. Packets are dropped and
//! duplicated on the way; the reliable layer must still deliver every
//! order exactly once and in order, and both worlds must stay identical.

use cnc_core::connection::{Connection, ConnectionConfig, LoopbackTransport};
use cnc_core::event::{decode_packet, encode_packet, Event, EventKind};
use cnc_core::house::HouseId;
use cnc_core::math::CellPos;
use cnc_core::mission::Mission;
use cnc_core::target::Target;
use cnc_core::world::World;
use cnc_test_utils::determinism::strategies::arb_event_sequence;
use cnc_test_utils::determinism::{first_divergence, run_with_events, verify_lockstep};
use cnc_test_utils::fixtures::{skirmish_world, two_house_world};
use proptest::prelude::*;

const TARGET_FRAME: u32 = 180;
const MAX_STEPS: u32 = 20_000;

struct Peer {
    house: HouseId,
    world: World,
    link: Connection<LoopbackTransport>,
    sent_through: Option<u32>,
    remote_packets: u32,
    commands: u16,
}

impl Peer {
    fn new(house: HouseId) -> Self {
        let mut world = two_house_world();
        world.set_local_player(Some(house));
        let config = ConnectionConfig {
            retry_delta: 3,
            max_retries: None,
            timeout: None,
            ..ConnectionConfig::from(&world.rules.comm)
        };
        Self {
            house,
            world,
            link: Connection::new(config, LoopbackTransport::new()),
            sent_through: None,
            remote_packets: 0,
            commands: 0,
        }
    }

    fn lead(&self) -> u32 {
        self.world.pacing.max_ahead
    }

    /// Orders this peer's player gives while the world is on `frame`.
    fn orders(&self, frame: u32) -> Vec<EventKind> {
        let unit = Target::Unit(u32::from(self.house) + 1);
        match (self.house, frame) {
            (0, 3) => vec![EventKind::MegaMission {
                whom: unit,
                mission: Mission::Move,
                target: Target::None,
                destination: Target::Cell(CellPos::new(4, 8)),
            }],
            (1, 10) => vec![EventKind::MegaMission {
                whom: unit,
                mission: Mission::Move,
                target: Target::None,
                destination: Target::Cell(CellPos::new(12, 7)),
            }],
            (1, 40) => vec![EventKind::Message {
                text: "gl hf".to_string(),
            }],
            _ => Vec::new(),
        }
    }

    /// Send the packet for the current frame once.
    fn send_frame_packet(&mut self) {
        let frame = self.world.frame();
        if self.sent_through.is_some_and(|f| f >= frame) {
            return;
        }
        let lead = self.lead();
        let mut events: Vec<Event> = self
            .orders(frame)
            .into_iter()
            .map(|kind| Event::new(frame + lead, self.house, kind))
            .collect();
        self.commands += events.len() as u16;
        events.push(self.world.frame_info_event(self.house, self.commands));

        for event in &events {
            assert!(self.world.do_list.add(event.clone()));
        }
        let packet = encode_packet(&events).unwrap();
        assert!(self.link.send_packet(&packet, true), "send queue full");
        self.sent_through = Some(frame);
    }

    fn take_remote_events(&mut self) {
        while let Some(packet) = self.link.get_packet() {
            for event in decode_packet(&packet).unwrap() {
                assert!(self.world.do_list.add(event));
            }
            self.remote_packets += 1;
        }
    }

    /// The remote orders for frame `f` were sent on remote frame
    /// `f - lead`, in its packet number `f - lead + 1`.
    fn may_advance(&self) -> bool {
        let frame = self.world.frame();
        if frame >= TARGET_FRAME {
            return false;
        }
        frame < self.lead() || self.remote_packets > frame - self.lead()
    }
}

/// Deterministic lossy wire: drops one packet in seven and repeats one
/// in five.
struct Wire {
    count: u32,
}

impl Wire {
    fn carry(&mut self, from: &mut Peer, to: &mut Peer) {
        for packet in from.link.transport_mut().drain() {
            self.count += 1;
            if self.count % 7 == 3 {
                continue;
            }
            to.link.receive_packet(&packet);
            if self.count % 5 == 1 {
                to.link.receive_packet(&packet);
            }
        }
    }
}

fn play() -> (Peer, Peer) {
    let mut a = Peer::new(0);
    let mut b = Peer::new(1);
    let mut wire = Wire { count: 0 };

    for now in 0..MAX_STEPS {
        for peer in [&mut a, &mut b] {
            peer.send_frame_packet();
            peer.link.service(now);
        }
        wire.carry(&mut a, &mut b);
        wire.carry(&mut b, &mut a);
        for peer in [&mut a, &mut b] {
            peer.take_remote_events();
            if peer.may_advance() {
                peer.world.try_tick().unwrap();
            }
        }
        if a.world.frame() >= TARGET_FRAME && b.world.frame() >= TARGET_FRAME {
            break;
        }
    }
    (a, b)
}

#[test]
fn test_peers_stay_in_sync_over_lossy_link() {
    let (a, b) = play();
    assert_eq!(a.world.frame(), TARGET_FRAME);
    assert_eq!(b.world.frame(), TARGET_FRAME);
    assert_eq!(a.world.state_hash(), b.world.state_hash());
    assert_eq!(a.world.frame_crc(), b.world.frame_crc());
    a.world.check_sync().unwrap();
    b.world.check_sync().unwrap();
}

#[test]
fn test_orders_from_both_sides_take_effect() {
    let (a, b) = play();
    for world in [&a.world, &b.world] {
        assert_ne!(world.units[&1].cell(), CellPos::new(2, 2));
        assert_ne!(world.units[&2].cell(), CellPos::new(13, 13));
        assert_eq!(world.messages.len(), 1);
        assert_eq!(world.messages[0].player, 1);
    }
}

#[test]
fn test_checksums_agree_on_every_recent_frame() {
    let (a, b) = play();
    for frame in TARGET_FRAME - 20..TARGET_FRAME {
        assert_eq!(a.world.crc_for_frame(frame), b.world.crc_for_frame(frame));
        assert!(a.world.crc_for_frame(frame).is_some());
    }
}

#[test]
fn test_tampered_world_is_caught() {
    let mut a = Peer::new(0);
    let mut b = Peer::new(1);
    b.world.houses[1].credits += 1;

    let info = b.world.frame_info_event(1, 0);
    a.world.do_list.add(info);
    for _ in 0..=a.lead() {
        a.world.tick();
    }
    assert!(a.world.check_sync().is_err());
    let desync = a.world.desync().unwrap();
    assert_eq!(desync.frame, 0);
    assert_eq!(desync.player, 1);
}

#[test]
fn test_skirmish_orders_replay_identically_on_every_peer() {
    let orders = vec![
        Event::new(
            4,
            0,
            EventKind::MegaMission {
                whom: Target::Unit(1),
                mission: Mission::Move,
                target: Target::None,
                destination: Target::Cell(CellPos::new(12, 4)),
            },
        ),
        Event::new(
            9,
            1,
            EventKind::MegaMission {
                whom: Target::Unit(3),
                mission: Mission::Hunt,
                target: Target::None,
                destination: Target::None,
            },
        ),
        Event::new(30, 0, EventKind::Idle { whom: Target::Unit(1) }),
    ];
    let result = verify_lockstep(skirmish_world, 3, &orders, 240);
    result.assert_in_sync();

    // Without the orders the game differs.
    let (_, quiet) = run_with_events(skirmish_world(), &[], 240);
    assert!(first_divergence(&result.peers[0].crcs, &quiet).is_some());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_identical_event_streams_give_identical_crcs(
        events in arb_event_sequence(16, 60, 2, 2)
    ) {
        let result = verify_lockstep(two_house_world, 2, &events, 90);
        prop_assert_eq!(result.divergence(), None);
        prop_assert_eq!(result.peers[0].crcs.len(), 90);
    }
}
