//! Bounded event lists.
//!
//! Each peer keeps two: the out-list of locally generated events waiting to
//! be sent, and the do-list of events from every player waiting for the
//! frame they execute on. Both are an [`EventQueue`].

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::event::{Event, EventType};
use crate::house::HouseId;
use crate::world::World;

/// Default capacity, matching the comm layer's event queue size.
pub const EVENT_QUEUE_SIZE: usize = 256;

/// Fixed-capacity FIFO of events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQueue {
    events: VecDeque<Event>,
    capacity: usize,
}

impl EventQueue {
    /// Create an empty queue holding at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an event. Returns false if the queue is full.
    pub fn add(&mut self, event: Event) -> bool {
        if self.events.len() >= self.capacity {
            return false;
        }
        self.events.push_back(event);
        true
    }

    /// Number of queued events.
    #[must_use]
    pub fn count(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Maximum number of events.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Event at queue position `index`, oldest first.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    /// Events oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Remove and return the oldest event.
    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Remove every event.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Move every event scheduled inside the pacing window to its end.
    ///
    /// Frame checksums keep their frame so they are compared against the
    /// state they describe.
    fn reschedule(&mut self, world: &World) {
        for event in &mut self.events {
            if event.event_type() != EventType::FrameInfo && world.pacing.in_window(event.frame) {
                event.frame = world.pacing.window_end;
            }
        }
    }

    /// Execute every event due on the world's current frame.
    ///
    /// Events run grouped by player in ascending house order and in queue
    /// order within a player. Executed events are removed. With `strict`,
    /// an event whose frame has already passed is an error and nothing
    /// more runs this frame.
    ///
    /// Returns the number of events executed.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::PacketTooLate`] in strict mode when an event
    /// arrived after its frame.
    pub fn execute_frame(&mut self, world: &mut World, strict: bool) -> Result<usize> {
        self.reschedule(world);

        let frame = world.frame();
        let mut players: Vec<HouseId> = self.events.iter().map(|e| e.player).collect();
        players.sort_unstable();
        players.dedup();

        let mut executed = 0;
        let mut outcome = Ok(());
        'players: for player in players {
            for event in self.events.iter_mut() {
                if event.player != player || event.is_executed || event.frame > frame {
                    continue;
                }
                if event.frame < frame {
                    tracing::warn!(
                        frame = event.frame,
                        current_frame = frame,
                        player,
                        kind = event.event_type().name(),
                        "Event arrived after its frame"
                    );
                    if strict {
                        outcome = Err(GameError::PacketTooLate {
                            frame: event.frame,
                            current_frame: frame,
                            player,
                        });
                        break 'players;
                    }
                }
                event.execute(world);
                executed += 1;
            }
        }

        self.events.retain(|e| !e.is_executed);
        outcome.map(|()| executed)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(EVENT_QUEUE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::house::House;

    fn world() -> World {
        let mut world = World::new(8, 8, 3);
        world.add_house(House::new(0, "Greece", true, 0));
        world.add_house(House::new(1, "USSR", true, 0));
        world
    }

    #[test]
    fn test_capacity() {
        let mut queue = EventQueue::new(2);
        assert!(queue.add(Event::new(0, 0, EventKind::Empty)));
        assert!(queue.add(Event::new(0, 0, EventKind::Empty)));
        assert!(!queue.add(Event::new(0, 0, EventKind::Empty)));
        assert_eq!(queue.count(), 2);
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_only_due_events_run() {
        let mut world = world();
        let mut queue = EventQueue::default();
        queue.add(Event::new(0, 0, EventKind::GameSpeed { speed: 3 }));
        queue.add(Event::new(5, 0, EventKind::GameSpeed { speed: 9 }));
        assert_eq!(queue.execute_frame(&mut world, true).unwrap(), 1);
        assert_eq!(world.options.game_speed, 3);
        assert_eq!(queue.count(), 1);
        assert_eq!(queue.get(0).unwrap().frame, 5);
    }

    #[test]
    fn test_exit_only_ends_game_for_its_sender() {
        let mut world = world();
        world.set_local_player(Some(0));
        let mut queue = EventQueue::default();
        queue.add(Event::new(0, 1, EventKind::Exit));
        queue.add(Event::new(0, 1, EventKind::Options));
        assert_eq!(queue.execute_frame(&mut world, true).unwrap(), 2);
        assert!(world.game_active);
        assert!(!world.houses[1].is_human);
        assert!(world.houses[0].is_human);

        queue.add(Event::new(0, 0, EventKind::Exit));
        queue.execute_frame(&mut world, true).unwrap();
        assert!(!world.game_active);
    }

    #[test]
    fn test_players_run_in_house_order() {
        let mut world = world();
        let mut queue = EventQueue::default();
        queue.add(Event::new(0, 1, EventKind::GameSpeed { speed: 7 }));
        queue.add(Event::new(0, 0, EventKind::GameSpeed { speed: 2 }));
        queue.execute_frame(&mut world, false).unwrap();
        assert_eq!(world.options.game_speed, 7);
    }

    #[test]
    fn test_late_event_strict_and_lenient() {
        let mut world = world();
        world.tick();
        world.tick();

        let mut queue = EventQueue::default();
        queue.add(Event::new(1, 0, EventKind::GameSpeed { speed: 4 }));
        assert!(matches!(
            queue.execute_frame(&mut world, true),
            Err(GameError::PacketTooLate { frame: 1, current_frame: 2, player: 0 })
        ));
        assert_eq!(queue.count(), 1);

        assert_eq!(queue.execute_frame(&mut world, false).unwrap(), 1);
        assert_eq!(world.options.game_speed, 4);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_window_reschedules() {
        let mut world = world();
        world.pacing.apply_max_ahead(0, world.pacing.max_ahead + 4);
        let end = world.pacing.window_end;

        let mut queue = EventQueue::default();
        queue.add(Event::new(1, 0, EventKind::Empty));
        queue.add(Event::new(
            1,
            0,
            EventKind::FrameInfo {
                crc: 0,
                command_count: 0,
                delay: 1,
            },
        ));
        queue.execute_frame(&mut world, false).unwrap();
        assert_eq!(queue.get(0).unwrap().frame, end);
        assert_eq!(queue.get(1).unwrap().frame, 1);
    }
}
