//! Replay system for recording and playing back games.
//!
//! Replays store the initial world and every event that executed. Since
//! the simulation is deterministic, feeding the same events to the same
//! initial world on the same frames recreates the game exactly.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GameError, Result};
use crate::event::Event;
use crate::world::World;

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Complete replay data structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Scenario identifier or name.
    pub scenario_id: String,
    /// Random seed used for the game.
    pub seed: u32,
    /// Serialized initial world.
    pub initial_state: Vec<u8>,
    /// Executed events in frame order.
    pub events: Vec<Event>,
    /// Frame the game ended on.
    pub final_frame: u32,
    /// Final state hash for verification.
    pub final_hash: u64,
}

impl Replay {
    /// Create a new replay from a world's initial state.
    ///
    /// # Errors
    /// Returns an error if the world cannot be serialized.
    pub fn new(scenario_id: impl Into<String>, seed: u32, initial_state: &World) -> Result<Self> {
        let state_bytes = initial_state.serialize()?;
        Ok(Self {
            version: REPLAY_VERSION,
            scenario_id: scenario_id.into(),
            seed,
            initial_state: state_bytes,
            events: Vec::new(),
            final_frame: 0,
            final_hash: 0,
        })
    }

    /// Record an event for replay.
    pub fn record_event(&mut self, event: &Event) {
        let mut event = event.clone();
        event.is_executed = false;
        self.events.push(event);
    }

    /// Finalize the replay with end-game state.
    pub fn finalize(&mut self, final_frame: u32, final_hash: u64) {
        self.final_frame = final_frame;
        self.final_hash = final_hash;
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize replay: {}", e)))?;
        std::fs::write(path.as_ref(), bytes)?;
        tracing::info!(events = self.events.len(), frames = self.final_frame, "Replay saved");
        Ok(())
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    /// Returns an error if file reading or deserialization fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    /// Decode a replay, rejecting other format versions.
    ///
    /// # Errors
    /// Returns `SaveVersion` for a replay written by another format
    /// version, or an error if the bytes do not decode.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let replay: Self = bincode::deserialize(bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize replay: {}", e)))?;

        if replay.version != REPLAY_VERSION {
            return Err(GameError::SaveVersion {
                expected: REPLAY_VERSION,
                found: replay.version,
            });
        }

        Ok(replay)
    }

    /// Get the initial world for playback.
    ///
    /// # Errors
    /// Returns an error if state deserialization fails.
    pub fn restore_initial_state(&self) -> Result<World> {
        World::deserialize(&self.initial_state)
    }

    /// Events scheduled for a specific frame.
    #[must_use]
    pub fn events_at_frame(&self, frame: u32) -> Vec<&Event> {
        self.events.iter().filter(|e| e.frame == frame).collect()
    }

    /// Get the total duration of the replay in frames.
    #[must_use]
    pub const fn duration(&self) -> u32 {
        self.final_frame
    }

    /// Get the total number of events in the replay.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

/// Replay playback controller.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    world: World,
    event_index: usize,
    /// Whether playback is paused.
    pub paused: bool,
}

impl ReplayPlayer {
    /// Create a new replay player from a replay.
    ///
    /// # Errors
    /// Returns an error if the initial state cannot be restored.
    pub fn new(replay: Replay) -> Result<Self> {
        let world = replay.restore_initial_state()?;
        Ok(Self {
            replay,
            world,
            event_index: 0,
            paused: false,
        })
    }

    /// Current playback frame.
    #[must_use]
    pub fn current_frame(&self) -> u32 {
        self.world.frame()
    }

    fn step(&mut self) {
        let frame = self.world.frame();
        while let Some(event) = self.replay.events.get(self.event_index) {
            if event.frame > frame {
                break;
            }
            if !self.world.do_list.add(event.clone()) {
                tracing::warn!(frame, "Replay event dropped: do-list full");
            }
            self.event_index += 1;
        }
        self.world.tick();
    }

    /// Advance the replay by one frame.
    ///
    /// Returns true if there are more frames to play.
    pub fn advance(&mut self) -> bool {
        if self.paused || self.is_finished() {
            return !self.is_finished();
        }
        self.step();
        !self.is_finished()
    }

    /// Seek to a specific frame.
    ///
    /// # Errors
    /// Returns an error if state restoration fails.
    pub fn seek(&mut self, target_frame: u32) -> Result<()> {
        if target_frame < self.world.frame() {
            self.world = self.replay.restore_initial_state()?;
            self.event_index = 0;
        }
        while self.world.frame() < target_frame && !self.is_finished() {
            self.step();
        }
        Ok(())
    }

    /// The world being played.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Get the replay being played.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// Check if the replay has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.world.frame() >= self.replay.final_frame
    }

    /// Toggle pause state.
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Play to the end and compare against the recorded final hash.
    ///
    /// # Errors
    /// Returns [`GameError::DesyncDetected`] if the hashes differ, or an
    /// error if state restoration fails.
    pub fn verify(&mut self) -> Result<()> {
        self.seek(self.replay.final_frame)?;
        let actual = self.world.state_hash();
        if actual != self.replay.final_hash {
            return Err(GameError::DesyncDetected {
                tick: u64::from(self.world.frame()),
                local_hash: actual,
                remote_hash: self.replay.final_hash,
            });
        }
        Ok(())
    }

    /// Progress as a percentage (0-100).
    #[must_use]
    pub fn progress_percent(&self) -> u32 {
        if self.replay.final_frame == 0 {
            100
        } else {
            (u64::from(self.world.frame()) * 100 / u64::from(self.replay.final_frame)) as u32
        }
    }
}
