//! Save and replay inspection.

use std::fmt;
use std::path::Path;

use cnc_core::replay::{Replay, ReplayPlayer};
use cnc_core::save::load_from_file;
use cnc_core::world::World;

use crate::error::Result;

/// One house as recorded in a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HouseSummary {
    /// House id.
    pub id: u8,
    /// Display name.
    pub name: String,
    /// Credits on hand.
    pub credits: u32,
    /// Units owned.
    pub units: usize,
    /// Buildings owned.
    pub buildings: usize,
    /// Whether the house has lost.
    pub defeated: bool,
}

/// Contents of a save file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSummary {
    /// Frame the save was taken on.
    pub frame: u32,
    /// Map size in cells.
    pub map_size: (i32, i32),
    /// Houses in id order.
    pub houses: Vec<HouseSummary>,
    /// Live teams.
    pub teams: usize,
    /// Events still waiting on the do-list.
    pub pending_events: usize,
    /// State hash of the loaded world.
    pub state_hash: u64,
}

impl SaveSummary {
    /// Summarize a world.
    #[must_use]
    pub fn from_world(world: &World) -> Self {
        let houses = world
            .houses
            .iter()
            .map(|h| HouseSummary {
                id: h.id,
                name: h.name.clone(),
                credits: h.credits,
                units: world.units.values().filter(|u| u.owner == h.id).count(),
                buildings: world.buildings.values().filter(|b| b.owner == h.id).count(),
                defeated: h.is_defeated,
            })
            .collect();
        Self {
            frame: world.frame(),
            map_size: (world.map.width(), world.map.height()),
            houses,
            teams: world.teams.len(),
            pending_events: world.do_list.count(),
            state_hash: world.state_hash(),
        }
    }
}

impl fmt::Display for SaveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frame:   {}", self.frame)?;
        writeln!(f, "Map:     {}x{}", self.map_size.0, self.map_size.1)?;
        writeln!(f, "Teams:   {}", self.teams)?;
        writeln!(f, "Pending: {}", self.pending_events)?;
        writeln!(f, "Hash:    {:016x}", self.state_hash)?;
        for house in &self.houses {
            writeln!(
                f,
                "  [{}] {:<12} credits {:>6}  units {:>3}  buildings {:>3}{}",
                house.id,
                house.name,
                house.credits,
                house.units,
                house.buildings,
                if house.defeated { "  (defeated)" } else { "" }
            )?;
        }
        Ok(())
    }
}

/// Load a save file and summarize it.
///
/// # Errors
///
/// Returns an error if the file is missing or not a valid save.
pub fn inspect_save(path: &Path) -> Result<SaveSummary> {
    let world = load_from_file(path)?;
    Ok(SaveSummary::from_world(&world))
}

/// Outcome of replaying a recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Scenario name.
    pub scenario_id: String,
    /// Recorded events.
    pub events: usize,
    /// Frames played.
    pub frames: u32,
    /// Hash the recording ended with.
    pub final_hash: u64,
}

impl fmt::Display for ReplaySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} events over {} frames, final hash {:016x} verified",
            self.scenario_id, self.events, self.frames, self.final_hash
        )
    }
}

/// Play a replay file to the end and check it reproduces the recorded
/// final state.
///
/// # Errors
///
/// Returns [`cnc_core::error::GameError::DesyncDetected`] (wrapped) if the
/// playback diverges, or an error if the file cannot be read.
pub fn verify_replay(path: &Path) -> Result<ReplaySummary> {
    let replay = Replay::load(path)?;
    let summary = ReplaySummary {
        scenario_id: replay.scenario_id.clone(),
        events: replay.event_count(),
        frames: replay.duration(),
        final_hash: replay.final_hash,
    };
    let mut player = ReplayPlayer::new(replay)?;
    player.verify()?;
    tracing::info!(frames = summary.frames, "Replay verified");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::simulate::run_scenario;
    use cnc_core::error::GameError;
    use cnc_core::save::save_to_file;
    use cnc_test_utils::fixtures::{skirmish_scenario, two_house_world};

    #[test]
    fn test_summary_counts_per_house() {
        let summary = SaveSummary::from_world(&two_house_world());
        assert_eq!(summary.houses.len(), 2);
        assert_eq!(summary.houses[0].units, 1);
        assert_eq!(summary.houses[1].name, "USSR");
        assert_eq!(summary.map_size, (16, 16));
    }

    #[test]
    fn test_inspect_save_file() {
        let path = std::env::temp_dir().join("cnc_tools_inspect.sav");
        let world = two_house_world();
        save_to_file(&world, &path).unwrap();

        let summary = inspect_save(&path).unwrap();
        assert_eq!(summary.state_hash, world.state_hash());
        assert!(summary.to_string().contains("Greece"));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_verify_replay_file() {
        let path = std::env::temp_dir().join("cnc_tools_verify.bin");
        let run = run_scenario(&skirmish_scenario(), Some(40)).unwrap();
        run.replay.save(&path).unwrap();
        assert_eq!(verify_replay(&path).unwrap().frames, 40);

        let mut tampered = run.replay.clone();
        tampered.final_hash ^= 1;
        tampered.save(&path).unwrap();
        assert!(matches!(
            verify_replay(&path),
            Err(ToolError::Core(GameError::DesyncDetected { .. }))
        ));

        let _ = std::fs::remove_file(path);
    }
}
