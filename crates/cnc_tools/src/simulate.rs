//! Headless scenario runner.

use std::fmt;
use std::path::Path;

use cnc_core::replay::Replay;
use cnc_core::save::save_to_file;
use cnc_core::scenario::Scenario;
use cnc_core::world::World;

use crate::error::Result;

/// Totals gathered while a scenario ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationSummary {
    /// Scenario name.
    pub name: String,
    /// Frames simulated.
    pub frames: u32,
    /// Events executed from the do-list.
    pub events_executed: usize,
    /// Weapon and special weapon hits.
    pub hits: usize,
    /// Objects destroyed.
    pub deaths: usize,
    /// Units and buildings finished by factories.
    pub produced: usize,
    /// Units left at the end.
    pub units_left: usize,
    /// Buildings left at the end.
    pub buildings_left: usize,
    /// Houses defeated during the run.
    pub defeated: Vec<String>,
    /// Final state hash.
    pub final_hash: u64,
    /// Final frame checksum.
    pub final_crc: u32,
}

impl fmt::Display for SimulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scenario:   {}", self.name)?;
        writeln!(f, "Frames:     {}", self.frames)?;
        writeln!(f, "Events:     {}", self.events_executed)?;
        writeln!(f, "Hits:       {}", self.hits)?;
        writeln!(f, "Deaths:     {}", self.deaths)?;
        writeln!(f, "Produced:   {}", self.produced)?;
        writeln!(f, "Units:      {}", self.units_left)?;
        writeln!(f, "Buildings:  {}", self.buildings_left)?;
        if !self.defeated.is_empty() {
            writeln!(f, "Defeated:   {}", self.defeated.join(", "))?;
        }
        writeln!(f, "State hash: {:016x}", self.final_hash)?;
        write!(f, "Frame CRC:  {:08x}", self.final_crc)
    }
}

/// A finished run: the summary, the recorded replay and the final world.
#[derive(Debug)]
pub struct SimulationRun {
    /// Totals.
    pub summary: SimulationSummary,
    /// Replay of the run.
    pub replay: Replay,
    /// World after the last frame.
    pub world: World,
}

/// Run `scenario` for `frames` frames, or the scenario's own length.
///
/// The game stops early once the local player leaves or only one house
/// remains undefeated.
///
/// # Errors
///
/// Returns an error if the scenario is invalid or the world cannot be
/// serialized for the replay.
pub fn run_scenario(scenario: &Scenario, frames: Option<u32>) -> Result<SimulationRun> {
    let frames = frames.unwrap_or(scenario.frames);
    let mut world = World::from_scenario(scenario)?;
    let mut replay = Replay::new(scenario.name.clone(), scenario.seed, &world)?;
    let mut summary = SimulationSummary {
        name: scenario.name.clone(),
        ..SimulationSummary::default()
    };

    let multi_house = world.houses.len() > 1;
    for _ in 0..frames {
        let events = world.tick();
        summary.events_executed += events.executed;
        summary.hits += events.damage_events.len();
        summary.deaths += events.deaths.len();
        summary.produced += events.production_complete.len();

        if world.save_requested {
            world.save_requested = false;
            tracing::info!(frame = world.frame(), "Save requested by event");
        }
        let standing = world.houses.iter().filter(|h| !h.is_defeated).count();
        if !world.game_active || (multi_house && standing <= 1) {
            tracing::info!(frame = world.frame(), standing, "Game over");
            break;
        }
    }

    summary.frames = world.frame();
    summary.units_left = world.units.len();
    summary.buildings_left = world.buildings.len();
    summary.defeated = world
        .houses
        .iter()
        .filter(|h| h.is_defeated)
        .map(|h| h.name.clone())
        .collect();
    summary.final_hash = world.state_hash();
    summary.final_crc = world.frame_crc();
    replay.finalize(summary.frames, summary.final_hash);

    tracing::info!(
        name = %summary.name,
        frames = summary.frames,
        deaths = summary.deaths,
        "Scenario finished"
    );
    Ok(SimulationRun { summary, replay, world })
}

/// Load a scenario file, run it, and optionally write the replay and a
/// save of the final world.
///
/// # Errors
///
/// Returns an error if any file cannot be read or written.
pub fn simulate_file(
    scenario_path: &Path,
    frames: Option<u32>,
    replay_out: Option<&Path>,
    save_out: Option<&Path>,
) -> Result<SimulationSummary> {
    let scenario = Scenario::load(scenario_path)?;
    let run = run_scenario(&scenario, frames)?;
    if let Some(path) = replay_out {
        run.replay.save(path)?;
    }
    if let Some(path) = save_out {
        save_to_file(&run.world, path)?;
    }
    Ok(run.summary)
}
