//! Scenario descriptions.
//!
//! A [`Scenario`] is a RON document naming everything needed to start a
//! game: map size and terrain, houses, starting forces, team recipes and
//! any scripted events. [`World::from_scenario`] turns it into a world.
//!
//! ```
//! use cnc_core::scenario::Scenario;
//! use cnc_core::world::World;
//!
//! let scenario = Scenario::from_ron_str(r#"
//!     Scenario(
//!         name: "duel",
//!         seed: 7,
//!         width: 16,
//!         height: 16,
//!         houses: [
//!             (id: 0, name: "Greece", is_human: true, credits: 1000),
//!             (id: 1, name: "USSR", credits: 1000),
//!         ],
//!         units: [
//!             (owner: 0, unit_type: "1TNK", x: 2, y: 2),
//!             (owner: 1, unit_type: "1TNK", x: 12, y: 12, mission: Some(Hunt)),
//!         ],
//!     )
//! "#).unwrap();
//! let world = World::from_scenario(&scenario).unwrap();
//! assert_eq!(world.units.len(), 2);
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::Rules;
use crate::error::{GameError, Result};
use crate::event::Event;
use crate::house::{House, HouseId};
use crate::map::LandType;
use crate::math::{CellPos, Dir};
use crate::mission::Mission;
use crate::team::TeamType;
use crate::world::World;

/// A rectangle of terrain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainPatch {
    /// Land type to paint.
    pub land: LandType,
    /// Left column.
    pub x: i32,
    /// Top row.
    pub y: i32,
    /// Width in cells.
    #[serde(default = "one")]
    pub width: i32,
    /// Height in cells.
    #[serde(default = "one")]
    pub height: i32,
}

const fn one() -> i32 {
    1
}

/// A player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseSetup {
    /// House id.
    pub id: HouseId,
    /// Display name.
    pub name: String,
    /// Controlled by a person rather than the computer.
    #[serde(default)]
    pub is_human: bool,
    /// Starting credits.
    #[serde(default)]
    pub credits: u32,
    /// Houses this one starts allied with.
    #[serde(default)]
    pub allies: Vec<HouseId>,
}

/// A starting unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSetup {
    /// Owning house.
    pub owner: HouseId,
    /// Unit type name from the rules.
    pub unit_type: String,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Initial facing.
    #[serde(default)]
    pub facing: u8,
    /// Initial mission, guard if omitted.
    #[serde(default)]
    pub mission: Option<Mission>,
}

/// A starting building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingSetup {
    /// Owning house.
    pub owner: HouseId,
    /// Building type name from the rules.
    pub building_type: String,
    /// Upper-left column.
    pub x: i32,
    /// Upper-left row.
    pub y: i32,
}

/// A starting wall segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallSetup {
    /// Owning house.
    pub owner: HouseId,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

/// Everything needed to start a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name, recorded in replays.
    pub name: String,
    /// Seed for the shared random generator.
    #[serde(default)]
    pub seed: u32,
    /// Map width in cells.
    pub width: i32,
    /// Map height in cells.
    pub height: i32,
    /// Rules overriding the defaults.
    #[serde(default)]
    pub rules: Option<Rules>,
    /// Terrain painted over clear ground, in order.
    #[serde(default)]
    pub terrain: Vec<TerrainPatch>,
    /// Players.
    pub houses: Vec<HouseSetup>,
    /// House controlled on this machine.
    #[serde(default)]
    pub local_player: Option<HouseId>,
    /// Starting units.
    #[serde(default)]
    pub units: Vec<UnitSetup>,
    /// Starting buildings.
    #[serde(default)]
    pub buildings: Vec<BuildingSetup>,
    /// Starting walls.
    #[serde(default)]
    pub walls: Vec<WallSetup>,
    /// Waypoints for team scripts, as `(x, y)`.
    #[serde(default)]
    pub waypoints: Vec<(i32, i32)>,
    /// Team recipes.
    #[serde(default)]
    pub team_types: Vec<TeamType>,
    /// Events scheduled before play starts.
    #[serde(default)]
    pub events: Vec<Event>,
    /// Frames a headless run lasts.
    #[serde(default = "default_frames")]
    pub frames: u32,
}

const fn default_frames() -> u32 {
    900
}

impl Scenario {
    /// Load a scenario from a RON file.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Io`] if the file cannot be read and
    /// [`GameError::DataParseError`] if it does not parse.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let scenario = Self::parse(&content, &path.display().to_string())?;
        tracing::info!(path = %path.display(), name = %scenario.name, "Scenario loaded");
        Ok(scenario)
    }

    /// Parse a scenario from a RON string.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] if the text does not parse.
    pub fn from_ron_str(s: &str) -> Result<Self> {
        Self::parse(s, "<inline>")
    }

    fn parse(s: &str, path: &str) -> Result<Self> {
        ron::from_str(s).map_err(|e| GameError::DataParseError {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Check the scenario for inconsistencies. Returns one message per
    /// problem.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let rules = self.rules.clone().unwrap_or_default();
        let mut errors = rules.validate();
        if self.width <= 0 || self.height <= 0 {
            errors.push(format!("Map size {}x{} is empty", self.width, self.height));
        }
        let has_house = |id: HouseId| self.houses.iter().any(|h| h.id == id);
        for unit in &self.units {
            if rules.unit_type_id(&unit.unit_type).is_none() {
                errors.push(format!("Unknown unit type '{}'", unit.unit_type));
            }
            if !has_house(unit.owner) {
                errors.push(format!("Unit '{}' owned by missing house {}", unit.unit_type, unit.owner));
            }
        }
        for building in &self.buildings {
            if rules.building_type_id(&building.building_type).is_none() {
                errors.push(format!("Unknown building type '{}'", building.building_type));
            }
            if !has_house(building.owner) {
                errors.push(format!(
                    "Building '{}' owned by missing house {}",
                    building.building_type, building.owner
                ));
            }
        }
        for team_type in &self.team_types {
            errors.extend(team_type.validate());
            if !has_house(team_type.house) {
                errors.push(format!("Team '{}' belongs to missing house {}", team_type.name, team_type.house));
            }
        }
        errors
    }
}

impl World {
    /// Build the starting world for a scenario.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] if the scenario fails
    /// validation or a building cannot be placed.
    pub fn from_scenario(scenario: &Scenario) -> Result<Self> {
        let errors = scenario.validate();
        if !errors.is_empty() {
            return Err(GameError::InvalidState(format!(
                "Scenario '{}' is invalid: {}",
                scenario.name,
                errors.join("; ")
            )));
        }

        let rules = scenario.rules.clone().unwrap_or_default();
        let mut world = World::with_rules(rules, scenario.width, scenario.height, scenario.seed);

        for patch in &scenario.terrain {
            for y in patch.y..patch.y + patch.height {
                for x in patch.x..patch.x + patch.width {
                    world.map.set_land(CellPos::new(x, y), patch.land);
                }
            }
        }

        for setup in &scenario.houses {
            let mut house = House::new(setup.id, setup.name.clone(), setup.is_human, setup.credits);
            for &ally in &setup.allies {
                house.make_ally(ally);
            }
            world.add_house(house);
        }
        world.set_local_player(scenario.local_player);

        for setup in &scenario.buildings {
            let type_id = world.rules.building_type_id(&setup.building_type).unwrap_or_default();
            if world
                .place_building(setup.owner, type_id, CellPos::new(setup.x, setup.y))
                .is_none()
            {
                return Err(GameError::InvalidState(format!(
                    "Cannot place '{}' at ({}, {})",
                    setup.building_type, setup.x, setup.y
                )));
            }
        }

        let wall_strength = world.rules.wall_strength;
        for wall in &scenario.walls {
            world.map.place_wall(CellPos::new(wall.x, wall.y), wall.owner, wall_strength);
        }

        for setup in &scenario.units {
            let type_id = world.rules.unit_type_id(&setup.unit_type).unwrap_or_default();
            let id = world.spawn_unit(setup.owner, type_id, CellPos::new(setup.x, setup.y), Dir(setup.facing));
            if let (Some(mission), Some(unit)) = (setup.mission, world.units.get_mut(&id)) {
                unit.assign_mission(mission);
            }
        }

        world.waypoints = scenario.waypoints.iter().map(|&(x, y)| CellPos::new(x, y)).collect();
        world.team_types = scenario.team_types.clone();
        for event in &scenario.events {
            if !world.do_list.add(event.clone()) {
                tracing::warn!(frame = event.frame, "Scripted event dropped: do-list full");
            }
        }

        tracing::info!(
            name = %scenario.name,
            houses = world.houses.len(),
            units = world.units.len(),
            buildings = world.buildings.len(),
            "World built from scenario"
        );
        Ok(world)
    }
}
