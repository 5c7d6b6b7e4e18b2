//! Game rules loaded from RON.
//!
//! [`Rules`] holds every tunable the simulation reads: terrain costs, object
//! types and the network defaults. All peers must load identical rules, so
//! the rules are part of the scenario digest and of every save.
//!
//! # Example RON
//!
//! ```ron
//! Rules(
//!     condition_yellow: 50,
//!     close_enough_distance: 640,
//!     unit_types: [
//!         UnitTypeData(name: "1TNK", cost: 700, build_time: 300, strength: 300,
//!                      max_speed: 18, speed_class: Track, rot: 5),
//!     ],
//! )
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::{BuildingTypeData, GroundCost, SpeedClass, UnitTypeData};
use crate::error::{GameError, Result};
use crate::map::LandType;
use crate::math::{fixed_ratio, Fixed};

/// Network and pacing defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommRules {
    /// Magic number stamped on every packet of this game.
    #[serde(default = "default_magic")]
    pub magic: u16,
    /// Send queue capacity.
    #[serde(default = "default_slots")]
    pub send_slots: usize,
    /// Receive queue capacity.
    #[serde(default = "default_slots")]
    pub receive_slots: usize,
    /// Largest packet in bytes.
    #[serde(default = "default_packet_len")]
    pub max_packet_len: usize,
    /// Samples before the response-time average starts decaying.
    #[serde(default = "default_response_window")]
    pub response_window: u32,
    /// Ticks between retransmissions of an unacknowledged packet.
    #[serde(default = "default_retry_delta")]
    pub retry_delta: u32,
    /// Transmissions after which the connection is considered lost.
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Ticks after the first transmission after which the connection is
    /// considered lost.
    #[serde(default = "default_timeout")]
    pub timeout: Option<u32>,
    /// Target frames per second.
    #[serde(default = "default_frame_rate")]
    pub desired_frame_rate: u16,
    /// Frames of command lead time.
    #[serde(default = "default_max_ahead")]
    pub max_ahead: u32,
    /// Capacity of the outgoing and pending event lists.
    #[serde(default = "default_event_queue_size")]
    pub event_queue_size: usize,
}

const fn default_magic() -> u16 {
    0x5150
}

const fn default_slots() -> usize {
    64
}

const fn default_packet_len() -> usize {
    512
}

const fn default_response_window() -> u32 {
    crate::comm_queue::RESPONSE_WINDOW
}

const fn default_retry_delta() -> u32 {
    60
}

#[allow(clippy::unnecessary_wraps)]
const fn default_timeout() -> Option<u32> {
    Some(3600)
}

const fn default_frame_rate() -> u16 {
    60
}

const fn default_max_ahead() -> u32 {
    16
}

const fn default_event_queue_size() -> usize {
    256
}

impl Default for CommRules {
    fn default() -> Self {
        Self {
            magic: default_magic(),
            send_slots: default_slots(),
            receive_slots: default_slots(),
            max_packet_len: default_packet_len(),
            response_window: default_response_window(),
            retry_delta: default_retry_delta(),
            max_retries: None,
            timeout: default_timeout(),
            desired_frame_rate: default_frame_rate(),
            max_ahead: default_max_ahead(),
            event_queue_size: default_event_queue_size(),
        }
    }
}

/// Every tunable the simulation reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    /// Movement cost per land type.
    pub ground: BTreeMap<LandType, GroundCost>,
    /// Health percentage at or below which a unit slows to three quarters.
    pub condition_yellow: u8,
    /// Leptons within which a blocked move counts as arrived.
    pub close_enough_distance: i32,
    /// Leptons a guarding unit may wander from its post.
    pub stray_distance: i32,
    /// Simulation frames per game minute.
    pub ticks_per_minute: u32,
    /// Percentage of cost refunded when selling.
    pub refund_percent: u8,
    /// Strength restored per repair step.
    pub repair_step: u16,
    /// Frames between repair steps.
    pub repair_rate: u32,
    /// Credits charged per repair step.
    pub repair_step_cost: u32,
    /// Strength of a wall segment.
    pub wall_strength: u16,
    /// Credits refunded for a sold wall segment.
    pub wall_refund: u32,
    /// Frames for a special weapon to recharge.
    pub special_charge_time: u32,
    /// Damage dealt to everything in the target cell by a nuke.
    pub nuke_damage: u16,
    /// Unit types, indexed by type id.
    pub unit_types: Vec<UnitTypeData>,
    /// Building types, indexed by type id.
    pub building_types: Vec<BuildingTypeData>,
    /// Network and pacing defaults.
    pub comm: CommRules,
}

impl Default for Rules {
    fn default() -> Self {
        let mut ground = BTreeMap::new();
        ground.insert(LandType::Clear, GroundCost::land(90, 80, 60, true));
        ground.insert(LandType::Road, GroundCost::land(100, 100, 100, true));
        ground.insert(LandType::Rough, GroundCost::land(80, 70, 40, false));
        ground.insert(LandType::Ore, GroundCost::land(90, 70, 50, true));
        ground.insert(LandType::Beach, GroundCost::land(80, 70, 40, false));
        ground.insert(LandType::Rock, GroundCost::land(0, 0, 0, false));
        ground.insert(LandType::Wall, GroundCost::land(0, 0, 0, false));
        ground.insert(
            LandType::Water,
            GroundCost {
                float: 100,
                winged: 100,
                ..GroundCost::default()
            },
        );
        ground.insert(
            LandType::River,
            GroundCost {
                winged: 100,
                ..GroundCost::default()
            },
        );

        Self {
            ground,
            condition_yellow: 50,
            close_enough_distance: 640,
            stray_distance: 512,
            ticks_per_minute: 900,
            refund_percent: 50,
            repair_step: 7,
            repair_rate: 15,
            repair_step_cost: 2,
            wall_strength: 100,
            wall_refund: 25,
            special_charge_time: 900 * 5,
            nuke_damage: 1000,
            unit_types: default_unit_types(),
            building_types: default_building_types(),
            comm: CommRules::default(),
        }
    }
}

fn default_unit_types() -> Vec<UnitTypeData> {
    vec![
        UnitTypeData::new("MCV", 2500, 1000, 600, 12, SpeedClass::Track, 5).crusher(),
        UnitTypeData::new("1TNK", 700, 300, 300, 18, SpeedClass::Track, 5)
            .with_turret(25, 1024, 40)
            .crusher(),
        UnitTypeData::new("2TNK", 800, 360, 400, 15, SpeedClass::Track, 5)
            .with_turret(30, 1216, 50)
            .crusher(),
        UnitTypeData::new("HARV", 1400, 400, 600, 12, SpeedClass::Track, 5).crusher(),
        UnitTypeData::new("JEEP", 600, 200, 150, 30, SpeedClass::Wheel, 10).with_turret(15, 1024, 20),
        UnitTypeData::new("APC", 800, 300, 200, 30, SpeedClass::Track, 5)
            .with_weapon(15, 1280, 20)
            .crusher(),
    ]
}

fn default_building_types() -> Vec<BuildingTypeData> {
    use crate::production::ProductionKind;
    vec![
        BuildingTypeData::new("FACT", 2500, 1000, 1000, 3, 3).with_factory(ProductionKind::Building),
        BuildingTypeData::new("WEAP", 2000, 600, 1000, 3, 2).with_factory(ProductionKind::Unit),
        BuildingTypeData::new("POWR", 300, 200, 400, 2, 2),
        BuildingTypeData::new("PROC", 2000, 600, 900, 3, 3),
    ]
}

impl Rules {
    /// Load rules from a RON file.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Io`] if the file cannot be read and
    /// [`GameError::DataParseError`] if it does not parse.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let rules = Self::parse(&content, &path.display().to_string())?;
        tracing::info!(
            path = %path.display(),
            unit_types = rules.unit_types.len(),
            building_types = rules.building_types.len(),
            "Rules loaded"
        );
        Ok(rules)
    }

    /// Parse rules from a RON string.
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

    /// Movement cost of a land type for a locomotion class.
    #[must_use]
    pub fn ground_cost(&self, land: LandType, speed: SpeedClass) -> Fixed {
        self.ground
            .get(&land)
            .map_or(Fixed::ZERO, |cost| cost.cost(speed))
    }

    /// Whether a locomotion class can cross a land type at all.
    #[must_use]
    pub fn is_passable(&self, land: LandType, speed: SpeedClass) -> bool {
        self.ground
            .get(&land)
            .is_some_and(|cost| cost.percent(speed) > 0)
    }

    /// Whether buildings may be placed on a land type.
    #[must_use]
    pub fn is_buildable(&self, land: LandType) -> bool {
        self.ground.get(&land).is_some_and(|cost| cost.buildable)
    }

    /// Health ratio at or below which units slow down.
    #[must_use]
    pub fn condition_yellow(&self) -> Fixed {
        fixed_ratio(u32::from(self.condition_yellow), 100)
    }

    /// Unit type by id.
    #[must_use]
    pub fn unit_type(&self, id: u8) -> Option<&UnitTypeData> {
        self.unit_types.get(usize::from(id))
    }

    /// Building type by id.
    #[must_use]
    pub fn building_type(&self, id: u8) -> Option<&BuildingTypeData> {
        self.building_types.get(usize::from(id))
    }

    /// Unit type id by name.
    #[must_use]
    pub fn unit_type_id(&self, name: &str) -> Option<u8> {
        self.unit_types
            .iter()
            .position(|t| t.name == name)
            .and_then(|index| u8::try_from(index).ok())
    }

    /// Building type id by name.
    #[must_use]
    pub fn building_type_id(&self, name: &str) -> Option<u8> {
        self.building_types
            .iter()
            .position(|t| t.name == name)
            .and_then(|index| u8::try_from(index).ok())
    }

    /// Check internal consistency.
    ///
    /// Returns a list of problems; an empty list means the rules are usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.unit_types.len() > usize::from(u8::MAX) {
            errors.push(format!("Too many unit types: {}", self.unit_types.len()));
        }
        if self.building_types.len() > usize::from(u8::MAX) {
            errors.push(format!(
                "Too many building types: {}",
                self.building_types.len()
            ));
        }

        for unit in &self.unit_types {
            if unit.rot == 0 {
                errors.push(format!("Unit '{}' cannot rotate", unit.name));
            }
            if let Some(weapon) = &unit.weapon {
                if weapon.rate == 0 {
                    errors.push(format!("Unit '{}' has a zero rate of fire", unit.name));
                }
            }
        }

        for building in &self.building_types {
            if building.width == 0 || building.height == 0 {
                errors.push(format!("Building '{}' has an empty footprint", building.name));
            }
        }

        if self.comm.send_slots == 0 || self.comm.receive_slots == 0 {
            errors.push("Comm queues need at least one slot".to_string());
        }
        if self.comm.response_window == 0 {
            errors.push("Response window must be positive".to_string());
        }
        if self.condition_yellow > 100 || self.refund_percent > 100 {
            errors.push("Percentages must not exceed 100".to_string());
        }

        errors
    }
}
