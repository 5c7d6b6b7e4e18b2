//! Unit type definitions.

use serde::{Deserialize, Serialize};

/// Locomotion class, selecting the column of the ground cost table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum SpeedClass {
    /// Infantry.
    Foot = 0,
    /// Tracked vehicles.
    Track = 1,
    /// Wheeled vehicles.
    Wheel = 2,
    /// Aircraft.
    Winged = 3,
    /// Naval.
    Float = 4,
}

impl SpeedClass {
    /// Class for a wire byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Foot),
            1 => Some(Self::Track),
            2 => Some(Self::Wheel),
            3 => Some(Self::Winged),
            4 => Some(Self::Float),
            _ => None,
        }
    }
}

/// Weapon carried by a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponData {
    /// Damage per shot.
    pub damage: u16,

    /// Range in leptons.
    pub range: i32,

    /// Frames between shots.
    pub rate: u16,
}

/// Data-driven unit definition.
///
/// # Example RON
///
/// ```ron
/// UnitTypeData(
///     name: "1TNK",
///     cost: 700,
///     build_time: 300,
///     strength: 300,
///     max_speed: 18,
///     speed_class: Track,
///     rot: 5,
///     is_turret: true,
///     weapon: Some(WeaponData(damage: 25, range: 1024, rate: 40)),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTypeData {
    /// Short identifier, also used in scenarios.
    pub name: String,

    /// Credits to build.
    pub cost: u32,

    /// Frames to build at full funding.
    pub build_time: u32,

    /// Maximum strength.
    pub strength: u16,

    /// Top speed in leptons per frame.
    pub max_speed: u8,

    /// Locomotion class.
    pub speed_class: SpeedClass,

    /// Body and turret rotation rate per frame.
    pub rot: u8,

    /// Carries a turret that rotates independently of the body.
    #[serde(default)]
    pub is_turret: bool,

    /// Crushes infantry and walls it drives over.
    #[serde(default)]
    pub is_crusher: bool,

    /// Primary weapon, if armed.
    #[serde(default)]
    pub weapon: Option<WeaponData>,
}

impl UnitTypeData {
    /// Create an unarmed unit type.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        cost: u32,
        build_time: u32,
        strength: u16,
        max_speed: u8,
        speed_class: SpeedClass,
        rot: u8,
    ) -> Self {
        Self {
            name: name.into(),
            cost,
            build_time,
            strength,
            max_speed,
            speed_class,
            rot,
            is_turret: false,
            is_crusher: false,
            weapon: None,
        }
    }

    /// Arm with a turret-mounted weapon.
    #[must_use]
    pub fn with_turret(mut self, damage: u16, range: i32, rate: u16) -> Self {
        self.is_turret = true;
        self.weapon = Some(WeaponData {
            damage,
            range,
            rate,
        });
        self
    }

    /// Arm with a fixed weapon.
    #[must_use]
    pub fn with_weapon(mut self, damage: u16, range: i32, rate: u16) -> Self {
        self.weapon = Some(WeaponData {
            damage,
            range,
            rate,
        });
        self
    }

    /// Mark as a crusher.
    #[must_use]
    pub const fn crusher(mut self) -> Self {
        self.is_crusher = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_from_ron() {
        let text = r#"UnitTypeData(
            name: "JEEP",
            cost: 600,
            build_time: 200,
            strength: 150,
            max_speed: 30,
            speed_class: Wheel,
            rot: 10,
            is_turret: true,
            weapon: Some(WeaponData(damage: 15, range: 1024, rate: 20)),
        )"#;
        let data: UnitTypeData = ron::from_str(text).unwrap();
        assert_eq!(data.speed_class, SpeedClass::Wheel);
        assert!(data.is_turret);
        assert!(!data.is_crusher);
        assert_eq!(data.weapon.unwrap().range, 1024);
    }

    #[test]
    fn test_builder() {
        let data = UnitTypeData::new("HARV", 1400, 400, 600, 12, SpeedClass::Track, 5).crusher();
        assert!(data.is_crusher);
        assert!(data.weapon.is_none());
        assert_eq!(SpeedClass::from_u8(2), Some(SpeedClass::Wheel));
        assert_eq!(SpeedClass::from_u8(9), None);
    }
}
