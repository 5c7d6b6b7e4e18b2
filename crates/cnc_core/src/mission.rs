//! Unit missions.

use serde::{Deserialize, Serialize};

/// Standing order a unit carries out between events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Mission {
    /// Do nothing, not even respond to attack.
    Sleep = 0,
    /// Attack the assigned target.
    Attack = 1,
    /// Move to the navigation destination.
    Move = 2,
    /// Queued move: destinations are appended rather than replaced.
    QMove = 3,
    /// Leave the map.
    Retreat = 4,
    /// Stay put and respond to threats in range.
    #[default]
    Guard = 5,
    /// Guard without ever moving.
    Sticky = 6,
    /// Enter a building or transport.
    Enter = 7,
    /// Capture a building.
    Capture = 8,
    /// Gather ore.
    Harvest = 9,
    /// Guard an area, returning to the archived location.
    GuardArea = 10,
    /// Return to a refinery or base.
    Return = 11,
    /// Stop all activity.
    Stop = 12,
    /// Wait in ambush until an enemy is near.
    Ambush = 13,
    /// Seek out and attack enemies.
    Hunt = 14,
    /// Unload cargo or deploy.
    Unload = 15,
    /// Sabotage a building.
    Sabotage = 16,
    /// Building construction animation.
    Construction = 17,
    /// Building sell-back animation.
    Deconstruction = 18,
    /// Go get repaired.
    Repair = 19,
    /// Rescue a captive.
    Rescue = 20,
    /// Missile silo launch.
    Missile = 21,
    /// Never fire back.
    Harmless = 22,
}

impl Mission {
    /// Mission for a wire byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Sleep,
            1 => Self::Attack,
            2 => Self::Move,
            3 => Self::QMove,
            4 => Self::Retreat,
            5 => Self::Guard,
            6 => Self::Sticky,
            7 => Self::Enter,
            8 => Self::Capture,
            9 => Self::Harvest,
            10 => Self::GuardArea,
            11 => Self::Return,
            12 => Self::Stop,
            13 => Self::Ambush,
            14 => Self::Hunt,
            15 => Self::Unload,
            16 => Self::Sabotage,
            17 => Self::Construction,
            18 => Self::Deconstruction,
            19 => Self::Repair,
            20 => Self::Rescue,
            21 => Self::Missile,
            22 => Self::Harmless,
            _ => return None,
        })
    }

    /// Wire byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Missions during which a unit looks for targets on its own.
    #[must_use]
    pub const fn is_aggressive(self) -> bool {
        matches!(
            self,
            Self::Attack | Self::Hunt | Self::Guard | Self::GuardArea | Self::Ambush
        )
    }

    /// Missions a team may pull a unit out of.
    #[must_use]
    pub const fn is_recruitable(self) -> bool {
        matches!(
            self,
            Self::Guard | Self::GuardArea | Self::Hunt | Self::Ambush | Self::Sleep | Self::Move
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values_round_trip() {
        for value in 0..=22u8 {
            let mission = Mission::from_u8(value).unwrap();
            assert_eq!(mission.as_u8(), value);
        }
        assert_eq!(Mission::from_u8(23), None);
    }

    #[test]
    fn test_recruitable() {
        assert!(Mission::Guard.is_recruitable());
        assert!(!Mission::Attack.is_recruitable());
        assert!(!Mission::Harvest.is_recruitable());
    }
}
