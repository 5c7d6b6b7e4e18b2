//! Terrain movement costs.

use serde::{Deserialize, Serialize};

use super::unit_data::SpeedClass;
use crate::math::{fixed_ratio, Fixed};

/// Movement cost of one land type, as a percentage of full speed per
/// locomotion class. Zero means impassable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroundCost {
    /// Infantry.
    #[serde(default)]
    pub foot: u8,
    /// Tracked vehicles.
    #[serde(default)]
    pub track: u8,
    /// Wheeled vehicles.
    #[serde(default)]
    pub wheel: u8,
    /// Aircraft.
    #[serde(default)]
    pub winged: u8,
    /// Ships.
    #[serde(default)]
    pub float: u8,
    /// Buildings may be placed here.
    #[serde(default)]
    pub buildable: bool,
}

impl GroundCost {
    /// Land cost for ground units with the given percentages.
    #[must_use]
    pub const fn land(foot: u8, track: u8, wheel: u8, buildable: bool) -> Self {
        Self {
            foot,
            track,
            wheel,
            winged: 100,
            float: 0,
            buildable,
        }
    }

    /// Percentage for a locomotion class.
    #[must_use]
    pub const fn percent(&self, speed: SpeedClass) -> u8 {
        match speed {
            SpeedClass::Foot => self.foot,
            SpeedClass::Track => self.track,
            SpeedClass::Wheel => self.wheel,
            SpeedClass::Winged => self.winged,
            SpeedClass::Float => self.float,
        }
    }

    /// Cost as a fraction of full speed.
    #[must_use]
    pub fn cost(&self, speed: SpeedClass) -> Fixed {
        fixed_ratio(u32::from(self.percent(speed)), 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_fraction() {
        let clear = GroundCost::land(90, 80, 60, true);
        assert_eq!(clear.cost(SpeedClass::Track), fixed_ratio(80, 100));
        assert_eq!(clear.cost(SpeedClass::Float), Fixed::ZERO);
        assert_eq!(clear.percent(SpeedClass::Winged), 100);
    }
}
