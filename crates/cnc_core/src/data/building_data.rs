//! Building type definitions.

use serde::{Deserialize, Serialize};

use crate::production::ProductionKind;

/// Data-driven building definition.
///
/// # Example RON
///
/// ```ron
/// BuildingTypeData(
///     name: "WEAP",
///     cost: 2000,
///     build_time: 600,
///     strength: 1000,
///     width: 3,
///     height: 2,
///     factory: Some(Unit),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingTypeData {
    /// Short identifier, also used in scenarios.
    pub name: String,

    /// Credits to build.
    pub cost: u32,

    /// Frames to build at full funding.
    pub build_time: u32,

    /// Maximum strength.
    pub strength: u16,

    /// Footprint width in cells.
    #[serde(default = "default_size")]
    pub width: u8,

    /// Footprint height in cells.
    #[serde(default = "default_size")]
    pub height: u8,

    /// Kind of object this building produces, if it is a factory.
    #[serde(default)]
    pub factory: Option<ProductionKind>,
}

const fn default_size() -> u8 {
    1
}

impl BuildingTypeData {
    /// Create a building type.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        cost: u32,
        build_time: u32,
        strength: u16,
        width: u8,
        height: u8,
    ) -> Self {
        Self {
            name: name.into(),
            cost,
            build_time,
            strength,
            width,
            height,
            factory: None,
        }
    }

    /// Make this building a factory for `kind`.
    #[must_use]
    pub const fn with_factory(mut self, kind: ProductionKind) -> Self {
        self.factory = Some(kind);
        self
    }
}
