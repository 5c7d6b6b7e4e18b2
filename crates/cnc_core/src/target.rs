//! Replicated references to objects and places.
//!
//! A [`Target`] names a unit, building or cell by stable identifier so it
//! can travel inside events and be resolved against any peer's world.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::building::BuildingId;
use crate::codec;
use crate::error::{GameError, Result};
use crate::math::{CellPos, Coord};
use crate::unit::UnitId;

/// Something a unit can move toward, attack or remember.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Target {
    /// Nothing.
    #[default]
    None,
    /// A unit by id.
    Unit(UnitId),
    /// A building by id.
    Building(BuildingId),
    /// A map cell.
    Cell(CellPos),
}

impl Target {
    /// Encoded size in bytes: tag plus a 32-bit value.
    pub const WIRE_LEN: usize = 5;

    /// Whether the target refers to anything.
    #[must_use]
    pub const fn is_some(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Unit id, if this targets a unit.
    #[must_use]
    pub const fn as_unit(self) -> Option<UnitId> {
        match self {
            Self::Unit(id) => Some(id),
            _ => None,
        }
    }

    /// Building id, if this targets a building.
    #[must_use]
    pub const fn as_building(self) -> Option<BuildingId> {
        match self {
            Self::Building(id) => Some(id),
            _ => None,
        }
    }

    /// Cell, if this targets a cell.
    #[must_use]
    pub const fn as_cell(self) -> Option<CellPos> {
        match self {
            Self::Cell(cell) => Some(cell),
            _ => None,
        }
    }

    /// Cell-centre coordinate for a cell target.
    ///
    /// Object targets resolve through the world, see
    /// [`World::target_coord`](crate::world::World::target_coord).
    #[must_use]
    pub const fn cell_coord(self) -> Option<Coord> {
        match self {
            Self::Cell(cell) => Some(cell.center()),
            _ => None,
        }
    }

    /// Write the tagged encoding.
    pub fn encode(self, w: &mut dyn Write) -> Result<()> {
        let (tag, value) = match self {
            Self::None => (0, 0),
            Self::Unit(id) => (1, id),
            Self::Building(id) => (2, id),
            Self::Cell(cell) => (3, pack_cell(cell)),
        };
        codec::write_u8(w, tag)?;
        codec::write_u32_le(w, value)
    }

    /// Read the tagged encoding.
    pub fn decode(r: &mut dyn Read) -> Result<Self> {
        let tag = codec::read_u8(r)?;
        let value = codec::read_u32_le(r)?;
        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::Unit(value)),
            2 => Ok(Self::Building(value)),
            3 => Ok(Self::Cell(unpack_cell(value))),
            other => Err(GameError::MalformedPacket(format!(
                "unknown target tag {other}"
            ))),
        }
    }
}

/// Pack a cell as two signed 16-bit halves, x low.
#[must_use]
pub fn pack_cell(cell: CellPos) -> u32 {
    u32::from(cell.x as i16 as u16) | (u32::from(cell.y as i16 as u16) << 16)
}

/// Inverse of [`pack_cell`].
#[must_use]
pub fn unpack_cell(value: u32) -> CellPos {
    CellPos::new(
        i32::from((value & 0xFFFF) as u16 as i16),
        i32::from((value >> 16) as u16 as i16),
    )
}
