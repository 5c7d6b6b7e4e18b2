//! Fixed-point and grid math for deterministic simulation.
//!
//! Positions are measured in leptons: 256 leptons span one map cell. All
//! arithmetic is integer or unsigned 16.16 fixed point so that every peer
//! computes bit-identical results.

use fixed::types::U16F16;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for ratios, speed fractions and ground costs.
///
/// Unsigned 16 bits of integer and 16 bits of fraction. Multiplication
/// truncates, matching the engine's original fixed class.
pub type Fixed = U16F16;

/// Leptons per cell along one axis.
pub const CELL_LEPTON_W: i32 = 256;

/// Leptons per pixel step consumed by the track walker.
pub const PIXEL_LEPTON_W: i32 = 10;

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (u32)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u32::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Build the fraction `numerator / denominator` with truncation.
///
/// Returns zero for a zero denominator and saturates above 65535.
#[must_use]
pub fn fixed_ratio(numerator: u32, denominator: u32) -> Fixed {
    if denominator == 0 {
        return Fixed::ZERO;
    }
    let raw = (u64::from(numerator) << 16) / u64::from(denominator);
    Fixed::from_bits(u32::try_from(raw).unwrap_or(u32::MAX))
}

/// Multiply an integer by a fraction and round to the nearest integer.
///
/// The product itself truncates; only the conversion back to an integer
/// rounds, which is exactly how the original fixed class behaved.
#[must_use]
pub fn scale_int(value: u32, fraction: Fixed) -> u32 {
    let product = u64::from(value) * u64::from(fraction.to_bits());
    ((product + 0x8000) >> 16) as u32
}

/// Speed byte (0..=255) as a fraction of full speed.
#[must_use]
pub const fn speed_fraction(speed: u8) -> Fixed {
    Fixed::from_bits((speed as u32) << 8)
}

/// A compass direction with 256 steps, 0 = north, increasing clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dir(pub u8);

impl Dir {
    /// North.
    pub const N: Self = Self(0);
    /// North-east.
    pub const NE: Self = Self(32);
    /// East.
    pub const E: Self = Self(64);
    /// South-east.
    pub const SE: Self = Self(96);
    /// South.
    pub const S: Self = Self(128);
    /// South-west.
    pub const SW: Self = Self(160);
    /// West.
    pub const W: Self = Self(192);
    /// North-west.
    pub const NW: Self = Self(224);
    /// Sentinel returned when a direction is undefined.
    pub const NONE: Self = Self(0xFF);

    /// Nearest of the eight compass facings.
    #[must_use]
    pub const fn to_facing8(self) -> FacingType {
        FacingType::from_index((self.0.wrapping_add(16)) >> 5)
    }

    /// Signed shortest rotation from `self` to `other`.
    #[must_use]
    pub const fn delta_to(self, other: Self) -> i8 {
        other.0.wrapping_sub(self.0) as i8
    }

    /// Raw value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// One of the eight cell-to-cell movement facings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum FacingType {
    /// North.
    N = 0,
    /// North-east.
    NE = 1,
    /// East.
    E = 2,
    /// South-east.
    SE = 3,
    /// South.
    S = 4,
    /// South-west.
    SW = 5,
    /// West.
    W = 6,
    /// North-west.
    NW = 7,
}

impl FacingType {
    /// All facings in clockwise order starting north.
    pub const ALL: [Self; 8] = [
        Self::N,
        Self::NE,
        Self::E,
        Self::SE,
        Self::S,
        Self::SW,
        Self::W,
        Self::NW,
    ];

    /// Facing for an index, wrapping modulo eight.
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        Self::ALL[(index & 7) as usize]
    }

    /// Index 0..8.
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Equivalent 256-step direction.
    #[must_use]
    pub const fn to_dir(self) -> Dir {
        Dir((self as u8) << 5)
    }

    /// Cell step `(dx, dy)` for this facing.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::N => (0, -1),
            Self::NE => (1, -1),
            Self::E => (1, 0),
            Self::SE => (1, 1),
            Self::S => (0, 1),
            Self::SW => (-1, 1),
            Self::W => (-1, 0),
            Self::NW => (-1, -1),
        }
    }

    /// Whether this is a diagonal facing.
    #[must_use]
    pub const fn is_diagonal(self) -> bool {
        (self as u8) & 1 == 1
    }
}

/// A map cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl CellPos {
    /// Create a cell position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Neighbouring cell in the given facing.
    #[must_use]
    pub const fn adjacent(self, facing: FacingType) -> Self {
        let (dx, dy) = facing.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Lepton coordinate of the cell centre.
    #[must_use]
    pub const fn center(self) -> Coord {
        Coord::new(
            self.x * CELL_LEPTON_W + CELL_LEPTON_W / 2,
            self.y * CELL_LEPTON_W + CELL_LEPTON_W / 2,
        )
    }

    /// Chebyshev distance in cells.
    #[must_use]
    pub fn cell_distance(self, other: Self) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// A world position in leptons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    /// Horizontal lepton position.
    pub x: i32,
    /// Vertical lepton position (grows southward).
    pub y: i32,
}

impl Coord {
    /// Create a coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Cell containing this coordinate.
    #[must_use]
    pub const fn cell(self) -> CellPos {
        CellPos::new(
            self.x.div_euclid(CELL_LEPTON_W),
            self.y.div_euclid(CELL_LEPTON_W),
        )
    }

    /// Snap to the centre of the containing cell.
    #[must_use]
    pub const fn snap(self) -> Self {
        self.cell().center()
    }

    /// Coordinate one full cell away in the given facing.
    #[must_use]
    pub const fn adjacent(self, facing: FacingType) -> Self {
        let (dx, dy) = facing.offset();
        Self::new(self.x + dx * CELL_LEPTON_W, self.y + dy * CELL_LEPTON_W)
    }

    /// Offset by a lepton delta.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Approximate distance: the longer axis plus half the shorter.
    #[must_use]
    pub fn distance(self, other: Self) -> i32 {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        if dy > dx {
            dy + dx / 2
        } else {
            dx + dy / 2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_ratio_truncates() {
        let third = fixed_ratio(1, 3);
        assert_eq!(third.to_bits(), 0x5555);
        assert_eq!(fixed_ratio(5, 0), Fixed::ZERO);
        assert_eq!(fixed_ratio(1, 2), Fixed::from_bits(0x8000));
    }

    #[test]
    fn test_scale_int_rounds_result() {
        // 30 * 0.5 = 15
        assert_eq!(scale_int(30, speed_fraction(128)), 15);
        // 30 * 255/256 = 29.88 -> 30
        assert_eq!(scale_int(30, speed_fraction(255)), 30);
        // 7 * 1/3 = 2.33 -> 2
        assert_eq!(scale_int(7, fixed_ratio(1, 3)), 2);
        assert_eq!(scale_int(255, Fixed::ONE), 255);
    }

    #[test]
    fn test_fixed_determinism() {
        let a = fixed_ratio(1, 3);
        let b = fixed_ratio(1, 3);
        assert_eq!(a, b);
        assert_eq!(a * Fixed::from_num(7), b * Fixed::from_num(7));
    }

    #[test]
    fn test_dir_to_facing8() {
        assert_eq!(Dir::N.to_facing8(), FacingType::N);
        assert_eq!(Dir(15).to_facing8(), FacingType::N);
        assert_eq!(Dir(16).to_facing8(), FacingType::NE);
        assert_eq!(Dir(250).to_facing8(), FacingType::N);
        assert_eq!(Dir::SW.to_facing8(), FacingType::SW);
        assert_eq!(FacingType::W.to_dir(), Dir::W);
    }

    #[test]
    fn test_dir_delta_wraps() {
        assert_eq!(Dir(250).delta_to(Dir(4)), 10);
        assert_eq!(Dir(4).delta_to(Dir(250)), -10);
        assert_eq!(Dir::N.delta_to(Dir::S), -128);
    }

    #[test]
    fn test_coord_cell_conversion() {
        let cell = CellPos::new(3, 7);
        let center = cell.center();
        assert_eq!(center, Coord::new(3 * 256 + 128, 7 * 256 + 128));
        assert_eq!(center.cell(), cell);
        assert_eq!(center.adjacent(FacingType::NE).cell(), CellPos::new(4, 6));
        assert_eq!(Coord::new(-1, -1).cell(), CellPos::new(-1, -1));
    }

    #[test]
    fn test_coord_distance() {
        let a = Coord::new(0, 0);
        assert_eq!(a.distance(Coord::new(100, 0)), 100);
        assert_eq!(a.distance(Coord::new(100, 40)), 120);
        assert_eq!(a.distance(Coord::new(-40, 100)), 120);
    }
}
