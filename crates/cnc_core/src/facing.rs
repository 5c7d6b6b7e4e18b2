//! Facing computation and rotating facings.
//!
//! [`desired_facing8`] and [`desired_facing256`] turn a coordinate delta into
//! a compass direction using integer arithmetic only. [`Facing`] holds a
//! current and desired direction and rotates between them at a clamped rate.

use serde::{Deserialize, Serialize};

use crate::math::Dir;

/// Facing index lookup for [`desired_facing8`].
///
/// Index bits: 3 = target is south, 2 = target is west,
/// 1 = vertical delta dominates, 0 = close to the major axis.
const FACING8_TABLE: [u8; 16] = [1, 2, 1, 0, 7, 6, 7, 0, 3, 2, 3, 4, 5, 6, 5, 4];

/// Coarse facing from `(x1, y1)` toward `(x2, y2)` in 32-step increments.
///
/// A lesser axis at least half the greater one selects the diagonal.
/// Identical points yield north-east, which is what the tie-break produces.
#[must_use]
pub fn desired_facing8(x1: i32, y1: i32, x2: i32, y2: i32) -> Dir {
    let mut index = 0usize;

    let mut dy = i64::from(y1) - i64::from(y2);
    if dy < 0 {
        index |= 1;
        dy = -dy;
    }
    index <<= 1;

    let mut dx = i64::from(x2) - i64::from(x1);
    if dx < 0 {
        index |= 1;
        dx = -dx;
    }
    index <<= 1;

    let (smaller, bigger) = if dx < dy {
        index |= 1;
        (dx, dy)
    } else {
        (dy, dx)
    };
    index <<= 1;

    if smaller < (bigger + 1) / 2 {
        index |= 1;
    }

    Dir(FACING8_TABLE[index] << 5)
}

/// Fine facing from `(x1, y1)` toward `(x2, y2)` with 256 steps.
///
/// Returns [`Dir::NONE`] when the points coincide. Due east is exactly 64
/// and due south exactly 128.
///
/// # Example
///
/// ```
/// use cnc_core::facing::desired_facing256;
/// use cnc_core::math::Dir;
///
/// assert_eq!(desired_facing256(0, 0, 10, 0), Dir::E);
/// assert_eq!(desired_facing256(0, 0, 0, 10), Dir::S);
/// assert_eq!(desired_facing256(4, 4, 4, 4), Dir::NONE);
/// ```
#[must_use]
pub fn desired_facing256(x1: i32, y1: i32, x2: i32, y2: i32) -> Dir {
    let mut quadrant: u32 = 0;

    let mut dx = i64::from(x2) - i64::from(x1);
    if dx < 0 {
        dx = -dx;
        quadrant = 0b1100_0000;
    }

    let mut dy = i64::from(y1) - i64::from(y2);
    if dy < 0 {
        quadrant ^= 0b0100_0000;
        dy = -dy;
    }

    let mut adder = (quadrant & 0b0100_0000) ^ 0b0100_0000;

    let (mut smaller, mut bigger) = (dy as u64, dx as u64);
    if smaller >= bigger {
        std::mem::swap(&mut smaller, &mut bigger);
        adder ^= 0b0100_0000;
    }

    if bigger == 0 {
        return Dir::NONE;
    }

    // Keep the dividend within range by dropping precision from both deltas.
    if smaller & !0xFF == 0 {
        while bigger & !0xFF != 0 {
            bigger >>= 1;
            smaller >>= 1;
        }
    }
    if bigger == 0 {
        return Dir::NONE;
    }

    let frac = (((smaller << 8) / bigger) >> 3) as u32;
    let angle = if adder != 0 {
        adder.wrapping_sub(frac)
    } else {
        frac
    };
    Dir((angle.wrapping_add(quadrant) & 0xFF) as u8)
}

/// A rotating direction with a current and a desired value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Facing {
    current: Dir,
    desired: Dir,
}

impl Facing {
    /// Largest per-frame rotation step.
    pub const MAX_RATE: u8 = 127;

    /// Facing already settled on `dir`.
    #[must_use]
    pub const fn new(dir: Dir) -> Self {
        Self {
            current: dir,
            desired: dir,
        }
    }

    /// Current direction.
    #[must_use]
    pub const fn current(&self) -> Dir {
        self.current
    }

    /// Direction being rotated toward.
    #[must_use]
    pub const fn desired(&self) -> Dir {
        self.desired
    }

    /// Request rotation toward `dir`. Returns true if the target changed.
    pub fn set_desired(&mut self, dir: Dir) -> bool {
        if self.desired == dir {
            return false;
        }
        self.desired = dir;
        true
    }

    /// Snap the current direction. Returns true if it changed.
    pub fn set_current(&mut self, dir: Dir) -> bool {
        if self.current == dir {
            return false;
        }
        self.current = dir;
        true
    }

    /// Snap both current and desired direction.
    pub fn set(&mut self, dir: Dir) {
        self.current = dir;
        self.desired = dir;
    }

    /// Whether the current direction still differs from the desired one.
    #[must_use]
    pub fn is_rotating(&self) -> bool {
        self.current != self.desired
    }

    /// Signed rotation still needed to reach the desired direction.
    #[must_use]
    pub const fn difference(&self) -> i8 {
        self.current.delta_to(self.desired)
    }

    /// Signed rotation from the current direction to `dir`.
    #[must_use]
    pub const fn difference_to(&self, dir: Dir) -> i8 {
        self.current.delta_to(dir)
    }

    /// Rotate one frame toward the desired direction.
    ///
    /// The rate is clamped to [`Facing::MAX_RATE`] and the rotation never
    /// overshoots. Returns true if the current direction moved.
    pub fn rotation_adjust(&mut self, rate: u8) -> bool {
        if !self.is_rotating() {
            return false;
        }
        let rate = i16::from(rate.min(Self::MAX_RATE));
        let old = self.current;
        let diff = i16::from(self.difference());

        if diff.abs() < rate {
            self.current = self.desired;
        } else if diff < 0 {
            self.current = Dir(self.current.0.wrapping_sub(rate as u8));
        } else {
            self.current = Dir(self.current.0.wrapping_add(rate as u8));
        }
        old != self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_facing8_cardinals() {
        assert_eq!(desired_facing8(0, 0, 0, -10), Dir::N);
        assert_eq!(desired_facing8(0, 0, 10, 0), Dir::E);
        assert_eq!(desired_facing8(0, 0, 0, 10), Dir::S);
        assert_eq!(desired_facing8(0, 0, -10, 0), Dir::W);
    }

    #[test]
    fn test_facing8_diagonals() {
        assert_eq!(desired_facing8(0, 0, 10, -10), Dir::NE);
        assert_eq!(desired_facing8(0, 0, 10, 10), Dir::SE);
        assert_eq!(desired_facing8(0, 0, -10, 10), Dir::SW);
        assert_eq!(desired_facing8(0, 0, -10, -10), Dir::NW);
        // Lesser axis at half of the greater still counts as diagonal.
        assert_eq!(desired_facing8(0, 0, 10, -5), Dir::NE);
        assert_eq!(desired_facing8(0, 0, 10, -4), Dir::E);
    }

    #[test]
    fn test_facing8_same_point() {
        assert_eq!(desired_facing8(0, 0, 0, 0), Dir::NE);
    }

    #[test]
    fn test_facing256_cardinals() {
        assert_eq!(desired_facing256(5, 5, 5, -5), Dir::N);
        assert_eq!(desired_facing256(5, 5, 15, 5), Dir::E);
        assert_eq!(desired_facing256(5, 5, 5, 15), Dir::S);
        assert_eq!(desired_facing256(5, 5, -5, 5), Dir::W);
    }

    #[test]
    fn test_facing256_diagonals() {
        assert_eq!(desired_facing256(0, 0, 10, -10), Dir::NE);
        assert_eq!(desired_facing256(0, 0, 10, 10), Dir::SE);
        assert_eq!(desired_facing256(0, 0, -10, 10), Dir::SW);
        assert_eq!(desired_facing256(0, 0, -10, -10), Dir::NW);
    }

    #[test]
    fn test_facing256_sentinel() {
        assert_eq!(desired_facing256(0, 0, 0, 0), Dir::NONE);
        assert_eq!(desired_facing256(77, -3, 77, -3), Dir::NONE);
    }

    #[test]
    fn test_facing256_large_deltas() {
        assert_eq!(desired_facing256(0, 0, 100_000, 0), Dir::E);
        assert_eq!(desired_facing256(0, 0, 0, 100_000), Dir::S);
        let d = desired_facing256(0, 0, 4096, -4096);
        assert_eq!(d, Dir::NE);
    }

    #[test]
    fn test_rotation_clamps_and_settles() {
        let mut facing = Facing::new(Dir::N);
        facing.set_desired(Dir::E);
        assert!(facing.rotation_adjust(20));
        assert_eq!(facing.current(), Dir(20));
        assert!(facing.rotation_adjust(20));
        assert!(facing.rotation_adjust(20));
        assert_eq!(facing.current(), Dir(60));
        assert!(facing.rotation_adjust(20));
        assert_eq!(facing.current(), Dir::E);
        assert!(!facing.is_rotating());
        assert!(!facing.rotation_adjust(20));
    }

    #[test]
    fn test_rotation_takes_short_way() {
        let mut facing = Facing::new(Dir(10));
        facing.set_desired(Dir(240));
        facing.rotation_adjust(8);
        assert_eq!(facing.current(), Dir(2));
        facing.rotation_adjust(8);
        assert_eq!(facing.current(), Dir(250));
        facing.rotation_adjust(8);
        assert_eq!(facing.current(), Dir(242));
        facing.rotation_adjust(8);
        assert_eq!(facing.current(), Dir(240));
    }

    #[test]
    fn test_rotation_rate_clamped() {
        let mut facing = Facing::new(Dir::N);
        facing.set_desired(Dir::S);
        facing.rotation_adjust(255);
        assert_eq!(facing.difference().unsigned_abs(), 1);
    }

    proptest! {
        #[test]
        fn prop_facing256_matches_facing8_on_axes(d in 1i32..50_000) {
            prop_assert_eq!(desired_facing256(0, 0, d, 0), desired_facing8(0, 0, d, 0));
            prop_assert_eq!(desired_facing256(0, 0, 0, d), desired_facing8(0, 0, 0, d));
            prop_assert_eq!(desired_facing256(0, 0, -d, 0), desired_facing8(0, 0, -d, 0));
            prop_assert_eq!(desired_facing256(0, 0, 0, -d), desired_facing8(0, 0, 0, -d));
        }

        #[test]
        fn prop_rotation_always_settles(start in any::<u8>(), goal in any::<u8>(), rate in 1u8..=255) {
            let mut facing = Facing::new(Dir(start));
            facing.set_desired(Dir(goal));
            for _ in 0..256 {
                facing.rotation_adjust(rate);
            }
            prop_assert_eq!(facing.current(), Dir(goal));
        }
    }
}
