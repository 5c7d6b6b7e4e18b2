//! Precomputed vehicle movement tracks.
//!
//! A track is a list of lepton offsets relative to the cell centre the
//! vehicle is heading to, each with the body facing to show at that step.
//! Only north-based and north-east-based shapes are stored; the other
//! directions are produced at run time by transposing and mirroring the
//! offsets according to the [`TRACK_CONTROL`] entry.
//!
//! Every track ends with a zero offset, which marks arrival at the
//! destination.

use bitflags::bitflags;

use crate::math::{Dir, FacingType};

bitflags! {
    /// Transformations applied to a raw track.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TrackFlags: u8 {
        /// Swap the x and y axes.
        const T = 1;
        /// Negate x.
        const X = 2;
        /// Negate y.
        const Y = 4;
        /// The track spans two cells.
        const D = 8;
    }
}

const T: u8 = TrackFlags::T.bits();
const X: u8 = TrackFlags::X.bits();
const Y: u8 = TrackFlags::Y.bits();
const D: u8 = TrackFlags::D.bits();

/// South-west facing nudged toward west, used when backing into a refinery.
pub const DIR_SW_X2: Dir = Dir(144);

/// One step of a raw track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackStep {
    /// Horizontal offset from the destination in leptons.
    pub x: i32,
    /// Vertical offset from the destination in leptons.
    pub y: i32,
    /// Body facing at this step.
    pub facing: Dir,
}

impl TrackStep {
    /// Whether this is the terminating zero offset.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0
    }
}

const fn step(x: i32, y: i32, facing: u8) -> TrackStep {
    TrackStep {
        x,
        y,
        facing: Dir(facing),
    }
}

/// A raw track with its optional mid-track jump point.
#[derive(Debug, Clone, Copy)]
pub struct RawTrack {
    /// Offsets and facings.
    pub steps: &'static [TrackStep],
    /// Step at which the vehicle may switch into a follow-on track.
    pub jump: Option<usize>,
    /// Step at which a vehicle jumping into this track resumes.
    pub entry: Option<usize>,
    /// Step at which the vehicle crosses into the intermediate cell.
    pub cell: Option<usize>,
}

/// Selects a raw track and its transformation for a pair of facings.
#[derive(Debug, Clone, Copy)]
pub struct TurnTrack {
    /// Raw track number, 1-based; 0 means no track exists.
    pub track: u8,
    /// Short raw track used when starting from rest; 0 when none.
    pub start_track: u8,
    /// Facing at the end of the track.
    pub facing: Dir,
    /// Transformation flags.
    pub flags: TrackFlags,
}

impl TurnTrack {
    /// Raw track to walk, honouring the short-track selection.
    #[must_use]
    pub fn raw(&self, short: bool) -> Option<&'static RawTrack> {
        let number = if short { self.start_track } else { self.track };
        raw_track(number)
    }

    /// Whether this entry describes a usable track.
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.track != 0
    }

    /// Whether the track spans two cells.
    #[must_use]
    pub const fn is_double(&self) -> bool {
        self.flags.contains(TrackFlags::D)
    }
}

const fn turn(track: u8, start_track: u8, facing: Dir, flags: u8) -> TurnTrack {
    TurnTrack {
        track,
        start_track,
        facing,
        flags: TrackFlags::from_bits_retain(flags),
    }
}

/// Apply a control entry's transformation to an offset and its facing.
#[must_use]
pub fn transform_step(x: i32, y: i32, dir: Dir, flags: TrackFlags) -> (i32, i32, Dir) {
    let (mut x, mut y, mut value) = (x, y, dir.0);
    if flags.contains(TrackFlags::T) {
        let swap = x;
        x = y;
        y = swap;
        value = Dir::W.0.wrapping_sub(value);
    }
    if flags.contains(TrackFlags::X) {
        x = -x;
        value = 0u8.wrapping_sub(value);
    }
    if flags.contains(TrackFlags::Y) {
        y = -y;
        value = Dir::S.0.wrapping_sub(value);
    }
    (x, y, Dir(value))
}

/// Track-control index for a move in `facing` followed by `next`.
#[must_use]
pub const fn track_number(facing: FacingType, next: FacingType) -> usize {
    facing.index() as usize * 8 + next.index() as usize
}

/// Control entry by index.
#[must_use]
pub fn turn_track(number: usize) -> Option<&'static TurnTrack> {
    TRACK_CONTROL.get(number)
}

/// Raw track by 1-based number.
#[must_use]
pub fn raw_track(number: u8) -> Option<&'static RawTrack> {
    usize::from(number)
        .checked_sub(1)
        .and_then(|index| RAW_TRACKS.get(index))
}

// ============================================================================
// Raw track data
// ============================================================================

const TRACK1: [TrackStep; 24] = [
    step(0, 245, 0),
    step(0, 234, 0),
    step(0, 223, 0),
    step(0, 212, 0),
    step(0, 201, 0),
    step(0, 190, 0),
    step(0, 179, 0),
    step(0, 168, 0),
    step(0, 157, 0),
    step(0, 146, 0),
    step(0, 135, 0),
    step(0, 124, 0),
    step(0, 113, 0),
    step(0, 102, 0),
    step(0, 91, 0),
    step(0, 80, 0),
    step(0, 69, 0),
    step(0, 58, 0),
    step(0, 47, 0),
    step(0, 36, 0),
    step(0, 25, 0),
    step(0, 14, 0),
    step(0, 3, 0),
    step(0, 0, 0),
];

const TRACK2: [TrackStep; 32] = [
    step(-248, 248, 32),
    step(-240, 240, 32),
    step(-232, 232, 32),
    step(-224, 224, 32),
    step(-216, 216, 32),
    step(-208, 208, 32),
    step(-200, 200, 32),
    step(-192, 192, 32),
    step(-184, 184, 32),
    step(-176, 176, 32),
    step(-168, 168, 32),
    step(-160, 160, 32),
    step(-152, 152, 32),
    step(-144, 144, 32),
    step(-136, 136, 32),
    step(-128, 128, 32),
    step(-120, 120, 32),
    step(-112, 112, 32),
    step(-104, 104, 32),
    step(-96, 96, 32),
    step(-88, 88, 32),
    step(-80, 80, 32),
    step(-72, 72, 32),
    step(-64, 64, 32),
    step(-56, 56, 32),
    step(-48, 48, 32),
    step(-40, 40, 32),
    step(-32, 32, 32),
    step(-24, 24, 32),
    step(-16, 16, 32),
    step(-8, 8, 32),
    step(0, 0, 32),
];

const TRACK3: [TrackStep; 55] = [
    step(-256, 501, 0),
    step(-256, 490, 0),
    step(-256, 479, 0),
    step(-256, 468, 0),
    step(-256, 457, 0),
    step(-256, 446, 0),
    step(-256, 435, 0),
    step(-256, 424, 0),
    step(-256, 413, 0),
    step(-256, 402, 0),
    step(-256, 391, 0),
    step(-256, 384, 0),
    step(-256, 373, 0),
    step(-256, 363, 0),
    step(-254, 352, 1),
    step(-252, 341, 3),
    step(-250, 332, 4),
    step(-248, 321, 5),
    step(-245, 311, 7),
    step(-241, 302, 8),
    step(-237, 292, 9),
    step(-233, 282, 11),
    step(-229, 272, 12),
    step(-225, 263, 13),
    step(-220, 252, 15),
    step(-216, 243, 16),
    step(-212, 236, 17),
    step(-206, 224, 19),
    step(-202, 215, 20),
    step(-195, 207, 21),
    step(-190, 198, 23),
    step(-183, 186, 24),
    step(-179, 176, 25),
    step(-168, 168, 27),
    step(-160, 160, 28),
    step(-152, 152, 29),
    step(-144, 144, 31),
    step(-136, 136, 32),
    step(-128, 128, 32),
    step(-120, 120, 32),
    step(-112, 112, 32),
    step(-104, 104, 32),
    step(-96, 96, 32),
    step(-88, 88, 32),
    step(-80, 80, 32),
    step(-72, 72, 32),
    step(-64, 64, 32),
    step(-56, 56, 32),
    step(-48, 48, 32),
    step(-40, 40, 32),
    step(-32, 32, 32),
    step(-24, 24, 32),
    step(-16, 16, 32),
    step(-8, 8, 32),
    step(0, 0, 32),
];

const TRACK4: [TrackStep; 39] = [
    step(-256, 245, 0),
    step(-256, 235, 0),
    step(-256, 224, 0),
    step(-256, 213, 0),
    step(-255, 203, 0),
    step(-253, 192, 0),
    step(-251, 181, 1),
    step(-249, 171, 1),
    step(-246, 160, 2),
    step(-243, 149, 3),
    step(-240, 139, 4),
    step(-236, 128, 5),
    step(-232, 117, 8),
    step(-228, 109, 12),
    step(-222, 99, 16),
    step(-219, 90, 20),
    step(-213, 82, 23),
    step(-206, 72, 27),
    step(-201, 64, 32),
    step(-195, 56, 36),
    step(-186, 48, 39),
    step(-177, 43, 43),
    step(-168, 36, 47),
    step(-160, 32, 51),
    step(-147, 27, 54),
    step(-135, 23, 57),
    step(-126, 20, 60),
    step(-113, 17, 62),
    step(-104, 13, 63),
    step(-94, 9, 64),
    step(-84, 6, 64),
    step(-75, 4, 66),
    step(-64, 3, 64),
    step(-53, 2, 64),
    step(-43, 1, 64),
    step(-32, 0, 64),
    step(-21, 0, 64),
    step(-11, 0, 64),
    step(0, 0, 64),
];

const TRACK5: [TrackStep; 62] = [
    step(-504, -8, 32),
    step(-496, -16, 32),
    step(-488, -24, 32),
    step(-480, -32, 32),
    step(-472, -40, 32),
    step(-464, -48, 32),
    step(-456, -56, 32),
    step(-448, -64, 32),
    step(-440, -72, 32),
    step(-432, -80, 32),
    step(-424, -88, 32),
    step(-416, -96, 32),
    step(-408, -104, 32),
    step(-400, -112, 32),
    step(-392, -120, 32),
    step(-384, -128, 32),
    step(-376, -136, 32),
    step(-368, -143, 32),
    step(-361, -150, 32),
    step(-353, -158, 32),
    step(-344, -166, 32),
    step(-336, -173, 35),
    step(-329, -181, 38),
    step(-322, -188, 41),
    step(-316, -194, 44),
    step(-306, -199, 47),
    step(-296, -204, 50),
    step(-288, -208, 53),
    step(-277, -211, 56),
    step(-267, -212, 59),
    step(-256, -213, 62),
    step(-245, -212, 66),
    step(-235, -211, 69),
    step(-225, -208, 72),
    step(-216, -204, 75),
    step(-208, -199, 78),
    step(-198, -194, 81),
    step(-188, -188, 84),
    step(-181, -181, 87),
    step(-176, -173, 90),
    step(-168, -166, 93),
    step(-160, -158, 96),
    step(-152, -150, 96),
    step(-144, -143, 96),
    step(-136, -136, 96),
    step(-128, -128, 96),
    step(-120, -120, 96),
    step(-112, -112, 96),
    step(-104, -104, 96),
    step(-96, -96, 96),
    step(-88, -88, 96),
    step(-80, -80, 96),
    step(-72, -72, 96),
    step(-64, -64, 96),
    step(-56, -56, 96),
    step(-48, -48, 96),
    step(-40, -40, 96),
    step(-32, -32, 96),
    step(-24, -24, 96),
    step(-16, -16, 96),
    step(-8, -8, 96),
    step(0, 0, 96),
];

const TRACK6: [TrackStep; 57] = [
    step(-512, 256, 32),
    step(-504, 248, 32),
    step(-496, 240, 32),
    step(-488, 232, 32),
    step(-480, 224, 32),
    step(-472, 216, 32),
    step(-464, 208, 32),
    step(-456, 200, 32),
    step(-448, 192, 32),
    step(-440, 184, 32),
    step(-432, 176, 32),
    step(-424, 168, 32),
    step(-416, 160, 32),
    step(-408, 152, 32),
    step(-400, 144, 32),
    step(-392, 136, 32),
    step(-384, 128, 32),
    step(-376, 120, 32),
    step(-368, 112, 32),
    step(-360, 104, 32),
    step(-352, 96, 32),
    step(-344, 88, 32),
    step(-338, 85, 32),
    step(-328, 78, 35),
    step(-320, 72, 37),
    step(-311, 66, 40),
    step(-302, 59, 43),
    step(-294, 55, 45),
    step(-285, 50, 48),
    step(-277, 43, 51),
    step(-267, 38, 53),
    step(-258, 34, 56),
    step(-248, 28, 59),
    step(-238, 25, 61),
    step(-229, 21, 64),
    step(-218, 17, 64),
    step(-208, 14, 64),
    step(-199, 11, 64),
    step(-189, 9, 64),
    step(-178, 7, 64),
    step(-169, 5, 64),
    step(-158, 3, 64),
    step(-147, 1, 64),
    step(-137, 0, 64),
    step(-128, 0, 64),
    step(-117, 0, 64),
    step(-107, 0, 64),
    step(-96, 0, 64),
    step(-85, 0, 64),
    step(-75, 0, 64),
    step(-64, 0, 64),
    step(-53, 0, 64),
    step(-43, 0, 64),
    step(-32, 0, 64),
    step(-21, 0, 64),
    step(-11, 0, 64),
    step(0, 0, 64),
];

const TRACK7: [TrackStep; 28] = [
    step(-1, 6, 0),
    step(-2, 12, 4),
    step(-4, 17, 8),
    step(-6, 24, 12),
    step(-10, 31, 16),
    step(-13, 36, 19),
    step(-16, 43, 22),
    step(-3, 48, 23),
    step(-21, 53, 24),
    step(-24, 56, 25),
    step(-26, 60, 26),
    step(-29, 64, 27),
    step(-32, 67, 28),
    step(-35, 70, 29),
    step(-33, 67, 30),
    step(-31, 64, 30),
    step(-29, 60, 30),
    step(-27, 56, 30),
    step(-25, 53, 31),
    step(-23, 48, 31),
    step(-21, 43, 31),
    step(-19, 36, 31),
    step(-15, 31, 31),
    step(-12, 24, 32),
    step(-9, 17, 32),
    step(-6, 12, 32),
    step(-3, 6, 32),
    step(0, 0, 32),
];

const TRACK8: [TrackStep; 22] = [
    step(-4, 3, 32),
    step(-9, 6, 36),
    step(-15, 10, 40),
    step(-21, 12, 44),
    step(-28, 13, 46),
    step(-36, 14, 48),
    step(-43, 15, 50),
    step(-48, 16, 52),
    step(-55, 17, 54),
    step(-62, 18, 56),
    step(-64, 17, 58),
    step(-62, 16, 60),
    step(-55, 14, 62),
    step(-49, 12, 64),
    step(-43, 10, 64),
    step(-38, 8, 64),
    step(-30, 6, 64),
    step(-23, 4, 64),
    step(-17, 2, 64),
    step(-11, 1, 64),
    step(-7, 0, 64),
    step(0, 0, 64),
];

const TRACK9: [TrackStep; 31] = [
    step(2, -11, 0),
    step(4, -21, 2),
    step(6, -32, 4),
    step(9, -43, 6),
    step(12, -50, 9),
    step(15, -56, 11),
    step(18, -64, 13),
    step(21, -72, 16),
    step(18, -64, 18),
    step(14, -56, 20),
    step(10, -50, 22),
    step(4, -43, 24),
    step(0, -34, 26),
    step(-8, -23, 28),
    step(-14, -18, 30),
    step(-21, -11, 32),
    step(-31, -3, 34),
    step(-40, 2, 36),
    step(-46, 7, 39),
    step(-53, 11, 41),
    step(-59, 16, 43),
    step(-66, 19, 45),
    step(-73, 21, 48),
    step(-66, 19, 50),
    step(-59, 17, 52),
    step(-52, 11, 54),
    step(-44, 8, 56),
    step(-33, 5, 58),
    step(-21, 3, 62),
    step(-11, 1, 64),
    step(0, 0, 64),
];

const TRACK10: [TrackStep; 28] = [
    step(11, -10, 32),
    step(21, -16, 37),
    step(32, -21, 42),
    step(43, -23, 47),
    step(50, -27, 52),
    step(56, -29, 57),
    step(64, -32, 60),
    step(56, -30, 62),
    step(50, -28, 64),
    step(42, -27, 68),
    step(30, -26, 70),
    step(21, -25, 72),
    step(11, -24, 74),
    step(0, -23, 76),
    step(-11, -24, 78),
    step(-21, -25, 80),
    step(-32, -26, 82),
    step(-43, -27, 84),
    step(-50, -28, 86),
    step(-59, -30, 88),
    step(-64, -32, 90),
    step(-59, -29, 92),
    step(-50, -27, 94),
    step(-43, -23, 95),
    step(-32, -21, 96),
    step(-21, -16, 96),
    step(-11, -10, 96),
    step(0, 0, 96),
];

const TRACK11: [TrackStep; 14] = [
    step(0, 256, 160),
    step(8, 243, 160),
    step(16, 229, 152),
    step(24, 214, 152),
    step(32, 200, 152),
    step(40, 185, 152),
    step(48, 171, 144),
    step(56, 156, 144),
    step(64, 141, 144),
    step(72, 127, 144),
    step(80, 113, 144),
    step(88, 100, 144),
    step(96, 85, 144),
    step(0, 0, 144),
];

const TRACK12: [TrackStep; 13] = [
    step(96, -171, 144),
    step(88, -156, 144),
    step(80, -143, 144),
    step(72, -129, 144),
    step(64, -115, 144),
    step(56, -100, 144),
    step(48, -85, 144),
    step(40, -71, 152),
    step(32, -56, 152),
    step(24, -42, 152),
    step(16, -27, 152),
    step(8, -13, 160),
    step(0, 0, 160),
];

const TRACK13: [TrackStep; 36] = [
    step(0, -373, 128),
    step(0, -363, 128),
    step(0, -352, 128),
    step(0, -341, 128),
    step(0, -331, 128),
    step(0, -320, 128),
    step(0, -309, 128),
    step(0, -299, 128),
    step(0, -288, 128),
    step(0, -277, 128),
    step(0, -267, 128),
    step(0, -256, 128),
    step(0, -245, 128),
    step(0, -235, 128),
    step(0, -224, 128),
    step(0, -213, 128),
    step(0, -203, 128),
    step(0, -192, 128),
    step(0, -181, 128),
    step(0, -171, 128),
    step(0, -160, 128),
    step(0, -149, 128),
    step(0, -139, 128),
    step(0, -128, 128),
    step(0, -117, 128),
    step(0, -107, 128),
    step(0, -96, 128),
    step(0, -85, 128),
    step(0, -75, 128),
    step(0, -64, 128),
    step(0, -53, 128),
    step(0, -43, 128),
    step(0, -32, 128),
    step(0, -21, 128),
    step(0, -11, 128),
    step(0, 0, 128),
];

/// The thirteen raw tracks, numbered from 1.
pub static RAW_TRACKS: [RawTrack; 13] = [
    RawTrack { steps: &TRACK1, jump: None, entry: None, cell: None },
    RawTrack { steps: &TRACK2, jump: None, entry: None, cell: None },
    RawTrack { steps: &TRACK3, jump: Some(37), entry: Some(12), cell: Some(22) },
    RawTrack { steps: &TRACK4, jump: Some(26), entry: Some(11), cell: Some(19) },
    RawTrack { steps: &TRACK5, jump: Some(45), entry: Some(15), cell: Some(31) },
    RawTrack { steps: &TRACK6, jump: Some(44), entry: Some(16), cell: Some(27) },
    RawTrack { steps: &TRACK7, jump: None, entry: None, cell: None },
    RawTrack { steps: &TRACK8, jump: None, entry: None, cell: None },
    RawTrack { steps: &TRACK9, jump: None, entry: None, cell: None },
    RawTrack { steps: &TRACK10, jump: None, entry: None, cell: None },
    RawTrack { steps: &TRACK11, jump: None, entry: None, cell: None },
    RawTrack { steps: &TRACK12, jump: None, entry: None, cell: None },
    RawTrack { steps: &TRACK13, jump: None, entry: None, cell: None },
];

/// Track selection for every facing pair (`facing * 8 + next`), followed by
/// the three special-purpose tracks.
pub static TRACK_CONTROL: [TurnTrack; 67] = [
    turn(1, 0, Dir::N, 0),
    turn(3, 7, Dir::NE, D),
    turn(4, 9, Dir::E, D),
    turn(0, 0, Dir::SE, 0),
    turn(0, 0, Dir::S, 0),
    turn(0, 0, Dir::SW, 0),
    turn(4, 9, Dir::W, X | D),
    turn(3, 7, Dir::NW, X | D),
    turn(6, 8, Dir::N, T | X | Y | D),
    turn(2, 0, Dir::NE, 0),
    turn(6, 8, Dir::E, D),
    turn(5, 10, Dir::SE, D),
    turn(0, 0, Dir::S, 0),
    turn(0, 0, Dir::SW, 0),
    turn(0, 0, Dir::W, 0),
    turn(5, 10, Dir::NW, T | X | Y | D),
    turn(4, 9, Dir::N, T | X | Y | D),
    turn(3, 7, Dir::NE, T | X | Y | D),
    turn(1, 0, Dir::E, T | X),
    turn(3, 7, Dir::SE, T | X | D),
    turn(4, 9, Dir::S, T | X | D),
    turn(0, 0, Dir::SW, 0),
    turn(0, 0, Dir::W, 0),
    turn(0, 0, Dir::NW, 0),
    turn(0, 0, Dir::N, 0),
    turn(5, 10, Dir::NE, Y | D),
    turn(6, 8, Dir::E, Y | D),
    turn(2, 0, Dir::SE, Y),
    turn(6, 8, Dir::S, T | X | D),
    turn(5, 10, Dir::SW, T | X | D),
    turn(0, 0, Dir::W, 0),
    turn(0, 0, Dir::NW, 0),
    turn(0, 0, Dir::N, 0),
    turn(0, 0, Dir::NE, 0),
    turn(4, 9, Dir::E, Y | D),
    turn(3, 7, Dir::SE, Y | D),
    turn(1, 0, Dir::S, Y),
    turn(3, 7, Dir::SW, X | Y | D),
    turn(4, 9, Dir::W, X | Y | D),
    turn(0, 0, Dir::NW, 0),
    turn(0, 0, Dir::N, 0),
    turn(0, 0, Dir::NE, 0),
    turn(0, 0, Dir::E, 0),
    turn(5, 10, Dir::SE, T | D),
    turn(6, 8, Dir::S, T | D),
    turn(2, 0, Dir::SW, T),
    turn(6, 8, Dir::W, X | Y | D),
    turn(5, 10, Dir::NW, X | Y | D),
    turn(4, 9, Dir::N, T | Y | D),
    turn(0, 0, Dir::NE, 0),
    turn(0, 0, Dir::E, 0),
    turn(0, 0, Dir::SE, 0),
    turn(4, 9, Dir::S, T | D),
    turn(3, 7, Dir::SW, T | D),
    turn(1, 0, Dir::W, T),
    turn(3, 7, Dir::NW, T | Y | D),
    turn(6, 8, Dir::N, T | Y | D),
    turn(5, 10, Dir::NE, T | Y | D),
    turn(0, 0, Dir::E, 0),
    turn(0, 0, Dir::SE, 0),
    turn(0, 0, Dir::S, 0),
    turn(5, 10, Dir::SW, X | D),
    turn(6, 8, Dir::W, X | D),
    turn(2, 0, Dir::NW, X),
    turn(11, 11, Dir::SW, 0),
    turn(12, 12, DIR_SW_X2, 0),
    turn(13, 13, Dir::SW, 0),
];

/// Index of the track that backs a harvester into a refinery.
pub const TRACK_REFINERY_BACKUP: usize = 64;
/// Index of the track that drives into a refinery.
pub const TRACK_REFINERY_ENTER: usize = 65;
/// Index of the track that leaves a weapons factory.
pub const TRACK_FACTORY_EXIT: usize = 66;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_raw_track_terminates() {
        for (index, raw) in RAW_TRACKS.iter().enumerate() {
            let last = raw.steps.last().unwrap();
            assert!(last.is_zero(), "track {} lacks a terminator", index + 1);
        }
    }

    #[test]
    fn test_step_counts() {
        let counts: Vec<usize> = RAW_TRACKS.iter().map(|raw| raw.steps.len()).collect();
        assert_eq!(counts, [24, 32, 55, 39, 62, 57, 28, 22, 31, 28, 14, 13, 36]);
    }

    #[test]
    fn test_jump_points_inside_tracks() {
        for raw in &RAW_TRACKS {
            for index in [raw.jump, raw.entry, raw.cell].into_iter().flatten() {
                assert!(index < raw.steps.len());
            }
        }
    }

    #[test]
    fn test_control_lookup() {
        let straight = turn_track(track_number(FacingType::N, FacingType::N)).unwrap();
        assert_eq!(straight.track, 1);
        assert!(straight.flags.is_empty());

        let east = turn_track(track_number(FacingType::E, FacingType::E)).unwrap();
        assert_eq!(east.flags, TrackFlags::T | TrackFlags::X);

        let reverse = turn_track(track_number(FacingType::N, FacingType::S)).unwrap();
        assert!(!reverse.exists());
        assert!(reverse.raw(false).is_none());

        let curve = turn_track(track_number(FacingType::N, FacingType::NE)).unwrap();
        assert!(curve.is_double());
        assert_eq!(curve.raw(true).unwrap().steps.len(), 28);
        assert!(turn_track(67).is_none());
    }

    #[test]
    fn test_special_tracks() {
        assert_eq!(TRACK_CONTROL[TRACK_REFINERY_ENTER].facing, DIR_SW_X2);
        assert_eq!(TRACK_CONTROL[TRACK_FACTORY_EXIT].track, 13);
        assert_eq!(raw_track(0).map(|raw| raw.steps.len()), None);
    }
}
