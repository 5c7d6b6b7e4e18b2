//! Replicated game options and session pacing.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Game-wide rule switches agreed on by all players.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SpecialFlags: u16 {
        /// Shroud regrows over explored areas.
        const SHADOW_GROW = 1 << 0;
        /// Production runs at accelerated speed.
        const SPEED_BUILD = 1 << 1;
        /// Data was read from the installed copy.
        const FROM_INSTALL = 1 << 2;
        /// Capture-the-flag rules.
        const CAPTURE_THE_FLAG = 1 << 3;
        /// Weapons deal no damage.
        const INERT = 1 << 4;
        /// Three-point turns for wheeled vehicles.
        const THREE_POINT = 1 << 5;
        /// Ore regrows.
        const ORE_GROWTH = 1 << 6;
        /// Ore spreads to neighbouring cells.
        const ORE_SPREAD = 1 << 7;
        /// Construction vehicles deploy in place.
        const MCV_DEPLOY = 1 << 8;
        /// The game ends once a single house remains.
        const EARLY_WIN = 1 << 9;
    }
}

/// Options that change how the simulation behaves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GameOptions {
    /// Game speed setting, lower is faster.
    pub game_speed: u32,
    /// Special rule switches.
    pub special: SpecialFlags,
}

/// Frame pacing negotiated between peers.
///
/// `max_ahead` is how many frames in the future local commands are
/// scheduled. Raising it opens a window of frames for which some peers may
/// already have scheduled commands using the old, smaller lead; commands
/// landing inside that window are pushed to its end.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pacing {
    /// Target frames per second.
    pub desired_frame_rate: u16,
    /// Command lead time in frames.
    pub max_ahead: u32,
    /// Start of the rescheduling window (exclusive).
    pub window_start: u32,
    /// End of the rescheduling window (exclusive); events inside move here.
    pub window_end: u32,
}

impl Pacing {
    /// Pacing with the given lead time and no open window.
    #[must_use]
    pub const fn new(desired_frame_rate: u16, max_ahead: u32) -> Self {
        Self {
            desired_frame_rate,
            max_ahead,
            window_start: 0,
            window_end: 0,
        }
    }

    /// Whether `frame` falls inside the rescheduling window.
    #[must_use]
    pub const fn in_window(&self, frame: u32) -> bool {
        frame > self.window_start && frame < self.window_end
    }

    /// Apply a new lead time announced on `frame`.
    ///
    /// Only an increase opens a window, since a decrease cannot cause two
    /// peers to disagree about which frame a command runs on.
    pub fn apply_max_ahead(&mut self, frame: u32, max_ahead: u32) {
        if max_ahead > self.max_ahead {
            self.window_start = frame;
            self.window_end = frame + max_ahead;
        }
        self.max_ahead = max_ahead;
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new(60, 16)
    }
}
