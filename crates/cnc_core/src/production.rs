//! Factory production.
//!
//! Each house runs at most one factory per [`ProductionKind`]. A factory
//! advances one step per frame and draws its cost progressively, so an
//! abandoned item refunds exactly what was spent and a broke house stalls
//! rather than going into debt.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_ratio, Fixed};

/// Which factory an object comes out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProductionKind {
    /// Vehicles, delivered from a war factory.
    Unit = 0,
    /// Structures, delivered to the construction yard and placed later.
    Building = 1,
}

impl ProductionKind {
    /// Kind for a wire byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unit),
            1 => Some(Self::Building),
            _ => None,
        }
    }

    /// Wire byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Outcome of one production step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductionStep {
    /// Nothing to do: idle, suspended or already complete.
    Idle,
    /// Progress was made.
    Advanced,
    /// Not enough credits for this step.
    Stalled,
    /// The item finished on this step.
    Completed,
}

/// An item under construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Factory {
    /// Factory kind.
    pub kind: ProductionKind,
    /// Type being built.
    pub type_id: u8,
    /// Steps completed.
    pub progress: u32,
    /// Steps required.
    pub total_time: u32,
    /// Full price.
    pub cost: u32,
    /// Credits drawn so far.
    pub paid: u32,
    /// Paused by the owner.
    pub is_suspended: bool,
    /// Finished and awaiting delivery or placement.
    pub is_completed: bool,
}

impl Factory {
    /// Start building `type_id`.
    #[must_use]
    pub fn new(kind: ProductionKind, type_id: u8, total_time: u32, cost: u32) -> Self {
        Self {
            kind,
            type_id,
            progress: 0,
            total_time: total_time.max(1),
            cost,
            paid: 0,
            is_suspended: false,
            is_completed: false,
        }
    }

    /// Fraction complete.
    #[must_use]
    pub fn completion(&self) -> Fixed {
        fixed_ratio(self.progress, self.total_time)
    }

    /// Credits owed once `progress` steps are complete.
    fn cost_at(&self, progress: u32) -> u32 {
        let owed = u64::from(self.cost) * u64::from(progress) / u64::from(self.total_time);
        u32::try_from(owed).unwrap_or(u32::MAX)
    }

    /// Advance one step, paying for it from `credits`.
    pub fn advance(&mut self, credits: &mut u32) -> ProductionStep {
        if self.is_suspended || self.is_completed {
            return ProductionStep::Idle;
        }
        let due = self.cost_at(self.progress + 1).saturating_sub(self.paid);
        if *credits < due {
            return ProductionStep::Stalled;
        }
        *credits -= due;
        self.paid += due;
        self.progress += 1;
        if self.progress >= self.total_time {
            self.is_completed = true;
            ProductionStep::Completed
        } else {
            ProductionStep::Advanced
        }
    }

    /// Credits returned when the item is abandoned.
    #[must_use]
    pub const fn refund(&self) -> u32 {
        self.paid
    }
}
