//! # CnC Core
//!
//! Deterministic lockstep simulation core.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No sockets (transports are supplied by the host)
//! - No system randomness
//! - No floating-point math (integer leptons and fixed-point fractions)
//!
//! Every peer runs the same [`world::World`] and feeds it the same
//! [`event::Event`]s on the same frames, so every peer computes the same
//! game. Per-frame checksums catch any divergence.
//!
//! ## Crate Structure
//!
//! - [`random`], [`facing`], [`math`] - deterministic primitives
//! - [`comm_queue`], [`connection`] - packet queues and reliable delivery
//! - [`event`], [`dispatch`], [`event_queue`] - the event wire format and
//!   its execution
//! - [`tracks`], [`drive`], [`pathfinding`], [`map`] - vehicle movement
//! - [`unit`], [`building`], [`house`], [`production`], [`combat`] -
//!   game objects
//! - [`team`] - scripted unit groups
//! - [`pipe`], [`straw`], [`save`], [`replay`] - byte streams and
//!   persistence
//! - [`config`], [`scenario`] - rules and scenario loading
//! - [`world`] - the simulation context and frame loop

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod building;
pub mod codec;
pub mod combat;
pub mod comm_queue;
pub mod config;
pub mod connection;
pub mod data;
pub mod dispatch;
pub mod drive;
pub mod error;
pub mod event;
pub mod event_queue;
pub mod facing;
pub mod house;
pub mod map;
pub mod math;
pub mod mission;
pub mod options;
pub mod pathfinding;
pub mod pipe;
pub mod production;
pub mod random;
pub mod replay;
pub mod save;
pub mod scenario;
pub mod straw;
pub mod target;
pub mod team;
pub mod tracks;
pub mod unit;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::building::{Building, BuildingId};
    pub use crate::comm_queue::{CommBuffer, SharedCommBuffer};
    pub use crate::config::Rules;
    pub use crate::connection::{Connection, ConnectionConfig, LoopbackTransport, Transport};
    pub use crate::error::{GameError, Result};
    pub use crate::event::{Event, EventKind, EventType};
    pub use crate::event_queue::EventQueue;
    pub use crate::house::{House, HouseId, SpecialWeapon};
    pub use crate::map::{LandType, Map};
    pub use crate::math::{CellPos, Coord, Dir, Fixed};
    pub use crate::mission::Mission;
    pub use crate::production::ProductionKind;
    pub use crate::random::Random;
    pub use crate::replay::{Replay, ReplayPlayer};
    pub use crate::scenario::Scenario;
    pub use crate::target::Target;
    pub use crate::team::{Team, TeamId, TeamType};
    pub use crate::unit::{Unit, UnitId};
    pub use crate::world::{TickEvents, World};
}
