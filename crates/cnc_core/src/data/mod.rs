//! Data structures for unit, building and terrain definitions.
//!
//! This module contains pure data structures that are deserialized from RON
//! as part of [`Rules`](crate::config::Rules). Type ids used by events and
//! scenarios are indices into the rules' type lists.

mod building_data;
mod ground_data;
mod unit_data;

pub use building_data::BuildingTypeData;
pub use ground_data::GroundCost;
pub use unit_data::{SpeedClass, UnitTypeData, WeaponData};
