//! # CnC Tools
//!
//! Headless utilities built on `cnc_core`: a scenario runner that records
//! replays and saves, a replay verifier, a save inspector, a drive track
//! dumper and a data file validator.

pub mod error;
pub mod inspect;
pub mod simulate;
pub mod track_dump;
pub mod validate;
