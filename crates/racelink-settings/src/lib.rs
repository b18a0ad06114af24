//! RaceLink Settings Crate
//!
//! Handles station configuration: card reader port and timings, teamwork
//! role and peer address, and the worker engine timings for both links.

pub mod config;
pub mod error;

pub use config::{CardReaderSettings, Config, EngineSettings, PeerRole, TeamworkSettings};
pub use error::{SettingsError, SettingsResult};
