//! # RaceLink
//!
//! Station links for sporting-event race management:
//! - An LZFox card reader on a serial port turning card taps into results
//! - Teamwork replication of commands between stations over TCP
//!
//! ## Architecture
//!
//! RaceLink is organized as a workspace with multiple crates:
//!
//! 1. **racelink-core** - Command envelope, errors, the supervised
//!    producer/dispatcher engine, UI-loop hand-off, race store boundary
//! 2. **racelink-communication** - Serial and TCP channels, the LZFox
//!    protocol, card reader and teamwork supervisors
//! 3. **racelink-settings** - Configuration files and validation
//! 4. **racelink** - This facade plus a headless station binary

pub mod station;

pub use station::{Station, StationState, KIND_RESULT_ADD};

pub use racelink_core::{
    Command, ConnectionError, EngineTimings, Error, MemoryRace, RaceResult, RaceStore, Result,
    ResultKind, Split, Supervisor, TimeBase, UiHandle, UiLoop,
};

pub use racelink_communication::{
    cardreader, list_ports, teamwork, CardRead, CardReader, LzFoxReader, Punch, Teamwork,
};

pub use racelink_settings::{CardReaderSettings, Config, PeerRole, TeamworkSettings};

/// Initialize logging with tracing
///
/// Sets up structured logging with:
/// - Thread names, so producer and dispatcher lines can be told apart
/// - RUST_LOG environment variable support (default level INFO)
/// - Line numbers and targets
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))?;

    Ok(())
}
