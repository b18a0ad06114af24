//! # RaceLink Communication
//!
//! Station links built on the supervised engine from `racelink-core`:
//! - [`cardreader`]: LZFox master station on a serial port
//! - [`teamwork`]: command replication between stations over TCP
//!
//! Both links own a producer/dispatcher pair and deliver to a callback that
//! runs on the UI thread.

pub mod cardreader;
pub mod communication;
pub mod teamwork;

pub use cardreader::{card_to_result, CardRead, CardReader, LzFoxReader, Punch, ReaderOptions};
pub use communication::{
    engine_timings,
    line::{LineEvent, LineReader},
    serial::{
        candidate_ports, list_ports, PortOpener, SerialLine, SerialParams, SerialPortInfo,
        SystemPortOpener,
    },
};
pub use teamwork::{PeerLink, Teamwork, TeamworkAdapter, TeamworkClient, TeamworkServer};
