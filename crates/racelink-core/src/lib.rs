//! # RaceLink Core
//!
//! Core types and the supervised worker engine shared by the RaceLink
//! station links. Provides the command envelope, error types, the
//! producer/dispatcher/supervisor engine, the UI-loop hand-off, and the
//! boundary to the race-data store.

pub mod command;
pub mod engine;
pub mod error;
pub mod race;
pub mod ui;

pub use command::{Command, KIND_CARD_DATA};

pub use engine::{
    CommandQueue, Dispatcher, EngineTimings, HostToken, HostWatch, Producer, SourceAdapter,
    StopSignal, Supervisor, Transform, WorkerHandle, WorkerState, DEFAULT_QUEUE_CAPACITY,
};

pub use error::{CodecError, ConnectionError, Error, QueueError, Result};

pub use race::{
    MemoryRace, RaceResult, RaceStore, ResultKind, Split, TimeBase, SETTING_SYSTEM_PORT,
    SETTING_SYSTEM_ZERO_TIME,
};

pub use ui::{Callback, UiHandle, UiLoop, UiTask, DEFAULT_UI_CAPACITY};
