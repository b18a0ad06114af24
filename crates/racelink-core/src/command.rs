//! Command envelope
//!
//! A `Command` is the unit carried from a producer, through a queue, to the
//! dispatcher and finally the registered callback. It has no identity beyond
//! its position in the queue.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind tag used by the card reader for a completed card readout
pub const KIND_CARD_DATA: &str = "card_data";

/// Tagged payload crossing a thread boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command<P = serde_json::Value> {
    /// What the payload means to the consumer
    pub kind: String,
    /// Opaque payload
    pub payload: P,
}

impl<P> Command<P> {
    /// Create a new command
    pub fn new(kind: impl Into<String>, payload: P) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Consume the command, returning its payload
    pub fn into_payload(self) -> P {
        self.payload
    }

    /// Check the kind tag
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

impl<P> fmt::Display for Command<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command({})", self.kind)
    }
}
