//! Error handling for RaceLink
//!
//! Provides error types for every layer of the station links:
//! - Connection errors (serial port, TCP peers, discovery)
//! - Queue errors (bounded hand-off between worker threads)
//! - Codec errors (teamwork wire frames)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents errors raised by a source adapter while it owns its external
/// channel. Any of these terminates the producer that hit it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Port not found
    #[error("Port not found: {port}")]
    PortNotFound {
        /// The name of the port that was not found.
        port: String,
    },

    /// Failed to open port
    #[error("Could not open port '{port}': {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// No usable device or peer was found
    #[error("Discovery failed: {reason}")]
    DiscoveryFailed {
        /// Every per-candidate failure, joined.
        reason: String,
    },

    /// Port discovery is not available on this platform
    #[error("Unsupported platform: {platform}")]
    UnsupportedPlatform {
        /// The platform name as reported by the standard library.
        platform: String,
    },

    /// Unexpected response framing from the device
    #[error("Invalid response from master station: {response}")]
    ProtocolFault {
        /// The offending response line.
        response: String,
    },

    /// The device answered a mode-set command with the wrong token
    #[error("Invalid response from master station on SET MODE - {expected}: {actual}")]
    HandshakeRejected {
        /// The token the handshake expects.
        expected: String,
        /// The response that was received.
        actual: String,
    },

    /// Connection lost
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// The reason the connection was lost.
        reason: String,
    },

    /// TCP connection error
    #[error("TCP connection error: {reason}")]
    TcpError {
        /// The reason for the TCP error.
        reason: String,
    },

    /// Connection timeout
    #[error("Connection timeout after {timeout_ms}ms")]
    Timeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// I/O error
    #[error("I/O error: {reason}")]
    IoError {
        /// The reason for the I/O error.
        reason: String,
    },

    /// Invalid connection parameters
    #[error("Invalid connection parameters: {reason}")]
    InvalidParameters {
        /// The reason the parameters are invalid.
        reason: String,
    },
}

/// Queue error type
///
/// Raised by the bounded queue shared between a producer and a dispatcher.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue stayed full for the whole put timeout
    #[error("Queue full after waiting {waited_ms}ms")]
    Full {
        /// How long the push waited before giving up.
        waited_ms: u64,
    },

    /// The receiving side is gone
    #[error("Queue receiver is closed")]
    Closed,
}

/// Codec error type
///
/// Raised while encoding or decoding teamwork wire frames.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Frame is not valid JSON or does not match the envelope
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Frame is empty after trimming
    #[error("Empty frame")]
    Empty,
}

/// Main error type for RaceLink
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Queue error
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Codec error
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Connection(ConnectionError::Timeout { .. }) => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a protocol fault reported by a device
    pub fn is_protocol_fault(&self) -> bool {
        matches!(
            self,
            Error::Connection(
                ConnectionError::ProtocolFault { .. } | ConnectionError::HandshakeRejected { .. }
            )
        )
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = ConnectionError::HandshakeRejected {
            expected: "READOUT".to_string(),
            actual: "SET MODE:BACKUP".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid response from master station on SET MODE - READOUT: SET MODE:BACKUP"
        );

        let err = ConnectionError::FailedToOpen {
            port: "/dev/ttyUSB0".to_string(),
            reason: "busy".to_string(),
        };
        assert_eq!(err.to_string(), "Could not open port '/dev/ttyUSB0': busy");
    }

    #[test]
    fn test_error_classification() {
        let err: Error = ConnectionError::ProtocolFault {
            response: "ERR".to_string(),
        }
        .into();
        assert!(err.is_connection_error());
        assert!(err.is_protocol_fault());
        assert!(!err.is_timeout());

        let err: Error = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow").into();
        assert!(err.is_timeout());

        let err: Error = QueueError::Full { waited_ms: 1000 }.into();
        assert_eq!(err.to_string(), "Queue full after waiting 1000ms");
    }
}
