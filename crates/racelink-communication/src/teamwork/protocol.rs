//! Teamwork wire format
//!
//! One JSON object per line:
//!
//! ```text
//! {"station":"1b4e28ba-2fa1-11d2-883f-0016d3cca427","kind":"result_update","payload":{...}}
//! ```
//!
//! `station` identifies the sender so a station can ignore its own frames.

use racelink_core::{CodecError, Command};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A command as it travels between stations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub station: Uuid,
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl Frame {
    /// Wrap a local command for sending
    pub fn new(station: Uuid, command: &Command) -> Self {
        Self {
            station,
            kind: command.kind.clone(),
            payload: command.payload.clone(),
        }
    }

    /// The command carried by this frame
    pub fn into_command(self) -> Command {
        Command::new(self.kind, self.payload)
    }
}

/// Serialize a command as one newline-terminated frame
pub fn encode_frame(station: Uuid, command: &Command) -> Result<Vec<u8>, CodecError> {
    let mut bytes = serde_json::to_vec(&Frame::new(station, command))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parse one received line
pub fn decode_frame(line: &str) -> Result<Frame, CodecError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(CodecError::Empty);
    }
    Ok(serde_json::from_str(line)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_is_one_line() {
        let station = Uuid::new_v4();
        let command = Command::new("result_update", json!({"text": "a\nb"}));
        let bytes = encode_frame(station, &command).unwrap();

        assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), 1);
        assert_eq!(bytes.last(), Some(&b'\n'));

        let frame = decode_frame(std::str::from_utf8(&bytes).unwrap()).unwrap();
        assert_eq!(frame.station, station);
        assert_eq!(frame.into_command(), command);
    }

    #[test]
    fn test_decode_rejects_noise() {
        assert!(matches!(decode_frame("\r\n"), Err(CodecError::Empty)));
        assert!(matches!(decode_frame("hello\n"), Err(CodecError::Malformed(_))));
        assert!(matches!(
            decode_frame("{\"kind\":\"x\"}\n"),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_payload_defaults_to_null() {
        let station = Uuid::nil();
        let frame = decode_frame(&format!("{{\"station\":\"{}\",\"kind\":\"ping\"}}", station)).unwrap();
        assert_eq!(frame.payload, Value::Null);
    }
}
