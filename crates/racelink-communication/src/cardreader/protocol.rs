//! LZFox master station protocol
//!
//! The station speaks newline-terminated ASCII at 38400 baud. Every command
//! is answered by a blank or `>` prompt line followed by `<echo>:<value>\r\n`.
//! In readout mode the station pushes two lines per card tap:
//!
//! ```text
//! Card: 0A 1B 2C 3D\r\n
//! 251,1715421600,31,1715421845,252,1715422200%\r\n
//! ```

use crate::communication::line::{LineEvent, LineReader};
use crate::communication::serial::{PortOpener, SerialLine};
use chrono::{DateTime, Utc};
use racelink_core::{ConnectionError, Error, Result, SourceAdapter};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

pub const CMD_GET_VERSION: &[u8] = b"GET VERSION\n";
pub const CMD_GET_VOLTAGE: &[u8] = b"GET VOLTAGE\n";
pub const CMD_SET_READOUT_MODE: &[u8] = b"SET MODE READOUT\n";

/// Token the station echoes once readout mode is active
pub const READOUT_TOKEN: &str = "READOUT";

/// Control code recorded as the start punch
pub const PUNCH_START: u32 = 251;
/// Control code recorded as the finish punch
pub const PUNCH_FINISH: u32 = 252;

const CARD_PREFIX: &str = "Card:";
const PUNCH_SENTINEL: &str = "%\r\n";

/// One control visit read from a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Punch {
    pub control: u32,
    pub timestamp: DateTime<Utc>,
}

/// Everything read from one card tap
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRead {
    pub card_number: u32,
    pub start: Option<DateTime<Utc>>,
    pub finish: Option<DateTime<Utc>>,
    pub punches: Vec<Punch>,
}

/// Connection progress of a reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Disconnected,
    /// Port open, readout mode not confirmed
    Connected,
    /// Handshake done; every further line is a card header or noise
    ReadoutMode,
}

/// Delays around the station's reset and command handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Wait after opening the port; the station resets on connect
    pub settle_delay: Duration,
    /// Wait between writing a command and reading its answer
    pub command_delay: Duration,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            command_delay: Duration::from_millis(100),
        }
    }
}

/// Serial card adapter for an LZFox master station
pub struct LzFoxReader {
    opener: Arc<dyn PortOpener>,
    options: ReaderOptions,
    port: String,
    line: Option<Box<dyn SerialLine>>,
    lines: LineReader,
    state: ReaderState,
}

impl std::fmt::Debug for LzFoxReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LzFoxReader")
            .field("port", &self.port)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl LzFoxReader {
    /// Open `port` and put the station into readout mode
    pub fn connect(
        opener: Arc<dyn PortOpener>,
        port: &str,
        options: ReaderOptions,
    ) -> Result<Self> {
        let mut reader = Self {
            opener,
            options,
            port: port.to_string(),
            line: None,
            lines: LineReader::new(),
            state: ReaderState::Disconnected,
        };
        reader.connect_master_station()?;
        Ok(reader)
    }

    /// Try each candidate port in order; the first completed handshake wins
    pub fn discover(
        opener: Arc<dyn PortOpener>,
        candidates: &[String],
        options: ReaderOptions,
    ) -> Result<Self> {
        if candidates.is_empty() {
            return Err(ConnectionError::DiscoveryFailed {
                reason: "no serial ports found".to_string(),
            }
            .into());
        }

        let mut failures = Vec::new();
        for port in candidates {
            tracing::debug!("Trying port: {}", port);
            match Self::connect(opener.clone(), port, options) {
                Ok(reader) => return Ok(reader),
                Err(e) => failures.push(format!("port {}: {}", port, e)),
            }
        }

        Err(ConnectionError::DiscoveryFailed {
            reason: format!(
                "No LZFox master station found. Possible reasons: {}",
                failures.join("; ")
            ),
        }
        .into())
    }

    /// Port the reader is bound to
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    fn connect_master_station(&mut self) -> Result<()> {
        let mut line = self.opener.open(&self.port)?;
        self.state = ReaderState::Connected;

        std::thread::sleep(self.options.settle_delay);
        line.clear_input().map_err(|e| ConnectionError::FailedToOpen {
            port: self.port.clone(),
            reason: format!("could not flush input: {}", e),
        })?;
        self.lines.clear();
        self.line = Some(line);

        self.set_readout_mode()?;
        self.state = ReaderState::ReadoutMode;

        match self.read_version()? {
            Some(version) => {
                tracing::info!("Master station {} on port '{}' connected", version, self.port)
            }
            None => tracing::info!("Master station on port '{}' connected", self.port),
        }
        Ok(())
    }

    /// Switch the station to readout mode
    pub fn set_readout_mode(&mut self) -> Result<()> {
        tracing::debug!("Setting readout mode");
        let response = self.send_command(CMD_SET_READOUT_MODE)?;
        tracing::debug!("Readout response: {:?}", response);

        if mode_token(&response) != Some(READOUT_TOKEN) {
            return Err(ConnectionError::HandshakeRejected {
                expected: READOUT_TOKEN.to_string(),
                actual: response,
            }
            .into());
        }
        // trailing '>' prompt
        self.read_raw_line()?;
        Ok(())
    }

    /// Firmware version reported by the station
    pub fn read_version(&mut self) -> Result<Option<String>> {
        let response = self.send_command(CMD_GET_VERSION)?;
        Ok(response_value(&response).map(str::to_string))
    }

    /// Battery voltage reported by the station
    pub fn read_voltage(&mut self) -> Result<Option<String>> {
        let response = self.send_command(CMD_GET_VOLTAGE)?;
        Ok(response_value(&response).map(str::to_string))
    }

    /// Close the port and run the connect sequence again on the same port
    pub fn reconnect(&mut self) -> Result<()> {
        self.disconnect();
        self.connect_master_station()
    }

    /// Release the serial port
    pub fn disconnect(&mut self) {
        if self.line.take().is_some() {
            tracing::debug!("Closing serial port {}", self.port);
        }
        self.lines.clear();
        self.state = ReaderState::Disconnected;
    }

    /// Read one card tap, if the station pushed one
    ///
    /// Lines that are not a card header, and headers not followed by a
    /// terminated punch line, are protocol noise and yield `None`.
    pub fn poll_card(&mut self) -> Result<Option<CardRead>> {
        let header = self.read_raw_line()?;
        if !header.starts_with(CARD_PREFIX) {
            if !header.is_empty() {
                tracing::debug!("Ignoring line: {:?}", header);
            }
            return Ok(None);
        }

        let Some(card_number) = parse_card_header(&header) else {
            tracing::debug!("Malformed card header: {:?}", header);
            return Ok(None);
        };

        let punch_line = self.read_raw_line()?;
        if !punch_line.ends_with(PUNCH_SENTINEL) {
            tracing::debug!("Card {} punch line incomplete: {:?}", card_number, punch_line);
            return Ok(None);
        }

        let card = build_card_read(card_number, &punch_line);
        tracing::debug!("{:?}", card);
        Ok(Some(card))
    }

    fn send_command(&mut self, command: &[u8]) -> Result<String> {
        self.line_mut()?.write_all(command)?;
        std::thread::sleep(self.options.command_delay);
        self.read_response()
    }

    fn read_response(&mut self) -> Result<String> {
        let first = self.read_raw_line()?;
        tracing::debug!("Read first line: {:?}", first);
        if first != "\r\n" && first != ">\r\n" {
            return Err(ConnectionError::ProtocolFault { response: first }.into());
        }
        self.read_raw_line()
    }

    /// One line, or an empty string if the read timed out
    fn read_raw_line(&mut self) -> Result<String> {
        let line = self
            .line
            .as_mut()
            .ok_or_else(|| not_connected(&self.port))?;
        match self.lines.read_line(line.as_mut())? {
            LineEvent::Line(text) => Ok(text),
            LineEvent::Pending => Ok(String::new()),
            LineEvent::Closed => Err(ConnectionError::ConnectionLost {
                reason: format!("serial port '{}' closed", self.port),
            }
            .into()),
        }
    }

    fn line_mut(&mut self) -> Result<&mut Box<dyn SerialLine>> {
        let port = &self.port;
        self.line.as_mut().ok_or_else(|| not_connected(port))
    }
}

impl SourceAdapter for LzFoxReader {
    type Item = CardRead;

    fn poll(&mut self) -> Result<Option<CardRead>> {
        self.poll_card()
    }

    fn close(&mut self) {
        self.disconnect();
    }
}

fn not_connected(port: &str) -> Error {
    ConnectionError::ConnectionLost {
        reason: format!("serial port '{}' is not open", port),
    }
    .into()
}

/// Uppercase token after the last `:` of a `<echo>:<TOKEN>[ ]\r\n` answer
fn mode_token(response: &str) -> Option<&str> {
    let body = response.strip_suffix("\r\n")?;
    let body = body
        .strip_suffix(|c: char| c.is_whitespace())
        .unwrap_or(body);
    let (_, token) = body.rsplit_once(':')?;
    (!token.is_empty() && token.chars().all(|c| c.is_ascii_uppercase())).then_some(token)
}

/// Value after the last `:` of a `<echo>:<value>\r\n` answer
fn response_value(response: &str) -> Option<&str> {
    let body = response.strip_suffix("\r\n")?;
    body.rsplit_once(':').map(|(_, value)| value)
}

/// Card number from a `Card: XX XX XX XX` header, read as one hex number
pub fn parse_card_header(line: &str) -> Option<u32> {
    let start = line.find("Card: ")? + "Card: ".len();
    let fields: Vec<char> = line[start..].chars().take(11).collect();
    if fields.len() < 11 || fields[2] != ' ' || fields[5] != ' ' || fields[8] != ' ' {
        return None;
    }

    let hex: String = [0, 1, 3, 4, 6, 7, 9, 10].iter().map(|&i| fields[i]).collect();
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(&hex, 16).ok()
}

/// Every `digits,digits` pair in a punch line, left to right
pub fn parse_punch_pairs(line: &str) -> Vec<(u64, u64)> {
    let mut pairs = Vec::new();
    for run in line.split(|c: char| !(c.is_ascii_digit() || c == ',')) {
        let mut pending: Option<&str> = None;
        for part in run.split(',') {
            if part.is_empty() {
                pending = None;
                continue;
            }
            match pending.take() {
                None => pending = Some(part),
                Some(first) => {
                    if let (Ok(a), Ok(b)) = (first.parse::<u64>(), part.parse::<u64>()) {
                        pairs.push((a, b));
                    } else {
                        tracing::debug!("Punch pair out of range: {},{}", first, part);
                    }
                }
            }
        }
    }
    pairs
}

/// Route parsed pairs into start, finish and punches
pub fn build_card_read(card_number: u32, punch_line: &str) -> CardRead {
    let mut card = CardRead {
        card_number,
        ..CardRead::default()
    };

    for (control, seconds) in parse_punch_pairs(punch_line) {
        let Some(timestamp) = i64::try_from(seconds)
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        else {
            tracing::warn!("Card {}: timestamp {} out of range", card_number, seconds);
            continue;
        };

        match u32::try_from(control) {
            Ok(PUNCH_START) => card.start = Some(timestamp),
            Ok(PUNCH_FINISH) => card.finish = Some(timestamp),
            Ok(control) => card.punches.push(Punch { control, timestamp }),
            Err(_) => tracing::warn!("Card {}: control {} out of range", card_number, control),
        }
    }
    card
}
