//! Serial port communication implementation
//!
//! Provides the byte-level serial channel used by the card reader:
//! - Opening a port at a fixed baud rate with a read timeout
//! - Candidate port enumeration per platform for auto-discovery
//! - Port listing with USB details for diagnostics
//!
//! The protocol layer talks to [`SerialLine`] and [`PortOpener`] only, so it
//! can run against scripted lines in tests.

use racelink_core::{ConnectionError, Error, Result};
use std::io::{self, Read, Write};
use std::time::Duration;

/// A blocking, timeout-bounded serial byte stream
pub trait SerialLine: Read + Write + Send {
    /// Discard anything already received but not read
    fn clear_input(&mut self) -> io::Result<()>;

    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    fn name(&self) -> &str;
}

/// Opens serial lines by port name
pub trait PortOpener: Send + Sync {
    /// Open `port`, failing with [`ConnectionError::FailedToOpen`]
    fn open(&self, port: &str) -> Result<Box<dyn SerialLine>>;
}

/// Serial parameters for a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialParams {
    /// Baud rate
    pub baud_rate: u32,
    /// Per-read timeout
    pub read_timeout: Duration,
}

impl Default for SerialParams {
    fn default() -> Self {
        Self {
            baud_rate: 38400,
            read_timeout: Duration::from_secs(5),
        }
    }
}

/// Real serial port implementation using serialport crate
pub struct RealSerialLine {
    name: String,
    port: Box<dyn serialport::SerialPort>,
}

impl RealSerialLine {
    /// Open a serial port with the given parameters
    pub fn open(port_name: &str, params: SerialParams) -> Result<Self> {
        let builder = serialport::new(port_name, params.baud_rate)
            .timeout(params.read_timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None);

        match builder.open() {
            Ok(port) => Ok(Self {
                name: port_name.to_string(),
                port,
            }),
            Err(e) => {
                tracing::debug!("Failed to open serial port {}: {}", port_name, e);
                Err(ConnectionError::FailedToOpen {
                    port: port_name.to_string(),
                    reason: e.to_string(),
                }
                .into())
            }
        }
    }
}

impl Read for RealSerialLine {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for RealSerialLine {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.port.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl SerialLine for RealSerialLine {
    fn clear_input(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::other)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Opens [`RealSerialLine`]s with fixed parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPortOpener {
    params: SerialParams,
}

impl SystemPortOpener {
    pub fn new(params: SerialParams) -> Self {
        Self { params }
    }
}

impl PortOpener for SystemPortOpener {
    fn open(&self, port: &str) -> Result<Box<dyn SerialLine>> {
        tracing::debug!("Opening serial port {} at {} baud", port, self.params.baud_rate);
        Ok(Box::new(RealSerialLine::open(port, self.params)?))
    }
}

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name
    pub port_name: String,
    /// Port description (e.g., "USB Serial Port")
    pub description: String,
    /// USB vendor and product IDs if applicable
    pub usb_ids: Option<(u16, u16)>,
}

/// List serial ports that look like a master station adapter
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        Error::from(ConnectionError::DiscoveryFailed {
            reason: format!("Failed to enumerate ports: {}", e),
        })
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_station_port(&port.port_name))
        .map(|port| SerialPortInfo {
            port_name: port.port_name.clone(),
            description: port_description(port),
            usb_ids: match &port.port_type {
                serialport::SerialPortType::UsbPort(usb) => Some((usb.vid, usb.pid)),
                _ => None,
            },
        })
        .collect())
}

/// Candidate ports to scan on the running platform
///
/// - Linux: /dev/ttyUSB*, /dev/ttyACM* (sorted)
/// - Windows: COM0 through COM31
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem* (sorted)
pub fn candidate_ports() -> Result<Vec<String>> {
    let os = std::env::consts::OS;
    let dev_names = match os {
        "linux" | "macos" => std::fs::read_dir("/dev")?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect(),
        _ => Vec::new(),
    };
    candidates_for(os, &dev_names)
}

/// Candidate ports for `os` given the names found under `/dev`
pub fn candidates_for(os: &str, dev_names: &[String]) -> Result<Vec<String>> {
    let prefixes: &[&str] = match os {
        "linux" => &["ttyUSB", "ttyACM"],
        "macos" => &["cu.usbserial-", "cu.usbmodem"],
        "windows" => return Ok((0..32).map(|i| format!("COM{}", i)).collect()),
        other => {
            return Err(ConnectionError::UnsupportedPlatform {
                platform: other.to_string(),
            }
            .into())
        }
    };

    let mut ports: Vec<String> = dev_names
        .iter()
        .filter(|name| prefixes.iter().any(|prefix| name.starts_with(prefix)))
        .map(|name| format!("/dev/{}", name))
        .collect();
    ports.sort();
    Ok(ports)
}

fn is_station_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    [
        "/dev/ttyUSB",
        "/dev/ttyACM",
        "/dev/cu.usbserial-",
        "/dev/cu.usbmodem",
    ]
    .iter()
    .any(|prefix| port_name.starts_with(prefix))
}

fn port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}
