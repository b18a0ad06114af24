//! Client role: one outbound connection to a server station.

use super::protocol::{decode_frame, encode_frame};
use super::PeerLink;
use crate::communication::line::{LineEvent, LineReader};
use racelink_core::{Command, ConnectionError, Error, Result};
use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use uuid::Uuid;

/// Connected client end of a teamwork link
#[derive(Debug)]
pub struct TeamworkClient {
    station: Uuid,
    peer: SocketAddr,
    stream: Option<TcpStream>,
    lines: LineReader,
}

impl TeamworkClient {
    /// Connect to `host:port`, trying every resolved address in turn
    pub fn connect(
        host: &str,
        port: u16,
        station: Uuid,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| ConnectionError::TcpError {
                reason: format!("could not resolve {}:{}: {}", host, port, e),
            })?
            .collect();

        let mut last_error = format!("no address for {}:{}", host, port);
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(read_timeout))?;
                    stream.set_write_timeout(Some(connect_timeout))?;
                    stream.set_nodelay(true)?;
                    tracing::info!("Teamwork connected to {}", addr);
                    return Ok(Self {
                        station,
                        peer: addr,
                        stream: Some(stream),
                        lines: LineReader::new(),
                    });
                }
                Err(e) => last_error = format!("{}: {}", addr, e),
            }
        }

        Err(ConnectionError::TcpError {
            reason: format!("could not connect to teamwork server: {}", last_error),
        }
        .into())
    }

    /// Address of the server
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn stream(&mut self) -> Result<&mut TcpStream> {
        let peer = self.peer;
        self.stream.as_mut().ok_or_else(|| closed(peer))
    }
}

fn closed(peer: SocketAddr) -> Error {
    ConnectionError::ConnectionLost {
        reason: format!("connection to {} is closed", peer),
    }
    .into()
}

impl PeerLink for TeamworkClient {
    fn receive_one(&mut self) -> Result<Option<Command>> {
        let station = self.station;
        let peer = self.peer;
        loop {
            let stream = self.stream.as_mut().ok_or_else(|| closed(peer))?;
            let event = self.lines.read_line(stream)?;
            match event {
                LineEvent::Line(line) => match decode_frame(&line) {
                    Ok(frame) if frame.station == station => continue,
                    Ok(frame) => return Ok(Some(frame.into_command())),
                    Err(e) => tracing::warn!("Ignoring frame from {}: {}", peer, e),
                },
                LineEvent::Pending => return Ok(None),
                LineEvent::Closed => {
                    return Err(ConnectionError::ConnectionLost {
                        reason: format!("teamwork server {} closed the connection", peer),
                    }
                    .into())
                }
            }
        }
    }

    fn send(&mut self, command: &Command) -> Result<()> {
        let bytes = encode_frame(self.station, command)?;
        self.stream()?.write_all(&bytes)?;
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            tracing::debug!("Teamwork disconnected from {}", self.peer);
        }
    }
}
