//! Server role: accepts client stations and relays between them.
//!
//! Frames received from one client are handed to the local station and
//! forwarded unchanged to every other client, so all stations in the star
//! see every command. A peer that fails is dropped; the server keeps going.

use super::protocol::{decode_frame, encode_frame};
use super::PeerLink;
use crate::communication::line::{is_timeout, LineEvent, LineReader};
use racelink_core::{Command, ConnectionError, Result};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::{Duration, Instant};
use uuid::Uuid;

struct Peer {
    addr: SocketAddr,
    stream: TcpStream,
    lines: LineReader,
}

/// Listening end of a teamwork link
pub struct TeamworkServer {
    station: Uuid,
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    peers: Vec<Peer>,
    inbox: VecDeque<Command>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl TeamworkServer {
    /// Bind `host:port`; port 0 picks a free port
    pub fn bind(host: &str, port: u16, station: Uuid, read_timeout: Duration) -> Result<Self> {
        let listener = TcpListener::bind((host, port)).map_err(|e| ConnectionError::TcpError {
            reason: format!("could not listen on {}:{}: {}", host, port, e),
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Teamwork server listening on {}", local_addr);

        Ok(Self {
            station,
            listener: Some(listener),
            local_addr,
            peers: Vec::new(),
            inbox: VecDeque::new(),
            read_timeout,
            write_timeout: Duration::from_secs(1),
        })
    }

    /// Address actually bound
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connected client stations
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    fn accept_pending(&mut self) -> Result<()> {
        let Some(listener) = &self.listener else {
            return Ok(());
        };
        loop {
            match listener.accept() {
                Ok((stream, addr)) => {
                    stream.set_nonblocking(true)?;
                    stream.set_nodelay(true)?;
                    tracing::info!("Teamwork peer {} connected", addr);
                    self.peers.push(Peer {
                        addr,
                        stream,
                        lines: LineReader::new(),
                    });
                }
                Err(e) if is_timeout(&e) => return Ok(()),
                Err(e) => {
                    return Err(ConnectionError::TcpError {
                        reason: format!("accept failed on {}: {}", self.local_addr, e),
                    }
                    .into())
                }
            }
        }
    }

    /// Read every complete line from every peer, relaying as we go
    fn collect_frames(&mut self) {
        let mut relays: Vec<(usize, String)> = Vec::new();
        let mut dead: Vec<usize> = Vec::new();

        for (index, peer) in self.peers.iter_mut().enumerate() {
            loop {
                match peer.lines.read_line(&mut peer.stream) {
                    Ok(LineEvent::Line(line)) => match decode_frame(&line) {
                        Ok(frame) if frame.station == self.station => {}
                        Ok(frame) => {
                            self.inbox.push_back(frame.into_command());
                            relays.push((index, line));
                        }
                        Err(e) => tracing::warn!("Ignoring frame from {}: {}", peer.addr, e),
                    },
                    Ok(LineEvent::Pending) => break,
                    Ok(LineEvent::Closed) => {
                        tracing::warn!("Teamwork peer {} disconnected", peer.addr);
                        dead.push(index);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Dropping teamwork peer {}: {}", peer.addr, e);
                        dead.push(index);
                        break;
                    }
                }
            }
        }

        for (source, line) in relays {
            for (index, peer) in self.peers.iter_mut().enumerate() {
                if index == source || dead.contains(&index) {
                    continue;
                }
                if let Err(e) = write_with_deadline(&mut peer.stream, line.as_bytes(), self.write_timeout) {
                    tracing::warn!("Dropping teamwork peer {}: {}", peer.addr, e);
                    dead.push(index);
                }
            }
        }

        self.drop_peers(dead);
    }

    fn drop_peers(&mut self, mut dead: Vec<usize>) {
        dead.sort_unstable();
        dead.dedup();
        for index in dead.into_iter().rev() {
            self.peers.remove(index);
        }
    }
}

impl PeerLink for TeamworkServer {
    fn receive_one(&mut self) -> Result<Option<Command>> {
        if let Some(command) = self.inbox.pop_front() {
            return Ok(Some(command));
        }

        let deadline = Instant::now() + self.read_timeout;
        loop {
            self.accept_pending()?;
            self.collect_frames();
            if let Some(command) = self.inbox.pop_front() {
                return Ok(Some(command));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn send(&mut self, command: &Command) -> Result<()> {
        let bytes = encode_frame(self.station, command)?;
        let mut dead = Vec::new();
        for (index, peer) in self.peers.iter_mut().enumerate() {
            if let Err(e) = write_with_deadline(&mut peer.stream, &bytes, self.write_timeout) {
                tracing::warn!("Dropping teamwork peer {}: {}", peer.addr, e);
                dead.push(index);
            }
        }
        self.drop_peers(dead);
        Ok(())
    }

    fn disconnect(&mut self) {
        for peer in self.peers.drain(..) {
            let _ = peer.stream.shutdown(std::net::Shutdown::Both);
        }
        if self.listener.take().is_some() {
            tracing::debug!("Teamwork server on {} closed", self.local_addr);
        }
    }
}

/// `write_all` on a non-blocking socket, retrying until `timeout`
fn write_with_deadline(stream: &mut TcpStream, mut data: &[u8], timeout: Duration) -> io::Result<()> {
    let deadline = Instant::now() + timeout;
    while !data.is_empty() {
        match stream.write(data) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => data = &data[n..],
            Err(e) if is_timeout(&e) || e.kind() == io::ErrorKind::Interrupted => {
                if Instant::now() >= deadline {
                    return Err(io::ErrorKind::TimedOut.into());
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
