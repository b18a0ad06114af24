//! # Teamwork
//!
//! Replicates data-mutation commands between stations over TCP. One station
//! runs the server role, the others connect to it as clients.
//!
//! Two queues per link: the supervisor's inbound queue carries commands
//! received from peers to the UI callback, and the outbound queue carries
//! commands passed to [`Teamwork::send`] to the connection's write side.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::TeamworkClient;
pub use protocol::{decode_frame, encode_frame, Frame};
pub use server::TeamworkServer;

use crate::communication::engine_timings;
use racelink_core::{Command, CommandQueue, Result, SourceAdapter, Supervisor, Transform, UiHandle};
use racelink_settings::{PeerRole, TeamworkSettings};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Kind tag the producer puts on commands received from peers
pub const KIND_TEAMWORK: &str = "teamwork";

/// Connection to other stations, in either role
///
/// `receive_one` blocks for at most the role's read timeout and returns at
/// most one command.
pub trait PeerLink: Send {
    /// Next command received from a peer, if any arrived
    fn receive_one(&mut self) -> Result<Option<Command>>;

    /// Send a local command to the connected peer(s)
    fn send(&mut self, command: &Command) -> Result<()>;

    /// Close every socket
    fn disconnect(&mut self);
}

/// Source adapter pairing a peer link with the outbound queue
pub struct TeamworkAdapter {
    link: Box<dyn PeerLink>,
    outbound: Arc<CommandQueue<Command>>,
}

impl TeamworkAdapter {
    pub fn new(link: Box<dyn PeerLink>, outbound: Arc<CommandQueue<Command>>) -> Self {
        Self { link, outbound }
    }
}

impl SourceAdapter for TeamworkAdapter {
    type Item = Command;

    fn poll(&mut self) -> Result<Option<Command>> {
        while let Some(command) = self.outbound.try_pop() {
            tracing::debug!("Sending {}", command);
            self.link.send(&command)?;
        }
        self.link.receive_one()
    }

    fn close(&mut self) {
        self.link.disconnect();
    }
}

/// Supervisor for the teamwork link
pub struct Teamwork<C> {
    settings: TeamworkSettings,
    station: Uuid,
    outbound: Arc<CommandQueue<Command>>,
    supervisor: Supervisor<Command, Command, C>,
}

impl<C: 'static> Teamwork<C> {
    /// Create a teamwork link with a fresh station id
    pub fn new(settings: TeamworkSettings, ui: UiHandle<C>) -> Self {
        let supervisor = Supervisor::new(
            "teamwork",
            KIND_TEAMWORK,
            ui,
            engine_timings(&settings.engine),
            settings.engine.queue_capacity,
        );
        Self {
            outbound: Arc::new(CommandQueue::new(settings.engine.queue_capacity)),
            station: Uuid::new_v4(),
            settings,
            supervisor,
        }
    }

    /// Id stamped on every frame this station sends
    pub fn station(&self) -> Uuid {
        self.station
    }

    pub fn settings(&self) -> &TeamworkSettings {
        &self.settings
    }

    /// Change the address and role used by the next `start`
    pub fn set_options(&mut self, host: impl Into<String>, port: u16, role: PeerRole) {
        self.settings.host = host.into();
        self.settings.port = port;
        self.settings.role = role;
    }

    /// Register the command callback; only the first registration is kept
    pub fn register_callback<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&mut C, Command) + Send + Sync + 'static,
    {
        self.supervisor.register_callback(callback);
        self
    }

    /// Start the link, discarding anything left in either queue
    pub fn start(&mut self) -> Result<()> {
        let stale = self.supervisor.clear_queue() + self.outbound.clear();
        if stale > 0 {
            tracing::debug!("Discarded {} stale teamwork commands", stale);
        }

        let settings = self.settings.clone();
        let station = self.station;
        let outbound = self.outbound.clone();
        let connect = move || -> Result<TeamworkAdapter> {
            let host = settings.effective_host();
            let read_timeout = Duration::from_millis(settings.read_timeout_ms);
            let link: Box<dyn PeerLink> = match settings.role {
                PeerRole::Server => {
                    Box::new(TeamworkServer::bind(host, settings.port, station, read_timeout)?)
                }
                PeerRole::Client => Box::new(TeamworkClient::connect(
                    host,
                    settings.port,
                    station,
                    Duration::from_millis(settings.connect_timeout_ms),
                    read_timeout,
                )?),
            };
            Ok(TeamworkAdapter::new(link, outbound))
        };

        let relay: Transform<Command, Command> = Arc::new(|cmd: Command<Command>| Some(cmd.payload));
        self.supervisor.start_with(connect, relay)?;
        Ok(())
    }

    /// Ask both workers to stop
    pub fn stop(&self) {
        self.supervisor.stop();
    }

    /// Stop if running, otherwise start
    pub fn toggle(&mut self) -> Result<()> {
        if self.is_alive() {
            self.stop();
            Ok(())
        } else {
            self.start()
        }
    }

    pub fn is_alive(&self) -> bool {
        self.supervisor.is_alive()
    }

    /// Queue a local command for the peers
    ///
    /// Dropped when the link is not alive or the outbound queue is full.
    /// Never blocks.
    pub fn send(&self, command: Command) {
        if !self.is_alive() {
            tracing::debug!("Teamwork not connected, dropping {}", command);
            return;
        }
        if let Err(e) = self.outbound.try_push(command) {
            tracing::warn!("Dropping outgoing teamwork command: {}", e);
        }
    }

    /// Block until both workers ended or `timeout` elapses
    pub fn wait_finished(&self, timeout: Duration) -> bool {
        self.supervisor.wait_finished(timeout)
    }
}
