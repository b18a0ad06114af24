//! # Card reader
//!
//! Reads LZFox cards from a master station on a serial port and hands each
//! readout to the UI thread as a race result.
//!
//! The producer owns the [`LzFoxReader`]; the dispatcher converts every
//! [`CardRead`] with the race time base captured at [`CardReader::start`].

pub mod protocol;
pub mod result;

pub use protocol::{CardRead, LzFoxReader, Punch, ReaderOptions, ReaderState};
pub use result::card_to_result;

use crate::communication::engine_timings;
use crate::communication::serial::{candidate_ports, PortOpener, SerialParams, SystemPortOpener};
use racelink_core::{
    Command, RaceResult, RaceStore, Result, Supervisor, TimeBase, Transform, UiHandle,
    KIND_CARD_DATA, SETTING_SYSTEM_PORT,
};
use racelink_settings::CardReaderSettings;
use std::sync::Arc;
use std::time::Duration;

/// Source of candidate ports when none is configured
pub type PortScan = Arc<dyn Fn() -> Result<Vec<String>> + Send + Sync>;

/// Supervisor for the serial card reader
pub struct CardReader<C> {
    settings: CardReaderSettings,
    opener: Arc<dyn PortOpener>,
    scan: PortScan,
    port: Option<String>,
    supervisor: Supervisor<CardRead, RaceResult, C>,
}

impl<C: 'static> CardReader<C> {
    /// Card reader on real serial ports
    pub fn new(settings: CardReaderSettings, ui: UiHandle<C>) -> Self {
        let opener = SystemPortOpener::new(SerialParams {
            baud_rate: settings.baud_rate,
            read_timeout: Duration::from_millis(settings.read_timeout_ms),
        });
        Self::with_opener(settings, ui, Arc::new(opener))
    }

    /// Card reader opening ports through `opener`
    pub fn with_opener(
        settings: CardReaderSettings,
        ui: UiHandle<C>,
        opener: Arc<dyn PortOpener>,
    ) -> Self {
        let supervisor = Supervisor::new(
            "cardreader",
            KIND_CARD_DATA,
            ui,
            engine_timings(&settings.engine),
            settings.engine.queue_capacity,
        );
        Self {
            settings,
            opener,
            scan: Arc::new(candidate_ports),
            port: None,
            supervisor,
        }
    }

    /// Replace the platform port scan used for discovery
    pub fn with_port_scan(mut self, scan: PortScan) -> Self {
        self.scan = scan;
        self
    }

    /// Register the result callback; only the first registration is kept
    pub fn register_callback<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&mut C, RaceResult) + Send + Sync + 'static,
    {
        self.supervisor.register_callback(callback);
        self
    }

    /// Start reading cards
    ///
    /// The port comes from the store's `system_port` setting, then from the
    /// configuration; with neither, the platform's candidate ports are
    /// scanned. The race time base is read once here. A producer that is
    /// still running keeps its port.
    pub fn start(&mut self, store: &dyn RaceStore) -> Result<()> {
        let chosen = self.choose_port(store);
        let base = TimeBase::from_store(store);

        let opener = self.opener.clone();
        let scan = self.scan.clone();
        let port = chosen.clone();
        let options = ReaderOptions {
            settle_delay: Duration::from_millis(self.settings.settle_delay_ms),
            command_delay: Duration::from_millis(self.settings.command_delay_ms),
        };
        let connect = move || match port {
            Some(port) => LzFoxReader::connect(opener, &port, options),
            None => {
                tracing::debug!("Port is empty, looking for a master station");
                LzFoxReader::discover(opener, &scan()?, options)
            }
        };

        let transform: Transform<CardRead, RaceResult> = Arc::new(move |cmd: Command<CardRead>| {
            cmd.is_kind(KIND_CARD_DATA)
                .then(|| card_to_result(&cmd.payload, &base))
        });

        if self.supervisor.start_with(connect, transform)? {
            self.port = chosen;
        }
        Ok(())
    }

    /// Ask both workers to stop
    pub fn stop(&self) {
        self.supervisor.stop();
        tracing::info!("Closing connection");
    }

    /// Stop if running, otherwise start
    pub fn toggle(&mut self, store: &dyn RaceStore) -> Result<()> {
        if self.is_alive() {
            self.stop();
            Ok(())
        } else {
            self.start(store)
        }
    }

    pub fn is_alive(&self) -> bool {
        self.supervisor.is_alive()
    }

    /// Port of the running (or last) producer, `None` when discovery was used
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    /// Block until both workers ended or `timeout` elapses
    pub fn wait_finished(&self, timeout: Duration) -> bool {
        self.supervisor.wait_finished(timeout)
    }

    fn choose_port(&self, store: &dyn RaceStore) -> Option<String> {
        store
            .get_setting(SETTING_SYSTEM_PORT, serde_json::Value::Null)
            .as_str()
            .map(str::trim)
            .filter(|port| !port.is_empty())
            .map(str::to_string)
            .or_else(|| self.settings.port.clone())
    }
}
