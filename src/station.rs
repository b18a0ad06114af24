//! Headless station: both links feeding one in-memory race.
//!
//! The station owns the UI loop. Callbacks run only inside [`Station::pump`],
//! on the thread that owns the station.

use racelink_communication::{CardReader, Teamwork};
use racelink_core::{
    Command, MemoryRace, RaceResult, RaceStore, Result, UiLoop, DEFAULT_UI_CAPACITY,
};
use racelink_settings::Config;
use std::time::Duration;

/// Teamwork kind carrying a result added at another station
pub const KIND_RESULT_ADD: &str = "result_add";

/// UI-owned state the link callbacks mutate
#[derive(Debug, Default)]
pub struct StationState {
    pub race: MemoryRace,
    /// Commands produced by callbacks, sent to peers after each pump
    outbox: Vec<Command>,
}

impl StationState {
    fn card_result(&mut self, result: RaceResult) {
        tracing::info!(
            "Card {} read: {} splits",
            result.card_number,
            result.splits.len()
        );
        match serde_json::to_value(&result) {
            Ok(payload) => self.outbox.push(Command::new(KIND_RESULT_ADD, payload)),
            Err(e) => tracing::warn!("Card {} not shared with peers: {}", result.card_number, e),
        }
        self.race.add_result(result);
    }

    fn peer_command(&mut self, command: Command) {
        if !command.is_kind(KIND_RESULT_ADD) {
            tracing::debug!("Ignoring peer {}", command);
            return;
        }
        match serde_json::from_value::<RaceResult>(command.payload) {
            Ok(result) => {
                tracing::info!("Card {} received from peer", result.card_number);
                self.race.add_result(result);
            }
            Err(e) => tracing::warn!("Malformed result from peer: {}", e),
        }
    }
}

/// A station running the card reader and teamwork links
pub struct Station {
    state: StationState,
    ui_loop: UiLoop<StationState>,
    card_reader: CardReader<StationState>,
    teamwork: Teamwork<StationState>,
}

impl Station {
    /// Wire both links to a fresh race
    pub fn new(config: &Config) -> Self {
        Self::with_race(config, MemoryRace::new())
    }

    /// Wire both links to `race`
    pub fn with_race(config: &Config, race: MemoryRace) -> Self {
        let (ui_loop, ui) = UiLoop::new(DEFAULT_UI_CAPACITY);

        let mut card_reader = CardReader::new(config.card_reader.clone(), ui.clone());
        card_reader.register_callback(StationState::card_result);

        let mut teamwork = Teamwork::new(config.teamwork.clone(), ui);
        teamwork.register_callback(StationState::peer_command);

        Self {
            state: StationState {
                race,
                outbox: Vec::new(),
            },
            ui_loop,
            card_reader,
            teamwork,
        }
    }

    /// Start both links
    pub fn start(&mut self) -> Result<()> {
        self.card_reader.start(&self.state.race)?;
        self.teamwork.start()
    }

    /// Run callbacks for up to `duration`, then forward their outbox to peers
    pub fn pump(&mut self, duration: Duration) -> usize {
        let ran = self.ui_loop.run_for(&mut self.state, duration);
        for command in self.state.outbox.drain(..) {
            self.teamwork.send(command);
        }
        ran
    }

    pub fn stop(&self) {
        self.card_reader.stop();
        self.teamwork.stop();
    }

    /// True while either link is running
    pub fn is_alive(&self) -> bool {
        self.card_reader.is_alive() || self.teamwork.is_alive()
    }

    pub fn card_reader(&mut self) -> &mut CardReader<StationState> {
        &mut self.card_reader
    }

    pub fn teamwork(&mut self) -> &mut Teamwork<StationState> {
        &mut self.teamwork
    }

    pub fn race(&self) -> &MemoryRace {
        &self.state.race
    }

    /// Stop both links and wait for their workers
    pub fn shutdown(self, timeout: Duration) -> bool {
        self.stop();
        self.card_reader.wait_finished(timeout) && self.teamwork.wait_finished(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use racelink_core::ResultKind;

    #[test]
    fn test_card_result_is_stored_and_shared() {
        let mut state = StationState::default();
        let mut result = RaceResult::new(ResultKind::LzFox);
        result.card_number = 99;

        state.card_result(result.clone());
        assert_eq!(state.race.results(), &[result.clone()]);
        assert_eq!(state.outbox.len(), 1);
        assert!(state.outbox[0].is_kind(KIND_RESULT_ADD));

        let mut peer = StationState::default();
        peer.peer_command(state.outbox.remove(0));
        assert_eq!(peer.race.results(), &[result]);
    }

    #[test]
    fn test_unknown_peer_commands_are_ignored() {
        let mut state = StationState::default();
        state.peer_command(Command::new("person_update", serde_json::json!({})));
        state.peer_command(Command::new(KIND_RESULT_ADD, serde_json::json!("garbage")));
        assert!(state.race.results().is_empty());
        assert!(state.outbox.is_empty());
    }
}
