//! Card readout to race result conversion.

use super::protocol::CardRead;
use racelink_core::{RaceResult, ResultKind, Split, TimeBase};

/// Build the result record for a card readout
///
/// Punches with control code 0 are dropped. Start and finish are kept only
/// when the card carried them.
pub fn card_to_result(card: &CardRead, base: &TimeBase) -> RaceResult {
    let mut result = RaceResult::new(ResultKind::LzFox);
    result.card_number = card.card_number;

    result.splits = card
        .punches
        .iter()
        .filter(|punch| punch.control != 0)
        .map(|punch| Split {
            code: punch.control.to_string(),
            time: base.time_of_day(punch.timestamp),
            days: base.days(punch.timestamp),
        })
        .collect();

    result.start_time = card.start.map(|at| base.time_of_day(at));
    result.finish_time = card.finish.map(|at| base.time_of_day(at));
    result
}
