//! Byte channels shared by the station links
//!
//! - [`line`]: newline framing with partial-line buffering
//! - [`serial`]: serial port access and discovery

pub mod line;
pub mod serial;

use racelink_core::EngineTimings;
use racelink_settings::EngineSettings;
use std::time::Duration;

/// Worker timings from configured engine settings
pub fn engine_timings(settings: &EngineSettings) -> EngineTimings {
    EngineTimings {
        poll_interval: Duration::from_millis(settings.poll_interval_ms),
        put_timeout: Duration::from_millis(settings.put_timeout_ms),
        pop_timeout: Duration::from_millis(settings.pop_timeout_ms),
        startup_delay: Duration::from_millis(settings.startup_delay_ms),
        ..EngineTimings::default()
    }
}
