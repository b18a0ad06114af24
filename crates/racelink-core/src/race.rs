//! Race-data store boundary
//!
//! The relational race model lives outside this workspace. The links only
//! need to create result records, read a few settings, and hand finished
//! results back to the store from the UI thread.

use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Setting holding the serial port path (string or null)
pub const SETTING_SYSTEM_PORT: &str = "system_port";

/// Setting holding the race zero time as `[hour, minute, second]`
pub const SETTING_SYSTEM_ZERO_TIME: &str = "system_zero_time";

/// Origin of a result record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// Entered by hand
    Manual,
    /// Read out from an LZFox card
    LzFox,
}

/// One control visit on a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    /// Control code as printed on the course
    pub code: String,
    /// Local time of day of the punch
    pub time: NaiveTime,
    /// Whole days between the race zero date and the punch
    pub days: i64,
}

/// A result record as handed to the race store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceResult {
    pub kind: ResultKind,
    pub card_number: u32,
    pub start_time: Option<NaiveTime>,
    pub finish_time: Option<NaiveTime>,
    pub splits: Vec<Split>,
}

impl RaceResult {
    /// Create an empty result of the given kind
    pub fn new(kind: ResultKind) -> Self {
        Self {
            kind,
            card_number: 0,
            start_time: None,
            finish_time: None,
            splits: Vec::new(),
        }
    }
}

/// What the links require from the race-data store
pub trait RaceStore {
    /// Create a new, not yet inserted, result
    fn new_result(&self, kind: ResultKind) -> RaceResult {
        RaceResult::new(kind)
    }

    /// Look up a setting, falling back to `default`
    fn get_setting(&self, key: &str, default: Value) -> Value;

    /// Insert a finished result
    fn add_result(&mut self, result: RaceResult);
}

/// In-memory race store
#[derive(Debug, Default, Clone)]
pub struct MemoryRace {
    settings: HashMap<String, Value>,
    results: Vec<RaceResult>,
}

impl MemoryRace {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a setting value
    pub fn set_setting(&mut self, key: impl Into<String>, value: Value) {
        self.settings.insert(key.into(), value);
    }

    /// Results inserted so far, oldest first
    pub fn results(&self) -> &[RaceResult] {
        &self.results
    }
}

impl RaceStore for MemoryRace {
    fn get_setting(&self, key: &str, default: Value) -> Value {
        self.settings.get(key).cloned().unwrap_or(default)
    }

    fn add_result(&mut self, result: RaceResult) {
        self.results.push(result);
    }
}

/// Race-local time base used to translate hardware timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    /// Race zero time on the race day
    pub zero: NaiveDateTime,
    /// Offset of the race's local time from UTC
    pub offset: FixedOffset,
}

impl TimeBase {
    /// Create a time base from an explicit zero time and offset
    pub fn new(zero: NaiveDateTime, offset: FixedOffset) -> Self {
        Self { zero, offset }
    }

    /// Build today's time base from the store's `system_zero_time` setting
    ///
    /// Missing or malformed settings fall back to 08:00:00.
    pub fn from_store(store: &dyn RaceStore) -> Self {
        let raw = store.get_setting(SETTING_SYSTEM_ZERO_TIME, serde_json::json!([8, 0, 0]));
        let zero_time = parse_zero_time(&raw).unwrap_or_else(|| {
            tracing::warn!("Invalid {} setting {}, using 08:00:00", SETTING_SYSTEM_ZERO_TIME, raw);
            NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default()
        });

        let now = Local::now();
        Self {
            zero: now.date_naive().and_time(zero_time),
            offset: now.offset().fix(),
        }
    }

    /// Local wall-clock time of an instant
    pub fn local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        self.offset.from_utc_datetime(&at.naive_utc()).naive_local()
    }

    /// Local time of day of an instant
    pub fn time_of_day(&self, at: DateTime<Utc>) -> NaiveTime {
        self.local(at).time()
    }

    /// Whole days from the race zero date to the instant's local date
    pub fn days(&self, at: DateTime<Utc>) -> i64 {
        let date: NaiveDate = self.local(at).date();
        i64::from(date.num_days_from_ce() - self.zero.date().num_days_from_ce())
    }
}

fn parse_zero_time(raw: &Value) -> Option<NaiveTime> {
    let parts = raw.as_array().filter(|parts| !parts.is_empty())?;
    // missing minutes and seconds read as zero, out-of-range values reject
    let field = |i: usize| match parts.get(i) {
        None => Some(0),
        Some(v) => v.as_u64().and_then(|v| u32::try_from(v).ok()),
    };
    NaiveTime::from_hms_opt(field(0)?, field(1)?, field(2)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn utc_base() -> TimeBase {
        let zero = NaiveDate::from_ymd_opt(2024, 5, 11)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        TimeBase::new(zero, FixedOffset::east_opt(0).unwrap())
    }

    #[test]
    fn test_memory_race_settings_and_results() {
        let mut race = MemoryRace::new();
        assert_eq!(race.get_setting(SETTING_SYSTEM_PORT, Value::Null), Value::Null);

        race.set_setting(SETTING_SYSTEM_PORT, json!("/dev/ttyUSB0"));
        assert_eq!(race.get_setting(SETTING_SYSTEM_PORT, Value::Null), json!("/dev/ttyUSB0"));

        let mut result = race.new_result(ResultKind::LzFox);
        result.card_number = 7;
        race.add_result(result);
        assert_eq!(race.results().len(), 1);
        assert_eq!(race.results()[0].kind, ResultKind::LzFox);
    }

    #[test]
    fn test_time_base_translation() {
        let base = utc_base();
        let at = Utc.with_ymd_and_hms(2024, 5, 12, 9, 30, 15).unwrap();
        assert_eq!(base.time_of_day(at), NaiveTime::from_hms_opt(9, 30, 15).unwrap());
        assert_eq!(base.days(at), 1);

        let shifted = TimeBase::new(base.zero, FixedOffset::east_opt(3 * 3600).unwrap());
        assert_eq!(shifted.time_of_day(at), NaiveTime::from_hms_opt(12, 30, 15).unwrap());
    }

    #[test]
    fn test_zero_time_setting() {
        let mut race = MemoryRace::new();
        race.set_setting(SETTING_SYSTEM_ZERO_TIME, json!([11, 30, 0]));
        let base = TimeBase::from_store(&race);
        assert_eq!(base.zero.time(), NaiveTime::from_hms_opt(11, 30, 0).unwrap());

        race.set_setting(SETTING_SYSTEM_ZERO_TIME, json!("noon"));
        let base = TimeBase::from_store(&race);
        assert_eq!(base.zero.time(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());

        // 2^32 + 11 must not truncate to 11 o'clock
        race.set_setting(SETTING_SYSTEM_ZERO_TIME, json!([4_294_967_307u64, 30, 0]));
        let base = TimeBase::from_store(&race);
        assert_eq!(base.zero.time(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_zero_time_fields() {
        assert_eq!(parse_zero_time(&json!([9])), NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(parse_zero_time(&json!([9, 15, 30])), NaiveTime::from_hms_opt(9, 15, 30));
        assert_eq!(parse_zero_time(&json!([])), None);
        assert_eq!(parse_zero_time(&json!([4_294_967_307u64, 30, 0])), None);
        assert_eq!(parse_zero_time(&json!([11, 4_294_967_326u64])), None);
        assert_eq!(parse_zero_time(&json!([11, "30"])), None);
    }
}
