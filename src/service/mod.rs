//! Domain services shared by handlers, jobs and CLI commands

pub mod activity;
pub mod dashboard;
pub mod demo;
pub mod equipment;
pub mod event;
pub mod import;
pub mod location;
pub mod notify;
pub mod reports;
pub mod schedule;
pub mod settings;
pub mod title;
pub mod webhook;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

/// Hour of day (UTC) used when only a date is known
pub const DEFAULT_START_HOUR: u32 = 9;

pub fn ts_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_default()
}

pub fn ts_date(ts: i64) -> NaiveDate {
    ts_to_datetime(ts).date_naive()
}

pub fn ts_time(ts: i64) -> NaiveTime {
    ts_to_datetime(ts).time()
}

pub fn date_time_ts(date: NaiveDate, time: NaiveTime) -> i64 {
    date.and_time(time).and_utc().timestamp()
}

pub fn default_start_time() -> NaiveTime {
    NaiveTime::from_hms_opt(DEFAULT_START_HOUR, 0, 0).unwrap_or(NaiveTime::MIN)
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parse `YYYY-MM-DD`
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_helpers() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let ts = date_time_ts(date, default_start_time());
        assert_eq!(ts_date(ts), date);
        assert_eq!(ts_time(ts), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(parse_date(" 2025-01-02 "), Some(date));
        assert_eq!(parse_date("02/01/2025"), None);
    }
}
