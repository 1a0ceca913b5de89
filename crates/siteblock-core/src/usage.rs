//! Per-rule daily usage counters.
//!
//! A record only counts for the calendar day it is dated. Reading a record
//! dated any other day yields zero, and accumulating into one resets it first,
//! so usage never carries across days.

use std::collections::BTreeMap;

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};

/// Usage map keyed by the time-limit rule's `url`.
pub type UsageMap = BTreeMap<String, UsageRecord>;

/// Accumulated active seconds for one rule on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(deserialize_with = "deserialize_day")]
    pub date: NaiveDate,
    /// Older stores wrote this field as `time`.
    #[serde(alias = "time")]
    pub seconds: u64,
}

/// Day format written by older stores, e.g. `Thu Oct 15 2026`.
const LEGACY_DAY_FORMAT: &str = "%a %b %d %Y";

/// Accepts ISO dates and the legacy day format.
fn deserialize_day<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse::<NaiveDate>()
        .or_else(|_| NaiveDate::parse_from_str(raw.trim(), LEGACY_DAY_FORMAT))
        .map_err(|_| serde::de::Error::custom(format!("unrecognized usage date '{raw}'")))
}

impl UsageRecord {
    pub fn new(date: NaiveDate, seconds: u64) -> Self {
        Self { date, seconds }
    }

    /// Adds `seconds` for `today`, discarding the count if the record is stale.
    pub fn accumulate(&mut self, today: NaiveDate, seconds: u64) {
        if self.date != today {
            self.date = today;
            self.seconds = 0;
        }
        self.seconds = self.seconds.saturating_add(seconds);
    }
}

/// Seconds that count toward `today`'s budget.
pub fn fresh_for(record: Option<&UsageRecord>, today: NaiveDate) -> u64 {
    match record {
        Some(r) if r.date == today => r.seconds,
        _ => 0,
    }
}

/// Adds `seconds` to the record for `site_key`, creating it when absent.
/// Returns the fresh total after the addition.
pub fn add_usage(usage: &mut UsageMap, site_key: &str, today: NaiveDate, seconds: u64) -> u64 {
    let record = usage
        .entry(site_key.to_string())
        .or_insert_with(|| UsageRecord::new(today, 0));
    record.accumulate(today, seconds);
    record.seconds
}

/// The calendar day of `now` in the process-local timezone.
pub fn local_day<Tz: TimeZone>(now: &DateTime<Tz>) -> NaiveDate {
    now.with_timezone(&Local).date_naive()
}
