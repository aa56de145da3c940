use crate::normalize::row_date;
use crate::schema::Row;
use crate::utils::{days_to_ms, local_midnight, midnight_in};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, TimeDelta, Utc};

/// `2025-10-01T00:00:00Z`, the start of the reporting history.
pub const DEFAULT_RETENTION_CUTOFF_SECS: i64 = 1_759_276_800;

pub fn default_retention_cutoff() -> DateTime<Utc> {
    DateTime::from_timestamp(DEFAULT_RETENTION_CUTOFF_SECS, 0).expect("cutoff is a valid instant")
}

/// Reference point for trailing windows: local midnight of the current day.
///
/// Pinned once per aggregation so repeated calls on the same day share
/// identical window boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KpiClock {
    anchor: DateTime<Utc>,
    offset: FixedOffset,
}

impl KpiClock {
    pub fn now() -> Self {
        let now = Local::now();
        let offset = now.offset().fix();
        Self::pinned_to(now.with_timezone(&offset))
    }

    pub fn pinned_to(now: DateTime<FixedOffset>) -> Self {
        Self {
            anchor: local_midnight(now),
            offset: *now.offset(),
        }
    }

    pub fn at_midnight(date: NaiveDate, offset: FixedOffset) -> Self {
        Self {
            anchor: midnight_in(date, &offset),
            offset,
        }
    }

    pub fn anchor(&self) -> DateTime<Utc> {
        self.anchor
    }

    /// Offset used to read dates that carry no explicit zone.
    pub fn offset(&self) -> &FixedOffset {
        &self.offset
    }

    pub fn window_start(&self, days: u32) -> DateTime<Utc> {
        self.anchor - TimeDelta::milliseconds(days_to_ms(days))
    }

    pub fn contains(&self, date: DateTime<Utc>, days: u32) -> bool {
        date >= self.window_start(days) && date <= self.anchor
    }
}

/// Undated rows are kept so they are not silently dropped from the working set.
pub fn within_retention(row: &Row, cutoff: DateTime<Utc>, offset: &FixedOffset) -> bool {
    date_within_retention(row_date(row, offset), cutoff)
}

pub fn date_within_retention(date: Option<DateTime<Utc>>, cutoff: DateTime<Utc>) -> bool {
    date.map_or(true, |d| d >= cutoff)
}

/// Undated rows never fall inside a trailing window.
pub fn within_window(row: &Row, days: u32, clock: &KpiClock) -> bool {
    date_within_window(row_date(row, clock.offset()), days, clock)
}

pub fn date_within_window(date: Option<DateTime<Utc>>, days: u32, clock: &KpiClock) -> bool {
    date.is_some_and(|d| clock.contains(d, days))
}
