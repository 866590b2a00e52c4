//! Game-day arithmetic. The game day rolls over at a fixed UTC hour, not at midnight.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyReset {
    hour_utc: u32,
}

impl DailyReset {
    pub fn new(hour_utc: u32) -> Result<Self, DomainError> {
        if hour_utc > 23 {
            return Err(DomainError::validation(format!(
                "daily reset hour must be 0-23, got {}",
                hour_utc
            )));
        }
        Ok(Self { hour_utc })
    }

    pub fn hour_utc(&self) -> u32 {
        self.hour_utc
    }

    /// Most recent reset at or before `now`.
    pub fn last_reset(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let reset_today = Utc.from_utc_datetime(
            &today
                .and_hms_opt(self.hour_utc, 0, 0)
                .unwrap_or_else(|| today.and_time(chrono::NaiveTime::MIN)),
        );
        if now >= reset_today {
            reset_today
        } else {
            reset_today - Duration::days(1)
        }
    }

    /// The game day `now` belongs to, named by the calendar date of its reset.
    pub fn game_day(&self, now: DateTime<Utc>) -> NaiveDate {
        self.last_reset(now).date_naive()
    }

    /// `[start, end)` window of the game day containing `now`.
    pub fn day_window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.last_reset(now);
        (start, start + Duration::days(1))
    }
}

impl Default for DailyReset {
    fn default() -> Self {
        Self { hour_utc: 6 }
    }
}
