use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Utc};
use dots_screentime_common::{time, UsageSession};

/// The user's local time zone.
///
/// Day boundaries, hour buckets and curfews follow the system zone in
/// production. Tests pin a fixed offset so results do not depend on the
/// machine running them.
#[derive(Debug, Clone, Copy, Default)]
pub enum LocalZone {
    #[default]
    System,
    Fixed(FixedOffset),
}

impl LocalZone {
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            LocalZone::System => time::local_date(instant, &Local),
            LocalZone::Fixed(offset) => time::local_date(instant, offset),
        }
    }

    pub fn local_datetime(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            LocalZone::System => instant.with_timezone(&Local).naive_local(),
            LocalZone::Fixed(offset) => instant.with_timezone(offset).naive_local(),
        }
    }

    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            LocalZone::System => time::day_bounds(date, &Local),
            LocalZone::Fixed(offset) => time::day_bounds(date, offset),
        }
    }

    /// Cut a closed session at every local midnight it crosses.
    pub fn split_session(&self, session: &UsageSession) -> Vec<UsageSession> {
        match self {
            LocalZone::System => session.split_at_midnight(&Local),
            LocalZone::Fixed(offset) => session.split_at_midnight(offset),
        }
    }

    pub fn distribute_hourly(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        date: NaiveDate,
        buckets: &mut [i64; 24],
    ) {
        match self {
            LocalZone::System => time::distribute_hourly(start, end, date, &Local, buckets),
            LocalZone::Fixed(offset) => time::distribute_hourly(start, end, date, offset, buckets),
        }
    }

    /// Seconds of `[start, end)` that fall on the local `date`.
    pub fn seconds_on(&self, start: DateTime<Utc>, end: DateTime<Utc>, date: NaiveDate) -> i64 {
        let (day_start, day_end) = self.day_bounds(date);
        let start = start.max(day_start);
        let end = end.min(day_end);
        if end > start {
            (end - start).num_seconds()
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_seconds_on_clamps_to_day() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let zone = LocalZone::Fixed(offset);
        let start = offset.with_ymd_and_hms(2024, 5, 1, 23, 50, 0).unwrap().with_timezone(&Utc);
        let end = offset.with_ymd_and_hms(2024, 5, 2, 0, 20, 0).unwrap().with_timezone(&Utc);

        let first = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let second = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();

        assert_eq!(zone.seconds_on(start, end, first), 600);
        assert_eq!(zone.seconds_on(start, end, second), 1200);
        assert_eq!(zone.local_date(end), second);
    }
}
