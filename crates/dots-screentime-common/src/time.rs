// Local-time helpers
//
// Day boundaries, hour buckets and curfew windows are all evaluated in the
// user's local time zone. Every helper is generic over `TimeZone` so the
// engine can pass `Local` and tests can pin a fixed offset.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};

use crate::error::{Error, Result};

/// Range of calendar years usage queries accept.
pub const SUPPORTED_YEARS: std::ops::RangeInclusive<i32> = 1970..=9999;

/// A time-of-day window during which an app is always over its limit.
///
/// Both ends are inclusive. A window whose start is after its end wraps
/// past midnight, so `22:00-07:00` covers late evening and early morning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurfewWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl CurfewWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self::new(parse_time_of_day(start)?, parse_time_of_day(end)?))
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            time >= self.start && time <= self.end
        } else {
            time >= self.start || time <= self.end
        }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }
}

/// Parse a time of day in `HH:MM` or `HH:MM:SS` form.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|e| Error::InvalidTime(format!("'{}': {}", value, e)))
}

pub fn format_time_of_day(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

/// Reject dates too far from the present for day arithmetic to be safe.
pub fn ensure_supported_date(date: NaiveDate) -> Result<NaiveDate> {
    if SUPPORTED_YEARS.contains(&date.year()) {
        Ok(date)
    } else {
        Err(Error::InvalidValue(format!(
            "date {} is outside {}..={}",
            date,
            SUPPORTED_YEARS.start(),
            SUPPORTED_YEARS.end()
        )))
    }
}

/// Calendar date of an instant in the given zone.
pub fn local_date<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// First instant of `date` in the given zone.
pub fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    if let Some(start) = tz.from_local_datetime(&naive).earliest() {
        return start.with_timezone(&Utc);
    }

    // Midnight falls in a DST gap; the day starts at the first valid hour.
    naive
        .checked_add_signed(Duration::hours(1))
        .and_then(|later| tz.from_local_datetime(&later).earliest())
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Half-open UTC range `[start, end)` covering the local `date`.
pub fn day_bounds<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_midnight(date, tz);
    let end = match date.succ_opt() {
        Some(next) => local_midnight(next, tz),
        None => start.checked_add_signed(Duration::days(1)).unwrap_or(start),
    };
    (start, end)
}

/// Cut `[start, end]` at every local midnight it crosses.
///
/// The returned intervals are contiguous and cover exactly the input range.
/// An interval that does not cross midnight comes back unchanged.
pub fn split_at_local_midnight<Tz: TimeZone>(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    tz: &Tz,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut parts = Vec::new();
    let mut cursor = start;

    while cursor < end {
        let Some(next_date) = local_date(cursor, tz).succ_opt() else {
            break;
        };
        let boundary = local_midnight(next_date, tz);
        if boundary >= end {
            break;
        }
        parts.push((cursor, boundary));
        cursor = boundary;
    }

    parts.push((cursor, end.max(cursor)));
    parts
}

/// Add the part of `[start, end)` that falls on `date` into hour buckets.
///
/// An interval spanning an hour boundary contributes to every hour it
/// touches, in proportion to the seconds spent in each.
pub fn distribute_hourly<Tz: TimeZone>(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    date: NaiveDate,
    tz: &Tz,
    buckets: &mut [i64; 24],
) {
    let (day_start, day_end) = day_bounds(date, tz);
    let mut cursor = start.max(day_start);
    let end = end.min(day_end);

    while cursor < end {
        let local = cursor.with_timezone(tz);
        let into_hour = Duration::seconds(i64::from(local.minute() * 60 + local.second()))
            + Duration::nanoseconds(i64::from(local.nanosecond()));
        let next_hour = (cursor - into_hour + Duration::hours(1)).min(end);

        let hour = local.hour() as usize;
        buckets[hour] += (next_hour - cursor).num_seconds();
        cursor = next_hour;
    }
}
