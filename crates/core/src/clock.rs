use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Timelike, Utc};

/// Truncates a timestamp to whole-minute precision.
pub fn minute_floor(t: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let excess = Duration::seconds(i64::from(t.second()))
        + Duration::nanoseconds(i64::from(t.nanosecond()));
    t - excess
}

/// Pins a wall-clock time onto the calendar date of `reference`, keeping the
/// reference offset.
pub fn at_time_of_day(reference: DateTime<FixedOffset>, time: NaiveTime) -> DateTime<FixedOffset> {
    let midnight = reference - reference.time().signed_duration_since(NaiveTime::MIN);
    midnight + time.signed_duration_since(NaiveTime::MIN)
}

/// Wall clock pinned to the configured utc offset. Everything the registry
/// and coordinator see flows through this, so the whole process agrees on a
/// single timezone.
#[derive(Clone, Copy, Debug)]
pub struct SessionClock {
    offset: FixedOffset,
}

impl SessionClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Current time in the configured zone, floored to the minute.
    pub fn now(&self) -> DateTime<FixedOffset> {
        minute_floor(Utc::now().with_timezone(&self.offset))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveTime, Timelike, TimeZone};

    use super::{at_time_of_day, minute_floor, SessionClock};

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).expect("offset")
    }

    #[test]
    fn minute_floor_strips_seconds() {
        let t = tz().with_ymd_and_hms(2026, 3, 14, 20, 31, 47).single().expect("timestamp");
        assert_eq!(minute_floor(t).to_rfc3339(), "2026-03-14T20:31:00+02:00");
    }

    #[test]
    fn minute_floor_is_idempotent() {
        let t = tz().with_ymd_and_hms(2026, 3, 14, 20, 31, 47).single().expect("timestamp");
        assert_eq!(minute_floor(minute_floor(t)), minute_floor(t));
    }

    #[test]
    fn time_of_day_lands_on_reference_date() {
        let reference = tz().with_ymd_and_hms(2026, 3, 14, 23, 59, 12).single().expect("timestamp");
        let pinned = at_time_of_day(reference, NaiveTime::from_hms_opt(7, 30, 0).expect("time"));
        assert_eq!(pinned.to_rfc3339(), "2026-03-14T07:30:00+02:00");
    }

    #[test]
    fn time_of_day_keeps_the_offset() {
        let reference = FixedOffset::west_opt(5 * 3600)
            .expect("offset")
            .with_ymd_and_hms(2026, 1, 1, 0, 10, 0)
            .single()
            .expect("timestamp");
        let pinned = at_time_of_day(reference, NaiveTime::from_hms_opt(22, 0, 0).expect("time"));
        assert_eq!(pinned.to_rfc3339(), "2026-01-01T22:00:00-05:00");
    }

    #[test]
    fn clock_now_is_minute_aligned() {
        let now = SessionClock::new(tz()).now();
        assert_eq!(now.second(), 0);
        assert_eq!(now.nanosecond(), 0);
    }
}
