//! Core scheduling vocabulary: who is available, when, and at what standing.

use std::fmt;

use chrono::{DateTime, Duration, FixedOffset};

use crate::clock::minute_floor;
use crate::errors::DomainError;

/// Stable identity of a group member, as the chat surface knows them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParticipantId(pub String);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Standing within the session: selected entries count toward quorum,
/// backups wait for a vacancy or a vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Selected,
    Backup,
}

/// A stretch of availability, minute-aligned at the start and always
/// strictly longer than zero. Windows order by start, then by length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeWindow {
    start: DateTime<FixedOffset>,
    duration: Duration,
}

impl TimeWindow {
    pub fn new(start: DateTime<FixedOffset>, duration: Duration) -> Result<Self, DomainError> {
        if duration <= Duration::zero() {
            return Err(DomainError::DegenerateWindow { duration });
        }
        Ok(Self { start: minute_floor(start), duration })
    }

    pub fn start(&self) -> DateTime<FixedOffset> {
        self.start
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn end(&self) -> DateTime<FixedOffset> {
        self.start + self.duration
    }

    /// Both ends inclusive, so a window is still "current" at the instant
    /// it expires.
    pub fn contains(&self, t: DateTime<FixedOffset>) -> bool {
        self.start <= t && t <= self.end()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "available from {} to {}",
            self.start.format("%m/%d %H:%M"),
            self.end().format("%m/%d %H:%M")
        )
    }
}

/// One row of the availability book.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParticipantEntry {
    pub participant: ParticipantId,
    pub window: TimeWindow,
    pub tier: Tier,
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};

    use super::*;

    fn at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .expect("offset")
            .with_ymd_and_hms(2026, 6, 5, hour, minute, 0)
            .single()
            .expect("timestamp")
    }

    #[test]
    fn window_floors_its_start() {
        let ragged = at(17, 0) + Duration::seconds(42);
        let window = TimeWindow::new(ragged, Duration::hours(2)).expect("window");
        assert_eq!(window.start(), at(17, 0));
        assert_eq!(window.end(), at(19, 0));
    }

    #[test]
    fn window_rejects_zero_and_negative_spans() {
        assert!(matches!(
            TimeWindow::new(at(17, 0), Duration::zero()),
            Err(DomainError::DegenerateWindow { .. })
        ));
        assert!(matches!(
            TimeWindow::new(at(17, 0), Duration::minutes(-5)),
            Err(DomainError::DegenerateWindow { .. })
        ));
    }

    #[test]
    fn window_contains_both_endpoints() {
        let window = TimeWindow::new(at(17, 0), Duration::hours(2)).expect("window");
        assert!(window.contains(at(17, 0)));
        assert!(window.contains(at(18, 30)));
        assert!(window.contains(at(19, 0)));
        assert!(!window.contains(at(16, 59)));
        assert!(!window.contains(at(19, 1)));
    }

    #[test]
    fn window_renders_month_day_and_clock() {
        let window = TimeWindow::new(at(17, 0), Duration::hours(5)).expect("window");
        assert_eq!(window.to_string(), "available from 06/05 17:00 to 06/05 22:00");
    }

    #[test]
    fn participant_renders_as_plain_handle() {
        assert_eq!(ParticipantId::from("@kai").to_string(), "@kai");
    }
}
