//! Free-text availability expressions, the way people actually type them:
//! `"6-12"`, `"from 7 pm to 9 pm"`, `"in 5 minutes for 1 hour"`, `"until 10"`.
//!
//! Bare hours below 12 are read as evening ("6" means 18:00). An explicit
//! am/pm marker locks the meridiem and disables that shift.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Timelike};
use thiserror::Error;

use crate::clock::at_time_of_day;
use crate::domain::TimeWindow;

const HOUR_SUFFIXES: [&str; 5] = ["hours", "hour", "hrs", "hr", "h"];
const MINUTE_SUFFIXES: [&str; 4] = ["minutes", "minute", "min", "m"];
const MERIDIEM_SUFFIXES: [&str; 2] = ["am", "pm"];

/// A parsed availability window plus whether the end-time's meridiem was
/// stated explicitly. The flag tells "until 1" apart from "until 1am" when
/// a window has to roll past midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseOutcome {
    pub window: TimeWindow,
    pub am_pm_locked: bool,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("'{0}' can't be both am and pm")]
    AmbiguousMeridiem(String),

    #[error("couldn't make a number out of '{0}'")]
    BadNumber(String),

    #[error("hour {0} is out of range")]
    HourOutOfRange(u32),

    #[error("minute {0} is out of range")]
    MinuteOutOfRange(u32),

    #[error("don't give me seconds ('{0}')")]
    SecondsGiven(String),

    #[error("can't understand '{previous}' followed by '{current}'")]
    ConfusingSequence { previous: String, current: String },

    #[error("{field} was already given before '{token}'")]
    DuplicateField { field: &'static str, token: String },

    #[error("no idea what '{0}' means")]
    UnrecognizedWord(String),

    #[error("one dash between two times, like 7-10")]
    MalformedRange,

    #[error("that window would end before it starts")]
    EndBeforeStart,

    #[error("couldn't make sense of that combination of times")]
    Uninterpretable,

    #[error("got nothing out of that")]
    Empty,
}

/// Parses a whole availability expression against `now`. An empty expression
/// (or one that is nothing but "now") means available immediately for the
/// default stretch.
pub fn parse_expression(
    text: &str,
    now: DateTime<FixedOffset>,
    default_duration: Duration,
) -> Result<ParseOutcome, ParseError> {
    let cleaned = strip_filler(text);
    if cleaned.is_empty() {
        let window =
            TimeWindow::new(now, default_duration).map_err(|_| ParseError::EndBeforeStart)?;
        return Ok(ParseOutcome { window, am_pm_locked: false });
    }

    if cleaned.contains('-') {
        let (start, span, locked) = parse_dash_range(&cleaned, now)?;
        let window = TimeWindow::new(start, span).map_err(|_| ParseError::EndBeforeStart)?;
        return Ok(ParseOutcome { window, am_pm_locked: locked });
    }

    let fields = scan_tokens(&lex(&cleaned))?;
    let (begin, span, locked) = resolve(fields, now, default_duration)?;
    let window = TimeWindow::new(begin, span).map_err(|_| ParseError::EndBeforeStart)?;
    Ok(ParseOutcome { window, am_pm_locked: locked })
}

/// Lowercases, collapses whitespace, and drops the filler word "now".
fn strip_filler(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .filter(|word| *word != "now")
        .collect::<Vec<_>>()
        .join(" ")
}

/// Re-joins a clock-like word with a trailing unit or meridiem word, so
/// "5:30 pm" and "10 minutes" read as single tokens.
fn lex(cleaned: &str) -> Vec<String> {
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    let mut tokens = Vec::with_capacity(words.len());
    let mut index = 0;
    while index < words.len() {
        let word = words[index];
        if is_clock_like(word) && index + 1 < words.len() && is_unit_suffix(words[index + 1]) {
            tokens.push(format!("{word}{}", words[index + 1]));
            index += 2;
            continue;
        }
        tokens.push(word.to_owned());
        index += 1;
    }
    tokens
}

fn is_clock_like(word: &str) -> bool {
    !word.is_empty() && word.bytes().all(|b| b.is_ascii_digit() || b == b':')
}

fn is_unit_suffix(word: &str) -> bool {
    HOUR_SUFFIXES.contains(&word)
        || MINUTE_SUFFIXES.contains(&word)
        || MERIDIEM_SUFFIXES.contains(&word)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

/// A time-of-day token. `locked` records whether the meridiem was explicit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ClockTime {
    time: NaiveTime,
    locked: bool,
}

fn clock_time(token: &str) -> Result<ClockTime, ParseError> {
    let has_am = token.contains("am");
    let has_pm = token.contains("pm");
    if has_am && has_pm {
        return Err(ParseError::AmbiguousMeridiem(token.to_owned()));
    }

    let trimmed = token.trim();
    let bare = trimmed
        .strip_suffix("pm")
        .or_else(|| trimmed.strip_suffix("am"))
        .unwrap_or(trimmed)
        .trim();
    if bare.is_empty() {
        return Err(ParseError::BadNumber(token.to_owned()));
    }

    let parts: Vec<u32> = bare
        .split(':')
        .map(|part| numeric_component(part.trim()))
        .collect::<Result<_, _>>()?;
    if parts.len() > 2 {
        return Err(ParseError::SecondsGiven(token.to_owned()));
    }
    let hour = parts[0];
    let minute = parts.get(1).copied().unwrap_or(0);
    if minute > 59 {
        return Err(ParseError::MinuteOutOfRange(minute));
    }

    let meridiem = if has_am {
        Some(Meridiem::Am)
    } else if has_pm {
        Some(Meridiem::Pm)
    } else {
        None
    };

    let (hour, locked) = match meridiem {
        None => {
            if hour > 23 {
                return Err(ParseError::HourOutOfRange(hour));
            }
            // evening assumption: bare hours below 12 mean pm
            let hour = if hour < 12 { hour + 12 } else { hour };
            (hour, false)
        }
        Some(meridiem) => {
            if !(1..=12).contains(&hour) {
                return Err(ParseError::HourOutOfRange(hour));
            }
            let hour = match (meridiem, hour) {
                (Meridiem::Am, 12) => 0,
                (Meridiem::Am, hour) => hour,
                (Meridiem::Pm, 12) => 12,
                (Meridiem::Pm, hour) => hour + 12,
            };
            (hour, true)
        }
    };

    let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or(ParseError::HourOutOfRange(hour))?;
    Ok(ClockTime { time, locked })
}

fn numeric_component(part: &str) -> Result<u32, ParseError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::BadNumber(part.to_owned()));
    }
    part.parse::<u32>().map_err(|_| ParseError::BadNumber(part.to_owned()))
}

/// A span token: a bare count is minutes, a unit suffix picks the scale.
/// `None` means the token is not a duration at all.
fn duration_token(token: &str) -> Option<Duration> {
    let trimmed = token.trim();
    if let Some(count) = counted(trimmed) {
        return Duration::try_minutes(count);
    }
    for suffix in HOUR_SUFFIXES {
        if let Some(bare) = trimmed.strip_suffix(suffix) {
            return counted(bare.trim()).and_then(Duration::try_hours);
        }
    }
    for suffix in MINUTE_SUFFIXES {
        if let Some(bare) = trimmed.strip_suffix(suffix) {
            return counted(bare.trim()).and_then(Duration::try_minutes);
        }
    }
    None
}

fn counted(bare: &str) -> Option<i64> {
    if bare.is_empty() || !bare.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    bare.parse::<i64>().ok()
}

/// `7-10` style ranges. Both sides must be times of day; explicit
/// early-morning ends roll to tomorrow, and an end that lands at or before
/// the start gets one 12-hour nudge if its meridiem was left open.
fn parse_dash_range(
    cleaned: &str,
    now: DateTime<FixedOffset>,
) -> Result<(DateTime<FixedOffset>, Duration, bool), ParseError> {
    let parts: Vec<&str> = cleaned.split('-').collect();
    let [first, second] = parts.as_slice() else {
        return Err(ParseError::MalformedRange);
    };
    let first = clock_time(first.trim())?;
    let second = clock_time(second.trim())?;

    let mut start = at_time_of_day(now, first.time);
    let mut end = at_time_of_day(now, second.time);
    if first.time < second.time && is_early_morning(second.time) {
        start += Duration::days(1);
    }
    if is_early_morning(second.time) {
        end += Duration::days(1);
    }
    if end <= start && !second.locked && shifts_to_early_morning(second.time) {
        end += Duration::hours(12);
    }
    if end <= start {
        return Err(ParseError::EndBeforeStart);
    }
    Ok((start, end - start, second.locked))
}

fn is_early_morning(time: NaiveTime) -> bool {
    time.hour() < 6
}

// +12h would land in the small hours of the next day
fn shifts_to_early_morning(time: NaiveTime) -> bool {
    (12..18).contains(&time.hour())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Indicator {
    StartTime,
    EndTime,
    Span,
    Delay,
}

impl Indicator {
    fn from_word(word: &str) -> Option<Self> {
        match word {
            "from" | "at" => Some(Self::StartTime),
            "until" | "til" | "till" | "to" => Some(Self::EndTime),
            "for" => Some(Self::Span),
            "in" => Some(Self::Delay),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct ScannedFields {
    start: Option<ClockTime>,
    end: Option<ClockTime>,
    span: Option<Duration>,
    delay: Option<Duration>,
    bare_time: Option<ClockTime>,
    bare_span: Option<Duration>,
}

/// One pass over the tokens. An indicator word arms the next value; a value
/// with no armed indicator is remembered as a bare candidate. A trailing
/// indicator with no value is ignored. An armed `for`/`in` claims an
/// ambiguous bare number as a span, so "in 5" means five minutes, not five
/// o'clock.
fn scan_tokens(tokens: &[String]) -> Result<ScannedFields, ParseError> {
    let mut fields = ScannedFields::default();
    let mut pending: Option<Indicator> = None;
    let mut last_word: Option<String> = None;

    for token in tokens {
        if let Some(indicator) = Indicator::from_word(token) {
            if pending.is_some() {
                return Err(ParseError::ConfusingSequence {
                    previous: last_word.clone().unwrap_or_default(),
                    current: token.clone(),
                });
            }
            pending = Some(indicator);
            last_word = Some(token.clone());
            continue;
        }

        if matches!(pending, Some(Indicator::Span | Indicator::Delay)) {
            let Some(span) = duration_token(token) else {
                if clock_time(token).is_ok() {
                    return Err(ParseError::ConfusingSequence {
                        previous: last_word.clone().unwrap_or_default(),
                        current: token.clone(),
                    });
                }
                return Err(ParseError::UnrecognizedWord(token.clone()));
            };
            match pending.take() {
                Some(Indicator::Span) => {
                    if fields.span.is_some() {
                        return Err(ParseError::DuplicateField {
                            field: "a duration",
                            token: token.clone(),
                        });
                    }
                    fields.span = Some(span);
                }
                _ => {
                    if fields.delay.is_some() {
                        return Err(ParseError::DuplicateField {
                            field: "a delay",
                            token: token.clone(),
                        });
                    }
                    fields.delay = Some(span);
                }
            }
            last_word = Some(token.clone());
            continue;
        }

        if let Ok(time) = clock_time(token) {
            match pending.take() {
                Some(Indicator::StartTime) => {
                    if fields.start.is_some() {
                        return Err(ParseError::DuplicateField {
                            field: "a start time",
                            token: token.clone(),
                        });
                    }
                    fields.start = Some(time);
                }
                Some(Indicator::EndTime) => {
                    if fields.end.is_some() {
                        return Err(ParseError::DuplicateField {
                            field: "an end time",
                            token: token.clone(),
                        });
                    }
                    fields.end = Some(time);
                }
                // for/in armed tokens never reach here
                Some(_) => {
                    return Err(ParseError::ConfusingSequence {
                        previous: last_word.clone().unwrap_or_default(),
                        current: token.clone(),
                    });
                }
                None => fields.bare_time = Some(time),
            }
            last_word = Some(token.clone());
            continue;
        }

        if let Some(span) = duration_token(token) {
            match pending.take() {
                Some(_) => {
                    return Err(ParseError::ConfusingSequence {
                        previous: last_word.clone().unwrap_or_default(),
                        current: token.clone(),
                    });
                }
                None => fields.bare_span = Some(span),
            }
            last_word = Some(token.clone());
            continue;
        }

        return Err(ParseError::UnrecognizedWord(token.clone()));
    }

    Ok(fields)
}

/// Turns scanned fields into a concrete start and span. A bare time stands
/// in for a missing start, a bare span for a missing delay ("5min" means
/// available in five minutes).
fn resolve(
    mut fields: ScannedFields,
    now: DateTime<FixedOffset>,
    default_duration: Duration,
) -> Result<(DateTime<FixedOffset>, Duration, bool), ParseError> {
    if fields.start.is_none() {
        fields.start = fields.bare_time.take();
    }
    if fields.delay.is_none() {
        fields.delay = fields.bare_span.take();
    }

    let start = fields.start.map(|t| at_time_of_day(now, t.time));
    let end = fields.end.map(|t| at_time_of_day(now, t.time));
    let locked = fields.end.map(|t| t.locked).unwrap_or(false);

    let (begin, span) = match (start, end, fields.span, fields.delay) {
        (None, None, None, None) => return Err(ParseError::Empty),
        (Some(s), None, None, None) => (s, default_duration),
        (None, Some(e), None, None) => (now, e - now),
        (None, None, Some(d), None) => (now, d),
        (Some(s), None, Some(d), None) => (s, d),
        (Some(s), Some(e), None, None) => (s, e - s),
        (None, None, None, Some(w)) => (now + w, default_duration),
        (None, None, Some(d), Some(w)) => (now + w, d),
        (None, Some(e), None, Some(w)) => (now + w, e - (now + w)),
        _ => return Err(ParseError::Uninterpretable),
    };

    let span = if fields.end.is_some() {
        correct_rollover(span, locked)?
    } else if span <= Duration::zero() {
        return Err(ParseError::EndBeforeStart);
    } else {
        span
    };

    Ok((begin, span, locked))
}

/// An end that computes to at-or-before the start usually means the next
/// half-day or day. Up to two corrective passes; an explicit meridiem only
/// ever rolls by whole days.
fn correct_rollover(mut span: Duration, locked: bool) -> Result<Duration, ParseError> {
    let step = if locked { Duration::hours(24) } else { Duration::hours(12) };
    for _ in 0..2 {
        if span > Duration::zero() {
            return Ok(span);
        }
        span = span + step;
    }
    if span > Duration::zero() {
        Ok(span)
    } else {
        Err(ParseError::EndBeforeStart)
    }
}
