//! Travel timestamps.
//!
//! Ticket sources disagree on whether times carry an offset: schedule
//! offsets anchored to a travel date are naive, while model output is
//! usually ISO 8601 with an offset. A naive time is taken to be in the
//! local system timezone when it needs to become an instant.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone};

/// Error returned when parsing an invalid timestamp.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timestamp {input:?}: {reason}")]
pub struct TimeError {
    input: String,
    reason: &'static str,
}

impl TimeError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// A departure or arrival time, with or without a UTC offset.
///
/// # Examples
///
/// ```
/// use ticket_sync::domain::TravelTime;
///
/// let aware = TravelTime::parse("2025-12-19T10:00:00+05:30").unwrap();
/// assert!(aware.is_zoned());
///
/// let naive = TravelTime::parse("2025-12-19T10:00").unwrap();
/// assert!(!naive.is_zoned());
///
/// assert!(TravelTime::parse("tomorrow").is_err());
/// ```
#[derive(Clone, Copy)]
pub enum TravelTime {
    /// Wall-clock time in the traveller's (local) timezone.
    Naive(NaiveDateTime),
    /// A fixed instant.
    Zoned(DateTime<FixedOffset>),
}

impl TravelTime {
    /// Midnight of `date` plus `days` days and `minutes` minutes.
    ///
    /// This is how schedule offsets (relative to a line's start) become
    /// wall-clock times once the travel date is known.
    pub fn from_offset(date: NaiveDate, days: i64, minutes: i64) -> Option<Self> {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        let dt = midnight
            .checked_add_signed(Duration::days(days))?
            .checked_add_signed(Duration::minutes(minutes))?;
        Some(TravelTime::Naive(dt))
    }

    /// Parse an RFC 3339 / ISO 8601 timestamp, with or without offset.
    ///
    /// Seconds are optional; a trailing `Z` is accepted.
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(TravelTime::Zoned(dt));
        }
        for format in ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M%:z"] {
            if let Ok(dt) = DateTime::parse_from_str(s, format) {
                return Ok(TravelTime::Zoned(dt));
            }
        }
        for format in [
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
        ] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(TravelTime::Naive(dt));
            }
        }
        Err(TimeError::new(s, "expected ISO 8601 date and time"))
    }

    /// Whether the time carries an explicit offset.
    pub fn is_zoned(&self) -> bool {
        matches!(self, TravelTime::Zoned(_))
    }

    /// Resolve to an instant, treating naive times as local time.
    pub fn to_instant(&self) -> DateTime<FixedOffset> {
        self.in_timezone(&Local)
    }

    /// Resolve to an instant, treating naive times as times in `tz`.
    ///
    /// Times that fall in a DST gap are shifted forward by the gap; ambiguous
    /// times take the earlier instant.
    pub fn in_timezone<Tz: TimeZone>(&self, tz: &Tz) -> DateTime<FixedOffset> {
        match self {
            TravelTime::Zoned(dt) => *dt,
            TravelTime::Naive(naive) => {
                let local = tz
                    .from_local_datetime(naive)
                    .earliest()
                    .or_else(|| {
                        tz.from_local_datetime(&(*naive + Duration::hours(1)))
                            .earliest()
                    })
                    .unwrap_or_else(|| tz.from_utc_datetime(naive));
                local.fixed_offset()
            }
        }
    }

    /// Wall-clock date and time as written, ignoring any offset.
    pub fn wall_clock(&self) -> NaiveDateTime {
        match self {
            TravelTime::Naive(naive) => *naive,
            TravelTime::Zoned(dt) => dt.naive_local(),
        }
    }
}

// Equality, hashing and ordering all go by instant, so a naive time equals
// the zoned time it resolves to.
impl PartialEq for TravelTime {
    fn eq(&self, other: &Self) -> bool {
        self.to_instant() == other.to_instant()
    }
}

impl Eq for TravelTime {}

impl Hash for TravelTime {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_instant().hash(state);
    }
}

impl Ord for TravelTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_instant().cmp(&other.to_instant())
    }
}

impl PartialOrd for TravelTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for TravelTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TravelTime::Naive(naive) => write!(f, "TravelTime({naive})"),
            TravelTime::Zoned(dt) => write!(f, "TravelTime({})", dt.to_rfc3339()),
        }
    }
}

impl fmt::Display for TravelTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wall_clock().format("%Y-%m-%d %H:%M"))
    }
}
