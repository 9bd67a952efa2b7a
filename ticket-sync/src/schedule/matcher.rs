//! Locating the boarding and alighting stops in ticket text.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use crate::domain::{TravelPoint, TravelTime};

use super::error::MatchError;
use super::types::Stop;

/// The part of a structured ticket that lists the booked stations.
static BOOKED_REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?si)Booked From\s+To\s+(.*?)Start Date").expect("valid booked region regex")
});

/// Resolve the traveller's boarding and alighting points.
///
/// Stops are scanned in route order. The first stop whose code appears in
/// the ticket as a whole token is the boarding stop; the next one found is
/// the alighting stop. Each search resumes after the previous match, so a
/// code printed once cannot be both ends. When the ticket has a booked
/// stations region, only that region is searched.
///
/// Departure is `travel_date` plus the boarding stop's departure minute.
/// Arrival is `travel_date` plus the difference in day offsets plus the
/// alighting stop's arrival minute.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use ticket_sync::schedule::{Stop, match_stations};
///
/// let stops = vec![
///     Stop::new("NDLS", "New Delhi", 0, 580),
///     Stop::new("NZM", "Hazrat Nizamuddin", 0, 600),
///     Stop::new("JAT", "Jammu Tawi", 1, 125),
/// ];
/// let date = NaiveDate::from_ymd_opt(2025, 12, 19).unwrap();
///
/// let (dep, arr) = match_stations(&stops, "From NZM To JAT", date).unwrap();
/// assert_eq!(dep.place, "Hazrat Nizamuddin");
/// assert_eq!(arr.when.to_string(), "2025-12-20 02:05");
/// ```
pub fn match_stations(
    stops: &[Stop],
    text: &str,
    travel_date: NaiveDate,
) -> Result<(TravelPoint, TravelPoint), MatchError> {
    let region = BOOKED_REGION
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(text, |m| m.as_str());

    let mut cursor = 0;
    let mut boarding: Option<&Stop> = None;
    let mut alighting: Option<&Stop> = None;

    for stop in stops {
        let Some(end) = find_code(region, &stop.code, cursor) else {
            continue;
        };
        cursor = end;
        if boarding.is_none() {
            boarding = Some(stop);
        } else {
            alighting = Some(stop);
            break;
        }
    }

    let (Some(boarding), Some(alighting)) = (boarding, alighting) else {
        return Err(MatchError::MissingStation {
            found: boarding.map(|s| s.code.clone()).into_iter().collect(),
        });
    };
    debug!(boarding = %boarding.code, alighting = %alighting.code, "matched stations");

    let departure = TravelTime::from_offset(travel_date, 0, i64::from(boarding.scheduled_minutes))
        .ok_or_else(|| MatchError::OutOfRange {
            code: boarding.code.clone(),
        })?;
    let days = i64::from(alighting.day_offset) - i64::from(boarding.day_offset);
    let minutes = i64::from(alighting.alighting_minutes());
    let arrival = TravelTime::from_offset(travel_date, days, minutes)
        .ok_or_else(|| MatchError::OutOfRange {
            code: alighting.code.clone(),
        })?;

    Ok((
        TravelPoint::new(&boarding.name, departure),
        TravelPoint::new(&alighting.name, arrival),
    ))
}

/// End offset of the first whole-token occurrence of `code` at or after `from`.
fn find_code(text: &str, code: &str, from: usize) -> Option<usize> {
    if code.trim().is_empty() {
        return None;
    }
    let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(code))).ok()?;
    pattern.find_at(text, from).map(|m| m.end())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// A schedule whose (day, minute) pairs never go backwards.
    fn monotone_schedule() -> impl Strategy<Value = Vec<Stop>> {
        prop::collection::vec((0i32..2, 1u32..600), 2..12).prop_map(|steps| {
            let mut day = 0;
            let mut minute = 0u32;
            steps
                .into_iter()
                .enumerate()
                .map(|(i, (day_step, minute_step))| {
                    if day_step > 0 {
                        day += 1;
                        minute = minute_step % 1440;
                    } else {
                        minute += minute_step;
                        if minute >= 1440 {
                            day += 1;
                            minute -= 1440;
                        }
                    }
                    Stop::new(format!("S{i}"), format!("Station {i}"), day, minute)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn departure_precedes_arrival(
            stops in monotone_schedule(),
            picks in (0usize..64, 0usize..64),
        ) {
            let n = stops.len();
            let a = picks.0 % n;
            let b = picks.1 % n;
            prop_assume!(a != b);
            let (board, alight) = (a.min(b), a.max(b));
            let day_board = stops[board].day_offset;
            let day_alight = stops[alight].day_offset;
            let min_board = stops[board].scheduled_minutes;
            let min_alight = stops[alight].scheduled_minutes;
            prop_assume!((day_board, min_board) < (day_alight, min_alight));

            let text = format!("{} {}", stops[board].code, stops[alight].code);
            let date = NaiveDate::from_ymd_opt(2025, 12, 19).unwrap();
            let (dep, arr) = match_stations(&stops, &text, date).unwrap();

            prop_assert!(dep.when < arr.when);
        }
    }
}
