//! Extraction for the one ticket layout parsed without a model (IRCTC).

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::info;

use crate::domain::{DedupKey, TravelRecord, TravelType, TravelerColors};
use crate::schedule::{ScheduleSource, match_stations};

use super::error::TicketError;

/// Text that identifies the structured layout.
pub const STRUCTURED_MARKER: &str = "IRCTC";

/// Format of the travel date on the ticket, e.g. "19-Dec-2025".
const DATE_FORMAT: &str = "%d-%b-%Y";

struct NamedPattern {
    name: &'static str,
    regex: Regex,
}

fn named(name: &'static str, pattern: &str) -> NamedPattern {
    let regex = Regex::new(&format!("(?si){pattern}")).expect("valid ticket pattern");
    NamedPattern { name, regex }
}

/// Applied in order; each must match.
static PATTERNS: LazyLock<[NamedPattern; 3]> = LazyLock::new(|| {
    [
        named("travel_date", r"Start Date\* (?P<travel_date>.*?)\s"),
        named(
            "booking",
            r"PNR Train No\./Name Class\n(?P<pnr>\d+) (?P<train_number>\d{5})",
        ),
        named(
            "seating",
            r"CNF/(?P<seating>\w\d{1,2}/\d{1,2}/(?:SIDE )?(?:UPPER|MIDDLE|LOWER|WINDOW SIDE|NO CHOICE))|RLWL|PQWL",
        ),
    ]
});

/// Fields read from a structured ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredFields {
    pub travel_date: NaiveDate,
    pub booking_reference: String,
    pub line_id: String,
    /// Coach and berth; absent for waitlisted tickets.
    pub seating: Option<String>,
}

impl StructuredFields {
    /// Apply the layout's patterns to the ticket text.
    pub fn extract(text: &str) -> Result<Self, TicketError> {
        let mut travel_date = None;
        let mut booking_reference = None;
        let mut line_id = None;
        let mut seating = None;

        for pattern in PATTERNS.iter() {
            let caps = pattern
                .regex
                .captures(text)
                .ok_or(TicketError::PatternMismatch {
                    pattern: pattern.name,
                })?;
            let group = |name: &str| caps.name(name).map(|m| m.as_str().trim().to_string());

            travel_date = travel_date.or_else(|| group("travel_date"));
            booking_reference = booking_reference.or_else(|| group("pnr"));
            line_id = line_id.or_else(|| group("train_number"));
            seating = seating.or_else(|| group("seating"));
        }

        let (Some(date), Some(booking_reference), Some(line_id)) =
            (travel_date, booking_reference, line_id)
        else {
            return Err(TicketError::PatternMismatch { pattern: "booking" });
        };

        let travel_date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .map_err(|_| TicketError::InvalidDate { value: date })?;

        Ok(Self {
            travel_date,
            booking_reference,
            line_id,
            seating,
        })
    }
}

/// Builds records from structured tickets, timing them from the schedule.
#[derive(Debug)]
pub struct StructuredExtractor<S> {
    schedule: S,
    colors: TravelerColors,
}

impl<S: ScheduleSource> StructuredExtractor<S> {
    pub fn new(schedule: S, colors: TravelerColors) -> Self {
        Self { schedule, colors }
    }

    pub async fn extract(&self, text: &str) -> Result<TravelRecord, TicketError> {
        let fields = StructuredFields::extract(text)?;
        info!(
            line_id = %fields.line_id,
            travel_date = %fields.travel_date,
            "parsed structured ticket"
        );

        let stops = self.schedule.stops_for(&fields.line_id).await?;
        let (departure, arrival) = match_stations(&stops, text, fields.travel_date)?;

        let dedup_key = DedupKey::from_reference_or_route(
            Some(&fields.booking_reference),
            TravelType::Train,
            &departure,
            &arrival,
        );
        let description = fields
            .seating
            .as_deref()
            .map(|seat| format!("Seating: {seat}"))
            .unwrap_or_default();

        Ok(TravelRecord::new(
            TravelType::Train,
            description,
            departure,
            arrival,
            dedup_key,
            self.colors.for_text(text),
        )?)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{CONFIRMED, WAITLISTED};
    use super::*;
    use crate::domain::{EventColor, TravelTime, TravelerColor};
    use crate::schedule::{ScheduleError, StaticSchedule, Stop};

    fn schedule() -> StaticSchedule {
        StaticSchedule::default().with_line(
            "12425",
            vec![
                Stop::new("NDLS", "New Delhi", 0, 540),
                Stop::new("GZB", "Ghaziabad", 0, 570),
                Stop::new("NZM", "Hazrat Nizamuddin", 0, 600),
                Stop::new("UMB", "Ambala Cantt", 0, 820),
                Stop::new("JUC", "Jalandhar City", 1, 120),
                Stop::new("JAT", "Jammu Tawi", 1, 300),
            ],
        )
    }

    fn colors() -> TravelerColors {
        TravelerColors::new(
            vec![TravelerColor {
                aliases: vec!["Asha Rao".into()],
                color: EventColor::Grape,
            }],
            EventColor::Banana,
        )
    }

    #[test]
    fn fields_from_confirmed_ticket() {
        let fields = StructuredFields::extract(CONFIRMED).unwrap();
        assert_eq!(fields.travel_date, NaiveDate::from_ymd_opt(2025, 12, 19).unwrap());
        assert_eq!(fields.booking_reference, "2456789012");
        assert_eq!(fields.line_id, "12425");
        assert_eq!(fields.seating.as_deref(), Some("B1/23/LOWER"));
    }

    #[test]
    fn waitlisted_ticket_has_no_seat() {
        let fields = StructuredFields::extract(WAITLISTED).unwrap();
        assert_eq!(fields.seating, None);
    }

    #[test]
    fn missing_pattern_is_named() {
        let text = CONFIRMED.replace("PNR Train No./Name Class", "Booking details");
        let err = StructuredFields::extract(&text).unwrap_err();
        assert!(matches!(err, TicketError::PatternMismatch { pattern: "booking" }));

        let text = CONFIRMED.replace("CNF/B1/23/LOWER", "CONFIRMED");
        let err = StructuredFields::extract(&text).unwrap_err();
        assert!(matches!(err, TicketError::PatternMismatch { pattern: "seating" }));
    }

    #[test]
    fn invalid_date() {
        let text = CONFIRMED.replace("Start Date* 19-Dec-2025", "Start Date* 2025/12/19");
        let err = StructuredFields::extract(&text).unwrap_err();
        assert!(matches!(err, TicketError::InvalidDate { value } if value == "2025/12/19"));
    }

    #[tokio::test]
    async fn record_from_confirmed_ticket() {
        let extractor = StructuredExtractor::new(schedule(), colors());
        let record = extractor.extract(CONFIRMED).await.unwrap();

        assert_eq!(record.travel_type(), TravelType::Train);
        assert_eq!(record.summary(), "Train to Jalandhar City");
        assert_eq!(record.description(), "Seating: B1/23/LOWER");
        assert_eq!(record.departure().when, TravelTime::parse("2025-12-19T10:00").unwrap());
        assert_eq!(record.arrival().when, TravelTime::parse("2025-12-20T02:00").unwrap());
        assert_eq!(record.dedup_key().as_str(), "2456789012");
        assert_eq!(record.event_color(), EventColor::Grape);
    }

    #[tokio::test]
    async fn waitlisted_record_uses_default_color() {
        let extractor = StructuredExtractor::new(schedule(), colors());
        let record = extractor.extract(WAITLISTED).await.unwrap();
        assert_eq!(record.description(), "");
        assert_eq!(record.event_color(), EventColor::Banana);
    }

    #[tokio::test]
    async fn unknown_line_aborts() {
        let extractor = StructuredExtractor::new(StaticSchedule::default(), colors());
        let err = extractor.extract(CONFIRMED).await.unwrap_err();
        assert!(matches!(err, TicketError::Schedule(ScheduleError::UnknownLine { .. })));
    }

    #[tokio::test]
    async fn station_not_on_line_aborts() {
        let text = CONFIRMED.replace("(JUC)", "(XYZ)");
        let extractor = StructuredExtractor::new(schedule(), colors());
        let err = extractor.extract(&text).await.unwrap_err();
        assert!(matches!(err, TicketError::Station(_)));
    }
}
