use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::ReminderMethod;
use crate::domain::TravelRecord;
use crate::google::{
    Attachment, DEDUP_PROPERTY, EventDateTime, EventResource, ExtendedProperties, ReminderOverride,
    Reminders, UploadReference,
};

/// The calendar API accepts at most this many reminder overrides.
const MAX_REMINDERS: usize = 5;

/// Per-event settings taken from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSettings {
    pub reminders: Vec<Duration>,
    pub reminder_method: ReminderMethod,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            reminders: vec![Duration::from_secs(24 * 60 * 60)],
            reminder_method: ReminderMethod::Popup,
        }
    }
}

/// Build the event for a record. Naive ticket times are read as local time.
pub fn build_event(
    record: &TravelRecord,
    settings: &EventSettings,
    attachment: Option<&UploadReference>,
) -> EventResource {
    let key = record.dedup_key();
    let mut private = BTreeMap::new();
    private.insert(DEDUP_PROPERTY.to_string(), key.to_string());

    let overrides = settings
        .reminders
        .iter()
        .take(MAX_REMINDERS)
        .map(|offset| ReminderOverride {
            method: settings.reminder_method.as_str().to_string(),
            minutes: u32::try_from(offset.as_secs() / 60).unwrap_or(u32::MAX),
        })
        .collect();

    EventResource {
        id: Some(key.event_id()),
        summary: record.summary(),
        location: record.departure().place.clone(),
        description: record.description().to_string(),
        start: EventDateTime {
            date_time: record.departure().when.to_instant().to_rfc3339(),
        },
        end: EventDateTime {
            date_time: record.arrival().when.to_instant().to_rfc3339(),
        },
        reminders: Reminders {
            use_default: false,
            overrides,
        },
        color_id: record.event_color().color_id(),
        extended_properties: ExtendedProperties { private },
        attachments: attachment.map(Attachment::from).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DedupKey, EventColor, TravelPoint, TravelTime, TravelType};

    fn record() -> TravelRecord {
        TravelRecord::new(
            TravelType::Flight,
            "Seat 12A",
            TravelPoint::new("DEL", TravelTime::parse("2025-03-01T06:00:00+05:30").unwrap()),
            TravelPoint::new("BOM", TravelTime::parse("2025-03-01T08:10:00+05:30").unwrap()),
            DedupKey::from_booking_reference("AB1CD2").unwrap(),
            EventColor::Tomato,
        )
        .unwrap()
    }

    #[test]
    fn event_fields() {
        let settings = EventSettings {
            reminders: vec![Duration::from_secs(86_400), Duration::from_secs(3_600)],
            reminder_method: ReminderMethod::Email,
        };
        let event = build_event(&record(), &settings, None);

        assert_eq!(event.summary, "Flight to BOM");
        assert_eq!(event.location, "DEL");
        assert_eq!(event.description, "Seat 12A");
        assert_eq!(event.color_id, "11");
        assert_eq!(event.id, Some(record().dedup_key().event_id()));
        assert_eq!(event.extended_properties.private[DEDUP_PROPERTY], "AB1CD2");
        assert!(!event.reminders.use_default);
        assert_eq!(
            event.reminders.overrides,
            vec![
                ReminderOverride {
                    method: "email".into(),
                    minutes: 1440
                },
                ReminderOverride {
                    method: "email".into(),
                    minutes: 60
                },
            ]
        );
        assert!(event.attachments.is_empty());
    }

    #[test]
    fn zoned_times_keep_their_instant() {
        let event = build_event(&record(), &EventSettings::default(), None);
        let start = chrono::DateTime::parse_from_rfc3339(&event.start.date_time).unwrap();
        let expected = chrono::DateTime::parse_from_rfc3339("2025-03-01T06:00:00+05:30").unwrap();
        assert_eq!(start, expected);
    }

    #[test]
    fn attachment_and_reminder_cap() {
        let upload = UploadReference {
            id: "f1".into(),
            name: "ticket.pdf".into(),
            mime_type: "application/pdf".into(),
            view_link: "https://drive.example.com/f1".into(),
        };
        let settings = EventSettings {
            reminders: (1..=8).map(|h| Duration::from_secs(h * 3600)).collect(),
            reminder_method: ReminderMethod::Popup,
        };
        let event = build_event(&record(), &settings, Some(&upload));

        assert_eq!(event.reminders.overrides.len(), MAX_REMINDERS);
        assert_eq!(event.attachments.len(), 1);
        assert_eq!(event.attachments[0].file_id, "f1");
    }
}
