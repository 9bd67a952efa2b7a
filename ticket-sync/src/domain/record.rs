//! The canonical travel record produced by ticket parsing.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::color::EventColor;
use super::dedup::DedupKey;
use super::error::RecordError;
use super::time::TravelTime;

/// Mode of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TravelType {
    Train,
    Flight,
    Bus,
}

impl TravelType {
    /// Parse a travel type name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" | "rail" => Some(TravelType::Train),
            "flight" | "plane" | "air" => Some(TravelType::Flight),
            "bus" | "coach" => Some(TravelType::Bus),
            _ => None,
        }
    }
}

impl fmt::Display for TravelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A place and time at one end of a journey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TravelPoint {
    /// Human-readable place, optionally with platform or terminal.
    pub place: String,
    /// When the traveller is there.
    pub when: TravelTime,
}

impl TravelPoint {
    pub fn new(place: impl Into<String>, when: TravelTime) -> Self {
        Self {
            place: place.into(),
            when,
        }
    }
}

/// Everything needed to create one calendar event for one booking.
///
/// Construction enforces that departure is strictly before arrival, so a
/// `TravelRecord` in hand is always a valid event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TravelRecord {
    travel_type: TravelType,
    description: String,
    departure: TravelPoint,
    arrival: TravelPoint,
    dedup_key: DedupKey,
    event_color: EventColor,
}

impl TravelRecord {
    /// Create a record, rejecting journeys that do not move forward in time.
    pub fn new(
        travel_type: TravelType,
        description: impl Into<String>,
        departure: TravelPoint,
        arrival: TravelPoint,
        dedup_key: DedupKey,
        event_color: EventColor,
    ) -> Result<Self, RecordError> {
        if departure.when >= arrival.when {
            return Err(RecordError::ArrivalNotAfterDeparture {
                departure: departure.when.to_string(),
                arrival: arrival.when.to_string(),
            });
        }
        if departure.place.trim().is_empty() || arrival.place.trim().is_empty() {
            return Err(RecordError::MissingPlace);
        }

        Ok(Self {
            travel_type,
            description: description.into(),
            departure,
            arrival,
            dedup_key,
            event_color,
        })
    }

    pub fn travel_type(&self) -> TravelType {
        self.travel_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn departure(&self) -> &TravelPoint {
        &self.departure
    }

    pub fn arrival(&self) -> &TravelPoint {
        &self.arrival
    }

    pub fn dedup_key(&self) -> &DedupKey {
        &self.dedup_key
    }

    pub fn event_color(&self) -> EventColor {
        self.event_color
    }

    /// Event title, e.g. "Train to Jammu Tawi".
    pub fn summary(&self) -> String {
        format!("{} to {}", self.travel_type, self.arrival.place)
    }
}
