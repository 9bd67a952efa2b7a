//! Deduplication keys.

use std::fmt;

use sha2::{Digest, Sha256};

use super::record::{TravelPoint, TravelType};

/// Length of the hex digest used for synthesized keys.
const SYNTHESIZED_HEX_LEN: usize = 20;

/// Prefix of keys synthesized from the route.
const SYNTHESIZED_PREFIX: &str = "ttc-";

/// Error returned when a booking reference is unusable as a key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid dedup key: {reason}")]
pub struct InvalidDedupKey {
    reason: &'static str,
}

/// Identifier stored on a calendar event to detect "already synchronized".
///
/// Either a normalized booking reference or, when a ticket has none, a
/// digest of the route and departure instant. Both are deterministic for a
/// given booking, which is what makes re-processing a ticket idempotent.
///
/// # Examples
///
/// ```
/// use ticket_sync::domain::DedupKey;
///
/// let key = DedupKey::from_booking_reference(" pnr 12345 ").unwrap();
/// assert_eq!(key.as_str(), "PNR12345");
///
/// assert!(DedupKey::from_booking_reference("   ").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    /// Normalize a booking reference: whitespace removed, uppercased.
    pub fn from_booking_reference(reference: &str) -> Result<Self, InvalidDedupKey> {
        let normalized: String = reference
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect();

        if normalized.is_empty() {
            return Err(InvalidDedupKey {
                reason: "booking reference is empty",
            });
        }
        if !normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))
        {
            return Err(InvalidDedupKey {
                reason: "booking reference has unexpected characters",
            });
        }

        Ok(Self(normalized))
    }

    /// Derive a key from the route and departure instant.
    pub fn synthesize(
        travel_type: TravelType,
        departure: &TravelPoint,
        arrival: &TravelPoint,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(travel_type.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(departure.place.trim().to_lowercase().as_bytes());
        hasher.update(b"|");
        hasher.update(arrival.place.trim().to_lowercase().as_bytes());
        hasher.update(b"|");
        hasher.update(departure.when.to_instant().to_rfc3339().as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(format!("{SYNTHESIZED_PREFIX}{}", &digest[..SYNTHESIZED_HEX_LEN]))
    }

    /// Booking reference if usable, otherwise a synthesized key.
    pub fn from_reference_or_route(
        reference: Option<&str>,
        travel_type: TravelType,
        departure: &TravelPoint,
        arrival: &TravelPoint,
    ) -> Self {
        reference
            .and_then(|r| Self::from_booking_reference(r).ok())
            .unwrap_or_else(|| Self::synthesize(travel_type, departure, arrival))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Calendar event id derived from this key.
    ///
    /// Lowercase hex is a subset of the base32hex alphabet the calendar API
    /// accepts for client-chosen event ids, so a second insert of the same
    /// booking collides instead of duplicating.
    pub fn event_id(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

impl fmt::Debug for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DedupKey({})", self.0)
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TravelTime;

    fn point(place: &str, when: &str) -> TravelPoint {
        TravelPoint::new(place, TravelTime::parse(when).unwrap())
    }

    #[test]
    fn normalizes_booking_reference() {
        let key = DedupKey::from_booking_reference("ab 12\tcd").unwrap();
        assert_eq!(key.as_str(), "AB12CD");
    }

    #[test]
    fn rejects_odd_characters() {
        assert!(DedupKey::from_booking_reference("PNR=1").is_err());
        assert!(DedupKey::from_booking_reference("").is_err());
    }

    #[test]
    fn synthesized_key_is_deterministic() {
        let dep = point("Delhi", "2025-12-19T10:00:00+05:30");
        let arr = point("Jammu", "2025-12-20T02:00:00+05:30");
        let a = DedupKey::synthesize(TravelType::Train, &dep, &arr);
        let b = DedupKey::synthesize(TravelType::Train, &dep, &arr);
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("ttc-"));
        assert_eq!(a.as_str().len(), 4 + SYNTHESIZED_HEX_LEN);
    }

    #[test]
    fn synthesized_key_ignores_place_case() {
        let dep = point("Delhi", "2025-12-19T10:00:00+05:30");
        let arr = point("Jammu", "2025-12-20T02:00:00+05:30");
        let upper = point("DELHI ", "2025-12-19T10:00:00+05:30");
        assert_eq!(
            DedupKey::synthesize(TravelType::Bus, &dep, &arr),
            DedupKey::synthesize(TravelType::Bus, &upper, &arr)
        );
    }

    #[test]
    fn synthesized_key_depends_on_route_and_time() {
        let dep = point("Delhi", "2025-12-19T10:00:00+05:30");
        let later = point("Delhi", "2025-12-19T11:00:00+05:30");
        let arr = point("Jammu", "2025-12-20T02:00:00+05:30");
        assert_ne!(
            DedupKey::synthesize(TravelType::Train, &dep, &arr),
            DedupKey::synthesize(TravelType::Train, &later, &arr)
        );
        assert_ne!(
            DedupKey::synthesize(TravelType::Train, &dep, &arr),
            DedupKey::synthesize(TravelType::Flight, &dep, &arr)
        );
    }

    #[test]
    fn reference_preferred_over_route() {
        let dep = point("Delhi", "2025-12-19T10:00:00+05:30");
        let arr = point("Jammu", "2025-12-20T02:00:00+05:30");
        let key = DedupKey::from_reference_or_route(Some("x9y8"), TravelType::Flight, &dep, &arr);
        assert_eq!(key.as_str(), "X9Y8");

        let key = DedupKey::from_reference_or_route(Some(" "), TravelType::Flight, &dep, &arr);
        assert!(key.as_str().starts_with("ttc-"));
    }

    #[test]
    fn event_id_is_base32hex() {
        let id = DedupKey::from_booking_reference("PNR12345").unwrap().event_id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_digit() || ('a'..='v').contains(&c)));
    }
}
