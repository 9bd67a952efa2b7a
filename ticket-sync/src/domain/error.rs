//! Domain error types.
//!
//! These errors represent validation failures when building a travel record.
//! They are distinct from API/IO errors.

/// Errors from constructing a [`TravelRecord`](super::TravelRecord).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Arrival is not strictly after departure
    #[error("arrival ({arrival}) is not after departure ({departure})")]
    ArrivalNotAfterDeparture { departure: String, arrival: String },

    /// Departure or arrival place is blank
    #[error("departure and arrival places must be non-empty")]
    MissingPlace,
}
