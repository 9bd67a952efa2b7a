//! Ticket parsing error types.

use std::path::PathBuf;

use crate::domain::RecordError;
use crate::model::ModelError;
use crate::schedule::{MatchError, ScheduleError};

/// Why a ticket could not be turned into a travel record.
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    /// The PDF could not be read
    #[error("failed to read PDF text: {message}")]
    Pdf { message: String },

    /// Failed to read the ticket file
    #[error("failed to read ticket file: {0}")]
    Io(#[from] std::io::Error),

    /// A required pattern of the structured layout did not match
    #[error("structured ticket is missing the {pattern} field")]
    PatternMismatch { pattern: &'static str },

    /// The travel date is not in the expected format
    #[error("invalid travel date {value:?}")]
    InvalidDate { value: String },

    /// Boarding or alighting station not found
    #[error(transparent)]
    Station(#[from] MatchError),

    /// Schedule lookup failed
    #[error("schedule lookup failed: {0}")]
    Schedule(#[from] ScheduleError),

    /// The model request failed permanently
    #[error("model extraction failed: {0}")]
    Model(#[from] ModelError),

    /// Every model attempt failed
    #[error("model extraction gave up after {attempts} attempts: {last}")]
    ModelExhausted { attempts: u32, last: ModelError },

    /// The model's answer is not a usable ticket description
    #[error("unusable model response: {message}")]
    Response { message: String },

    /// Extracted data does not form a valid record
    #[error("invalid travel record: {0}")]
    Record(#[from] RecordError),
}

/// A failed ticket, with the file it came from.
#[derive(Debug, thiserror::Error)]
#[error("failed to parse ticket {}: {source}", path.display())]
pub struct TicketParseError {
    pub path: PathBuf,
    #[source]
    pub source: TicketError,
}

impl TicketParseError {
    pub fn new(path: impl Into<PathBuf>, source: TicketError) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}
