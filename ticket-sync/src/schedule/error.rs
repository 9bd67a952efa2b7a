//! Schedule lookup error types.

use std::path::PathBuf;

use crate::retry::Retryable;

/// Errors from resolving a line to its stops.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// Credentials file missing or malformed
    #[error("schedule credentials {path}: {message}")]
    Credentials { path: PathBuf, message: String },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Rate limited by the API
    #[error("rate limited by schedule API")]
    RateLimited,

    /// Credentials rejected
    #[error("unauthorized: check the schedule API credentials")]
    Unauthorized,

    /// API returned an error status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response JSON
    #[error("JSON parse error: {message}")]
    Json { message: String },

    /// The source has no schedule for this line
    #[error("no schedule for line {line_id}")]
    UnknownLine { line_id: String },

    /// Every attempt failed with a transient error
    #[error("schedule service unreachable after {attempts} attempts (are you connected to the internet?): {last}")]
    Unreachable {
        attempts: u32,
        #[source]
        last: Box<ScheduleError>,
    },
}

impl Retryable for ScheduleError {
    fn is_transient(&self) -> bool {
        match self {
            ScheduleError::Http(e) => !e.is_builder(),
            ScheduleError::RateLimited => true,
            ScheduleError::Api { status, .. } => *status >= 500,
            ScheduleError::Credentials { .. }
            | ScheduleError::Unauthorized
            | ScheduleError::Json { .. }
            | ScheduleError::UnknownLine { .. }
            | ScheduleError::Unreachable { .. } => false,
        }
    }
}

/// Errors from locating the traveller's stops in a ticket.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    /// Fewer than two of the line's stops appear in the ticket
    #[error("could not find both boarding and alighting station in the ticket (found: {found:?})")]
    MissingStation { found: Vec<String> },

    /// A stop's offset does not produce a representable time
    #[error("schedule time for stop {code} is out of range")]
    OutOfRange { code: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(ScheduleError::RateLimited.is_transient());
        assert!(
            ScheduleError::Api {
                status: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !ScheduleError::Api {
                status: 404,
                message: String::new()
            }
            .is_transient()
        );
        assert!(!ScheduleError::Unauthorized.is_transient());
        assert!(
            !ScheduleError::Credentials {
                path: PathBuf::from("creds.json"),
                message: "missing".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn error_display() {
        let err = ScheduleError::Unreachable {
            attempts: 7,
            last: Box::new(ScheduleError::RateLimited),
        };
        assert!(err.to_string().starts_with("schedule service unreachable after 7 attempts"));
        assert!(err.to_string().ends_with("rate limited by schedule API"));

        let err = ScheduleError::UnknownLine {
            line_id: "12425".into(),
        };
        assert_eq!(err.to_string(), "no schedule for line 12425");

        let err = MatchError::MissingStation {
            found: vec!["NZM".into()],
        };
        assert!(err.to_string().contains("NZM"));
    }
}
