//! Google sign-in, Calendar and Drive.
//!
//! [`CredentialManager`] owns the token and rebuilds the API clients whenever
//! it changes. The clients themselves make one attempt per call; retries and
//! the "already synchronized" check live in [`sync`](crate::sync).

mod calendar;
mod credentials;
mod drive;
mod error;
mod http;
mod manager;
mod oauth;
mod types;

pub use calendar::{CalendarConfig, EventStore, GoogleCalendar};
pub use credentials::{ClientSecrets, StoredToken, TokenStore};
pub use drive::{FileStore, GoogleDrive};
pub use error::{AuthError, GoogleError};
pub use manager::{CredentialManager, CredentialState, Rebuildable};
pub use oauth::{InstalledAppFlow, OAuthCompleteTemplate, OAuthFlow, SCOPES};
pub use types::{
    Attachment, DEDUP_PROPERTY, EventDateTime, EventItem, EventList, EventResource,
    ExtendedProperties, ReminderOverride, Reminders, UploadReference,
};
