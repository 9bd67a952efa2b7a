//! Calendar synchronization of parsed travel records.
//!
//! A record maps to exactly one event, found again through the dedup key
//! stored in the event's private extended properties. The ticket file is
//! uploaded and attached when possible; an upload failure only costs the
//! attachment.

mod error;
mod event;
mod synchronizer;

pub use error::SyncError;
pub use event::{EventSettings, build_event};
pub use synchronizer::{CalendarSync, SyncOutcome};
