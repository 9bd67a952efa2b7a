//! Domain types for ticket synchronization.
//!
//! This module contains the validated travel data that flows from the
//! ticket parsers to the calendar synchronizer. All types enforce their
//! invariants at construction time, so code that receives these types can
//! trust their validity.

mod color;
mod dedup;
mod error;
mod record;
mod time;

pub use color::{EventColor, TravelerColor, TravelerColors};
pub use dedup::{DedupKey, InvalidDedupKey};
pub use error::RecordError;
pub use record::{TravelPoint, TravelRecord, TravelType};
pub use time::{TimeError, TravelTime};
