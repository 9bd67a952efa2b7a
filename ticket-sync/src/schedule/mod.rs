//! Train schedules and station matching.
//!
//! A line id (train number) resolves to its ordered halting stops, each with
//! a day offset and minute relative to the line's start. Combined with the
//! travel date from a ticket, the matcher turns the traveller's two stops
//! into absolute departure and arrival times.

mod client;
mod error;
mod lookup;
mod matcher;
mod mock;
mod types;

pub use client::{RailRadarClient, ScheduleClientConfig};
pub use error::{MatchError, ScheduleError};
pub use lookup::{ScheduleLookup, ScheduleSource};
pub use matcher::match_stations;
pub use mock::StaticSchedule;
pub use types::{RouteStopDto, Stop, TrainData, TrainResponse};
