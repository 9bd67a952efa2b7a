//! Schedule data types.
//!
//! DTOs mirror the RailRadar train response; [`Stop`] is the cached,
//! source-independent form.

use serde::{Deserialize, Serialize};

/// One scheduled halt of a line.
///
/// `day_offset` and the minute fields are relative to the line's start date,
/// not absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    /// Station code, e.g. "NZM".
    pub code: String,
    /// Station name, e.g. "Hazrat Nizamuddin".
    pub name: String,
    /// Day of the run on which the line reaches this stop (0 = first day).
    pub day_offset: i32,
    /// Scheduled departure, in minutes after midnight of `day_offset`.
    pub scheduled_minutes: u32,
    /// Scheduled arrival, when the source reports one.
    #[serde(default)]
    pub arrival_minutes: Option<u32>,
}

impl Stop {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        day_offset: i32,
        scheduled_minutes: u32,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            day_offset,
            scheduled_minutes,
            arrival_minutes: None,
        }
    }

    pub fn with_arrival(mut self, minutes: u32) -> Self {
        self.arrival_minutes = Some(minutes);
        self
    }

    /// Minute used when this stop is the alighting point.
    pub fn alighting_minutes(&self) -> u32 {
        self.arrival_minutes.unwrap_or(self.scheduled_minutes)
    }
}

/// Top-level train response.
#[derive(Debug, Deserialize)]
pub struct TrainResponse {
    pub data: TrainData,
}

#[derive(Debug, Deserialize)]
pub struct TrainData {
    pub route: Vec<RouteStopDto>,
}

/// One entry of a train's route, halting or not.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStopDto {
    pub station_code: String,
    pub station_name: String,
    pub day: i32,
    #[serde(default)]
    pub scheduled_departure: Option<u32>,
    #[serde(default)]
    pub scheduled_arrival: Option<u32>,
    #[serde(default)]
    pub is_halt: u8,
}

impl TrainResponse {
    /// Halting stops in route order.
    pub fn into_stops(self) -> Vec<Stop> {
        self.data
            .route
            .into_iter()
            .filter(|r| r.is_halt == 1)
            .map(|r| Stop {
                code: r.station_code,
                name: r.station_name,
                day_offset: r.day,
                // The origin has no arrival and the terminus no departure
                scheduled_minutes: r.scheduled_departure.or(r.scheduled_arrival).unwrap_or(0),
                arrival_minutes: r.scheduled_arrival,
            })
            .collect()
    }
}
