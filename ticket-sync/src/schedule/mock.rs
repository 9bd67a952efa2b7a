//! Static schedule source for testing without API access.
//!
//! Loads train responses from JSON files and serves them as if they were
//! live API responses.

use std::collections::HashMap;
use std::path::Path;

use super::error::ScheduleError;
use super::lookup::ScheduleSource;
use super::types::{Stop, TrainResponse};

/// Schedule source that serves stop lists from JSON files.
#[derive(Debug, Clone, Default)]
pub struct StaticSchedule {
    lines: HashMap<String, Vec<Stop>>,
}

impl StaticSchedule {
    /// Load every `{line_id}.json` file in a directory.
    ///
    /// Each file holds a train response in the API's format.
    pub fn load(data_dir: impl AsRef<Path>) -> Result<Self, ScheduleError> {
        let data_dir = data_dir.as_ref();
        let mut lines = HashMap::new();

        let entries = std::fs::read_dir(data_dir).map_err(|e| ScheduleError::Api {
            status: 0,
            message: format!("Failed to read schedule directory {data_dir:?}: {e}"),
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let Some(line_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let json = std::fs::read_to_string(&path).map_err(|e| ScheduleError::Api {
                status: 0,
                message: format!("Failed to read {path:?}: {e}"),
            })?;
            let response: TrainResponse =
                serde_json::from_str(&json).map_err(|e| ScheduleError::Json {
                    message: format!("{path:?}: {e}"),
                })?;

            lines.insert(line_id.to_string(), response.into_stops());
        }

        Ok(Self { lines })
    }

    /// Add or replace one line's stops.
    pub fn with_line(mut self, line_id: impl Into<String>, stops: Vec<Stop>) -> Self {
        self.lines.insert(line_id.into(), stops);
        self
    }

    /// Line ids with a schedule.
    pub fn available_lines(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.lines.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl ScheduleSource for StaticSchedule {
    async fn stops_for(&self, line_id: &str) -> Result<Vec<Stop>, ScheduleError> {
        self.lines
            .get(line_id)
            .cloned()
            .ok_or_else(|| ScheduleError::UnknownLine {
                line_id: line_id.to_string(),
            })
    }
}
