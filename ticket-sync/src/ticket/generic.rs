//! Model-based extraction for tickets in any other layout.

use std::convert::Infallible;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::cache::DiskCache;
use crate::domain::{DedupKey, TravelPoint, TravelRecord, TravelTime, TravelType, TravelerColors};
use crate::model::ModelBackend;
use crate::retry::{RetryError, RetryPolicy, with_retry};

use super::error::TicketError;

/// Used when no candidate models are configured.
const FALLBACK_MODEL: &str = "gemini-2.5-flash-lite";

/// Instruction sent with every ticket.
pub const EXTRACTION_PROMPT: &str = r#"You are given a travel ticket (train, flight or bus) as a PDF.
Extract the journey of the traveller and answer with a single JSON object and nothing else:

{
  "departure": {"when": "<ISO 8601 date and time>", "where": "<place of departure>"},
  "arrival": {"when": "<ISO 8601 date and time>", "where": "<place of arrival>"},
  "id": "<booking reference, PNR or confirmation number, or null if there is none>",
  "travel_type": "<Train | Flight | Bus>",
  "description": "<seat, coach, gate or other useful details, or an empty string>",
  "traveler": "<full name of the traveller>"
}

Rules:
- Use the local times printed on the ticket. Include the UTC offset only when the ticket states the timezone.
- "where" is a human readable place; include the platform or terminal when it is printed.
- If the ticket covers several legs, describe the whole journey from the first departure to the final arrival.
- Do not invent values. Use null for an unknown id."#;

/// Response schema the model is asked for.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelTicket {
    pub departure: ModelPoint,
    pub arrival: ModelPoint,
    #[serde(default, alias = "booking_reference")]
    pub id: Option<String>,
    pub travel_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub traveler: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelPoint {
    pub when: String,
    #[serde(rename = "where")]
    pub place: String,
}

impl ModelTicket {
    /// Parse a model answer, with or without a markdown code fence.
    pub fn parse(response: &str) -> Result<Self, TicketError> {
        serde_json::from_str(strip_code_fence(response)).map_err(|e| TicketError::Response {
            message: e.to_string(),
        })
    }

    /// Validate into a travel record.
    pub fn into_record(self, colors: &TravelerColors) -> Result<TravelRecord, TicketError> {
        let travel_type = TravelType::parse(&self.travel_type).ok_or_else(|| TicketError::Response {
            message: format!("unknown travel type {:?}", self.travel_type),
        })?;
        let departure = self.departure.into_point()?;
        let arrival = self.arrival.into_point()?;

        let dedup_key = DedupKey::from_reference_or_route(
            self.id.as_deref(),
            travel_type,
            &departure,
            &arrival,
        );
        let event_color = self
            .traveler
            .as_deref()
            .map_or_else(|| colors.default_color(), |name| colors.for_text(name));

        Ok(TravelRecord::new(
            travel_type,
            self.description,
            departure,
            arrival,
            dedup_key,
            event_color,
        )?)
    }
}

impl ModelPoint {
    fn into_point(self) -> Result<TravelPoint, TicketError> {
        let when = TravelTime::parse(&self.when).map_err(|e| TicketError::Response {
            message: e.to_string(),
        })?;
        Ok(TravelPoint::new(self.place.trim(), when))
    }
}

/// Strip a surrounding markdown code fence, with or without a language tag.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // The reply is a JSON object, so a leading word can only be a language tag
    let body = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()).trim();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Asks a model to read the ticket.
///
/// Candidate models are tried in turn, one per attempt, under the shared
/// retry policy. A response that validates is cached by the ticket's file
/// stem, so reprocessing the same file within the TTL skips the model.
#[derive(Debug)]
pub struct GenericExtractor<M> {
    model: M,
    cache: DiskCache,
    policy: RetryPolicy,
    candidates: Vec<String>,
    colors: TravelerColors,
}

impl<M: ModelBackend> GenericExtractor<M> {
    pub fn new(
        model: M,
        cache: DiskCache,
        policy: RetryPolicy,
        candidates: Vec<String>,
        colors: TravelerColors,
    ) -> Self {
        let candidates = if candidates.is_empty() {
            vec![FALLBACK_MODEL.to_string()]
        } else {
            candidates
        };
        Self {
            model,
            cache,
            policy,
            candidates,
            colors,
        }
    }

    pub async fn extract(&self, path: &Path) -> Result<TravelRecord, TicketError> {
        let code = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let response = self
            .cache
            .get_or_compute(
                &code,
                || self.ask(path),
                |text: &String| Ok::<_, Infallible>(text.clone()),
                |text: &str| Ok::<_, Infallible>(text.to_string()),
            )
            .await?;

        match ModelTicket::parse(&response).and_then(|t| t.into_record(&self.colors)) {
            Ok(record) => Ok(record),
            Err(e) => {
                // Only a stale or foreign cache entry can get here
                warn!(code, error = %e, "cached model response is unusable, dropping it");
                self.cache.invalidate(&code).await;
                Err(e)
            }
        }
    }

    /// Query the model until it produces an answer that validates.
    async fn ask(&self, path: &Path) -> Result<String, TicketError> {
        let pdf = tokio::fs::read(path).await?;
        let pdf = pdf.as_slice();
        let candidates = self.candidates.as_slice();
        let model = &self.model;

        let response = with_retry(&self.policy, "model extraction", move |attempt| {
            let name = &candidates[attempt as usize % candidates.len()];
            model.generate(name, pdf, EXTRACTION_PROMPT)
        })
        .await
        .map_err(|e| match e {
            RetryError::Permanent(e) => TicketError::Model(e),
            RetryError::Exhausted { attempts, last } => {
                TicketError::ModelExhausted { attempts, last }
            }
        })?;

        ModelTicket::parse(&response)?.into_record(&self.colors)?;
        info!(path = %path.display(), "model extracted ticket");
        Ok(response)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::model::{ModelBackend, ModelError};

    /// Replays scripted results and records which model each call used.
    #[derive(Default)]
    pub struct ScriptedModel {
        script: Mutex<VecDeque<Result<String, ModelError>>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn new(script: Vec<Result<String, ModelError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ModelBackend for ScriptedModel {
        async fn generate(
            &self,
            model: &str,
            _pdf: &[u8],
            _prompt: &str,
        ) -> Result<String, ModelError> {
            self.calls.lock().unwrap().push(model.to_string());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ModelError::Empty { model: model.to_string() }))
        }
    }

    pub const FLIGHT: &str = r#"{
        "departure": {"when": "2026-03-02T06:15:00+05:30", "where": "Delhi T3"},
        "arrival": {"when": "2026-03-02T08:40:00+05:30", "where": "Mumbai T2"},
        "id": "q7x 2lm",
        "travel_type": "Flight",
        "description": "Seat 14C",
        "traveler": "Asha Rao"
    }"#;
}
