//! Choosing an extractor for a ticket.

use std::path::Path;

use tracing::{info, warn};

use crate::domain::TravelRecord;
use crate::model::ModelBackend;
use crate::schedule::ScheduleSource;

use super::error::{TicketError, TicketParseError};
use super::generic::GenericExtractor;
use super::structured::{STRUCTURED_MARKER, StructuredExtractor};
use super::text::TextExtractor;

/// Which extractor handles a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketLayout {
    /// The layout parsed by pattern, timed from the schedule
    Structured,
    /// Anything else, read by the model
    Generic,
}

impl TicketLayout {
    /// Classify a ticket by its first-page text.
    pub fn classify(text: &str) -> Self {
        if text.contains(STRUCTURED_MARKER) {
            TicketLayout::Structured
        } else {
            TicketLayout::Generic
        }
    }
}

/// Turns ticket files into travel records.
#[derive(Debug)]
pub struct TicketParser<X, S, M> {
    text: X,
    structured: StructuredExtractor<S>,
    generic: GenericExtractor<M>,
}

impl<X, S, M> TicketParser<X, S, M>
where
    X: TextExtractor,
    S: ScheduleSource,
    M: ModelBackend,
{
    pub fn new(text: X, structured: StructuredExtractor<S>, generic: GenericExtractor<M>) -> Self {
        Self {
            text,
            structured,
            generic,
        }
    }

    /// Parse one ticket file.
    ///
    /// A PDF whose text cannot be read (e.g. a scanned image) goes to the
    /// model, which reads the file itself.
    pub async fn parse(&self, path: &Path) -> Result<TravelRecord, TicketParseError> {
        let text = match self.text.first_page_text(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "no text layer, using the model");
                String::new()
            }
        };

        let layout = TicketLayout::classify(&text);
        info!(path = %path.display(), ?layout, "parsing ticket");

        let result: Result<TravelRecord, TicketError> = match layout {
            TicketLayout::Structured => self.structured.extract(&text).await,
            TicketLayout::Generic => self.generic.extract(path).await,
        };
        result.map_err(|source| TicketParseError::new(path, source))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::cache::{CacheConfig, DiskCache};
    use crate::domain::{EventColor, TravelType, TravelerColors};
    use crate::retry::RetryPolicy;
    use crate::schedule::{StaticSchedule, Stop};
    use crate::ticket::generic::fake::{FLIGHT, ScriptedModel};
    use crate::ticket::structured::fixtures::CONFIRMED;
    use tempfile::{TempDir, tempdir};

    /// Serves fixed text, or fails when empty.
    struct FixedText(&'static str);

    impl TextExtractor for FixedText {
        fn first_page_text(&self, _path: &Path) -> Result<String, TicketError> {
            if self.0.is_empty() {
                Err(TicketError::Pdf {
                    message: "no text".into(),
                })
            } else {
                Ok(self.0.to_string())
            }
        }
    }

    fn parser<'m>(
        text: &'static str,
        model: &'m ScriptedModel,
        dir: &TempDir,
    ) -> TicketParser<FixedText, StaticSchedule, &'m ScriptedModel> {
        let schedule = StaticSchedule::default().with_line(
            "12425",
            vec![
                Stop::new("NZM", "Hazrat Nizamuddin", 0, 600),
                Stop::new("JUC", "Jalandhar City", 1, 120),
            ],
        );
        let colors = TravelerColors::default();
        let cache = DiskCache::new(&CacheConfig::new(dir.path().join("cache")));
        TicketParser::new(
            FixedText(text),
            StructuredExtractor::new(schedule, colors.clone()),
            GenericExtractor::new(
                model,
                cache,
                RetryPolicy::immediate(3),
                vec!["m".into()],
                colors,
            ),
        )
    }

    fn ticket(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("ticket.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        path
    }

    #[test]
    fn classify_by_marker() {
        assert_eq!(TicketLayout::classify(CONFIRMED), TicketLayout::Structured);
        assert_eq!(TicketLayout::classify("Boarding pass IndiGo 6E 2131"), TicketLayout::Generic);
        assert_eq!(TicketLayout::classify(""), TicketLayout::Generic);
    }

    #[tokio::test]
    async fn structured_ticket_skips_model() {
        let dir = tempdir().unwrap();
        let model = ScriptedModel::default();

        let record = parser(CONFIRMED, &model, &dir).parse(&ticket(&dir)).await.unwrap();

        assert_eq!(record.travel_type(), TravelType::Train);
        assert_eq!(record.event_color(), EventColor::Banana);
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn other_layouts_use_model() {
        let dir = tempdir().unwrap();
        let model = ScriptedModel::new(vec![Ok(FLIGHT.to_string())]);

        let record = parser("Boarding pass", &model, &dir).parse(&ticket(&dir)).await.unwrap();

        assert_eq!(record.travel_type(), TravelType::Flight);
        assert_eq!(model.calls().len(), 1);
    }

    #[tokio::test]
    async fn unreadable_text_uses_model() {
        let dir = tempdir().unwrap();
        let model = ScriptedModel::new(vec![Ok(FLIGHT.to_string())]);

        let record = parser("", &model, &dir).parse(&ticket(&dir)).await.unwrap();
        assert_eq!(record.travel_type(), TravelType::Flight);
    }

    #[tokio::test]
    async fn failure_carries_path_and_cause() {
        let dir = tempdir().unwrap();
        let model = ScriptedModel::default();
        let text: &'static str = "IRCTC ticket without the expected fields";
        let path = ticket(&dir);

        let err = parser(text, &model, &dir).parse(&path).await.unwrap_err();

        assert_eq!(err.path, path);
        assert!(matches!(err.source, TicketError::PatternMismatch { pattern: "travel_date" }));
    }
}
