use std::future::Future;
use std::path::Path;

use tracing::info;

use super::error::ProcessError;
use crate::google::{EventStore, FileStore, OAuthFlow};
use crate::model::ModelBackend;
use crate::schedule::ScheduleSource;
use crate::sync::{CalendarSync, SyncOutcome};
use crate::ticket::{TextExtractor, TicketParser};

/// Processes one ticket file end to end.
pub trait TicketHandler {
    fn handle(&self, path: &Path) -> impl Future<Output = Result<SyncOutcome, ProcessError>>;
}

/// Parse, then synchronize.
pub struct TicketPipeline<X, S, M, E, F, O> {
    parser: TicketParser<X, S, M>,
    sync: CalendarSync<E, F, O>,
}

impl<X, S, M, E, F, O> TicketPipeline<X, S, M, E, F, O> {
    pub fn new(parser: TicketParser<X, S, M>, sync: CalendarSync<E, F, O>) -> Self {
        Self { parser, sync }
    }
}

impl<X, S, M, E, F, O> TicketHandler for TicketPipeline<X, S, M, E, F, O>
where
    X: TextExtractor,
    S: ScheduleSource,
    M: ModelBackend,
    E: EventStore,
    F: FileStore,
    O: OAuthFlow,
{
    async fn handle(&self, path: &Path) -> Result<SyncOutcome, ProcessError> {
        let record = self.parser.parse(path).await?;
        info!(
            path = %path.display(),
            summary = %record.summary(),
            departure = %record.departure().when,
            key = %record.dedup_key(),
            "ticket parsed"
        );
        self.sync
            .sync(&record, path)
            .await
            .map_err(|source| ProcessError::Sync {
                path: path.to_path_buf(),
                source,
            })
    }
}
