//! Directory watching for new ticket files.

use std::path::{Path, PathBuf};

use notify::event::{EventKind, ModifyKind};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::error::WatchError;

/// Which paths count as tickets.
#[derive(Debug, Clone)]
pub struct TicketFilter {
    done_folder: Option<PathBuf>,
}

impl TicketFilter {
    pub fn new(done_folder: Option<PathBuf>) -> Self {
        Self { done_folder }
    }

    /// PDF files outside the done folder.
    pub fn accepts(&self, path: &Path) -> bool {
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        let is_done = self
            .done_folder
            .as_deref()
            .is_some_and(|done| path.starts_with(done));
        is_pdf && !is_done
    }

    /// Directories worth descending into.
    pub fn accepts_dir(&self, dir: &Path) -> bool {
        !self
            .done_folder
            .as_deref()
            .is_some_and(|done| dir.starts_with(done))
    }
}

/// Keeps the OS watch alive; dropping it stops delivery.
pub struct TicketWatcher {
    _watcher: RecommendedWatcher,
}

impl TicketWatcher {
    /// Watch `folder` recursively, sending each newly arrived ticket path.
    ///
    /// Notifications are queued without bound so the OS callback never
    /// waits on ticket processing.
    pub fn start(
        folder: &Path,
        filter: TicketFilter,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PathBuf>), WatchError> {
        if !folder.is_dir() {
            return Err(WatchError::FolderMissing {
                path: folder.to_path_buf(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handler = move |result: notify::Result<Event>| match result {
            Ok(event) => {
                if !is_arrival(&event.kind) {
                    return;
                }
                for path in event.paths.into_iter().filter(|p| filter.accepts(p)) {
                    debug!(path = %path.display(), "ticket arrived");
                    if tx.send(path).is_err() {
                        return;
                    }
                }
            }
            Err(e) => warn!(error = %e, "filesystem watch error"),
        };
        let mut watcher = notify::recommended_watcher(handler)?;
        watcher.watch(folder, RecursiveMode::Recursive)?;

        Ok((Self { _watcher: watcher }, rx))
    }
}

/// Creation, or a move into the folder.
fn is_arrival(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_)))
}

#[cfg(test)]
mod tests {
    use notify::event::{CreateKind, DataChange, RenameMode};

    use super::*;

    #[test]
    fn filter_accepts_pdfs_outside_done() {
        let filter = TicketFilter::new(Some(PathBuf::from("/travels/done")));
        assert!(filter.accepts(Path::new("/travels/trip.pdf")));
        assert!(filter.accepts(Path::new("/travels/2025/TRIP.PDF")));
        assert!(!filter.accepts(Path::new("/travels/trip.txt")));
        assert!(!filter.accepts(Path::new("/travels/trip")));
        assert!(!filter.accepts(Path::new("/travels/done/trip.pdf")));
        assert!(filter.accepts_dir(Path::new("/travels/2025")));
        assert!(!filter.accepts_dir(Path::new("/travels/done")));
    }

    #[test]
    fn arrivals() {
        assert!(is_arrival(&EventKind::Create(CreateKind::File)));
        assert!(is_arrival(&EventKind::Modify(ModifyKind::Name(RenameMode::To))));
        assert!(!is_arrival(&EventKind::Modify(ModifyKind::Data(DataChange::Content))));
    }

    #[test]
    fn missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let result = TicketWatcher::start(&dir.path().join("absent"), TicketFilter::new(None));
        assert!(matches!(result, Err(WatchError::FolderMissing { .. })));
    }
}
