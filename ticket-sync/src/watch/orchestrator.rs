//! The watch loop: backfill, then process arrivals one at a time.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::error::WatchError;
use super::pipeline::TicketHandler;
use super::stability::wait_until_stable;
use super::watcher::TicketFilter;
use crate::alert::Notifier;
use crate::sync::SyncOutcome;

const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Counts from one pass over a set of files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub created: usize,
    pub already_synced: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Created => self.created += 1,
            FileOutcome::AlreadySynced => self.already_synced += 1,
            FileOutcome::Failed => self.failed += 1,
            FileOutcome::Skipped => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Created,
    AlreadySynced,
    Failed,
    Skipped,
}

/// Drives a [`TicketHandler`] over the ticket folder.
///
/// Files are handled strictly one after another. A failure is logged and
/// notified, then the next file is taken; nothing a single ticket does can
/// stop the loop.
pub struct Orchestrator<H> {
    handler: H,
    notifier: Arc<dyn Notifier>,
    ticket_folder: PathBuf,
    done_folder: Option<PathBuf>,
    transfer_timeout: Duration,
    poll_interval: Duration,
}

impl<H: TicketHandler> Orchestrator<H> {
    pub fn new(handler: H, ticket_folder: impl Into<PathBuf>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            handler,
            notifier,
            ticket_folder: ticket_folder.into(),
            done_folder: None,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Move successfully processed tickets here.
    pub fn with_done_folder(mut self, done_folder: Option<PathBuf>) -> Self {
        self.done_folder = done_folder;
        self
    }

    /// How long an arriving file may keep growing, and how often to look.
    pub fn with_transfer_timing(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.transfer_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    pub fn filter(&self) -> TicketFilter {
        TicketFilter::new(self.done_folder.clone())
    }

    /// Every ticket already in the folder, sorted by path.
    pub fn existing_tickets(&self) -> Result<Vec<PathBuf>, WatchError> {
        if !self.ticket_folder.is_dir() {
            return Err(WatchError::FolderMissing {
                path: self.ticket_folder.clone(),
            });
        }
        let filter = self.filter();
        let mut files = Vec::new();
        collect_tickets(&self.ticket_folder, &filter, &mut files)?;
        files.sort();
        Ok(files)
    }

    /// Process every ticket already in the folder.
    pub async fn backfill(&self) -> Result<RunSummary, WatchError> {
        let files = self.existing_tickets()?;
        info!(
            folder = %self.ticket_folder.display(),
            count = files.len(),
            "backfilling existing tickets"
        );

        let mut summary = RunSummary::default();
        for path in files {
            summary.record(self.process(&path).await);
        }
        info!(?summary, "backfill complete");
        Ok(summary)
    }

    /// Backfill, then handle arrivals until `shutdown` resolves or the
    /// arrival channel closes.
    pub async fn run(
        &self,
        arrivals: &mut mpsc::UnboundedReceiver<PathBuf>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<RunSummary, WatchError> {
        let mut summary = self.backfill().await?;
        tokio::pin!(shutdown);

        info!(folder = %self.ticket_folder.display(), "watching for new tickets");
        loop {
            let first = tokio::select! {
                _ = &mut shutdown => {
                    info!("shutting down");
                    break;
                }
                arrival = arrivals.recv() => match arrival {
                    Some(path) => path,
                    None => {
                        warn!("filesystem watch ended");
                        break;
                    }
                },
            };

            // Collapse repeated notifications for the same file.
            let mut batch = vec![first];
            while let Ok(path) = arrivals.try_recv() {
                if !batch.contains(&path) {
                    batch.push(path);
                }
            }

            for path in batch {
                summary.record(self.arrive(&path).await);
            }
        }
        Ok(summary)
    }

    /// Handle a notification: wait for the transfer to finish, then process.
    async fn arrive(&self, path: &Path) -> FileOutcome {
        if !path.exists() {
            debug!(path = %path.display(), "arrived file is already gone");
            return FileOutcome::Skipped;
        }
        if !wait_until_stable(path, self.transfer_timeout, self.poll_interval).await {
            warn!(
                path = %path.display(),
                timeout = ?self.transfer_timeout,
                "file still changing, skipping"
            );
            let message = format!(
                "{} was still being written after {:?}",
                path.display(),
                self.transfer_timeout
            );
            self.notifier.notify("Ticket skipped", &message);
            return FileOutcome::Skipped;
        }
        self.process(path).await
    }

    async fn process(&self, path: &Path) -> FileOutcome {
        match self.handler.handle(path).await {
            Ok(outcome) => {
                match &outcome {
                    SyncOutcome::Created { link } => {
                        info!(path = %path.display(), %link, "ticket synchronized")
                    }
                    SyncOutcome::AlreadySynced { link } => {
                        info!(path = %path.display(), %link, "ticket was already synchronized")
                    }
                }
                self.move_to_done(path).await;
                match outcome {
                    SyncOutcome::Created { .. } => FileOutcome::Created,
                    SyncOutcome::AlreadySynced { .. } => FileOutcome::AlreadySynced,
                }
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "ticket failed");
                self.notifier.notify("Ticket failed", &e.to_string());
                FileOutcome::Failed
            }
        }
    }

    /// Best effort; a ticket that cannot be moved stays where it is.
    async fn move_to_done(&self, path: &Path) {
        let Some(done) = &self.done_folder else {
            return;
        };
        let relative = path.strip_prefix(&self.ticket_folder).unwrap_or(path);
        let relative = if relative.is_absolute() {
            Path::new(path.file_name().unwrap_or_default())
        } else {
            relative
        };
        let target = available_path(&done.join(relative));

        if let Some(parent) = target.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            warn!(path = %parent.display(), error = %e, "cannot create done folder");
            return;
        }
        if let Err(e) = tokio::fs::rename(path, &target).await {
            // Different filesystem: copy, then remove the original.
            debug!(error = %e, "rename failed, copying instead");
            if let Err(e) = tokio::fs::copy(path, &target).await {
                warn!(path = %path.display(), error = %e, "cannot move ticket to done folder");
                return;
            }
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "copied ticket but cannot remove original"
                );
                return;
            }
        }
        debug!(from = %path.display(), to = %target.display(), "moved ticket to done folder");
    }
}

fn collect_tickets(
    dir: &Path,
    filter: &TicketFilter,
    files: &mut Vec<PathBuf>,
) -> Result<(), WatchError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if !filter.accepts_dir(&path) {
                continue;
            }
            collect_tickets(&path, filter, files)?;
        } else if filter.accepts(&path) {
            files.push(path);
        }
    }
    Ok(())
}

/// `path`, or `name-1.ext`, `name-2.ext`, … if it is taken.
fn available_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());
    (1u32..)
        .map(|n| {
            let name = match &extension {
                Some(ext) => format!("{stem}-{n}.{ext}"),
                None => format!("{stem}-{n}"),
            };
            path.with_file_name(name)
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tempfile::tempdir;

    use super::*;
    use crate::alert::recording::RecordingNotifier;
    use crate::ticket::{TicketError, TicketParseError};
    use crate::watch::ProcessError;

    /// Succeeds for every file except those with "bad" in the name.
    #[derive(Default)]
    struct FakeHandler {
        handled: Mutex<Vec<PathBuf>>,
    }

    impl FakeHandler {
        fn handled_names(&self) -> Vec<String> {
            self.handled
                .lock()
                .unwrap()
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect()
        }
    }

    impl TicketHandler for &FakeHandler {
        async fn handle(&self, path: &Path) -> Result<SyncOutcome, ProcessError> {
            self.handled.lock().unwrap().push(path.to_path_buf());
            if path.to_string_lossy().contains("bad") {
                return Err(ProcessError::Parse(TicketParseError::new(
                    path,
                    TicketError::PatternMismatch { pattern: "booking" },
                )));
            }
            Ok(SyncOutcome::Created {
                link: format!("https://calendar.example.com/{}", path.display()),
            })
        }
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"%PDF-1.4").unwrap();
    }

    #[test]
    fn existing_tickets_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b.pdf"));
        touch(&root.join("a.pdf"));
        touch(&root.join("2025/c.PDF"));
        touch(&root.join("notes.txt"));
        touch(&root.join("done/old.pdf"));

        let handler = FakeHandler::default();
        let orchestrator = Orchestrator::new(&handler, root, Arc::new(RecordingNotifier::default()))
            .with_done_folder(Some(root.join("done")));
        let files = orchestrator.existing_tickets().unwrap();

        assert_eq!(files, vec![root.join("2025/c.PDF"), root.join("a.pdf"), root.join("b.pdf")]);
    }

    #[test]
    fn missing_folder_is_fatal() {
        let dir = tempdir().unwrap();
        let handler = FakeHandler::default();
        let notifier = Arc::new(RecordingNotifier::default());
        let orchestrator = Orchestrator::new(&handler, dir.path().join("absent"), notifier);
        assert!(matches!(orchestrator.existing_tickets(), Err(WatchError::FolderMissing { .. })));
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("1-good.pdf"));
        touch(&root.join("2-bad.pdf"));
        touch(&root.join("3-good.pdf"));

        let handler = FakeHandler::default();
        let notifier = Arc::new(RecordingNotifier::default());
        let orchestrator =
            Orchestrator::new(&handler, root, notifier.clone())
                .with_done_folder(Some(root.join("done")));
        let summary = orchestrator.backfill().await.unwrap();

        assert_eq!(summary.created, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(handler.handled_names(), vec!["1-good.pdf", "2-bad.pdf", "3-good.pdf"]);
        assert_eq!(notifier.titles(), vec!["Ticket failed"]);

        assert!(root.join("done/1-good.pdf").exists());
        assert!(root.join("done/3-good.pdf").exists());
        assert!(root.join("2-bad.pdf").exists());
        assert!(!root.join("1-good.pdf").exists());
    }

    #[tokio::test]
    async fn without_done_folder_files_stay() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("trip.pdf"));

        let handler = FakeHandler::default();
        let notifier = Arc::new(RecordingNotifier::default());
        let orchestrator = Orchestrator::new(&handler, dir.path(), notifier);
        orchestrator.backfill().await.unwrap();

        assert!(dir.path().join("trip.pdf").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn backfilled_file_is_not_processed_again() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("existing.pdf"));

        let handler = FakeHandler::default();
        let orchestrator = Orchestrator::new(&handler, root, Arc::new(RecordingNotifier::default()))
            .with_done_folder(Some(root.join("done")))
            .with_transfer_timing(Duration::from_secs(5), Duration::from_millis(100));

        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(root.join("existing.pdf")).unwrap();
        tx.send(root.join("vanished.pdf")).unwrap();
        drop(tx);

        let summary = orchestrator.run(&mut rx, std::future::pending()).await.unwrap();

        assert_eq!(handler.handled_names(), vec!["existing.pdf"]);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.skipped, 2);
        assert!(root.join("done/existing.pdf").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn arrival_is_processed_once_stable() {
        let dir = tempdir().unwrap();
        let tickets = dir.path().join("tickets");
        std::fs::create_dir(&tickets).unwrap();
        let arriving = dir.path().join("downloads/new.pdf");
        touch(&arriving);

        let handler = FakeHandler::default();
        let notifier = Arc::new(RecordingNotifier::default());
        let orchestrator = Orchestrator::new(&handler, &tickets, notifier)
            .with_done_folder(Some(tickets.join("done")))
            .with_transfer_timing(Duration::from_secs(5), Duration::from_millis(100));

        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(arriving.clone()).unwrap();
        tx.send(arriving.clone()).unwrap();
        drop(tx);

        let summary = orchestrator.run(&mut rx, std::future::pending()).await.unwrap();

        assert_eq!(handler.handled_names(), vec!["new.pdf"]);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.skipped, 0);
        assert!(tickets.join("done/new.pdf").exists());
        assert!(!arriving.exists());
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let dir = tempdir().unwrap();
        let handler = FakeHandler::default();
        let notifier = Arc::new(RecordingNotifier::default());
        let orchestrator = Orchestrator::new(&handler, dir.path(), notifier);

        let (_tx, mut rx) = mpsc::unbounded_channel();
        let summary = orchestrator.run(&mut rx, async {}).await.unwrap();
        assert_eq!(summary, RunSummary::default());
    }

    #[test]
    fn taken_names_get_a_suffix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trip.pdf");
        assert_eq!(available_path(&path), path);

        touch(&path);
        touch(&dir.path().join("trip-1.pdf"));
        assert_eq!(available_path(&path), dir.path().join("trip-2.pdf"));
    }
}
