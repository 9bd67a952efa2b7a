use std::path::PathBuf;

use crate::sync::SyncError;
use crate::ticket::TicketParseError;

/// Errors that stop the watcher itself.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The ticket folder does not exist or is not a directory
    #[error("ticket folder {path} is not a directory")]
    FolderMissing { path: PathBuf },

    /// The filesystem watch could not be set up
    #[error("cannot watch ticket folder: {0}")]
    Notify(#[from] notify::Error),

    /// Listing the ticket folder failed
    #[error("cannot scan ticket folder: {0}")]
    Io(#[from] std::io::Error),
}

/// Why one ticket file was not synchronized.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Parse(#[from] TicketParseError),

    #[error("failed to synchronize {path}: {source}")]
    Sync {
        path: PathBuf,
        #[source]
        source: SyncError,
    },
}
