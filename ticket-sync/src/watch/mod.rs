//! Watching the ticket folder.
//!
//! Existing tickets are processed once at startup, then each arrival is
//! processed after its size stops changing. Processing is sequential and
//! failures never leave the loop.

mod error;
mod orchestrator;
mod pipeline;
mod stability;
mod watcher;

pub use error::{ProcessError, WatchError};
pub use orchestrator::{Orchestrator, RunSummary};
pub use pipeline::{TicketHandler, TicketPipeline};
pub use stability::wait_until_stable;
pub use watcher::{TicketFilter, TicketWatcher};
