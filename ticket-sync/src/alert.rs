//! User-facing notifications.

use tracing::warn;

/// Tells the user about something that needs their attention.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

/// Emits notifications as log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        warn!(target: "ticket_sync::notification", title, message, "notification");
    }
}

/// Drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct Muted;

impl Notifier for Muted {
    fn notify(&self, _title: &str, _message: &str) {}
}
