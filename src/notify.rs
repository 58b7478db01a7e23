//! Notification composition and delivery.
//!
//! A completed refresh cycle produces at most one [`Notification`]. Which
//! variant is chosen is decided by the scheduler; this module only turns a
//! notification into title/body text and hands it to a [`Notifier`].
//!
//! Delivery is fire-and-forget: `Notifier::notify` returns nothing, and
//! implementations log their own failures.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::analysis::tracked::ChangeDescription;
use crate::model::format_local;

/// Title used for every notification the service posts.
pub const NOTIFICATION_TITLE: &str = "Propagation Monitor";

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// The three mutually exclusive outcomes of a cycle that had a previous
/// snapshot to compare against.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Tracked slots changed; one line per change.
    TrackedChanges(Vec<ChangeDescription>),
    /// Something changed, but nothing the user tracks.
    ChangedOverall { at: DateTime<Utc> },
    /// The new snapshot is identical to the previous one.
    Refreshed { at: DateTime<Utc> },
}

impl Notification {
    pub fn title(&self) -> &'static str {
        NOTIFICATION_TITLE
    }

    pub fn body(&self) -> String {
        match self {
            Notification::TrackedChanges(changes) => {
                let mut lines: Vec<String> = changes.iter().map(|c| c.to_string()).collect();
                lines.sort();
                lines.join("\n")
            }
            Notification::ChangedOverall { at } => format!(
                "Propagation data refreshed at: {}\nSome conditions have changed",
                format_local(*at)
            ),
            Notification::Refreshed { at } => {
                format!("Propagation data refreshed at: {}", format_local(*at))
            }
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Notification::TrackedChanges(_) => "tracked changes",
            Notification::ChangedOverall { .. } => "changed overall",
            Notification::Refreshed { .. } => "refreshed",
        }
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Delivery channel for notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Writes notifications to the log. Used when running headless.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        log::info!("[{}] {}", title, body.replace('\n', " | "));
    }
}

/// Native desktop notifications via `notify_rust`.
///
/// Without the `desktop-notify` feature this falls back to logging.
pub struct DesktopNotifier {
    timeout_ms: u32,
}

impl DesktopNotifier {
    pub fn new(timeout_ms: u32) -> Self {
        Self { timeout_ms }
    }
}

impl Notifier for DesktopNotifier {
    #[cfg(feature = "desktop-notify")]
    fn notify(&self, title: &str, body: &str) {
        use notify_rust::{Notification, Timeout};

        if let Err(e) = Notification::new()
            .summary(title)
            .body(body)
            .timeout(Timeout::Milliseconds(self.timeout_ms))
            .show()
        {
            log::warn!("Failed to send desktop notification: {}", e);
        }
    }

    #[cfg(not(feature = "desktop-notify"))]
    fn notify(&self, title: &str, body: &str) {
        let _ = self.timeout_ms;
        LogNotifier.notify(title, body);
    }
}

/// Keeps every notification in memory, in delivery order.
///
/// Useful for tests and for anything that wants to replay what the user saw.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(title, body)` pairs delivered so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.sent.lock().push((title.to_string(), body.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
