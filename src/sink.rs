// Downstream consumers of finished text. Delivery is fire-and-forget.

use std::io::Write;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::feeds::FeedIdentity;

/// Delivery hint attached to every notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// A rendered earthquake bulletin.
    Bulletin,
    /// Connected / retrying / stopped announcements.
    Lifecycle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub feed: FeedIdentity,
    pub kind: NoticeKind,
    pub text: String,
}

/// Receives finished notices. Called concurrently from both feed workers,
/// must not block and has no way to report failure back.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notice: Notice);
}

/// Prints each notice to stdout as one block.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl NotificationSink for StdoutSink {
    fn deliver(&self, notice: Notice) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "[{}] {}\n", notice.feed, notice.text) {
            warn!(feed = %notice.feed, error = %e, "stdout sink write failed");
        }
    }
}

/// Forwards notices into an unbounded channel for a host to consume.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn deliver(&self, notice: Notice) {
        if let Err(e) = self.tx.send(notice) {
            debug!(feed = %e.0.feed, "notice dropped, receiver gone");
        }
    }
}
