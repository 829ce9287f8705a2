//! Ephemeral user-facing notifications.
//!
//! Toast-style messages for mutation successes and transport failures. The
//! surface is a plain broadcast: notices are fire-and-forget, not persisted,
//! and dropped when nobody is listening.

use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// A single toast-style message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

/// Broadcast handle for notices.
///
/// Cloning is cheap; all clones feed the same subscribers. The transport
/// emits exactly one error notice per failed request, and the mutation
/// executor emits configured success notices; nothing else writes here.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribes to all future notices.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn success(&self, text: impl Into<String>) {
        self.send(NoticeKind::Success, text.into());
    }

    pub fn error(&self, text: impl Into<String>) {
        self.send(NoticeKind::Error, text.into());
    }

    fn send(&self, kind: NoticeKind, text: String) {
        tracing::debug!(?kind, %text, "notice");
        // No receivers is fine: notices are best-effort.
        let _ = self.tx.send(Notice { kind, text });
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_notices() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();

        notifier.success("Post created successfully!");
        notifier.error("An error occurred");

        let first = rx.recv().await.expect("notice");
        assert_eq!(first.kind, NoticeKind::Success);
        assert_eq!(first.text, "Post created successfully!");

        let second = rx.recv().await.expect("notice");
        assert_eq!(second.kind, NoticeKind::Error);
    }

    #[test]
    fn test_send_without_subscribers_is_silent() {
        let notifier = Notifier::new();
        notifier.error("nobody listening");
    }

    #[tokio::test]
    async fn test_clones_feed_same_subscribers() {
        let notifier = Notifier::new();
        let clone = notifier.clone();
        let mut rx = notifier.subscribe();

        clone.success("via clone");
        assert_eq!(rx.recv().await.expect("notice").text, "via clone");
    }
}
