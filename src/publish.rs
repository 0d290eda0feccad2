use crate::protocol::PublishOutcome;
use crate::status::StatusKind;
use std::collections::HashMap;
use tracing::warn;

/// Correlates outgoing publish requests with their acknowledgment frames.
///
/// Only publishes carrying a closure are tracked; each tracked publish
/// resolves to exactly one `PUBLISH_*` (or size-limit) status notification.
/// A publish without a closure is fire-and-forget: nothing is registered and
/// nothing is ever notified for it, even on failure.
#[derive(Debug, Default)]
pub struct PublishTracker {
    pending: HashMap<String, PendingPublish>,
}

#[derive(Debug)]
struct PendingPublish {
    subject: String,
}

impl PublishTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending entry. Called before the message is handed to the
    /// transport. A duplicate closure replaces the prior entry.
    pub fn register(&mut self, closure: &str, subject: &str) {
        if self
            .pending
            .insert(
                closure.to_string(),
                PendingPublish {
                    subject: subject.to_string(),
                },
            )
            .is_some()
        {
            warn!("Duplicate publish closure '{closure}', prior entry replaced");
        }
    }

    /// Resolve an acknowledgment into its status notification. Returns
    /// `None` for an unknown closure (already resolved, or never tracked).
    pub fn resolve(&mut self, closure: &str, outcome: PublishOutcome) -> Option<StatusKind> {
        self.pending.remove(closure)?;
        Some(match outcome {
            PublishOutcome::Ok => StatusKind::PublishOk,
            PublishOutcome::Failed => StatusKind::PublishFailed,
            PublishOutcome::Denied => StatusKind::PublishDenied,
            PublishOutcome::NoSubscriber => StatusKind::PublishNoSubscriber,
            PublishOutcome::SizeLimitExceeded => StatusKind::MessageSizeLimitExceeded,
        })
    }

    /// Fail every pending entry, returning the notifications to raise.
    /// Used when the connection drops with acks outstanding.
    pub fn fail_all(&mut self) -> Vec<(String, StatusKind)> {
        self.pending
            .drain()
            .map(|(closure, _)| (closure, StatusKind::PublishFailed))
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn subject_of(&self, closure: &str) -> Option<&str> {
        self.pending.get(closure).map(|p| p.subject.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_publish_resolves_once() {
        let mut tracker = PublishTracker::new();
        tracker.register("req-1", "/a");
        assert_eq!(tracker.subject_of("req-1"), Some("/a"));

        assert_eq!(
            tracker.resolve("req-1", PublishOutcome::Ok),
            Some(StatusKind::PublishOk)
        );
        // Second ack for the same closure resolves nothing.
        assert_eq!(tracker.resolve("req-1", PublishOutcome::Ok), None);
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn test_outcome_mapping() {
        let mut tracker = PublishTracker::new();
        for (outcome, status) in [
            (PublishOutcome::Failed, StatusKind::PublishFailed),
            (PublishOutcome::Denied, StatusKind::PublishDenied),
            (PublishOutcome::NoSubscriber, StatusKind::PublishNoSubscriber),
            (
                PublishOutcome::SizeLimitExceeded,
                StatusKind::MessageSizeLimitExceeded,
            ),
        ] {
            tracker.register("c", "/a");
            assert_eq!(tracker.resolve("c", outcome), Some(status));
        }
    }

    #[test]
    fn test_untracked_ack_is_ignored() {
        let mut tracker = PublishTracker::new();
        assert_eq!(tracker.resolve("never-registered", PublishOutcome::Ok), None);
    }

    #[test]
    fn test_fail_all_drains_pending() {
        let mut tracker = PublishTracker::new();
        tracker.register("a", "/x");
        tracker.register("b", "/y");

        let failed = tracker.fail_all();
        assert_eq!(failed.len(), 2);
        assert!(failed.iter().all(|(_, s)| *s == StatusKind::PublishFailed));
        assert_eq!(tracker.pending_count(), 0);
    }
}
