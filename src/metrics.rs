use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for observability.
///
/// Obtain from the client handle and read individual values, or take a
/// [`MetricsSnapshot`] for export to a monitoring system.
///
/// # Example
/// ```ignore
/// let metrics = client.metrics();
/// println!("reconnections: {}", metrics.reconnections());
/// let snapshot = metrics.snapshot();
/// ```
#[derive(Debug, Default)]
pub struct Metrics {
    connections_total: AtomicU64,
    reconnections_total: AtomicU64,
    connect_failures_total: AtomicU64,
    messages_received_total: AtomicU64,
    messages_published_total: AtomicU64,
    publish_failures_total: AtomicU64,
    data_syncs_total: AtomicU64,
    data_resyncs_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total successful connections.
    pub fn connections(&self) -> u64 {
        self.connections_total.load(Ordering::Relaxed)
    }

    /// Successful connections that followed a prior session.
    pub fn reconnections(&self) -> u64 {
        self.reconnections_total.load(Ordering::Relaxed)
    }

    /// Failed connection attempts (handshake or mid-session drop).
    pub fn connect_failures(&self) -> u64 {
        self.connect_failures_total.load(Ordering::Relaxed)
    }

    /// Messages delivered to the listener.
    pub fn messages_received(&self) -> u64 {
        self.messages_received_total.load(Ordering::Relaxed)
    }

    /// Messages handed to the transport for publication.
    pub fn messages_published(&self) -> u64 {
        self.messages_published_total.load(Ordering::Relaxed)
    }

    /// Tracked publishes that resolved to a non-OK outcome.
    pub fn publish_failures(&self) -> u64 {
        self.publish_failures_total.load(Ordering::Relaxed)
    }

    /// Subjects fully recovered after a reconnection.
    pub fn data_syncs(&self) -> u64 {
        self.data_syncs_total.load(Ordering::Relaxed)
    }

    /// Subjects downgraded to a resync after a reconnection.
    pub fn data_resyncs(&self) -> u64 {
        self.data_resyncs_total.load(Ordering::Relaxed)
    }

    pub(crate) fn record_connection(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnection(&self) {
        self.reconnections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connect_failure(&self) {
        self.connect_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_message_received(&self) {
        self.messages_received_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_message_published(&self) {
        self.messages_published_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_publish_failure(&self) {
        self.publish_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_data_sync(&self) {
        self.data_syncs_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_data_resync(&self) {
        self.data_resyncs_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Acquire),
            reconnections_total: self.reconnections_total.load(Ordering::Acquire),
            connect_failures_total: self.connect_failures_total.load(Ordering::Acquire),
            messages_received_total: self.messages_received_total.load(Ordering::Acquire),
            messages_published_total: self.messages_published_total.load(Ordering::Acquire),
            publish_failures_total: self.publish_failures_total.load(Ordering::Acquire),
            data_syncs_total: self.data_syncs_total.load(Ordering::Acquire),
            data_resyncs_total: self.data_resyncs_total.load(Ordering::Acquire),
        }
    }
}

/// A point-in-time snapshot of all metrics.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub reconnections_total: u64,
    pub connect_failures_total: u64,
    pub messages_received_total: u64,
    pub messages_published_total: u64,
    pub publish_failures_total: u64,
    pub data_syncs_total: u64,
    pub data_resyncs_total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.record_connection();
        metrics.record_connection();
        metrics.record_reconnection();
        metrics.record_data_resync();

        assert_eq!(metrics.connections(), 2);
        assert_eq!(metrics.reconnections(), 1);
        assert_eq!(metrics.data_resyncs(), 1);
        assert_eq!(metrics.data_syncs(), 0);
    }

    #[test]
    fn test_snapshot() {
        let metrics = Metrics::new();
        metrics.record_connection();
        metrics.record_message_received();
        metrics.record_message_received();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connections_total, 1);
        assert_eq!(snapshot.messages_received_total, 2);
    }
}
