use crate::message::Message;
use serde::{Deserialize, Serialize};

/// Resume point included in a re-subscribe for a guaranteed subject: the
/// last `(epoch, seq)` observed before the disconnection. The server
/// attempts to deliver everything after it from its cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePoint {
    pub epoch: u64,
    pub seq: u64,
}

/// Outcome of a tracked publish, reported by the server in a
/// [`Frame::PublishAck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishOutcome {
    Ok,
    Failed,
    Denied,
    NoSubscriber,
    SizeLimitExceeded,
}

/// The frames exchanged between the client and a server.
///
/// This is the typed protocol model the connection driver operates on; how a
/// frame becomes bytes is the transport's concern (the default transport
/// encodes frames as JSON text messages).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Frame {
    /// Client handshake, first frame after the transport opens.
    Connect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entitlement_token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        external_token: Option<String>,
    },
    /// Server response to [`Frame::Connect`].
    ConnectAck { accepted: bool },
    /// Subscribe to a subject, optionally resuming from a prior point.
    Subscribe {
        subject: String,
        #[serde(default)]
        conflation_millis: u64,
        #[serde(default)]
        history_count: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resume: Option<ResumePoint>,
    },
    /// Entitlement verdict for a subscribe.
    SubscribeAck { subject: String, allowed: bool },
    /// Unsubscribe from a subject.
    Unsubscribe { subject: String },
    /// The server's recovery confirmation for a resumed subject: the
    /// subject's current cache epoch and the oldest sequence number the
    /// cache can still deliver.
    SubjectSync {
        subject: String,
        epoch: u64,
        first_available_seq: u64,
    },
    /// A message delivered for a subscribed subject.
    Data { message: Message },
    /// Publish a message.
    Publish { message: Message },
    /// Acknowledgment for a publish that carried a closure.
    PublishAck {
        closure: String,
        outcome: PublishOutcome,
    },
    /// Keepalive probe.
    Ping,
    /// Keepalive response.
    Pong,
}
