use serde::{Deserialize, Serialize};

/// Delivery guarantee level for a message.
///
/// `Guaranteed` messages are cached server-side and are eligible for
/// recovery after a failover reconnection; `Standard` messages are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QoS {
    /// Best-effort live delivery, no server-side caching.
    #[default]
    Standard,
    /// Cached server-side for no-loss delivery across reconnections.
    Guaranteed,
}

/// How a delivered message relates to the subject's live stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// The current image of the subject, as delivered to a new subscriber.
    Snapshot,
    /// A live incremental update.
    #[default]
    Update,
    /// A message replayed from the server cache during recovery.
    Recovered,
    /// A message delivered as part of a one-time history backfill.
    Historical,
}

/// A named field carried by a message, order-preserving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A pub/sub message. Immutable after construction.
///
/// Applications build messages with [`Message::new`] and the `with_*`
/// constructors; `seq`, `epoch`, `message_type`, and `retained` are assigned
/// server-side and are only meaningful on delivered messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    subject: String,
    content: Vec<u8>,
    #[serde(default)]
    fields: Vec<Field>,
    #[serde(default)]
    closure: Option<String>,
    #[serde(default)]
    qos: QoS,
    #[serde(default)]
    retained: bool,
    #[serde(default)]
    reply_subject: Option<String>,
    #[serde(default)]
    message_type: MessageType,
    #[serde(default)]
    seq: u64,
    #[serde(default)]
    epoch: u64,
}

impl Message {
    /// Create a message with a subject and an opaque content payload.
    pub fn new(subject: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            subject: subject.into(),
            content: content.into(),
            fields: Vec::new(),
            closure: None,
            qos: QoS::default(),
            retained: false,
            reply_subject: None,
            message_type: MessageType::default(),
            seq: 0,
            epoch: 0,
        }
    }

    /// Attach ordered fields.
    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    /// Attach a closure: an opaque correlation token. A publish carrying a
    /// closure is tracked and acknowledged with exactly one `PUBLISH_*`
    /// status notification; without one the publish is fire-and-forget.
    pub fn with_closure(mut self, closure: impl Into<String>) -> Self {
        self.closure = Some(closure.into());
        self
    }

    /// Request a delivery guarantee level (default [`QoS::Standard`]).
    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    /// Attach a reply subject.
    pub fn with_reply_subject(mut self, reply_subject: impl Into<String>) -> Self {
        self.reply_subject = Some(reply_subject.into());
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn closure(&self) -> Option<&str> {
        self.closure.as_deref()
    }

    pub fn qos(&self) -> QoS {
        self.qos
    }

    pub fn retained(&self) -> bool {
        self.retained
    }

    pub fn reply_subject(&self) -> Option<&str> {
        self.reply_subject.as_deref()
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Server-assigned per-subject, per-epoch sequence number.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Server-assigned cache generation for the subject.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Construct a fully-populated message as received from the server.
    /// Exposed for transport implementations and tests.
    #[allow(clippy::too_many_arguments)]
    pub fn delivered(
        subject: impl Into<String>,
        content: impl Into<Vec<u8>>,
        fields: Vec<Field>,
        qos: QoS,
        retained: bool,
        message_type: MessageType,
        seq: u64,
        epoch: u64,
    ) -> Self {
        Self {
            subject: subject.into(),
            content: content.into(),
            fields,
            closure: None,
            qos,
            retained,
            reply_subject: None,
            message_type,
            seq,
            epoch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let msg = Message::new("/stocks/NYSE/IBM", "184.25");
        assert_eq!(msg.subject(), "/stocks/NYSE/IBM");
        assert_eq!(msg.content(), b"184.25");
        assert_eq!(msg.qos(), QoS::Standard);
        assert_eq!(msg.message_type(), MessageType::Update);
        assert!(msg.closure().is_none());
        assert!(!msg.retained());
    }

    #[test]
    fn test_fields_preserve_order() {
        let msg = Message::new("/fx/EURUSD", "").with_fields(vec![
            Field::new("bid", "1.0842"),
            Field::new("ask", "1.0844"),
        ]);
        let names: Vec<_> = msg.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["bid", "ask"]);
    }

    #[test]
    fn test_closure_marks_tracked_publish() {
        let msg = Message::new("/a", "x").with_closure("req-42");
        assert_eq!(msg.closure(), Some("req-42"));
    }
}
