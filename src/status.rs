use std::fmt;

/// Status notifications delivered to the application listener.
///
/// Internally a closed enum; at the listener boundary each variant maps to a
/// stable string identifier via [`StatusKind::as_str`] so existing listener
/// implementations keyed on the string constants keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// Successfully connected to a server of the cluster.
    ServerUp,
    /// Failed to connect to a server of the cluster.
    ServerDown,
    /// After a failover reconnection, a subject was synchronized including
    /// all messages published during the failover period.
    DataSync,
    /// After a failover reconnection, a subject was synchronized with the
    /// latest retained message only; messages published during the failover
    /// could not be recovered.
    DataResync,
    /// The client is entitled to subscribe to a subject.
    SubscribeAllow,
    /// The client is not entitled to subscribe to a subject.
    SubscribeDeny,
    /// A tracked publish succeeded.
    PublishOk,
    /// A tracked publish failed.
    PublishFailed,
    /// A tracked publish was rejected by entitlement rules.
    PublishDenied,
    /// A tracked publish had no subscriber and no guaranteed delivery.
    PublishNoSubscriber,
    /// A tracked publish exceeded the server's message size limit.
    MessageSizeLimitExceeded,
    /// The connect handshake was accepted.
    ConnectOk,
    /// The connect handshake was rejected by entitlement rules.
    ConnectDeny,
}

impl StatusKind {
    /// Stable string identifier of this notification.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::ServerUp => "SERVER_UP",
            StatusKind::ServerDown => "SERVER_DOWN",
            StatusKind::DataSync => "DATA_SYNC",
            StatusKind::DataResync => "DATA_RESYNC",
            StatusKind::SubscribeAllow => "SUBSCRIBE_ALLOW",
            StatusKind::SubscribeDeny => "SUBSCRIBE_DENY",
            StatusKind::PublishOk => "PUBLISH_OK",
            StatusKind::PublishFailed => "PUBLISH_FAILED",
            StatusKind::PublishDenied => "PUBLISH_DENIED",
            StatusKind::PublishNoSubscriber => "PUBLISH_NO_SUBSCRIBER",
            StatusKind::MessageSizeLimitExceeded => "MESSAGE_SIZE_LIMIT_EXCEEDED",
            StatusKind::ConnectOk => "CONNECT_OK",
            StatusKind::ConnectDeny => "CONNECT_DENY",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_identifiers() {
        assert_eq!(StatusKind::ServerUp.as_str(), "SERVER_UP");
        assert_eq!(StatusKind::DataResync.as_str(), "DATA_RESYNC");
        assert_eq!(
            StatusKind::MessageSizeLimitExceeded.as_str(),
            "MESSAGE_SIZE_LIMIT_EXCEEDED"
        );
        assert_eq!(StatusKind::ConnectDeny.to_string(), "CONNECT_DENY");
    }
}
