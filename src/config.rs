use crate::cluster::AddressTable;
use http::{HeaderName, HeaderValue};
use std::time::Duration;

/// Reconnect policy applied after the Quick Reconnect phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// A fixed delay of `time_interval` between attempts.
    ConstantWindowBackoff,
    /// Exponentially growing, jittered delays truncated at `max_delay`.
    #[default]
    TruncatedExponentialBackoff,
}

/// Configuration for the reconnect schedule.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of Quick Reconnect attempts. 0 skips the Quick phase.
    pub quick_max_retries: u32,
    /// Base delay of the Quick Reconnect phase.
    pub quick_initial_delay: Duration,
    /// Policy applied once the Quick phase is exhausted.
    pub policy: ReconnectPolicy,
    /// Time interval of the steady reconnect schedule.
    pub time_interval: Duration,
    /// Cap on the delay computed by [`ReconnectPolicy::TruncatedExponentialBackoff`].
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            quick_max_retries: 3,
            quick_initial_delay: Duration::from_secs(5),
            policy: ReconnectPolicy::default(),
            time_interval: Duration::from_secs(20),
            max_delay: Duration::from_secs(360),
        }
    }
}

/// Connection-establishment settings.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for opening the transport to one server.
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Keepalive settings for mid-session drop detection.
#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    /// Interval between pings on an idle connection.
    pub ping_interval: Duration,
    /// How long to wait for a pong before counting a failure.
    pub pong_timeout: Duration,
    /// Consecutive pong failures before the connection is declared dead.
    pub failure_threshold: u32,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(20),
            pong_timeout: Duration::from_secs(10),
            failure_threshold: 3,
        }
    }
}

/// Client configuration. Built with [`ClientConfig::builder`], validated at
/// build time: a malformed server address or an inconsistent numeric option
/// fails synchronously with [`ConfigError`] and is never retried.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The parsed cluster definition.
    pub servers: AddressTable,
    /// Whether to open encrypted (TLS) connections.
    pub encryption: bool,
    /// Authorization token gating subscribe/publish/connect.
    pub entitlement_token: Option<String>,
    /// Token for offline delivery channels, forwarded to the server verbatim.
    pub external_token: Option<String>,
    /// Consecutive failed connection attempts before a SERVER_DOWN
    /// notification is raised.
    pub servers_down_before_notify: u32,
    /// Reconnect schedule settings.
    pub reconnect: ReconnectConfig,
    /// Connection-establishment settings.
    pub connection: ConnectionConfig,
    /// Keepalive settings.
    pub keepalive: KeepaliveConfig,
    /// Custom request headers sent with every transport open.
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl ClientConfig {
    /// Create a new builder for configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    servers: Vec<String>,
    encryption: bool,
    entitlement_token: Option<String>,
    external_token: Option<String>,
    servers_down_before_notify: Option<u32>,
    reconnect: ReconnectConfig,
    connection: ConnectionConfig,
    keepalive: KeepaliveConfig,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl ClientConfigBuilder {
    /// Set the cluster definition: `"host:port"` strings, each optionally
    /// prefixed with a weight in `0..=100` (`"50 host:port"`).
    pub fn servers<S: Into<String>, I: IntoIterator<Item = S>>(mut self, servers: I) -> Self {
        self.servers = servers.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable TLS encryption (default off).
    pub fn encryption(mut self, enabled: bool) -> Self {
        self.encryption = enabled;
        self
    }

    /// Set the entitlement token.
    pub fn entitlement_token(mut self, token: impl Into<String>) -> Self {
        self.entitlement_token = Some(token.into());
        self
    }

    /// Set the external token for offline delivery channels.
    pub fn external_token(mut self, token: impl Into<String>) -> Self {
        self.external_token = Some(token.into());
        self
    }

    /// Number of consecutive failed attempts before SERVER_DOWN (default 1).
    pub fn servers_down_before_notify(mut self, n: u32) -> Self {
        self.servers_down_before_notify = Some(n);
        self
    }

    /// Maximum number of Quick Reconnect retries (default 3).
    pub fn quick_reconnect_max_retries(mut self, retries: u32) -> Self {
        self.reconnect.quick_max_retries = retries;
        self
    }

    /// Base delay of the Quick Reconnect phase (default 5s).
    pub fn quick_reconnect_initial_delay(mut self, delay: Duration) -> Self {
        self.reconnect.quick_initial_delay = delay;
        self
    }

    /// Reconnect policy after the Quick phase (default truncated exponential).
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect.policy = policy;
        self
    }

    /// Time interval of the steady reconnect schedule (default 20s).
    pub fn reconnect_time_interval(mut self, interval: Duration) -> Self {
        self.reconnect.time_interval = interval;
        self
    }

    /// Maximum delay for truncated exponential backoff (default 360s).
    pub fn reconnect_max_delay(mut self, delay: Duration) -> Self {
        self.reconnect.max_delay = delay;
        self
    }

    /// Timeout for opening the transport (default 10s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connection.connect_timeout = timeout;
        self
    }

    /// Set keepalive settings.
    pub fn keepalive(mut self, keepalive: KeepaliveConfig) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Add a custom request header sent with every transport open.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Build the configuration with validation.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let servers = AddressTable::parse(&self.servers)?;

        if self.reconnect.max_delay < self.reconnect.time_interval {
            return Err(ConfigError::InvalidReconnect(
                "max_delay must be >= time_interval".to_string(),
            ));
        }
        if self.reconnect.quick_max_retries > 0 && self.reconnect.quick_initial_delay.is_zero() {
            return Err(ConfigError::InvalidReconnect(
                "quick_initial_delay must be > 0 when quick retries are enabled".to_string(),
            ));
        }
        if self.keepalive.pong_timeout > self.keepalive.ping_interval {
            return Err(ConfigError::InvalidKeepalive(
                "pong_timeout should be <= ping_interval".to_string(),
            ));
        }

        Ok(ClientConfig {
            servers,
            encryption: self.encryption,
            entitlement_token: self.entitlement_token,
            external_token: self.external_token,
            servers_down_before_notify: self.servers_down_before_notify.unwrap_or(1),
            reconnect: self.reconnect,
            connection: self.connection,
            keepalive: self.keepalive,
            headers: self.headers,
        })
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// A server address string could not be parsed.
    #[error("Invalid server address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
    /// The server list is empty.
    #[error("Server list is empty")]
    EmptyServerList,
    /// Inconsistent reconnect settings.
    #[error("Invalid reconnect configuration: {0}")]
    InvalidReconnect(String),
    /// Inconsistent keepalive settings.
    #[error("Invalid keepalive configuration: {0}")]
    InvalidKeepalive(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ClientConfig::builder()
            .servers(["p1.example.com:8800"])
            .build()
            .expect("valid config");

        assert!(!config.encryption);
        assert_eq!(config.servers_down_before_notify, 1);
        assert_eq!(config.reconnect.quick_max_retries, 3);
        assert_eq!(config.reconnect.quick_initial_delay, Duration::from_secs(5));
        assert_eq!(config.reconnect.time_interval, Duration::from_secs(20));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(360));
        assert_eq!(
            config.reconnect.policy,
            ReconnectPolicy::TruncatedExponentialBackoff
        );
    }

    #[test]
    fn test_builder_rejects_bad_address() {
        let result = ClientConfig::builder()
            .servers(["p1.example.com:8800", "150 p2.example.com:8800"])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_empty_server_list() {
        assert!(ClientConfig::builder().build().is_err());
    }

    #[test]
    fn test_builder_rejects_inconsistent_reconnect() {
        let result = ClientConfig::builder()
            .servers(["a:1"])
            .reconnect_time_interval(Duration::from_secs(60))
            .reconnect_max_delay(Duration::from_secs(30))
            .build();
        assert!(result.is_err());
    }
}
