//! # ws-cluster-client
//!
//! A pub/sub client that maintains one live connection to a server of a
//! cluster, with weighted failover and no-loss delivery across reconnections.
//!
//! ## Features
//!
//! - **Weighted server selection** over the cluster definition, memoryless
//!   across reconnections
//! - **Two-phase reconnect backoff**: a burst of quick retries, then a
//!   constant-window or truncated-exponential schedule
//! - **Guaranteed delivery recovery**: per-subject resume from the server
//!   cache, classified as `DATA_SYNC` (gap fully recovered) or `DATA_RESYNC`
//!   (downgraded to latest-retained)
//! - **Subscription replay** on every reconnection, with conflation and
//!   history options
//! - **Tracked publishes** correlated by closure to exactly one `PUBLISH_*`
//!   status notification
//! - **Pause/resume** retaining subscriptions and recovery state
//!
//! ## Example
//!
//! ```ignore
//! use ws_cluster_client::{ClientConfig, ClusterClient, Listener, Message, StatusKind};
//!
//! struct Quotes;
//!
//! impl Listener for Quotes {
//!     fn on_message(&self, message: Message) {
//!         println!("{}: {:?}", message.subject(), message.content());
//!     }
//!     fn on_status(&self, status: StatusKind, detail: String) {
//!         println!("{status} {detail}");
//!     }
//! }
//!
//! let config = ClientConfig::builder()
//!     .servers(["100 p1.example.com:8800", "50 p2.example.com:8800"])
//!     .build()?;
//!
//! let client = ClusterClient::new(config, Quotes);
//! client.connect()?;
//! client.subscribe(["/stocks/NYSE/IBM", "/stocks/Nasdaq/MSFT"])?;
//! ```

mod backoff;
mod cluster;
mod config;
mod error;
mod health;
mod listener;
mod manager;
mod message;
mod metrics;
mod protocol;
mod publish;
mod registry;
mod status;
mod sync;
mod transport;

pub use backoff::BackoffScheduler;
pub use cluster::{AddressTable, ServerEntry, ServerSelector};
pub use config::{
    ClientConfig, ClientConfigBuilder, ConfigError, ConnectionConfig, KeepaliveConfig,
    ReconnectConfig, ReconnectPolicy,
};
pub use error::Error;
pub use listener::Listener;
pub use manager::ClusterClient;
pub use message::{Field, Message, MessageType, QoS};
pub use metrics::{Metrics, MetricsSnapshot};
pub use protocol::{Frame, PublishOutcome, ResumePoint};
pub use registry::Subscription;
pub use status::StatusKind;
pub use sync::{RecoveryOutcome, SyncRecord, SyncTracker};
pub use transport::{Transport, TransportConn, TransportError, WebSocketConn, WebSocketTransport};

// Re-export http types for custom request headers
pub use http::{HeaderName, HeaderValue};

/// Result type for ws-cluster-client operations
pub type Result<T> = std::result::Result<T, Error>;
