use crate::config::ConfigError;
use crate::transport::TransportError;
use thiserror::Error;

/// Errors surfaced by the client API.
///
/// Connection failures are deliberately absent: the state machine recovers
/// from them autonomously and reports them as status notifications, never as
/// errors. Entitlement denials and publish rejections are notifications too.
/// What remains is what the application must fix itself: bad configuration,
/// and calls into a disposed client.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed server address or inconsistent option values. Fails
    /// synchronously at configuration time, never retried.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A transport-level failure reported from an explicit transport call.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The client was disposed; no further operations are possible.
    #[error("Client has been disposed")]
    Disposed,
}
