use crate::message::Message;
use crate::status::StatusKind;

/// Application callback interface for messages and status notifications.
///
/// Exactly one listener is registered per client instance. Callbacks fire on
/// a dedicated delivery task, serialized with respect to each other but
/// asynchronous to the connection lifecycle: a slow listener delays only its
/// own messages, never timer firing or reconnection.
pub trait Listener: Send + Sync + 'static {
    /// A message arrived for a subscribed subject.
    fn on_message(&self, message: Message);

    /// A status notification. `detail` carries the server address, subject,
    /// or publish closure the notification refers to; use
    /// [`StatusKind::as_str`] where the stable string identifier is needed.
    fn on_status(&self, status: StatusKind, detail: String);
}
