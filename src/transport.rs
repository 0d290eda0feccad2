use crate::cluster::ServerEntry;
use crate::protocol::Frame;
use futures_util::{SinkExt, StreamExt};
use http::{HeaderName, HeaderValue};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpSocket, TcpStream};
use tokio_tungstenite::{
    client_async_tls_with_config, tungstenite::client::IntoClientRequest,
    tungstenite::Message as WsMessage, Connector, MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

/// Transport-level failures. Absorbed by the connection state machine and
/// surfaced to the application only as status notifications.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// WebSocket protocol error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection could not be established.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// A frame could not be encoded or decoded.
    #[error("Frame codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Opens connections to cluster servers.
///
/// Implementations are collaborators: the state machine decides *when* and
/// *to which server* to connect; the transport decides *how* bytes move.
pub trait Transport: Send + Sync + 'static {
    /// The connected-session type produced by [`Transport::open`].
    type Conn: TransportConn;

    /// Open a connection to one server. Asynchronous; the caller applies its
    /// own connect timeout.
    fn open(
        &self,
        server: &ServerEntry,
        encrypted: bool,
        headers: &[(HeaderName, HeaderValue)],
    ) -> impl Future<Output = Result<Self::Conn, TransportError>> + Send;

    /// Whether this transport detects connection failure with low latency.
    ///
    /// Legacy polling transports detect drops only after tens of seconds;
    /// for those the reconnect scheduler floors computed delays at 10s.
    fn low_latency_failure_detection(&self) -> bool {
        true
    }
}

/// One open connection.
pub trait TransportConn: Send + 'static {
    /// Send a frame.
    fn send(&mut self, frame: Frame) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receive the next frame. `None` means the peer closed the connection
    /// cleanly; an error means it dropped.
    fn next_frame(&mut self)
        -> impl Future<Output = Option<Result<Frame, TransportError>>> + Send;

    /// Close the connection. Best-effort.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// The default persistent-socket transport: WebSocket over TCP, optionally
/// TLS-encrypted, with frames encoded as JSON text messages.
#[derive(Debug, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    type Conn = WebSocketConn;

    fn open(
        &self,
        server: &ServerEntry,
        encrypted: bool,
        headers: &[(HeaderName, HeaderValue)],
    ) -> impl Future<Output = Result<Self::Conn, TransportError>> + Send {
        async move {
            let scheme = if encrypted { "wss" } else { "ws" };
            let url = format!("{}://{}:{}/", scheme, server.host, server.port);

            let mut request = url
                .as_str()
                .into_client_request()
                .map_err(|e| TransportError::Connect(format!("Invalid request: {e}")))?;
            for (name, value) in headers {
                request.headers_mut().insert(name.clone(), value.clone());
            }

            debug!("Opening {} (headers={})", url, headers.len());

            let tcp_stream = connect_tcp(&server.host, server.port).await?;
            set_tcp_options(&tcp_stream);

            let connector = if encrypted {
                let tls = native_tls::TlsConnector::new()
                    .map_err(|e| TransportError::Connect(format!("TLS error: {e}")))?;
                Some(Connector::NativeTls(tls))
            } else {
                None
            };

            let (ws, _response) =
                client_async_tls_with_config(request, tcp_stream, None, connector)
                    .await
                    .map_err(TransportError::WebSocket)?;

            Ok(WebSocketConn { ws })
        }
    }
}

/// A connected WebSocket session.
pub struct WebSocketConn {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TransportConn for WebSocketConn {
    fn send(&mut self, frame: Frame) -> impl Future<Output = Result<(), TransportError>> + Send {
        async move {
            let message = encode_frame(&frame)?;
            self.ws.send(message).await.map_err(TransportError::WebSocket)
        }
    }

    fn next_frame(
        &mut self,
    ) -> impl Future<Output = Option<Result<Frame, TransportError>>> + Send {
        async move {
            loop {
                let message = match self.ws.next().await? {
                    Ok(m) => m,
                    Err(e) => return Some(Err(TransportError::WebSocket(e))),
                };
                match decode_message(message) {
                    Decoded::Frame(result) => return Some(result),
                    Decoded::Closed => return None,
                    Decoded::Skip => continue,
                }
            }
        }
    }

    fn close(&mut self) -> impl Future<Output = ()> + Send {
        async move {
            let _ = self.ws.close(None).await;
        }
    }
}

#[derive(Debug)]
enum Decoded {
    Frame(Result<Frame, TransportError>),
    Closed,
    Skip,
}

fn encode_frame(frame: &Frame) -> Result<WsMessage, TransportError> {
    Ok(match frame {
        // Keepalive probes ride on native WebSocket ping/pong frames.
        Frame::Ping => WsMessage::Ping(b"keepalive".to_vec()),
        Frame::Pong => WsMessage::Pong(b"keepalive".to_vec()),
        other => WsMessage::Text(serde_json::to_string(other)?),
    })
}

fn decode_message(message: WsMessage) -> Decoded {
    match message {
        WsMessage::Text(text) => {
            Decoded::Frame(serde_json::from_str(&text).map_err(TransportError::Codec))
        }
        WsMessage::Binary(bytes) => {
            Decoded::Frame(serde_json::from_slice(&bytes).map_err(TransportError::Codec))
        }
        WsMessage::Ping(_) => Decoded::Frame(Ok(Frame::Ping)),
        WsMessage::Pong(_) => Decoded::Frame(Ok(Frame::Pong)),
        WsMessage::Close(_) => Decoded::Closed,
        WsMessage::Frame(_) => Decoded::Skip,
    }
}

/// Connect to `host:port`, preferring the first resolved address.
async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream, TransportError> {
    let dest = format!("{host}:{port}");
    let dest_addr: SocketAddr = tokio::net::lookup_host(&dest)
        .await
        .map_err(|e| TransportError::Connect(format!("DNS lookup failed: {e}")))?
        .next()
        .ok_or_else(|| TransportError::Connect(format!("No addresses found for {host}")))?;

    let socket = if dest_addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(|e| TransportError::Connect(format!("Failed to create socket: {e}")))?;

    socket
        .connect(dest_addr)
        .await
        .map_err(|e| TransportError::Connect(format!("TCP connect to {dest_addr} failed: {e}")))
}

/// TCP options for low-latency delivery.
fn set_tcp_options(stream: &TcpStream) {
    let sock = socket2::SockRef::from(stream);

    // Disable Nagle's algorithm.
    let _ = sock.set_nodelay(true);

    // Keepalive to detect dead connections below the protocol pings.
    let keepalive = socket2::TcpKeepalive::new()
        .with_time(Duration::from_secs(30))
        .with_interval(Duration::from_secs(10));
    let _ = sock.set_tcp_keepalive(&keepalive);
}
