use crate::backoff::BackoffScheduler;
use crate::cluster::{ServerEntry, ServerSelector};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::health::Keepalive;
use crate::listener::Listener;
use crate::message::Message;
use crate::metrics::Metrics;
use crate::protocol::Frame;
use crate::publish::PublishTracker;
use crate::registry::{Subscription, SubscriptionRegistry};
use crate::status::StatusKind;
use crate::sync::{RecoveryOutcome, SyncTracker};
use crate::transport::{Transport, TransportConn, TransportError, WebSocketTransport};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Commands from the client handle to the connection driver.
#[derive(Debug)]
enum Command {
    Connect,
    Subscribe(Vec<Subscription>),
    Unsubscribe(Vec<String>),
    Publish(Message),
    Pause,
    Resume,
    Dispose,
}

/// Events from the driver to the delivery task.
#[derive(Debug)]
enum Event {
    Message(Message),
    Status(StatusKind, String),
}

/// A pub/sub client maintaining one live connection to a server of the
/// cluster.
///
/// All lifecycle work happens on an internal driver task that serializes
/// every state transition: server selection, transport opens, backoff
/// timers, subscription replay, and recovery classification. Handle methods
/// enqueue commands for the driver and never block on the network.
///
/// Listener callbacks fire on a dedicated delivery task, so a slow listener
/// delays only its own messages, never reconnection.
///
/// Must be created within a tokio runtime.
pub struct ClusterClient {
    command_tx: mpsc::UnboundedSender<Command>,
    subjects: Arc<RwLock<Vec<String>>>,
    metrics: Arc<Metrics>,
    /// Joined on dispose; None after the first dispose.
    tasks: Mutex<Option<(JoinHandle<()>, JoinHandle<()>)>>,
}

impl ClusterClient {
    /// Create a client using the default persistent-socket transport.
    pub fn new<L: Listener>(config: ClientConfig, listener: L) -> Self {
        Self::with_transport(config, listener, WebSocketTransport::new())
    }

    /// Create a client with a custom transport implementation.
    pub fn with_transport<L: Listener, T: Transport>(
        config: ClientConfig,
        listener: L,
        transport: T,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let subjects = Arc::new(RwLock::new(Vec::new()));
        let metrics = Arc::new(Metrics::new());

        let delivery = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                match event {
                    Event::Message(message) => listener.on_message(message),
                    Event::Status(status, detail) => listener.on_status(status, detail),
                }
            }
        });

        let driver = Driver {
            selector: ServerSelector::new(config.servers.clone()),
            backoff: BackoffScheduler::new(
                config.reconnect.clone(),
                transport.low_latency_failure_detection(),
            ),
            config,
            transport,
            command_rx,
            events_tx,
            registry: SubscriptionRegistry::new(),
            sync: SyncTracker::new(),
            publishes: PublishTracker::new(),
            metrics: metrics.clone(),
            subjects: subjects.clone(),
            pending_publishes: Vec::new(),
            failed_attempts: 0,
            had_session: false,
        };
        let driver = tokio::spawn(driver.run());

        Self {
            command_tx,
            subjects,
            metrics,
            tasks: Mutex::new(Some((driver, delivery))),
        }
    }

    /// Start connecting to the cluster. Also cancels a pending backoff timer
    /// if called while a reconnect delay is running, retrying immediately.
    pub fn connect(&self) -> Result<(), Error> {
        self.send(Command::Connect)
    }

    /// Subscribe to one or more subjects.
    pub fn subscribe<S: Into<String>, I: IntoIterator<Item = S>>(
        &self,
        subjects: I,
    ) -> Result<(), Error> {
        self.send(Command::Subscribe(
            subjects
                .into_iter()
                .map(|s| Subscription::new(s))
                .collect(),
        ))
    }

    /// Subscribe with server-side conflation. `conflation_millis` is rounded
    /// down to a multiple of 100; 0 disables conflation.
    pub fn subscribe_with_conflation<S: Into<String>, I: IntoIterator<Item = S>>(
        &self,
        subjects: I,
        conflation_millis: u64,
    ) -> Result<(), Error> {
        self.send(Command::Subscribe(
            subjects
                .into_iter()
                .map(|s| Subscription::new(s).with_conflation(conflation_millis))
                .collect(),
        ))
    }

    /// Subscribe requesting a one-time backfill of up to `history_count`
    /// historical messages per subject.
    pub fn subscribe_with_history<S: Into<String>, I: IntoIterator<Item = S>>(
        &self,
        subjects: I,
        history_count: u32,
    ) -> Result<(), Error> {
        self.send(Command::Subscribe(
            subjects
                .into_iter()
                .map(|s| Subscription::new(s).with_history(history_count))
                .collect(),
        ))
    }

    /// Unsubscribe from one or more subjects.
    pub fn unsubscribe<S: Into<String>, I: IntoIterator<Item = S>>(
        &self,
        subjects: I,
    ) -> Result<(), Error> {
        self.send(Command::Unsubscribe(
            subjects.into_iter().map(Into::into).collect(),
        ))
    }

    /// Publish a message. With a closure set the publish is tracked and
    /// acknowledged by exactly one `PUBLISH_*` status notification; without
    /// one it is fire-and-forget. Queued while not connected.
    pub fn publish(&self, message: Message) -> Result<(), Error> {
        self.send(Command::Publish(message))
    }

    /// Close the connection deliberately, retaining subscriptions and
    /// recovery state. No reconnect timer runs while paused.
    pub fn pause(&self) -> Result<(), Error> {
        self.send(Command::Pause)
    }

    /// Reconnect after [`Self::pause`], following the normal recovery path:
    /// messages published during the pause are recovered per subject where
    /// the server cache still covers them.
    pub fn resume(&self) -> Result<(), Error> {
        self.send(Command::Resume)
    }

    /// Tear the client down: close the transport, cancel timers, release
    /// state. Idempotent and safe to call from any state; no status
    /// notification or reconnection occurs after it returns.
    pub async fn dispose(&self) {
        let _ = self.command_tx.send(Command::Dispose);
        let tasks = self.tasks.lock().take();
        if let Some((driver, delivery)) = tasks {
            let _ = driver.await;
            let _ = delivery.await;
        }
    }

    /// The currently subscribed subjects.
    pub fn subjects(&self) -> Vec<String> {
        self.subjects.read().clone()
    }

    /// Counters for observability.
    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    fn send(&self, command: Command) -> Result<(), Error> {
        self.command_tx.send(command).map_err(|_| Error::Disposed)
    }
}

/// Where the driver goes next. `Connected` carries the open session.
enum State<C> {
    Disconnected,
    Connecting,
    AwaitingBackoff,
    Connected(C, ServerEntry),
    Paused,
    Disposed,
}

/// Owns all mutable client state and serializes every transition.
struct Driver<T: Transport> {
    config: ClientConfig,
    selector: ServerSelector,
    backoff: BackoffScheduler,
    transport: T,
    command_rx: mpsc::UnboundedReceiver<Command>,
    events_tx: mpsc::UnboundedSender<Event>,
    registry: SubscriptionRegistry,
    sync: SyncTracker,
    publishes: PublishTracker,
    metrics: Arc<Metrics>,
    subjects: Arc<RwLock<Vec<String>>>,
    /// Publishes issued while not connected, flushed on the next
    /// `Connected` transition.
    pending_publishes: Vec<Message>,
    /// Consecutive failed attempts since the last successful connection.
    failed_attempts: u32,
    /// Whether a prior connected session existed (recovery classification
    /// only applies from the second connection on).
    had_session: bool,
}

impl<T: Transport> Driver<T> {
    async fn run(mut self) {
        let mut state: State<T::Conn> = State::Disconnected;
        loop {
            state = match state {
                State::Disconnected => self.run_disconnected().await,
                State::Connecting => self.run_connecting().await,
                State::AwaitingBackoff => self.run_backoff().await,
                State::Connected(conn, server) => self.run_connected(conn, server).await,
                State::Paused => self.run_paused().await,
                State::Disposed => break,
            };
        }
        debug!("Client disposed");
    }

    /// Initial state: nothing runs until `connect()`.
    async fn run_disconnected(&mut self) -> State<T::Conn> {
        loop {
            match self.command_rx.recv().await {
                Some(Command::Connect) => return State::Connecting,
                Some(Command::Dispose) | None => return State::Disposed,
                Some(Command::Pause) | Some(Command::Resume) => {}
                Some(cmd) => self.apply_registry_command(cmd),
            }
        }
    }

    /// Deliberately offline: registry and sync records retained, no timer.
    async fn run_paused(&mut self) -> State<T::Conn> {
        loop {
            match self.command_rx.recv().await {
                Some(Command::Resume) | Some(Command::Connect) => return State::Connecting,
                Some(Command::Dispose) | None => return State::Disposed,
                Some(Command::Pause) => {}
                Some(cmd) => self.apply_registry_command(cmd),
            }
        }
    }

    /// One connection attempt against a freshly selected server.
    async fn run_connecting(&mut self) -> State<T::Conn> {
        let server = self.selector.select().clone();
        let encrypted = self.config.encryption;
        let headers = self.config.headers.clone();
        let connect_timeout = self.config.connection.connect_timeout;

        debug!("Connecting to {} (attempt after {} failures)", server, self.failed_attempts);

        // Commands arriving mid-attempt are deferred so the attempt itself
        // stays cancellable only by dispose/pause.
        enum Attempt<C> {
            Finished(Result<Result<C, TransportError>, tokio::time::error::Elapsed>),
            Disposed,
            Paused,
        }

        let mut deferred = Vec::new();
        let attempt = {
            let open_fut = tokio::time::timeout(
                connect_timeout,
                self.transport.open(&server, encrypted, &headers),
            );
            tokio::pin!(open_fut);
            loop {
                tokio::select! {
                    result = &mut open_fut => break Attempt::Finished(result),
                    cmd = self.command_rx.recv() => match cmd {
                        Some(Command::Dispose) | None => break Attempt::Disposed,
                        Some(Command::Pause) => break Attempt::Paused,
                        Some(cmd) => deferred.push(cmd),
                    },
                }
            }
        };
        for cmd in deferred {
            self.apply_registry_command(cmd);
        }

        let result = match attempt {
            Attempt::Finished(result) => result,
            Attempt::Disposed => return State::Disposed,
            Attempt::Paused => return State::Paused,
        };

        match result {
            Ok(Ok(mut conn)) => match self.establish_session(&mut conn, &server).await {
                Ok(()) => State::Connected(conn, server),
                Err(e) => {
                    conn.close().await;
                    self.on_connection_failure(&server, &e.to_string());
                    State::AwaitingBackoff
                }
            },
            Ok(Err(e)) => {
                self.on_connection_failure(&server, &e.to_string());
                State::AwaitingBackoff
            }
            Err(_) => {
                self.on_connection_failure(&server, "connect timeout");
                State::AwaitingBackoff
            }
        }
    }

    /// Post-open handshake and replay: Connect frame, subscription replay
    /// with resume points, queued publish flush, SERVER_UP.
    async fn establish_session(
        &mut self,
        conn: &mut T::Conn,
        server: &ServerEntry,
    ) -> Result<(), TransportError> {
        conn.send(Frame::Connect {
            entitlement_token: self.config.entitlement_token.clone(),
            external_token: self.config.external_token.clone(),
        })
        .await?;

        let is_reconnect = self.had_session;
        if is_reconnect {
            let subscribed = self.registry.subjects();
            self.sync.arm(subscribed.iter().map(String::as_str));
        }

        for sub in self.registry.iter() {
            let resume = if is_reconnect {
                self.sync.resume_point(&sub.subject)
            } else {
                None
            };
            conn.send(Frame::Subscribe {
                subject: sub.subject.clone(),
                conflation_millis: sub.conflation_millis,
                history_count: sub.history_count,
                resume,
            })
            .await?;
        }

        let queued = std::mem::take(&mut self.pending_publishes);
        for message in queued {
            self.send_publish(conn, message).await?;
        }

        self.backoff.reset();
        self.failed_attempts = 0;
        self.metrics.record_connection();
        if is_reconnect {
            self.metrics.record_reconnection();
        }
        self.had_session = true;

        info!("Connected to {}", server);
        self.notify(StatusKind::ServerUp, server.address());
        Ok(())
    }

    /// Single failure path for handshake failures and mid-session drops.
    fn on_connection_failure(&mut self, server: &ServerEntry, reason: &str) {
        self.metrics.record_connect_failure();
        self.failed_attempts += 1;
        warn!(
            "Connection to {} failed: {} (consecutive failures: {})",
            server, reason, self.failed_attempts
        );
        if self.failed_attempts >= self.config.servers_down_before_notify {
            self.notify(StatusKind::ServerDown, server.address());
        }
        // Tracked publishes can no longer be acknowledged by this session.
        self.fail_pending_publishes();
    }

    /// Wait out the reconnect delay, still serving commands.
    async fn run_backoff(&mut self) -> State<T::Conn> {
        let delay = self.backoff.next_delay();
        debug!("Reconnecting in {:?}", delay);
        let timer = tokio::time::sleep(delay);
        tokio::pin!(timer);
        loop {
            tokio::select! {
                _ = &mut timer => return State::Connecting,
                cmd = self.command_rx.recv() => match cmd {
                    Some(Command::Dispose) | None => return State::Disposed,
                    Some(Command::Pause) => return State::Paused,
                    // A fresh connect() cancels the pending timer.
                    Some(Command::Connect) => return State::Connecting,
                    Some(Command::Resume) => {}
                    Some(cmd) => self.apply_registry_command(cmd),
                },
            }
        }
    }

    /// Connected session loop: frames, commands, keepalive.
    async fn run_connected(&mut self, mut conn: T::Conn, server: ServerEntry) -> State<T::Conn> {
        let mut keepalive = Keepalive::new(self.config.keepalive.clone());
        let server_gone = loop {
            tokio::select! {
                incoming = conn.next_frame() => match incoming {
                    Some(Ok(frame)) => {
                        if let Err(e) = self
                            .handle_frame(&mut conn, &mut keepalive, &server, frame)
                            .await
                        {
                            break e.to_string();
                        }
                    }
                    Some(Err(e)) => break e.to_string(),
                    None => break "connection closed by server".to_string(),
                },
                cmd = self.command_rx.recv() => match cmd {
                    Some(Command::Dispose) | None => {
                        conn.close().await;
                        return State::Disposed;
                    }
                    Some(Command::Pause) => {
                        info!("Pausing: closing connection, retaining subscriptions");
                        self.fail_pending_publishes();
                        conn.close().await;
                        return State::Paused;
                    }
                    Some(Command::Connect) | Some(Command::Resume) => {}
                    Some(cmd) => {
                        if let Err(e) = self.handle_live_command(&mut conn, cmd).await {
                            break e.to_string();
                        }
                    }
                },
                _ = tokio::time::sleep(keepalive.next_deadline()) => {
                    if keepalive.check_and_record_pong_timeout() {
                        warn!("Pong timeout (failures: {})", keepalive.consecutive_failures());
                        if keepalive.is_dead() {
                            break "keepalive failure".to_string();
                        }
                    }
                    if keepalive.should_send_ping() {
                        if let Err(e) = conn.send(Frame::Ping).await {
                            break e.to_string();
                        }
                        keepalive.record_ping_sent();
                    }
                }
            }
        };

        // Mid-session drop: same failure path as a handshake failure.
        conn.close().await;
        self.on_connection_failure(&server, &server_gone);
        State::AwaitingBackoff
    }

    /// Registry/publish commands while not connected: queued, never failed.
    fn apply_registry_command(&mut self, cmd: Command) {
        match cmd {
            Command::Subscribe(subs) => {
                for sub in subs {
                    self.registry.insert(sub);
                }
                self.sync_subjects();
            }
            Command::Unsubscribe(subjects) => {
                for subject in &subjects {
                    self.registry.remove(subject);
                    self.sync.forget(subject);
                }
                self.sync_subjects();
            }
            Command::Publish(message) => self.pending_publishes.push(message),
            // Lifecycle commands are handled by the state loops.
            Command::Connect | Command::Resume | Command::Pause | Command::Dispose => {}
        }
    }

    /// Registry/publish commands while connected: applied and sent live.
    async fn handle_live_command(
        &mut self,
        conn: &mut T::Conn,
        cmd: Command,
    ) -> Result<(), TransportError> {
        match cmd {
            Command::Subscribe(subs) => {
                for sub in subs {
                    trace!("Subscribing to {}", sub.subject);
                    conn.send(Frame::Subscribe {
                        subject: sub.subject.clone(),
                        conflation_millis: sub.conflation_millis,
                        history_count: sub.history_count,
                        resume: None,
                    })
                    .await?;
                    self.registry.insert(sub);
                }
                self.sync_subjects();
            }
            Command::Unsubscribe(subjects) => {
                for subject in subjects {
                    if self.registry.remove(&subject) {
                        self.sync.forget(&subject);
                        conn.send(Frame::Unsubscribe { subject }).await?;
                    }
                }
                self.sync_subjects();
            }
            Command::Publish(message) => self.send_publish(conn, message).await?,
            Command::Connect | Command::Resume | Command::Pause | Command::Dispose => {}
        }
        Ok(())
    }

    async fn send_publish(
        &mut self,
        conn: &mut T::Conn,
        message: Message,
    ) -> Result<(), TransportError> {
        if let Some(closure) = message.closure() {
            // Registered before the transport hand-off so the ack can never
            // race the entry.
            self.publishes.register(closure, message.subject());
        }
        self.metrics.record_message_published();
        conn.send(Frame::Publish { message }).await
    }

    async fn handle_frame(
        &mut self,
        conn: &mut T::Conn,
        keepalive: &mut Keepalive,
        server: &ServerEntry,
        frame: Frame,
    ) -> Result<(), TransportError> {
        match frame {
            Frame::Ping => conn.send(Frame::Pong).await?,
            Frame::Pong => keepalive.record_pong_received(),
            Frame::ConnectAck { accepted } => {
                let status = if accepted {
                    StatusKind::ConnectOk
                } else {
                    StatusKind::ConnectDeny
                };
                self.notify(status, server.address());
            }
            Frame::SubscribeAck { subject, allowed } => {
                let status = if allowed {
                    StatusKind::SubscribeAllow
                } else {
                    StatusKind::SubscribeDeny
                };
                self.notify(status, subject);
            }
            Frame::SubjectSync {
                subject,
                epoch,
                first_available_seq,
            } => {
                match self.sync.classify(&subject, epoch, first_available_seq) {
                    Some(RecoveryOutcome::FullSync) => {
                        self.metrics.record_data_sync();
                        self.notify(StatusKind::DataSync, subject);
                    }
                    Some(RecoveryOutcome::Resync) => {
                        self.metrics.record_data_resync();
                        self.notify(StatusKind::DataResync, subject);
                    }
                    None => trace!("Sync confirmation for {} needs no classification", subject),
                }
            }
            Frame::Data { message } => {
                if !self.registry.contains(message.subject()) {
                    // Unsubscribe raced an in-flight delivery.
                    trace!("Dropping message for unsubscribed {}", message.subject());
                    return Ok(());
                }
                if SyncTracker::tracks(message.message_type()) {
                    self.sync.observe(
                        message.subject(),
                        message.epoch(),
                        message.seq(),
                        message.qos(),
                    );
                }
                self.metrics.record_message_received();
                self.deliver(message);
            }
            Frame::PublishAck { closure, outcome } => {
                if let Some(status) = self.publishes.resolve(&closure, outcome) {
                    if status != StatusKind::PublishOk {
                        self.metrics.record_publish_failure();
                    }
                    self.notify(status, closure);
                }
            }
            other => debug!("Ignoring unexpected frame from server: {:?}", other),
        }
        Ok(())
    }

    fn fail_pending_publishes(&mut self) {
        for (closure, status) in self.publishes.fail_all() {
            self.metrics.record_publish_failure();
            self.notify(status, closure);
        }
    }

    fn sync_subjects(&self) {
        *self.subjects.write() = self.registry.subjects();
    }

    fn notify(&self, status: StatusKind, detail: String) {
        let _ = self.events_tx.send(Event::Status(status, detail));
    }

    fn deliver(&self, message: Message) {
        let _ = self.events_tx.send(Event::Message(message));
    }
}
