//! WebSocket connection and event loop.
//!
//! This module owns the socket lifecycle: opening, the open watchdog,
//! reconnect backoff, the outbox and inbound dispatch.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Commands from [`Connection`] handles (connect, disconnect, send)
//! - Results of connect attempts, tagged with a generation number
//! - Incoming frames, handed to the [`Router`]
//! - Reconnect, watchdog and send-retry deadlines
//!
//! Only the event loop touches socket state. A connect attempt or socket
//! from an older generation can never change it again.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::future::pending;
use std::mem;
use std::result::Result as StdResult;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::Handshake;
use crate::router::Router;

use super::backoff::{Backoff, BackoffStep, ReconnectPolicy};
use super::status::StatusReporter;

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No socket and nothing scheduled.
    Disconnected,
    /// A socket is being opened.
    Connecting,
    /// The socket is open and the handshake has been sent.
    Open,
    /// Waiting out a backoff delay before the next attempt.
    Reconnecting,
}

impl ConnectionState {
    /// Returns `true` if frames can be written right now.
    #[inline]
    #[must_use]
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Settings the event loop is spawned with.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionConfig {
    /// Socket URL. Not validated until the first connect attempt.
    pub url: String,
    /// Reconnect timing.
    pub policy: ReconnectPolicy,
    /// Encoded request args sent with the handshake.
    pub request_args: Option<String>,
}

// ============================================================================
// Internal Messages
// ============================================================================

/// Commands for the event loop.
enum ConnectionCommand {
    /// Open a new socket, replacing any current one.
    Connect,
    /// Close the socket without reconnecting.
    Disconnect,
    /// Queue a serialized frame.
    Send(String),
    /// Stop the event loop.
    Shutdown,
}

/// Result of one connect attempt.
struct ConnectAttempt {
    generation: u64,
    result: StdResult<WsStream, WsError>,
}

/// The single socket slot.
enum Socket {
    Idle,
    Connecting(JoinHandle<()>),
    Open { writer: WsWriter, reader: WsReader },
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to the connection event loop.
///
/// The event loop stops on [`Connection::shutdown`] or when this handle is
/// dropped. The loop owns the [`Router`] and its listeners, so a handle
/// reachable from a listener keeps the loop running until shutdown.
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Lifecycle state published by the event loop.
    state_rx: watch::Receiver<ConnectionState>,
    /// Socket URL.
    url: Arc<str>,
}

impl Connection {
    /// Spawns the event loop in the `Disconnected` state.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn spawn(
        config: ConnectionConfig,
        router: Router,
        reporter: StatusReporter,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (attempt_tx, attempt_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let url = Arc::from(config.url.as_str());

        let event_loop = EventLoop {
            backoff: Backoff::new(&config.policy),
            config,
            router,
            reporter,
            command_rx,
            attempt_tx,
            attempt_rx,
            state_tx,
            socket: Socket::Idle,
            generation: 0,
            outbox: VecDeque::new(),
            reconnect_at: None,
            open_check_at: None,
            send_retry_at: None,
        };

        tokio::spawn(event_loop.run());

        Self {
            command_tx,
            state_rx,
            url,
        }
    }

    /// Opens a socket, replacing any current one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the event loop has stopped.
    pub fn connect(&self) -> Result<()> {
        self.command(ConnectionCommand::Connect)
    }

    /// Closes the socket without triggering a reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the event loop has stopped.
    pub fn disconnect(&self) -> Result<()> {
        self.command(ConnectionCommand::Disconnect)
    }

    /// Queues a serialized frame for transmission.
    pub(crate) fn send_text(&self, text: String) -> Result<()> {
        self.command(ConnectionCommand::Send(text))
    }

    /// Stops the event loop.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Returns a receiver that observes state changes.
    #[inline]
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Waits until the connection reaches `state`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the event loop stops first.
    pub async fn wait_for_state(&self, state: ConnectionState) -> Result<()> {
        let mut rx = self.state_rx.clone();
        rx.wait_for(|current| *current == state)
            .await
            .map(|_| ())
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Returns the socket URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn command(&self, command: ConnectionCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| Error::ConnectionClosed)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url)
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// EventLoop
// ============================================================================

struct EventLoop {
    config: ConnectionConfig,
    router: Router,
    reporter: StatusReporter,
    command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
    attempt_tx: mpsc::UnboundedSender<ConnectAttempt>,
    attempt_rx: mpsc::UnboundedReceiver<ConnectAttempt>,
    state_tx: watch::Sender<ConnectionState>,
    socket: Socket,
    generation: u64,
    backoff: Backoff,
    outbox: VecDeque<String>,
    reconnect_at: Option<Instant>,
    open_check_at: Option<Instant>,
    send_retry_at: Option<Instant>,
}

impl EventLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Connect) => self.connect(),
                        Some(ConnectionCommand::Disconnect) => self.disconnect(),
                        Some(ConnectionCommand::Send(text)) => self.enqueue(text).await,
                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            break;
                        }
                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }

                Some(attempt) = self.attempt_rx.recv() => {
                    self.handle_attempt(attempt).await;
                }

                message = next_message(&mut self.socket) => {
                    self.handle_message(message);
                }

                () = sleep_until_deadline(self.reconnect_at) => {
                    self.reconnect_at = None;
                    debug!("Reconnect delay elapsed");
                    self.connect();
                }

                () = sleep_until_deadline(self.open_check_at) => {
                    self.check_open();
                }

                () = sleep_until_deadline(self.send_retry_at) => {
                    self.send_retry_at = None;
                    self.flush_outbox().await;
                }
            }
        }

        self.release_socket();
        self.set_state(ConnectionState::Disconnected);

        if !self.outbox.is_empty() {
            debug!(pending = self.outbox.len(), "Discarding unsent frames");
        }
        debug!("Event loop terminated");
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    fn connect(&mut self) {
        self.release_socket();
        self.reconnect_at = None;
        self.generation += 1;

        let generation = self.generation;
        let url = self.config.url.clone();
        let attempt_tx = self.attempt_tx.clone();

        debug!(generation, url = %url, "Opening socket");

        let handle = tokio::spawn(async move {
            let result = connect_async(url.as_str())
                .await
                .map(|(stream, _response)| stream);
            let _ = attempt_tx.send(ConnectAttempt { generation, result });
        });

        self.socket = Socket::Connecting(handle);
        self.open_check_at = Some(Instant::now() + self.config.policy.open_check_interval());
        self.set_state(ConnectionState::Connecting);

        if !self.outbox.is_empty() {
            self.arm_send_retry();
        }
    }

    fn disconnect(&mut self) {
        // Invalidates any attempt still in flight.
        self.generation += 1;
        self.release_socket();
        self.reconnect_at = None;
        self.open_check_at = None;
        self.send_retry_at = None;
        self.set_state(ConnectionState::Disconnected);

        info!(url = %self.config.url, "Disconnected");
    }

    async fn handle_attempt(&mut self, attempt: ConnectAttempt) {
        if attempt.generation != self.generation {
            trace!(
                generation = attempt.generation,
                current = self.generation,
                "Ignoring stale connect attempt"
            );
            return;
        }

        match attempt.result {
            Ok(stream) => self.on_open(stream).await,
            Err(e) => {
                let error = Error::from(e);
                warn!(%error, url = %self.config.url, "Socket could not be opened");
                self.socket = Socket::Idle;
                self.open_check_at = None;
                self.reporter.report(&Error::OpenFailed);
                self.on_close();
            }
        }
    }

    async fn on_open(&mut self, stream: WsStream) {
        let (writer, reader) = stream.split();
        self.socket = Socket::Open { writer, reader };
        self.open_check_at = None;
        self.backoff.reset(&self.config.policy);
        self.reporter.clear();

        info!(url = %self.config.url, generation = self.generation, "Socket open");

        let handshake = Handshake::new(
            self.router.session_id(),
            self.config.request_args.clone(),
        );
        match handshake.to_text() {
            Ok(text) => {
                if let Err(e) = self.write(text).await {
                    warn!(error = %e, "Failed to send handshake");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode handshake"),
        }

        self.set_state(ConnectionState::Open);
        self.flush_outbox().await;
    }

    /// Close path for every socket loss that was not requested.
    fn on_close(&mut self) {
        self.open_check_at = None;

        match self.backoff.record_close(&self.config.policy) {
            BackoffStep::Retry {
                attempt,
                nominal,
                delay,
            } => {
                info!(
                    attempt,
                    nominal_ms = nominal.as_millis() as u64,
                    delay_ms = delay.as_millis() as u64,
                    "Reconnect scheduled"
                );
                self.reconnect_at = Some(Instant::now() + delay);
                self.set_state(ConnectionState::Reconnecting);
            }

            BackoffStep::Exhausted { attempts } => {
                warn!(attempts, "Reconnect attempts exhausted");
                self.reconnect_at = None;
                self.send_retry_at = None;
                self.set_state(ConnectionState::Disconnected);
                self.reporter.report(&Error::reconnect_exhausted(attempts));
            }
        }
    }

    /// Open watchdog tick.
    ///
    /// Failed attempts report through [`handle_attempt`](Self::handle_attempt)
    /// and clear the tick, so an idle socket here only means polling is over.
    fn check_open(&mut self) {
        match self.socket {
            Socket::Connecting(_) => {
                debug!(url = %self.config.url, "Socket still connecting");
                self.open_check_at =
                    Some(Instant::now() + self.config.policy.open_check_interval());
            }
            Socket::Open { .. } | Socket::Idle => {
                self.open_check_at = None;
            }
        }
    }

    /// Drops the current socket. Open sockets get a close frame in the
    /// background.
    fn release_socket(&mut self) {
        match mem::replace(&mut self.socket, Socket::Idle) {
            Socket::Idle => {}
            Socket::Connecting(handle) => handle.abort(),
            Socket::Open { mut writer, reader } => {
                tokio::spawn(async move {
                    if let Err(e) = writer.close().await {
                        trace!(error = %e, "Close frame not delivered");
                    }
                    drop(reader);
                });
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Connection state changed");
        }
    }

    fn is_open(&self) -> bool {
        matches!(self.socket, Socket::Open { .. })
    }

    // ------------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------------

    fn handle_message(&mut self, message: Option<StdResult<Message, WsError>>) {
        match message {
            Some(Ok(Message::Text(text))) => {
                let outcome = self.router.dispatch(text.as_str());
                trace!(?outcome, "Frame dispatched");
            }

            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "WebSocket closed by remote");
                self.release_socket();
                self.on_close();
            }

            Some(Err(e)) => {
                warn!(error = %e, "WebSocket error");
                self.release_socket();
                self.on_close();
            }

            None => {
                debug!("WebSocket stream ended");
                self.release_socket();
                self.on_close();
            }

            // Ignore Binary, Ping, Pong
            Some(Ok(_)) => {}
        }
    }

    // ------------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------------

    async fn enqueue(&mut self, text: String) {
        self.outbox.push_back(text);

        if self.is_open() {
            self.flush_outbox().await;
        } else {
            trace!(pending = self.outbox.len(), "Socket not open, frame queued");
            self.arm_send_retry();
        }
    }

    /// Writes queued frames in order until the outbox is empty or a write
    /// fails.
    async fn flush_outbox(&mut self) {
        while let Some(text) = self.outbox.front().cloned() {
            if !self.is_open() {
                self.arm_send_retry();
                return;
            }

            match self.write(text).await {
                Ok(()) => {
                    self.outbox.pop_front();
                }
                Err(e) => {
                    warn!(error = %e, pending = self.outbox.len(), "Send failed, will retry");
                    self.arm_send_retry();
                    return;
                }
            }
        }
    }

    fn arm_send_retry(&mut self) {
        if self.send_retry_at.is_some() || *self.state_tx.borrow() == ConnectionState::Disconnected
        {
            return;
        }
        self.send_retry_at = Some(Instant::now() + self.config.policy.send_retry_delay());
    }

    async fn write(&mut self, text: String) -> Result<()> {
        match &mut self.socket {
            Socket::Open { writer, .. } => {
                writer.send(Message::Text(text.into())).await?;
                Ok(())
            }
            _ => Err(Error::ConnectionClosed),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Next frame of the open socket; pends forever otherwise.
async fn next_message(socket: &mut Socket) -> Option<StdResult<Message, WsError>> {
    match socket {
        Socket::Open { reader, .. } => reader.next().await,
        _ => pending().await,
    }
}

/// Sleeps until `deadline`; pends forever when unset.
async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================
