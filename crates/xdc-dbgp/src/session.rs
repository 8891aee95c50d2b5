//! DBGp session: connection lifecycle and the request/response cycle.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpSocket, TcpStream, ToSocketAddrs};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::command::{quote_argument, Command};
use crate::error::DbgpError;
use crate::property::PropertyFetcher;
use crate::protocol;
use crate::response::StatusInfo;
use crate::transport::Transport;
use crate::xml::{parse_document, Element};

/// Default DBGp port engines connect back to.
pub const DEFAULT_PORT: u16 = 9000;

/// How long a single `accept()` waits before the stop flag is checked again.
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The current state of a debug session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, or the accept loop was abandoned before any connection.
    Idle,
    /// Waiting for the engine to connect.
    Listening,
    /// An engine is connected.
    Connected,
    /// Torn down by [`DbgpSession::clear`].
    Closed,
}

/// Per-session transaction id counter.
///
/// Ids are pre-incremented, so the first id issued is 1.
#[derive(Debug, Default)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Allocate the next id.
    pub fn next(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }

    /// The last id issued, 0 before the first.
    pub fn last(&self) -> u64 {
        self.0
    }

    fn reset(&mut self) {
        self.0 = 0;
    }
}

/// Shared view on a session's accept loop, usable while `listen()` is
/// pending.
#[derive(Debug, Clone, Default)]
pub struct ListenHandle {
    stop: Arc<AtomicBool>,
    listening: Arc<AtomicBool>,
}

impl ListenHandle {
    /// Ask the accept loop to give up at its next poll.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Whether the accept loop is currently running.
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn begin(&self) {
        self.stop.store(false, Ordering::SeqCst);
        self.listening.store(true, Ordering::SeqCst);
    }

    fn end(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }
}

/// One connection to a debugger engine.
///
/// The protocol is strictly half-duplex: every [`send`](Self::send) must be
/// followed by one [`read`](Self::read) before the next command.
#[derive(Debug)]
pub struct DbgpSession {
    port: u16,
    transport: Option<Transport<TcpStream>>,
    state: SessionState,
    transaction_id: TransactionId,
    pending: Option<u64>,
    handle: ListenHandle,
    accept_poll: Duration,
}

impl DbgpSession {
    /// Create an idle session that will listen on `port`.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            transport: None,
            state: SessionState::Idle,
            transaction_id: TransactionId::default(),
            pending: None,
            handle: ListenHandle::default(),
            accept_poll: ACCEPT_POLL_INTERVAL,
        }
    }

    /// Override the accept poll interval.
    pub fn with_accept_poll(mut self, interval: Duration) -> Self {
        self.accept_poll = interval;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn is_listening(&self) -> bool {
        self.state == SessionState::Listening
    }

    /// A handle for stopping a pending `listen()` from another task.
    pub fn listen_handle(&self) -> ListenHandle {
        self.handle.clone()
    }

    /// The last transaction id issued.
    pub fn last_transaction_id(&self) -> u64 {
        self.transaction_id.last()
    }

    /// Listen on the configured port and accept exactly one engine.
    ///
    /// Returns `Ok(None)` when the accept loop was stopped through the
    /// [`ListenHandle`] before an engine connected; the session is idle again.
    pub async fn listen(&mut self) -> Result<Option<SocketAddr>, DbgpError> {
        self.require_disconnected("listen")?;

        let socket = TcpSocket::new_v4()?;
        socket.set_reuseaddr(true)?;
        socket.bind(SocketAddr::from(([0, 0, 0, 0], self.port)))?;
        let listener = socket.listen(1)?;

        info!("listening for debugger engine on port {}", self.port);
        self.state = SessionState::Listening;
        self.handle.begin();

        let accepted = loop {
            if self.handle.stop_requested() {
                break Ok(None);
            }
            match timeout(self.accept_poll, listener.accept()).await {
                Ok(Ok(conn)) => break Ok(Some(conn)),
                Ok(Err(e)) => break Err(DbgpError::Connection(e)),
                Err(_elapsed) => continue,
            }
        };
        self.handle.end();

        match accepted {
            Ok(Some((stream, addr))) => {
                info!("debugger engine connected from {addr}");
                self.attach(stream);
                Ok(Some(addr))
            }
            Ok(None) => {
                debug!("stopped listening on port {}", self.port);
                self.state = SessionState::Idle;
                Ok(None)
            }
            Err(e) => {
                self.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    /// Actively connect to an engine at `addr`.
    pub async fn connect(&mut self, addr: impl ToSocketAddrs) -> Result<(), DbgpError> {
        self.require_disconnected("connect")?;
        let stream = TcpStream::connect(addr).await?;
        if let Ok(peer) = stream.peer_addr() {
            info!("connected to debugger engine at {peer}");
        }
        self.attach(stream);
        Ok(())
    }

    fn attach(&mut self, stream: TcpStream) {
        self.transport = Some(Transport::new(stream));
        self.state = SessionState::Connected;
    }

    /// Encode `command` with the next transaction id and write it.
    ///
    /// Returns the transaction id used.
    pub async fn send(&mut self, command: &Command) -> Result<u64, DbgpError> {
        if let Some(id) = self.pending {
            return Err(DbgpError::InvalidState(format!(
                "response to transaction {id} has not been read"
            )));
        }
        let transport = self.transport.as_mut().ok_or(DbgpError::NotConnected)?;
        let id = self.transaction_id.next();
        let line = command.encode(id);
        transport.write_command(line.as_bytes()).await?;
        debug!("[Send command] {line}");
        self.pending = Some(id);
        Ok(id)
    }

    /// Read one response and parse it as an XML document.
    pub async fn read(&mut self) -> Result<Element, DbgpError> {
        let expected = self.pending;
        let text = self.read_text().await?;
        let root = parse_document(&text)?;
        if let (Some(expected), Some(got)) =
            (expected, StatusInfo::from_element(&root).transaction_id)
        {
            if expected != got {
                warn!("response for transaction {got} while waiting for {expected}");
            }
        }
        Ok(root)
    }

    /// Read one response and return the raw payload text.
    pub async fn read_text(&mut self) -> Result<String, DbgpError> {
        let transport = self.transport.as_mut().ok_or(DbgpError::NotConnected)?;
        self.pending = None;
        let payload = transport.read_frame().await?;
        let text = String::from_utf8_lossy(&payload).into_owned();
        debug!("[Response data] {text}");
        Ok(text)
    }

    /// Send a command and read its response.
    pub async fn request(&mut self, command: &Command) -> Result<Element, DbgpError> {
        self.send(command).await?;
        self.read().await
    }

    /// Reset every field and close the socket.
    ///
    /// Safe to call in any state, any number of times.
    pub fn clear(&mut self) {
        if self.transport.take().is_some() {
            debug!("closed debugger engine connection");
        }
        self.handle.stop();
        self.handle.end();
        self.pending = None;
        self.transaction_id.reset();
        self.state = SessionState::Closed;
    }

    fn require_disconnected(&self, op: &str) -> Result<(), DbgpError> {
        match self.state {
            SessionState::Idle | SessionState::Closed => Ok(()),
            other => Err(DbgpError::InvalidState(format!(
                "cannot {op}: session is {other:?}"
            ))),
        }
    }
}

impl PropertyFetcher for DbgpSession {
    async fn fetch_property(
        &mut self,
        fullname: &str,
        max_children: Option<usize>,
    ) -> Result<Element, DbgpError> {
        if let Some(limit) = max_children {
            let cap = Command::new(protocol::FEATURE_SET)
                .flag("n", protocol::FEATURE_MAX_CHILDREN)
                .flag("v", limit);
            self.request(&cap).await?;
        }
        let get = Command::new(protocol::PROPERTY_GET).flag("n", quote_argument(fullname));
        self.request(&get).await
    }
}
