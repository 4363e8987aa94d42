//! HTTP server implementation
//!
//! Serves static files from an allow-list captured at startup. The accept
//! loop runs on the calling thread and hands every connection to its own
//! thread, so a slow client never blocks new connections. Each connection
//! carries exactly one request and one response.

use super::session::{from_tcp_stream, is_interrupted, poll_fd, PollEvents, ReadPolicy};
use super::statics::{ResourceResolver, StaticFiles};
use super::{latin1, Error, HttpMessage, Request, Response, Result, PRODUCT};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often the accept loop checks for shutdown while idle
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Body sent with every 404 response
pub const NOT_FOUND_BODY: &str = "Not found";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind_addr: SocketAddr,
    /// Directory whose files are served
    pub static_root: PathBuf,
    /// Listen backlog
    pub backlog: i32,
    /// Read and write timeout per connection
    pub read_timeout: Option<Duration>,
    /// Largest request accepted
    pub max_request_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            static_root: PathBuf::from("static"),
            backlog: 1,
            read_timeout: Some(Duration::from_secs(10)),
            max_request_size: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Create a configuration for `bind_addr` serving `static_root`
    pub fn new(bind_addr: SocketAddr, static_root: impl Into<PathBuf>) -> Self {
        ServerConfig {
            bind_addr,
            static_root: static_root.into(),
            ..Default::default()
        }
    }

    /// Set the listen backlog
    pub fn backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Set the per-connection timeout
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the largest request accepted
    pub fn max_request_size(mut self, max: usize) -> Self {
        self.max_request_size = max;
        self
    }
}

/// Stops a running accept loop
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Ask the server to stop accepting connections
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown was requested
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Static-file HTTP server
pub struct Server {
    config: ServerConfig,
    resolver: Arc<dyn ResourceResolver>,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Create a server, snapshotting the files in the static root
    pub fn new(config: ServerConfig) -> Result<Self> {
        let files = StaticFiles::load(&config.static_root)?;
        info!(root = %config.static_root.display(), files = files.len(), "Serving static files");
        Ok(Self::with_resolver(config, Arc::new(files)))
    }

    /// Create a server with a custom resolver
    pub fn with_resolver(config: ServerConfig, resolver: Arc<dyn ResourceResolver>) -> Self {
        Server {
            config,
            resolver,
            shutdown: ShutdownHandle::default(),
        }
    }

    /// Get a handle that stops `serve` and `run`
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Bind the listening socket
    pub fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.bind_addr;
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(self.config.backlog)?;
        Ok(socket.into())
    }

    /// Bind and serve until shutdown
    pub fn run(&self) -> Result<()> {
        let listener = self.bind()?;
        self.serve(listener)
    }

    /// Accept connections on `listener` until shutdown
    ///
    /// Returns after the listener is closed and every in-flight handler has
    /// finished; handlers are never cancelled. A failure polling the listener
    /// is returned only after the handlers are joined.
    pub fn serve(&self, listener: TcpListener) -> Result<()> {
        info!(addr = %listener.local_addr()?, "Server started");

        let mut handlers: Vec<JoinHandle<()>> = Vec::new();
        let mut outcome = Ok(());

        while !self.should_stop() {
            match poll_fd(listener.as_raw_fd(), PollEvents::Read, Some(ACCEPT_POLL_INTERVAL)) {
                Ok(true) => {}
                Ok(false) => continue,
                // Signal: re-check for shutdown
                Err(e) if is_interrupted(&e) => continue,
                Err(e) => {
                    warn!(error = %e, "Polling the listener failed");
                    outcome = Err(e);
                    break;
                }
            }

            let (stream, peer) = match listener.accept() {
                Ok(conn) => conn,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_listener_fatal(&e) => {
                    warn!(error = %e, "Listener can no longer accept");
                    outcome = Err(e.into());
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    continue;
                }
            };
            debug!(peer = %peer, "Received connection");

            handlers.retain(|h| !h.is_finished());
            match self.spawn_handler(stream, peer) {
                Ok(handle) => handlers.push(handle),
                Err(e) => warn!(peer = %peer, error = %e, "Cannot spawn handler"),
            }
        }

        drop(listener);
        info!(in_flight = handlers.len(), "Server stopping");

        for handle in handlers {
            if handle.join().is_err() {
                warn!("Connection handler panicked");
            }
        }

        outcome
    }

    fn should_stop(&self) -> bool {
        self.shutdown.is_triggered() || crate::signal::interrupted()
    }

    fn spawn_handler(&self, stream: TcpStream, peer: SocketAddr) -> io::Result<JoinHandle<()>> {
        let resolver = Arc::clone(&self.resolver);
        let timeout = self.config.read_timeout;
        let max_request_size = self.config.max_request_size;

        thread::Builder::new()
            .name(format!("conn-{}", peer))
            .spawn(move || {
                match handle_client(stream, peer, resolver.as_ref(), timeout, max_request_size) {
                    Ok(()) => {}
                    Err(Error::ConnectionClosed) => {
                        debug!(peer = %peer, "Client closed before sending a request")
                    }
                    Err(e) => warn!(peer = %peer, error = %e, "Connection handler failed"),
                }
            })
    }
}

/// Accept errors after which the listener never accepts again
fn is_listener_fatal(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EBADF | libc::EINVAL | libc::ENOTSOCK | libc::EOPNOTSUPP)
    )
}

/// Build the response for a request
///
/// A resolved resource becomes `200 OK` with its content; anything the
/// resolver rejects becomes `404 Not found`. Reason phrases come from
/// `reason_phrase`.
pub fn respond(resolver: &dyn ResourceResolver, request: &Request) -> Response {
    match resolver.resolve(request.path()) {
        Ok(content) => Response::builder()
            .status_code(200)
            .header("Server", PRODUCT)
            .body(content)
            .build(),
        Err(e) => {
            debug!(path = request.path(), error = %e, "Resource not served");
            Response::builder()
                .status_code(404)
                .header("Server", PRODUCT)
                .body(NOT_FOUND_BODY)
                .build()
        }
    }
}

/// Serve one connection: read a request, answer it and close
pub fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    resolver: &dyn ResourceResolver,
    timeout: Option<Duration>,
    max_request_size: usize,
) -> Result<()> {
    let mut session = from_tcp_stream(stream);
    session.set_timeout(timeout);
    session.set_max_message_size(max_request_size);

    debug!(peer = %peer, "Reading the request");
    let raw = session.read_message(ReadPolicy::SERVER)?;

    let mut request = Request::new();
    request.unmarsh(&latin1::decode(&raw))?;

    if let Some((declared, actual)) = request.content_length_mismatch() {
        warn!(peer = %peer, declared = %declared, actual, "Request body does not match Content-Length");
    }

    let response = respond(resolver, &request);
    let sent = session.write_message(&response);
    if sent.is_ok() {
        if let Err(e) = session.close() {
            debug!(peer = %peer, error = %e, "Close after response failed");
        }
    }

    info!(
        peer = %peer,
        status = response.status_code(),
        method = request.method(),
        path = request.path(),
        reason = response.status_message(),
        "({}) [{}] {} {} - {}",
        peer,
        response.status_code(),
        request.method(),
        request.path(),
        response.status_message()
    );

    sent.map(|_| ())
}
