//! Session operations and message framing on the socket
//!
//! `SessionOps` abstracts the transport so the HTTP layer can run over a
//! plain TCP stream or a scripted test double. `HttpSession` adds a poll
//! based timeout and the read-termination policy that decides when a
//! message has fully arrived.
//!
//! There is no length-based framing on read. A message ends when the
//! transport says so, according to one of two policies:
//!
//! - `ReadPolicy::UntilShortRead` stops at the first read that returns fewer
//!   bytes than the chunk size. A timeout after some data has arrived also
//!   ends the message, which covers requests that are an exact multiple of
//!   the chunk size. Used by the server to read requests.
//! - `ReadPolicy::UntilClose` stops when the peer closes the connection.
//!   Used by the client, which always sends `Connection: close`.
//!
//! Bytes already read are never discarded when the loop stops.

use super::{Error, HttpMessage, Result};
use bytes::BytesMut;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};
use tracing::debug;

/// Chunk size for server-side request reads
pub const SERVER_CHUNK_SIZE: usize = 1024;

/// Chunk size for client-side response reads
pub const CLIENT_CHUNK_SIZE: usize = 4096;

/// Upper bound on the size of one message read by a session
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Session operations trait
///
/// This trait defines the operations that can be performed on a session,
/// abstracting over the transport.
pub trait SessionOps {
    /// Poll the session for events
    ///
    /// Returns true if the session is ready for the requested operation
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool>;

    /// Read data from the session
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write data to the session
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Close the session
    fn close(&mut self) -> Result<()>;
}

/// Poll events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
}

/// When a message read from a session is complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPolicy {
    /// Stop at the first read shorter than `chunk`, or at a timeout once
    /// data has arrived
    UntilShortRead { chunk: usize },
    /// Stop when the peer closes the connection
    UntilClose { chunk: usize },
}

impl ReadPolicy {
    /// Policy used by the server to read a request
    pub const SERVER: ReadPolicy = ReadPolicy::UntilShortRead {
        chunk: SERVER_CHUNK_SIZE,
    };

    /// Policy used by the client to read a response
    pub const CLIENT: ReadPolicy = ReadPolicy::UntilClose {
        chunk: CLIENT_CHUNK_SIZE,
    };

    /// Size of each read
    pub fn chunk_size(&self) -> usize {
        match *self {
            ReadPolicy::UntilShortRead { chunk } | ReadPolicy::UntilClose { chunk } => {
                chunk.max(1)
            }
        }
    }

    /// Whether a read of `n` bytes ends the message
    fn is_last_read(&self, n: usize) -> bool {
        match self {
            ReadPolicy::UntilShortRead { .. } => n < self.chunk_size(),
            ReadPolicy::UntilClose { .. } => false,
        }
    }

    /// Whether a timeout after some data has arrived ends the message
    fn ends_on_timeout(&self) -> bool {
        matches!(self, ReadPolicy::UntilShortRead { .. })
    }
}

/// Poll a raw file descriptor
///
/// A poll interrupted by a signal fails with an `Interrupted` connection
/// error; see `is_interrupted`.
pub fn poll_fd(fd: RawFd, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
    use libc::{poll, pollfd, POLLIN, POLLOUT};

    let mut pfd = pollfd {
        fd,
        events: match events {
            PollEvents::Read => POLLIN,
            PollEvents::Write => POLLOUT,
        },
        revents: 0,
    };

    let timeout_ms = timeout
        .map(|d| d.as_millis().min(i32::MAX as u128) as i32)
        .unwrap_or(-1); // -1 = infinite

    let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

    if result < 0 {
        return Err(Error::Connection(io::Error::last_os_error()));
    }
    if pfd.revents & libc::POLLNVAL != 0 {
        return Err(Error::Connection(io::Error::from_raw_os_error(libc::EBADF)));
    }

    Ok(result > 0)
}

/// Whether an error is a system call interrupted by a signal
pub fn is_interrupted(err: &Error) -> bool {
    matches!(err, Error::Connection(e) if e.kind() == io::ErrorKind::Interrupted)
}

/// HTTP session wrapping a transport with session operations
pub struct HttpSession<S: SessionOps> {
    session: S,
    timeout: Option<Duration>,
    max_message_size: usize,
}

impl<S: SessionOps> HttpSession<S> {
    /// Create a new HTTP session
    pub fn new(session: S) -> Self {
        HttpSession {
            session,
            timeout: Some(Duration::from_secs(10)),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Set the timeout for operations
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Set the largest message `read_message` accepts
    pub fn set_max_message_size(&mut self, max: usize) {
        self.max_message_size = max;
    }

    /// Wait until the session is ready for `events`
    ///
    /// Polls interrupted by a signal are resumed with the time left, so a
    /// signal never shortens the timeout or ends a read early.
    fn wait_ready(&self, events: PollEvents) -> Result<()> {
        let deadline = self.timeout.map(|t| Instant::now() + t);

        loop {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            match self.session.poll(events, remaining) {
                Ok(true) => return Ok(()),
                Ok(false) => return Err(Error::Timeout),
                Err(e) if is_interrupted(&e) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Read data with timeout
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.wait_ready(PollEvents::Read)?;
        self.session.read(buf)
    }

    /// Write data with timeout
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.wait_ready(PollEvents::Write)?;
        self.session.write(buf)
    }

    /// Write the whole buffer
    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut written = 0;

        while written < buf.len() {
            match self.write(&buf[written..]) {
                Ok(0) => return Err(Error::ConnectionClosed),
                Ok(n) => written += n,
                Err(e) if is_interrupted(&e) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Read one message according to `policy`
    ///
    /// Fails with `Error::ConnectionClosed` if the peer closes before sending
    /// anything, `Error::Timeout` if nothing arrives in time, and
    /// `Error::Protocol` if the message grows beyond the size limit.
    pub fn read_message(&mut self, policy: ReadPolicy) -> Result<BytesMut> {
        let chunk_size = policy.chunk_size();
        let mut message = BytesMut::with_capacity(chunk_size);
        let mut chunk = vec![0u8; chunk_size];

        loop {
            let n = match self.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if is_interrupted(&e) => continue,
                Err(Error::Timeout) if policy.ends_on_timeout() && !message.is_empty() => break,
                Err(e) => return Err(e),
            };

            if n == 0 {
                if message.is_empty() {
                    return Err(Error::ConnectionClosed);
                }
                break;
            }

            message.extend_from_slice(&chunk[..n]);

            if message.len() > self.max_message_size {
                return Err(Error::Protocol(format!(
                    "Message exceeds {} bytes",
                    self.max_message_size
                )));
            }

            if policy.is_last_read(n) {
                break;
            }
        }

        debug!(bytes = message.len(), ?policy, "Read message");
        Ok(message)
    }

    /// Marshal a message and write all of it
    pub fn write_message(&mut self, message: &impl HttpMessage) -> Result<usize> {
        let wire = message.marsh();
        self.write_all(&wire)?;
        debug!(bytes = wire.len(), "Wrote message");
        Ok(wire.len())
    }

    /// Close the session
    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }

    /// Get a reference to the underlying session
    pub fn get_ref(&self) -> &S {
        &self.session
    }
}

/// Plain file descriptor session operations
pub struct FdSessionOps {
    stream: TcpStream,
}

impl FdSessionOps {
    /// Create a new FD session operations from a TCP stream
    pub fn new(stream: TcpStream) -> Self {
        FdSessionOps { stream }
    }

    /// Get a reference to the underlying stream
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

impl SessionOps for FdSessionOps {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        poll_fd(self.stream.as_raw_fd(), events, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).map_err(Error::from)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stream.write(buf).map_err(Error::from)
    }

    fn close(&mut self) -> Result<()> {
        use std::net::Shutdown;
        match self.stream.shutdown(Shutdown::Both) {
            // The peer may already be gone
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other.map_err(Error::from),
        }
    }
}

/// Helper to create an HTTP session from a TCP stream
pub fn from_tcp_stream(stream: TcpStream) -> HttpSession<FdSessionOps> {
    HttpSession::new(FdSessionOps::new(stream))
}
