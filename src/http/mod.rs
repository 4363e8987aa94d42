//! HTTP/1.1 message model and socket mechanics for Apollo
//!
//! This module provides a minimal HTTP/1.1 client and a static-file server.
//! Every exchange is single-shot: one request, one response, then the
//! connection is closed.
//!
//! # Architecture
//!
//! - `HttpMessage` is the capability shared by `Request` and `Response`:
//!   `marsh` turns a message into wire bytes, `unmarsh` parses raw text back.
//! - `HttpSession` wraps a `SessionOps` transport and decides when a message
//!   read from the socket is complete (see `ReadPolicy`).
//! - `HttpClient` performs one request/response round-trip per call.
//! - `Server` accepts connections and serves files from a startup-time
//!   allow-list, one thread per connection.
//!
//! Text on the wire is Latin-1 in both directions, so arbitrary bytes survive
//! a trip through the `String`-based message model unchanged.
//!
//! # Examples
//!
//! ```no_run
//! use apollo::http::{HttpClient, HttpMessage, Request};
//!
//! let mut request = Request::new();
//! request.headers_mut().insert("Host", "example.com");
//!
//! let response = HttpClient::new().send(&request).unwrap();
//! assert_eq!(response.status_code(), 200);
//! ```

pub mod body;
pub mod client;
pub mod headers;
pub mod latin1;
pub mod message;
pub mod parser;
pub mod server;
pub mod session;
pub mod statics;
pub mod url;

pub use client::{get, post, Connector, HttpClient, TcpConnector};
pub use headers::Headers;
pub use message::{HttpMessage, Request, Response, ResponseBuilder};
pub use server::{Server, ServerConfig, ShutdownHandle};
pub use session::{FdSessionOps, HttpSession, ReadPolicy, SessionOps};
pub use statics::{ResourceResolver, StaticFiles};

use std::path::PathBuf;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed start line, header line or missing header terminator
    #[error("Parse error: {0}")]
    Parse(String),

    /// A request is missing Host, method or version
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    /// Requested static resource is not servable
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cannot read {}: {source}", path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error came from the transport rather than message content
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::Connection(_) | Error::Timeout | Error::ConnectionClosed
        )
    }
}

/// Maximum number of headers per message
pub const MAX_HEADERS: usize = 64;

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// CRLF line ending
pub const CRLF: &str = "\r\n";

/// Protocol version sent by default
pub const HTTP_11: &str = "HTTP/1.1";

/// Value of the `Server` and `User-Agent` headers
pub const PRODUCT: &str = "Apollo";
