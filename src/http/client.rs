//! HTTP client implementation
//!
//! Each `send` opens a fresh connection, writes one request, reads the
//! response until the server closes and then closes its side. There is no
//! connection reuse, retry or TLS.

use super::body::{self, FORM_URLENCODED};
use super::session::{FdSessionOps, HttpSession, ReadPolicy, SessionOps};
use super::url::{split_authority, split_url};
use super::{latin1, Error, Headers, HttpMessage, Request, Response, Result};
use std::net::TcpStream;
use std::time::Duration;
use tracing::{debug, warn};

/// Opens transport sessions to a host
pub trait Connector {
    type Session: SessionOps;

    /// Open a session to `host:port`
    fn connect(&self, host: &str, port: u16) -> Result<Self::Session>;
}

/// Plain TCP connector
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Session = FdSessionOps;

    fn connect(&self, host: &str, port: u16) -> Result<FdSessionOps> {
        let stream = TcpStream::connect((host, port))?;
        debug!(host, port, "Connected");
        Ok(FdSessionOps::new(stream))
    }
}

/// HTTP client
pub struct HttpClient<C: Connector = TcpConnector> {
    connector: C,
    timeout: Option<Duration>,
}

impl HttpClient<TcpConnector> {
    /// Create a client that connects over plain TCP
    pub fn new() -> Self {
        Self::with_connector(TcpConnector)
    }
}

impl Default for HttpClient<TcpConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> HttpClient<C> {
    /// Create a client using a custom connector
    pub fn with_connector(connector: C) -> Self {
        HttpClient {
            connector,
            timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Set the timeout for each read and write
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Get a reference to the connector
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Send a request and return the parsed response
    ///
    /// The `Host` header, method and version must be non-empty; otherwise this
    /// fails with `Error::Protocol` before any connection is attempted.
    pub fn send(&self, request: &Request) -> Result<Response> {
        let host = request
            .headers()
            .get("Host")
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::Protocol("Missing Host header".to_string()))?;
        if request.method().is_empty() {
            return Err(Error::Protocol("Missing method".to_string()));
        }
        if request.version().is_empty() {
            return Err(Error::Protocol("Missing HTTP version".to_string()));
        }

        let (host, port) = split_authority(host)?;
        let mut session = HttpSession::new(self.connector.connect(host, port)?);
        session.set_timeout(self.timeout);

        let exchange = Self::exchange(&mut session, request);
        if let Err(e) = session.close() {
            debug!(error = %e, "Close after exchange failed");
        }
        let raw = exchange?;

        let mut response = Response::new();
        response.unmarsh(&latin1::decode(&raw))?;

        if let Some((declared, actual)) = response.content_length_mismatch() {
            warn!(declared = %declared, actual, "Response body does not match Content-Length");
        }

        Ok(response)
    }

    fn exchange(session: &mut HttpSession<C::Session>, request: &Request) -> Result<Vec<u8>> {
        session.write_message(request)?;
        Ok(session.read_message(ReadPolicy::CLIENT)?.to_vec())
    }

    /// Send a GET request to `url`
    ///
    /// `headers` are merged over the request defaults.
    pub fn get(&self, url: &str, headers: &Headers) -> Result<Response> {
        let request = build_request("GET", url, headers)?;
        self.send(&request)
    }

    /// Send a POST request carrying `fields` to `url`
    ///
    /// `Content-Type` defaults to form encoding; the fields are encoded
    /// according to the effective content type.
    pub fn post<K: AsRef<str>, V: AsRef<str>>(
        &self,
        url: &str,
        headers: &Headers,
        fields: &[(K, V)],
    ) -> Result<Response> {
        let mut request = build_request("POST", url, headers)?;
        if !request.headers().contains("Content-Type") {
            request.headers_mut().insert("Content-Type", FORM_URLENCODED);
        }

        let content_type = request.headers().get("Content-Type").unwrap_or(FORM_URLENCODED);
        let body = body::encode_body(content_type, fields)?;
        request.set_body(body);

        self.send(&request)
    }
}

/// Build a request for `url` with `headers` merged over the defaults
pub fn build_request(method: &str, url: &str, headers: &Headers) -> Result<Request> {
    let target = split_url(url)?;

    let mut request = Request::new();
    request.set_method(method);
    request.set_path(target.path);
    request.headers_mut().insert("Host", target.authority);
    request.headers_mut().merge(headers);

    Ok(request)
}

/// Send a GET request over plain TCP
pub fn get(url: &str, headers: &Headers) -> Result<Response> {
    HttpClient::new().get(url, headers)
}

/// Send a POST request over plain TCP
pub fn post<K: AsRef<str>, V: AsRef<str>>(
    url: &str,
    headers: &Headers,
    fields: &[(K, V)],
) -> Result<Response> {
    HttpClient::new().post(url, headers, fields)
}
