//! HTTP message types
//!
//! `Request` and `Response` share framing through the `HttpMessage` trait;
//! they differ only in what the three start-line fields mean.

use super::parser::{self, MessageParts, StartLine};
use super::{latin1, Error, Headers, Result, CRLF, HTTP_11, PRODUCT};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::path::Path;

/// Header kept in step with the body
const CONTENT_LENGTH: &str = "Content-Length";

/// Capability shared by requests and responses
pub trait HttpMessage {
    /// The three start-line fields, in wire order
    fn start_line(&self) -> StartLine;

    /// Get the headers
    fn headers(&self) -> &Headers;

    /// Get mutable headers
    fn headers_mut(&mut self) -> &mut Headers;

    /// Get the raw body
    fn body(&self) -> &str;

    /// Replace start line, headers and body together
    ///
    /// Implementations validate the start line before touching any field,
    /// so a failed call leaves the message unchanged.
    fn apply(&mut self, parts: MessageParts) -> Result<()>;

    /// Convert the message to wire format
    ///
    /// Setting a body through `set_body` or the builder records its
    /// `Content-Length`, so such messages go out exactly as stored. A body
    /// that arrived without one, through `unmarsh`, gets a `Content-Length`
    /// emitted after the other headers.
    fn marsh(&self) -> Bytes {
        let [first, second, third] = self.start_line();
        let headers = self.headers();
        let body = self.body();
        let mut buf = BytesMut::with_capacity(128 + body.len());

        // Start line
        latin1::encode_into(&format!("{} {} {}{}", first, second, third, CRLF), &mut buf);

        // Headers
        for (name, value) in headers.iter() {
            latin1::encode_into(&format!("{}: {}{}", name, value, CRLF), &mut buf);
        }
        if !body.is_empty() && !headers.contains_ignore_case(CONTENT_LENGTH) {
            let len = latin1::encoded_len(body);
            latin1::encode_into(&format!("{}: {}{}", CONTENT_LENGTH, len, CRLF), &mut buf);
        }

        // Empty line
        buf.put_slice(CRLF.as_bytes());

        // Body
        latin1::encode_into(body, &mut buf);

        buf.freeze()
    }

    /// Parse raw message text into this message
    ///
    /// On error the message is left exactly as it was.
    fn unmarsh(&mut self, raw: &str) -> Result<()> {
        let parts = parser::parse_message(raw)?;
        self.apply(parts)
    }

    /// Declared `Content-Length` and actual body length, when they disagree
    ///
    /// An unparsable declared length also counts as a mismatch.
    fn content_length_mismatch(&self) -> Option<(String, usize)> {
        let declared = self.headers().get(CONTENT_LENGTH)?;
        let actual = latin1::encoded_len(self.body());
        match declared.parse::<usize>() {
            Ok(n) if n == actual => None,
            _ => Some((declared.to_string(), actual)),
        }
    }
}

/// Record the encoded length of `body`, or drop the header for an empty body
fn sync_content_length(headers: &mut Headers, body: &str) {
    if body.is_empty() {
        headers.remove(CONTENT_LENGTH);
    } else {
        headers.insert(CONTENT_LENGTH, latin1::encoded_len(body).to_string());
    }
}

/// Write the `> `-prefixed transcript of a message
fn write_transcript(f: &mut fmt::Formatter<'_>, message: &impl HttpMessage) -> fmt::Result {
    let [first, second, third] = message.start_line();
    writeln!(f, "> {} {} {}", first, second, third)?;
    for (name, value) in message.headers().iter() {
        writeln!(f, "> {}: {}", name, value)?;
    }
    writeln!(f)?;
    write!(f, "{}", message.body())
}

/// HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    path: String,
    version: String,
    headers: Headers,
    body: String,
}

impl Request {
    /// Create a request for `GET /` with the default headers
    pub fn new() -> Self {
        let mut headers = Headers::new();
        headers.insert("User-Agent", PRODUCT);
        headers.insert("Connection", "close");

        Request {
            method: "GET".to_string(),
            path: "/".to_string(),
            version: HTTP_11.to_string(),
            headers,
            body: String::new(),
        }
    }

    /// Load a raw request saved on disk
    ///
    /// The file is read as Latin-1 and parsed with `unmarsh`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|source| Error::File {
            path: path.to_path_buf(),
            source,
        })?;
        let mut request = Request::new();
        request.unmarsh(&latin1::decode(&raw))?;
        Ok(request)
    }

    /// Get the request method
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Set the request method
    pub fn set_method(&mut self, method: impl Into<String>) {
        self.method = method.into();
    }

    /// Get the request path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Set the request path
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    /// Get the HTTP version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Set the HTTP version
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    /// Set the body and its `Content-Length`
    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
        sync_content_length(&mut self.headers, &self.body);
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpMessage for Request {
    fn start_line(&self) -> StartLine {
        [self.method.clone(), self.path.clone(), self.version.clone()]
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    fn body(&self) -> &str {
        &self.body
    }

    fn apply(&mut self, parts: MessageParts) -> Result<()> {
        let [method, path, version] = parts.start_line;

        if version.contains(' ') {
            return Err(Error::Parse(format!(
                "Invalid request line: expected 3 fields in '{} {} {}'",
                method, path, version
            )));
        }

        self.method = method;
        self.path = path;
        self.version = version;
        self.headers = parts.headers;
        self.body = parts.body;
        Ok(())
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_transcript(f, self)
    }
}

/// HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    version: String,
    status_code: u16,
    status_message: String,
    headers: Headers,
    body: String,
}

impl Response {
    /// Create an empty `200 OK` response
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for constructing responses
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::default()
    }

    /// Get the HTTP version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get the status code
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Set the status code
    pub fn set_status_code(&mut self, code: u16) {
        self.status_code = code;
    }

    /// Get the status message
    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    /// Set the status message
    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    /// Set the body and its `Content-Length`
    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
        sync_content_length(&mut self.headers, &self.body);
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpMessage for Response {
    fn start_line(&self) -> StartLine {
        [
            self.version.clone(),
            self.status_code.to_string(),
            self.status_message.clone(),
        ]
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    fn body(&self) -> &str {
        &self.body
    }

    fn apply(&mut self, parts: MessageParts) -> Result<()> {
        let [version, code, message] = parts.start_line;

        let status_code = code
            .parse::<u16>()
            .ok()
            .filter(|c| (100..600).contains(c))
            .ok_or_else(|| Error::Parse(format!("Invalid status code: {}", code)))?;

        self.version = version;
        self.status_code = status_code;
        self.status_message = message;
        self.headers = parts.headers;
        self.body = parts.body;
        Ok(())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_transcript(f, self)
    }
}

/// Canonical reason phrase for a status code
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Builder for HTTP responses
///
/// Every field has a default: status `200`, the canonical reason phrase for
/// the chosen status, no headers and an empty body.
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    status_code: Option<u16>,
    status_message: Option<String>,
    headers: Headers,
    body: String,
}

impl ResponseBuilder {
    /// Set the status code
    pub fn status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Set the status message
    pub fn status_message(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Build the response
    ///
    /// A non-empty body gets a `Content-Length` unless one was given.
    pub fn build(self) -> Response {
        let status_code = self.status_code.unwrap_or(200);
        let status_message = self
            .status_message
            .unwrap_or_else(|| reason_phrase(status_code).to_string());

        let mut headers = self.headers;
        if !headers.contains_ignore_case(CONTENT_LENGTH) {
            sync_content_length(&mut headers, &self.body);
        }

        Response {
            version: HTTP_11.to_string(),
            status_code,
            status_message,
            headers,
            body: self.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_text(message: &impl HttpMessage) -> String {
        latin1::decode(&message.marsh())
    }

    #[test]
    fn test_request_defaults() {
        let req = Request::new();
        assert_eq!(req.method(), "GET");
        assert_eq!(req.path(), "/");
        assert_eq!(req.version(), "HTTP/1.1");
        assert_eq!(req.headers().get("User-Agent"), Some("Apollo"));
        assert_eq!(req.headers().get("Connection"), Some("close"));
        assert_eq!(req.body(), "");
    }

    #[test]
    fn test_instances_do_not_share_headers() {
        let mut a = Request::new();
        let b = Request::new();
        a.headers_mut().insert("Host", "example.com");

        assert_eq!(a.headers().get("Host"), Some("example.com"));
        assert_eq!(b.headers().get("Host"), None);
    }

    #[test]
    fn test_request_to_wire() {
        let mut req = Request::new();
        req.headers_mut().insert("Host", "example.com");

        assert_eq!(
            wire_text(&req),
            "GET / HTTP/1.1\r\nUser-Agent: Apollo\r\nConnection: close\r\nHost: example.com\r\n\r\n"
        );
    }

    #[test]
    fn test_builder_records_content_length() {
        let resp = Response::builder().body("caf\u{e9}").build();
        let wire = resp.marsh();

        assert_eq!(resp.headers().get("Content-Length"), Some("4"));
        assert!(wire_text(&resp).contains("Content-Length: 4\r\n"));
        assert!(wire.ends_with(b"\r\n\r\ncaf\xe9"));
    }

    #[test]
    fn test_set_body_tracks_content_length() {
        let mut req = Request::new();
        req.set_body("a=1");
        assert_eq!(req.headers().get("Content-Length"), Some("3"));

        req.set_body("a=1&b=2");
        assert_eq!(req.headers().get("Content-Length"), Some("7"));
        assert_eq!(wire_text(&req).matches("Content-Length").count(), 1);

        req.set_body("");
        assert!(!req.headers().contains("Content-Length"));
        assert!(wire_text(&req).ends_with("Connection: close\r\n\r\n"));
    }

    #[test]
    fn test_marsh_fills_in_missing_content_length() {
        let mut resp = Response::new();
        resp.unmarsh("HTTP/1.1 200 OK\r\nServer: Apollo\r\n\r\nbody").unwrap();

        assert_eq!(
            wire_text(&resp),
            "HTTP/1.1 200 OK\r\nServer: Apollo\r\nContent-Length: 4\r\n\r\nbody"
        );
        assert!(!resp.headers().contains("Content-Length"));
    }

    #[test]
    fn test_explicit_content_length_kept() {
        let resp = Response::builder()
            .header("Content-Length", "99")
            .body("short")
            .build();

        let wire = wire_text(&resp);
        assert!(wire.contains("Content-Length: 99\r\n"));
        assert_eq!(wire.matches("Content-Length").count(), 1);
    }

    #[test]
    fn test_no_content_length_for_empty_body() {
        let wire = wire_text(&Response::new());
        assert_eq!(wire, "HTTP/1.1 200 OK\r\n\r\n");
    }

    #[test]
    fn test_request_round_trip() {
        let mut req = Request::new();
        req.set_method("POST");
        req.set_path("/submit");
        req.headers_mut().insert("Host", "localhost");
        req.set_body("a=1\r\n\r\nb=\u{ff}\n");
        assert_eq!(req.headers().get("Content-Length"), Some("11"));

        let mut parsed = Request::new();
        parsed.unmarsh(&latin1::decode(&req.marsh())).unwrap();

        assert_eq!(parsed, req);
    }

    #[test]
    fn test_request_round_trip_keeps_headers() {
        let mut req = Request::new();
        req.set_method("POST");
        req.headers_mut().insert("Host", "localhost");
        req.set_body("a=1");

        let mut parsed = Request::new();
        parsed.unmarsh(&latin1::decode(&req.marsh())).unwrap();

        assert_eq!(parsed.headers(), req.headers());
        assert_eq!(parsed.body(), "a=1");
    }

    #[test]
    fn test_response_round_trip() {
        let resp = Response::builder()
            .status_code(404)
            .header("Server", "Apollo")
            .body("Not found")
            .build();

        let mut parsed = Response::new();
        parsed.unmarsh(&latin1::decode(&resp.marsh())).unwrap();

        assert_eq!(parsed, resp);
    }

    #[test]
    fn test_response_unmarsh() {
        let mut resp = Response::new();
        resp.unmarsh("HTTP/1.0 404 Not found\r\nServer: Apollo\r\n\r\nNot found")
            .unwrap();

        assert_eq!(resp.version(), "HTTP/1.0");
        assert_eq!(resp.status_code(), 404);
        assert_eq!(resp.status_message(), "Not found");
        assert_eq!(resp.headers().get("Server"), Some("Apollo"));
        assert_eq!(resp.body(), "Not found");
    }

    #[test]
    fn test_failed_unmarsh_leaves_message_untouched() {
        let mut resp = Response::builder().body("keep").build();
        let before = resp.clone();

        assert!(matches!(
            resp.unmarsh("HTTP/1.1 abc OK\r\nX: y\r\n\r\nnew body"),
            Err(Error::Parse(_))
        ));
        assert!(resp.unmarsh("HTTP/1.1 200 OK\r\nX: y\r\n").is_err());
        assert_eq!(resp, before);

        let mut req = Request::new();
        assert!(matches!(
            req.unmarsh("GET / HTTP/1.1 extra\r\n\r\n"),
            Err(Error::Parse(_))
        ));
        assert_eq!(req, Request::new());
    }

    #[test]
    fn test_unmarsh_replaces_default_headers() {
        let mut req = Request::new();
        req.unmarsh("GET /a HTTP/1.1\r\nHost: h\r\n\r\n").unwrap();

        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.headers().get("User-Agent"), None);
    }

    #[test]
    fn test_content_length_mismatch() {
        let mut resp = Response::new();
        resp.unmarsh("HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort").unwrap();
        assert_eq!(resp.content_length_mismatch(), Some(("10".to_string(), 5)));

        resp.unmarsh("HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nshort").unwrap();
        assert_eq!(resp.content_length_mismatch(), None);

        resp.unmarsh("HTTP/1.1 200 OK\r\n\r\nshort").unwrap();
        assert_eq!(resp.content_length_mismatch(), None);
    }

    #[test]
    fn test_response_builder() {
        let resp = Response::builder()
            .status_code(404)
            .header("Server", "Apollo")
            .body("Not found")
            .build();

        assert_eq!(resp.status_code(), 404);
        assert_eq!(resp.status_message(), "Not found");
        assert_eq!(resp.version(), "HTTP/1.1");
        assert_eq!(resp.body(), "Not found");

        let resp = Response::builder()
            .status_code(200)
            .status_message("Fine")
            .build();
        assert_eq!(resp.status_message(), "Fine");
    }

    #[test]
    fn test_transcript() {
        let resp = Response::builder()
            .header("Server", "Apollo")
            .body("<h1>hi</h1>")
            .build();

        assert_eq!(
            resp.to_string(),
            "> HTTP/1.1 200 OK\n> Server: Apollo\n> Content-Length: 11\n\n<h1>hi</h1>"
        );
    }

    #[test]
    fn test_request_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.txt");
        std::fs::write(&path, "GET /about HTTP/1.1\nHost: example.com\n\n").unwrap();

        let req = Request::from_file(&path).unwrap();
        assert_eq!(req.path(), "/about");
        assert_eq!(req.headers().get("Host"), Some("example.com"));

        assert!(matches!(
            Request::from_file(dir.path().join("missing.txt")),
            Err(Error::File { .. })
        ));
    }
}
