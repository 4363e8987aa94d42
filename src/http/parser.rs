//! HTTP message parsing
//!
//! Splits raw message text into start line, header block and body. Lines may
//! end in CRLF or a bare LF. The header block ends at the first empty line;
//! everything after it is the body, kept verbatim.

use super::{Error, Headers, Result, MAX_HEADERS};

/// Start line split into its three fields
pub type StartLine = [String; 3];

/// A fully parsed message, not yet bound to a request or response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageParts {
    pub start_line: StartLine,
    pub headers: Headers,
    pub body: String,
}

/// Take the next line from `rest`
///
/// Returns the line without its terminator, or None when `rest` holds no
/// complete line.
fn next_line<'a>(rest: &mut &'a str) -> Option<&'a str> {
    let newline = rest.find('\n')?;
    let line = &rest[..newline];
    *rest = &rest[newline + 1..];
    Some(line.strip_suffix('\r').unwrap_or(line))
}

/// Split a start line on single spaces into exactly three fields
///
/// The third field keeps any further spaces, so reason phrases such as
/// `Not found` stay intact.
pub fn parse_start_line(line: &str) -> Result<StartLine> {
    let mut parts = line.splitn(3, ' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), Some(c)) => Ok([a.to_string(), b.to_string(), c.to_string()]),
        _ => Err(Error::Parse(format!(
            "Invalid start line: expected 3 fields, got {}",
            line.split(' ').count()
        ))),
    }
}

/// Parse a raw message
///
/// Fails with `Error::Parse` when the start line has fewer than three fields,
/// a header line has no colon, or no empty line terminates the headers.
pub fn parse_message(raw: &str) -> Result<MessageParts> {
    let mut rest = raw;

    let first = next_line(&mut rest)
        .ok_or_else(|| Error::Parse("Message has no header terminator".to_string()))?;
    let start_line = parse_start_line(first)?;

    let mut headers = Headers::new();
    loop {
        let line = next_line(&mut rest)
            .ok_or_else(|| Error::Parse("Message has no header terminator".to_string()))?;

        if line.is_empty() {
            break;
        }

        let (name, value) = Headers::parse_header_line(line)?;
        headers.insert(name, value);

        if headers.len() > MAX_HEADERS {
            return Err(Error::Parse(format!(
                "Too many headers (max {})",
                MAX_HEADERS
            )));
        }
    }

    Ok(MessageParts {
        start_line,
        headers,
        body: rest.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_line() {
        let fields = parse_start_line("GET /index.html HTTP/1.1").unwrap();
        assert_eq!(fields, ["GET", "/index.html", "HTTP/1.1"]);

        let fields = parse_start_line("HTTP/1.1 404 Not found").unwrap();
        assert_eq!(fields, ["HTTP/1.1", "404", "Not found"]);
    }

    #[test]
    fn test_start_line_with_two_fields() {
        assert!(matches!(
            parse_start_line("GET /"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse_message("GET /\r\nHost: a\r\n\r\n"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_parse_simple_request() {
        let parts = parse_message("GET / HTTP/1.1\r\nHost: example.com\r\n\r\n").unwrap();
        assert_eq!(parts.start_line, ["GET", "/", "HTTP/1.1"]);
        assert_eq!(parts.headers.get("Host"), Some("example.com"));
        assert_eq!(parts.body, "");
    }

    #[test]
    fn test_body_is_verbatim() {
        let raw = "HTTP/1.1 200 OK\r\nServer: Apollo\r\n\r\nline one\r\n\r\nline two";
        let parts = parse_message(raw).unwrap();
        assert_eq!(parts.body, "line one\r\n\r\nline two");
    }

    #[test]
    fn test_bare_lf_line_endings() {
        let raw = "POST /form HTTP/1.1\nHost: localhost\nContent-Length: 3\n\nabc";
        let parts = parse_message(raw).unwrap();
        assert_eq!(parts.start_line, ["POST", "/form", "HTTP/1.1"]);
        assert_eq!(parts.headers.get("Content-Length"), Some("3"));
        assert_eq!(parts.body, "abc");
    }

    #[test]
    fn test_missing_separator() {
        assert!(matches!(
            parse_message("GET / HTTP/1.1\r\nHost: example.com\r\n"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse_message("GET / HTTP/1.1"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(parse_message(""), Err(Error::Parse(_))));
    }

    #[test]
    fn test_header_without_colon() {
        assert!(matches!(
            parse_message("GET / HTTP/1.1\r\nBroken header\r\n\r\n"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_duplicate_headers_last_wins() {
        let parts =
            parse_message("GET / HTTP/1.1\r\nX-Id: 1\r\nX-Id: 2\r\n\r\n").unwrap();
        assert_eq!(parts.headers.len(), 1);
        assert_eq!(parts.headers.get("X-Id"), Some("2"));
    }

    #[test]
    fn test_too_many_headers() {
        let mut raw = String::from("GET / HTTP/1.1\r\n");
        for i in 0..=MAX_HEADERS {
            raw.push_str(&format!("Header-{}: value\r\n", i));
        }
        raw.push_str("\r\n");

        assert!(matches!(parse_message(&raw), Err(Error::Parse(_))));
    }
}
