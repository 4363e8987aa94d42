//! URL splitting for the request builders
//!
//! Only plaintext `http://` URLs are accepted: `http://host[:port][/path][?query][#fragment]`.

use super::{Error, Result, DEFAULT_HTTP_PORT};

/// Parts of a URL needed to build a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Host and optional port, as sent in the `Host` header
    pub authority: String,
    /// Request path including any query string (default "/")
    pub path: String,
}

/// Split a URL into authority and path
///
/// The fragment is dropped. An empty path becomes `/`.
pub fn split_url(url: &str) -> Result<Target> {
    let rest = url
        .strip_prefix("http://")
        .ok_or_else(|| Error::Protocol(format!("Unsupported URL (only http:// is served): {}", url)))?;

    let rest = rest.split('#').next().unwrap_or_default();

    let (authority, path) = match rest.find(|c| c == '/' || c == '?') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };

    if authority.is_empty() {
        return Err(Error::Protocol(format!("URL has no host: {}", url)));
    }

    let path = match path {
        "" => "/".to_string(),
        p if p.starts_with('?') => format!("/{}", p),
        p => p.to_string(),
    };

    Ok(Target {
        authority: authority.to_string(),
        path,
    })
}

/// Split a `Host` header value into host and port
///
/// The port defaults to 80 when the authority names none.
pub fn split_authority(authority: &str) -> Result<(&str, u16)> {
    // Bracketed IPv6 literal
    if let Some(rest) = authority.strip_prefix('[') {
        let end = rest
            .find(']')
            .ok_or_else(|| Error::Protocol(format!("Invalid host: {}", authority)))?;
        let host = &rest[..end];
        return match &rest[end + 1..] {
            "" => Ok((host, DEFAULT_HTTP_PORT)),
            port => Ok((host, parse_port(port.strip_prefix(':').unwrap_or(port), authority)?)),
        };
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => Ok((host, parse_port(port, authority)?)),
        None => Ok((authority, DEFAULT_HTTP_PORT)),
    }
}

fn parse_port(port: &str, authority: &str) -> Result<u16> {
    port.parse::<u16>()
        .map_err(|_| Error::Protocol(format!("Invalid port in host: {}", authority)))
}
