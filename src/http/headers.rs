//! HTTP headers handling
//!
//! Headers behave as a keyed mapping: names are compared exactly as parsed,
//! inserting an existing name replaces its value in place, and iteration
//! follows first-insertion order so serialization is deterministic.

use super::{Error, Result};
use std::fmt;

/// HTTP headers collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: Vec<(String, String)>,
}

impl Headers {
    /// Create a new empty headers collection
    pub fn new() -> Self {
        Headers {
            headers: Vec::new(),
        }
    }

    /// Insert a header
    ///
    /// If the name is already present its value is overwritten and it keeps
    /// its original position (last write wins).
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self.headers.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.headers.push((name, value)),
        }
    }

    /// Get the value for a header
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Check if a header exists
    pub fn contains(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n == name)
    }

    /// Check if a header exists, ignoring ASCII case
    pub fn contains_ignore_case(&self, name: &str) -> bool {
        self.headers
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Remove a header, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self.headers.iter().position(|(n, _)| n == name)?;
        Some(self.headers.remove(pos).1)
    }

    /// Copy every header of `other` over this collection
    pub fn merge(&mut self, other: &Headers) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    /// Get the number of headers
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if there are no headers
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterate over all headers
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Parse a header line into name and value
    ///
    /// Splits on the first colon only; the value is trimmed.
    pub fn parse_header_line(line: &str) -> Result<(String, String)> {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::Parse(format!("No colon in header: {}", line)))?;

        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Parse(format!("Empty header name: {}", line)));
        }

        Ok((name.to_string(), value.trim().to_string()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.headers {
            writeln!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/html");
        headers.insert("Content-Length", "42");

        assert_eq!(headers.get("Content-Type"), Some("text/html"));
        assert_eq!(headers.get("Content-Length"), Some("42"));
        assert_eq!(headers.get("Missing"), None);
    }

    #[test]
    fn test_case_sensitive_lookup() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/html");

        assert_eq!(headers.get("content-type"), None);
        assert!(!headers.contains("CONTENT-TYPE"));
        assert!(headers.contains_ignore_case("CONTENT-TYPE"));
    }

    #[test]
    fn test_last_write_wins() {
        let mut headers = Headers::new();
        headers.insert("X-Custom", "first");
        headers.insert("Other", "value");
        headers.insert("X-Custom", "second");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("X-Custom"), Some("second"));

        // Overwriting keeps the original position
        let collected: Vec<_> = headers.iter().collect();
        assert_eq!(collected, vec![("X-Custom", "second"), ("Other", "value")]);
    }

    #[test]
    fn test_remove() {
        let mut headers = Headers::new();
        headers.insert("X-Remove", "value1");
        headers.insert("X-Keep", "value2");

        assert_eq!(headers.remove("X-Remove"), Some("value1".to_string()));
        assert_eq!(headers.remove("X-Remove"), None);
        assert_eq!(headers.get("X-Keep"), Some("value2"));
    }

    #[test]
    fn test_merge_overrides() {
        let mut headers: Headers = [("User-Agent", "Apollo"), ("Connection", "close")]
            .into_iter()
            .collect();
        let overrides: Headers = [("User-Agent", "curl"), ("Accept", "*/*")]
            .into_iter()
            .collect();

        headers.merge(&overrides);

        let collected: Vec<_> = headers.iter().collect();
        assert_eq!(
            collected,
            vec![
                ("User-Agent", "curl"),
                ("Connection", "close"),
                ("Accept", "*/*")
            ]
        );
    }

    #[test]
    fn test_parse_header_line() {
        let (name, value) = Headers::parse_header_line("Content-Type: text/html").unwrap();
        assert_eq!(name, "Content-Type");
        assert_eq!(value, "text/html");

        let (name, value) = Headers::parse_header_line("X-Custom:  value  ").unwrap();
        assert_eq!(name, "X-Custom");
        assert_eq!(value, "value");

        // Only the first colon splits
        let (name, value) = Headers::parse_header_line("Host: localhost:8000").unwrap();
        assert_eq!(name, "Host");
        assert_eq!(value, "localhost:8000");

        assert!(matches!(
            Headers::parse_header_line("Invalid"),
            Err(Error::Parse(_))
        ));
        assert!(Headers::parse_header_line(": value").is_err());
    }
}
