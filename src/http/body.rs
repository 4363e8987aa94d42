//! Request body encoding for form and JSON payloads

use super::{Error, Result};

/// Content type for form submissions
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Content type for JSON payloads
pub const JSON: &str = "application/json";

/// Percent-encode a form value
///
/// Letters, digits and `_.-~` pass through, spaces become `+` and every
/// other byte of the UTF-8 encoding becomes `%XX`.
pub fn quote_plus(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for &b in value.as_bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'.' | b'-' | b'~' => {
                out.push(char::from(b))
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// Encode fields as `key=value&key=value`
pub fn encode_form<K: AsRef<str>, V: AsRef<str>>(fields: &[(K, V)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", quote_plus(k.as_ref()), quote_plus(v.as_ref())))
        .collect::<Vec<_>>()
        .join("&")
}

/// Encode fields as a JSON object of strings
pub fn encode_json<K: AsRef<str>, V: AsRef<str>>(fields: &[(K, V)]) -> Result<String> {
    let object: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|(k, v)| (k.as_ref().to_string(), serde_json::Value::from(v.as_ref())))
        .collect();

    Ok(serde_json::to_string(&object)?)
}

/// Encode fields for the given `Content-Type`
///
/// Parameters after `;` (such as a charset) are ignored when matching.
pub fn encode_body<K: AsRef<str>, V: AsRef<str>>(
    content_type: &str,
    fields: &[(K, V)],
) -> Result<String> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();

    if essence.eq_ignore_ascii_case(FORM_URLENCODED) {
        Ok(encode_form(fields))
    } else if essence.eq_ignore_ascii_case(JSON) {
        encode_json(fields)
    } else {
        Err(Error::Protocol(format!(
            "Cannot encode fields as {}",
            content_type
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_plus() {
        assert_eq!(quote_plus("hello world"), "hello+world");
        assert_eq!(quote_plus("a&b=c"), "a%26b%3Dc");
        assert_eq!(quote_plus("safe_.-~"), "safe_.-~");
        assert_eq!(quote_plus("caf\u{e9}"), "caf%C3%A9");
    }

    #[test]
    fn test_encode_form() {
        let fields = [("name", "Apollo Server"), ("lang", "rust")];
        assert_eq!(encode_form(&fields), "name=Apollo+Server&lang=rust");

        let empty: [(&str, &str); 0] = [];
        assert_eq!(encode_form(&empty), "");
    }

    #[test]
    fn test_encode_json() {
        let fields = [("name", "Apollo"), ("quote", "say \"hi\"")];
        let body = encode_json(&fields).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["name"], "Apollo");
        assert_eq!(parsed["quote"], "say \"hi\"");
    }

    #[test]
    fn test_encode_body_by_content_type() {
        let fields = [("a", "1")];
        assert_eq!(encode_body(FORM_URLENCODED, &fields).unwrap(), "a=1");
        assert_eq!(
            encode_body("application/json; charset=utf-8", &fields).unwrap(),
            "{\"a\":\"1\"}"
        );
        assert!(matches!(
            encode_body("text/plain", &fields),
            Err(Error::Protocol(_))
        ));
    }
}
