//! Latin-1 text codec
//!
//! Each byte maps to the char with the same code point, so decoding never
//! fails and `encode(&decode(b)) == b` for every byte slice.

use bytes::BufMut;

/// Byte written for chars outside the Latin-1 range
const REPLACEMENT: u8 = b'?';

/// Decode bytes as Latin-1
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encode text as Latin-1
pub fn encode(text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(text.len());
    encode_into(text, &mut buf);
    buf
}

/// Append the Latin-1 encoding of `text` to `buf`
pub fn encode_into<B: BufMut>(text: &str, buf: &mut B) {
    for c in text.chars() {
        buf.put_u8(u8::try_from(c).unwrap_or(REPLACEMENT));
    }
}

/// Length in bytes of the Latin-1 encoding of `text`
pub fn encoded_len(text: &str) -> usize {
    text.chars().count()
}
