//! `Content-Length: <N>\r\n\r\n<body>` framing over a JSON-RPC byte stream.
//!
//! Header scanning is byte-wise: we never convert the whole buffer to text,
//! only the header slice once the separator is found. `N` counts UTF-8
//! bytes of the body, not characters.

use crate::error::{FrameError, FrameResult};
use mcpbridge_config::constants::MAX_MESSAGE;

const SEPARATOR: &[u8] = b"\r\n\r\n";
const HEADER_NAME: &str = "content-length";

/// Outcome of scanning a buffer for a complete `Content-Length` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderParseResult {
    /// Header fully parsed. `header_len` is the offset of the first body
    /// byte; `content_len` is the declared body length.
    Complete { content_len: usize, header_len: usize },
    /// The `\r\n\r\n` separator hasn't appeared yet in the scanned prefix.
    NeedMore,
}

/// Encode `json` as a complete frame. Empty input produces empty output.
pub fn encode(json: &str) -> Vec<u8> {
    if json.is_empty() {
        return Vec::new();
    }
    let body = json.as_bytes();
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    let mut out = Vec::with_capacity(header.len() + body.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(body);
    out
}

/// Scan `buf[..len]` for a `Content-Length` header. Case-insensitive on the
/// field name; tolerates surrounding whitespace on the value.
pub fn try_parse_header(buf: &[u8], len: usize) -> FrameResult<HeaderParseResult> {
    let scanned = &buf[..len];

    let sep_pos = match find_subslice(scanned, SEPARATOR) {
        Some(pos) => pos,
        None => return Ok(HeaderParseResult::NeedMore),
    };

    let header_bytes = &scanned[..sep_pos];
    let header_text = std::str::from_utf8(header_bytes)
        .map_err(|_| FrameError::HeaderMalformed("header is not valid UTF-8".to_string()))?;

    let mut content_len = None;
    for line in header_text.split("\r\n") {
        let mut parts = line.splitn(2, ':');
        let name = parts.next().unwrap_or("").trim();
        let value = parts.next();
        if name.eq_ignore_ascii_case(HEADER_NAME) {
            let value = value.ok_or_else(|| {
                FrameError::HeaderMalformed("Content-Length header has no value".to_string())
            })?;
            content_len = Some(value.trim());
        }
    }

    let raw_value = content_len.ok_or_else(|| {
        FrameError::HeaderMalformed("no Content-Length header present".to_string())
    })?;

    let parsed: i64 = raw_value
        .parse()
        .map_err(|_| FrameError::HeaderMalformed(format!("'{raw_value}' is not an integer")))?;

    if parsed < 0 {
        return Err(FrameError::NegativeLength);
    }

    let parsed = parsed as usize;
    if parsed > MAX_MESSAGE {
        return Err(FrameError::ContentLengthTooLarge(parsed, MAX_MESSAGE));
    }

    Ok(HeaderParseResult::Complete {
        content_len: parsed,
        header_len: sep_pos + SEPARATOR.len(),
    })
}

/// Whether `len` bytes already cover a full frame given its parsed lengths.
pub fn is_complete(len: usize, content_len: usize, header_len: usize) -> bool {
    len >= header_len.saturating_add(content_len)
}

/// Decode the body slice as UTF-8 text. Invalid UTF-8 is fatal for the
/// connection, not the process.
pub fn extract_body(buf: &[u8], content_len: usize, header_len: usize) -> FrameResult<String> {
    let end = header_len
        .checked_add(content_len)
        .ok_or(FrameError::BufferUnderflow)?;
    let slice = buf.get(header_len..end).ok_or(FrameError::BufferUnderflow)?;
    std::str::from_utf8(slice)
        .map(str::to_string)
        .map_err(|_| FrameError::InvalidUtf8)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
