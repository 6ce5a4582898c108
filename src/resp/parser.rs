//! RESP (Redis Serialization Protocol) reply parser.
//!
//! Implements parsing for RESP2 and RESP3 reply frames, including push
//! messages. Parsing works over a byte buffer that may hold a partial frame:
//! the caller keeps reading from the transport until a frame is complete.
//! `FrameScanner` finds where a frame ends without building it, so a large
//! reply arriving in many reads is only walked once per byte.

use super::response::{PushMessage, Response};
use crate::error::{ProtocolError, ServerError};
use bytes::Bytes;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Deepest aggregate nesting accepted
pub const MAX_DEPTH: usize = 128;

/// Largest bulk string, blob error or verbatim string accepted
pub const MAX_BLOB_LEN: usize = 512 * 1024 * 1024;

/// Parse result
#[derive(Debug)]
pub enum ParseResult {
    /// Successfully parsed a response with bytes consumed
    Complete(Response, usize),
    /// Need more data
    Incomplete,
    /// Parse error; the stream can no longer be framed
    Error(ProtocolError),
}

type Parsed = Result<Option<(Response, usize)>, ProtocolError>;

/// Parse a RESP reply from a buffer
pub fn parse(buffer: &[u8]) -> ParseResult {
    match parse_frame(buffer, 0) {
        Ok(Some((response, consumed))) => ParseResult::Complete(response, consumed),
        Ok(None) => ParseResult::Incomplete,
        Err(e) => ParseResult::Error(e),
    }
}

/// `depth` is the number of enclosing aggregates.
fn parse_frame(buffer: &[u8], depth: usize) -> Parsed {
    if buffer.is_empty() {
        return Ok(None);
    }

    match buffer[0] {
        b'+' => parse_simple_string(buffer),
        b'-' => parse_error(buffer),
        b':' => parse_integer(buffer),
        b'$' => parse_bulk_string(buffer),
        b'*' => parse_array(buffer, depth),
        b'_' => parse_null(buffer),
        b'#' => parse_boolean(buffer),
        b',' => parse_double(buffer),
        b'(' => parse_big_number(buffer),
        b'!' => parse_blob_error(buffer),
        b'=' => parse_verbatim(buffer),
        b'%' => parse_map(buffer, depth),
        b'~' => parse_set(buffer, depth),
        b'>' => parse_push(buffer, depth),
        tag => Err(ProtocolError::UnknownType(tag)),
    }
}

/// Find CRLF in buffer, return position of \r
fn find_crlf(buffer: &[u8]) -> Option<usize> {
    (0..buffer.len().saturating_sub(1)).find(|&i| buffer[i] == b'\r' && buffer[i + 1] == b'\n')
}

/// Header line after the type byte, and the offset just past its CRLF.
fn header(buffer: &[u8]) -> Result<Option<(&str, usize)>, ProtocolError> {
    let Some(end) = find_crlf(buffer) else {
        return Ok(None);
    };
    let text = std::str::from_utf8(&buffer[1..end])
        .map_err(|_| ProtocolError::Invalid("invalid UTF-8 in header".to_string()))?;
    Ok(Some((text, end + 2)))
}

fn parse_length(text: &str, what: &str) -> Result<i64, ProtocolError> {
    text.parse()
        .map_err(|_| ProtocolError::Invalid(format!("invalid {what} length: {text}")))
}

/// Length-prefixed payload shared by bulk strings, blob errors and verbatim
/// strings. `None` payload means a negative (null) length.
fn blob(buffer: &[u8]) -> Result<Option<(Option<&[u8]>, usize)>, ProtocolError> {
    let Some((len_str, data_start)) = header(buffer)? else {
        return Ok(None);
    };
    let len = parse_length(len_str, "blob")?;
    if len < 0 {
        return Ok(Some((None, data_start)));
    }
    let len = usize::try_from(len)
        .ok()
        .filter(|&len| len <= MAX_BLOB_LEN)
        .ok_or_else(|| {
            ProtocolError::Invalid(format!("blob length {len} exceeds {MAX_BLOB_LEN} bytes"))
        })?;

    let data_end = data_start + len;
    let total_len = data_end + 2; // +2 for trailing \r\n
    if buffer.len() < total_len {
        return Ok(None);
    }
    if buffer[data_end] != b'\r' || buffer[data_end + 1] != b'\n' {
        return Err(ProtocolError::Invalid(
            "blob missing trailing CRLF".to_string(),
        ));
    }
    Ok(Some((Some(&buffer[data_start..data_end]), total_len)))
}

/// Parse a simple string: +OK\r\n
fn parse_simple_string(buffer: &[u8]) -> Parsed {
    Ok(header(buffer)?.map(|(s, n)| (Response::Status(s.to_string()), n)))
}

/// Parse an error: -ERR message\r\n
fn parse_error(buffer: &[u8]) -> Parsed {
    Ok(header(buffer)?.map(|(s, n)| (Response::Error(ServerError::parse(s)), n)))
}

/// Parse an integer: :1000\r\n
fn parse_integer(buffer: &[u8]) -> Parsed {
    let Some((s, n)) = header(buffer)? else {
        return Ok(None);
    };
    let value = s
        .parse::<i64>()
        .map_err(|_| ProtocolError::Invalid(format!("invalid integer: {s}")))?;
    Ok(Some((Response::Integer(value), n)))
}

/// Parse a null: _\r\n
fn parse_null(buffer: &[u8]) -> Parsed {
    let Some((s, n)) = header(buffer)? else {
        return Ok(None);
    };
    if !s.is_empty() {
        return Err(ProtocolError::Invalid(format!("invalid null: {s}")));
    }
    Ok(Some((Response::Null, n)))
}

/// Parse a boolean: #t\r\n or #f\r\n
fn parse_boolean(buffer: &[u8]) -> Parsed {
    let Some((s, n)) = header(buffer)? else {
        return Ok(None);
    };
    let value = match s {
        "t" => true,
        "f" => false,
        _ => return Err(ProtocolError::Invalid(format!("invalid boolean: {s}"))),
    };
    Ok(Some((Response::Boolean(value), n)))
}

/// Parse a double: ,1.23\r\n (also inf, -inf, nan)
fn parse_double(buffer: &[u8]) -> Parsed {
    let Some((s, n)) = header(buffer)? else {
        return Ok(None);
    };
    let value = match s {
        "inf" => f64::INFINITY,
        "-inf" => f64::NEG_INFINITY,
        "nan" => f64::NAN,
        _ => s
            .parse::<f64>()
            .map_err(|_| ProtocolError::Invalid(format!("invalid double: {s}")))?,
    };
    Ok(Some((Response::Double(value), n)))
}

/// Parse a big number: (12345678901234567890\r\n
fn parse_big_number(buffer: &[u8]) -> Parsed {
    let Some((s, n)) = header(buffer)? else {
        return Ok(None);
    };
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::Invalid(format!("invalid big number: {s}")));
    }
    Ok(Some((Response::BigNumber(s.to_string()), n)))
}

/// Parse a bulk string: $5\r\nhello\r\n or $-1\r\n
fn parse_bulk_string(buffer: &[u8]) -> Parsed {
    Ok(blob(buffer)?.map(|(data, n)| {
        let response = match data {
            Some(data) => Response::Bulk(Bytes::copy_from_slice(data)),
            None => Response::Null,
        };
        (response, n)
    }))
}

/// Parse a blob error: !21\r\nSYNTAX invalid syntax\r\n
fn parse_blob_error(buffer: &[u8]) -> Parsed {
    let Some((data, n)) = blob(buffer)? else {
        return Ok(None);
    };
    let data = data.ok_or_else(|| ProtocolError::Invalid("null blob error".to_string()))?;
    let message = String::from_utf8_lossy(data);
    Ok(Some((Response::Error(ServerError::parse(&message)), n)))
}

/// Parse a verbatim string: =15\r\ntxt:Some string\r\n
fn parse_verbatim(buffer: &[u8]) -> Parsed {
    let Some((data, n)) = blob(buffer)? else {
        return Ok(None);
    };
    let data = data.ok_or_else(|| ProtocolError::Invalid("null verbatim string".to_string()))?;
    if data.len() < 4 || data[3] != b':' {
        return Err(ProtocolError::Invalid(
            "verbatim string missing format prefix".to_string(),
        ));
    }
    let format = String::from_utf8_lossy(&data[..3]).into_owned();
    let text = Bytes::copy_from_slice(&data[4..]);
    Ok(Some((Response::Verbatim { format, text }, n)))
}

/// Parse `count` consecutive frames starting at `offset`, the children of
/// an aggregate enclosed by `depth` others.
fn parse_elements(
    buffer: &[u8],
    mut offset: usize,
    count: usize,
    depth: usize,
) -> Result<Option<(Vec<Response>, usize)>, ProtocolError> {
    if depth >= MAX_DEPTH {
        return Err(too_deep());
    }
    let mut items = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        if offset >= buffer.len() {
            return Ok(None);
        }
        match parse_frame(&buffer[offset..], depth + 1)? {
            Some((item, consumed)) => {
                items.push(item);
                offset += consumed;
            }
            None => return Ok(None),
        }
    }
    Ok(Some((items, offset)))
}

fn too_deep() -> ProtocolError {
    ProtocolError::Invalid(format!("aggregates nested deeper than {MAX_DEPTH}"))
}

/// Count header for aggregate types. `None` count means a null aggregate.
fn aggregate_header(buffer: &[u8]) -> Result<Option<(Option<usize>, usize)>, ProtocolError> {
    let Some((len_str, offset)) = header(buffer)? else {
        return Ok(None);
    };
    let len = parse_length(len_str, "aggregate")?;
    let count = usize::try_from(len).ok();
    Ok(Some((count, offset)))
}

/// Number of child frames following an aggregate header, `None` for a null
/// array. Maps hold two frames per entry.
fn element_count(tag: u8, count: Option<usize>) -> Result<Option<usize>, ProtocolError> {
    match (tag, count) {
        (b'*', count) => Ok(count),
        (b'%', Some(count)) => count
            .checked_mul(2)
            .map(Some)
            .ok_or_else(|| ProtocolError::Invalid(format!("map size {count} overflows"))),
        (b'%', None) => Err(ProtocolError::Invalid("null map".to_string())),
        (b'~', Some(count)) => Ok(Some(count)),
        (b'~', None) => Err(ProtocolError::Invalid("null set".to_string())),
        (b'>', Some(count)) if count > 0 => Ok(Some(count)),
        (b'>', _) => Err(ProtocolError::Invalid("empty push message".to_string())),
        (tag, _) => Err(ProtocolError::UnknownType(tag)),
    }
}

/// Aggregate header: the child frame count from `element_count` and the
/// header length.
fn aggregate(buffer: &[u8]) -> Result<Option<(Option<usize>, usize)>, ProtocolError> {
    let Some((count, offset)) = aggregate_header(buffer)? else {
        return Ok(None);
    };
    Ok(Some((element_count(buffer[0], count)?, offset)))
}

/// Parse an array: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n or *-1\r\n
fn parse_array(buffer: &[u8], depth: usize) -> Parsed {
    let Some((count, offset)) = aggregate(buffer)? else {
        return Ok(None);
    };
    let Some(count) = count else {
        return Ok(Some((Response::Null, offset)));
    };
    Ok(parse_elements(buffer, offset, count, depth)?
        .map(|(items, n)| (Response::Array(items), n)))
}

/// Parse a map: %2\r\n<k1><v1><k2><v2>
fn parse_map(buffer: &[u8], depth: usize) -> Parsed {
    let Some((Some(count), offset)) = aggregate(buffer)? else {
        return Ok(None);
    };
    let Some((items, n)) = parse_elements(buffer, offset, count, depth)? else {
        return Ok(None);
    };

    let mut pairs = Vec::with_capacity(items.len() / 2);
    let mut items = items.into_iter();
    while let (Some(key), Some(value)) = (items.next(), items.next()) {
        pairs.push((key, value));
    }
    Ok(Some((Response::Map(pairs), n)))
}

/// Parse a set: ~3\r\n... keeping the first occurrence of equal elements
fn parse_set(buffer: &[u8], depth: usize) -> Parsed {
    let Some((Some(count), offset)) = aggregate(buffer)? else {
        return Ok(None);
    };
    let Some((items, n)) = parse_elements(buffer, offset, count, depth)? else {
        return Ok(None);
    };
    Ok(Some((Response::Set(dedup(items)), n)))
}

/// Drop later duplicates, comparing only elements whose hashes collide.
fn dedup(items: Vec<Response>) -> Vec<Response> {
    let mut seen: HashMap<u64, Vec<usize>> = HashMap::with_capacity(items.len());
    let mut unique: Vec<Response> = Vec::with_capacity(items.len());
    for item in items {
        let mut hasher = DefaultHasher::new();
        hash_response(&item, &mut hasher);
        let bucket = seen.entry(hasher.finish()).or_default();
        if bucket.iter().all(|&i| unique[i] != item) {
            bucket.push(unique.len());
            unique.push(item);
        }
    }
    unique
}

/// Hash agreeing with `PartialEq`: values that compare equal hash alike.
fn hash_response<H: Hasher>(response: &Response, state: &mut H) {
    std::mem::discriminant(response).hash(state);
    match response {
        Response::Status(s) | Response::BigNumber(s) => s.hash(state),
        Response::Bulk(data) => data.hash(state),
        Response::Integer(n) => n.hash(state),
        Response::Error(e) => {
            e.kind.hash(state);
            e.message.hash(state);
        }
        Response::Null => {}
        // 0.0 == -0.0, NaN never equals anything
        Response::Double(d) => (if *d == 0.0 { 0.0 } else { *d }).to_bits().hash(state),
        Response::Boolean(b) => b.hash(state),
        Response::Verbatim { format, text } => {
            format.hash(state);
            text.hash(state);
        }
        Response::Array(items) | Response::Set(items) => {
            items.len().hash(state);
            for item in items {
                hash_response(item, state);
            }
        }
        Response::Map(pairs) => {
            pairs.len().hash(state);
            for (key, value) in pairs {
                hash_response(key, state);
                hash_response(value, state);
            }
        }
        Response::Push(push) => {
            push.data_type.hash(state);
            push.payload.len().hash(state);
            for item in &push.payload {
                hash_response(item, state);
            }
        }
    }
}

/// Parse a push: >2\r\n$10\r\ninvalidate\r\n*1\r\n$3\r\nfoo\r\n
fn parse_push(buffer: &[u8], depth: usize) -> Parsed {
    let Some((Some(count), offset)) = aggregate(buffer)? else {
        return Ok(None);
    };
    let Some((mut items, n)) = parse_elements(buffer, offset, count, depth)? else {
        return Ok(None);
    };

    let data_type = match items.remove(0) {
        Response::Bulk(data) => String::from_utf8_lossy(&data).into_owned(),
        Response::Status(s) => s,
        other => {
            return Err(ProtocolError::Invalid(format!(
                "push data type must be a string, got {other:?}"
            )))
        }
    };
    Ok(Some((
        Response::Push(PushMessage {
            data_type,
            payload: items,
        }),
        n,
    )))
}

/// Locates the end of the first frame in a growing buffer without building
/// it. Progress is kept between calls, so each byte is examined once no
/// matter how many reads the frame takes to arrive.
#[derive(Debug, Default)]
pub struct FrameScanner {
    /// End of the last fully scanned element
    offset: usize,
    /// Children still expected by each open aggregate, innermost last
    pending: Vec<usize>,
}

impl FrameScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of the first complete frame in `buffer`, or `None` until more
    /// bytes arrive. Between calls the buffer may only grow at its end.
    pub fn scan(&mut self, buffer: &[u8]) -> Result<Option<usize>, ProtocolError> {
        loop {
            let Some((len, children)) = scan_element(&buffer[self.offset..])? else {
                return Ok(None);
            };
            if children.is_some() && self.pending.len() >= MAX_DEPTH {
                return Err(too_deep());
            }
            self.offset += len;
            if let Some(children) = children.filter(|&children| children > 0) {
                self.pending.push(children);
                continue;
            }

            // The element is complete; close every aggregate it finishes
            loop {
                let Some(remaining) = self.pending.last_mut() else {
                    let len = self.offset;
                    self.reset();
                    return Ok(Some(len));
                };
                *remaining -= 1;
                if *remaining > 0 {
                    break;
                }
                self.pending.pop();
            }
        }
    }

    /// Forget progress, e.g. after the buffer was cleared.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.pending.clear();
    }
}

/// Header length of the element at the start of `buffer` and, for a
/// non-null aggregate, how many child frames follow it.
fn scan_element(buffer: &[u8]) -> Result<Option<(usize, Option<usize>)>, ProtocolError> {
    let Some(&tag) = buffer.first() else {
        return Ok(None);
    };
    match tag {
        b'+' | b'-' | b':' | b'_' | b'#' | b',' | b'(' => {
            Ok(header(buffer)?.map(|(_, n)| (n, None)))
        }
        b'$' | b'!' | b'=' => Ok(blob(buffer)?.map(|(_, n)| (n, None))),
        b'*' | b'%' | b'~' | b'>' => Ok(aggregate(buffer)?.map(|(count, n)| (n, count))),
        tag => Err(ProtocolError::UnknownType(tag)),
    }
}
