//! Response values produced by the RESP parser.
//!
//! One closed enum covers every RESP2 and RESP3 reply type. Push messages are
//! part of the same enum because they share the ordered reply stream, but
//! the cache proxy intercepts them before they reach a caller.

use crate::error::ServerError;
use bytes::{Bytes, BytesMut};

/// Push data type carrying client-side cache invalidations.
pub const INVALIDATE_DATA_TYPE: &str = "invalidate";

/// An out-of-band server push (`>` frame).
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    /// First element of the push frame, e.g. `invalidate` or `message`.
    pub data_type: String,
    /// Remaining elements of the push frame.
    pub payload: Vec<Response>,
}

/// A parsed server reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Simple string: +OK\r\n
    Status(String),
    /// Bulk string: $5\r\nhello\r\n
    Bulk(Bytes),
    /// Integer: :1000\r\n
    Integer(i64),
    /// Array: *2\r\n...
    Array(Vec<Response>),
    /// RESP3 map: %1\r\n<key><value>
    Map(Vec<(Response, Response)>),
    /// RESP3 set: ~2\r\n... (duplicates dropped while parsing)
    Set(Vec<Response>),
    /// Error: -ERR message\r\n or !<len>\r\n<message>\r\n
    Error(ServerError),
    /// $-1, *-1 or RESP3 _
    Null,
    /// RESP3 double: ,3.14\r\n
    Double(f64),
    /// RESP3 boolean: #t\r\n
    Boolean(bool),
    /// RESP3 big number: (3492890328409238509324850943850943825024385\r\n
    BigNumber(String),
    /// RESP3 verbatim string: =15\r\ntxt:Some string\r\n
    Verbatim { format: String, text: Bytes },
    /// RESP3 push: >N\r\n<data type><payload...>
    Push(PushMessage),
}

impl Response {
    /// Encode a response to bytes
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Encode a response into an existing buffer
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Response::Status(s) => line(buf, b'+', s.as_bytes()),
            Response::Error(e) => line(buf, b'-', e.message.as_bytes()),
            Response::Integer(n) => line(buf, b':', n.to_string().as_bytes()),
            Response::Bulk(data) => blob(buf, b'$', data),
            Response::Null => buf.extend_from_slice(b"_\r\n"),
            Response::Double(d) => {
                let text = if d.is_nan() {
                    "nan".to_string()
                } else if *d == f64::INFINITY {
                    "inf".to_string()
                } else if *d == f64::NEG_INFINITY {
                    "-inf".to_string()
                } else {
                    d.to_string()
                };
                line(buf, b',', text.as_bytes());
            }
            Response::Boolean(b) => line(buf, b'#', if *b { b"t" } else { b"f" }),
            Response::BigNumber(n) => line(buf, b'(', n.as_bytes()),
            Response::Verbatim { format, text } => {
                let mut body = Vec::with_capacity(format.len() + 1 + text.len());
                body.extend_from_slice(format.as_bytes());
                body.push(b':');
                body.extend_from_slice(text);
                blob(buf, b'=', &body);
            }
            Response::Array(items) => {
                line(buf, b'*', items.len().to_string().as_bytes());
                for item in items {
                    item.encode_into(buf);
                }
            }
            Response::Set(items) => {
                line(buf, b'~', items.len().to_string().as_bytes());
                for item in items {
                    item.encode_into(buf);
                }
            }
            Response::Map(pairs) => {
                line(buf, b'%', pairs.len().to_string().as_bytes());
                for (key, value) in pairs {
                    key.encode_into(buf);
                    value.encode_into(buf);
                }
            }
            Response::Push(push) => {
                line(buf, b'>', (push.payload.len() + 1).to_string().as_bytes());
                blob(buf, b'$', push.data_type.as_bytes());
                for item in &push.payload {
                    item.encode_into(buf);
                }
            }
        }
    }

    /// Create a simple string response
    pub fn status<S: Into<String>>(s: S) -> Response {
        Response::Status(s.into())
    }

    /// Create an error response
    pub fn error<S: AsRef<str>>(s: S) -> Response {
        Response::Error(ServerError::parse(s.as_ref()))
    }

    /// Create a bulk string response
    pub fn bulk<B: Into<Bytes>>(data: B) -> Response {
        Response::Bulk(data.into())
    }

    /// Create a push response
    pub fn push<S: Into<String>>(data_type: S, payload: Vec<Response>) -> Response {
        Response::Push(PushMessage {
            data_type: data_type.into(),
            payload,
        })
    }

    /// An `invalidate` push for the given storage keys (`None` = flush all).
    pub fn invalidate(keys: Option<&[&str]>) -> Response {
        let keys = match keys {
            Some(keys) => Response::Array(
                keys.iter()
                    .map(|k| Response::bulk(Bytes::copy_from_slice(k.as_bytes())))
                    .collect(),
            ),
            None => Response::Null,
        };
        Response::push(INVALIDATE_DATA_TYPE, vec![keys])
    }

    pub fn is_push(&self) -> bool {
        matches!(self, Response::Push(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    /// String view of string-like replies (status, bulk, verbatim).
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Response::Status(s) => Some(s),
            Response::Bulk(data) | Response::Verbatim { text: data, .. } => {
                std::str::from_utf8(data).ok()
            }
            _ => None,
        }
    }

    /// Approximate heap footprint, used for cache size telemetry.
    pub fn memory_size(&self) -> usize {
        let nested = match self {
            Response::Status(s) | Response::BigNumber(s) => s.len(),
            Response::Bulk(data) => data.len(),
            Response::Error(e) => e.message.len(),
            Response::Verbatim { format, text } => format.len() + text.len(),
            Response::Array(items) | Response::Set(items) => {
                items.iter().map(Response::memory_size).sum()
            }
            Response::Map(pairs) => pairs
                .iter()
                .map(|(k, v)| k.memory_size() + v.memory_size())
                .sum(),
            Response::Push(push) => {
                push.data_type.len() + push.payload.iter().map(Response::memory_size).sum::<usize>()
            }
            Response::Integer(_) | Response::Null | Response::Double(_) | Response::Boolean(_) => 0,
        };
        std::mem::size_of::<Self>() + nested
    }
}

fn line(buf: &mut BytesMut, tag: u8, body: &[u8]) {
    buf.extend_from_slice(&[tag]);
    buf.extend_from_slice(body);
    buf.extend_from_slice(b"\r\n");
}

fn blob(buf: &mut BytesMut, tag: u8, data: &[u8]) {
    line(buf, tag, data.len().to_string().as_bytes());
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
}
