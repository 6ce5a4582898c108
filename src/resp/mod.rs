//! RESP (Redis Serialization Protocol) implementation.
//!
//! Supports RESP2 replies and the RESP3 additions (maps, sets, doubles,
//! booleans, big numbers, verbatim strings and push messages).

pub mod parser;
pub mod response;

pub use parser::{parse, FrameScanner, ParseResult, MAX_BLOB_LEN, MAX_DEPTH};
pub use response::{PushMessage, Response, INVALIDATE_DATA_TYPE};
