//! Wire records for the master↔slave replication protocol (spec §4.6,
//! §6): field-tagged (bincode) records framed the same way as the
//! client protocol, via [`crate::codec`].
//!
//! Grounded on the teacher's `network/protocol.rs` request/response enum
//! + bincode encoding idiom.

use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlaveRequest {
    pub segment_num: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterResponse {
    pub succeed: bool,
    pub data: Vec<u8>,
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(value, bincode::config::standard()).map_err(|e| e.into())
}

/// Decodes `bytes` as `T`, requiring the whole buffer to be consumed.
///
/// This is more than a sanity check: bincode's default varint integer
/// encoding makes a single ASCII byte (any value below 251) a valid
/// one-byte-consumed `i64`, so a [`SlaveRequest`]-shaped struct decodes
/// "successfully" against the first byte of almost any UTF-8 client
/// command. `network::server` relies on this full-consumption check to
/// tell a genuine replication frame from an ordinary text query.
pub fn decode<T: for<'a> Deserialize<'a>>(bytes: &[u8]) -> Result<T> {
    let (value, consumed) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
    if consumed != bytes.len() {
        return Err(crate::error::DbError::InvalidSyntax("trailing bytes after decode".to_string()));
    }
    Ok(value)
}
