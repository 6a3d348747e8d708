//! Codec for the nested length-prefixed records that make up a history dump.
//!
//! Every file of the dump is a concatenation of canonical RLP items written back to back.
//! [`decode_from_stream`] peels one item off the front of a buffer and hands back the
//! remainder, so a whole chunk can be walked by feeding the remainder in again until it is
//! empty. Decoding never copies payload bytes: nodes are slices of the input [`Bytes`].

mod convert;

pub use convert::{
    from_hex_string, minimal_be_bytes, to_dec_string, to_hex_string, to_u64, to_u256,
};

use alloy_rlp::{BufMut, Encodable, Header};
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rlp {
    Bytes(Bytes),
    List(Vec<Rlp>),
}

impl Rlp {
    /// Node returned for an empty input. Distinct from "end of stream": it means
    /// the buffer held nothing to decode.
    pub const fn empty_list() -> Self {
        Rlp::List(Vec::new())
    }

    pub fn is_empty_list(&self) -> bool {
        matches!(self, Rlp::List(items) if items.is_empty())
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        if let Rlp::Bytes(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    pub fn as_list(&self) -> Option<&[Rlp]> {
        if let Rlp::List(list) = self {
            Some(list)
        } else {
            None
        }
    }

    pub fn from_u64(value: u64) -> Self {
        Rlp::Bytes(minimal_be_bytes(value))
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Rlp::Bytes(Bytes::copy_from_slice(bytes))
    }

    fn payload_length(items: &[Rlp]) -> usize {
        items.iter().map(Encodable::length).sum()
    }
}

impl Encodable for Rlp {
    fn encode(&self, out: &mut dyn BufMut) {
        match self {
            Rlp::Bytes(bytes) => Encodable::encode(&bytes[..], out),
            Rlp::List(items) => {
                Header {
                    list: true,
                    payload_length: Self::payload_length(items),
                }
                .encode(out);
                for item in items {
                    item.encode(out);
                }
            }
        }
    }

    fn length(&self) -> usize {
        match self {
            Rlp::Bytes(bytes) => Encodable::length(&bytes[..]),
            Rlp::List(items) => {
                let payload_length = Self::payload_length(items);
                alloy_rlp::length_of_length(payload_length) + payload_length
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RlpError {
    /// A length prefix claims more bytes than the buffer holds.
    #[error("malformed record: declared length needs {needed} bytes but only {available} are available")]
    InputTooShort { needed: usize, available: usize },
    #[error("malformed record: list items overrun the declared payload of {declared} bytes")]
    ListPayloadMismatch { declared: usize },
    #[error("malformed record: length of length {0} does not fit into usize")]
    LengthOverflow(usize),
    #[error("malformed record: {trailing} trailing bytes after the item")]
    TrailingBytes { trailing: usize },
    #[error("integer of {len} bytes does not fit into {max} bytes")]
    IntegerOverflow { len: usize, max: usize },
    #[error("hex string does not start with 0x")]
    MissingHexPrefix,
    #[error("invalid hex string: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

impl RlpError {
    /// Whether more input could complete the item. Used to stitch records that are split
    /// across two chunk files.
    pub fn is_truncation(&self) -> bool {
        matches!(self, RlpError::InputTooShort { .. })
    }
}

pub type RlpResult<T> = Result<T, RlpError>;

/// Decodes the first item of `buffer` and returns it along with the undecoded tail.
///
/// An empty buffer decodes to an empty list with an empty remainder.
pub fn decode_from_stream(buffer: &Bytes) -> RlpResult<(Rlp, Bytes)> {
    if buffer.is_empty() {
        return Ok((Rlp::empty_list(), Bytes::new()));
    }
    let (item, end) = decode_item(buffer, 0, buffer.len())?;
    Ok((item, buffer.slice(end..)))
}

/// Decodes a buffer holding exactly one item.
pub fn decode_exact(input: &[u8]) -> RlpResult<Rlp> {
    let buffer = Bytes::copy_from_slice(input);
    let (item, remainder) = decode_from_stream(&buffer)?;
    if !remainder.is_empty() {
        return Err(RlpError::TrailingBytes {
            trailing: remainder.len(),
        });
    }
    Ok(item)
}

/// Decode one item starting at `i`, never reading past `limit`. Returns (item, new_index).
fn decode_item(input: &Bytes, i: usize, limit: usize) -> RlpResult<(Rlp, usize)> {
    if i >= limit {
        return Err(RlpError::InputTooShort {
            needed: 1,
            available: 0,
        });
    }
    let prefix = input[i];

    // single byte below 0x80 is its own encoding
    if prefix <= 0x7f {
        return Ok((Rlp::Bytes(input.slice(i..i + 1)), i + 1));
    }

    // string, payload shorter than 56 bytes
    if prefix <= 0xb7 {
        let len = (prefix - 0x80) as usize;
        let start = i + 1;
        let end = checked_end(start, len, limit)?;
        return Ok((Rlp::Bytes(input.slice(start..end)), end));
    }

    // string, long form
    if prefix <= 0xbf {
        let (start, len) = long_form_length(input, i, (prefix - 0xb7) as usize, limit)?;
        let end = checked_end(start, len, limit)?;
        return Ok((Rlp::Bytes(input.slice(start..end)), end));
    }

    // list, short or long form
    let (start, len) = if prefix <= 0xf7 {
        (i + 1, (prefix - 0xc0) as usize)
    } else {
        long_form_length(input, i, (prefix - 0xf7) as usize, limit)?
    };
    let end = checked_end(start, len, limit)?;
    let mut items = Vec::new();
    let mut idx = start;
    while idx < end {
        let (item, new_idx) = decode_item(input, idx, end).map_err(|err| match err {
            RlpError::InputTooShort { .. } => RlpError::ListPayloadMismatch { declared: len },
            other => other,
        })?;
        items.push(item);
        idx = new_idx;
    }
    Ok((Rlp::List(items), end))
}

/// Reads the big-endian length that follows a long-form prefix at `i`.
/// Returns (payload_start, payload_len).
fn long_form_length(
    input: &Bytes,
    i: usize,
    len_of_len: usize,
    limit: usize,
) -> RlpResult<(usize, usize)> {
    let start = i + 1;
    let end_len = checked_end(start, len_of_len, limit)?;
    if len_of_len > size_of::<usize>() {
        return Err(RlpError::LengthOverflow(len_of_len));
    }
    let len = input[start..end_len]
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
    Ok((end_len, len))
}

fn checked_end(start: usize, len: usize, limit: usize) -> RlpResult<usize> {
    match start.checked_add(len) {
        Some(end) if end <= limit => Ok(end),
        _ => Err(RlpError::InputTooShort {
            needed: len,
            available: limit.saturating_sub(start),
        }),
    }
}
