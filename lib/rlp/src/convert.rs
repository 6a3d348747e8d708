//! Numeric and hex views over raw record fields.
//!
//! Integers in the dump are minimal big-endian byte strings, the empty string being zero.

use crate::{RlpError, RlpResult};
use alloy::primitives::U256;
use bytes::Bytes;

pub fn to_u64(bytes: &[u8]) -> RlpResult<u64> {
    if bytes.len() > 8 {
        return Err(RlpError::IntegerOverflow {
            len: bytes.len(),
            max: 8,
        });
    }
    Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

pub fn to_u256(bytes: &[u8]) -> RlpResult<U256> {
    U256::try_from_be_slice(bytes).ok_or(RlpError::IntegerOverflow {
        len: bytes.len(),
        max: 32,
    })
}

pub fn to_hex_string(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn to_dec_string(bytes: &[u8]) -> RlpResult<String> {
    Ok(to_u256(bytes)?.to_string())
}

/// Parses a `0x`-prefixed hex string. Strings without the prefix are rejected.
pub fn from_hex_string(hex_string: &str) -> RlpResult<Bytes> {
    let digits = hex_string
        .strip_prefix("0x")
        .ok_or(RlpError::MissingHexPrefix)?;
    Ok(Bytes::from(hex::decode(digits)?))
}

pub fn minimal_be_bytes(value: u64) -> Bytes {
    let be = value.to_be_bytes();
    let start = be.iter().position(|b| *b != 0).unwrap_or(be.len());
    Bytes::copy_from_slice(&be[start..])
}
