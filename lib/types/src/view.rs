//! Shapes handed to analysis plugins.

use crate::{BlockHeaderRecord, LogRecord};
use alloy::primitives::{Address, B256, Bytes, U256};
use serde::Serialize;

/// Header of the block currently being replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub number: u64,
    pub hash: B256,
    /// Seconds since the epoch.
    pub timestamp: u64,
    pub miner: Address,
    pub difficulty: U256,
    pub gas_limit: u64,
}

impl From<&BlockHeaderRecord> for Block {
    fn from(header: &BlockHeaderRecord) -> Self {
        Self {
            number: header.number,
            hash: header.hash,
            timestamp: header.time,
            miner: header.coinbase,
            difficulty: header.difficulty,
            gas_limit: header.gas_limit,
        }
    }
}

/// A log emitted by a contract, split into its event signature and the remaining topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub address: Address,
    pub topic0: B256,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

impl Event {
    /// Returns `None` for anonymous logs without topics.
    pub fn from_log(address: Address, log: &LogRecord) -> Option<Self> {
        let (topic0, topics) = log.topics.split_first()?;
        Some(Self {
            address,
            topic0: *topic0,
            topics: topics.to_vec(),
            data: log.data.clone(),
        })
    }
}

/// Shard key of an address: its first byte as two lowercase hex characters.
pub fn shard_of(address: &Address) -> String {
    format!("{:02x}", address[0])
}
