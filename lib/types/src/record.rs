//! Typed views over the records stored in a history dump.
//!
//! Each record is a positional RLP list. Parsing validates the shape (list vs. byte string,
//! field count, fixed widths) and turns minimal big-endian integers into native ones.
//! The `to_rlp` counterparts produce the canonical node and are what fixture writers use.

use crate::{RecordError, RecordResult};
use alloy::primitives::{Address, B256, Bytes, U256};
use serde::Serialize;
use the_index_rlp::{Rlp, to_u64, to_u256};

/// High-water mark of the dump: the latest fully captured block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorRecord {
    pub block_number: u64,
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeaderRecord {
    pub number: u64,
    pub time: u64,
    pub hash: B256,
    pub coinbase: Address,
    pub difficulty: U256,
    pub gas_limit: u64,
}

/// All contract activity of one shard in one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractsForBlock {
    pub block_number: u64,
    pub contracts: Vec<ContractRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    pub address: Address,
    pub logs: Vec<LogRecord>,
    /// Non-empty only in the block the contract was (re)deployed.
    pub code: Bytes,
    pub states: Vec<StateDiff>,
    /// Present only when the balance changed in this block.
    pub balance: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateDiff {
    pub key: Bytes,
    pub value: Bytes,
}

/// Reads the block number every stream record carries in its first field.
pub fn block_number_of(node: &Rlp) -> RecordResult<u64> {
    let fields = Fields::new(node, "stream record")?;
    fields.u64(0)
}

impl CursorRecord {
    pub fn to_rlp(&self) -> Rlp {
        Rlp::List(vec![Rlp::from_u64(self.block_number), Rlp::from_u64(self.time)])
    }
}

impl TryFrom<&Rlp> for CursorRecord {
    type Error = RecordError;

    fn try_from(node: &Rlp) -> RecordResult<Self> {
        let fields = Fields::new(node, "cursor record")?;
        Ok(Self {
            block_number: fields.u64(0)?,
            time: fields.u64(1)?,
        })
    }
}

impl BlockHeaderRecord {
    pub fn to_rlp(&self) -> Rlp {
        Rlp::List(vec![
            Rlp::from_u64(self.number),
            Rlp::from_u64(self.time),
            Rlp::from_slice(self.hash.as_slice()),
            Rlp::from_slice(self.coinbase.as_slice()),
            Rlp::from_slice(&self.difficulty.to_be_bytes_trimmed_vec()),
            Rlp::from_u64(self.gas_limit),
        ])
    }
}

impl TryFrom<&Rlp> for BlockHeaderRecord {
    type Error = RecordError;

    fn try_from(node: &Rlp) -> RecordResult<Self> {
        let fields = Fields::new(node, "block header")?;
        Ok(Self {
            number: fields.u64(0)?,
            time: fields.u64(1)?,
            hash: B256::from_slice(fields.fixed(2, 32)?),
            coinbase: Address::from_slice(fields.fixed(3, 20)?),
            difficulty: fields.u256(4)?,
            gas_limit: fields.u64(5)?,
        })
    }
}

impl ContractsForBlock {
    /// Records of `address` in this block. A well-formed dump has at most one.
    pub fn records_of<'a>(
        &'a self,
        address: &'a Address,
    ) -> impl Iterator<Item = &'a ContractRecord> + 'a {
        self.contracts
            .iter()
            .filter(move |contract| contract.address == *address)
    }

    pub fn to_rlp(&self) -> Rlp {
        Rlp::List(vec![
            Rlp::from_u64(self.block_number),
            Rlp::List(self.contracts.iter().map(ContractRecord::to_rlp).collect()),
        ])
    }
}

impl TryFrom<&Rlp> for ContractsForBlock {
    type Error = RecordError;

    fn try_from(node: &Rlp) -> RecordResult<Self> {
        let fields = Fields::new(node, "contracts record")?;
        let contracts = fields
            .list(1)?
            .iter()
            .map(ContractRecord::try_from)
            .collect::<RecordResult<_>>()?;
        Ok(Self {
            block_number: fields.u64(0)?,
            contracts,
        })
    }
}

impl ContractRecord {
    /// Whether storage or balance changed in this record's block.
    pub fn has_state_changes(&self) -> bool {
        !self.states.is_empty() || self.balance.is_some()
    }

    pub fn to_rlp(&self) -> Rlp {
        let balance = match &self.balance {
            Some(balance) => vec![Rlp::Bytes(balance.0.clone())],
            None => Vec::new(),
        };
        Rlp::List(vec![
            Rlp::from_slice(self.address.as_slice()),
            Rlp::List(self.logs.iter().map(LogRecord::to_rlp).collect()),
            Rlp::Bytes(self.code.0.clone()),
            Rlp::List(self.states.iter().map(StateDiff::to_rlp).collect()),
            Rlp::List(balance),
        ])
    }
}

impl TryFrom<&Rlp> for ContractRecord {
    type Error = RecordError;

    fn try_from(node: &Rlp) -> RecordResult<Self> {
        let fields = Fields::new(node, "contract record")?;
        let logs = fields
            .list(1)?
            .iter()
            .map(LogRecord::try_from)
            .collect::<RecordResult<_>>()?;
        let states = fields
            .list(3)?
            .iter()
            .map(StateDiff::try_from)
            .collect::<RecordResult<_>>()?;
        // older dumps end after the states, which means "balance unchanged"
        let balance = match fields.optional_list(4)? {
            Some([balance, ..]) => Some(Fields::as_bytes(balance, "contract record", 4)?),
            _ => None,
        };
        Ok(Self {
            address: Address::from_slice(fields.fixed(0, 20)?),
            logs,
            code: fields.bytes(2)?,
            states,
            balance,
        })
    }
}

impl LogRecord {
    pub fn to_rlp(&self) -> Rlp {
        Rlp::List(vec![
            Rlp::List(
                self.topics
                    .iter()
                    .map(|topic| Rlp::from_slice(topic.as_slice()))
                    .collect(),
            ),
            Rlp::Bytes(self.data.0.clone()),
        ])
    }
}

impl TryFrom<&Rlp> for LogRecord {
    type Error = RecordError;

    fn try_from(node: &Rlp) -> RecordResult<Self> {
        let fields = Fields::new(node, "log record")?;
        let topics = fields
            .list(0)?
            .iter()
            .map(|topic| {
                let topic = Fields::as_bytes(topic, "log topic", 0)?;
                if topic.len() != 32 {
                    return Err(RecordError::WrongLength {
                        record: "log topic",
                        field: 0,
                        expected: 32,
                        actual: topic.len(),
                    });
                }
                Ok(B256::from_slice(&topic))
            })
            .collect::<RecordResult<_>>()?;
        Ok(Self {
            topics,
            data: fields.bytes(1)?,
        })
    }
}

impl StateDiff {
    pub fn to_rlp(&self) -> Rlp {
        Rlp::List(vec![
            Rlp::Bytes(self.key.0.clone()),
            Rlp::Bytes(self.value.0.clone()),
        ])
    }
}

impl TryFrom<&Rlp> for StateDiff {
    type Error = RecordError;

    fn try_from(node: &Rlp) -> RecordResult<Self> {
        let fields = Fields::new(node, "state diff")?;
        Ok(Self {
            key: fields.bytes(0)?,
            value: fields.bytes(1)?,
        })
    }
}

/// Positional accessor over the fields of one record.
struct Fields<'a> {
    record: &'static str,
    items: &'a [Rlp],
}

impl<'a> Fields<'a> {
    fn new(node: &'a Rlp, record: &'static str) -> RecordResult<Self> {
        let items = node
            .as_list()
            .ok_or(RecordError::ExpectedList { record, field: None })?;
        Ok(Self { record, items })
    }

    fn get(&self, field: usize) -> RecordResult<&'a Rlp> {
        self.items.get(field).ok_or(RecordError::MissingField {
            record: self.record,
            field,
        })
    }

    fn as_bytes(node: &Rlp, record: &'static str, field: usize) -> RecordResult<Bytes> {
        node.as_bytes()
            .map(|bytes| Bytes::from(bytes.clone()))
            .ok_or(RecordError::ExpectedBytes { record, field })
    }

    fn bytes(&self, field: usize) -> RecordResult<Bytes> {
        Self::as_bytes(self.get(field)?, self.record, field)
    }

    fn fixed(&self, field: usize, expected: usize) -> RecordResult<&'a [u8]> {
        let bytes = self.get(field)?.as_bytes().ok_or(RecordError::ExpectedBytes {
            record: self.record,
            field,
        })?;
        if bytes.len() != expected {
            return Err(RecordError::WrongLength {
                record: self.record,
                field,
                expected,
                actual: bytes.len(),
            });
        }
        Ok(&bytes[..])
    }

    fn u64(&self, field: usize) -> RecordResult<u64> {
        let bytes = self.bytes(field)?;
        to_u64(&bytes).map_err(|source| RecordError::Integer {
            record: self.record,
            field,
            source,
        })
    }

    fn u256(&self, field: usize) -> RecordResult<U256> {
        let bytes = self.bytes(field)?;
        to_u256(&bytes).map_err(|source| RecordError::Integer {
            record: self.record,
            field,
            source,
        })
    }

    fn list(&self, field: usize) -> RecordResult<&'a [Rlp]> {
        self.get(field)?.as_list().ok_or(RecordError::ExpectedList {
            record: self.record,
            field: Some(field),
        })
    }

    fn optional_list(&self, field: usize) -> RecordResult<Option<&'a [Rlp]>> {
        if field >= self.items.len() {
            return Ok(None);
        }
        self.list(field).map(Some)
    }
}
