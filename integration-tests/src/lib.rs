use alloy::primitives::{Address, B256, Bytes, U256, keccak256};
use alloy::rlp::Encodable;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;
use the_index_rlp::Rlp;
use the_index_storage::{DumpLayout, LocalDumpSource};
use the_index_types::{
    BlockHeaderRecord, ContractRecord, ContractsForBlock, CursorRecord, LogRecord, StateDiff,
    shard_of,
};

/// Deterministic hash of a fixture block.
pub fn header_hash(block_number: u64) -> B256 {
    keccak256(block_number.to_be_bytes())
}

pub fn header(block_number: u64) -> BlockHeaderRecord {
    BlockHeaderRecord {
        number: block_number,
        time: 1_600_000_000 + 13 * block_number,
        hash: header_hash(block_number),
        coinbase: Address::repeat_byte(0xcb),
        difficulty: U256::from(1_000_000u64),
        gas_limit: 30_000_000,
    }
}

/// Record of `address` with nothing but the given code.
pub fn contract(address: Address, code: &[u8]) -> ContractRecord {
    ContractRecord {
        address,
        logs: vec![],
        code: Bytes::copy_from_slice(code),
        states: vec![],
        balance: None,
    }
}

pub fn log(topics: Vec<B256>, data: &[u8]) -> LogRecord {
    LogRecord {
        topics,
        data: Bytes::copy_from_slice(data),
    }
}

/// Storage write of a 32-byte slot, the value minimally encoded like the dump does.
pub fn storage_write(slot: B256, value: U256) -> StateDiff {
    StateDiff {
        key: Bytes::copy_from_slice(slot.as_slice()),
        value: Bytes::from(value.to_be_bytes_trimmed_vec()),
    }
}

/// Writes a history dump into a temporary directory.
#[derive(Debug, Default)]
pub struct DumpBuilder {
    latest_block: Option<u64>,
    headers: Vec<BlockHeaderRecord>,
    contracts: BTreeMap<String, Vec<ContractsForBlock>>,
    chunk_size: Option<usize>,
}

impl DumpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block declared by the cursor. Without it no cursor file is written.
    pub fn latest_block(mut self, block_number: u64) -> Self {
        self.latest_block = Some(block_number);
        self
    }

    /// Adds fixture headers, see [`header`].
    pub fn blocks(mut self, block_numbers: impl IntoIterator<Item = u64>) -> Self {
        self.headers.extend(block_numbers.into_iter().map(header));
        self
    }

    pub fn header(mut self, header: BlockHeaderRecord) -> Self {
        self.headers.push(header);
        self
    }

    /// Adds a contract record to its shard, next to other records of the same block.
    pub fn contract(mut self, block_number: u64, record: ContractRecord) -> Self {
        let shard = self.contracts.entry(shard_of(&record.address)).or_default();
        match shard
            .iter_mut()
            .find(|contracts| contracts.block_number == block_number)
        {
            Some(contracts) => contracts.contracts.push(record),
            None => shard.push(ContractsForBlock {
                block_number,
                contracts: vec![record],
            }),
        }
        self
    }

    /// Cuts every stream into chunk files of at most `bytes` bytes, regardless of where
    /// records end.
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = Some(bytes.max(1));
        self
    }

    pub fn build(mut self) -> anyhow::Result<Dump> {
        let dir = tempfile::tempdir()?;
        let layout = DumpLayout::new(dir.path());

        if let Some(block_number) = self.latest_block {
            let cursor = CursorRecord {
                block_number,
                time: 1_600_000_000,
            };
            std::fs::write(layout.cursor_path(), encode(&[cursor.to_rlp()]))?;
        }

        self.headers.sort_by_key(|header| header.number);
        let headers: Vec<_> = self.headers.iter().map(BlockHeaderRecord::to_rlp).collect();
        self.write_stream(&layout, &DumpLayout::blocks_stream(), &headers)?;

        for (shard, mut records) in std::mem::take(&mut self.contracts) {
            records.sort_by_key(|contracts| contracts.block_number);
            let records: Vec<_> = records.iter().map(ContractsForBlock::to_rlp).collect();
            self.write_stream(&layout, &DumpLayout::contracts_stream(&shard), &records)?;
        }
        Ok(Dump { dir })
    }

    fn write_stream(
        &self,
        layout: &DumpLayout,
        stream: &str,
        records: &[Rlp],
    ) -> anyhow::Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let encoded = encode(records);
        let chunk_size = self.chunk_size.unwrap_or(encoded.len());
        for (i, chunk) in encoded.chunks(chunk_size).enumerate() {
            std::fs::write(layout.chunk_path(stream, i as u32 + 1), chunk)?;
        }
        Ok(())
    }
}

fn encode(records: &[Rlp]) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        record.encode(&mut out);
    }
    out
}

/// A dump on disk, removed on drop.
#[derive(Debug)]
pub struct Dump {
    dir: TempDir,
}

impl Dump {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source(&self) -> LocalDumpSource {
        LocalDumpSource::new(self.dir.path())
    }
}
