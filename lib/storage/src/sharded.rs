use crate::cursor::ChunkedStreamCursor;
use crate::layout::{DumpLayout, validate_shard};
use crate::stream::BlockScopedStream;
use alloy::primitives::BlockNumber;
use std::collections::HashMap;
use std::sync::Arc;
use the_index_storage_api::StorageResult;
use the_index_types::ContractsForBlock;

/// Contract record streams keyed by shard, opened on first use.
///
/// Each shard keeps its own position: looking far ahead in one shard does not move any other.
#[derive(Debug)]
pub struct ShardedRecordIndex {
    layout: DumpLayout,
    shards: HashMap<String, BlockScopedStream<ContractsForBlock>>,
}

impl ShardedRecordIndex {
    pub fn new(layout: DumpLayout) -> Self {
        Self {
            layout,
            shards: HashMap::new(),
        }
    }

    pub async fn find_contracts_for_block(
        &mut self,
        shard: &str,
        block_number: BlockNumber,
        visit: Option<&mut (dyn FnMut(&ContractsForBlock) + Send)>,
    ) -> StorageResult<Option<Arc<ContractsForBlock>>> {
        validate_shard(shard)?;
        let stream = self.shards.entry(shard.to_owned()).or_insert_with(|| {
            tracing::debug!(shard, "opening contracts shard");
            BlockScopedStream::new(ChunkedStreamCursor::contracts(self.layout.clone(), shard))
        });
        stream.find_with(block_number, visit).await
    }

    /// Number of shards opened so far.
    pub fn open_shards(&self) -> usize {
        self.shards.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, Bytes, address};
    use alloy::rlp::Encodable;
    use assert_matches::assert_matches;
    use the_index_storage_api::StorageError;
    use the_index_types::{ContractRecord, StateDiff};

    const A: Address = address!("aa00000000000000000000000000000000000001");
    const B: Address = address!("bb00000000000000000000000000000000000002");

    fn contracts(block_number: u64, address: Address) -> ContractsForBlock {
        ContractsForBlock {
            block_number,
            contracts: vec![ContractRecord {
                address,
                logs: vec![],
                code: Bytes::new(),
                states: vec![StateDiff {
                    key: Bytes::from_static(&[1]),
                    value: Bytes::copy_from_slice(&block_number.to_be_bytes()),
                }],
                balance: None,
            }],
        }
    }

    fn write_shard(layout: &DumpLayout, shard: &str, records: &[ContractsForBlock]) {
        let mut chunk = Vec::new();
        for record in records {
            record.to_rlp().encode(&mut chunk);
        }
        std::fs::write(
            layout.chunk_path(&DumpLayout::contracts_stream(shard), 1),
            chunk,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn shards_advance_independently() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DumpLayout::new(dir.path());
        write_shard(&layout, "aa", &[contracts(2, A), contracts(9, A)]);
        write_shard(&layout, "bb", &[contracts(3, B), contracts(4, B)]);
        let mut index = ShardedRecordIndex::new(layout);

        let found = index.find_contracts_for_block("aa", 9, None).await.unwrap();
        assert_eq!(found.unwrap().block_number, 9);
        // shard `bb` is untouched by the jump in `aa`
        let found = index.find_contracts_for_block("bb", 3, None).await.unwrap();
        assert_eq!(found.unwrap().records_of(&B).count(), 1);
        let found = index.find_contracts_for_block("bb", 4, None).await.unwrap();
        assert_eq!(found.unwrap().block_number, 4);
        assert_eq!(index.open_shards(), 2);
    }

    #[tokio::test]
    async fn gaps_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DumpLayout::new(dir.path());
        write_shard(&layout, "aa", &[contracts(2, A), contracts(5, A)]);
        let mut index = ShardedRecordIndex::new(layout);

        for block in [1, 3, 4] {
            let found = index.find_contracts_for_block("aa", block, None).await.unwrap();
            assert!(found.is_none(), "{block}");
        }
        // block 2 was passed over while looking for 3
        assert!(index.find_contracts_for_block("aa", 5, None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn same_block_is_answered_repeatedly() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DumpLayout::new(dir.path());
        write_shard(&layout, "aa", &[contracts(2, A)]);
        let mut index = ShardedRecordIndex::new(layout);

        let first = index.find_contracts_for_block("aa", 2, None).await.unwrap();
        let second = index.find_contracts_for_block("aa", 2, None).await.unwrap();
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[tokio::test]
    async fn invalid_shard_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = ShardedRecordIndex::new(DumpLayout::new(dir.path()));
        assert_matches!(
            index.find_contracts_for_block("AA", 1, None).await,
            Err(StorageError::InvalidShard(shard)) if shard == "AA"
        );
        assert_eq!(index.open_shards(), 0);
    }
}
