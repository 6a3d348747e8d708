use crate::cursor::ChunkedStreamCursor;
use crate::layout::{DumpLayout, read_optional};
use crate::sharded::ShardedRecordIndex;
use crate::state_cache::StateCache;
use crate::stream::BlockScopedStream;
use alloy::primitives::{Address, BlockNumber, Bytes};
use std::path::PathBuf;
use std::sync::Arc;
use the_index_rlp::decode_from_stream;
use the_index_storage_api::{DataSource, ReadContractState, StorageError, StorageResult};
use the_index_types::{BlockHeaderRecord, ContractsForBlock, CursorRecord};

/// [`DataSource`] over a history dump directory on the local file system.
#[derive(Debug)]
pub struct LocalDumpSource {
    layout: DumpLayout,
    headers: BlockScopedStream<BlockHeaderRecord>,
    contracts: ShardedRecordIndex,
    state: StateCache,
}

impl LocalDumpSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let layout = DumpLayout::new(data_dir);
        Self {
            headers: BlockScopedStream::new(ChunkedStreamCursor::blocks(layout.clone())),
            contracts: ShardedRecordIndex::new(layout.clone()),
            state: StateCache::default(),
            layout,
        }
    }

    pub fn state_cache(&self) -> &StateCache {
        &self.state
    }
}

#[async_trait::async_trait]
impl DataSource for LocalDumpSource {
    async fn latest_block_number(&mut self) -> StorageResult<BlockNumber> {
        let path = self.layout.cursor_path();
        let Some(buffer) = read_optional(&path).await? else {
            tracing::info!(path = %path.display(), "no cursor file, dump is empty");
            return Ok(0);
        };
        let stream = || "cursor".to_owned();
        let (node, _) = decode_from_stream(&buffer).map_err(|source| StorageError::Rlp {
            stream: stream(),
            source,
        })?;
        if node.is_empty_list() {
            return Ok(0);
        }
        let cursor = CursorRecord::try_from(&node).map_err(|source| StorageError::Record {
            stream: stream(),
            source,
        })?;
        Ok(cursor.block_number)
    }

    async fn find_header_for_block(
        &mut self,
        block_number: BlockNumber,
    ) -> StorageResult<Option<BlockHeaderRecord>> {
        let header = self.headers.find(block_number).await?;
        Ok(header.as_deref().cloned())
    }

    async fn find_contracts_for_block(
        &mut self,
        shard: &str,
        block_number: BlockNumber,
    ) -> StorageResult<Option<Arc<ContractsForBlock>>> {
        if !self.state.is_enabled() {
            return self
                .contracts
                .find_contracts_for_block(shard, block_number, None)
                .await;
        }
        let state = &mut self.state;
        let absorb: &mut (dyn FnMut(&ContractsForBlock) + Send) =
            &mut |record| state.absorb(record);
        self.contracts
            .find_contracts_for_block(shard, block_number, Some(absorb))
            .await
    }

    fn track_state(&mut self) {
        self.state.enable();
    }

    fn is_tracking_state(&self) -> bool {
        self.state.is_enabled()
    }
}

impl ReadContractState for LocalDumpSource {
    fn is_tracked_contract(&self, address: &Address) -> StorageResult<bool> {
        self.state.is_tracked_contract(address)
    }

    fn deployed_at_block(&self, address: &Address) -> StorageResult<Option<BlockNumber>> {
        self.state.deployed_at_block(address)
    }

    fn get_contract_state(&self, address: &Address, key: &[u8]) -> StorageResult<Bytes> {
        self.state.get_contract_state(address, key)
    }

    fn get_contract_code(&self, address: &Address) -> StorageResult<Bytes> {
        self.state.get_contract_code(address)
    }

    fn get_contract_balance(&self, address: &Address) -> StorageResult<Bytes> {
        self.state.get_contract_balance(address)
    }
}
