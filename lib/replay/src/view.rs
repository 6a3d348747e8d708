use crate::error::{ReplayError, ReplayResult};
use crate::executor::{CallExecutor, CallOptions, CallOutcome, CallRequest, DEFAULT_CALLER};
use crate::metrics::REPLAY_METRICS;
use alloy::primitives::{Address, B256, BlockNumber, Bytes};
use std::sync::Arc;
use the_index_storage_api::DataSource;
use the_index_types::{Block, ContractsForBlock, Event, shard_of};

/// Everything a plugin may look at while one block is being replayed.
pub struct BlockView<'a> {
    block_number: BlockNumber,
    source: &'a mut dyn DataSource,
    executor: Option<&'a dyn CallExecutor>,
}

impl<'a> BlockView<'a> {
    pub(crate) fn new(
        block_number: BlockNumber,
        source: &'a mut dyn DataSource,
        executor: Option<&'a dyn CallExecutor>,
    ) -> Self {
        Self {
            block_number,
            source,
            executor,
        }
    }

    /// Block being replayed, `0` during initialization.
    pub fn block_number(&self) -> BlockNumber {
        self.block_number
    }

    pub fn data_source(&self) -> &dyn DataSource {
        &*self.source
    }

    /// Low-level access, e.g. to enable state tracking in `on_init`.
    pub fn data_source_mut(&mut self) -> &mut dyn DataSource {
        &mut *self.source
    }

    /// Header of the current block, `None` if the dump has none for it.
    pub async fn get_block(&mut self) -> ReplayResult<Option<Block>> {
        let header = self.source.find_header_for_block(self.block_number).await?;
        Ok(header.as_ref().map(Block::from))
    }

    pub fn contract(&mut self, address: Address) -> ContractView<'_> {
        ContractView {
            address,
            shard: shard_of(&address),
            block_number: self.block_number,
            source: &mut *self.source,
            executor: self.executor,
        }
    }
}

/// One contract as of the current block.
pub struct ContractView<'v> {
    address: Address,
    shard: String,
    block_number: BlockNumber,
    source: &'v mut dyn DataSource,
    executor: Option<&'v dyn CallExecutor>,
}

impl ContractView<'_> {
    pub fn address(&self) -> Address {
        self.address
    }

    /// Contract activity of this contract's shard in the current block. Also advances the
    /// shard, which brings the state cache up to date for every contract of the shard.
    async fn contracts_for_block(&mut self) -> ReplayResult<Option<Arc<ContractsForBlock>>> {
        Ok(self
            .source
            .find_contracts_for_block(&self.shard, self.block_number)
            .await?)
    }

    /// Events emitted by this contract in the current block, optionally only those with the
    /// given signature hash. Anonymous logs (no topics) are never returned.
    pub async fn get_events(&mut self, topic0: Option<B256>) -> ReplayResult<Vec<Event>> {
        let Some(contracts) = self.contracts_for_block().await? else {
            return Ok(Vec::new());
        };
        let events = contracts
            .records_of(&self.address)
            .flat_map(|record| &record.logs)
            .filter_map(|log| Event::from_log(self.address, log))
            .filter(|event| topic0.is_none_or(|topic0| event.topic0 == topic0))
            .collect();
        Ok(events)
    }

    /// Whether the current block changed this contract's storage or balance.
    pub async fn has_state_changes(&mut self) -> ReplayResult<bool> {
        let Some(contracts) = self.contracts_for_block().await? else {
            return Ok(false);
        };
        Ok(contracts
            .records_of(&self.address)
            .any(|record| record.has_state_changes()))
    }

    /// Whether the contract has code as of the current block. Requires state tracking.
    pub async fn is_deployed(&mut self) -> ReplayResult<bool> {
        Ok(!self.get_code().await?.is_empty())
    }

    pub async fn get_code(&mut self) -> ReplayResult<Bytes> {
        self.contracts_for_block().await?;
        Ok(self.source.get_contract_code(&self.address)?)
    }

    /// Storage slot value, empty if the slot was never written. Requires state tracking.
    pub async fn get_storage_at(&mut self, slot: B256) -> ReplayResult<Bytes> {
        self.contracts_for_block().await?;
        Ok(self.source.get_contract_state(&self.address, slot.as_slice())?)
    }

    pub async fn get_balance(&mut self) -> ReplayResult<Bytes> {
        self.contracts_for_block().await?;
        Ok(self.source.get_contract_balance(&self.address)?)
    }

    /// Simulates a read-only call with ABI encoded `calldata` against the current state.
    pub async fn call(
        &mut self,
        calldata: Bytes,
        options: CallOptions,
    ) -> ReplayResult<CallOutcome> {
        if !self.is_deployed().await? {
            return Err(ReplayError::ContractNotDeployed(self.address));
        }
        let executor = self.executor.ok_or(ReplayError::NoCallExecutor)?;
        let request = CallRequest {
            to: self.address,
            from: options.from.unwrap_or(DEFAULT_CALLER),
            calldata,
            gas_limit: options.gas_limit,
        };
        tracing::trace!(
            to = %request.to,
            from = %request.from,
            block_number = self.block_number,
            "contract call"
        );
        REPLAY_METRICS.contract_calls.inc();
        executor
            .call(self.block_number, &*self.source, request)
            .await
            .map_err(ReplayError::Executor)
    }
}
