use alloy::primitives::{Address, BlockNumber, Bytes, address};
use the_index_storage_api::DataSource;
use the_index_types::Event;

/// Caller used when [`CallOptions::from`] is not set.
pub const DEFAULT_CALLER: Address = address!("1111111111111111111111111111111111111111");

/// Read-only contract call as handed to a [`CallExecutor`]. Calldata is already ABI encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub to: Address,
    pub from: Address,
    pub calldata: Bytes,
    pub gas_limit: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    pub from: Option<Address>,
    pub gas_limit: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOutcome {
    pub return_data: Bytes,
    /// Events emitted during the call, by any contract.
    pub logs: Vec<Event>,
    pub gas_used: u64,
}

/// EVM used to simulate contract calls against the replayed state.
///
/// Implementations read code, storage and balances through the provided data source, which
/// reflects the state at the end of `block_number` for contracts seen so far.
#[async_trait::async_trait]
pub trait CallExecutor: Send + Sync {
    async fn call(
        &self,
        block_number: BlockNumber,
        state: &dyn DataSource,
        request: CallRequest,
    ) -> anyhow::Result<CallOutcome>;
}
