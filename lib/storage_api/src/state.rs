use crate::StorageResult;
use alloy::primitives::{Address, BlockNumber, Bytes};

/// Latest known state of contracts seen so far in the dump.
///
/// All methods fail with [`StorageError::TrackingDisabled`](crate::StorageError::TrackingDisabled)
/// unless tracking was enabled. Unknown addresses and slots read as empty bytes.
pub trait ReadContractState {
    /// Have contract records for this address been seen so far.
    fn is_tracked_contract(&self, address: &Address) -> StorageResult<bool>;

    /// Block in which the address first showed up in the dump.
    fn deployed_at_block(&self, address: &Address) -> StorageResult<Option<BlockNumber>>;

    fn get_contract_state(&self, address: &Address, key: &[u8]) -> StorageResult<Bytes>;

    fn get_contract_code(&self, address: &Address) -> StorageResult<Bytes>;

    fn get_contract_balance(&self, address: &Address) -> StorageResult<Bytes>;
}
