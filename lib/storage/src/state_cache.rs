use crate::metrics::STORAGE_METRICS;
use alloy::primitives::{Address, BlockNumber, Bytes};
use std::collections::HashMap;
use the_index_storage_api::{ReadContractState, StorageError, StorageResult};
use the_index_types::{ContractRecord, ContractsForBlock};

/// Latest code, balance and storage of every contract seen so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedContract {
    pub deployed_at_block: BlockNumber,
    pub code: Bytes,
    pub balance: Bytes,
    pub storage: HashMap<Bytes, Bytes>,
}

/// Projection of consumed contract records onto per-address state.
///
/// Disabled until [`StateCache::enable`] is called; absorbing is a no-op and every query fails
/// with [`StorageError::TrackingDisabled`] until then.
#[derive(Debug, Default)]
pub struct StateCache {
    enabled: bool,
    contracts: HashMap<Address, TrackedContract>,
}

impl StateCache {
    pub fn enable(&mut self) {
        if !self.enabled {
            tracing::info!("contract state tracking enabled");
        }
        self.enabled = true;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn absorb(&mut self, contracts: &ContractsForBlock) {
        for record in &contracts.contracts {
            self.absorb_contract(contracts.block_number, record);
        }
    }

    pub fn absorb_contract(&mut self, block_number: BlockNumber, record: &ContractRecord) {
        if !self.enabled {
            return;
        }
        let tracked = self.contracts.entry(record.address).or_insert_with(|| {
            tracing::trace!(address = %record.address, block_number, "new contract");
            TrackedContract {
                deployed_at_block: block_number,
                ..Default::default()
            }
        });
        for diff in &record.states {
            tracked.storage.insert(diff.key.clone(), diff.value.clone());
        }
        if !record.code.is_empty() {
            tracked.code = record.code.clone();
        }
        if let Some(balance) = &record.balance {
            tracked.balance = balance.clone();
        }

        STORAGE_METRICS.absorbed_contract_records.inc();
        STORAGE_METRICS.tracked_contracts.set(self.contracts.len());
    }

    pub fn tracked_contract(&self, address: &Address) -> StorageResult<Option<&TrackedContract>> {
        self.ensure_enabled()?;
        Ok(self.contracts.get(address))
    }

    fn ensure_enabled(&self) -> StorageResult<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(StorageError::TrackingDisabled)
        }
    }
}

impl ReadContractState for StateCache {
    fn is_tracked_contract(&self, address: &Address) -> StorageResult<bool> {
        Ok(self.tracked_contract(address)?.is_some())
    }

    fn deployed_at_block(&self, address: &Address) -> StorageResult<Option<BlockNumber>> {
        Ok(self
            .tracked_contract(address)?
            .map(|contract| contract.deployed_at_block))
    }

    fn get_contract_state(&self, address: &Address, key: &[u8]) -> StorageResult<Bytes> {
        let value = self.tracked_contract(address)?.and_then(|contract| {
            contract
                .storage
                .get(&Bytes::copy_from_slice(key))
                .cloned()
        });
        Ok(value.unwrap_or_default())
    }

    fn get_contract_code(&self, address: &Address) -> StorageResult<Bytes> {
        Ok(self
            .tracked_contract(address)?
            .map(|contract| contract.code.clone())
            .unwrap_or_default())
    }

    fn get_contract_balance(&self, address: &Address) -> StorageResult<Bytes> {
        Ok(self
            .tracked_contract(address)?
            .map(|contract| contract.balance.clone())
            .unwrap_or_default())
    }
}
