use alloy::primitives::{Address, B256, BlockNumber, U256, b256, keccak256};
use std::collections::{BTreeMap, BTreeSet};
use the_index_replay::{AnalysisPlugin, BlockView};
use the_index_rlp::to_u256;

/// `keccak256("Transfer(address,address,uint256)")`
pub const TRANSFER_TOPIC: B256 =
    b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// Storage slot of `holder` in a Solidity `mapping(address => uint256)` declared at `slot`.
pub fn balance_slot(holder: Address, slot: u64) -> B256 {
    let mut preimage = [0u8; 64];
    preimage[12..32].copy_from_slice(holder.as_slice());
    preimage[32..].copy_from_slice(&U256::from(slot).to_be_bytes::<32>());
    keccak256(preimage)
}

/// Follows the holders of an ERC-20 token.
///
/// Holders are discovered from `Transfer` events; their balances are read straight from the
/// token's storage rather than summed up from transfer amounts.
#[derive(Debug)]
pub struct TokenHolders {
    token: Address,
    balances_slot: u64,
    balances: BTreeMap<Address, U256>,
    transfers: u64,
}

impl TokenHolders {
    pub fn new(token: Address, balances_slot: u64) -> Self {
        Self {
            token,
            balances_slot,
            balances: BTreeMap::new(),
            transfers: 0,
        }
    }

    /// Current non-zero balances.
    pub fn balances(&self) -> &BTreeMap<Address, U256> {
        &self.balances
    }

    pub fn transfers(&self) -> u64 {
        self.transfers
    }
}

/// Indexed address parameter, right-aligned in a topic.
fn topic_address(topic: &B256) -> Address {
    Address::from_slice(&topic[12..])
}

#[async_trait::async_trait]
impl AnalysisPlugin for TokenHolders {
    async fn on_init(&mut self, view: &mut BlockView<'_>) -> anyhow::Result<()> {
        view.data_source_mut().track_state();
        tracing::info!(token = %self.token, slot = self.balances_slot, "following token holders");
        Ok(())
    }

    async fn on_block(
        &mut self,
        block_number: BlockNumber,
        view: &mut BlockView<'_>,
    ) -> anyhow::Result<()> {
        let mut token = view.contract(self.token);
        if !token.has_state_changes().await? || !token.is_deployed().await? {
            return Ok(());
        }

        let mut touched = BTreeSet::new();
        for event in token.get_events(Some(TRANSFER_TOPIC)).await? {
            // ERC-20 transfers index both `from` and `to`
            let [from, to] = event.topics.as_slice() else {
                continue;
            };
            self.transfers += 1;
            touched.extend([topic_address(from), topic_address(to)]);
        }
        touched.remove(&Address::ZERO);

        for holder in touched {
            let raw = token
                .get_storage_at(balance_slot(holder, self.balances_slot))
                .await?;
            let balance = to_u256(&raw)?;
            tracing::trace!(block_number, %holder, %balance, "balance updated");
            if balance.is_zero() {
                self.balances.remove(&holder);
            } else {
                self.balances.insert(holder, balance);
            }
        }
        Ok(())
    }

    async fn on_done(&mut self) -> anyhow::Result<()> {
        let mut top: Vec<_> = self.balances.iter().collect();
        top.sort_by(|a, b| b.1.cmp(a.1));
        for (holder, balance) in top.into_iter().take(10) {
            tracing::info!(%holder, %balance, "top holder");
        }
        tracing::info!(
            token = %self.token,
            holders = self.balances.len(),
            transfers = self.transfers,
            "token holders scan done"
        );
        Ok(())
    }
}
