//! Small analyses that come with the binary.

mod block_hash_prefix;
mod token_holders;

pub use block_hash_prefix::BlockHashPrefix;
pub use token_holders::{TRANSFER_TOPIC, TokenHolders, balance_slot};

use crate::config::{PluginKind, ReplayConfig};
use alloy::primitives::Address;
use anyhow::Context;
use the_index_replay::AnalysisPlugin;

pub fn build_plugin(config: &ReplayConfig) -> anyhow::Result<Box<dyn AnalysisPlugin>> {
    let plugin: Box<dyn AnalysisPlugin> = match config.plugin {
        PluginKind::BlockHashPrefix => Box::new(BlockHashPrefix::new(&config.hash_prefix)?),
        PluginKind::TokenHolders => {
            let token = config
                .token_address
                .as_deref()
                .context("`token-holders` needs `token_address`")?
                .parse::<Address>()
                .context("invalid `token_address`")?;
            Box::new(TokenHolders::new(token, config.token_balances_slot))
        }
    };
    Ok(plugin)
}
