use alloy::primitives::BlockNumber;
use the_index_replay::{AnalysisPlugin, BlockView};
use the_index_rlp::to_hex_string;

/// Reports every block whose hash starts with a given hex prefix.
#[derive(Debug)]
pub struct BlockHashPrefix {
    prefix: String,
    matches: Vec<BlockNumber>,
}

impl BlockHashPrefix {
    pub fn new(prefix: &str) -> anyhow::Result<Self> {
        let prefix = prefix.to_ascii_lowercase();
        let Some(digits) = prefix.strip_prefix("0x") else {
            anyhow::bail!("hash prefix `{prefix}` does not start with 0x");
        };
        if !digits.bytes().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!("hash prefix `{prefix}` is not hex");
        }
        Ok(Self {
            prefix,
            matches: Vec::new(),
        })
    }

    pub fn matches(&self) -> &[BlockNumber] {
        &self.matches
    }
}

#[async_trait::async_trait]
impl AnalysisPlugin for BlockHashPrefix {
    async fn on_block(
        &mut self,
        block_number: BlockNumber,
        view: &mut BlockView<'_>,
    ) -> anyhow::Result<()> {
        let Some(block) = view.get_block().await? else {
            tracing::warn!(block_number, "no header for block");
            return Ok(());
        };
        let hash = to_hex_string(block.hash.as_slice());
        if hash.starts_with(&self.prefix) {
            tracing::info!(block_number, %hash, timestamp = block.timestamp, "hash prefix match");
            self.matches.push(block_number);
        }
        Ok(())
    }

    async fn on_done(&mut self) -> anyhow::Result<()> {
        tracing::info!(
            prefix = %self.prefix,
            matches = self.matches.len(),
            "block hash prefix scan done"
        );
        Ok(())
    }
}
