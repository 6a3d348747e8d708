use crate::ReadContractState;
use alloy::primitives::BlockNumber;
use std::path::PathBuf;
use std::sync::Arc;
use the_index_rlp::RlpError;
use the_index_types::{BlockHeaderRecord, ContractsForBlock, RecordError};

/// Raw access to a history dump, one monotonically advancing block at a time.
///
/// Lookups must be issued with non-decreasing block numbers per stream: implementations
/// only ever read forward. Asking again for the block that was looked up last returns the
/// same answer.
#[async_trait::async_trait]
pub trait DataSource: ReadContractState + Send + Sync {
    /// Latest block the dump claims to have fully captured, `0` if it declares none.
    async fn latest_block_number(&mut self) -> StorageResult<BlockNumber>;

    /// Streams block headers until `block_number` is reached.
    async fn find_header_for_block(
        &mut self,
        block_number: BlockNumber,
    ) -> StorageResult<Option<BlockHeaderRecord>>;

    /// Streams contract records of `shard` until `block_number` is reached.
    /// `None` if the shard saw no activity in that block.
    async fn find_contracts_for_block(
        &mut self,
        shard: &str,
        block_number: BlockNumber,
    ) -> StorageResult<Option<Arc<ContractsForBlock>>>;

    /// Starts projecting contract records into the state cache. Only records scanned
    /// after this call are reflected, so it belongs in plugin initialization.
    fn track_state(&mut self);

    fn is_tracking_state(&self) -> bool;
}

pub type StorageResult<Ok> = Result<Ok, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("in stream `{stream}`: {source}")]
    Rlp {
        stream: String,
        #[source]
        source: RlpError,
    },
    #[error("in stream `{stream}`: {source}")]
    Record {
        stream: String,
        #[source]
        source: RecordError,
    },
    #[error("stream `{stream}` ends in the middle of a record ({dangling} bytes left)")]
    TruncatedStream { stream: String, dangling: usize },
    #[error("state is not tracked, call `DataSource::track_state` during init")]
    TrackingDisabled,
    #[error("invalid shard `{0}`, expected two lowercase hex characters")]
    InvalidShard(String),
}
