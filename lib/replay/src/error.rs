use crate::processor::ReplayState;
use alloy::primitives::Address;
use std::fmt;
use the_index_storage_api::StorageError;
use vise::EncodeLabelValue;

/// Plugin callback that was running when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelValue)]
#[metrics(label = "hook", rename_all = "snake_case")]
pub enum Hook {
    Init,
    Block,
    Done,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Hook::Init => "on_init",
            Hook::Block => "on_block",
            Hook::Done => "on_done",
        })
    }
}

pub type ReplayResult<T> = Result<T, ReplayError>;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("plugin failed in `{hook}`: {source:#}")]
    Plugin { hook: Hook, source: anyhow::Error },
    #[error("call executor failed: {0:#}")]
    Executor(anyhow::Error),
    #[error("contract {0} is not deployed, check `is_deployed` before calling it")]
    ContractNotDeployed(Address),
    #[error("no call executor configured")]
    NoCallExecutor,
    #[error("cannot {operation} in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: ReplayState,
    },
}
