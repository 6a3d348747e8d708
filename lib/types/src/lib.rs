mod record;
mod view;

pub use record::{
    BlockHeaderRecord, ContractRecord, ContractsForBlock, CursorRecord, LogRecord, StateDiff,
    block_number_of,
};
pub use view::{Block, Event, shard_of};

use the_index_rlp::RlpError;

pub type RecordResult<T> = Result<T, RecordError>;

/// A record decoded fine as RLP but does not have the shape its stream promises.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("malformed {record}: expected a list (field {field:?})")]
    ExpectedList {
        record: &'static str,
        field: Option<usize>,
    },
    #[error("malformed {record}: expected a byte string at field {field}")]
    ExpectedBytes { record: &'static str, field: usize },
    #[error("malformed {record}: missing field {field}")]
    MissingField { record: &'static str, field: usize },
    #[error("malformed {record}: field {field} has {actual} bytes, expected {expected}")]
    WrongLength {
        record: &'static str,
        field: usize,
        expected: usize,
        actual: usize,
    },
    #[error("malformed {record}: field {field}: {source}")]
    Integer {
        record: &'static str,
        field: usize,
        #[source]
        source: RlpError,
    },
}
