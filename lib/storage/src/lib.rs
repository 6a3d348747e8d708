//! File-backed access to a history dump: chunked stream cursors, the per-shard contract
//! index and the optional contract state cache.

mod cursor;
mod layout;
mod metrics;
mod sharded;
mod source;
mod state_cache;
mod stream;

pub use cursor::ChunkedStreamCursor;
pub use layout::{DumpLayout, validate_shard};
pub use sharded::ShardedRecordIndex;
pub use source::LocalDumpSource;
pub use state_cache::{StateCache, TrackedContract};
pub use stream::BlockScopedStream;
