use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use the_index_storage_api::{StorageError, StorageResult};

const CURSOR_FILE: &str = "cursor.rlp";
const BLOCKS_STREAM: &str = "blocks";
const CONTRACTS_STREAM_PREFIX: &str = "contracts-";

/// File naming of a history dump directory:
///
/// ```text
/// cursor.rlp
/// blocks-00001.rlp, blocks-00002.rlp, ...
/// contracts-{shard}-00001.rlp, ...
/// ```
///
/// Chunk indices start at 1 and are zero padded to five digits.
#[derive(Debug, Clone)]
pub struct DumpLayout {
    root: PathBuf,
}

impl DumpLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn cursor_path(&self) -> PathBuf {
        self.root.join(CURSOR_FILE)
    }

    pub fn chunk_path(&self, stream: &str, chunk: u32) -> PathBuf {
        self.root.join(format!("{stream}-{chunk:05}.rlp"))
    }

    pub fn blocks_stream() -> &'static str {
        BLOCKS_STREAM
    }

    pub fn contracts_stream(shard: &str) -> String {
        format!("{CONTRACTS_STREAM_PREFIX}{shard}")
    }
}

/// A shard is the first address byte as two lowercase hex characters.
pub fn validate_shard(shard: &str) -> StorageResult<()> {
    let valid = shard.len() == 2
        && shard
            .bytes()
            .all(|c| c.is_ascii_digit() || (b'a'..=b'f').contains(&c));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidShard(shard.to_owned()))
    }
}

/// Reads a whole file, `None` if it does not exist.
pub(crate) async fn read_optional(path: &Path) -> StorageResult<Option<Bytes>> {
    match tokio::fs::read(path).await {
        Ok(contents) => Ok(Some(Bytes::from(contents))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StorageError::Io {
            path: path.to_owned(),
            source,
        }),
    }
}
