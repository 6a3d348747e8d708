use crate::layout::{DumpLayout, read_optional};
use crate::metrics::STORAGE_METRICS;
use alloy::primitives::BlockNumber;
use bytes::{Bytes, BytesMut};
use the_index_rlp::{Rlp, decode_from_stream};
use the_index_storage_api::{StorageError, StorageResult};
use the_index_types::block_number_of;

/// Forward-only reader over one logical stream split into numbered chunk files.
///
/// Records are located by block number; targets must not decrease between calls. A record
/// that lies beyond the current target stays buffered for a later call, records older than the
/// target are consumed and skipped. Every record is returned at most once, so repeated
/// records for an already returned block are skipped too. Chunk boundaries are invisible to
/// callers: a record split over two files is stitched back together.
#[derive(Debug)]
pub struct ChunkedStreamCursor {
    layout: DumpLayout,
    stream: String,
    /// Metrics label, the stream name without the shard.
    kind: &'static str,
    buffer: Bytes,
    last_chunk: u32,
    last_seen_block: BlockNumber,
    last_returned_block: Option<BlockNumber>,
    exhausted: bool,
}

impl ChunkedStreamCursor {
    pub fn new(layout: DumpLayout, stream: impl Into<String>, kind: &'static str) -> Self {
        Self {
            layout,
            stream: stream.into(),
            kind,
            buffer: Bytes::new(),
            last_chunk: 0,
            last_seen_block: 0,
            last_returned_block: None,
            exhausted: false,
        }
    }

    pub fn blocks(layout: DumpLayout) -> Self {
        Self::new(layout, DumpLayout::blocks_stream(), "blocks")
    }

    pub fn contracts(layout: DumpLayout, shard: &str) -> Self {
        Self::new(layout, DumpLayout::contracts_stream(shard), "contracts")
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Block number of the record at the head of the stream, or of the last consumed one.
    pub fn last_seen_block(&self) -> BlockNumber {
        self.last_seen_block
    }

    pub async fn find_record_for_block(
        &mut self,
        target: BlockNumber,
    ) -> StorageResult<Option<Rlp>> {
        self.find_record_for_block_with(target, |_, _| Ok(())).await
    }

    /// Like [`Self::find_record_for_block`], but calls `visit` with every record consumed on
    /// the way, including the returned one. Records beyond `target` are not visited.
    #[tracing::instrument(level = "trace", skip(self, visit), fields(stream = %self.stream))]
    pub async fn find_record_for_block_with<F>(
        &mut self,
        target: BlockNumber,
        mut visit: F,
    ) -> StorageResult<Option<Rlp>>
    where
        F: FnMut(BlockNumber, &Rlp) -> StorageResult<()> + Send,
    {
        if target < self.last_seen_block {
            return Ok(None);
        }
        loop {
            // chunk files may be empty
            while self.buffer.is_empty() {
                if !self.load_next_chunk().await? {
                    return Ok(None);
                }
            }

            let (record, remainder) = match decode_from_stream(&self.buffer) {
                Ok(decoded) => decoded,
                Err(err) if err.is_truncation() => {
                    tracing::trace!(
                        buffered = self.buffer.len(),
                        "record continues in the next chunk"
                    );
                    if !self.load_next_chunk().await? {
                        return Err(StorageError::TruncatedStream {
                            stream: self.stream.clone(),
                            dangling: self.buffer.len(),
                        });
                    }
                    continue;
                }
                Err(source) => {
                    return Err(StorageError::Rlp {
                        stream: self.stream.clone(),
                        source,
                    });
                }
            };
            if record.is_empty_list() {
                return Ok(None);
            }

            let block_number = block_number_of(&record).map_err(|source| StorageError::Record {
                stream: self.stream.clone(),
                source,
            })?;
            self.last_seen_block = block_number;
            if block_number > target {
                return Ok(None);
            }

            self.buffer = remainder;
            STORAGE_METRICS.records_consumed[&self.kind].inc();
            visit(block_number, &record)?;

            if block_number == target && self.last_returned_block != Some(target) {
                self.last_returned_block = Some(target);
                return Ok(Some(record));
            }
            tracing::trace!(block_number, "skipping record");
        }
    }

    /// Appends the next chunk to the buffer. `false` once the stream has no further chunk.
    async fn load_next_chunk(&mut self) -> StorageResult<bool> {
        if self.exhausted {
            return Ok(false);
        }
        let chunk_index = self.last_chunk + 1;
        let path = self.layout.chunk_path(&self.stream, chunk_index);

        let latency = STORAGE_METRICS.chunk_load[&self.kind].start();
        let Some(chunk) = read_optional(&path).await? else {
            tracing::debug!(stream = %self.stream, chunk_index, "end of stream");
            self.exhausted = true;
            return Ok(false);
        };
        latency.observe();
        STORAGE_METRICS.chunk_size[&self.kind].observe(chunk.len());
        tracing::debug!(
            stream = %self.stream,
            chunk_index,
            size = chunk.len(),
            carried_over = self.buffer.len(),
            "loaded chunk"
        );

        self.buffer = if self.buffer.is_empty() {
            chunk
        } else {
            let mut joined = BytesMut::with_capacity(self.buffer.len() + chunk.len());
            joined.extend_from_slice(&self.buffer);
            joined.extend_from_slice(&chunk);
            joined.freeze()
        };
        self.last_chunk = chunk_index;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::rlp::Encodable;
    use assert_matches::assert_matches;
    use std::path::Path;

    /// `[block_number, tag]` records written back to back.
    fn encode_records(records: &[(u64, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (block_number, tag) in records {
            let record = Rlp::List(vec![
                Rlp::from_u64(*block_number),
                Rlp::from_slice(tag.as_bytes()),
            ]);
            record.encode(&mut out);
        }
        out
    }

    fn write_chunks(dir: &Path, stream: &str, chunks: &[Vec<u8>]) {
        let layout = DumpLayout::new(dir);
        for (i, chunk) in chunks.iter().enumerate() {
            std::fs::write(layout.chunk_path(stream, i as u32 + 1), chunk).unwrap();
        }
    }

    fn tag(record: Option<Rlp>) -> Option<String> {
        record.map(|record| {
            let tag = record.as_list().unwrap()[1].as_bytes().unwrap();
            String::from_utf8(tag.to_vec()).unwrap()
        })
    }

    #[tokio::test]
    async fn monotonic_lookups() {
        let dir = tempfile::tempdir().unwrap();
        let records = encode_records(&[(1, "a"), (3, "b"), (3, "c"), (7, "d")]);
        write_chunks(dir.path(), "blocks", &[records]);
        let mut cursor = ChunkedStreamCursor::blocks(DumpLayout::new(dir.path()));

        assert_eq!(tag(cursor.find_record_for_block(2).await.unwrap()), None);
        assert_eq!(cursor.last_seen_block(), 3);
        assert_eq!(
            tag(cursor.find_record_for_block(3).await.unwrap()),
            Some("b".to_owned())
        );
        // the duplicate record for 3 is skipped, not returned
        assert_eq!(tag(cursor.find_record_for_block(3).await.unwrap()), None);
        assert_eq!(
            tag(cursor.find_record_for_block(7).await.unwrap()),
            Some("d".to_owned())
        );
        assert_eq!(tag(cursor.find_record_for_block(8).await.unwrap()), None);
        // never rewinds
        assert_eq!(tag(cursor.find_record_for_block(1).await.unwrap()), None);
    }

    #[tokio::test]
    async fn records_split_across_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let long_tag = "z".repeat(100);
        let records = encode_records(&[(1, "a"), (2, long_tag.as_str()), (3, "c")]);
        // cut inside the second record's payload, and once more right after it
        let first_end = encode_records(&[(1, "a")]).len();
        let cut = first_end + 10;
        let second_end = first_end + encode_records(&[(2, long_tag.as_str())]).len();
        write_chunks(
            dir.path(),
            "blocks",
            &[
                records[..cut].to_vec(),
                records[cut..second_end].to_vec(),
                records[second_end..].to_vec(),
            ],
        );
        let mut cursor = ChunkedStreamCursor::blocks(DumpLayout::new(dir.path()));

        for (block, expected) in [(1, "a"), (2, long_tag.as_str()), (3, "c")] {
            assert_eq!(
                tag(cursor.find_record_for_block(block).await.unwrap()),
                Some(expected.to_owned())
            );
        }
        assert_eq!(tag(cursor.find_record_for_block(4).await.unwrap()), None);
    }

    #[tokio::test]
    async fn truncated_last_chunk_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let records = encode_records(&[(1, "a"), (2, "bbbb")]);
        write_chunks(dir.path(), "blocks", &[records[..records.len() - 2].to_vec()]);
        let mut cursor = ChunkedStreamCursor::blocks(DumpLayout::new(dir.path()));

        assert!(cursor.find_record_for_block(1).await.unwrap().is_some());
        assert_matches!(
            cursor.find_record_for_block(2).await,
            Err(StorageError::TruncatedStream { dangling, .. }) if dangling > 0
        );
    }

    #[tokio::test]
    async fn missing_stream_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut cursor = ChunkedStreamCursor::contracts(DumpLayout::new(dir.path()), "ab");
        assert_eq!(cursor.stream(), "contracts-ab");
        assert!(cursor.find_record_for_block(1).await.unwrap().is_none());
        assert!(cursor.find_record_for_block(100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_chunk_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_chunks(dir.path(), "blocks", &[Vec::new(), encode_records(&[(4, "x")])]);
        let mut cursor = ChunkedStreamCursor::blocks(DumpLayout::new(dir.path()));
        assert_eq!(
            tag(cursor.find_record_for_block(4).await.unwrap()),
            Some("x".to_owned())
        );
    }

    #[tokio::test]
    async fn empty_chunk_between_records() {
        let dir = tempfile::tempdir().unwrap();
        write_chunks(
            dir.path(),
            "blocks",
            &[
                encode_records(&[(1, "a")]),
                Vec::new(),
                encode_records(&[(2, "b"), (3, "c")]),
            ],
        );
        let mut cursor = ChunkedStreamCursor::blocks(DumpLayout::new(dir.path()));

        for (block, expected) in [(1, "a"), (2, "b"), (3, "c")] {
            assert_eq!(
                tag(cursor.find_record_for_block(block).await.unwrap()),
                Some(expected.to_owned())
            );
        }
        assert!(cursor.find_record_for_block(4).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn visitor_sees_consumed_records_only() {
        let dir = tempfile::tempdir().unwrap();
        write_chunks(
            dir.path(),
            "blocks",
            &[encode_records(&[(1, "a"), (2, "b"), (5, "c")])],
        );
        let mut cursor = ChunkedStreamCursor::blocks(DumpLayout::new(dir.path()));

        let mut visited = Vec::new();
        let found = cursor
            .find_record_for_block_with(3, |block, _| {
                visited.push(block);
                Ok(())
            })
            .await
            .unwrap();
        assert!(found.is_none());
        assert_eq!(visited, [1, 2]);

        let found = cursor
            .find_record_for_block_with(5, |block, _| {
                visited.push(block);
                Ok(())
            })
            .await
            .unwrap();
        assert!(found.is_some());
        assert_eq!(visited, [1, 2, 5]);
    }

    #[tokio::test]
    async fn garbage_is_a_codec_error() {
        let dir = tempfile::tempdir().unwrap();
        // list declaring 2 payload bytes whose child claims 3
        write_chunks(dir.path(), "blocks", &[vec![0xc2, 0x83, b'a', b'b', b'c']]);
        let mut cursor = ChunkedStreamCursor::blocks(DumpLayout::new(dir.path()));
        assert_matches!(
            cursor.find_record_for_block(1).await,
            Err(StorageError::Rlp { .. })
        );
    }
}
