use crate::cursor::ChunkedStreamCursor;
use alloy::primitives::BlockNumber;
use std::sync::Arc;
use the_index_rlp::Rlp;
use the_index_storage_api::{StorageError, StorageResult};
use the_index_types::RecordError;

/// Typed cursor that remembers the answer for the block it was asked about last.
///
/// The underlying cursor hands out a record only once, while a single block is usually looked
/// at many times (one query per contract). Lookups for the memoized block are answered without
/// touching the cursor.
#[derive(Debug)]
pub struct BlockScopedStream<T> {
    cursor: ChunkedStreamCursor,
    last_lookup: Option<(BlockNumber, Option<Arc<T>>)>,
}

impl<T> BlockScopedStream<T>
where
    T: for<'a> TryFrom<&'a Rlp, Error = RecordError> + Send + Sync,
{
    pub fn new(cursor: ChunkedStreamCursor) -> Self {
        Self {
            cursor,
            last_lookup: None,
        }
    }

    pub async fn find(&mut self, block_number: BlockNumber) -> StorageResult<Option<Arc<T>>> {
        self.find_with(block_number, None).await
    }

    /// Looks up the record for `block_number`. `visit` observes every record consumed to get
    /// there; it is not called again for memoized lookups.
    pub async fn find_with(
        &mut self,
        block_number: BlockNumber,
        mut visit: Option<&mut (dyn FnMut(&T) + Send)>,
    ) -> StorageResult<Option<Arc<T>>> {
        if let Some((memo_block, record)) = &self.last_lookup
            && *memo_block == block_number
        {
            return Ok(record.clone());
        }

        let stream = self.cursor.stream().to_owned();
        let parse = |node: &Rlp| {
            T::try_from(node).map_err(|source| StorageError::Record {
                stream: stream.clone(),
                source,
            })
        };

        let mut matched = None;
        let node = self
            .cursor
            .find_record_for_block_with(block_number, |number, node| {
                if let Some(visit) = visit.as_mut() {
                    let record = parse(node)?;
                    visit(&record);
                    if number == block_number {
                        matched = Some(record);
                    }
                }
                Ok(())
            })
            .await?;

        let record = match (node, matched) {
            (None, _) => None,
            (Some(_), Some(record)) => Some(Arc::new(record)),
            (Some(node), None) => Some(Arc::new(parse(&node)?)),
        };
        self.last_lookup = Some((block_number, record.clone()));
        Ok(record)
    }
}
