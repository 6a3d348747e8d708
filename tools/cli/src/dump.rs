use anyhow::Context;
use bytes::Bytes;
use serde_json::Value;
use std::str::FromStr;
use the_index_rlp::{Rlp, decode_from_stream, to_hex_string};
use the_index_storage::{ChunkedStreamCursor, DumpLayout, validate_shard};
use the_index_types::{BlockHeaderRecord, ContractsForBlock, CursorRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamName {
    Cursor,
    Blocks,
    Contracts(String),
}

impl FromStr for StreamName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cursor" => Ok(Self::Cursor),
            "blocks" => Ok(Self::Blocks),
            _ => {
                let shard = s
                    .strip_prefix("contracts-")
                    .with_context(|| format!("unknown stream `{s}`"))?;
                validate_shard(shard)?;
                Ok(Self::Contracts(shard.to_owned()))
            }
        }
    }
}

/// Decodes every record of `stream`, typed unless `raw` is set.
pub async fn read_stream(
    layout: &DumpLayout,
    stream: &StreamName,
    raw: bool,
) -> anyhow::Result<Vec<Value>> {
    let nodes = match stream {
        StreamName::Cursor => read_cursor(layout).await?,
        StreamName::Blocks => drain(ChunkedStreamCursor::blocks(layout.clone())).await?,
        StreamName::Contracts(shard) => {
            drain(ChunkedStreamCursor::contracts(layout.clone(), shard)).await?
        }
    };
    nodes
        .iter()
        .enumerate()
        .map(|(index, node)| {
            if raw {
                Ok(raw_json(node))
            } else {
                typed_json(stream, node).with_context(|| format!("record #{index}"))
            }
        })
        .collect()
}

async fn read_cursor(layout: &DumpLayout) -> anyhow::Result<Vec<Rlp>> {
    let path = layout.cursor_path();
    let contents = tokio::fs::read(&path)
        .await
        .with_context(|| format!("failed to read `{}`", path.display()))?;
    let mut buffer = Bytes::from(contents);
    let mut nodes = Vec::new();
    while !buffer.is_empty() {
        let (node, remainder) = decode_from_stream(&buffer)?;
        nodes.push(node);
        buffer = remainder;
    }
    Ok(nodes)
}

/// Walks the whole stream: no record carries the maximal block number, so all of them are
/// consumed on the way.
async fn drain(mut cursor: ChunkedStreamCursor) -> anyhow::Result<Vec<Rlp>> {
    let mut nodes = Vec::new();
    cursor
        .find_record_for_block_with(u64::MAX, |_, node| {
            nodes.push(node.clone());
            Ok(())
        })
        .await?;
    Ok(nodes)
}

fn typed_json(stream: &StreamName, node: &Rlp) -> anyhow::Result<Value> {
    Ok(match stream {
        StreamName::Cursor => serde_json::to_value(CursorRecord::try_from(node)?)?,
        StreamName::Blocks => serde_json::to_value(BlockHeaderRecord::try_from(node)?)?,
        StreamName::Contracts(_) => serde_json::to_value(ContractsForBlock::try_from(node)?)?,
    })
}

/// Byte strings as hex, lists as arrays.
fn raw_json(node: &Rlp) -> Value {
    match node {
        Rlp::Bytes(bytes) => Value::String(to_hex_string(bytes)),
        Rlp::List(items) => Value::Array(items.iter().map(raw_json).collect()),
    }
}
