use alloy::primitives::{Address, B256, BlockNumber, Bytes, U256, address};
use alloy::rlp::Encodable;
use assert_matches::assert_matches;
use the_index_integration_tests::{DumpBuilder, contract, header_hash, log, storage_write};
use the_index_replay::{
    AnalysisPlugin, BlockView, Hook, ReplayError, ReplayProcessor, ReplayState, ReplaySummary,
};
use the_index_rlp::Rlp;
use the_index_storage::DumpLayout;
use the_index_storage_api::{DataSource, StorageError};
use the_index_types::{ContractsForBlock, shard_of};

const TOKEN: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
const OTHER: Address = address!("dac17f958d2ee523a2206206994597c13d831ec7");

/// Writes down what it sees, optionally querying one contract in every block.
#[derive(Default)]
struct Observer {
    watch: Option<Address>,
    track_state: bool,
    fail_at: Option<BlockNumber>,
    calls: Vec<String>,
    hashes: Vec<B256>,
    state_changes: Vec<(BlockNumber, bool)>,
    events: Vec<(BlockNumber, usize)>,
    storage: Vec<(BlockNumber, Bytes)>,
}

impl Observer {
    fn watching(address: Address) -> Self {
        Self {
            watch: Some(address),
            track_state: true,
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl AnalysisPlugin for Observer {
    async fn on_init(&mut self, view: &mut BlockView<'_>) -> anyhow::Result<()> {
        if self.track_state {
            view.data_source_mut().track_state();
        }
        self.calls.push("init".to_owned());
        Ok(())
    }

    async fn on_block(
        &mut self,
        block_number: BlockNumber,
        view: &mut BlockView<'_>,
    ) -> anyhow::Result<()> {
        self.calls.push(format!("block {block_number}"));
        if let Some(block) = view.get_block().await? {
            self.hashes.push(block.hash);
        }
        if self.fail_at == Some(block_number) {
            anyhow::bail!("giving up at {block_number}");
        }
        if let Some(address) = self.watch {
            let mut contract = view.contract(address);
            self.state_changes
                .push((block_number, contract.has_state_changes().await?));
            self.events
                .push((block_number, contract.get_events(None).await?.len()));
            let slot = contract.get_storage_at(B256::ZERO).await?;
            self.storage.push((block_number, slot));
        }
        Ok(())
    }

    async fn on_done(&mut self) -> anyhow::Result<()> {
        self.calls.push("done".to_owned());
        Ok(())
    }
}

#[test_log::test(tokio::test)]
async fn replays_every_block_of_a_chunked_dump() -> anyhow::Result<()> {
    let dump = DumpBuilder::new()
        .latest_block(5)
        .blocks(1..=5)
        // cuts right through most headers
        .chunk_size(37)
        .build()?;

    let mut processor = ReplayProcessor::new(dump.source(), Observer::default());
    let summary = processor.run().await?;

    assert_eq!(
        summary,
        ReplaySummary {
            latest_block: 5,
            blocks_replayed: 5
        }
    );
    let observer = processor.plugin();
    assert_eq!(
        observer.calls,
        ["init", "block 1", "block 2", "block 3", "block 4", "block 5", "done"]
    );
    let expected: Vec<_> = (1..=5).map(header_hash).collect();
    assert_eq!(observer.hashes, expected);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn dump_without_cursor_only_runs_init_and_done() -> anyhow::Result<()> {
    let dump = DumpBuilder::new().blocks(1..=3).build()?;

    let mut processor = ReplayProcessor::new(dump.source(), Observer::default());
    let summary = processor.run().await?;

    assert_eq!(summary.blocks_replayed, 0);
    assert_eq!(processor.plugin().calls, ["init", "done"]);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn contract_queries_follow_the_dump() -> anyhow::Result<()> {
    let transfer = log(vec![B256::repeat_byte(0x01)], b"");
    let mut deployed = contract(TOKEN, b"\x60\x80");
    deployed.states = vec![storage_write(B256::ZERO, U256::from(7))];
    let mut active = contract(TOKEN, b"");
    active.logs = vec![transfer.clone(), transfer];
    active.states = vec![storage_write(B256::ZERO, U256::from(9))];
    let mut logs_only = contract(TOKEN, b"");
    logs_only.logs = vec![log(vec![B256::repeat_byte(0x02)], b"data")];

    let dump = DumpBuilder::new()
        .latest_block(6)
        .blocks(1..=6)
        .contract(2, deployed)
        .contract(4, active)
        .contract(5, logs_only)
        .chunk_size(50)
        .build()?;

    let mut processor = ReplayProcessor::new(dump.source(), Observer::watching(TOKEN));
    processor.run().await?;
    let observer = processor.plugin();

    assert_eq!(
        observer.state_changes,
        [
            (1, false),
            (2, true),
            (3, false),
            (4, true),
            (5, false),
            (6, false)
        ]
    );
    assert_eq!(
        observer.events,
        [(1, 0), (2, 0), (3, 0), (4, 2), (5, 1), (6, 0)]
    );
    let storage: Vec<_> = observer
        .storage
        .iter()
        .map(|(block, value)| (*block, value.to_vec()))
        .collect();
    assert_eq!(
        storage,
        [
            (1, vec![]),
            (2, vec![7]),
            (3, vec![7]),
            (4, vec![9]),
            (5, vec![9]),
            (6, vec![9])
        ]
    );
    Ok(())
}

#[test_log::test(tokio::test)]
async fn blocks_skipped_by_the_plugin_are_still_tracked() -> anyhow::Result<()> {
    let mut first = contract(TOKEN, b"\x60\x80");
    first.states = vec![storage_write(B256::ZERO, U256::from(1))];
    let mut second = contract(TOKEN, b"");
    second.states = vec![storage_write(B256::ZERO, U256::from(2))];
    let dump = DumpBuilder::new()
        .latest_block(4)
        .blocks(1..=4)
        .contract(1, first)
        .contract(2, second)
        .build()?;

    /// Only looks at the token in the last block.
    struct LastBlockOnly(Option<Bytes>);

    #[async_trait::async_trait]
    impl AnalysisPlugin for LastBlockOnly {
        async fn on_init(&mut self, view: &mut BlockView<'_>) -> anyhow::Result<()> {
            view.data_source_mut().track_state();
            Ok(())
        }

        async fn on_block(
            &mut self,
            block_number: BlockNumber,
            view: &mut BlockView<'_>,
        ) -> anyhow::Result<()> {
            if block_number == 4 {
                let mut token = view.contract(TOKEN);
                assert!(token.is_deployed().await?);
                self.0 = Some(token.get_storage_at(B256::ZERO).await?);
            }
            Ok(())
        }
    }

    let mut processor = ReplayProcessor::new(dump.source(), LastBlockOnly(None));
    processor.run().await?;
    let (source, plugin) = processor.into_parts();

    assert_eq!(plugin.0.map(|slot| slot.to_vec()), Some(vec![2]));
    let tracked = source.state_cache().tracked_contract(&TOKEN)?.unwrap();
    assert_eq!(tracked.deployed_at_block, 1);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn shards_advance_independently() -> anyhow::Result<()> {
    let dump = DumpBuilder::new()
        .latest_block(3)
        .blocks(1..=3)
        .contract(1, contract(OTHER, b"\x01"))
        .contract(3, contract(OTHER, b"\x02"))
        .contract(2, contract(TOKEN, b"\x03"))
        .build()?;
    let mut source = dump.source();
    source.track_state();

    let other_shard = shard_of(&OTHER);
    let token_shard = shard_of(&TOKEN);
    assert_ne!(other_shard, token_shard);

    assert!(source.find_contracts_for_block(&token_shard, 2).await?.is_some());
    // reading the token's shard up to block 2 leaves the other shard untouched
    assert!(source.find_contracts_for_block(&other_shard, 1).await?.is_some());
    assert!(source.find_contracts_for_block(&other_shard, 2).await?.is_none());
    assert!(source.find_contracts_for_block(&other_shard, 3).await?.is_some());
    assert_eq!(source.state_cache().tracked_contract(&OTHER)?.unwrap().code.as_ref(), b"\x02");
    Ok(())
}

#[test_log::test(tokio::test)]
async fn state_queries_without_tracking_fail() -> anyhow::Result<()> {
    let dump = DumpBuilder::new()
        .latest_block(2)
        .blocks(1..=2)
        .contract(1, contract(TOKEN, b"\x60"))
        .build()?;
    let observer = Observer {
        watch: Some(TOKEN),
        ..Default::default()
    };

    let mut processor = ReplayProcessor::new(dump.source(), observer);
    let err = processor.run().await.unwrap_err();

    assert_matches!(err, ReplayError::Storage(StorageError::TrackingDisabled));
    assert_eq!(processor.state(), ReplayState::Failed);
    assert_eq!(processor.plugin().calls, ["init", "block 1"]);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn plugin_failure_stops_the_replay() -> anyhow::Result<()> {
    let dump = DumpBuilder::new().latest_block(4).blocks(1..=4).build()?;
    let observer = Observer {
        fail_at: Some(2),
        ..Default::default()
    };

    let mut processor = ReplayProcessor::new(dump.source(), observer);
    let err = processor.run().await.unwrap_err();

    assert_matches!(err, ReplayError::Plugin { hook: Hook::Block, .. });
    assert_eq!(processor.plugin().calls, ["init", "block 1", "block 2"]);
    assert_matches!(
        processor.step().await,
        Err(ReplayError::InvalidState {
            state: ReplayState::Failed,
            ..
        })
    );
    Ok(())
}

#[test_log::test(tokio::test)]
async fn truncated_dump_fails_the_replay() -> anyhow::Result<()> {
    let dump = DumpBuilder::new().latest_block(3).blocks(1..=3).build()?;
    let chunk = dump.path().join("blocks-00001.rlp");
    let mut contents = std::fs::read(&chunk)?;
    contents.truncate(contents.len() - 5);
    std::fs::write(&chunk, contents)?;

    let mut processor = ReplayProcessor::new(dump.source(), Observer::default());
    let err = processor.run().await.unwrap_err();

    assert_matches!(
        err,
        ReplayError::Storage(StorageError::TruncatedStream { .. })
    );
    assert_eq!(processor.plugin().calls, ["init", "block 1", "block 2", "block 3"]);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn balance_changes_and_older_records() -> anyhow::Result<()> {
    let dump = DumpBuilder::new().latest_block(3).blocks(1..=3).build()?;
    let mut balance_only = contract(TOKEN, b"\x60");
    balance_only.balance = Some(Bytes::from_static(&[5]));
    let mut logs_only = contract(TOKEN, b"");
    logs_only.logs = vec![log(vec![B256::repeat_byte(0x03)], b"")];
    // older dumps end the record after the storage diffs
    let legacy = Rlp::List(vec![
        Rlp::from_slice(TOKEN.as_slice()),
        Rlp::List(vec![]),
        Rlp::from_slice(b""),
        Rlp::List(vec![]),
    ]);
    let records = [
        ContractsForBlock {
            block_number: 1,
            contracts: vec![balance_only],
        }
        .to_rlp(),
        ContractsForBlock {
            block_number: 2,
            contracts: vec![logs_only],
        }
        .to_rlp(),
        Rlp::List(vec![Rlp::from_u64(3), Rlp::List(vec![legacy])]),
    ];
    let mut encoded = Vec::new();
    for record in &records {
        record.encode(&mut encoded);
    }
    let layout = DumpLayout::new(dump.path());
    let stream = DumpLayout::contracts_stream(&shard_of(&TOKEN));
    std::fs::write(layout.chunk_path(&stream, 1), encoded)?;

    #[derive(Default)]
    struct Balances(Vec<(BlockNumber, bool, Vec<u8>)>);

    #[async_trait::async_trait]
    impl AnalysisPlugin for Balances {
        async fn on_init(&mut self, view: &mut BlockView<'_>) -> anyhow::Result<()> {
            view.data_source_mut().track_state();
            assert!(view.data_source().is_tracking_state());
            Ok(())
        }

        async fn on_block(
            &mut self,
            block_number: BlockNumber,
            view: &mut BlockView<'_>,
        ) -> anyhow::Result<()> {
            let mut token = view.contract(TOKEN);
            assert_eq!(token.address(), TOKEN);
            let changed = token.has_state_changes().await?;
            let balance = token.get_balance().await?;
            self.0.push((block_number, changed, balance.to_vec()));
            Ok(())
        }
    }

    let mut processor = ReplayProcessor::new(dump.source(), Balances::default());
    processor.run().await?;

    assert_eq!(
        processor.plugin().0,
        [(1, true, vec![5]), (2, false, vec![5]), (3, false, vec![5])]
    );
    Ok(())
}
