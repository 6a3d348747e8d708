use crate::error::{Hook, ReplayError, ReplayResult};
use crate::executor::CallExecutor;
use crate::metrics::REPLAY_METRICS;
use crate::plugin::AnalysisPlugin;
use crate::view::BlockView;
use alloy::primitives::BlockNumber;
use std::future::Future;
use std::sync::Arc;
use the_index_storage_api::DataSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Created,
    Initializing,
    /// Next block to hand to the plugin.
    Replaying(BlockNumber),
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub latest_block: BlockNumber,
    pub blocks_replayed: u64,
}

/// Drives one plugin over a data source, one block at a time.
///
/// ```text
/// Created --init--> Initializing --> Replaying(1) --step--> ... --step--> Done
///                        \_____ latest block is 0 ______________________/^
/// ```
///
/// Any error moves the processor to [`ReplayState::Failed`] for good.
pub struct ReplayProcessor<S, P> {
    source: S,
    plugin: P,
    executor: Option<Arc<dyn CallExecutor>>,
    state: ReplayState,
    latest_block: BlockNumber,
    blocks_replayed: u64,
}

impl<S: DataSource, P: AnalysisPlugin> ReplayProcessor<S, P> {
    pub fn new(source: S, plugin: P) -> Self {
        Self {
            source,
            plugin,
            executor: None,
            state: ReplayState::Created,
            latest_block: 0,
            blocks_replayed: 0,
        }
    }

    pub fn with_call_executor(mut self, executor: Arc<dyn CallExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    /// Latest block of the dump, known once initialized.
    pub fn latest_block(&self) -> BlockNumber {
        self.latest_block
    }

    pub fn plugin(&self) -> &P {
        &self.plugin
    }

    pub fn into_parts(self) -> (S, P) {
        (self.source, self.plugin)
    }

    /// Runs `on_init` and reads the dump's latest block.
    pub async fn init(&mut self) -> ReplayResult<()> {
        if self.state != ReplayState::Created {
            return Err(self.invalid_state("init"));
        }
        self.state = ReplayState::Initializing;
        let result = self.initialize().await;
        self.settle(result)
    }

    /// Replays the next block. Returns the state the processor is in afterwards.
    pub async fn step(&mut self) -> ReplayResult<ReplayState> {
        let ReplayState::Replaying(block_number) = self.state else {
            return Err(self.invalid_state("step"));
        };
        let result = self.replay_block(block_number).await;
        self.settle(result)?;
        Ok(self.state)
    }

    /// Initializes if needed, then replays every remaining block.
    pub async fn run(&mut self) -> ReplayResult<ReplaySummary> {
        if self.state == ReplayState::Created {
            self.init().await?;
        }
        while let ReplayState::Replaying(_) = self.state {
            self.step().await?;
        }
        if self.state != ReplayState::Done {
            return Err(self.invalid_state("run"));
        }
        Ok(ReplaySummary {
            latest_block: self.latest_block,
            blocks_replayed: self.blocks_replayed,
        })
    }

    async fn initialize(&mut self) -> ReplayResult<()> {
        let mut view = BlockView::new(0, &mut self.source, self.executor.as_deref());
        run_hook(Hook::Init, self.plugin.on_init(&mut view)).await?;

        self.latest_block = self.source.latest_block_number().await?;
        REPLAY_METRICS.latest_block.set(self.latest_block);
        if self.latest_block == 0 {
            tracing::info!("dump declares no blocks, nothing to replay");
            return self.finish().await;
        }
        tracing::info!(
            latest_block = self.latest_block,
            tracking_state = self.source.is_tracking_state(),
            "replaying blocks"
        );
        self.state = ReplayState::Replaying(1);
        Ok(())
    }

    async fn replay_block(&mut self, block_number: BlockNumber) -> ReplayResult<()> {
        REPLAY_METRICS.current_block.set(block_number);
        let mut view = BlockView::new(block_number, &mut self.source, self.executor.as_deref());
        run_hook(Hook::Block, self.plugin.on_block(block_number, &mut view)).await?;
        self.blocks_replayed += 1;

        if block_number >= self.latest_block {
            self.finish().await
        } else {
            self.state = ReplayState::Replaying(block_number + 1);
            Ok(())
        }
    }

    async fn finish(&mut self) -> ReplayResult<()> {
        run_hook(Hook::Done, self.plugin.on_done()).await?;
        self.state = ReplayState::Done;
        tracing::info!(
            latest_block = self.latest_block,
            blocks_replayed = self.blocks_replayed,
            "replay finished"
        );
        Ok(())
    }

    fn settle(&mut self, result: ReplayResult<()>) -> ReplayResult<()> {
        if let Err(err) = &result {
            tracing::warn!(state = ?self.state, %err, "replay failed");
            self.state = ReplayState::Failed;
        }
        result
    }

    fn invalid_state(&self, operation: &'static str) -> ReplayError {
        ReplayError::InvalidState {
            operation,
            state: self.state,
        }
    }
}

/// Awaits a plugin hook. Engine errors bubbling up through the hook keep their type, anything
/// else is attributed to the plugin.
async fn run_hook(
    hook: Hook,
    fut: impl Future<Output = anyhow::Result<()>>,
) -> ReplayResult<()> {
    let latency = REPLAY_METRICS.hook_latency[&hook].start();
    let result = fut.await;
    latency.observe();
    result.map_err(|err| match err.downcast::<ReplayError>() {
        Ok(err) => err,
        Err(source) => ReplayError::Plugin { hook, source },
    })
}
