pub mod config;
pub mod plugins;

use crate::config::ReplayConfig;
use std::time::Instant;
use the_index_replay::{AnalysisPlugin, ReplayProcessor, ReplayState, ReplaySummary};
use the_index_storage::LocalDumpSource;
use the_index_storage_api::DataSource;
use tokio::sync::watch;

/// Replays the dump in `config.data_dir` through `plugin`.
///
/// `stop_receiver` is checked between blocks; returns `None` if the replay was stopped before
/// reaching the end of the dump.
pub async fn run<P: AnalysisPlugin>(
    config: &ReplayConfig,
    plugin: P,
    stop_receiver: watch::Receiver<bool>,
) -> anyhow::Result<Option<ReplaySummary>> {
    let mut source = LocalDumpSource::new(&config.data_dir);
    if config.track_state {
        source.track_state();
    }
    let mut processor = ReplayProcessor::new(source, plugin);
    processor.init().await?;

    let interval = config.progress_log_interval.max(1);
    let started_at = Instant::now();
    while let ReplayState::Replaying(block_number) = processor.state() {
        if *stop_receiver.borrow() {
            tracing::info!(block_number, "stop requested, halting replay");
            return Ok(None);
        }
        processor.step().await?;
        if block_number % interval == 0 {
            tracing::info!(
                block_number,
                latest_block = processor.latest_block(),
                elapsed = ?started_at.elapsed(),
                "replay progress"
            );
        }
    }

    let summary = processor.run().await?;
    tracing::info!(?summary, elapsed = ?started_at.elapsed(), "replay complete");
    Ok(Some(summary))
}
