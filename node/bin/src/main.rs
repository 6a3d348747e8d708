use anyhow::Context;
use smart_config::{ConfigRepository, ConfigSchema, DescribeConfig, Environment};
use the_index_bin::config::{Config, LogConfig, ReplayConfig};
use the_index_bin::plugins::build_plugin;
use the_index_bin::run;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    // =========== load configs ===========
    let config = build_configs()?;

    // =========== init tracing ===========
    the_index_tracing::Tracer::new(config.log_config.format, config.log_config.use_color).init();
    tracing::info!(?config, "Loaded config");

    // =========== init interruption channel ===========
    let (stop_sender, stop_receiver) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = handle_termination(stop_sender).await {
            tracing::error!("Failed to handle termination signals: {err:#}");
        }
    });

    let plugin = build_plugin(&config.replay_config)?;
    match run(&config.replay_config, plugin, stop_receiver).await? {
        Some(summary) => tracing::info!(
            latest_block = summary.latest_block,
            blocks_replayed = summary.blocks_replayed,
            "Replay finished"
        ),
        None => tracing::info!("Replay stopped before reaching the end of the dump"),
    }
    Ok(())
}

/// Requests a stop on SIGINT or SIGTERM. The replay halts after the block in flight.
async fn handle_termination(stop_sender: watch::Sender<bool>) -> anyhow::Result<()> {
    // sigint is sent on Ctrl+C
    let mut sigint =
        signal(SignalKind::interrupt()).context("failed to register interrupt signal handler")?;
    // sigterm is sent on `kill <pid>`
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to register terminate signal handler")?;
    tokio::select! {
        _ = sigint.recv() => tracing::info!("Received SIGINT, stopping after the current block"),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, stopping after the current block"),
    }
    stop_sender
        .send(true)
        .context("replay already finished")?;
    Ok(())
}

fn build_configs() -> anyhow::Result<Config> {
    let mut schema = ConfigSchema::default();
    schema
        .insert(&ReplayConfig::DESCRIPTION, "replay")
        .map_err(|err| anyhow::anyhow!("Failed to insert replay config: {err:?}"))?;
    schema
        .insert(&LogConfig::DESCRIPTION, "log")
        .map_err(|err| anyhow::anyhow!("Failed to insert log config: {err:?}"))?;

    let repo = ConfigRepository::new(&schema).with(Environment::prefixed(""));

    let replay_config = repo
        .single::<ReplayConfig>()
        .map_err(|err| anyhow::anyhow!("Failed to load replay config: {err:?}"))?
        .parse()
        .map_err(|err| anyhow::anyhow!("Failed to parse replay config: {err:?}"))?;

    let log_config = repo
        .single::<LogConfig>()
        .map_err(|err| anyhow::anyhow!("Failed to load log config: {err:?}"))?
        .parse()
        .map_err(|err| anyhow::anyhow!("Failed to parse log config: {err:?}"))?;

    Ok(Config {
        replay_config,
        log_config,
    })
}
