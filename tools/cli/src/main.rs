use clap::{Parser, Subcommand};
use std::path::PathBuf;
use the_index_storage::{DumpLayout, LocalDumpSource};
use the_index_storage_api::DataSource;

mod dump;

#[derive(Parser)]
#[command(version, about = "Inspect the records of a history dump", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the dump files.
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Prints the dump's latest block.
    Info {},

    /// Prints every record of a stream as one JSON object per line.
    Read {
        /// `cursor`, `blocks` or `contracts-<shard>`.
        stream: String,

        /// Print the undecoded record tree instead of typed records.
        #[arg(long)]
        raw: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let layout = DumpLayout::new(&cli.data_dir);

    match cli.command {
        Command::Info {} => {
            let latest_block = LocalDumpSource::new(&cli.data_dir)
                .latest_block_number()
                .await?;
            println!("Dump at {}", cli.data_dir.display());
            println!("  Latest block: {latest_block}");
        }
        Command::Read { stream, raw } => {
            let stream = stream.parse()?;
            let records = dump::read_stream(&layout, &stream, raw).await?;
            for record in &records {
                println!("{}", serde_json::to_string(record)?);
            }
            eprintln!("{} records", records.len());
        }
    }
    Ok(())
}
