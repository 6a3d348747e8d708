use serde::{Deserialize, Serialize};
use smart_config::{DescribeConfig, DeserializeConfig, Serde};
use std::path::PathBuf;
pub use the_index_tracing::LogFormat;

#[derive(Debug)]
pub struct Config {
    pub replay_config: ReplayConfig,
    pub log_config: LogConfig,
}

#[derive(Clone, Debug, DescribeConfig, DeserializeConfig)]
#[config(derive(Default))]
pub struct ReplayConfig {
    /// Directory with `cursor.rlp` and the `blocks-*` / `contracts-*` chunk files.
    #[config(default_t = "./data".into())]
    pub data_dir: PathBuf,

    /// Project contract records onto the state cache while scanning.
    /// Plugins that read storage enable this themselves.
    #[config(default_t = false)]
    pub track_state: bool,

    /// Analysis to run over the dump.
    #[config(default_t = PluginKind::BlockHashPrefix)]
    #[config(with = Serde![str])]
    pub plugin: PluginKind,

    /// `block-hash-prefix`: hex prefix (with `0x`) of the block hashes to report.
    #[config(default_t = "0x12345".into())]
    pub hash_prefix: String,

    /// `token-holders`: address of the ERC-20 contract to follow.
    pub token_address: Option<String>,

    /// `token-holders`: storage slot of the contract's `balances` mapping.
    #[config(default_t = 0)]
    pub token_balances_slot: u64,

    /// Log progress every that many blocks.
    #[config(default_t = 10_000)]
    pub progress_log_interval: u64,
}

#[derive(Clone, Debug, DescribeConfig, DeserializeConfig)]
#[config(derive(Default))]
pub struct LogConfig {
    #[config(default_t = LogFormat::Terminal)]
    #[config(with = Serde![str])]
    pub format: LogFormat,

    #[config(default_t = true)]
    pub use_color: bool,
}

/// Analyses shipped with the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginKind {
    /// Report blocks whose hash starts with [`ReplayConfig::hash_prefix`].
    BlockHashPrefix,
    /// Follow the holders of an ERC-20 token and their balances.
    TokenHolders,
}
