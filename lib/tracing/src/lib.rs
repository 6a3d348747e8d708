//! Process-wide `tracing` subscriber for the replay binaries.

mod format;
pub use format::{LogFormat, UnknownLogFormat};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Builder for the global subscriber.
///
/// Verbosity comes from `RUST_LOG`; events without a matching directive are filtered at
/// `info`.
#[derive(Debug, Clone)]
pub struct Tracer {
    format: LogFormat,
    use_color: bool,
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new(LogFormat::Terminal, true)
    }
}

impl Tracer {
    pub const fn new(format: LogFormat, use_color: bool) -> Self {
        Self { format, use_color }
    }

    /// Installs the subscriber. Returns `false` if another global subscriber was already set,
    /// in which case that one stays in place.
    pub fn init(self) -> bool {
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy();
        tracing_subscriber::registry()
            .with(self.format.layer(filter, self.use_color))
            .try_init()
            .is_ok()
    }
}
