//! Block-by-block replay of a history dump through an [`AnalysisPlugin`].

mod error;
mod executor;
mod metrics;
mod plugin;
mod processor;
mod view;

pub use error::{Hook, ReplayError, ReplayResult};
pub use executor::{CallExecutor, CallOptions, CallOutcome, CallRequest, DEFAULT_CALLER};
pub use plugin::AnalysisPlugin;
pub use processor::{ReplayProcessor, ReplayState, ReplaySummary};
pub use view::{BlockView, ContractView};
