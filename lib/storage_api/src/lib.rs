mod data_source;
pub use data_source::{DataSource, StorageError, StorageResult};

mod state;
pub use state::ReadContractState;
