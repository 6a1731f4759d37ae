// Public modules
pub mod aws;
pub mod build;
pub mod context;
pub mod defaults;
pub mod deploy;
pub mod docker;
pub mod error;
pub mod ledger;
pub mod output;
pub mod params;
pub mod paths;
pub mod pipeline;
pub mod process;
pub mod secrets;
pub mod version;

#[cfg(test)]
pub mod testing;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use output::{BulkResult, BulkSummary, ItemOutcome};
