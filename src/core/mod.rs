// Shared infrastructure: errors, run configuration and logging setup

pub mod config;
pub mod errors;
pub mod logging;

pub use config::RunConfig;
pub use errors::{EngineError, Outcome, Result, RunFailure};
