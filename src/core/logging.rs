//! Subscriber setup for binaries and tests.
//!
//! The library itself only emits `tracing` events; nothing is printed unless
//! a subscriber is installed.

use crate::core::errors::{EngineError, Result};
use tracing::Level;

/// Install a global fmt subscriber at `level`.
///
/// Fails if a global subscriber is already installed.
pub fn init(level: Level) -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| EngineError::logging(e.to_string()))
}

/// Route debug output through the test harness; repeated calls are fine.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}
