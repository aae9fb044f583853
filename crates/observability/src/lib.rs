//! Process-wide tracing setup shared by the binary and tests.

pub mod tracing;

pub use crate::tracing::{LogConfig, LogFormat};

/// Initialize tracing with defaults: JSON output, `RUST_LOG` or `info`.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    crate::tracing::init(&LogConfig::default());
}

pub fn init_with(config: &LogConfig) {
    crate::tracing::init(config);
}
