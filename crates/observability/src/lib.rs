//! Process-wide tracing setup shared by warden binaries and tests.

/// Initialize tracing with the `info` default.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;
