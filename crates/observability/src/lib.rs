//! Process-wide tracing/logging setup shared by binaries and tests.

pub mod tracing;

pub use crate::tracing::{LogFormat, LogSettings};

/// Initialize tracing with `settings`.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init(settings: &LogSettings) {
    crate::tracing::init(settings);
}
