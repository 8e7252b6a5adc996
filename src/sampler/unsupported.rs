//! Fallback for targets without a thread statistics backend.

use super::{ThreadHandle, ThreadSample, ThreadStats, ThreadStatsError};

/// Source whose enumeration always fails, so sampling degrades to the
/// sentinel snapshot instead of refusing to build on unsupported targets.
pub struct UnsupportedThreadStats;

impl UnsupportedThreadStats {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UnsupportedThreadStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadStats for UnsupportedThreadStats {
    fn enumerate(&self) -> Result<Vec<ThreadHandle>, ThreadStatsError> {
        Err(ThreadStatsError::Enumerate(format!(
            "no thread statistics backend for {}",
            std::env::consts::OS
        )))
    }

    fn read(&self, _handle: ThreadHandle) -> Result<ThreadSample, ThreadStatsError> {
        Err(ThreadStatsError::Read(
            "no thread statistics backend".into(),
        ))
    }
}
