use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use crate::core::error::{Error, Result};

/// Cooperative cancellation flag shared between a search and whoever may cancel it.
/// Long scans poll it at document boundaries.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag {
    aborted: Arc<AtomicBool>,
}

impl AbortFlag {
    pub fn new() -> Self {
        AbortFlag::default()
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Fails with `SearchInterrupted` once `abort()` was called. The flag stays set.
    pub fn check(&self) -> Result<()> {
        if self.is_aborted() {
            tracing::debug!("abort observed");
            return Err(Error::interrupted());
        }
        Ok(())
    }
}
