//! Lock guards for RAII-style lock management
//!
//! The underlying mutex is released when the guard is dropped, including on
//! early returns through `?`.

use std::fmt;

use chrono::Utc;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use super::types::LockInfo;

/// A held lock on one resource
pub struct LockGuard {
    info: LockInfo,
    _permit: OwnedMutexGuard<()>,
}

impl LockGuard {
    pub(crate) fn new(info: LockInfo, permit: OwnedMutexGuard<()>) -> Self {
        Self {
            info,
            _permit: permit,
        }
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("info", &self.info).finish()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        debug!(
            lock_key = %self.info.key(),
            lock_id = %self.info.id,
            holder = %self.info.holder,
            held_ms = (Utc::now() - self.info.acquired_at).num_milliseconds(),
            "Lock released"
        );
    }
}
