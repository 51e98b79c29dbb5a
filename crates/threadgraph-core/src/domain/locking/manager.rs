//! Lock manager for coordinating graph writers
//!
//! Locks are keyed by resource type and id. Each key maps to its own async
//! mutex, created on first use and kept for the life of the manager.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use super::guard::LockGuard;
use super::types::{LockConfig, LockInfo, ResourceType, lock_key};
use crate::error::{Error, Result};

/// Lock manager for coordinating resource locks
#[derive(Debug, Default)]
pub struct LockManager {
    config: LockConfig,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockManager {
    /// Create a new lock manager with the given configuration
    pub fn new(config: LockConfig) -> Self {
        Self {
            config,
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Create a lock manager with default configuration
    pub fn with_defaults() -> Self {
        Self::new(LockConfig::default())
    }

    /// Acquire a lock, waiting up to the configured timeout
    pub async fn acquire(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        holder: &str,
    ) -> Result<LockGuard> {
        let key = lock_key(resource_type, resource_id);
        let mutex = self.mutex_for(&key).await;
        let wait = self.config.default_timeout;
        let start = Instant::now();

        match timeout(wait, mutex.lock_owned()).await {
            Ok(permit) => {
                debug!(
                    lock_key = %key,
                    holder,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Lock acquired"
                );
                Ok(LockGuard::new(
                    LockInfo::new(resource_type, resource_id, holder),
                    permit,
                ))
            }
            Err(_) => {
                warn!(lock_key = %key, holder, timeout_ms = wait.as_millis(), "Lock timeout");
                Err(Error::LockTimeout(key))
            }
        }
    }

    async fn mutex_for(&self, key: &str) -> Arc<Mutex<()>> {
        if let Some(existing) = self.locks.read().await.get(key) {
            return existing.clone();
        }
        self.locks
            .write()
            .await
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
