//! Lock configuration and metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Type of resource being locked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// The whole persisted graph
    Graph,
}

impl ResourceType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Graph => "graph",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lock manager configuration
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// How long to wait for a lock before giving up
    pub default_timeout: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(10),
        }
    }
}

impl LockConfig {
    /// Set the default timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

/// Information about a held lock
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// Unique id of this acquisition
    pub id: Uuid,
    pub resource_type: ResourceType,
    pub resource_id: String,
    /// What acquired the lock, for diagnostics
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockInfo {
    pub(crate) fn new(resource_type: ResourceType, resource_id: &str, holder: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource_type,
            resource_id: resource_id.to_string(),
            holder: holder.to_string(),
            acquired_at: Utc::now(),
        }
    }

    /// Key in the lock table
    pub fn key(&self) -> String {
        lock_key(self.resource_type, &self.resource_id)
    }
}

pub(crate) fn lock_key(resource_type: ResourceType, resource_id: &str) -> String {
    format!("{}:{}", resource_type.as_str(), resource_id)
}
