//! In-process locking for graph writers
//!
//! Every mutation is a load → mutate → save cycle over the whole graph, and
//! the last save wins at file level. Writers inside one process serialize on
//! a keyed async lock so no cycle observes another's half-finished state.
//!
//! # Example
//!
//! ```ignore
//! use threadgraph_core::domain::locking::{LockManager, ResourceType};
//!
//! let manager = LockManager::with_defaults();
//! let guard = manager.acquire(ResourceType::Graph, "memory", "save_memory").await?;
//! // load, mutate, save...
//! drop(guard);
//! ```

pub mod guard;
pub mod manager;
pub mod types;

pub use guard::LockGuard;
pub use manager::LockManager;
pub use types::{LockConfig, LockInfo, ResourceType};
