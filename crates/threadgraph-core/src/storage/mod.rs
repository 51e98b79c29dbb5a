//! Storage layer - persistence boundary for the knowledge graph
//!
//! The manager only ever talks to a `StorageAdapter`: load the whole graph,
//! save the whole graph. Adapters decide how the graph is laid out.
//!
//! # Architecture
//!
//! - `jsonl`: one JSON Lines shard per thread in a memory directory
//! - `memory`: in-process adapter with no I/O, for embedding and tests

pub mod jsonl;
pub mod memory;

use async_trait::async_trait;

use crate::domain::graph::KnowledgeGraph;
use crate::error::Result;

pub use jsonl::{JsonlStorage, SHARD_EXTENSION, SHARD_PREFIX, shard_file_name};
pub use memory::InMemoryStorage;

/// Persistence boundary for the knowledge graph
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Create any backing resources. Safe to call more than once.
    async fn initialize(&self) -> Result<()>;

    /// Load the full graph. Missing storage yields an empty graph.
    async fn load_graph(&self) -> Result<KnowledgeGraph>;

    /// Replace the persisted graph with `graph`
    async fn save_graph(&self, graph: &KnowledgeGraph) -> Result<()>;
}
