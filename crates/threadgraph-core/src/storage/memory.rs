//! In-memory storage adapter

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::StorageAdapter;
use crate::domain::graph::KnowledgeGraph;
use crate::error::Result;

/// Storage adapter that keeps the graph in process memory
///
/// Saved graphs are stored with read-time decorations removed, matching the
/// on-disk adapter.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    graph: RwLock<KnowledgeGraph>,
}

impl InMemoryStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `graph`
    pub fn with_graph(mut graph: KnowledgeGraph) -> Self {
        graph.strip_status();
        Self {
            graph: RwLock::new(graph),
        }
    }
}

#[async_trait]
impl StorageAdapter for InMemoryStorage {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn load_graph(&self) -> Result<KnowledgeGraph> {
        Ok(self.graph.read().await.clone())
    }

    async fn save_graph(&self, graph: &KnowledgeGraph) -> Result<()> {
        let mut stored = graph.clone();
        stored.strip_status();
        *self.graph.write().await = stored;
        Ok(())
    }
}
