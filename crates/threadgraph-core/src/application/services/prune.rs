//! Retention pruning
//!
//! Removes entities that are too old or too unimportant, while never leaving
//! fewer than a requested minimum. Relations survive only when both of their
//! endpoints do.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::manager::KnowledgeGraphManager;
use crate::application::requests::PruneOptions;
use crate::domain::graph::Entity;
use crate::error::Result;

/// Outcome of a prune
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneResult {
    pub removed_entities: usize,
    pub removed_relations: usize,
    pub remaining_entities: usize,
    pub remaining_relations: usize,
}

/// Service applying retention policies to the whole graph
pub struct PruneService {
    manager: Arc<KnowledgeGraphManager>,
}

impl PruneService {
    pub fn new(manager: Arc<KnowledgeGraphManager>) -> Self {
        Self { manager }
    }

    /// Prune entities and relations across every thread.
    ///
    /// An entity is kept when its timestamp is not before `older_than` and
    /// its importance is not below `importance_less_than`. If fewer than
    /// `keep_min_entities` pass, the best of the rejected entities are
    /// re-admitted, highest importance first and then most recent.
    pub async fn prune_memory(&self, options: &PruneOptions) -> Result<PruneResult> {
        let _guard = self.manager.write_lock("prune_memory").await?;
        let mut graph = self.manager.storage().load_graph().await?;

        let before_entities = graph.entities.len();
        let before_relations = graph.relations.len();

        let (mut kept, mut rejected): (Vec<Entity>, Vec<Entity>) = graph
            .entities
            .drain(..)
            .partition(|e| passes(e, options));

        let floor = options.keep_min_entities.unwrap_or(0);
        if kept.len() < floor {
            rejected.sort_by(by_retention_priority);
            let shortfall = floor - kept.len();
            kept.extend(rejected.into_iter().take(shortfall));
        }

        let survivors: HashSet<String> = kept.iter().map(|e| e.name.clone()).collect();
        graph.entities = kept;
        graph
            .relations
            .retain(|r| survivors.contains(&r.from) && survivors.contains(&r.to));

        self.manager.storage().save_graph(&graph).await?;

        let result = PruneResult {
            removed_entities: before_entities - graph.entities.len(),
            removed_relations: before_relations - graph.relations.len(),
            remaining_entities: graph.entities.len(),
            remaining_relations: graph.relations.len(),
        };
        info!(
            removed_entities = result.removed_entities,
            removed_relations = result.removed_relations,
            "Pruned memory"
        );
        Ok(result)
    }
}

fn passes(entity: &Entity, options: &PruneOptions) -> bool {
    options
        .older_than
        .as_deref()
        .is_none_or(|cutoff| entity.timestamp.as_str() >= cutoff)
        && options
            .importance_less_than
            .is_none_or(|floor| entity.importance >= floor)
}

/// Importance descending, then timestamp descending
fn by_retention_priority(a: &Entity, b: &Entity) -> Ordering {
    b.importance
        .partial_cmp(&a.importance)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.timestamp.cmp(&a.timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{KnowledgeGraph, Relation};
    use crate::domain::relations::RelationInverter;
    use crate::storage::InMemoryStorage;

    fn entity(name: &str, importance: f64, timestamp: &str) -> Entity {
        let mut entity = Entity::new(name, "Thing", "t1").with_importance(importance);
        entity.timestamp = timestamp.to_string();
        entity
    }

    fn service(graph: KnowledgeGraph) -> (PruneService, Arc<KnowledgeGraphManager>) {
        let manager = Arc::new(KnowledgeGraphManager::new(
            Arc::new(InMemoryStorage::with_graph(graph)),
            Arc::new(RelationInverter::new()),
        ));
        (PruneService::new(manager.clone()), manager)
    }

    #[tokio::test]
    async fn test_keep_min_readmits_most_recent() {
        let mut graph = KnowledgeGraph::new();
        graph.insert_entity(entity("Older", 0.2, "2024-01-01T00:00:00.000Z"));
        graph.insert_entity(entity("Newer", 0.2, "2024-06-01T00:00:00.000Z"));
        let (service, manager) = service(graph);

        let result = service
            .prune_memory(&PruneOptions {
                importance_less_than: Some(0.5),
                keep_min_entities: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.removed_entities, 1);
        assert_eq!(result.remaining_entities, 1);
        let graph = manager.load().await.unwrap();
        assert_eq!(graph.entities[0].name, "Newer");
    }

    #[tokio::test]
    async fn test_prune_by_age_cascades_relations() {
        let mut graph = KnowledgeGraph::new();
        graph.insert_entity(entity("Old", 0.9, "2023-01-01T00:00:00.000Z"));
        graph.insert_entity(entity("Fresh", 0.1, "2025-01-01T00:00:00.000Z"));
        graph.insert_relation(Relation::new("Fresh", "Old", "uses", "t1"));
        let (service, _) = service(graph);

        let result = service
            .prune_memory(&PruneOptions {
                older_than: Some("2024-01-01T00:00:00.000Z".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.removed_entities, 1);
        assert_eq!(result.removed_relations, 1);
        assert_eq!(result.remaining_relations, 0);
    }

    #[tokio::test]
    async fn test_readmission_prefers_importance() {
        let mut graph = KnowledgeGraph::new();
        graph.insert_entity(entity("A", 0.3, "2024-01-01T00:00:00.000Z"));
        graph.insert_entity(entity("B", 0.1, "2025-01-01T00:00:00.000Z"));
        graph.insert_entity(entity("C", 0.9, "2025-01-01T00:00:00.000Z"));
        let (service, manager) = service(graph);

        service
            .prune_memory(&PruneOptions {
                importance_less_than: Some(0.5),
                keep_min_entities: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();

        let names: HashSet<String> = manager.load().await.unwrap().entity_names();
        assert_eq!(names, HashSet::from(["A".to_string(), "C".to_string()]));
    }

    #[tokio::test]
    async fn test_no_options_keeps_everything() {
        let mut graph = KnowledgeGraph::new();
        graph.insert_entity(entity("A", 0.0, "2020-01-01T00:00:00.000Z"));
        let (service, _) = service(graph);
        let result = service.prune_memory(&PruneOptions::default()).await.unwrap();
        assert_eq!(result.removed_entities, 0);
        assert_eq!(result.remaining_entities, 1);
    }
}
