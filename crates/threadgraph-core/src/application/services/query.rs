//! Read-only views over the persisted graph
//!
//! Each read loads the full graph and filters it in memory. Persisted status
//! fields are never trusted: they are stripped on every path, and only
//! `read_graph` synthesizes an archival status.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::application::requests::QueryFilters;
use crate::domain::graph::{ItemStatus, KnowledgeGraph};
use crate::error::Result;
use crate::storage::StorageAdapter;

/// Query service for reading, searching and filtering the graph
pub struct QueryService {
    storage: Arc<dyn StorageAdapter>,
    default_min_importance: f64,
}

impl QueryService {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            storage,
            default_min_importance: 0.0,
        }
    }

    /// Importance floor used by `read_graph` when none is given
    pub fn with_default_min_importance(mut self, min_importance: f64) -> Self {
        self.default_min_importance = min_importance.clamp(0.0, 1.0);
        self
    }

    /// Items of one thread at or above an importance floor.
    ///
    /// Observations without their own importance inherit the entity's.
    /// Anything kept with importance below the archive threshold is marked
    /// `ARCHIVED`.
    pub async fn read_graph(
        &self,
        thread_id: &str,
        min_importance: Option<f64>,
    ) -> Result<KnowledgeGraph> {
        let min = min_importance.unwrap_or(self.default_min_importance);
        let graph = self.load_clean().await?;
        let view = thread_view(graph, thread_id, min);
        debug!(
            thread_id,
            min_importance = min,
            entities = view.entities.len(),
            relations = view.relations.len(),
            "Read graph"
        );
        Ok(view)
    }

    /// Entities whose name, type or any observation contains `query`,
    /// ignoring case, across every thread
    pub async fn search_nodes(&self, query: &str) -> Result<KnowledgeGraph> {
        let needle = query.to_lowercase();
        let mut graph = self.load_clean().await?;
        graph.entities.retain(|e| {
            e.name.to_lowercase().contains(&needle)
                || e.entity_type.to_lowercase().contains(&needle)
                || e
                    .observations
                    .iter()
                    .any(|o| o.content.to_lowercase().contains(&needle))
        });
        graph.retain_connected_relations();
        debug!(query, matches = graph.entities.len(), "Searched nodes");
        Ok(graph)
    }

    /// Entities with exactly the given names, across every thread
    pub async fn open_nodes(&self, names: &[String]) -> Result<KnowledgeGraph> {
        let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
        let mut graph = self.load_clean().await?;
        graph.entities.retain(|e| wanted.contains(e.name.as_str()));
        graph.retain_connected_relations();
        Ok(graph)
    }

    /// Entities and relations within inclusive timestamp, confidence and
    /// importance ranges, across every thread.
    ///
    /// Relations must pass the filters themselves and connect two entities
    /// that passed.
    pub async fn query_nodes(&self, filters: &QueryFilters) -> Result<KnowledgeGraph> {
        let mut graph = self.load_clean().await?;
        graph
            .entities
            .retain(|e| filters.matches(&e.timestamp, e.confidence, e.importance));
        graph
            .relations
            .retain(|r| filters.matches(&r.timestamp, r.confidence, r.importance));
        graph.retain_connected_relations();
        Ok(graph)
    }

    async fn load_clean(&self) -> Result<KnowledgeGraph> {
        let mut graph = self.storage.load_graph().await?;
        graph.strip_status();
        Ok(graph)
    }
}

impl QueryFilters {
    /// Whether an item's fields fall inside every given range
    pub fn matches(&self, timestamp: &str, confidence: f64, importance: f64) -> bool {
        self.timestamp_start.as_deref().is_none_or(|s| timestamp >= s)
            && self.timestamp_end.as_deref().is_none_or(|e| timestamp <= e)
            && self.confidence_min.is_none_or(|m| confidence >= m)
            && self.confidence_max.is_none_or(|m| confidence <= m)
            && self.importance_min.is_none_or(|m| importance >= m)
            && self.importance_max.is_none_or(|m| importance <= m)
    }
}

/// Filter a status-free graph to one thread and importance floor, then
/// decorate archived items
fn thread_view(mut graph: KnowledgeGraph, thread_id: &str, min_importance: f64) -> KnowledgeGraph {
    graph
        .entities
        .retain(|e| e.is_owned_by(thread_id) && e.importance >= min_importance);
    for entity in &mut graph.entities {
        let inherited = entity.importance;
        entity
            .observations
            .retain(|o| o.effective_importance(inherited) >= min_importance);
        for obs in &mut entity.observations {
            obs.status = ItemStatus::for_importance(obs.effective_importance(inherited));
        }
        entity.status = ItemStatus::for_importance(entity.importance);
    }

    graph
        .relations
        .retain(|r| r.agent_thread_id == thread_id && r.importance >= min_importance);
    for relation in &mut graph.relations {
        relation.status = ItemStatus::for_importance(relation.importance);
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{Entity, Observation, Relation};
    use crate::storage::InMemoryStorage;

    fn sample_graph() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        let mut low = Entity::new("Low", "Note", "t1")
            .with_importance(0.05)
            .with_observations(["faint memory"]);
        low.status = Some(ItemStatus::Archived);
        graph.insert_entity(low);

        let mut high = Entity::new("High", "Service", "t1")
            .with_importance(0.9)
            .with_observations(["Handles payments"]);
        high.observations
            .push(Observation::new("High", "minor detail", "t1").with_importance(0.05));
        graph.insert_entity(high);

        graph.insert_entity(Entity::new("Other", "Service", "t2").with_observations(["elsewhere"]));
        graph.insert_relation(Relation::new("High", "Low", "uses", "t1").with_importance(0.05));
        graph.insert_relation(Relation::new("High", "Other", "calls", "t1"));
        graph
    }

    fn service() -> QueryService {
        QueryService::new(Arc::new(InMemoryStorage::with_graph(sample_graph())))
    }

    #[tokio::test]
    async fn test_read_graph_decorates_archived_items() {
        let view = service().read_graph("t1", Some(0.0)).await.unwrap();

        assert_eq!(view.entities.len(), 2);
        let low = view.entity("Low").unwrap();
        assert_eq!(low.status, Some(ItemStatus::Archived));
        assert_eq!(low.observations[0].status, Some(ItemStatus::Archived));

        let high = view.entity("High").unwrap();
        assert_eq!(high.status, None);
        assert_eq!(high.observations[0].status, None);
        assert_eq!(high.observations[1].status, Some(ItemStatus::Archived));

        assert_eq!(view.relations.len(), 2);
        assert!(view.relations.iter().any(|r| r.status == Some(ItemStatus::Archived)));
    }

    #[tokio::test]
    async fn test_read_graph_above_threshold_never_archives() {
        let view = service().read_graph("t1", Some(0.1)).await.unwrap();
        assert_eq!(view.entities.len(), 1);
        assert_eq!(view.entities[0].observations.len(), 1);
        assert_eq!(view.relations.len(), 1);
        assert!(view.entities.iter().all(|e| e.status.is_none()));
        assert!(view.relations.iter().all(|r| r.status.is_none()));
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_global() {
        let result = service().search_nodes("SERVICE").await.unwrap();
        let names: HashSet<&str> = result.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, HashSet::from(["High", "Other"]));
        assert_eq!(result.relations.len(), 1);
        assert_eq!(result.relations[0].relation_type, "calls");

        let by_observation = service().search_nodes("faint").await.unwrap();
        assert_eq!(by_observation.entities.len(), 1);
        assert!(by_observation.entities[0].status.is_none());
    }

    #[tokio::test]
    async fn test_open_nodes_keeps_relation_closure() {
        let result = service()
            .open_nodes(&["High".to_string(), "Low".to_string()])
            .await
            .unwrap();
        assert_eq!(result.entities.len(), 2);
        assert_eq!(result.relations.len(), 1);
        assert_eq!(result.relations[0].to, "Low");
    }

    #[tokio::test]
    async fn test_query_nodes_ranges() {
        let filters = QueryFilters {
            importance_min: Some(0.5),
            ..Default::default()
        };
        let result = service().query_nodes(&filters).await.unwrap();
        let names: HashSet<&str> = result.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, HashSet::from(["High", "Other"]));
        assert_eq!(result.relations.len(), 1);

        let future = QueryFilters {
            timestamp_start: Some("9999-01-01T00:00:00.000Z".into()),
            ..Default::default()
        };
        assert!(service().query_nodes(&future).await.unwrap().entities.is_empty());
    }
}
