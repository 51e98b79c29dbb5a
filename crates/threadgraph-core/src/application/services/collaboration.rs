//! Collaboration helpers: review flags and per-thread summaries
//!
//! A review flag is an ordinary observation with a `[REVIEW]` prefix, so it
//! follows the same dedup and versioning rules as any other fact.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::manager::KnowledgeGraphManager;
use crate::application::requests::ObservationAddition;
use crate::domain::versioning;
use crate::error::Result;

/// Prefix marking an observation as a review flag
pub const REVIEW_PREFIX: &str = "[REVIEW]";

/// An entity carrying at least one current review flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedEntity {
    pub name: String,
    pub entity_type: String,
    pub agent_thread_id: String,
    pub reasons: Vec<String>,
}

/// Activity summary for one thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub thread_id: String,
    pub entity_count: usize,
    pub relation_count: usize,
    pub observation_count: usize,
    pub entity_types: Vec<String>,
    pub last_activity: String,
}

/// Service for review flags and conversation summaries
pub struct CollaborationService {
    manager: Arc<KnowledgeGraphManager>,
}

impl CollaborationService {
    pub fn new(manager: Arc<KnowledgeGraphManager>) -> Self {
        Self { manager }
    }

    /// Flag an entity owned by `thread_id` for review.
    ///
    /// Returns false when the same flag is already current.
    pub async fn flag_for_review(
        &self,
        thread_id: &str,
        entity_name: &str,
        reason: &str,
    ) -> Result<bool> {
        let added = self
            .manager
            .add_observations(
                thread_id,
                vec![ObservationAddition {
                    entity_name: entity_name.to_string(),
                    contents: vec![format!("{REVIEW_PREFIX} {}", reason.trim())],
                    confidence: None,
                    importance: None,
                }],
            )
            .await?;

        let flagged = added.iter().any(|a| !a.added.is_empty());
        info!(thread_id, entity = entity_name, flagged, "Flagged for review");
        Ok(flagged)
    }

    /// Entities with current review flags, optionally limited to one thread
    pub async fn get_flagged_entities(&self, thread_id: Option<&str>) -> Result<Vec<FlaggedEntity>> {
        let graph = self.manager.load().await?;

        let flagged = graph
            .entities
            .iter()
            .filter(|e| thread_id.is_none_or(|t| e.is_owned_by(t)))
            .filter_map(|e| {
                let reasons: Vec<String> = versioning::current_observations(e)
                    .into_iter()
                    .filter_map(|o| o.content.strip_prefix(REVIEW_PREFIX))
                    .map(|reason| reason.trim().to_string())
                    .collect();
                (!reasons.is_empty()).then(|| FlaggedEntity {
                    name: e.name.clone(),
                    entity_type: e.entity_type.clone(),
                    agent_thread_id: e.agent_thread_id.clone(),
                    reasons,
                })
            })
            .collect();
        Ok(flagged)
    }

    /// One summary per thread, most recently active first
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let graph = self.manager.load().await?;

        let mut by_thread: BTreeMap<String, (ConversationSummary, BTreeSet<String>)> =
            BTreeMap::new();

        for entity in &graph.entities {
            let (summary, types) = by_thread
                .entry(entity.agent_thread_id.clone())
                .or_insert_with(|| empty_summary(&entity.agent_thread_id));
            summary.entity_count += 1;
            summary.observation_count += entity.observations.len();
            types.insert(entity.entity_type.clone());
            bump(&mut summary.last_activity, &entity.timestamp);
            for obs in &entity.observations {
                bump(&mut summary.last_activity, &obs.timestamp);
            }
        }
        for relation in &graph.relations {
            let (summary, _) = by_thread
                .entry(relation.agent_thread_id.clone())
                .or_insert_with(|| empty_summary(&relation.agent_thread_id));
            summary.relation_count += 1;
            bump(&mut summary.last_activity, &relation.timestamp);
        }

        let mut summaries: Vec<ConversationSummary> = by_thread
            .into_values()
            .map(|(mut summary, types)| {
                summary.entity_types = types.into_iter().collect();
                summary
            })
            .collect();
        summaries.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(summaries)
    }
}

fn empty_summary(thread_id: &str) -> (ConversationSummary, BTreeSet<String>) {
    (
        ConversationSummary {
            thread_id: thread_id.to_string(),
            entity_count: 0,
            relation_count: 0,
            observation_count: 0,
            entity_types: Vec::new(),
            last_activity: String::new(),
        },
        BTreeSet::new(),
    )
}

fn bump(latest: &mut String, timestamp: &str) {
    if timestamp > latest.as_str() {
        *latest = timestamp.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{Entity, KnowledgeGraph, Relation};
    use crate::domain::relations::RelationInverter;
    use crate::storage::InMemoryStorage;

    fn service(graph: KnowledgeGraph) -> CollaborationService {
        let manager = KnowledgeGraphManager::new(
            Arc::new(InMemoryStorage::with_graph(graph)),
            Arc::new(RelationInverter::new()),
        );
        CollaborationService::new(Arc::new(manager))
    }

    fn stamped(name: &str, entity_type: &str, thread: &str, timestamp: &str) -> Entity {
        let mut entity = Entity::new(name, entity_type, thread);
        entity.timestamp = timestamp.to_string();
        entity
    }

    #[tokio::test]
    async fn test_flag_is_idempotent_and_listed() {
        let mut graph = KnowledgeGraph::new();
        graph.insert_entity(Entity::new("A", "Thing", "t1"));
        graph.insert_entity(Entity::new("B", "Thing", "t2"));
        let service = service(graph);

        assert!(service.flag_for_review("t1", "A", "stale data").await.unwrap());
        assert!(!service.flag_for_review("t1", "A", "stale data").await.unwrap());

        let flagged = service.get_flagged_entities(None).await.unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].reasons, vec!["stale data".to_string()]);
        assert!(service.get_flagged_entities(Some("t2")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flag_requires_thread_ownership() {
        let mut graph = KnowledgeGraph::new();
        graph.insert_entity(Entity::new("A", "Thing", "t1"));
        let err = service(graph)
            .flag_for_review("t2", "A", "wrong thread")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_conversations_newest_first() {
        let mut graph = KnowledgeGraph::new();
        graph.insert_entity(stamped("A", "Person", "t1", "2024-01-01T00:00:00.000Z"));
        graph.insert_entity(stamped("B", "Service", "t1", "2024-01-02T00:00:00.000Z"));
        graph.insert_entity(stamped("C", "Person", "t2", "2024-03-01T00:00:00.000Z"));
        let mut relation = Relation::new("A", "B", "uses", "t1");
        relation.timestamp = "2024-02-01T00:00:00.000Z".to_string();
        graph.insert_relation(relation);

        let summaries = service(graph).list_conversations().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].thread_id, "t2");

        let t1 = &summaries[1];
        assert_eq!(t1.entity_count, 2);
        assert_eq!(t1.relation_count, 1);
        assert_eq!(t1.entity_types, vec!["Person".to_string(), "Service".to_string()]);
        assert_eq!(t1.last_activity, "2024-02-01T00:00:00.000Z");
    }
}
