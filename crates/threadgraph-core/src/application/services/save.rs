//! The `save_memory` transaction
//!
//! Validate the whole request, then stage entities and relations (each with
//! its inverse) on one graph snapshot and persist it with a single save. An
//! invalid request persists nothing.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::manager::{KnowledgeGraphManager, insert_entities, insert_relations};
use crate::application::requests::EntityInput;
use crate::application::validators::{RequestValidator, ValidationIssue, quality_score};
use crate::domain::graph::{DEFAULT_CONFIDENCE, DEFAULT_IMPORTANCE, Entity, Relation};
use crate::error::Result;

/// Counts of items actually written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedCounts {
    pub entities: usize,
    pub relations: usize,
}

/// Response of a save request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMemoryResponse {
    pub success: bool,
    pub created: CreatedCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub errors: Vec<ValidationIssue>,
}

impl KnowledgeGraphManager {
    /// Validate and persist a batch of entities with their relations.
    ///
    /// Every declared relation is stored twice: forward, and inverted from
    /// the target back to the source. Both carry the same importance and
    /// thread id.
    pub async fn save_memory(
        &self,
        thread_id: &str,
        entities: Vec<EntityInput>,
    ) -> Result<SaveMemoryResponse> {
        let _guard = self.write_lock("save_memory").await?;
        let mut graph = self.storage().load_graph().await?;

        let report = RequestValidator::validate(&entities, &graph.entity_names());
        if !report.valid {
            warn!(
                thread_id,
                errors = report.errors.len(),
                "Save request failed validation"
            );
            return Ok(SaveMemoryResponse {
                success: false,
                created: CreatedCounts::default(),
                quality_score: None,
                warnings: report.warnings,
                errors: report.errors,
            });
        }

        let mut warnings = report.warnings;
        let requested = report.normalized;

        let built: Vec<Entity> = requested
            .iter()
            .map(|input| {
                Entity::new(&input.name, &input.entity_type, thread_id)
                    .with_confidence(input.confidence.unwrap_or(DEFAULT_CONFIDENCE))
                    .with_importance(input.importance.unwrap_or(DEFAULT_IMPORTANCE))
                    .with_observations(input.observations.iter().cloned())
            })
            .collect();
        let created_entities = insert_entities(&mut graph, thread_id, built);
        for input in &requested {
            if !created_entities.iter().any(|e| e.name == input.name) {
                warnings.push(format!(
                    "Entity '{}' already exists, skipped",
                    input.name
                ));
            }
        }

        let mut relations = Vec::new();
        for input in &requested {
            for declared in &input.relations {
                let importance = declared.importance.unwrap_or(self.relation_importance());
                let inverse_type = self.inverter().inverse_of(&declared.relation_type);
                relations.push(
                    Relation::new(
                        &input.name,
                        &declared.target_entity,
                        &declared.relation_type,
                        thread_id,
                    )
                    .with_importance(importance),
                );
                relations.push(
                    Relation::new(&declared.target_entity, &input.name, inverse_type, thread_id)
                        .with_importance(importance),
                );
            }
        }
        let relation_outcome = insert_relations(&mut graph, relations);
        warnings.extend(relation_outcome.warnings);

        self.storage().save_graph(&graph).await?;

        let created = CreatedCounts {
            entities: created_entities.len(),
            relations: relation_outcome.created.len(),
        };
        let score = quality_score(&requested);
        info!(
            thread_id,
            entities = created.entities,
            relations = created.relations,
            quality_score = score,
            "Saved memory"
        );

        Ok(SaveMemoryResponse {
            success: true,
            created,
            quality_score: Some(score),
            warnings,
            errors: Vec::new(),
        })
    }
}
