//! Request payloads accepted by the application services
//!
//! Field names follow the camelCase wire format of the tool contracts so
//! payloads can be deserialized straight from JSON.

use serde::{Deserialize, Serialize};

/// A relation declared on an entity in a save request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationInput {
    pub target_entity: String,
    pub relation_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
}

impl RelationInput {
    pub fn new(target_entity: impl Into<String>, relation_type: impl Into<String>) -> Self {
        Self {
            target_entity: target_entity.into(),
            relation_type: relation_type.into(),
            importance: None,
        }
    }
}

/// An entity in a save request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityInput {
    pub name: String,
    pub entity_type: String,
    #[serde(default)]
    pub observations: Vec<String>,
    #[serde(default)]
    pub relations: Vec<RelationInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
}

impl EntityInput {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            observations: Vec::new(),
            relations: Vec::new(),
            confidence: None,
            importance: None,
        }
    }

    pub fn with_observation(mut self, content: impl Into<String>) -> Self {
        self.observations.push(content.into());
        self
    }

    pub fn with_relation(
        mut self,
        target_entity: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        self.relations
            .push(RelationInput::new(target_entity, relation_type));
        self
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = Some(importance);
        self
    }
}

/// Observations to append to one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationAddition {
    pub entity_name: String,
    pub contents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
}

/// Observations to remove from one entity, matched by content or by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationDeletion {
    pub entity_name: String,
    pub observations: Vec<String>,
}

/// Replace the current version of an observation with new content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateObservationParams {
    pub entity_name: String,
    pub observation_id: String,
    pub new_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
}

/// A relation addressed by its endpoints and type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationSpec {
    pub from: String,
    pub to: String,
    pub relation_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
}

impl RelationSpec {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
            confidence: None,
            importance: None,
        }
    }
}

/// Inclusive range filters for `query_nodes`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance_max: Option<f64>,
}

/// Retention policy for `prune_memory`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneOptions {
    /// Drop entities with a timestamp before this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub older_than: Option<String>,
    /// Drop entities with importance below this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance_less_than: Option<f64>,
    /// Never leave fewer entities than this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_min_entities: Option<usize>,
}

/// One item of a `bulk_update` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateItem {
    pub entity_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    #[serde(default)]
    pub add_observations: Vec<String>,
}
