//! Entities and their versioned observations
//!
//! An entity is the unit of identity in the graph: its name is unique across
//! every thread. Observations are atomic facts attached to an entity; a fact
//! is revised by superseding the current observation with a new version,
//! never by editing it in place.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{ItemStatus, now_timestamp};

/// Default confidence for entities and observations created without one
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// Default importance for entities and observations created without one
pub const DEFAULT_IMPORTANCE: f64 = 0.5;

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

fn default_importance() -> f64 {
    DEFAULT_IMPORTANCE
}

fn default_version() -> u32 {
    1
}

/// A single atomic, versioned fact about an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// Unique identifier, never reused
    pub id: String,
    /// The fact itself
    pub content: String,
    /// When this version was written (RFC 3339, UTC)
    #[serde(default)]
    pub timestamp: String,
    /// Version number within the lineage, starting at 1
    #[serde(default = "default_version")]
    pub version: u32,
    /// Thread that wrote this version
    #[serde(default)]
    pub agent_thread_id: String,
    /// Confidence (0.0 to 1.0); inherits from the entity when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Importance (0.0 to 1.0); inherits from the entity when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    /// Id of the observation this one replaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<String>,
    /// Id of the observation that replaced this one
    #[serde(
        rename = "superseded_by",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub superseded_by: Option<String>,
    /// Read-time decoration, never persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

impl Observation {
    /// Create a first-version observation
    pub fn new(
        entity_name: &str,
        content: impl Into<String>,
        thread_id: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let timestamp = now_timestamp();
        Self {
            id: generate_observation_id(entity_name, &content, &timestamp),
            content,
            timestamp,
            version: 1,
            agent_thread_id: thread_id.into(),
            confidence: None,
            importance: None,
            supersedes: None,
            superseded_by: None,
            status: None,
        }
    }

    /// Set confidence (clamped to 0.0-1.0)
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    /// Set importance (clamped to 0.0-1.0)
    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = Some(importance.clamp(0.0, 1.0));
        self
    }

    /// Whether this is the current (unsuperseded) version of its lineage
    pub fn is_current(&self) -> bool {
        self.superseded_by.is_none()
    }

    /// Importance, falling back to the owning entity's value
    pub fn effective_importance(&self, entity_importance: f64) -> f64 {
        self.importance.unwrap_or(entity_importance)
    }
}

/// Generate a fresh observation id.
///
/// The id hashes the owning entity, the content, the write time and a random
/// nonce, so re-asserting the same text later never collides with an old id.
pub fn generate_observation_id(entity_name: &str, content: &str, timestamp: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entity_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    hasher.update([0u8]);
    hasher.update(timestamp.as_bytes());
    hasher.update([0u8]);
    hasher.update(Uuid::new_v4().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("obs_{}", &digest[..16])
}

/// A named node in the knowledge graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Globally unique name
    pub name: String,
    /// Normalized type, first letter capitalized
    pub entity_type: String,
    /// Observations in creation order
    #[serde(default)]
    pub observations: Vec<Observation>,
    /// Owning thread
    pub agent_thread_id: String,
    /// Last-mutated time (RFC 3339, UTC)
    #[serde(default)]
    pub timestamp: String,
    /// Confidence score (0.0 to 1.0)
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Importance score (0.0 to 1.0)
    #[serde(default = "default_importance")]
    pub importance: f64,
    /// Read-time decoration, never persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

impl Entity {
    /// Create a new entity owned by `thread_id`
    pub fn new(
        name: impl Into<String>,
        entity_type: impl Into<String>,
        thread_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            observations: Vec::new(),
            agent_thread_id: thread_id.into(),
            timestamp: now_timestamp(),
            confidence: DEFAULT_CONFIDENCE,
            importance: DEFAULT_IMPORTANCE,
            status: None,
        }
    }

    /// Set confidence (clamped to 0.0-1.0)
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Set importance (clamped to 0.0-1.0)
    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    /// Append observations built from plain content strings
    pub fn with_observations<I, S>(mut self, contents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for content in contents {
            let obs = Observation::new(&self.name, content, self.agent_thread_id.clone());
            self.observations.push(obs);
        }
        self
    }

    /// Whether the entity belongs to `thread_id`
    pub fn is_owned_by(&self, thread_id: &str) -> bool {
        self.agent_thread_id == thread_id
    }

    /// Whether a current (unsuperseded) observation already has this content
    pub fn has_current_content(&self, content: &str) -> bool {
        self.observations
            .iter()
            .any(|o| o.is_current() && o.content == content)
    }

    /// Refresh the last-mutated timestamp
    pub fn touch(&mut self) {
        self.timestamp = now_timestamp();
    }

    /// Raise confidence and importance to at least the given values.
    ///
    /// Re-asserting facts never lowers an entity's scores.
    pub fn raise_scores(&mut self, confidence: Option<f64>, importance: Option<f64>) {
        if let Some(c) = confidence {
            self.confidence = self.confidence.max(c.clamp(0.0, 1.0));
        }
        if let Some(i) = importance {
            self.importance = self.importance.max(i.clamp(0.0, 1.0));
        }
    }

    /// Drop any read-time decoration from the entity and its observations
    pub fn strip_status(&mut self) {
        self.status = None;
        for obs in &mut self.observations {
            obs.status = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_creation() {
        let entity = Entity::new("Alice", "Person", "t1")
            .with_confidence(0.8)
            .with_importance(1.7)
            .with_observations(["Works on the parser"]);

        assert_eq!(entity.name, "Alice");
        assert_eq!(entity.confidence, 0.8);
        assert_eq!(entity.importance, 1.0);
        assert_eq!(entity.observations.len(), 1);
        assert_eq!(entity.observations[0].version, 1);
        assert_eq!(entity.observations[0].agent_thread_id, "t1");
        assert!(entity.status.is_none());
    }

    #[test]
    fn test_observation_ids_are_unique() {
        let a = Observation::new("Alice", "same text", "t1");
        let b = Observation::new("Alice", "same text", "t1");
        assert!(a.id.starts_with("obs_"));
        assert_eq!(a.id.len(), 20);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_raise_scores_never_lowers() {
        let mut entity = Entity::new("A", "Thing", "t1")
            .with_confidence(0.9)
            .with_importance(0.3);
        entity.raise_scores(Some(0.5), Some(0.6));
        assert_eq!(entity.confidence, 0.9);
        assert_eq!(entity.importance, 0.6);
    }

    #[test]
    fn test_has_current_content_ignores_superseded() {
        let mut entity = Entity::new("A", "Thing", "t1").with_observations(["old fact"]);
        entity.observations[0].superseded_by = Some("obs_next".into());
        assert!(!entity.has_current_content("old fact"));
    }

    #[test]
    fn test_serialized_field_names() {
        let mut entity = Entity::new("A", "Thing", "t1").with_observations(["a fact"]);
        entity.observations[0].superseded_by = Some("obs_x".into());
        let json = serde_json::to_value(&entity).unwrap();
        assert!(json.get("entityType").is_some());
        assert!(json.get("agentThreadId").is_some());
        assert!(json.get("status").is_none());
        assert_eq!(json["observations"][0]["superseded_by"], "obs_x");
    }

    #[test]
    fn test_missing_scores_take_defaults() {
        let json = r#"{"name":"A","entityType":"Thing","agentThreadId":"t1"}"#;
        let entity: Entity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(entity.importance, DEFAULT_IMPORTANCE);
        assert!(entity.observations.is_empty());
    }
}
