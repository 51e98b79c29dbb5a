//! Typed, directed edges between entities

use serde::{Deserialize, Serialize};

use super::entity::DEFAULT_CONFIDENCE;
use super::{ItemStatus, now_timestamp};

/// Default importance for relations produced by the save pipeline
pub const DEFAULT_RELATION_IMPORTANCE: f64 = 0.7;

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

fn default_importance() -> f64 {
    DEFAULT_RELATION_IMPORTANCE
}

/// A relation between two named entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    /// Source entity name
    pub from: String,
    /// Target entity name
    pub to: String,
    /// Relation verb, e.g. "manages"
    pub relation_type: String,
    /// Thread that created the relation
    pub agent_thread_id: String,
    /// Creation time (RFC 3339, UTC)
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

impl Relation {
    /// Create a new relation owned by `thread_id`
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        relation_type: impl Into<String>,
        thread_id: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
            agent_thread_id: thread_id.into(),
            timestamp: now_timestamp(),
            confidence: DEFAULT_CONFIDENCE,
            importance: DEFAULT_RELATION_IMPORTANCE,
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

    /// Global deduplication key
    pub fn key(&self) -> RelationKey {
        RelationKey {
            from: self.from.clone(),
            to: self.to.clone(),
            relation_type: self.relation_type.clone(),
        }
    }

    /// Whether this relation has the same endpoints and type
    pub fn same_edge(&self, from: &str, to: &str, relation_type: &str) -> bool {
        self.from == from && self.to == to && self.relation_type == relation_type
    }
}

/// The (from, to, relationType) triple relations are deduplicated by
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationKey {
    pub from: String,
    pub to: String,
    pub relation_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_defaults() {
        let rel = Relation::new("A", "B", "uses", "t1");
        assert_eq!(rel.importance, DEFAULT_RELATION_IMPORTANCE);
        assert_eq!(rel.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(rel.agent_thread_id, "t1");
    }

    #[test]
    fn test_key_ignores_thread() {
        let a = Relation::new("A", "B", "uses", "t1");
        let b = Relation::new("A", "B", "uses", "t2");
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), Relation::new("B", "A", "uses", "t1").key());
    }
}
