//! Knowledge graph data model
//!
//! - **Entity**: a named node, unique across every thread
//! - **Observation**: a versioned fact attached to an entity
//! - **Relation**: a typed, directed edge keyed by (from, to, relationType)
//! - **KnowledgeGraph**: the full set of entities and relations
//!
//! `status` fields on all three item types are read-time decorations. They
//! are stripped before anything is written and never trusted when loaded.

mod entity;
mod relation;

pub use entity::{
    DEFAULT_CONFIDENCE, DEFAULT_IMPORTANCE, Entity, Observation, generate_observation_id,
};
pub use relation::{DEFAULT_RELATION_IMPORTANCE, Relation, RelationKey};

use std::collections::{BTreeMap, HashSet};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Items with importance below this are reported as archived
pub const ARCHIVE_THRESHOLD: f64 = 0.1;

/// Current time as an RFC 3339 UTC string with millisecond precision.
///
/// Fixed width and a `Z` suffix keep lexicographic and chronological order
/// identical, which range queries rely on.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Transient status synthesized on read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    #[serde(rename = "ARCHIVED")]
    Archived,
}

impl ItemStatus {
    /// Archived when importance falls below the archive threshold
    pub fn for_importance(importance: f64) -> Option<Self> {
        (importance < ARCHIVE_THRESHOLD).then_some(Self::Archived)
    }
}

/// The complete graph: entities plus relations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

impl KnowledgeGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the graph holds nothing
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }

    /// Look up an entity by name
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Look up an entity by name, mutably
    pub fn entity_mut(&mut self, name: &str) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.name == name)
    }

    /// Look up an entity by name, restricted to its owning thread
    pub fn thread_entity_mut(&mut self, thread_id: &str, name: &str) -> Option<&mut Entity> {
        self.entities
            .iter_mut()
            .find(|e| e.name == name && e.is_owned_by(thread_id))
    }

    /// Whether an entity with this name exists in any thread
    pub fn contains_entity(&self, name: &str) -> bool {
        self.entities.iter().any(|e| e.name == name)
    }

    /// Whether a relation with the same key exists
    pub fn contains_relation(&self, key: &RelationKey) -> bool {
        self.relations
            .iter()
            .any(|r| r.same_edge(&key.from, &key.to, &key.relation_type))
    }

    /// Set of all entity names
    pub fn entity_names(&self) -> HashSet<String> {
        self.entities.iter().map(|e| e.name.clone()).collect()
    }

    /// Insert an entity unless the name is taken. Returns whether it was added.
    pub fn insert_entity(&mut self, entity: Entity) -> bool {
        if self.contains_entity(&entity.name) {
            return false;
        }
        self.entities.push(entity);
        true
    }

    /// Insert a relation unless its key is taken. Returns whether it was added.
    pub fn insert_relation(&mut self, relation: Relation) -> bool {
        if self.contains_relation(&relation.key()) {
            return false;
        }
        self.relations.push(relation);
        true
    }

    /// Keep only relations whose endpoints are both present as entities
    pub fn retain_connected_relations(&mut self) {
        let names = self.entity_names();
        self.relations
            .retain(|r| names.contains(&r.from) && names.contains(&r.to));
    }

    /// Remove every read-time decoration
    pub fn strip_status(&mut self) {
        for entity in &mut self.entities {
            entity.strip_status();
        }
        for relation in &mut self.relations {
            relation.status = None;
        }
    }

    /// Count items per thread
    pub fn stats(&self) -> GraphStats {
        let mut by_thread: BTreeMap<String, ThreadCounts> = BTreeMap::new();
        for entity in &self.entities {
            let counts = by_thread.entry(entity.agent_thread_id.clone()).or_default();
            counts.entities += 1;
            counts.observations += entity.observations.len();
        }
        for relation in &self.relations {
            by_thread
                .entry(relation.agent_thread_id.clone())
                .or_default()
                .relations += 1;
        }

        GraphStats {
            total_entities: self.entities.len(),
            total_relations: self.relations.len(),
            total_observations: self.entities.iter().map(|e| e.observations.len()).sum(),
            by_thread,
        }
    }
}

/// Per-thread item counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadCounts {
    pub entities: usize,
    pub relations: usize,
    pub observations: usize,
}

/// Summary statistics about a graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub total_entities: usize,
    pub total_relations: usize,
    pub total_observations: usize,
    pub by_thread: BTreeMap<String, ThreadCounts>,
}
