//! Knowledge graph manager
//!
//! CRUD over the persisted graph. Every mutating operation holds the graph
//! write lock for its whole load → mutate → save cycle and persists with a
//! single `save_graph` call, so a failed operation leaves storage untouched.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::application::requests::{
    BulkUpdateItem, ObservationAddition, ObservationDeletion, RelationSpec,
    UpdateObservationParams,
};
use crate::application::validators::{EntityValidator, MAX_ENTITY_TYPE_LENGTH, in_unit_range};
use crate::config::Config;
use crate::domain::graph::{
    DEFAULT_RELATION_IMPORTANCE, Entity, KnowledgeGraph, Observation, Relation,
};
use crate::domain::locking::{LockConfig, LockGuard, LockManager, ResourceType};
use crate::domain::relations::RelationInverter;
use crate::domain::versioning;
use crate::error::{Error, Result};
use crate::storage::StorageAdapter;

/// Resource id of the single graph-wide write lock
const GRAPH_LOCK_ID: &str = "memory";

/// Thread label used in not-found errors for lookups that span every thread
pub const ANY_THREAD: &str = "*";

/// Observations appended to one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedObservations {
    pub entity_name: String,
    pub added: Vec<Observation>,
}

/// Relations created by one call, plus what was skipped and why
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationOutcome {
    pub created: Vec<Relation>,
    pub warnings: Vec<String>,
}

/// Result of a bulk update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateResult {
    pub updated: Vec<String>,
    pub not_found: Vec<String>,
    pub observations_added: usize,
}

/// Orchestrates entity, observation and relation CRUD over a storage adapter
pub struct KnowledgeGraphManager {
    storage: Arc<dyn StorageAdapter>,
    inverter: Arc<RelationInverter>,
    locks: LockManager,
    relation_importance: f64,
}

impl KnowledgeGraphManager {
    /// Create a manager with default lock and relation settings
    pub fn new(storage: Arc<dyn StorageAdapter>, inverter: Arc<RelationInverter>) -> Self {
        Self {
            storage,
            inverter,
            locks: LockManager::with_defaults(),
            relation_importance: DEFAULT_RELATION_IMPORTANCE,
        }
    }

    /// Create a manager configured from `config`
    pub fn from_config(
        storage: Arc<dyn StorageAdapter>,
        inverter: Arc<RelationInverter>,
        config: &Config,
    ) -> Self {
        Self::new(storage, inverter)
            .with_lock_config(LockConfig::default().with_timeout(config.locking.timeout()))
            .with_relation_importance(config.graph.relation_importance)
    }

    pub fn with_lock_config(mut self, config: LockConfig) -> Self {
        self.locks = LockManager::new(config);
        self
    }

    /// Importance given to relations when the caller gives none
    pub fn with_relation_importance(mut self, importance: f64) -> Self {
        self.relation_importance = importance.clamp(0.0, 1.0);
        self
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    pub fn inverter(&self) -> &Arc<RelationInverter> {
        &self.inverter
    }

    pub fn relation_importance(&self) -> f64 {
        self.relation_importance
    }

    /// Load the current graph without locking
    pub async fn load(&self) -> Result<KnowledgeGraph> {
        self.storage.load_graph().await
    }

    /// Acquire the graph write lock on behalf of `operation`
    pub(crate) async fn write_lock(&self, operation: &str) -> Result<LockGuard> {
        self.locks
            .acquire(ResourceType::Graph, GRAPH_LOCK_ID, operation)
            .await
    }

    // ========== Entities ==========

    /// Create entities in `thread_id`, returning only those that were new.
    ///
    /// Names already present in any thread are dropped silently.
    pub async fn create_entities(
        &self,
        thread_id: &str,
        entities: Vec<Entity>,
    ) -> Result<Vec<Entity>> {
        let _guard = self.write_lock("create_entities").await?;
        let mut graph = self.storage.load_graph().await?;

        let created = insert_entities(&mut graph, thread_id, entities);
        self.storage.save_graph(&graph).await?;

        info!(thread_id, created = created.len(), "Created entities");
        Ok(created)
    }

    /// Delete the named entities owned by `thread_id`.
    ///
    /// Every relation touching a deleted entity is removed with it, whichever
    /// thread created the relation. Returns the number of entities deleted.
    pub async fn delete_entities(&self, thread_id: &str, names: &[String]) -> Result<usize> {
        let _guard = self.write_lock("delete_entities").await?;
        let mut graph = self.storage.load_graph().await?;

        let targets: HashSet<&str> = names.iter().map(String::as_str).collect();
        let mut deleted: HashSet<String> = HashSet::new();
        graph.entities.retain(|e| {
            if e.is_owned_by(thread_id) && targets.contains(e.name.as_str()) {
                deleted.insert(e.name.clone());
                false
            } else {
                true
            }
        });

        let relations_before = graph.relations.len();
        graph
            .relations
            .retain(|r| !deleted.contains(&r.from) && !deleted.contains(&r.to));
        let relations_removed = relations_before - graph.relations.len();

        self.storage.save_graph(&graph).await?;

        info!(
            thread_id,
            entities = deleted.len(),
            relations = relations_removed,
            "Deleted entities"
        );
        Ok(deleted.len())
    }

    // ========== Observations ==========

    /// Append observations to entities owned by `thread_id`.
    ///
    /// Content matching a current observation of the entity is skipped, but
    /// every target entity is still touched and has its scores raised. An
    /// entity outside the thread fails the whole call.
    pub async fn add_observations(
        &self,
        thread_id: &str,
        additions: Vec<ObservationAddition>,
    ) -> Result<Vec<AddedObservations>> {
        for addition in &additions {
            check_scores(addition.confidence, addition.importance)?;
        }

        let _guard = self.write_lock("add_observations").await?;
        let mut graph = self.storage.load_graph().await?;

        let mut results = Vec::with_capacity(additions.len());
        for addition in additions {
            let entity = graph
                .thread_entity_mut(thread_id, &addition.entity_name)
                .ok_or_else(|| Error::entity_not_found(&addition.entity_name, thread_id))?;

            let added = append_observations(
                entity,
                thread_id,
                &addition.contents,
                addition.confidence,
                addition.importance,
            );
            entity.raise_scores(addition.confidence, addition.importance);
            entity.touch();
            results.push(AddedObservations {
                entity_name: addition.entity_name,
                added,
            });
        }

        self.storage.save_graph(&graph).await?;

        let total: usize = results.iter().map(|r| r.added.len()).sum();
        info!(thread_id, added = total, "Added observations");
        Ok(results)
    }

    /// Remove observations matched by content or by id.
    ///
    /// Entities missing from the thread are skipped. Lineages are relinked
    /// around removed versions; removing a head makes the previous version
    /// current again. Returns the number of observations removed.
    pub async fn delete_observations(
        &self,
        thread_id: &str,
        deletions: Vec<ObservationDeletion>,
    ) -> Result<usize> {
        let _guard = self.write_lock("delete_observations").await?;
        let mut graph = self.storage.load_graph().await?;

        let mut removed = 0;
        for deletion in deletions {
            let Some(entity) = graph.thread_entity_mut(thread_id, &deletion.entity_name) else {
                debug!(thread_id, entity = %deletion.entity_name, "Entity not found, skipping");
                continue;
            };

            let targets: HashSet<&str> = deletion.observations.iter().map(String::as_str).collect();
            let (gone, kept): (Vec<Observation>, Vec<Observation>) = entity
                .observations
                .drain(..)
                .partition(|o| {
                    targets.contains(o.id.as_str()) || targets.contains(o.content.as_str())
                });
            entity.observations = kept;

            if gone.is_empty() {
                continue;
            }
            removed += gone.len();
            let gone: HashMap<String, Observation> =
                gone.into_iter().map(|o| (o.id.clone(), o)).collect();
            versioning::splice_out(&mut entity.observations, &gone);
            entity.touch();
        }

        self.storage.save_graph(&graph).await?;

        info!(thread_id, removed, "Deleted observations");
        Ok(removed)
    }

    /// Supersede the current version of an observation with new content.
    ///
    /// The new version inherits confidence and importance unless overridden
    /// and is written by `agent_thread_id`, defaulting to the entity's owner.
    pub async fn update_observation(&self, params: UpdateObservationParams) -> Result<Observation> {
        check_scores(params.confidence, params.importance)?;

        let _guard = self.write_lock("update_observation").await?;
        let mut graph = self.storage.load_graph().await?;

        let entity = graph.entity_mut(&params.entity_name).ok_or_else(|| {
            Error::entity_not_found(
                &params.entity_name,
                params.agent_thread_id.as_deref().unwrap_or(ANY_THREAD),
            )
        })?;

        let index = entity
            .observations
            .iter()
            .position(|o| o.id == params.observation_id)
            .ok_or_else(|| Error::ObservationNotFound {
                entity: params.entity_name.clone(),
                observation_id: params.observation_id.clone(),
            })?;

        if !entity.observations[index].is_current() {
            let head = versioning::chain_head(entity, &params.observation_id)?;
            return Err(Error::ObservationSuperseded {
                observation_id: params.observation_id.clone(),
                superseded_by: head.id,
            });
        }

        let thread_id = params
            .agent_thread_id
            .clone()
            .unwrap_or_else(|| entity.agent_thread_id.clone());
        let old = &mut entity.observations[index];
        let mut new = Observation::new(&params.entity_name, params.new_content, thread_id);
        new.confidence = params.confidence.or(old.confidence);
        new.importance = params.importance.or(old.importance);
        versioning::link_versions(old, &mut new);

        entity.observations.push(new.clone());
        entity.touch();
        self.storage.save_graph(&graph).await?;

        info!(
            entity = %params.entity_name,
            observation_id = %new.id,
            version = new.version,
            "Updated observation"
        );
        Ok(new)
    }

    /// Full version history of an observation, oldest first
    pub async fn observation_history(
        &self,
        entity_name: &str,
        observation_id: &str,
    ) -> Result<Vec<Observation>> {
        let graph = self.storage.load_graph().await?;
        let entity = graph
            .entity(entity_name)
            .ok_or_else(|| Error::entity_not_found(entity_name, ANY_THREAD))?;
        versioning::observation_history(entity, observation_id)
    }

    // ========== Relations ==========

    /// Create relations in `thread_id` exactly as given.
    ///
    /// Relations with a missing endpoint or an existing key are skipped with
    /// a warning. No inverse relations are produced here.
    pub async fn create_relations(
        &self,
        thread_id: &str,
        relations: Vec<RelationSpec>,
    ) -> Result<RelationOutcome> {
        for spec in &relations {
            check_scores(spec.confidence, spec.importance)?;
        }

        let _guard = self.write_lock("create_relations").await?;
        let mut graph = self.storage.load_graph().await?;

        let candidates = relations
            .into_iter()
            .map(|spec| {
                let mut relation = Relation::new(spec.from, spec.to, spec.relation_type, thread_id)
                    .with_importance(spec.importance.unwrap_or(self.relation_importance));
                if let Some(confidence) = spec.confidence {
                    relation = relation.with_confidence(confidence);
                }
                relation
            })
            .collect();

        let outcome = insert_relations(&mut graph, candidates);
        self.storage.save_graph(&graph).await?;

        info!(
            thread_id,
            created = outcome.created.len(),
            skipped = outcome.warnings.len(),
            "Created relations"
        );
        Ok(outcome)
    }

    /// Delete relations matching (from, to, relationType) in any thread
    pub async fn delete_relations_global(&self, relations: &[RelationSpec]) -> Result<usize> {
        self.delete_relations_matching("delete_relations_global", relations, None)
            .await
    }

    /// Delete relations matching (from, to, relationType) created by `thread_id`
    pub async fn delete_relations_in_thread(
        &self,
        thread_id: &str,
        relations: &[RelationSpec],
    ) -> Result<usize> {
        self.delete_relations_matching("delete_relations_in_thread", relations, Some(thread_id))
            .await
    }

    async fn delete_relations_matching(
        &self,
        operation: &str,
        relations: &[RelationSpec],
        thread_id: Option<&str>,
    ) -> Result<usize> {
        let _guard = self.write_lock(operation).await?;
        let mut graph = self.storage.load_graph().await?;

        let before = graph.relations.len();
        graph.relations.retain(|r| {
            let in_scope = thread_id.is_none_or(|t| r.agent_thread_id == t);
            let matched = relations
                .iter()
                .any(|spec| r.same_edge(&spec.from, &spec.to, &spec.relation_type));
            !(in_scope && matched)
        });
        let removed = before - graph.relations.len();

        self.storage.save_graph(&graph).await?;

        info!(operation, thread_id = thread_id.unwrap_or(ANY_THREAD), removed, "Deleted relations");
        Ok(removed)
    }

    // ========== Bulk ==========

    /// Apply explicit field updates and observation additions to entities
    /// owned by `thread_id`.
    ///
    /// Scores are set, not raised. Entities not found in the thread are
    /// reported in `not_found` rather than failing the call.
    pub async fn bulk_update(
        &self,
        thread_id: &str,
        items: Vec<BulkUpdateItem>,
    ) -> Result<BulkUpdateResult> {
        for item in &items {
            check_scores(item.confidence, item.importance)?;
            if let Some(entity_type) = &item.entity_type {
                let length = entity_type.trim().chars().count();
                if length == 0 || length > MAX_ENTITY_TYPE_LENGTH {
                    return Err(Error::InvalidInput(format!(
                        "entityType for '{}' must be between 1 and {MAX_ENTITY_TYPE_LENGTH} characters",
                        item.entity_name
                    )));
                }
            }
        }

        let _guard = self.write_lock("bulk_update").await?;
        let mut graph = self.storage.load_graph().await?;

        let mut result = BulkUpdateResult::default();
        for item in items {
            let Some(entity) = graph.thread_entity_mut(thread_id, &item.entity_name) else {
                result.not_found.push(item.entity_name);
                continue;
            };

            if let Some(entity_type) = &item.entity_type {
                entity.entity_type = EntityValidator::normalize_type(entity_type);
            }
            if let Some(confidence) = item.confidence {
                entity.confidence = confidence;
            }
            if let Some(importance) = item.importance {
                entity.importance = importance;
            }
            let added =
                append_observations(entity, thread_id, &item.add_observations, None, None);
            result.observations_added += added.len();
            entity.touch();
            result.updated.push(item.entity_name);
        }

        self.storage.save_graph(&graph).await?;

        info!(
            thread_id,
            updated = result.updated.len(),
            not_found = result.not_found.len(),
            "Bulk update applied"
        );
        Ok(result)
    }
}

/// Insert entities owned by `thread_id`, returning the ones that were new
pub(crate) fn insert_entities(
    graph: &mut KnowledgeGraph,
    thread_id: &str,
    entities: Vec<Entity>,
) -> Vec<Entity> {
    let mut created = Vec::new();
    for mut entity in entities {
        entity.agent_thread_id = thread_id.to_string();
        entity.strip_status();
        if graph.insert_entity(entity.clone()) {
            created.push(entity);
        } else {
            debug!(entity = %entity.name, "Entity already exists, skipping");
        }
    }
    created
}

/// Insert relations whose endpoints exist and whose key is unused
pub(crate) fn insert_relations(
    graph: &mut KnowledgeGraph,
    relations: Vec<Relation>,
) -> RelationOutcome {
    let names = graph.entity_names();
    let mut outcome = RelationOutcome::default();

    for mut relation in relations {
        if !names.contains(&relation.from) || !names.contains(&relation.to) {
            warn!(
                from = %relation.from,
                to = %relation.to,
                relation_type = %relation.relation_type,
                "Relation endpoint missing, skipping"
            );
            outcome.warnings.push(format!(
                "Skipped relation '{}' -[{}]-> '{}': endpoint does not exist",
                relation.from, relation.relation_type, relation.to
            ));
            continue;
        }
        relation.status = None;
        if graph.insert_relation(relation.clone()) {
            outcome.created.push(relation);
        } else {
            debug!(
                from = %relation.from,
                to = %relation.to,
                relation_type = %relation.relation_type,
                "Relation already exists, skipping"
            );
            outcome.warnings.push(format!(
                "Skipped relation '{}' -[{}]-> '{}': already exists",
                relation.from, relation.relation_type, relation.to
            ));
        }
    }
    outcome
}

/// Append each content not already current on `entity`
fn append_observations(
    entity: &mut Entity,
    thread_id: &str,
    contents: &[String],
    confidence: Option<f64>,
    importance: Option<f64>,
) -> Vec<Observation> {
    let mut added = Vec::new();
    for content in contents {
        if entity.has_current_content(content) {
            continue;
        }
        let mut obs = Observation::new(&entity.name, content.clone(), thread_id);
        obs.confidence = confidence;
        obs.importance = importance;
        entity.observations.push(obs.clone());
        added.push(obs);
    }
    added
}

fn check_scores(confidence: Option<f64>, importance: Option<f64>) -> Result<()> {
    if let Some(c) = confidence
        && !in_unit_range(c)
    {
        return Err(Error::InvalidInput(format!(
            "confidence {c} must be between 0.0 and 1.0"
        )));
    }
    if let Some(i) = importance
        && !in_unit_range(i)
    {
        return Err(Error::InvalidInput(format!(
            "importance {i} must be between 0.0 and 1.0"
        )));
    }
    Ok(())
}
