//! Threadgraph Core Integration Tests
//!
//! Exercises the services end to end over JSONL shards in a temp directory.

use std::sync::Arc;

use tempfile::TempDir;
use threadgraph_core::{
    Error,
    application::requests::{
        EntityInput, ObservationAddition, PruneOptions, QueryFilters, UpdateObservationParams,
    },
    application::services::{
        CollaborationService, KnowledgeGraphManager, PruneService, QueryService,
    },
    domain::graph::{Entity, ItemStatus},
    domain::relations::RelationInverter,
    storage::{JsonlStorage, StorageAdapter, shard_file_name},
};

fn storage(dir: &TempDir) -> Arc<JsonlStorage> {
    Arc::new(JsonlStorage::new(dir.path().join("memory")))
}

fn manager(dir: &TempDir) -> Arc<KnowledgeGraphManager> {
    Arc::new(KnowledgeGraphManager::new(
        storage(dir),
        Arc::new(RelationInverter::new()),
    ))
}

fn linked(name: &str, target: &str, relation_type: &str, fact: &str) -> EntityInput {
    EntityInput::new(name, "Thing")
        .with_observation(fact)
        .with_relation(target, relation_type)
}

#[tokio::test]
async fn test_save_persists_per_thread_shards() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);

    let response = manager
        .save_memory("alpha", vec![linked("A", "A", "self", "x is true")])
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(response.created.entities, 1);
    assert_eq!(response.created.relations, 2);

    manager
        .save_memory("beta", vec![linked("B", "A", "uses", "B depends on A")])
        .await
        .unwrap();

    let memory_dir = dir.path().join("memory");
    assert!(memory_dir.join(shard_file_name("alpha")).exists());
    assert!(memory_dir.join(shard_file_name("beta")).exists());

    // A fresh adapter over the same directory sees the merged graph
    let reloaded = storage(&dir).load_graph().await.unwrap();
    assert_eq!(reloaded.entities.len(), 2);
    assert_eq!(reloaded.relations.len(), 4);
    assert!(
        reloaded
            .relations
            .iter()
            .any(|r| r.from == "A" && r.to == "B" && r.relation_type == "used by")
    );
}

#[tokio::test]
async fn test_names_stay_unique_across_threads() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);

    for thread in ["t1", "t2", "t3"] {
        manager
            .create_entities(
                thread,
                vec![Entity::new("Shared", "Thing", thread), Entity::new(format!("Own-{thread}"), "Thing", thread)],
            )
            .await
            .unwrap();
    }

    let graph = manager.load().await.unwrap();
    assert_eq!(graph.entities.iter().filter(|e| e.name == "Shared").count(), 1);
    assert_eq!(graph.entities.len(), 4);
}

#[tokio::test]
async fn test_too_long_observation_rejected_without_writes() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);

    let response = manager
        .save_memory("t1", vec![linked("A", "A", "self", &"x".repeat(301))])
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].entity_index, 0);
    assert!(response.errors[0].message.contains("too long"));
    assert!(!dir.path().join("memory").join(shard_file_name("t1")).exists());
}

#[tokio::test]
async fn test_version_chain_survives_reload() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    manager
        .save_memory("t1", vec![linked("Service", "Service", "self", "runs v1")])
        .await
        .unwrap();

    let graph = manager.load().await.unwrap();
    let mut current_id = graph.entity("Service").unwrap().observations[0].id.clone();
    let first_id = current_id.clone();

    for version in 2..=4 {
        let updated = manager
            .update_observation(UpdateObservationParams {
                entity_name: "Service".into(),
                observation_id: current_id.clone(),
                new_content: format!("runs v{version}"),
                agent_thread_id: Some("t2".into()),
                confidence: None,
                importance: None,
            })
            .await
            .unwrap();
        assert_eq!(updated.version, version);
        current_id = updated.id;
    }

    let history = manager.observation_history("Service", &first_id).await.unwrap();
    let versions: Vec<u32> = history.iter().map(|o| o.version).collect();
    assert_eq!(versions, vec![1, 2, 3, 4]);

    let graph = storage(&dir).load_graph().await.unwrap();
    let entity = graph.entity("Service").unwrap();
    let current: Vec<_> = entity.observations.iter().filter(|o| o.is_current()).collect();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].id, current_id);
    assert_eq!(current[0].agent_thread_id, "t2");
}

#[tokio::test]
async fn test_delete_entity_removes_relations_and_empty_shard() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    manager
        .save_memory("t1", vec![linked("A", "A", "self", "x is true")])
        .await
        .unwrap();
    manager
        .save_memory("t2", vec![linked("B", "A", "uses", "B depends on A")])
        .await
        .unwrap();

    assert_eq!(manager.delete_entities("t1", &["A".to_string()]).await.unwrap(), 1);

    let graph = manager.load().await.unwrap();
    assert!(graph.relations.iter().all(|r| r.from != "A" && r.to != "A"));
    assert!(graph.relations.is_empty());
    assert!(!dir.path().join("memory").join(shard_file_name("t1")).exists());
}

#[tokio::test]
async fn test_add_observation_dedup_against_current_content() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    manager
        .save_memory("t1", vec![linked("A", "A", "self", "x is true")])
        .await
        .unwrap();

    manager
        .add_observations(
            "t1",
            vec![ObservationAddition {
                entity_name: "A".into(),
                contents: vec!["x is true".into()],
                confidence: None,
                importance: None,
            }],
        )
        .await
        .unwrap();

    let graph = manager.load().await.unwrap();
    assert_eq!(graph.entity("A").unwrap().observations.len(), 1);
}

#[tokio::test]
async fn test_read_graph_archives_low_importance() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    manager
        .save_memory(
            "t1",
            vec![
                linked("Keep", "Faint", "mentions", "important fact").with_importance(0.8),
                linked("Faint", "Keep", "mentioned by", "barely relevant").with_importance(0.05),
            ],
        )
        .await
        .unwrap();

    let query = QueryService::new(manager.storage().clone());

    let view = query.read_graph("t1", Some(0.0)).await.unwrap();
    assert_eq!(
        view.entity("Faint").unwrap().status,
        Some(ItemStatus::Archived)
    );
    assert_eq!(view.entity("Keep").unwrap().status, None);

    let view = query.read_graph("t1", Some(0.1)).await.unwrap();
    assert!(view.entity("Faint").is_none());
    for entity in &view.entities {
        assert!(entity.status.is_none());
        assert!(entity.observations.iter().all(|o| o.status.is_none()));
    }
    assert!(view.relations.iter().all(|r| r.status.is_none()));

    // Decorations never reach disk
    let raw = std::fs::read_to_string(dir.path().join("memory").join(shard_file_name("t1"))).unwrap();
    assert!(!raw.contains("ARCHIVED"));

    let other_thread = query.read_graph("t2", None).await.unwrap();
    assert!(other_thread.is_empty());
}

#[tokio::test]
async fn test_search_and_query_span_threads() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    manager
        .save_memory("t1", vec![linked("Postgres", "Postgres", "self", "Primary database")])
        .await
        .unwrap();
    manager
        .save_memory("t2", vec![linked("Api", "Postgres", "uses", "Reads from the DATABASE")])
        .await
        .unwrap();

    let query = QueryService::new(manager.storage().clone());
    let found = query.search_nodes("database").await.unwrap();
    assert_eq!(found.entities.len(), 2);
    assert_eq!(found.relations.len(), 4);

    let none = query
        .query_nodes(&QueryFilters {
            confidence_max: Some(0.5),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(none.entities.is_empty());
    assert!(none.relations.is_empty());
}

#[tokio::test]
async fn test_prune_keeps_minimum() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    manager
        .save_memory("t1", vec![linked("First", "First", "self", "older fact").with_importance(0.2)])
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    manager
        .save_memory("t1", vec![linked("Second", "Second", "self", "newer fact").with_importance(0.2)])
        .await
        .unwrap();

    let prune = PruneService::new(manager.clone());
    let result = prune
        .prune_memory(&PruneOptions {
            importance_less_than: Some(0.5),
            keep_min_entities: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(result.removed_entities, 1);
    let graph = manager.load().await.unwrap();
    assert_eq!(graph.entities.len(), 1);
    assert_eq!(graph.entities[0].name, "Second");
    assert!(graph.relations.iter().all(|r| r.from == "Second"));
}

#[tokio::test]
async fn test_concurrent_writers_do_not_lose_updates() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);

    let mut handles = Vec::new();
    for i in 0..8 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            let name = format!("Entity{i}");
            manager
                .save_memory(
                    &format!("thread-{i}"),
                    vec![linked(&name, &name, "self", "written concurrently")],
                )
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().success);
    }

    let graph = storage(&dir).load_graph().await.unwrap();
    assert_eq!(graph.entities.len(), 8);
    assert_eq!(graph.relations.len(), 16);
}

#[tokio::test]
async fn test_collaboration_flow() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    manager
        .save_memory("t1", vec![linked("A", "A", "self", "x is true")])
        .await
        .unwrap();

    let collaboration = CollaborationService::new(manager.clone());
    assert!(collaboration.flag_for_review("t1", "A", "needs a source").await.unwrap());

    let flagged = collaboration.get_flagged_entities(Some("t1")).await.unwrap();
    assert_eq!(flagged[0].reasons, vec!["needs a source".to_string()]);

    let conversations = collaboration.list_conversations().await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].observation_count, 2);

    let err = collaboration
        .flag_for_review("t1", "Missing", "no entity")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EntityNotFound { .. }));
}
