//! JSONL shard storage
//!
//! The graph is stored as one JSON Lines file per thread:
//!
//! ```text
//! <memory dir>/
//! ├── thread-alpha.jsonl
//! ├── thread-beta.jsonl
//! └── thread-default.jsonl
//! ```
//!
//! Each non-empty line is a single record tagged with its kind:
//!
//! ```text
//! {"type":"entity","name":"Alice","entityType":"Person","observations":[...],"agentThreadId":"alpha",...}
//! {"type":"relation","from":"Alice","to":"Parser","relationType":"maintains","agentThreadId":"alpha",...}
//! ```
//!
//! Loading merges every shard and skips lines it cannot use. Saving regroups
//! the graph by thread, rewrites every shard in full, and removes shards whose
//! thread no longer owns anything.

use std::collections::{BTreeMap, HashSet};
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use super::StorageAdapter;
use crate::domain::graph::{Entity, KnowledgeGraph, Relation};
use crate::error::{Error, Result};

/// Shard file name prefix
pub const SHARD_PREFIX: &str = "thread-";

/// Shard file extension
pub const SHARD_EXTENSION: &str = ".jsonl";

/// One line of a shard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ShardRecord {
    Entity(Entity),
    Relation(Relation),
}

/// Shard file name for a thread id.
///
/// Characters outside `[A-Za-z0-9._-]` are replaced with `_` so any thread id
/// maps to a plain file name inside the memory directory.
pub fn shard_file_name(thread_id: &str) -> String {
    let safe: String = thread_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{SHARD_PREFIX}{safe}{SHARD_EXTENSION}")
}

fn is_shard_file(name: &str) -> bool {
    name.starts_with(SHARD_PREFIX) && name.ends_with(SHARD_EXTENSION)
}

/// Storage adapter writing one JSONL shard per thread
#[derive(Debug, Clone)]
pub struct JsonlStorage {
    dir: PathBuf,
}

impl JsonlStorage {
    /// Create an adapter rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the shard for a thread
    pub fn shard_path(&self, thread_id: &str) -> PathBuf {
        self.dir.join(shard_file_name(thread_id))
    }

    /// File names of all shards currently on disk, sorted
    async fn list_shards(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut shards = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str()
                && is_shard_file(name)
            {
                shards.push(name.to_string());
            }
        }
        shards.sort();
        Ok(shards)
    }

    /// Parse one shard's contents, skipping lines that cannot be used
    fn parse_shard(file_name: &str, contents: &str) -> Vec<ShardRecord> {
        let mut records = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let line_number = index + 1;

            let record: ShardRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    warn!(shard = file_name, line = line_number, error = %e, "Skipping malformed record");
                    continue;
                }
            };

            let complete = match &record {
                ShardRecord::Entity(entity) => {
                    !entity.name.is_empty() && !entity.agent_thread_id.is_empty()
                }
                ShardRecord::Relation(relation) => {
                    !relation.from.is_empty()
                        && !relation.to.is_empty()
                        && !relation.relation_type.is_empty()
                        && !relation.agent_thread_id.is_empty()
                }
            };
            if !complete {
                warn!(shard = file_name, line = line_number, "Skipping incomplete record");
                continue;
            }

            records.push(record);
        }
        records
    }

    /// Write a shard atomically: temp file first, then rename over the target
    async fn write_shard(&self, file_name: &str, records: &[ShardRecord]) -> Result<()> {
        let mut buffer = String::new();
        for record in records {
            buffer.push_str(&serde_json::to_string(record)?);
            buffer.push('\n');
        }

        let target = self.dir.join(file_name);
        let tmp = self.dir.join(format!("{file_name}.tmp"));
        fs::write(&tmp, buffer).await?;
        fs::rename(&tmp, &target).await.map_err(|e| {
            Error::Storage(format!("failed to replace shard {}: {}", target.display(), e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for JsonlStorage {
    async fn initialize(&self) -> Result<()> {
        if let Ok(meta) = fs::metadata(&self.dir).await
            && !meta.is_dir()
        {
            return Err(Error::Storage(format!(
                "memory path {} exists and is not a directory",
                self.dir.display()
            )));
        }
        fs::create_dir_all(&self.dir).await?;
        debug!(dir = %self.dir.display(), "Memory directory ready");
        Ok(())
    }

    async fn load_graph(&self) -> Result<KnowledgeGraph> {
        let mut graph = KnowledgeGraph::new();
        let mut seen_entities: HashSet<String> = HashSet::new();
        let mut seen_relations = HashSet::new();

        for file_name in self.list_shards().await? {
            let contents = match fs::read_to_string(self.dir.join(&file_name)).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            for record in Self::parse_shard(&file_name, &contents) {
                match record {
                    ShardRecord::Entity(mut entity) => {
                        if !seen_entities.insert(entity.name.clone()) {
                            warn!(shard = %file_name, entity = %entity.name, "Duplicate entity across shards, keeping first");
                            continue;
                        }
                        entity.strip_status();
                        graph.entities.push(entity);
                    }
                    ShardRecord::Relation(mut relation) => {
                        if !seen_relations.insert(relation.key()) {
                            continue;
                        }
                        relation.status = None;
                        graph.relations.push(relation);
                    }
                }
            }
        }

        debug!(
            entities = graph.entities.len(),
            relations = graph.relations.len(),
            "Graph loaded"
        );
        Ok(graph)
    }

    async fn save_graph(&self, graph: &KnowledgeGraph) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let mut shards: BTreeMap<String, Vec<ShardRecord>> = BTreeMap::new();
        for entity in &graph.entities {
            let mut entity = entity.clone();
            entity.strip_status();
            shards
                .entry(shard_file_name(&entity.agent_thread_id))
                .or_default()
                .push(ShardRecord::Entity(entity));
        }
        for relation in &graph.relations {
            let mut relation = relation.clone();
            relation.status = None;
            shards
                .entry(shard_file_name(&relation.agent_thread_id))
                .or_default()
                .push(ShardRecord::Relation(relation));
        }

        for (file_name, records) in &shards {
            self.write_shard(file_name, records).await?;
        }

        let mut removed = 0usize;
        for file_name in self.list_shards().await? {
            if shards.contains_key(&file_name) {
                continue;
            }
            match fs::remove_file(self.dir.join(&file_name)).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            debug!(shard = %file_name, "Removed empty shard");
        }

        info!(
            shards_written = shards.len(),
            shards_removed = removed,
            entities = graph.entities.len(),
            relations = graph.relations.len(),
            "Graph saved"
        );
        Ok(())
    }
}
