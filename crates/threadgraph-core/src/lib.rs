//! Threadgraph Core Library
//!
//! A persistent knowledge graph used as long-term memory for agent
//! conversations ("threads"). This crate provides:
//! - Domain model (entities, versioned observations, relations)
//! - Relation inversion and observation version chains
//! - Storage (one JSONL shard per thread, plus an in-memory adapter)
//! - Save request validation and quality scoring
//! - Graph manager, query, prune and collaboration services
//! - In-process write locking

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::application::requests::*;
    pub use crate::application::services::{
        CollaborationService, KnowledgeGraphManager, PruneService, QueryService,
        SaveMemoryResponse,
    };
    pub use crate::config::Config;
    pub use crate::domain::graph::{Entity, KnowledgeGraph, Observation, Relation};
    pub use crate::domain::relations::RelationInverter;
    pub use crate::error::{Error, Result};
    pub use crate::storage::{InMemoryStorage, JsonlStorage, StorageAdapter};
}
