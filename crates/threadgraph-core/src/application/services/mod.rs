//! Application services
//!
//! The manager owns every write path; query, prune and collaboration
//! services are built on top of it or on the same storage adapter.

pub mod collaboration;
pub mod manager;
pub mod prune;
pub mod query;
pub mod save;

pub use collaboration::{CollaborationService, ConversationSummary, FlaggedEntity, REVIEW_PREFIX};
pub use manager::{
    ANY_THREAD, AddedObservations, BulkUpdateResult, KnowledgeGraphManager, RelationOutcome,
};
pub use prune::{PruneResult, PruneService};
pub use query::QueryService;
pub use save::{CreatedCounts, SaveMemoryResponse};
