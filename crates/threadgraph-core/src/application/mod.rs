//! Application service layer
//!
//! Orchestrates domain operations over a storage adapter: validation of
//! incoming requests, the save transaction, CRUD, reads and retention.

pub mod requests;
pub mod services;
pub mod validators;

pub use requests::{
    BulkUpdateItem, EntityInput, ObservationAddition, ObservationDeletion, PruneOptions,
    QueryFilters, RelationInput, RelationSpec, UpdateObservationParams,
};
