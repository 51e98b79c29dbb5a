//! Domain layer
//!
//! The graph data model and the pure logic that operates on it.

pub mod graph;
pub mod locking;
pub mod relations;
pub mod versioning;
