//! Relation inversion
//!
//! Every relation declared through the save pipeline is stored together with
//! its inverse so the graph can be walked from either end. The
//! `RelationInverter` is an explicit registry: build one at startup, share it
//! through an `Arc`, and extend it with `register` as new verbs appear.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

/// Built-in verb pairs, registered in both directions
const BUILTIN_PAIRS: &[(&str, &str)] = &[
    ("created", "created by"),
    ("contains", "contained in"),
    ("uses", "used by"),
    ("manages", "managed by"),
    ("owns", "owned by"),
    ("modifies", "modified by"),
    ("updates", "updated by"),
];

const PASSIVE_SUFFIX: &str = " by";
const INVERSE_SUFFIX: &str = " (inverse)";

/// Registry mapping a relation type to its semantic inverse
#[derive(Debug)]
pub struct RelationInverter {
    table: RwLock<HashMap<String, String>>,
}

impl Default for RelationInverter {
    fn default() -> Self {
        Self::new()
    }
}

impl RelationInverter {
    /// Create a registry seeded with the built-in verb pairs
    pub fn new() -> Self {
        let inverter = Self {
            table: RwLock::new(HashMap::new()),
        };
        for (forward, inverse) in BUILTIN_PAIRS {
            inverter.register(forward, inverse);
        }
        inverter
    }

    /// Register a pair; both directions are inserted. There is no removal.
    pub fn register(&self, relation_type: &str, inverse: &str) {
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
        table.insert(relation_type.to_string(), inverse.to_string());
        table.insert(inverse.to_string(), relation_type.to_string());
        debug!(relation_type, inverse, "Registered inverse relation");
    }

    /// Inverse of a relation type.
    ///
    /// Registered types use the table. Otherwise a trailing " by" is
    /// stripped, a trailing " (inverse)" is stripped, and anything else gets
    /// " (inverse)" appended.
    pub fn inverse_of(&self, relation_type: &str) -> String {
        if let Some(inverse) = self
            .table
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(relation_type)
        {
            return inverse.clone();
        }

        if let Some(active) = relation_type.strip_suffix(PASSIVE_SUFFIX)
            && !active.is_empty()
        {
            return active.to_string();
        }

        if let Some(original) = relation_type.strip_suffix(INVERSE_SUFFIX)
            && !original.is_empty()
        {
            return original.to_string();
        }

        format!("{relation_type}{INVERSE_SUFFIX}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_pairs_both_directions() {
        let inverter = RelationInverter::new();
        assert_eq!(inverter.inverse_of("manages"), "managed by");
        assert_eq!(inverter.inverse_of("managed by"), "manages");
        assert_eq!(inverter.inverse_of("contains"), "contained in");
        assert_eq!(inverter.inverse_of("contained in"), "contains");
    }

    #[test]
    fn test_heuristic_fallbacks() {
        let inverter = RelationInverter::new();
        assert_eq!(inverter.inverse_of("tested by"), "tested");
        assert_eq!(inverter.inverse_of("foo"), "foo (inverse)");
        assert_eq!(inverter.inverse_of("foo (inverse)"), "foo");
    }

    #[test]
    fn test_register_extends_table() {
        let inverter = RelationInverter::new();
        assert_eq!(inverter.inverse_of("mentors"), "mentors (inverse)");
        inverter.register("mentors", "mentored by");
        assert_eq!(inverter.inverse_of("mentors"), "mentored by");
        assert_eq!(inverter.inverse_of("mentored by"), "mentors");
    }

    #[test]
    fn test_shared_through_arc() {
        let inverter = std::sync::Arc::new(RelationInverter::new());
        let other = inverter.clone();
        other.register("parent of", "child of");
        assert_eq!(inverter.inverse_of("child of"), "parent of");
    }
}
