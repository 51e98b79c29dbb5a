//! Save request validation
//!
//! Runs every entity through `EntityValidator` and aggregates the results.
//! A request is valid only when no entity produced an error; all entities
//! are checked regardless.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::application::requests::EntityInput;

use super::{EntityValidator, ValidationIssue};

/// Aggregated outcome of validating a save request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<String>,
    /// Input entities with canonical types substituted
    #[serde(skip)]
    pub normalized: Vec<EntityInput>,
}

/// Validator for whole save requests
pub struct RequestValidator;

impl RequestValidator {
    /// Validate every entity of a request against the batch and the
    /// names already persisted
    pub fn validate(entities: &[EntityInput], existing_names: &HashSet<String>) -> ValidationReport {
        let batch_names: HashSet<String> = entities.iter().map(|e| e.name.clone()).collect();

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut normalized = Vec::with_capacity(entities.len());

        for (index, entity) in entities.iter().enumerate() {
            let result = EntityValidator::validate(index, entity, &batch_names, existing_names);
            errors.extend(result.errors);
            warnings.extend(result.warnings);
            normalized.push(EntityInput {
                entity_type: result.normalized_type,
                ..entity.clone()
            });
        }

        if entities.is_empty() {
            warnings.push("Save request contains no entities".to_string());
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
            warnings,
            normalized,
        }
    }
}
