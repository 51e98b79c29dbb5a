//! Entity validation
//!
//! Checks one entity of a save request and produces the canonical form of
//! its type. The caller's input is never modified; the normalized type is
//! returned for the caller to substitute before building the entity.

use std::collections::HashSet;

use crate::application::requests::EntityInput;

use super::{
    MAX_ENTITY_NAME_LENGTH, MAX_ENTITY_TYPE_LENGTH, ObservationValidator, ValidationIssue,
    in_unit_range, preview,
};

/// Outcome of validating a single entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityValidation {
    /// Canonical entity type to persist
    pub normalized_type: String,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<String>,
}

/// Validator for entities in a save request
pub struct EntityValidator;

impl EntityValidator {
    /// Canonical form of an entity type.
    ///
    /// Multi-word types collapse into PascalCase ("data store" becomes
    /// "DataStore"); single words get a capitalized first letter.
    pub fn normalize_type(entity_type: &str) -> String {
        entity_type
            .split_whitespace()
            .map(capitalize_first)
            .collect::<String>()
    }

    /// Validate one entity.
    ///
    /// `batch_names` are the entity names declared in the same request;
    /// `existing_names` are names already persisted in any thread. A relation
    /// target must appear in one of the two.
    pub fn validate(
        index: usize,
        entity: &EntityInput,
        batch_names: &HashSet<String>,
        existing_names: &HashSet<String>,
    ) -> EntityValidation {
        let normalized_type = Self::normalize_type(&entity.entity_type);
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let issue = |field: &str, message: String, suggestion: Option<&str>| ValidationIssue {
            entity_index: index,
            entity_name: entity.name.clone(),
            entity_type: entity.entity_type.clone(),
            field: field.to_string(),
            message,
            suggestion: suggestion.map(str::to_string),
            observation_preview: None,
        };

        let name_length = entity.name.trim().chars().count();
        if name_length == 0 || name_length > MAX_ENTITY_NAME_LENGTH {
            errors.push(issue(
                "name",
                format!("Entity name must be between 1 and {MAX_ENTITY_NAME_LENGTH} characters"),
                Some("Use a short, unique name such as 'PaymentService'"),
            ));
        }

        let type_length = entity.entity_type.trim().chars().count();
        if type_length == 0 || type_length > MAX_ENTITY_TYPE_LENGTH {
            errors.push(issue(
                "entityType",
                format!("Entity type must be between 1 and {MAX_ENTITY_TYPE_LENGTH} characters"),
                Some("Use a short category such as 'Person', 'Project' or 'Service'"),
            ));
        } else if normalized_type != entity.entity_type {
            warnings.push(format!(
                "Entity '{}': type '{}' normalized to '{}'",
                entity.name, entity.entity_type, normalized_type
            ));
        }

        if let Some(confidence) = entity.confidence
            && !in_unit_range(confidence)
        {
            errors.push(issue(
                "confidence",
                format!("Confidence {confidence} must be between 0.0 and 1.0"),
                None,
            ));
        }
        if let Some(importance) = entity.importance
            && !in_unit_range(importance)
        {
            errors.push(issue(
                "importance",
                format!("Importance {importance} must be between 0.0 and 1.0"),
                None,
            ));
        }

        for content in &entity.observations {
            if let Err(violation) = ObservationValidator::validate(content) {
                let mut error = issue(
                    "observations",
                    violation.message,
                    Some(violation.suggestion.as_str()),
                );
                error.observation_preview = Some(preview(content));
                errors.push(error);
            }
        }

        if entity.relations.is_empty() {
            errors.push(issue(
                "relations",
                "Entity must declare at least one relation".to_string(),
                Some("Connect it to a related entity, e.g. {\"targetEntity\": \"Project\", \"relationType\": \"part of\"}"),
            ));
        }

        for relation in &entity.relations {
            if relation.relation_type.trim().is_empty() {
                errors.push(issue(
                    "relations",
                    format!(
                        "Relation to '{}' has an empty relation type",
                        relation.target_entity
                    ),
                    None,
                ));
            }
            if let Some(importance) = relation.importance
                && !in_unit_range(importance)
            {
                errors.push(issue(
                    "relations",
                    format!(
                        "Relation to '{}' has importance {importance} outside 0.0 to 1.0",
                        relation.target_entity
                    ),
                    None,
                ));
            }
            let target = &relation.target_entity;
            if !batch_names.contains(target) && !existing_names.contains(target) {
                errors.push(issue(
                    "relations",
                    format!("Relation target '{target}' does not exist"),
                    Some("Create the target entity in the same request or save it first"),
                ));
            }
        }

        EntityValidation {
            normalized_type,
            errors,
            warnings,
        }
    }
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_type() {
        assert_eq!(EntityValidator::normalize_type("person"), "Person");
        assert_eq!(EntityValidator::normalize_type("Person"), "Person");
        assert_eq!(EntityValidator::normalize_type("data  store"), "DataStore");
        assert_eq!(EntityValidator::normalize_type(" api gateway "), "ApiGateway");
        assert_eq!(EntityValidator::normalize_type("éclair"), "Éclair");
    }

    #[test]
    fn test_valid_entity_with_self_relation() {
        let entity = EntityInput::new("A", "Thing")
            .with_observation("x is true")
            .with_relation("A", "self");
        let result = EntityValidator::validate(0, &entity, &names(&["A"]), &HashSet::new());
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_type_normalization_warns_without_mutating_input() {
        let entity = EntityInput::new("A", "web service").with_relation("A", "self");
        let result = EntityValidator::validate(0, &entity, &names(&["A"]), &HashSet::new());
        assert!(result.errors.is_empty());
        assert_eq!(result.normalized_type, "WebService");
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(entity.entity_type, "web service");
    }

    #[test]
    fn test_missing_relations_is_error() {
        let entity = EntityInput::new("A", "Thing").with_observation("x is true");
        let result = EntityValidator::validate(2, &entity, &names(&["A"]), &HashSet::new());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "relations");
        assert_eq!(result.errors[0].entity_index, 2);
    }

    #[test]
    fn test_relation_target_may_exist_in_other_thread() {
        let entity = EntityInput::new("A", "Thing").with_relation("Shared", "uses");
        let missing = EntityValidator::validate(0, &entity, &names(&["A"]), &HashSet::new());
        assert_eq!(missing.errors.len(), 1);

        let existing = EntityValidator::validate(0, &entity, &names(&["A"]), &names(&["Shared"]));
        assert!(existing.errors.is_empty());
    }

    #[test]
    fn test_observation_error_has_preview() {
        let long = "z".repeat(301);
        let entity = EntityInput::new("A", "Thing")
            .with_observation(long)
            .with_relation("A", "self");
        let result = EntityValidator::validate(0, &entity, &names(&["A"]), &HashSet::new());
        assert_eq!(result.errors.len(), 1);
        let error = &result.errors[0];
        assert!(error.message.contains("too long"));
        assert_eq!(error.observation_preview.as_deref(), Some(format!("{}...", "z".repeat(50)).as_str()));
    }

    #[test]
    fn test_bounds_on_name_type_and_scores() {
        let mut entity = EntityInput::new("", &"t".repeat(51)).with_relation("X", "uses");
        entity.confidence = Some(1.5);
        entity.importance = Some(-0.1);
        let result = EntityValidator::validate(0, &entity, &names(&["X"]), &HashSet::new());
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "entityType", "confidence", "importance"]);
    }
}
