//! Application validators
//!
//! Stateless checks run on save requests before anything is persisted.
//! Violations are collected as data, never raised, so one bad entity does
//! not hide problems in the rest of the request.

pub mod entity_validator;
pub mod observation_validator;
pub mod quality;
pub mod request_validator;

pub use entity_validator::{EntityValidation, EntityValidator};
pub use observation_validator::{ObservationValidator, ObservationViolation};
pub use quality::quality_score;
pub use request_validator::{RequestValidator, ValidationReport};

use serde::{Deserialize, Serialize};

/// Observation length bounds, in characters
pub const MIN_OBSERVATION_LENGTH: usize = 5;
pub const MAX_OBSERVATION_LENGTH: usize = 150;

/// Maximum sentences per observation after technical masking
pub const MAX_SENTENCES: usize = 3;

/// Entity name and type length bounds, in characters
pub const MAX_ENTITY_NAME_LENGTH: usize = 100;
pub const MAX_ENTITY_TYPE_LENGTH: usize = 50;

/// Average relations per entity that earns the full connectivity score
pub const TARGET_RELATIONS_PER_ENTITY: f64 = 2.0;

/// Characters of observation content quoted in an error
pub const OBSERVATION_PREVIEW_LENGTH: usize = 50;

/// A validation error tied to one entity of a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub entity_index: usize,
    pub entity_name: String,
    pub entity_type: String,
    /// Field the problem was found in, e.g. "observations"
    pub field: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_preview: Option<String>,
}

/// First `OBSERVATION_PREVIEW_LENGTH` characters of `content`
pub fn preview(content: &str) -> String {
    if content.chars().count() <= OBSERVATION_PREVIEW_LENGTH {
        return content.to_string();
    }
    let head: String = content.chars().take(OBSERVATION_PREVIEW_LENGTH).collect();
    format!("{head}...")
}

/// Whether a score lies in the closed unit interval
pub(crate) fn in_unit_range(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}
