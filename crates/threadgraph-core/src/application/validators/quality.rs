//! Save request quality score
//!
//! Rewards connectivity (relations per entity, capped at the target) and
//! atomicity (short observations). Only the entities of the request being
//! saved are scored.

use crate::application::requests::EntityInput;

use super::{MAX_OBSERVATION_LENGTH, TARGET_RELATIONS_PER_ENTITY};

const CONNECTIVITY_WEIGHT: f64 = 0.7;
const ATOMICITY_WEIGHT: f64 = 0.3;

/// Quality score in [0, 1]
pub fn quality_score(entities: &[EntityInput]) -> f64 {
    if entities.is_empty() {
        return 0.0;
    }

    let relation_count: usize = entities.iter().map(|e| e.relations.len()).sum();
    let avg_relations = relation_count as f64 / entities.len() as f64;
    let connectivity = (avg_relations / TARGET_RELATIONS_PER_ENTITY).min(1.0);

    let lengths: Vec<usize> = entities
        .iter()
        .flat_map(|e| e.observations.iter().map(|o| o.chars().count()))
        .collect();
    let avg_length = if lengths.is_empty() {
        0.0
    } else {
        lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
    };
    let atomicity = 1.0 - avg_length / MAX_OBSERVATION_LENGTH as f64;

    (CONNECTIVITY_WEIGHT * connectivity + ATOMICITY_WEIGHT * atomicity).clamp(0.0, 1.0)
}
