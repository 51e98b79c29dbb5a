//! Observation version chains
//!
//! Each observation may point back to the version it replaced (`supersedes`)
//! and forward to the version that replaced it (`superseded_by`). Chains are
//! persisted data and can be corrupted by hand edits or racing writers, so
//! every walk here carries a visited set and stops on a repeat id.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use super::graph::{Entity, Observation};
use crate::error::{Error, Result};

/// Full lineage of an observation, oldest first.
///
/// Starts at `observation_id`, walks `supersedes` back to the root and
/// `superseded_by` forward to the head.
pub fn observation_history(entity: &Entity, observation_id: &str) -> Result<Vec<Observation>> {
    let by_id: HashMap<&str, &Observation> = entity
        .observations
        .iter()
        .map(|o| (o.id.as_str(), o))
        .collect();

    let start = by_id
        .get(observation_id)
        .copied()
        .ok_or_else(|| Error::ObservationNotFound {
            entity: entity.name.clone(),
            observation_id: observation_id.to_string(),
        })?;

    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(start.id.as_str());

    let mut older = Vec::new();
    let mut cursor = start.supersedes.as_deref();
    while let Some(id) = cursor {
        if !visited.insert(id) {
            warn!(entity = %entity.name, observation_id = id, "Cycle in supersedes chain");
            break;
        }
        let Some(obs) = by_id.get(id) else { break };
        older.push((*obs).clone());
        cursor = obs.supersedes.as_deref();
    }
    older.reverse();

    let mut newer = Vec::new();
    let mut cursor = start.superseded_by.as_deref();
    while let Some(id) = cursor {
        if !visited.insert(id) {
            warn!(entity = %entity.name, observation_id = id, "Cycle in superseded_by chain");
            break;
        }
        let Some(obs) = by_id.get(id) else { break };
        newer.push((*obs).clone());
        cursor = obs.superseded_by.as_deref();
    }

    let mut history = older;
    history.push(start.clone());
    history.extend(newer);
    Ok(history)
}

/// The current head of the lineage containing `observation_id`
pub fn chain_head(entity: &Entity, observation_id: &str) -> Result<Observation> {
    observation_history(entity, observation_id)?
        .pop()
        .ok_or_else(|| Error::ObservationNotFound {
            entity: entity.name.clone(),
            observation_id: observation_id.to_string(),
        })
}

/// Observations that have not been superseded, in insertion order
pub fn current_observations(entity: &Entity) -> Vec<&Observation> {
    entity.observations.iter().filter(|o| o.is_current()).collect()
}

/// Link `old` to `new` as consecutive versions of the same fact
pub(crate) fn link_versions(old: &mut Observation, new: &mut Observation) {
    new.version = old.version + 1;
    new.supersedes = Some(old.id.clone());
    old.superseded_by = Some(new.id.clone());
}

/// Relink survivors around versions removed from their lineage.
///
/// `removed` maps each removed id to the observation as it was before
/// removal. A survivor pointing at a removed version is pointed past it to
/// the nearest survivor on the same side; the link is cleared only when no
/// survivor remains on that side, so each lineage keeps a single head.
pub(crate) fn splice_out(observations: &mut [Observation], removed: &HashMap<String, Observation>) {
    for obs in observations.iter_mut() {
        if let Some(next) = obs.superseded_by.clone()
            && removed.contains_key(&next)
        {
            obs.superseded_by = nearest_survivor(next, removed, |o| o.superseded_by.clone());
        }
        if let Some(prev) = obs.supersedes.clone()
            && removed.contains_key(&prev)
        {
            obs.supersedes = nearest_survivor(prev, removed, |o| o.supersedes.clone());
        }
    }
}

fn nearest_survivor(
    start: String,
    removed: &HashMap<String, Observation>,
    step: impl Fn(&Observation) -> Option<String>,
) -> Option<String> {
    let mut visited = HashSet::new();
    let mut cursor = Some(start);
    while let Some(id) = cursor {
        let Some(gone) = removed.get(&id) else {
            return Some(id);
        };
        if !visited.insert(id) {
            return None;
        }
        cursor = step(gone);
    }
    None
}
