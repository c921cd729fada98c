//! Read-only queries over the incident parent/child hierarchy.
//!
//! - Which incidents are above a given incident?
//! - Which incidents sit anywhere below it?
//! - Which incidents can be offered as a new parent without closing a loop?
//!
//! Every traversal keeps a visited set so corrupt snapshots terminate.

use std::collections::{HashSet, VecDeque};

use crate::error::LinkError;
use crate::graph::cycles::would_create_cycle;
use crate::model::{EntityKind, Incident};
use crate::store::EntityStore;

fn require_incident<'a>(store: &'a EntityStore, id: &str) -> Result<&'a Incident, LinkError> {
    store
        .incident(id)
        .ok_or_else(|| LinkError::not_found(EntityKind::Incident, id))
}

/// Ancestor chain from the immediate parent up to the root.
///
/// The chain stops at a dangling parent ID (it is included, since that is
/// what the incident points at) or at the first repeated node.
///
/// # Errors
///
/// Returns [`LinkError::NotFound`] if `id` is not an incident.
pub fn ancestors(store: &EntityStore, id: &str) -> Result<Vec<String>, LinkError> {
    let start = require_incident(store, id)?;

    let mut chain = Vec::new();
    let mut visited: HashSet<&str> = HashSet::from([start.id.as_str()]);
    let mut current = start.parent_incident.as_deref();

    while let Some(parent_id) = current {
        if !visited.insert(parent_id) {
            break; // cycle guard
        }
        chain.push(parent_id.to_string());
        current = store
            .incident(parent_id)
            .and_then(|p| p.parent_incident.as_deref());
    }

    Ok(chain)
}

/// Every incident below `id`, breadth-first, not including `id` itself.
///
/// # Errors
///
/// Returns [`LinkError::NotFound`] if `id` is not an incident.
pub fn descendants(store: &EntityStore, id: &str) -> Result<Vec<String>, LinkError> {
    let root = require_incident(store, id)?;

    let mut visited: HashSet<&str> = HashSet::from([root.id.as_str()]);
    let mut queue: VecDeque<&str> = root.child_incidents.iter().map(String::as_str).collect();
    let mut result = Vec::new();

    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        result.push(current.to_string());
        if let Some(inc) = store.incident(current) {
            queue.extend(inc.child_incidents.iter().map(String::as_str));
        }
    }

    Ok(result)
}

/// Distance from the root: 0 for an incident without a parent.
///
/// # Errors
///
/// Returns [`LinkError::NotFound`] if `id` is not an incident.
pub fn depth(store: &EntityStore, id: &str) -> Result<usize, LinkError> {
    ancestors(store, id).map(|chain| chain.len())
}

/// Incidents without a parent, sorted by ID.
#[must_use]
pub fn roots(store: &EntityStore) -> Vec<String> {
    store
        .iter::<Incident>()
        .filter(|inc| inc.parent_incident.is_none())
        .map(|inc| inc.id.clone())
        .collect()
}

/// Incidents that may be offered as the new parent of `child_id`.
///
/// Excludes the child, its current parent, and anything that would close a
/// loop. Sorted by ID.
///
/// # Errors
///
/// Returns [`LinkError::NotFound`] if `child_id` is not an incident.
pub fn candidate_parents(store: &EntityStore, child_id: &str) -> Result<Vec<String>, LinkError> {
    let child = require_incident(store, child_id)?;
    let current = child.parent_incident.as_deref();

    Ok(store
        .ids::<Incident>()
        .filter(|id| Some(*id) != current)
        .filter(|id| !would_create_cycle(store, child_id, id))
        .map(str::to_string)
        .collect())
}
