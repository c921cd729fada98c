//! Cycle detection for the incident parent hierarchy.
//!
//! # Edge direction
//!
//! Each incident has at most one parent, so the hierarchy is a set of parent
//! pointers `child -> parent`. Making `parent` the parent of `child` closes a
//! cycle exactly when walking parent pointers upward from `parent` reaches
//! `child`.
//!
//! # Design
//!
//! - The incremental check ([`would_create_cycle`]) is a pure upward walk over
//!   the store. It never mutates, so pickers can call it for every candidate.
//! - The walk keeps a visited set. Revisiting a node means the existing data
//!   already contains a loop; that is reported as a cycle too, since no new
//!   edge can be proven safe on top of a corrupt chain.
//! - [`find_hierarchy_cycles`] scans a whole snapshot with Tarjan's SCC and is
//!   used by integrity checks on loaded data.

#![allow(clippy::module_name_repetitions)]

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::model::Incident;
use crate::store::EntityStore;

/// A loop in the parent hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleWarning {
    /// Incident IDs in parent-pointer order, with the first ID repeated at the
    /// end. `["INC-1", "INC-2", "INC-1"]` means INC-1's parent is INC-2 and
    /// INC-2's parent is INC-1.
    pub cycle_path: Vec<String>,
}

impl CycleWarning {
    /// Number of distinct incidents in the loop.
    #[must_use]
    pub const fn cycle_len(&self) -> usize {
        self.cycle_path.len().saturating_sub(1)
    }

    /// `true` for an incident that is its own parent.
    #[must_use]
    pub const fn is_self_loop(&self) -> bool {
        self.cycle_len() == 1
    }
}

impl fmt::Display for CycleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_self_loop() {
            write!(
                f,
                "hierarchy cycle: '{}' is its own parent",
                self.cycle_path.first().map_or("", String::as_str)
            )
        } else {
            write!(
                f,
                "hierarchy cycle ({} incidents): {}",
                self.cycle_len(),
                self.cycle_path.join(" → ")
            )
        }
    }
}

/// Would making `candidate_parent_id` the parent of `child_id` create a cycle?
///
/// `true` when the candidate is the child itself, when the child is reachable
/// by walking parent pointers up from the candidate (the candidate is a
/// descendant of the child), or when that walk runs into a pre-existing loop.
/// Unknown IDs simply end the walk.
#[must_use]
pub fn would_create_cycle(store: &EntityStore, child_id: &str, candidate_parent_id: &str) -> bool {
    cycle_path(store, child_id, candidate_parent_id).is_some()
}

/// Like [`would_create_cycle`], but returns the offending chain.
///
/// The path starts at `child_id`, follows the proposed edge to the candidate,
/// then the existing parent pointers back to the repeated node.
#[must_use]
pub fn cycle_path(
    store: &EntityStore,
    child_id: &str,
    candidate_parent_id: &str,
) -> Option<Vec<String>> {
    let mut path = vec![child_id.to_string()];
    let mut visited: HashSet<&str> = HashSet::new();
    let mut current = Some(candidate_parent_id);

    while let Some(id) = current {
        path.push(id.to_string());
        if id == child_id {
            return Some(path);
        }
        if !visited.insert(id) {
            tracing::warn!(
                child = child_id,
                candidate = candidate_parent_id,
                repeated = id,
                "existing parent chain already loops"
            );
            return Some(path);
        }
        current = store
            .incident(id)
            .and_then(|inc| inc.parent_incident.as_deref());
    }

    None
}

/// Find every loop in the parent hierarchy of a snapshot.
///
/// Only edges whose parent exists are considered; dangling parents are an
/// integrity problem of their own. Results are sorted for stable output.
#[must_use]
pub fn find_hierarchy_cycles(store: &EntityStore) -> Vec<CycleWarning> {
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

    for id in store.ids::<Incident>() {
        nodes.insert(id, graph.add_node(id.to_string()));
    }

    for incident in store.iter::<Incident>() {
        let Some(parent) = incident.parent_incident.as_deref() else {
            continue;
        };
        if let (Some(&from), Some(&to)) = (nodes.get(incident.id.as_str()), nodes.get(parent)) {
            graph.add_edge(from, to, ());
        }
    }

    let mut warnings: Vec<CycleWarning> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1
                || component
                    .first()
                    .is_some_and(|n| graph.find_edge(*n, *n).is_some())
        })
        .filter_map(|component| {
            let start = component.iter().map(|idx| graph[*idx].as_str()).min()?;
            Some(CycleWarning {
                cycle_path: walk_loop(store, start),
            })
        })
        .collect();

    warnings.sort_by(|a, b| a.cycle_path.cmp(&b.cycle_path));
    warnings
}

/// Follow parent pointers from `start` until it comes around again.
fn walk_loop(store: &EntityStore, start: &str) -> Vec<String> {
    let mut path = vec![start.to_string()];
    let mut seen: HashSet<&str> = HashSet::from([start]);
    let mut current = store
        .incident(start)
        .and_then(|inc| inc.parent_incident.as_deref());

    while let Some(id) = current {
        path.push(id.to_string());
        if !seen.insert(id) {
            break;
        }
        current = store
            .incident(id)
            .and_then(|inc| inc.parent_incident.as_deref());
    }

    path
}
