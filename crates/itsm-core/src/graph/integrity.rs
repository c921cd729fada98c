//! Read-only consistency report for a loaded snapshot.
//!
//! The graph keeps its invariants for every mutation it performs, but a
//! dataset file can be edited by hand. [`check_integrity`] finds whatever
//! such an edit broke. It never repairs anything.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::graph::cycles::{CycleWarning, find_hierarchy_cycles};
use crate::model::{EntityKind, Incident, Problem};
use crate::store::EntityStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// `owner.field` names an entity that does not exist.
    DanglingReference {
        owner: String,
        field: &'static str,
        kind: EntityKind,
        target: String,
    },
    /// Incident points at a problem that does not list it back, or the
    /// problem lists an incident that points elsewhere.
    ProblemLinkAsymmetry { incident: String, problem: String },
    /// `child.parent_incident` and `parent.child_incidents` disagree.
    HierarchyMismatch { child: String, parent: String },
    DuplicateLink {
        owner: String,
        field: &'static str,
        target: String,
    },
    PrimaryAssetAlsoLinked { incident: String, asset: String },
    SelfReference { id: String, field: &'static str },
    HierarchyCycle { cycle_path: Vec<String> },
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingReference {
                owner,
                field,
                kind,
                target,
            } => write!(f, "{owner}.{field} references missing {kind} '{target}'"),
            Self::ProblemLinkAsymmetry { incident, problem } => write!(
                f,
                "problem link between {incident} and {problem} is only recorded on one side"
            ),
            Self::HierarchyMismatch { child, parent } => write!(
                f,
                "parent/child fields disagree for {child} under {parent}"
            ),
            Self::DuplicateLink {
                owner,
                field,
                target,
            } => write!(f, "{owner}.{field} lists '{target}' more than once"),
            Self::PrimaryAssetAlsoLinked { incident, asset } => write!(
                f,
                "{incident} lists its primary asset {asset} in linkedAssets"
            ),
            Self::SelfReference { id, field } => write!(f, "{id}.{field} references itself"),
            Self::HierarchyCycle { cycle_path } => {
                let warning = CycleWarning {
                    cycle_path: cycle_path.clone(),
                };
                write!(f, "{warning}")
            }
        }
    }
}

/// Every invariant violation in `store`, in a stable order: per-incident
/// findings by incident ID, then per-problem findings, then cycles.
#[must_use]
pub fn check_integrity(store: &EntityStore) -> Vec<IntegrityIssue> {
    let mut issues = Vec::new();

    for incident in store.iter::<Incident>() {
        check_incident(store, incident, &mut issues);
    }
    for problem in store.iter::<Problem>() {
        check_problem(store, problem, &mut issues);
    }
    issues.extend(
        find_hierarchy_cycles(store)
            .into_iter()
            .map(|w| IntegrityIssue::HierarchyCycle {
                cycle_path: w.cycle_path,
            }),
    );

    if !issues.is_empty() {
        tracing::debug!(count = issues.len(), "integrity check found issues");
    }
    issues
}

fn check_incident(store: &EntityStore, inc: &Incident, issues: &mut Vec<IntegrityIssue>) {
    let id = inc.id.as_str();
    let mut dangling = |field: &'static str, kind: EntityKind, target: &str| {
        if !store.contains(kind, target) {
            issues.push(IntegrityIssue::DanglingReference {
                owner: id.to_string(),
                field,
                kind,
                target: target.to_string(),
            });
        }
    };

    if let Some(parent) = inc.parent_incident.as_deref() {
        dangling("parentIncident", EntityKind::Incident, parent);
    }
    if let Some(problem) = inc.linked_problem.as_deref() {
        dangling("linkedProblem", EntityKind::Problem, problem);
    }
    if let Some(asset) = inc.affected_asset.as_deref() {
        dangling("affectedAsset", EntityKind::Asset, asset);
    }
    let lists: [(&'static str, EntityKind, &[String]); 4] = [
        ("childIncidents", EntityKind::Incident, &inc.child_incidents),
        ("linkedChanges", EntityKind::Change, &inc.linked_changes),
        ("linkedAssets", EntityKind::Asset, &inc.linked_assets),
        ("linkedKB", EntityKind::KnowledgeArticle, &inc.linked_kb),
    ];
    for (field, kind, ids) in lists {
        for target in ids {
            dangling(field, kind, target);
        }
    }

    for (field, ids) in lists.iter().map(|(field, _, ids)| (*field, *ids)) {
        if ids.iter().any(|t| t == id) {
            issues.push(IntegrityIssue::SelfReference {
                id: id.to_string(),
                field,
            });
        }
        let mut seen = HashSet::new();
        for target in ids {
            if !seen.insert(target.as_str()) {
                issues.push(IntegrityIssue::DuplicateLink {
                    owner: id.to_string(),
                    field,
                    target: target.clone(),
                });
            }
        }
    }
    if inc.parent_incident.as_deref() == Some(id) {
        issues.push(IntegrityIssue::SelfReference {
            id: id.to_string(),
            field: "parentIncident",
        });
    }

    if let Some(asset) = inc.affected_asset.as_deref()
        && inc.linked_assets.iter().any(|a| a == asset)
    {
        issues.push(IntegrityIssue::PrimaryAssetAlsoLinked {
            incident: id.to_string(),
            asset: asset.to_string(),
        });
    }

    if let Some(problem_id) = inc.linked_problem.as_deref()
        && let Some(problem) = store.problem(problem_id)
        && !problem.linked_incidents.iter().any(|i| i == id)
    {
        issues.push(IntegrityIssue::ProblemLinkAsymmetry {
            incident: id.to_string(),
            problem: problem_id.to_string(),
        });
    }

    // parent must list child, and every listed child must point back
    if let Some(parent_id) = inc.parent_incident.as_deref()
        && parent_id != id
        && let Some(parent) = store.incident(parent_id)
        && !parent.child_incidents.iter().any(|c| c == id)
    {
        issues.push(IntegrityIssue::HierarchyMismatch {
            child: id.to_string(),
            parent: parent_id.to_string(),
        });
    }
    for child_id in &inc.child_incidents {
        if let Some(child) = store.incident(child_id)
            && child.parent_incident.as_deref() != Some(id)
        {
            issues.push(IntegrityIssue::HierarchyMismatch {
                child: child_id.clone(),
                parent: id.to_string(),
            });
        }
    }
}

fn check_problem(store: &EntityStore, problem: &Problem, issues: &mut Vec<IntegrityIssue>) {
    let mut seen = HashSet::new();
    for incident_id in &problem.linked_incidents {
        if !seen.insert(incident_id.as_str()) {
            issues.push(IntegrityIssue::DuplicateLink {
                owner: problem.id.clone(),
                field: "linkedIncidents",
                target: incident_id.clone(),
            });
            continue;
        }
        match store.incident(incident_id) {
            None => issues.push(IntegrityIssue::DanglingReference {
                owner: problem.id.clone(),
                field: "linkedIncidents",
                kind: EntityKind::Incident,
                target: incident_id.clone(),
            }),
            Some(inc) if inc.linked_problem.as_deref() != Some(problem.id.as_str()) => {
                issues.push(IntegrityIssue::ProblemLinkAsymmetry {
                    incident: incident_id.clone(),
                    problem: problem.id.clone(),
                });
            }
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Asset, Change};
    use crate::store::Dataset;

    fn base() -> EntityStore {
        let mut store = EntityStore::new();
        store.insert(Incident::new("INC-001", "a"));
        store.insert(Incident::new("INC-002", "b"));
        store.insert(Problem::new("PRB-001", "p"));
        store.insert(Change::new("CHG-456", "c"));
        store.insert(Asset::new("SRV-01", "s"));
        store
    }

    fn with_incident(store: &mut EntityStore, id: &str, f: impl FnOnce(&mut Incident)) {
        if let Some(inc) = store.incident_mut(id) {
            f(inc);
        }
    }

    #[test]
    fn demo_dataset_is_clean() {
        let store = EntityStore::from_dataset(Dataset::demo());
        assert!(check_integrity(&store).is_empty());
    }

    #[test]
    fn detects_dangling_change() {
        let mut store = base();
        with_incident(&mut store, "INC-001", |i| i.linked_changes.push("CHG-404".into()));
        let issues = check_integrity(&store);
        assert_eq!(
            issues,
            vec![IntegrityIssue::DanglingReference {
                owner: "INC-001".into(),
                field: "linkedChanges",
                kind: EntityKind::Change,
                target: "CHG-404".into(),
            }]
        );
        assert_eq!(
            issues[0].to_string(),
            "INC-001.linkedChanges references missing change 'CHG-404'"
        );
    }

    #[test]
    fn detects_one_sided_problem_link_from_both_directions() {
        let mut store = base();
        with_incident(&mut store, "INC-001", |i| i.linked_problem = Some("PRB-001".into()));
        assert!(matches!(
            check_integrity(&store).as_slice(),
            [IntegrityIssue::ProblemLinkAsymmetry { .. }]
        ));

        let mut store = base();
        if let Some(p) = store.problem_mut("PRB-001") {
            p.linked_incidents.push("INC-002".into());
        }
        assert!(matches!(
            check_integrity(&store).as_slice(),
            [IntegrityIssue::ProblemLinkAsymmetry { .. }]
        ));
    }

    #[test]
    fn detects_hierarchy_mismatch() {
        let mut store = base();
        with_incident(&mut store, "INC-002", |i| i.parent_incident = Some("INC-001".into()));
        assert_eq!(
            check_integrity(&store),
            vec![IntegrityIssue::HierarchyMismatch {
                child: "INC-002".into(),
                parent: "INC-001".into(),
            }]
        );
    }

    #[test]
    fn detects_duplicates_and_primary_overlap() {
        let mut store = base();
        with_incident(&mut store, "INC-001", |i| {
            i.affected_asset = Some("SRV-01".into());
            i.linked_assets = vec!["SRV-01".into()];
            i.linked_changes = vec!["CHG-456".into(), "CHG-456".into()];
        });
        let issues = check_integrity(&store);
        assert!(issues.iter().any(|i| matches!(i, IntegrityIssue::DuplicateLink { .. })));
        assert!(issues.iter().any(|i| matches!(i, IntegrityIssue::PrimaryAssetAlsoLinked { .. })));
    }

    #[test]
    fn detects_cycles_and_self_parent() {
        let mut store = base();
        with_incident(&mut store, "INC-001", |i| {
            i.parent_incident = Some("INC-002".into());
            i.child_incidents = vec!["INC-002".into()];
        });
        with_incident(&mut store, "INC-002", |i| {
            i.parent_incident = Some("INC-001".into());
            i.child_incidents = vec!["INC-001".into()];
        });
        let issues = check_integrity(&store);
        assert_eq!(
            issues,
            vec![IntegrityIssue::HierarchyCycle {
                cycle_path: vec!["INC-001".into(), "INC-002".into(), "INC-001".into()],
            }]
        );

        let mut store = base();
        with_incident(&mut store, "INC-001", |i| i.parent_incident = Some("INC-001".into()));
        let issues = check_integrity(&store);
        assert!(issues.contains(&IntegrityIssue::SelfReference {
            id: "INC-001".into(),
            field: "parentIncident",
        }));
        assert!(issues.iter().any(|i| matches!(i, IntegrityIssue::HierarchyCycle { .. })));
    }

    #[test]
    fn issues_serialize_with_tag() {
        let issue = IntegrityIssue::HierarchyMismatch {
            child: "INC-002".into(),
            parent: "INC-001".into(),
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["issue"], "hierarchy_mismatch");
    }
}
