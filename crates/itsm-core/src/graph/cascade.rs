//! Deleting entities without leaving dangling references behind.
//!
//! Each `delete_*` removes the record and then sweeps every relation field
//! that can name it. Children of a deleted incident become roots.

use serde::Serialize;
use tracing::info;

use crate::error::LinkError;
use crate::graph::RelationshipGraph;
use crate::model::{self, Asset, Change, EntityKind, Incident, KnowledgeArticle, Problem};
use crate::notify::Notice;
use crate::store::Stored;

/// What a cascade delete removed and which records it had to edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub kind: EntityKind,
    pub id: String,
    /// Records whose relation fields were cleaned, sorted by ID.
    pub touched: Vec<String>,
}

impl RelationshipGraph {
    /// Delete an incident and detach it from its parent, children and problem.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if the incident does not exist.
    pub fn delete_incident(&mut self, id: &str) -> Result<DeleteReport, LinkError> {
        let result = self.remove_or_not_found::<Incident>(id).map(|_| {
            let mut touched = Vec::new();
            self.sweep_incidents(&mut touched, |inc| {
                let mut changed = model::remove_id(&mut inc.child_incidents, id);
                if inc.parent_incident.as_deref() == Some(id) {
                    inc.parent_incident = None;
                    changed = true;
                }
                changed
            });
            self.sweep_problems(&mut touched, |p| model::remove_id(&mut p.linked_incidents, id));
            touched
        });
        self.finish_delete(EntityKind::Incident, id, result)
    }

    /// Delete a problem and clear `linked_problem` on every incident naming it.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if the problem does not exist.
    pub fn delete_problem(&mut self, id: &str) -> Result<DeleteReport, LinkError> {
        let result = self.remove_or_not_found::<Problem>(id).map(|_| {
            let mut touched = Vec::new();
            self.sweep_incidents(&mut touched, |inc| {
                if inc.linked_problem.as_deref() == Some(id) {
                    inc.linked_problem = None;
                    true
                } else {
                    false
                }
            });
            touched
        });
        self.finish_delete(EntityKind::Problem, id, result)
    }

    /// Delete a change and drop it from every incident's change list.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if the change does not exist.
    pub fn delete_change(&mut self, id: &str) -> Result<DeleteReport, LinkError> {
        let result = self.remove_or_not_found::<Change>(id).map(|_| {
            let mut touched = Vec::new();
            self.sweep_incidents(&mut touched, |inc| model::remove_id(&mut inc.linked_changes, id));
            touched
        });
        self.finish_delete(EntityKind::Change, id, result)
    }

    /// Delete an asset. Incidents lose it as primary affected asset and from
    /// their linked assets.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if the asset does not exist.
    pub fn delete_asset(&mut self, id: &str) -> Result<DeleteReport, LinkError> {
        let result = self.remove_or_not_found::<Asset>(id).map(|_| {
            let mut touched = Vec::new();
            self.sweep_incidents(&mut touched, |inc| {
                let mut changed = model::remove_id(&mut inc.linked_assets, id);
                if inc.affected_asset.as_deref() == Some(id) {
                    inc.affected_asset = None;
                    changed = true;
                }
                changed
            });
            touched
        });
        self.finish_delete(EntityKind::Asset, id, result)
    }

    /// Delete a knowledge article and drop it from every incident.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if the article does not exist.
    pub fn delete_knowledge_article(&mut self, id: &str) -> Result<DeleteReport, LinkError> {
        let result = self.remove_or_not_found::<KnowledgeArticle>(id).map(|_| {
            let mut touched = Vec::new();
            self.sweep_incidents(&mut touched, |inc| model::remove_id(&mut inc.linked_kb, id));
            touched
        });
        self.finish_delete(EntityKind::KnowledgeArticle, id, result)
    }

    /// Dispatch on `kind`.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if no entity of that kind has this ID.
    pub fn delete(&mut self, kind: EntityKind, id: &str) -> Result<DeleteReport, LinkError> {
        match kind {
            EntityKind::Incident => self.delete_incident(id),
            EntityKind::Problem => self.delete_problem(id),
            EntityKind::Change => self.delete_change(id),
            EntityKind::Asset => self.delete_asset(id),
            EntityKind::KnowledgeArticle => self.delete_knowledge_article(id),
        }
    }

    fn remove_or_not_found<E: Stored>(&mut self, id: &str) -> Result<E, LinkError> {
        self.store_mut()
            .remove::<E>(id)
            .ok_or_else(|| LinkError::not_found(E::KIND, id))
    }

    fn sweep_incidents(
        &mut self,
        touched: &mut Vec<String>,
        mut f: impl FnMut(&mut Incident) -> bool,
    ) {
        let edited: Vec<String> = self
            .store_mut()
            .iter_mut::<Incident>()
            .filter_map(|inc| f(inc).then(|| inc.id.clone()))
            .collect();
        for id in edited {
            self.store_mut().touch(EntityKind::Incident, &id);
            touched.push(id);
        }
    }

    fn sweep_problems(
        &mut self,
        touched: &mut Vec<String>,
        mut f: impl FnMut(&mut Problem) -> bool,
    ) {
        let edited: Vec<String> = self
            .store_mut()
            .iter_mut::<Problem>()
            .filter_map(|p| f(p).then(|| p.id.clone()))
            .collect();
        for id in edited {
            self.store_mut().touch(EntityKind::Problem, &id);
            touched.push(id);
        }
    }

    fn finish_delete(
        &mut self,
        kind: EntityKind,
        id: &str,
        result: Result<Vec<String>, LinkError>,
    ) -> Result<DeleteReport, LinkError> {
        match result {
            Ok(mut touched) => {
                touched.sort();
                info!(%kind, id, touched = touched.len(), "deleted with cascade cleanup");

                self.record(crate::audit::AuditEntry::new(self.actor(), "Deleted", id).with_details(
                    format!("{kind}; cleaned {} reference(s)", touched.len()),
                ));
                let mut refresh = vec![id.to_string()];
                refresh.extend(touched.iter().cloned());
                self.refresh_all(&refresh);
                self.notify(&Notice::success(format!("Deleted {kind} {id}")));

                Ok(DeleteReport {
                    kind,
                    id: id.to_string(),
                    touched,
                })
            }
            Err(err) => {
                tracing::warn!(code = %err.code(), "{err}");
                self.notify(&Notice::from_error(&err));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::check_integrity;
    use crate::store::EntityStore;

    fn linked_graph() -> RelationshipGraph {
        let mut store = EntityStore::new();
        store.insert(Incident::new("INC-001", "Mail down").with_affected_asset("SRV-01"));
        store.insert(Incident::new("INC-002", "Outlook errors"));
        store.insert(Incident::new("INC-003", "Webmail slow"));
        store.insert(Problem::new("PRB-001", "Transport queue"));
        store.insert(Change::new("CHG-456", "Patch"));
        store.insert(Asset::new("SRV-01", "Mail server"));
        store.insert(Asset::new("SW-02", "Switch"));
        store.insert(KnowledgeArticle::new("KB-101", "Runbook"));

        let mut g = RelationshipGraph::new(store);
        g.set_parent_incident("INC-002", "INC-001").unwrap();
        g.set_parent_incident("INC-003", "INC-001").unwrap();
        g.link_problem("INC-001", "PRB-001").unwrap();
        g.link_problem("INC-002", "PRB-001").unwrap();
        g.link_change("INC-001", "CHG-456").unwrap();
        g.link_change("INC-003", "CHG-456").unwrap();
        g.link_asset("INC-002", "SRV-01").unwrap();
        g.link_asset("INC-001", "SW-02").unwrap();
        g.link_knowledge_article("INC-001", "KB-101").unwrap();
        g
    }

    #[test]
    fn deleting_parent_orphans_children_as_roots() {
        let mut g = linked_graph();
        let report = g.delete_incident("INC-001").unwrap();

        assert_eq!(report.touched, vec!["INC-002", "INC-003", "PRB-001"]);
        assert!(g.store().incident("INC-002").unwrap().parent_incident.is_none());
        assert_eq!(g.roots(), vec!["INC-002", "INC-003"]);
        assert_eq!(
            g.store().problem("PRB-001").unwrap().linked_incidents,
            vec!["INC-002"]
        );
        assert!(check_integrity(g.store()).is_empty());
    }

    #[test]
    fn deleting_child_updates_parent() {
        let mut g = linked_graph();
        g.delete_incident("INC-002").unwrap();
        assert_eq!(
            g.store().incident("INC-001").unwrap().child_incidents,
            vec!["INC-003"]
        );
    }

    #[test]
    fn deleting_problem_clears_incidents() {
        let mut g = linked_graph();
        let report = g.delete_problem("PRB-001").unwrap();
        assert_eq!(report.touched, vec!["INC-001", "INC-002"]);
        assert!(g.store().incident("INC-001").unwrap().linked_problem.is_none());
    }

    #[test]
    fn deleting_asset_clears_primary_and_linked() {
        let mut g = linked_graph();
        let report = g.delete_asset("SRV-01").unwrap();
        assert_eq!(report.touched, vec!["INC-001", "INC-002"]);
        assert!(g.store().incident("INC-001").unwrap().affected_asset.is_none());
        assert!(g.store().incident("INC-002").unwrap().linked_assets.is_empty());
        assert!(check_integrity(g.store()).is_empty());
    }

    #[test]
    fn deleting_change_and_kb() {
        let mut g = linked_graph();
        assert_eq!(g.delete_change("CHG-456").unwrap().touched.len(), 2);
        assert_eq!(
            g.delete(EntityKind::KnowledgeArticle, "KB-101")
                .unwrap()
                .touched,
            vec!["INC-001"]
        );
        assert!(check_integrity(g.store()).is_empty());
    }

    #[test]
    fn deleting_unreferenced_entity_touches_nothing() {
        let mut g = linked_graph();
        g.insert(Change::new("CHG-789", "Unused"));
        assert!(g.delete_change("CHG-789").unwrap().touched.is_empty());
    }

    #[test]
    fn deleting_missing_entity_is_not_found() {
        let mut g = linked_graph();
        let before = g.store().clone();
        assert!(matches!(g.delete_problem("PRB-404"), Err(LinkError::NotFound { .. })));
        assert_eq!(g.store(), &before);
    }
}
