//! The related-items panel: everything an incident points at, with titles.

use serde::Serialize;

use crate::error::LinkError;
use crate::graph::RelationshipGraph;
use crate::model::{EntityKind, Incident};
use crate::store::EntityStore;

/// One entry in the panel. `label` is `None` when the ID does not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedItem {
    pub kind: EntityKind,
    pub id: String,
    pub label: Option<String>,
}

impl RelatedItem {
    fn resolve(store: &EntityStore, kind: EntityKind, id: &str) -> Self {
        Self {
            kind,
            id: id.to_string(),
            label: store.label(kind, id).map(str::to_string),
        }
    }

    #[must_use]
    pub const fn is_dangling(&self) -> bool {
        self.label.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedItems {
    pub incident_id: String,
    pub title: String,
    pub parent: Option<RelatedItem>,
    pub children: Vec<RelatedItem>,
    pub problem: Option<RelatedItem>,
    pub changes: Vec<RelatedItem>,
    pub affected_asset: Option<RelatedItem>,
    pub assets: Vec<RelatedItem>,
    pub knowledge_articles: Vec<RelatedItem>,
}

impl RelatedItems {
    fn build(store: &EntityStore, incident: &Incident) -> Self {
        let one = |kind, id: &Option<String>| {
            id.as_deref().map(|id| RelatedItem::resolve(store, kind, id))
        };
        let many = |kind, ids: &[String]| {
            ids.iter()
                .map(|id| RelatedItem::resolve(store, kind, id))
                .collect::<Vec<_>>()
        };

        Self {
            incident_id: incident.id.clone(),
            title: incident.title.clone(),
            parent: one(EntityKind::Incident, &incident.parent_incident),
            children: many(EntityKind::Incident, &incident.child_incidents),
            problem: one(EntityKind::Problem, &incident.linked_problem),
            changes: many(EntityKind::Change, &incident.linked_changes),
            affected_asset: one(EntityKind::Asset, &incident.affected_asset),
            assets: many(EntityKind::Asset, &incident.linked_assets),
            knowledge_articles: many(EntityKind::KnowledgeArticle, &incident.linked_kb),
        }
    }

    /// Every item in display order.
    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &RelatedItem> {
        self.parent
            .iter()
            .chain(&self.children)
            .chain(&self.problem)
            .chain(&self.changes)
            .chain(&self.affected_asset)
            .chain(&self.assets)
            .chain(&self.knowledge_articles)
    }

    #[must_use]
    pub fn dangling(&self) -> impl Iterator<Item = &RelatedItem> {
        self.iter().filter(|item| item.is_dangling())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Build the panel for one incident.
///
/// # Errors
///
/// Returns [`LinkError::NotFound`] if `incident_id` is not an incident.
pub fn related_items(store: &EntityStore, incident_id: &str) -> Result<RelatedItems, LinkError> {
    store
        .incident(incident_id)
        .map(|incident| RelatedItems::build(store, incident))
        .ok_or_else(|| LinkError::not_found(EntityKind::Incident, incident_id))
}

impl RelationshipGraph {
    /// See [`related_items`].
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::NotFound`] if `incident_id` is not an incident.
    pub fn related_items(&self, incident_id: &str) -> Result<RelatedItems, LinkError> {
        related_items(self.store(), incident_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Asset, Change, KnowledgeArticle, Problem};

    fn graph() -> RelationshipGraph {
        let mut store = EntityStore::new();
        store.insert(Incident::new("INC-001", "Mail down").with_affected_asset("SRV-01"));
        store.insert(Incident::new("INC-002", "Outlook errors"));
        store.insert(Problem::new("PRB-001", "Transport queue"));
        store.insert(Change::new("CHG-456", "Patch transport"));
        store.insert(Asset::new("SRV-01", "Mail server"));
        store.insert(Asset::new("SW-02", "Core switch"));
        store.insert(KnowledgeArticle::new("KB-101", "Restart transport"));
        RelationshipGraph::new(store)
    }

    #[test]
    fn empty_panel_still_shows_primary_asset() {
        let g = graph();
        let items = g.related_items("INC-002").unwrap();
        assert!(items.is_empty());

        let items = g.related_items("INC-001").unwrap();
        assert_eq!(
            items.affected_asset.as_ref().and_then(|a| a.label.as_deref()),
            Some("Mail server")
        );
    }

    #[test]
    fn panel_resolves_every_relation() {
        let mut g = graph();
        g.link_change("INC-001", "CHG-456").unwrap();
        g.link_problem("INC-001", "PRB-001").unwrap();
        g.link_asset("INC-001", "SW-02").unwrap();
        g.link_knowledge_article("INC-001", "KB-101").unwrap();
        g.set_parent_incident("INC-002", "INC-001").unwrap();

        let items = g.related_items("INC-001").unwrap();
        assert_eq!(items.title, "Mail down");
        assert_eq!(items.children[0].id, "INC-002");
        assert_eq!(items.problem.as_ref().unwrap().label.as_deref(), Some("Transport queue"));
        assert_eq!(items.changes[0].label.as_deref(), Some("Patch transport"));
        assert_eq!(items.assets[0].kind, EntityKind::Asset);
        assert_eq!(items.knowledge_articles[0].id, "KB-101");
        assert_eq!(items.iter().count(), 6);
        assert_eq!(items.dangling().count(), 0);

        let child = g.related_items("INC-002").unwrap();
        assert_eq!(child.parent.unwrap().id, "INC-001");
    }

    #[test]
    fn dangling_ids_are_flagged() {
        let mut store = EntityStore::new();
        let mut inc = Incident::new("INC-001", "Mail down");
        inc.linked_changes.push("CHG-GONE".to_string());
        store.insert(inc);

        let items = related_items(&store, "INC-001").unwrap();
        let dangling: Vec<&str> = items.dangling().map(|i| i.id.as_str()).collect();
        assert_eq!(dangling, vec!["CHG-GONE"]);
    }

    #[test]
    fn unknown_incident_is_not_found() {
        assert!(matches!(
            graph().related_items("INC-404"),
            Err(LinkError::NotFound { .. })
        ));
    }
}
