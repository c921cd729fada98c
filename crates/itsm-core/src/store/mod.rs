//! In-memory entity store: one ordered map per collection.
//!
//! The store is a plain record container. Relation fields are only mutated
//! from inside the crate (the relationship graph and cascade deletes), so
//! every link change goes through the invariant checks in [`crate::graph`].

mod dataset;

pub use dataset::Dataset;

use std::collections::BTreeMap;

use crate::model::{Asset, Change, Entity, EntityKind, Incident, KnowledgeArticle, Problem};

/// Maps an entity type to its collection inside [`EntityStore`].
pub trait Stored: Entity + Sized + 'static {
    fn collection(store: &EntityStore) -> &BTreeMap<String, Self>;
    fn collection_mut(store: &mut EntityStore) -> &mut BTreeMap<String, Self>;
}

/// Largest stamp accepted from a snapshot.
pub const TIMESTAMP_CEILING: i64 = i64::MAX / 2;

macro_rules! impl_stored {
    ($ty:ty, $field:ident) => {
        impl Stored for $ty {
            fn collection(store: &EntityStore) -> &BTreeMap<String, Self> {
                &store.$field
            }

            fn collection_mut(store: &mut EntityStore) -> &mut BTreeMap<String, Self> {
                &mut store.$field
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityStore {
    incidents: BTreeMap<String, Incident>,
    problems: BTreeMap<String, Problem>,
    changes: BTreeMap<String, Change>,
    assets: BTreeMap<String, Asset>,
    knowledge_articles: BTreeMap<String, KnowledgeArticle>,
    last_timestamp: i64,
}

impl_stored!(Incident, incidents);
impl_stored!(Problem, problems);
impl_stored!(Change, changes);
impl_stored!(Asset, assets);
impl_stored!(KnowledgeArticle, knowledge_articles);

impl EntityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot. Timestamps already present in the
    /// snapshot are kept; the monotonic clock resumes after the newest one.
    #[must_use]
    pub fn from_dataset(dataset: Dataset) -> Self {
        let mut store = Self::new();
        store.last_timestamp = dataset.newest_timestamp().min(TIMESTAMP_CEILING);

        for incident in dataset.incidents {
            store.load(incident);
        }
        for problem in dataset.problems {
            store.load(problem);
        }
        for change in dataset.changes {
            store.load(change);
        }
        for asset in dataset.assets {
            store.load(asset);
        }
        for article in dataset.knowledge_articles {
            store.load(article);
        }
        store
    }

    #[must_use]
    pub fn to_dataset(&self) -> Dataset {
        Dataset {
            incidents: self.incidents.values().cloned().collect(),
            problems: self.problems.values().cloned().collect(),
            changes: self.changes.values().cloned().collect(),
            assets: self.assets.values().cloned().collect(),
            knowledge_articles: self.knowledge_articles.values().cloned().collect(),
        }
    }

    fn load<E: Stored>(&mut self, mut entity: E) {
        let id = entity.id().to_string();
        if self.collection_has::<E>(&id) {
            tracing::warn!(
                kind = %E::KIND,
                id = %id,
                "duplicate id in dataset; keeping the later record"
            );
        }
        if entity.created_at() > TIMESTAMP_CEILING || entity.updated_at() > TIMESTAMP_CEILING {
            tracing::warn!(kind = %E::KIND, id = %id, "timestamp beyond ceiling; clamped");
            let created_at = entity.created_at().min(TIMESTAMP_CEILING);
            entity.set_timestamps(Some(created_at), entity.updated_at().min(TIMESTAMP_CEILING));
        }
        E::collection_mut(self).insert(id, entity);
    }

    fn collection_has<E: Stored>(&self, id: &str) -> bool {
        E::collection(self).contains_key(id)
    }

    /// Next value for an `updated_at` stamp, in Unix microseconds.
    ///
    /// Strictly increasing for the lifetime of the store, even if the wall
    /// clock stalls or steps backwards. Loaded stamps are clamped to
    /// [`TIMESTAMP_CEILING`], which leaves room for `i64::MAX / 2` further
    /// stamps.
    pub fn next_timestamp(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_micros();
        let ts = now.max(self.last_timestamp.saturating_add(1));
        self.last_timestamp = ts;
        ts
    }

    /// Insert a new entity, stamping `created_at` and `updated_at`.
    ///
    /// An ID that is already taken is refused and the entity is handed back
    /// untouched, so existing relation fields are never overwritten.
    /// Relation fields of a new entity are stored as given; use
    /// [`crate::graph::check_integrity`] to validate hand-built data.
    pub fn insert<E: Stored>(&mut self, mut entity: E) -> Option<E> {
        if self.collection_has::<E>(entity.id()) {
            tracing::debug!(
                kind = %E::KIND,
                id = entity.id(),
                "insert refused; id already present"
            );
            return Some(entity);
        }
        let ts = self.next_timestamp();
        entity.set_timestamps(Some(ts), ts);
        E::collection_mut(self).insert(entity.id().to_string(), entity);
        None
    }

    #[must_use]
    pub fn get<E: Stored>(&self, id: &str) -> Option<&E> {
        E::collection(self).get(id)
    }

    pub(crate) fn get_mut<E: Stored>(&mut self, id: &str) -> Option<&mut E> {
        E::collection_mut(self).get_mut(id)
    }

    pub(crate) fn remove<E: Stored>(&mut self, id: &str) -> Option<E> {
        E::collection_mut(self).remove(id)
    }

    #[must_use]
    pub fn iter<E: Stored>(&self) -> impl Iterator<Item = &E> {
        E::collection(self).values()
    }

    pub(crate) fn iter_mut<E: Stored>(&mut self) -> impl Iterator<Item = &mut E> {
        E::collection_mut(self).values_mut()
    }

    #[must_use]
    pub fn ids<E: Stored>(&self) -> impl Iterator<Item = &str> {
        E::collection(self).keys().map(String::as_str)
    }

    #[must_use]
    pub fn incident(&self, id: &str) -> Option<&Incident> {
        self.get(id)
    }

    #[must_use]
    pub fn problem(&self, id: &str) -> Option<&Problem> {
        self.get(id)
    }

    #[must_use]
    pub fn change(&self, id: &str) -> Option<&Change> {
        self.get(id)
    }

    #[must_use]
    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.get(id)
    }

    #[must_use]
    pub fn knowledge_article(&self, id: &str) -> Option<&KnowledgeArticle> {
        self.get(id)
    }

    pub(crate) fn incident_mut(&mut self, id: &str) -> Option<&mut Incident> {
        self.get_mut(id)
    }

    pub(crate) fn problem_mut(&mut self, id: &str) -> Option<&mut Problem> {
        self.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Incident => self.incidents.contains_key(id),
            EntityKind::Problem => self.problems.contains_key(id),
            EntityKind::Change => self.changes.contains_key(id),
            EntityKind::Asset => self.assets.contains_key(id),
            EntityKind::KnowledgeArticle => self.knowledge_articles.contains_key(id),
        }
    }

    /// Title (or asset name) of an entity, if it exists.
    #[must_use]
    pub fn label(&self, kind: EntityKind, id: &str) -> Option<&str> {
        match kind {
            EntityKind::Incident => self.incidents.get(id).map(Entity::label),
            EntityKind::Problem => self.problems.get(id).map(Entity::label),
            EntityKind::Change => self.changes.get(id).map(Entity::label),
            EntityKind::Asset => self.assets.get(id).map(Entity::label),
            EntityKind::KnowledgeArticle => self.knowledge_articles.get(id).map(Entity::label),
        }
    }

    /// Bump `updated_at` on one entity. Returns `false` if it does not exist.
    pub(crate) fn touch(&mut self, kind: EntityKind, id: &str) -> bool {
        let ts = self.next_timestamp();
        match kind {
            EntityKind::Incident => Self::stamp::<Incident>(self, id, ts),
            EntityKind::Problem => Self::stamp::<Problem>(self, id, ts),
            EntityKind::Change => Self::stamp::<Change>(self, id, ts),
            EntityKind::Asset => Self::stamp::<Asset>(self, id, ts),
            EntityKind::KnowledgeArticle => Self::stamp::<KnowledgeArticle>(self, id, ts),
        }
    }

    fn stamp<E: Stored>(store: &mut Self, id: &str, ts: i64) -> bool {
        store.get_mut::<E>(id).is_some_and(|e| {
            e.set_timestamps(None, ts);
            true
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.incidents.len()
            + self.problems.len()
            + self.changes.len()
            + self.assets.len()
            + self.knowledge_articles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_stamps_timestamps() {
        let mut store = EntityStore::new();
        store.insert(Incident::new("INC-001", "Mail down"));
        let inc = store.incident("INC-001").unwrap();
        assert!(inc.created_at > 0);
        assert_eq!(inc.created_at, inc.updated_at);
    }

    #[test]
    fn timestamps_are_strictly_increasing() {
        let mut store = EntityStore::new();
        let mut last = store.next_timestamp();
        for _ in 0..1000 {
            let ts = store.next_timestamp();
            assert!(ts > last);
            last = ts;
        }
    }

    #[test]
    fn clock_resumes_after_newest_snapshot_stamp() {
        let mut dataset = Dataset::default();
        let mut inc = Incident::new("INC-001", "x");
        inc.updated_at = i64::MAX / 2;
        dataset.incidents.push(inc);

        let mut store = EntityStore::from_dataset(dataset);
        assert!(store.next_timestamp() > i64::MAX / 2);
    }

    #[test]
    fn touch_updates_only_target() {
        let mut store = EntityStore::new();
        store.insert(Incident::new("INC-001", "a"));
        store.insert(Incident::new("INC-002", "b"));
        let before_other = store.incident("INC-002").unwrap().updated_at;
        let before = store.incident("INC-001").unwrap().updated_at;

        assert!(store.touch(EntityKind::Incident, "INC-001"));
        assert!(store.incident("INC-001").unwrap().updated_at > before);
        assert_eq!(store.incident("INC-002").unwrap().updated_at, before_other);
    }

    #[test]
    fn insert_refuses_taken_id() {
        let mut store = EntityStore::new();
        let mut original = Incident::new("INC-001", "Mail down");
        original.linked_changes.push("CHG-456".to_string());
        assert!(store.insert(original).is_none());
        let stamped = store.incident("INC-001").unwrap().updated_at;

        let refused = store.insert(Incident::new("INC-001", "replacement"));
        assert_eq!(refused.map(|inc| inc.title), Some("replacement".to_string()));

        let kept = store.incident("INC-001").unwrap();
        assert_eq!(kept.title, "Mail down");
        assert_eq!(kept.linked_changes, vec!["CHG-456"]);
        assert_eq!(kept.updated_at, stamped);
    }

    #[test]
    fn snapshot_stamps_at_i64_max_still_advance() {
        let mut dataset = Dataset::default();
        let mut inc = Incident::new("INC-001", "x");
        inc.created_at = i64::MAX;
        inc.updated_at = i64::MAX;
        dataset.incidents.push(inc);

        let mut store = EntityStore::from_dataset(dataset);
        let loaded = store.incident("INC-001").unwrap().updated_at;
        assert_eq!(loaded, TIMESTAMP_CEILING);

        assert!(store.touch(EntityKind::Incident, "INC-001"));
        let first = store.incident("INC-001").unwrap().updated_at;
        assert!(store.touch(EntityKind::Incident, "INC-001"));
        let second = store.incident("INC-001").unwrap().updated_at;
        assert!(loaded < first && first < second);
    }

    #[test]
    fn touch_missing_returns_false() {
        let mut store = EntityStore::new();
        assert!(!store.touch(EntityKind::Change, "CHG-404"));
    }

    #[test]
    fn contains_and_label_per_kind() {
        let mut store = EntityStore::new();
        store.insert(Asset::new("SRV-01", "Mail server"));
        store.insert(KnowledgeArticle::new("KB-101", "Restart transport"));

        assert!(store.contains(EntityKind::Asset, "SRV-01"));
        assert!(!store.contains(EntityKind::Incident, "SRV-01"));
        assert_eq!(store.label(EntityKind::Asset, "SRV-01"), Some("Mail server"));
        assert_eq!(
            store.label(EntityKind::KnowledgeArticle, "KB-101"),
            Some("Restart transport")
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn dataset_round_trip_preserves_records() {
        let store = EntityStore::from_dataset(Dataset::demo());
        let again = EntityStore::from_dataset(store.to_dataset());
        assert_eq!(store.to_dataset(), again.to_dataset());
    }

    #[test]
    fn ids_are_sorted() {
        let mut store = EntityStore::new();
        store.insert(Incident::new("INC-003", "c"));
        store.insert(Incident::new("INC-001", "a"));
        let ids: Vec<&str> = store.ids::<Incident>().collect();
        assert_eq!(ids, vec!["INC-001", "INC-003"]);
    }
}
