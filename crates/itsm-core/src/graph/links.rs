//! The mutation choke point for every relation field.
//!
//! Each operation is check-then-apply: all validation runs against the
//! unmodified store, and only a fully validated request mutates it. A
//! returned [`LinkError`] therefore always means "nothing changed".
//!
//! After the store is updated the operation records audit entries, emits a
//! notice, and tells refresh listeners which entities changed. None of those
//! collaborators can fail the operation.

use tracing::{debug, info};

use crate::audit::{AuditEntry, AuditSink, TracingAuditSink};
use crate::error::LinkError;
use crate::graph::cycles;
use crate::graph::hierarchy;
use crate::model::{self, Change, EntityKind, Incident, KnowledgeArticle};
use crate::notify::{Notice, Notifier, TracingNotifier};
use crate::store::{EntityStore, Stored};

/// What a successful call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A new association was recorded (or an existing one removed).
    Applied,
    /// A single-valued relation moved from `previous` to the requested target.
    Replaced { previous: String },
    /// Nothing to do; state is unchanged.
    Unchanged,
}

impl Outcome {
    #[must_use]
    pub const fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Result of a validated mutation, before side effects are emitted.
struct Applied {
    outcome: Outcome,
    message: String,
    audit: Vec<AuditEntry>,
    refresh: Vec<String>,
}

impl Applied {
    fn unchanged(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Unchanged,
            message: message.into(),
            audit: Vec::new(),
            refresh: Vec::new(),
        }
    }
}

pub type RefreshListener = Box<dyn FnMut(&str)>;

/// Owns the entity store and enforces every link invariant.
pub struct RelationshipGraph {
    store: EntityStore,
    actor: String,
    audit: Box<dyn AuditSink>,
    notifier: Box<dyn Notifier>,
    refresh: Vec<RefreshListener>,
}

impl std::fmt::Debug for RelationshipGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipGraph")
            .field("actor", &self.actor)
            .field("entities", &self.store.len())
            .field("refresh_listeners", &self.refresh.len())
            .finish_non_exhaustive()
    }
}

impl RelationshipGraph {
    /// Wrap a store. Audit entries and notices go to `tracing` until
    /// replaced with [`with_audit`](Self::with_audit) /
    /// [`with_notifier`](Self::with_notifier).
    #[must_use]
    pub fn new(store: EntityStore) -> Self {
        Self {
            store,
            actor: "system".to_string(),
            audit: Box::new(TracingAuditSink),
            notifier: Box::new(TracingNotifier),
            refresh: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    #[must_use]
    pub fn with_audit(mut self, sink: impl AuditSink + 'static) -> Self {
        self.audit = Box::new(sink);
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    /// Register a callback that receives the ID of every entity whose
    /// related-items view changed.
    pub fn on_refresh(&mut self, listener: impl FnMut(&str) + 'static) {
        self.refresh.push(Box::new(listener));
    }

    #[must_use]
    pub fn actor(&self) -> &str {
        &self.actor
    }

    #[must_use]
    pub const fn store(&self) -> &EntityStore {
        &self.store
    }

    #[must_use]
    pub fn into_store(self) -> EntityStore {
        self.store
    }

    /// Add a new entity to the underlying store.
    ///
    /// An ID that already exists is refused and the entity is returned
    /// unchanged; existing records are only ever changed through the link
    /// operations.
    pub fn insert<E: Stored>(&mut self, entity: E) -> Option<E> {
        self.store.insert(entity)
    }

    // -----------------------------------------------------------------------
    // Changes
    // -----------------------------------------------------------------------

    /// Link a change to an incident.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if either ID does not resolve,
    /// [`LinkError::AlreadyLinked`] if the change is already listed.
    pub fn link_change(
        &mut self,
        incident_id: &str,
        change_id: &str,
    ) -> Result<Outcome, LinkError> {
        let result = self.apply_link_change(incident_id, change_id);
        self.complete("link_change", result)
    }

    fn apply_link_change(
        &mut self,
        incident_id: &str,
        change_id: &str,
    ) -> Result<Applied, LinkError> {
        reject_self(incident_id, change_id)?;
        let incident = self.require_incident(incident_id)?;
        self.require::<Change>(change_id)?;
        if incident.linked_changes.iter().any(|c| c == change_id) {
            return Err(LinkError::already_linked(incident_id, change_id));
        }

        self.incident_entry(incident_id, |inc| {
            model::push_unique(&mut inc.linked_changes, change_id);
        });
        Ok(self.linked(incident_id, change_id))
    }

    /// Remove a change from an incident. Absent changes are a no-op.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if the incident does not exist.
    pub fn unlink_change(
        &mut self,
        incident_id: &str,
        change_id: &str,
    ) -> Result<Outcome, LinkError> {
        let result = self.apply_unlink(incident_id, change_id, |inc| &mut inc.linked_changes);
        self.complete("unlink_change", result)
    }

    // -----------------------------------------------------------------------
    // Knowledge articles
    // -----------------------------------------------------------------------

    /// Link a knowledge article to an incident.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if either ID does not resolve,
    /// [`LinkError::AlreadyLinked`] if the article is already listed.
    pub fn link_knowledge_article(
        &mut self,
        incident_id: &str,
        kb_id: &str,
    ) -> Result<Outcome, LinkError> {
        let result = self.apply_link_kb(incident_id, kb_id);
        self.complete("link_knowledge_article", result)
    }

    fn apply_link_kb(&mut self, incident_id: &str, kb_id: &str) -> Result<Applied, LinkError> {
        reject_self(incident_id, kb_id)?;
        let incident = self.require_incident(incident_id)?;
        self.require::<KnowledgeArticle>(kb_id)?;
        if incident.linked_kb.iter().any(|k| k == kb_id) {
            return Err(LinkError::already_linked(incident_id, kb_id));
        }

        self.incident_entry(incident_id, |inc| {
            model::push_unique(&mut inc.linked_kb, kb_id);
        });
        Ok(self.linked(incident_id, kb_id))
    }

    /// Remove a knowledge article from an incident. Absent IDs are a no-op.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if the incident does not exist.
    pub fn unlink_knowledge_article(
        &mut self,
        incident_id: &str,
        kb_id: &str,
    ) -> Result<Outcome, LinkError> {
        let result = self.apply_unlink(incident_id, kb_id, |inc| &mut inc.linked_kb);
        self.complete("unlink_knowledge_article", result)
    }

    // -----------------------------------------------------------------------
    // Assets
    // -----------------------------------------------------------------------

    /// Link an additional asset to an incident.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if either ID does not resolve,
    /// [`LinkError::AlreadyLinked`] if the asset is the primary affected
    /// asset or already listed.
    pub fn link_asset(&mut self, incident_id: &str, asset_id: &str) -> Result<Outcome, LinkError> {
        let result = self.apply_link_asset(incident_id, asset_id);
        self.complete("link_asset", result)
    }

    fn apply_link_asset(
        &mut self,
        incident_id: &str,
        asset_id: &str,
    ) -> Result<Applied, LinkError> {
        reject_self(incident_id, asset_id)?;
        let incident = self.require_incident(incident_id)?;
        self.require::<crate::model::Asset>(asset_id)?;
        if incident.references_asset(asset_id) {
            return Err(LinkError::already_linked(incident_id, asset_id));
        }

        self.incident_entry(incident_id, |inc| {
            model::push_unique(&mut inc.linked_assets, asset_id);
        });
        Ok(self.linked(incident_id, asset_id))
    }

    /// Remove an additional asset. The primary affected asset is a separate
    /// field and is never touched here.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if the incident does not exist.
    pub fn unlink_asset(
        &mut self,
        incident_id: &str,
        asset_id: &str,
    ) -> Result<Outcome, LinkError> {
        let result = self.apply_unlink(incident_id, asset_id, |inc| &mut inc.linked_assets);
        self.complete("unlink_asset", result)
    }

    // -----------------------------------------------------------------------
    // Problems (bidirectional)
    // -----------------------------------------------------------------------

    /// Point an incident at a problem, replacing any previous problem.
    ///
    /// Both sides are updated: the incident's `linked_problem` and the
    /// problem's `linked_incidents`. On replacement the old problem loses
    /// the incident.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if either ID does not resolve,
    /// [`LinkError::AlreadyLinked`] if this exact problem is already set.
    pub fn link_problem(
        &mut self,
        incident_id: &str,
        problem_id: &str,
    ) -> Result<Outcome, LinkError> {
        let result = self.apply_link_problem(incident_id, problem_id);
        self.complete("link_problem", result)
    }

    fn apply_link_problem(
        &mut self,
        incident_id: &str,
        problem_id: &str,
    ) -> Result<Applied, LinkError> {
        reject_self(incident_id, problem_id)?;
        let incident = self.require_incident(incident_id)?;
        self.require::<crate::model::Problem>(problem_id)?;
        if incident.linked_problem.as_deref() == Some(problem_id) {
            return Err(LinkError::already_linked(incident_id, problem_id));
        }
        let previous = incident.linked_problem.clone();

        let mut refresh = vec![incident_id.to_string(), problem_id.to_string()];
        let mut audit = Vec::new();

        if let Some(old) = previous.as_deref()
            && self.problem_entry(old, |p| {
                model::remove_id(&mut p.linked_incidents, incident_id);
            })
        {
            audit.push(self.entry(format!("Unlinked {incident_id}"), old));
            refresh.push(old.to_string());
        }
        self.incident_entry(incident_id, |inc| {
            inc.linked_problem = Some(problem_id.to_string());
        });
        self.problem_entry(problem_id, |p| {
            model::push_unique(&mut p.linked_incidents, incident_id);
        });

        let (outcome, message, incident_audit) = previous.map_or_else(
            || {
                (
                    Outcome::Applied,
                    format!("Linked {problem_id} to {incident_id}"),
                    self.entry(format!("Linked {problem_id}"), incident_id),
                )
            },
            |old| {
                let message = format!("Linked {problem_id} to {incident_id} (replacing {old})");
                let entry = self.entry(format!("Replaced {old} with {problem_id}"), incident_id);
                (Outcome::Replaced { previous: old }, message, entry)
            },
        );
        audit.push(incident_audit);
        audit.push(self.entry(format!("Linked {incident_id}"), problem_id));

        Ok(Applied {
            outcome,
            message,
            audit,
            refresh,
        })
    }

    /// Clear an incident's problem, removing it from the problem's list too.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if the incident does not exist.
    pub fn unlink_problem(&mut self, incident_id: &str) -> Result<Outcome, LinkError> {
        let result = self.apply_unlink_problem(incident_id);
        self.complete("unlink_problem", result)
    }

    fn apply_unlink_problem(&mut self, incident_id: &str) -> Result<Applied, LinkError> {
        let incident = self.require_incident(incident_id)?;
        let Some(problem_id) = incident.linked_problem.clone() else {
            return Ok(Applied::unchanged(format!("{incident_id} has no linked problem")));
        };

        self.incident_entry(incident_id, |inc| inc.linked_problem = None);
        let mut audit = vec![self.entry(format!("Unlinked {problem_id}"), incident_id)];
        let mut refresh = vec![incident_id.to_string()];
        if self.problem_entry(&problem_id, |p| {
            model::remove_id(&mut p.linked_incidents, incident_id);
        }) {
            audit.push(self.entry(format!("Unlinked {incident_id}"), &problem_id));
            refresh.push(problem_id.clone());
        }

        Ok(Applied {
            outcome: Outcome::Applied,
            message: format!("Unlinked {problem_id} from {incident_id}"),
            audit,
            refresh,
        })
    }

    // -----------------------------------------------------------------------
    // Parent hierarchy
    // -----------------------------------------------------------------------

    /// Would making `candidate_parent_id` the parent of `child_id` close a
    /// loop? Pure; see [`cycles::would_create_cycle`].
    #[must_use]
    pub fn would_create_cycle(&self, child_id: &str, candidate_parent_id: &str) -> bool {
        cycles::would_create_cycle(&self.store, child_id, candidate_parent_id)
    }

    /// Make `parent_id` the parent of `child_id`, moving it out of any
    /// previous parent's children.
    ///
    /// # Errors
    ///
    /// [`LinkError::InvalidSelfReference`] if the IDs are equal,
    /// [`LinkError::NotFound`] if either incident is missing,
    /// [`LinkError::AlreadyLinked`] if `parent_id` is already the parent,
    /// [`LinkError::CircularReference`] if `parent_id` is a descendant of
    /// `child_id` or its parent chain already loops.
    pub fn set_parent_incident(
        &mut self,
        child_id: &str,
        parent_id: &str,
    ) -> Result<Outcome, LinkError> {
        let result = self.apply_set_parent(child_id, parent_id);
        self.complete("set_parent_incident", result)
    }

    fn apply_set_parent(&mut self, child_id: &str, parent_id: &str) -> Result<Applied, LinkError> {
        if child_id == parent_id {
            return Err(LinkError::InvalidSelfReference {
                id: child_id.to_string(),
            });
        }
        let child = self.require_incident(child_id)?;
        let previous = child.parent_incident.clone();
        self.require_incident(parent_id)?;
        if previous.as_deref() == Some(parent_id) {
            return Err(LinkError::already_linked(child_id, parent_id));
        }
        if let Some(path) = cycles::cycle_path(&self.store, child_id, parent_id) {
            debug!(path = %path.join(" -> "), "rejecting parent that closes a loop");
            return Err(LinkError::CircularReference {
                child: child_id.to_string(),
                parent: parent_id.to_string(),
            });
        }

        let mut refresh = vec![child_id.to_string(), parent_id.to_string()];
        let mut audit = Vec::new();

        if let Some(old) = previous.as_deref()
            && self.incident_entry(old, |p| {
                model::remove_id(&mut p.child_incidents, child_id);
            })
        {
            audit.push(self.entry(format!("Child {child_id} removed"), old));
            refresh.push(old.to_string());
        }
        self.incident_entry(child_id, |c| c.parent_incident = Some(parent_id.to_string()));
        self.incident_entry(parent_id, |p| {
            model::push_unique(&mut p.child_incidents, child_id);
        });

        audit.push(self.entry(format!("Parent set to {parent_id}"), child_id));
        audit.push(self.entry(format!("Child {child_id} added"), parent_id));

        let (outcome, message) = previous.map_or_else(
            || {
                (
                    Outcome::Applied,
                    format!("Set {parent_id} as parent of {child_id}"),
                )
            },
            |old| {
                let message = format!("Moved {child_id} from {old} to {parent_id}");
                (Outcome::Replaced { previous: old }, message)
            },
        );

        Ok(Applied {
            outcome,
            message,
            audit,
            refresh,
        })
    }

    /// Detach an incident from its parent.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if the incident does not exist.
    pub fn remove_parent_incident(&mut self, child_id: &str) -> Result<Outcome, LinkError> {
        let result = self.apply_remove_parent(child_id);
        self.complete("remove_parent_incident", result)
    }

    fn apply_remove_parent(&mut self, child_id: &str) -> Result<Applied, LinkError> {
        let child = self.require_incident(child_id)?;
        let Some(parent_id) = child.parent_incident.clone() else {
            return Ok(Applied::unchanged(format!("{child_id} has no parent")));
        };

        self.incident_entry(child_id, |c| c.parent_incident = None);
        let mut audit = vec![self.entry("Parent removed", child_id)];
        let mut refresh = vec![child_id.to_string()];
        if self.incident_entry(&parent_id, |p| {
            model::remove_id(&mut p.child_incidents, child_id);
        }) {
            audit.push(self.entry(format!("Child {child_id} removed"), &parent_id));
            refresh.push(parent_id.clone());
        }

        Ok(Applied {
            outcome: Outcome::Applied,
            message: format!("Removed {child_id} from parent {parent_id}"),
            audit,
            refresh,
        })
    }

    // -----------------------------------------------------------------------
    // Hierarchy queries
    // -----------------------------------------------------------------------

    /// See [`hierarchy::ancestors`].
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if the incident does not exist.
    pub fn ancestors(&self, id: &str) -> Result<Vec<String>, LinkError> {
        hierarchy::ancestors(&self.store, id)
    }

    /// See [`hierarchy::descendants`].
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if the incident does not exist.
    pub fn descendants(&self, id: &str) -> Result<Vec<String>, LinkError> {
        hierarchy::descendants(&self.store, id)
    }

    /// See [`hierarchy::depth`].
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if the incident does not exist.
    pub fn depth(&self, id: &str) -> Result<usize, LinkError> {
        hierarchy::depth(&self.store, id)
    }

    #[must_use]
    pub fn roots(&self) -> Vec<String> {
        hierarchy::roots(&self.store)
    }

    /// See [`hierarchy::candidate_parents`].
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] if the incident does not exist.
    pub fn candidate_parents(&self, child_id: &str) -> Result<Vec<String>, LinkError> {
        hierarchy::candidate_parents(&self.store, child_id)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn apply_unlink(
        &mut self,
        incident_id: &str,
        target_id: &str,
        field: impl FnOnce(&mut Incident) -> &mut Vec<String>,
    ) -> Result<Applied, LinkError> {
        self.require_incident(incident_id)?;

        let removed = self
            .store
            .incident_mut(incident_id)
            .is_some_and(|inc| model::remove_id(field(inc), target_id));

        if !removed {
            return Ok(Applied::unchanged(format!(
                "{target_id} is not linked to {incident_id}"
            )));
        }
        self.store.touch(EntityKind::Incident, incident_id);

        Ok(Applied {
            outcome: Outcome::Applied,
            message: format!("Unlinked {target_id} from {incident_id}"),
            audit: vec![self.entry(format!("Unlinked {target_id}"), incident_id)],
            refresh: vec![incident_id.to_string()],
        })
    }

    fn linked(&self, incident_id: &str, target_id: &str) -> Applied {
        Applied {
            outcome: Outcome::Applied,
            message: format!("Linked {target_id} to {incident_id}"),
            audit: vec![self.entry(format!("Linked {target_id}"), incident_id)],
            refresh: vec![incident_id.to_string()],
        }
    }

    fn entry(&self, action: impl Into<String>, target_id: &str) -> AuditEntry {
        AuditEntry::new(&self.actor, action, target_id)
    }

    fn require_incident(&self, id: &str) -> Result<&Incident, LinkError> {
        self.store
            .incident(id)
            .ok_or_else(|| LinkError::not_found(EntityKind::Incident, id))
    }

    fn require<E: Stored>(&self, id: &str) -> Result<&E, LinkError> {
        self.store
            .get::<E>(id)
            .ok_or_else(|| LinkError::not_found(E::KIND, id))
    }

    /// Mutate an incident if it exists, then stamp it. Returns `false` for a
    /// dangling ID (e.g. the old parent of a reparent), which is skipped.
    pub(crate) fn incident_entry(&mut self, id: &str, f: impl FnOnce(&mut Incident)) -> bool {
        let Some(inc) = self.store.incident_mut(id) else {
            return false;
        };
        f(inc);
        self.store.touch(EntityKind::Incident, id)
    }

    /// Mutate a problem if it exists, then stamp it. Returns `false` for a
    /// dangling ID (e.g. the old side of a relink), which is skipped.
    pub(crate) fn problem_entry(
        &mut self,
        id: &str,
        f: impl FnOnce(&mut crate::model::Problem),
    ) -> bool {
        let Some(problem) = self.store.problem_mut(id) else {
            return false;
        };
        f(problem);
        self.store.touch(EntityKind::Problem, id)
    }

    pub(crate) const fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    pub(crate) fn record(&self, entry: AuditEntry) {
        self.audit.append(entry);
    }

    pub(crate) fn refresh_all(&mut self, ids: &[String]) {
        for id in ids {
            for listener in &mut self.refresh {
                listener(id);
            }
        }
    }

    pub(crate) fn notify(&self, notice: &Notice) {
        self.notifier.notify(notice);
    }

    fn complete(
        &mut self,
        op: &'static str,
        result: Result<Applied, LinkError>,
    ) -> Result<Outcome, LinkError> {
        match result {
            Ok(applied) => {
                if applied.outcome.changed() {
                    info!(op, actor = %self.actor, "{}", applied.message);
                    for entry in applied.audit {
                        self.record(entry);
                    }
                    self.refresh_all(&applied.refresh);
                    self.notify(&Notice::success(&applied.message));
                } else {
                    debug!(op, "{}", applied.message);
                }
                Ok(applied.outcome)
            }
            Err(err) => {
                tracing::warn!(op, code = %err.code(), "{err}");
                self.notify(&Notice::from_error(&err));
                Err(err)
            }
        }
    }
}

fn reject_self(incident_id: &str, target_id: &str) -> Result<(), LinkError> {
    if incident_id == target_id {
        return Err(LinkError::InvalidSelfReference {
            id: incident_id.to_string(),
        });
    }
    Ok(())
}
