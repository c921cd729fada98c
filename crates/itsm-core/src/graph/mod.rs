//! The relationship graph between incidents and the records they reference.
//!
//! [`RelationshipGraph`] is the only writer of relation fields. Read-only
//! helpers ([`hierarchy`], [`cycles`], [`check_integrity`]) take an
//! [`EntityStore`](crate::store::EntityStore) directly so they can run on any
//! snapshot.

mod cascade;
pub mod cycles;
pub mod hierarchy;
mod integrity;
mod links;
mod related;

pub use cascade::DeleteReport;
pub use cycles::{CycleWarning, would_create_cycle};
pub use integrity::{IntegrityIssue, check_integrity};
pub use links::{Outcome, RefreshListener, RelationshipGraph};
pub use related::{RelatedItem, RelatedItems, related_items};
