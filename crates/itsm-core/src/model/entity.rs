use serde::{Deserialize, Serialize};

use super::EntityKind;

/// Common surface of every stored entity.
pub trait Entity {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    /// Human label: title for tickets, name for assets.
    fn label(&self) -> &str;

    fn created_at(&self) -> i64;

    fn updated_at(&self) -> i64;

    fn set_timestamps(&mut self, created_at: Option<i64>, updated_at: i64);
}

macro_rules! impl_entity {
    ($ty:ty, $kind:expr, $label:ident) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn label(&self) -> &str {
                &self.$label
            }

            fn created_at(&self) -> i64 {
                self.created_at
            }

            fn updated_at(&self) -> i64 {
                self.updated_at
            }

            fn set_timestamps(&mut self, created_at: Option<i64>, updated_at: i64) {
                if let Some(created_at) = created_at {
                    self.created_at = created_at;
                }
                self.updated_at = updated_at;
            }
        }
    };
}

/// A reported IT issue being tracked to resolution.
///
/// `affected_asset` is the primary asset recorded when the incident was
/// raised; `linked_assets` holds additional assets and never contains the
/// primary one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    pub title: String,
    pub status: String,
    pub priority: String,
    pub parent_incident: Option<String>,
    pub child_incidents: Vec<String>,
    pub linked_problem: Option<String>,
    pub linked_changes: Vec<String>,
    pub affected_asset: Option<String>,
    pub linked_assets: Vec<String>,
    #[serde(rename = "linkedKB")]
    pub linked_kb: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Incident {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: "New".to_string(),
            priority: "Medium".to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_affected_asset(mut self, asset_id: impl Into<String>) -> Self {
        self.affected_asset = Some(asset_id.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = priority.into();
        self
    }

    /// `true` if `asset_id` is the primary asset or an additional one.
    #[must_use]
    pub fn references_asset(&self, asset_id: &str) -> bool {
        self.affected_asset.as_deref() == Some(asset_id)
            || self.linked_assets.iter().any(|a| a == asset_id)
    }
}

impl_entity!(Incident, EntityKind::Incident, title);

/// An underlying root cause, potentially behind many incidents.
///
/// `linked_incidents` is the inverse of [`Incident::linked_problem`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    pub title: String,
    pub status: String,
    pub linked_incidents: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Problem {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: "Open".to_string(),
            ..Self::default()
        }
    }
}

impl_entity!(Problem, EntityKind::Problem, title);

/// A planned modification to infrastructure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Change {
    pub id: String,
    pub title: String,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Change {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: "Draft".to_string(),
            ..Self::default()
        }
    }
}

impl_entity!(Change, EntityKind::Change, title);

/// A configuration item: server, laptop, network device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Asset {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_type(mut self, asset_type: impl Into<String>) -> Self {
        self.asset_type = asset_type.into();
        self
    }
}

impl_entity!(Asset, EntityKind::Asset, name);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KnowledgeArticle {
    pub id: String,
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl KnowledgeArticle {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}

impl_entity!(KnowledgeArticle, EntityKind::KnowledgeArticle, title);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_incident_has_empty_relations() {
        let inc = Incident::new("INC-001", "Mail down");
        assert!(inc.parent_incident.is_none());
        assert!(inc.child_incidents.is_empty());
        assert!(inc.linked_problem.is_none());
        assert!(inc.linked_changes.is_empty());
        assert!(inc.affected_asset.is_none());
        assert!(inc.linked_assets.is_empty());
        assert!(inc.linked_kb.is_empty());
    }

    #[test]
    fn missing_relation_fields_deserialize_empty() {
        let inc: Incident =
            serde_json::from_str(r#"{"id":"INC-009","title":"Printer jam"}"#).unwrap();
        assert_eq!(inc.id, "INC-009");
        assert!(inc.linked_changes.is_empty());
        assert!(inc.linked_kb.is_empty());
        assert!(inc.parent_incident.is_none());
    }

    #[test]
    fn incident_uses_console_field_names() {
        let inc = Incident::new("INC-001", "x").with_affected_asset("SRV-01");
        let value = serde_json::to_value(&inc).unwrap();
        assert_eq!(value["affectedAsset"], "SRV-01");
        assert!(value.get("linkedKB").is_some());
        assert!(value.get("parentIncident").is_some());
    }

    #[test]
    fn references_asset_covers_primary_and_linked() {
        let mut inc = Incident::new("INC-001", "x").with_affected_asset("SRV-01");
        inc.linked_assets.push("SW-02".to_string());
        assert!(inc.references_asset("SRV-01"));
        assert!(inc.references_asset("SW-02"));
        assert!(!inc.references_asset("LAP-03"));
    }

    #[test]
    fn entity_label_uses_name_for_assets() {
        let asset = Asset::new("SRV-01", "Mail server").with_type("server");
        assert_eq!(asset.label(), "Mail server");
        assert_eq!(Asset::KIND, EntityKind::Asset);
    }
}
