use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::model::{Asset, Change, Incident, KnowledgeArticle, Problem};

/// Serializable snapshot of every collection.
///
/// Field names follow the console's mock data object so snapshots exported
/// from the browser load unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Dataset {
    pub incidents: Vec<Incident>,
    pub problems: Vec<Problem>,
    pub changes: Vec<Change>,
    pub assets: Vec<Asset>,
    pub knowledge_articles: Vec<KnowledgeArticle>,
}

impl Dataset {
    /// Read a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid snapshot.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Write the snapshot as pretty JSON.
    ///
    /// The file is written to a sibling temp file first and renamed into
    /// place, so readers never observe a half-written snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut json = serde_json::to_string_pretty(self).context("Failed to serialize dataset")?;
        json.push('\n');

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move {} into place", tmp.display()))?;
        Ok(())
    }

    pub(crate) fn newest_timestamp(&self) -> i64 {
        let incidents = self.incidents.iter().map(|e| e.updated_at.max(e.created_at));
        let problems = self.problems.iter().map(|e| e.updated_at.max(e.created_at));
        let changes = self.changes.iter().map(|e| e.updated_at.max(e.created_at));
        let assets = self.assets.iter().map(|e| e.updated_at.max(e.created_at));
        let articles = self
            .knowledge_articles
            .iter()
            .map(|e| e.updated_at.max(e.created_at));

        incidents
            .chain(problems)
            .chain(changes)
            .chain(assets)
            .chain(articles)
            .max()
            .unwrap_or(0)
    }

    /// Built-in demo data: a handful of unlinked records of every kind.
    #[must_use]
    pub fn demo() -> Self {
        let incidents = vec![
            Incident::new("INC-001", "Email service outage")
                .with_priority("High")
                .with_status("In Progress")
                .with_affected_asset("SRV-MAIL-01"),
            Incident::new("INC-002", "Users unable to send mail from Outlook")
                .with_affected_asset("SRV-MAIL-01"),
            Incident::new("INC-003", "VPN disconnects every 10 minutes")
                .with_priority("High")
                .with_affected_asset("NET-SW-07"),
            Incident::new("INC-004", "Finance laptop will not boot")
                .with_priority("Low")
                .with_affected_asset("LAP-0042"),
        ];

        let problems = vec![
            Problem::new("PRB-001", "Mail queue exhaustion under load"),
            Problem::new("PRB-002", "Intermittent switch port flapping"),
        ];

        let changes = vec![
            Change::new("CHG-456", "Increase mail transport queue limits"),
            Change::new("CHG-789", "Replace core switch B line card"),
        ];

        let assets = vec![
            Asset::new("SRV-MAIL-01", "Exchange mail server").with_type("server"),
            Asset::new("NET-SW-07", "Core switch B").with_type("network"),
            Asset::new("LAP-0042", "Finance laptop").with_type("laptop"),
        ];

        let knowledge_articles = vec![
            KnowledgeArticle::new("KB-101", "Restarting the mail transport service"),
            KnowledgeArticle::new("KB-102", "Resetting the VPN client profile"),
        ];

        Self {
            incidents,
            problems,
            changes,
            assets,
            knowledge_articles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn demo_has_every_kind() {
        let d = Dataset::demo();
        assert_eq!(d.incidents.len(), 4);
        assert_eq!(d.problems.len(), 2);
        assert_eq!(d.changes.len(), 2);
        assert_eq!(d.assets.len(), 3);
        assert_eq!(d.knowledge_articles.len(), 2);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/data.json");

        Dataset::demo().save(&path).unwrap();
        let loaded = Dataset::load(&path).unwrap();

        assert_eq!(loaded, Dataset::demo());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn load_accepts_console_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(
            &path,
            r#"{
                "incidents": [{"id": "INC-001", "title": "x", "linkedChanges": ["CHG-1"]}],
                "knowledgeArticles": [{"id": "KB-1", "title": "y"}]
            }"#,
        )
        .unwrap();

        let d = Dataset::load(&path).unwrap();
        assert_eq!(d.incidents[0].linked_changes, vec!["CHG-1"]);
        assert_eq!(d.knowledge_articles[0].id, "KB-1");
        assert!(d.problems.is_empty());
    }

    #[test]
    fn load_invalid_json_names_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Dataset::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn newest_timestamp_of_empty_is_zero() {
        assert_eq!(Dataset::default().newest_timestamp(), 0);
    }
}
