use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory holding project-level state, relative to the project root.
pub const PROJECT_DIR: &str = ".itsm";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl ProjectConfig {
    /// Dataset location; relative paths resolve against `project_root`.
    #[must_use]
    pub fn data_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.data.path)
    }

    /// Audit trail location; relative paths resolve against `project_root`.
    #[must_use]
    pub fn audit_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.audit.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_path")]
    pub path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_audit_path")]
    pub path: PathBuf,
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_audit_path(),
            memory_capacity: default_memory_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    /// Name recorded in audit entries when nothing more specific is given.
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
}

/// Read `.itsm/config.toml` under `project_root`, or defaults if absent.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Read `<config_dir>/itsm/config.toml`, or defaults if absent.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("itsm/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Project config from `project_root` plus the per-user config.
///
/// # Errors
///
/// Fails if either file exists but cannot be read or parsed.
pub fn resolve_config(project_root: &Path) -> Result<EffectiveConfig> {
    Ok(EffectiveConfig {
        project: load_project_config(project_root)?,
        user: load_user_config()?,
    })
}

/// Map a user-supplied output name to `pretty`, `text` or `json`.
#[must_use]
pub fn normalize_output_mode(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "human" => Some("pretty"),
        "text" | "table" | "plain" => Some("text"),
        "json" => Some("json"),
        _ => None,
    }
}

const fn default_true() -> bool {
    true
}

fn default_data_path() -> PathBuf {
    PathBuf::from(PROJECT_DIR).join("data.json")
}

fn default_audit_path() -> PathBuf {
    PathBuf::from(PROJECT_DIR).join("audit.jsonl")
}

const fn default_memory_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = TempDir::new().unwrap();
        let cfg = load_project_config(root.path()).unwrap();
        assert_eq!(cfg, ProjectConfig::default());
        assert!(cfg.audit.enabled);
        assert_eq!(cfg.audit.memory_capacity, 1000);
        assert_eq!(cfg.data_path(root.path()), root.path().join(".itsm/data.json"));
        assert_eq!(cfg.audit_path(root.path()), root.path().join(".itsm/audit.jsonl"));
    }

    #[test]
    fn partial_project_config_keeps_other_defaults() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join(".itsm")).unwrap();
        std::fs::write(
            root.path().join(".itsm/config.toml"),
            "[audit]\nenabled = false\n\n[data]\npath = \"snapshots/itsm.json\"\n",
        )
        .unwrap();

        let cfg = load_project_config(root.path()).unwrap();
        assert!(!cfg.audit.enabled);
        assert_eq!(cfg.audit.path, PathBuf::from(".itsm/audit.jsonl"));
        assert_eq!(
            cfg.data_path(root.path()),
            root.path().join("snapshots/itsm.json")
        );
    }

    #[test]
    fn malformed_project_config_names_the_file() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join(".itsm")).unwrap();
        std::fs::write(root.path().join(".itsm/config.toml"), "[audit\n").unwrap();

        let err = load_project_config(root.path()).unwrap_err();
        assert!(format!("{err}").contains("config.toml"));
    }

    #[test]
    fn absolute_data_path_is_kept() {
        let cfg = ProjectConfig {
            data: DataConfig {
                path: PathBuf::from("/var/lib/itsm/data.json"),
            },
            ..ProjectConfig::default()
        };
        assert_eq!(
            cfg.data_path(Path::new("/home/ops/project")),
            PathBuf::from("/var/lib/itsm/data.json")
        );
    }

    #[test]
    fn output_aliases_are_normalized() {
        assert_eq!(normalize_output_mode("Human"), Some("pretty"));
        assert_eq!(normalize_output_mode(" table "), Some("text"));
        assert_eq!(normalize_output_mode("json"), Some("json"));
        assert_eq!(normalize_output_mode("yaml"), None);
    }

    #[test]
    fn user_config_parses_actor() {
        let cfg: UserConfig =
            toml::from_str("output = \"json\"\nactor = \"service-desk\"\n").unwrap();
        assert_eq!(cfg.output.as_deref(), Some("json"));
        assert_eq!(cfg.actor.as_deref(), Some("service-desk"));
    }
}
