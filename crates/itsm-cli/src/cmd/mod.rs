pub mod candidates;
pub mod check;
pub mod completions;
pub mod delete;
pub mod init;
pub mod link;
pub mod session;
pub mod show;
pub mod tree;
pub mod unlink;

use std::path::PathBuf;

use clap::Args;
use itsm_core::config::ProjectConfig;

use crate::output::OutputMode;

/// Everything a command needs that was resolved before dispatch.
#[derive(Debug, Clone)]
pub struct Context {
    pub project_root: PathBuf,
    pub project: ProjectConfig,
    /// `--data` override; wins over `[data] path`.
    pub data_override: Option<PathBuf>,
    pub output: OutputMode,
    pub actor: String,
}

impl Context {
    pub fn data_path(&self) -> PathBuf {
        self.data_override
            .as_ref()
            .map_or_else(
                || self.project.data_path(&self.project_root),
                |p| self.project_root.join(p),
            )
    }

    pub fn audit_path(&self) -> PathBuf {
        self.project.audit_path(&self.project_root)
    }
}

/// A single incident ID argument.
#[derive(Args, Debug)]
pub struct IncidentArg {
    /// Incident ID (e.g. INC-001).
    pub incident: String,
}
