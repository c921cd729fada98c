//! Load the dataset, wire the graph to its collaborators, and write it back.

use std::cell::RefCell;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use itsm_core::audit::{
    AuditEntry, FanoutAuditSink, JsonlAuditSink, MemoryAuditLog, TracingAuditSink,
};
use itsm_core::error::ErrorCode;
use itsm_core::notify::CollectingNotifier;
use itsm_core::{Dataset, EntityStore, LinkError, Outcome, RelationshipGraph};

use crate::cmd::Context;
use crate::output::{CliError, OutputMode, fail, pretty_kv, render_mode};

pub struct Session {
    graph: RelationshipGraph,
    data_path: PathBuf,
    output: OutputMode,
    audit: Arc<MemoryAuditLog>,
    notices: Arc<CollectingNotifier>,
    refreshed: Rc<RefCell<Vec<String>>>,
}

impl Session {
    /// Open the dataset named by `ctx`.
    ///
    /// # Errors
    ///
    /// Fails (after rendering a coded error) if the dataset is missing or
    /// cannot be parsed.
    pub fn open(ctx: &Context) -> anyhow::Result<Self> {
        let data_path = ctx.data_path();
        if !data_path.exists() {
            return Err(fail(
                ctx.output,
                &CliError::coded(
                    format!("no dataset at {}", data_path.display()),
                    ErrorCode::NotInitialized,
                ),
            ));
        }

        let dataset = Dataset::load(&data_path).map_err(|e| {
            fail(
                ctx.output,
                &CliError::coded(format!("{e:#}"), ErrorCode::DatasetParseError),
            )
        })?;
        debug!(path = %data_path.display(), "dataset loaded");

        let audit = Arc::new(MemoryAuditLog::new(ctx.project.audit.memory_capacity));
        let mut sinks = FanoutAuditSink::new()
            .with(TracingAuditSink)
            .with(Arc::clone(&audit));
        if ctx.project.audit.enabled {
            let path = ctx.audit_path();
            if let Some(parent) = path.parent()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                warn!(path = %parent.display(), "cannot create audit directory: {e}");
            }
            sinks = sinks.with(JsonlAuditSink::new(path));
        }

        let notices = Arc::new(CollectingNotifier::new());
        let refreshed = Rc::new(RefCell::new(Vec::new()));

        let mut graph = RelationshipGraph::new(EntityStore::from_dataset(dataset))
            .with_actor(ctx.actor.clone())
            .with_audit(sinks)
            .with_notifier(Arc::clone(&notices));
        let listener = Rc::clone(&refreshed);
        graph.on_refresh(move |id| {
            let mut ids = listener.borrow_mut();
            if !ids.iter().any(|seen: &String| seen == id) {
                ids.push(id.to_string());
            }
        });

        Ok(Self {
            graph,
            data_path,
            output: ctx.output,
            audit,
            notices,
            refreshed,
        })
    }

    pub const fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    pub const fn graph_mut(&mut self) -> &mut RelationshipGraph {
        &mut self.graph
    }

    /// Turn a rejected operation into the command's failure.
    pub fn reject(&self, err: &LinkError) -> anyhow::Error {
        fail(self.output, &CliError::from(err))
    }

    /// Summary of the last mutation: what changed and who was told.
    pub fn report(
        &self,
        op: &'static str,
        incident: &str,
        target: Option<&str>,
        outcome: &Outcome,
    ) -> MutationReport {
        let (label, previous) = match outcome {
            Outcome::Applied => ("applied", None),
            Outcome::Replaced { previous } => ("replaced", Some(previous.clone())),
            Outcome::Unchanged => ("unchanged", None),
        };
        let message = if outcome.changed() {
            self.notices
                .last()
                .map_or_else(|| op.to_string(), |n| n.message)
        } else {
            format!("nothing to do for {incident}")
        };

        MutationReport {
            ok: true,
            op,
            incident: incident.to_string(),
            target: target.map(str::to_string),
            outcome: label,
            previous,
            message,
            refreshed: self.refreshed.borrow().clone(),
            audit: self.audit.entries(),
        }
    }

    /// Write the dataset back if anything changed.
    ///
    /// # Errors
    ///
    /// Fails (after rendering a coded error) if the snapshot cannot be written.
    pub fn save(self) -> anyhow::Result<()> {
        if self.audit.is_empty() {
            debug!("no changes; dataset left untouched");
            return Ok(());
        }
        let output = self.output;
        let path = self.data_path;
        self.graph
            .into_store()
            .to_dataset()
            .save(&path)
            .map_err(|e| {
                fail(
                    output,
                    &CliError::coded(format!("{e:#}"), ErrorCode::DatasetWriteFailed),
                )
            })
    }
}

#[derive(Debug, Serialize)]
pub struct MutationReport {
    pub ok: bool,
    pub op: &'static str,
    pub incident: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    pub message: String,
    pub refreshed: Vec<String>,
    pub audit: Vec<AuditEntry>,
}

impl MutationReport {
    pub fn render(&self, mode: OutputMode) -> anyhow::Result<()> {
        render_mode(mode, self, render_text, render_pretty)
    }
}

fn render_text(report: &MutationReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}\t{}\t{}", report.outcome, report.op, report.message)
}

fn render_pretty(report: &MutationReport, w: &mut dyn Write) -> io::Result<()> {
    let mark = if report.outcome == "unchanged" { "·" } else { "✓" };
    writeln!(w, "{mark} {}", report.message)?;
    if let Some(previous) = &report.previous {
        pretty_kv(w, "Replaced", previous)?;
    }
    if !report.refreshed.is_empty() {
        pretty_kv(w, "Refreshed", report.refreshed.join(", "))?;
    }
    Ok(())
}
