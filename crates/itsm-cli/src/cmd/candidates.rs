//! `itsm candidates`: incidents that can become the parent without a loop.

use std::io::{self, Write};

use serde::Serialize;

use crate::cmd::session::Session;
use crate::cmd::{Context, IncidentArg};
use crate::output::{pretty_section, render_mode};

#[derive(Debug, Serialize)]
struct CandidateRow {
    id: String,
    title: String,
}

#[derive(Debug, Serialize)]
struct CandidatesOutput {
    incident: String,
    current_parent: Option<String>,
    candidates: Vec<CandidateRow>,
}

pub fn run_candidates(args: &IncidentArg, ctx: &Context) -> anyhow::Result<()> {
    let session = Session::open(ctx)?;
    let graph = session.graph();
    let ids = graph
        .candidate_parents(&args.incident)
        .map_err(|e| session.reject(&e))?;

    let store = graph.store();
    let out = CandidatesOutput {
        incident: args.incident.clone(),
        current_parent: store
            .incident(&args.incident)
            .and_then(|i| i.parent_incident.clone()),
        candidates: ids
            .into_iter()
            .map(|id| CandidateRow {
                title: store
                    .incident(&id)
                    .map(|i| i.title.clone())
                    .unwrap_or_default(),
                id,
            })
            .collect(),
    };

    render_mode(ctx.output, &out, render_text, render_pretty)
}

fn render_text(out: &CandidatesOutput, w: &mut dyn Write) -> io::Result<()> {
    for row in &out.candidates {
        writeln!(w, "{}\t{}", row.id, row.title)?;
    }
    Ok(())
}

fn render_pretty(out: &CandidatesOutput, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Possible parents for {}", out.incident))?;
    if let Some(parent) = &out.current_parent {
        writeln!(w, "(current parent {parent} not listed)")?;
    }
    if out.candidates.is_empty() {
        writeln!(w, "none: every other incident is in this subtree")?;
    }
    for row in &out.candidates {
        writeln!(w, "{:<12} {}", row.id, row.title)?;
    }
    Ok(())
}
