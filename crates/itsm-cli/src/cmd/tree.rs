//! `itsm tree`: where an incident sits in the parent hierarchy.

use std::io::{self, Write};

use serde::Serialize;

use crate::cmd::session::Session;
use crate::cmd::{Context, IncidentArg};
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Debug, Serialize)]
struct TreeOutput {
    incident: String,
    depth: usize,
    /// Nearest parent first.
    ancestors: Vec<String>,
    /// Breadth-first.
    descendants: Vec<String>,
}

pub fn run_tree(args: &IncidentArg, ctx: &Context) -> anyhow::Result<()> {
    let session = Session::open(ctx)?;
    let graph = session.graph();

    let ancestors = graph
        .ancestors(&args.incident)
        .map_err(|e| session.reject(&e))?;
    let descendants = graph
        .descendants(&args.incident)
        .map_err(|e| session.reject(&e))?;

    let out = TreeOutput {
        incident: args.incident.clone(),
        depth: ancestors.len(),
        ancestors,
        descendants,
    };
    render_mode(ctx.output, &out, render_text, render_pretty)
}

fn render_text(out: &TreeOutput, w: &mut dyn Write) -> io::Result<()> {
    for id in &out.ancestors {
        writeln!(w, "ancestor\t{id}")?;
    }
    for id in &out.descendants {
        writeln!(w, "descendant\t{id}")?;
    }
    Ok(())
}

fn render_pretty(out: &TreeOutput, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Hierarchy of {}", out.incident))?;
    pretty_kv(w, "Depth", out.depth.to_string())?;

    let mut path: Vec<&str> = out.ancestors.iter().rev().map(String::as_str).collect();
    path.push(&out.incident);
    pretty_kv(w, "Path", path.join(" > "))?;

    if out.descendants.is_empty() {
        pretty_kv(w, "Below", "-")
    } else {
        pretty_kv(w, "Below", out.descendants.join(", "))
    }
}
