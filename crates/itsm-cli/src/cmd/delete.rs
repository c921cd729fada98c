//! `itsm delete`: remove a record and clean every reference to it.

use std::io::{self, Write};

use clap::Args;

use itsm_core::graph::DeleteReport;
use itsm_core::model::EntityKind;

use crate::cmd::Context;
use crate::cmd::session::Session;
use crate::output::{pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// ID of the record to delete.
    pub id: String,

    /// Record kind; inferred from the ID prefix when omitted
    /// (INC-, PRB-, CHG-, KB-; anything else is an asset).
    #[arg(long)]
    pub kind: Option<EntityKind>,
}

pub fn run_delete(args: &DeleteArgs, ctx: &Context) -> anyhow::Result<()> {
    let kind = args.kind.unwrap_or_else(|| EntityKind::infer(&args.id));
    let mut session = Session::open(ctx)?;

    let report = session
        .graph_mut()
        .delete(kind, &args.id)
        .map_err(|e| session.reject(&e))?;
    session.save()?;

    render_mode(ctx.output, &report, render_text, render_pretty)
}

fn render_text(report: &DeleteReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "deleted\t{}\t{}", report.kind, report.id)?;
    for id in &report.touched {
        writeln!(w, "cleaned\t{id}")?;
    }
    Ok(())
}

fn render_pretty(report: &DeleteReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "✓ Deleted {} {}", report.kind, report.id)?;
    if report.touched.is_empty() {
        pretty_kv(w, "Cleaned", "nothing referenced it")
    } else {
        pretty_kv(w, "Cleaned", report.touched.join(", "))
    }
}
