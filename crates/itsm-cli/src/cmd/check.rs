//! `itsm check`: integrity report for the dataset.

use std::io::{self, Write};

use serde::Serialize;

use itsm_core::error::ErrorCode;
use itsm_core::graph::{IntegrityIssue, check_integrity};

use crate::cmd::Context;
use crate::cmd::session::Session;
use crate::output::{CliError, fail, render};

#[derive(Debug, Serialize)]
struct CheckOutput {
    ok: bool,
    entities: usize,
    issues: Vec<IntegrityIssue>,
}

pub fn run_check(ctx: &Context) -> anyhow::Result<()> {
    let session = Session::open(ctx)?;
    let store = session.graph().store();
    let issues = check_integrity(store);

    let out = CheckOutput {
        ok: issues.is_empty(),
        entities: store.len(),
        issues,
    };
    render(ctx.output, &out, render_human)?;

    if out.ok {
        Ok(())
    } else {
        Err(fail(
            ctx.output,
            &CliError::coded(
                format!("{} integrity issue(s) found", out.issues.len()),
                ErrorCode::IntegrityViolation,
            ),
        ))
    }
}

fn render_human(out: &CheckOutput, w: &mut dyn Write) -> io::Result<()> {
    if out.ok {
        return writeln!(w, "ok: {} records, no integrity issues", out.entities);
    }
    for issue in &out.issues {
        writeln!(w, "- {issue}")?;
    }
    Ok(())
}
