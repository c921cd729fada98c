//! `itsm init`: write the demo dataset so there is something to link.

use std::io::{self, Write};

use clap::Args;
use serde::Serialize;
use tracing::info;

use itsm_core::Dataset;
use itsm_core::error::ErrorCode;

use crate::cmd::Context;
use crate::output::{CliError, fail, render};

#[derive(Args, Debug, Default)]
pub struct InitArgs {
    /// Overwrite an existing dataset.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct InitOutput {
    ok: bool,
    path: String,
    incidents: usize,
    problems: usize,
    changes: usize,
    assets: usize,
    knowledge_articles: usize,
}

pub fn run_init(args: &InitArgs, ctx: &Context) -> anyhow::Result<()> {
    let path = ctx.data_path();
    if path.exists() && !args.force {
        return Err(fail(
            ctx.output,
            &CliError {
                suggestion: Some("Pass --force to overwrite it with the demo data.".into()),
                ..CliError::new(format!("dataset already exists at {}", path.display()))
            },
        ));
    }

    let dataset = Dataset::demo();
    dataset.save(&path).map_err(|e| {
        fail(
            ctx.output,
            &CliError::coded(format!("{e:#}"), ErrorCode::DatasetWriteFailed),
        )
    })?;
    info!(path = %path.display(), "wrote demo dataset");

    let out = InitOutput {
        ok: true,
        path: path.display().to_string(),
        incidents: dataset.incidents.len(),
        problems: dataset.problems.len(),
        changes: dataset.changes.len(),
        assets: dataset.assets.len(),
        knowledge_articles: dataset.knowledge_articles.len(),
    };
    render(ctx.output, &out, render_human)
}

fn render_human(out: &InitOutput, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "✓ Wrote {}: {} incidents, {} problems, {} changes, {} assets, {} knowledge articles",
        out.path, out.incidents, out.problems, out.changes, out.assets, out.knowledge_articles
    )
}
