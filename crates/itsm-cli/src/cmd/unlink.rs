//! `itsm unlink`: remove a link. Removing something that is not linked
//! succeeds without changes.

use clap::{Args, Subcommand};

use crate::cmd::link::LinkPair;
use crate::cmd::session::Session;
use crate::cmd::{Context, IncidentArg};

#[derive(Args, Debug)]
pub struct UnlinkArgs {
    #[command(subcommand)]
    pub command: UnlinkCommand,
}

#[derive(Subcommand, Debug)]
pub enum UnlinkCommand {
    #[command(about = "Remove a change", after_help = "EXAMPLES:\n    itsm unlink change INC-001 CHG-456")]
    Change(LinkPair),

    #[command(
        about = "Remove an additional asset (the primary affected asset is kept)",
        after_help = "EXAMPLES:\n    itsm unlink asset INC-001 NET-SW-07"
    )]
    Asset(LinkPair),

    #[command(about = "Remove a knowledge article", after_help = "EXAMPLES:\n    itsm unlink kb INC-001 KB-101")]
    Kb(LinkPair),

    #[command(about = "Clear the linked problem", after_help = "EXAMPLES:\n    itsm unlink problem INC-001")]
    Problem(IncidentArg),

    #[command(about = "Detach from the parent incident", after_help = "EXAMPLES:\n    itsm unlink parent INC-002")]
    Parent(IncidentArg),
}

pub fn run_unlink(args: &UnlinkArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut session = Session::open(ctx)?;
    let graph = session.graph_mut();

    let (op, incident, target, result) = match &args.command {
        UnlinkCommand::Change(p) => (
            "unlink_change",
            &p.incident,
            Some(p.target.as_str()),
            graph.unlink_change(&p.incident, &p.target),
        ),
        UnlinkCommand::Asset(p) => (
            "unlink_asset",
            &p.incident,
            Some(p.target.as_str()),
            graph.unlink_asset(&p.incident, &p.target),
        ),
        UnlinkCommand::Kb(p) => (
            "unlink_knowledge_article",
            &p.incident,
            Some(p.target.as_str()),
            graph.unlink_knowledge_article(&p.incident, &p.target),
        ),
        UnlinkCommand::Problem(a) => (
            "unlink_problem",
            &a.incident,
            None,
            graph.unlink_problem(&a.incident),
        ),
        UnlinkCommand::Parent(a) => (
            "remove_parent_incident",
            &a.incident,
            None,
            graph.remove_parent_incident(&a.incident),
        ),
    };

    let outcome = result.map_err(|e| session.reject(&e))?;
    let report = session.report(op, incident, target, &outcome);
    session.save()?;
    report.render(ctx.output)
}
