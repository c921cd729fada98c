//! `itsm link`: attach a change, problem, asset, knowledge article or
//! parent incident to an incident.

use clap::{Args, Subcommand};

use crate::cmd::Context;
use crate::cmd::session::Session;

#[derive(Args, Debug)]
pub struct LinkArgs {
    #[command(subcommand)]
    pub command: LinkCommand,
}

/// `<INCIDENT> <TARGET>` pair shared by every link subcommand.
#[derive(Args, Debug)]
pub struct LinkPair {
    /// Incident ID (e.g. INC-001).
    pub incident: String,
    /// ID of the record to link.
    pub target: String,
}

#[derive(Subcommand, Debug)]
pub enum LinkCommand {
    #[command(
        about = "Link a change to an incident",
        after_help = "EXAMPLES:\n    itsm link change INC-001 CHG-456"
    )]
    Change(LinkPair),

    #[command(
        about = "Link a problem (replaces any existing problem)",
        after_help = "EXAMPLES:\n    itsm link problem INC-001 PRB-001"
    )]
    Problem(LinkPair),

    #[command(
        about = "Link an additional affected asset",
        after_help = "EXAMPLES:\n    itsm link asset INC-001 NET-SW-07"
    )]
    Asset(LinkPair),

    #[command(
        about = "Link a knowledge article",
        after_help = "EXAMPLES:\n    itsm link kb INC-001 KB-101"
    )]
    Kb(LinkPair),

    #[command(
        about = "Set the parent incident",
        after_help = "EXAMPLES:\n    # INC-002 becomes a child of INC-001\n    itsm link parent INC-002 INC-001"
    )]
    Parent(LinkPair),
}

pub fn run_link(args: &LinkArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut session = Session::open(ctx)?;
    let graph = session.graph_mut();

    let (op, pair, result) = match &args.command {
        LinkCommand::Change(p) => ("link_change", p, graph.link_change(&p.incident, &p.target)),
        LinkCommand::Problem(p) => ("link_problem", p, graph.link_problem(&p.incident, &p.target)),
        LinkCommand::Asset(p) => ("link_asset", p, graph.link_asset(&p.incident, &p.target)),
        LinkCommand::Kb(p) => (
            "link_knowledge_article",
            p,
            graph.link_knowledge_article(&p.incident, &p.target),
        ),
        LinkCommand::Parent(p) => (
            "set_parent_incident",
            p,
            graph.set_parent_incident(&p.incident, &p.target),
        ),
    };

    let outcome = result.map_err(|e| session.reject(&e))?;
    let report = session.report(op, &pair.incident, Some(&pair.target), &outcome);
    session.save()?;
    report.render(ctx.output)
}
