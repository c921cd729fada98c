#![forbid(unsafe_code)]

mod actor;
mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use itsm_core::config;
use itsm_core::error::ErrorCode;
use output::{CliError, OutputMode};
use std::env;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "itsm",
    author,
    version,
    about = "itsm: incident relationship console",
    long_about = None
)]
struct Cli {
    /// Dataset file (default: `[data] path` from .itsm/config.toml).
    #[arg(long, global = true, value_name = "PATH")]
    data: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Name recorded in the audit trail (skips env resolution).
    #[arg(long, global = true)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Write the demo dataset",
        after_help = "EXAMPLES:\n    itsm init\n\n    # Start over\n    itsm init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show an incident's related items",
        after_help = "EXAMPLES:\n    itsm show INC-001\n\n    itsm show INC-001 --json"
    )]
    Show(cmd::IncidentArg),

    #[command(
        next_help_heading = "Read",
        about = "List incidents that can become the parent",
        long_about = "List incidents that can become the parent of an incident without creating a cycle.",
        after_help = "EXAMPLES:\n    itsm candidates INC-002"
    )]
    Candidates(cmd::IncidentArg),

    #[command(
        next_help_heading = "Read",
        about = "Show ancestors and descendants",
        after_help = "EXAMPLES:\n    itsm tree INC-001"
    )]
    Tree(cmd::IncidentArg),

    #[command(
        next_help_heading = "Read",
        about = "Report broken or one-sided links",
        long_about = "Check the dataset for dangling references, one-sided problem links, parent/child mismatches and hierarchy cycles. Exits non-zero when issues are found.",
        after_help = "EXAMPLES:\n    itsm check\n\n    itsm check --json"
    )]
    Check,

    #[command(next_help_heading = "Links", about = "Link a record to an incident")]
    Link(cmd::link::LinkArgs),

    #[command(next_help_heading = "Links", about = "Remove a link from an incident")]
    Unlink(cmd::unlink::UnlinkArgs),

    #[command(
        next_help_heading = "Records",
        about = "Delete a record and clean references to it",
        after_help = "EXAMPLES:\n    itsm delete CHG-789\n\n    # Asset tags have no prefix\n    itsm delete LAP-0042 --kind asset"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    itsm completions bash > ~/.local/share/bash-completion/completions/itsm"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ITSM_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "itsm=debug,info"
        } else {
            "itsm=info,warn"
        })
    });

    let format = env::var("ITSM_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let project_root = env::current_dir()?;

    if let Commands::Completions(args) = &cli.command {
        return cmd::completions::run_completions(args, &mut Cli::command());
    }

    let effective = config::resolve_config(&project_root).map_err(|e| {
        output::fail(
            output::resolve_output_mode(cli.format, cli.json, None),
            &CliError::coded(format!("{e:#}"), ErrorCode::ConfigParseError),
        )
    })?;
    let output =
        output::resolve_output_mode(cli.format, cli.json, effective.user.output.as_deref());
    let actor = actor::resolve_actor(cli.actor.as_deref(), effective.user.actor.as_deref());
    debug!(%actor, ?output, "resolved invocation context");

    let ctx = cmd::Context {
        project_root,
        project: effective.project,
        data_override: cli.data,
        output,
        actor,
    };

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, &ctx),
        Commands::Show(args) => cmd::show::run_show(args, &ctx),
        Commands::Candidates(args) => cmd::candidates::run_candidates(args, &ctx),
        Commands::Tree(args) => cmd::tree::run_tree(args, &ctx),
        Commands::Check => cmd::check::run_check(&ctx),
        Commands::Link(args) => cmd::link::run_link(args, &ctx),
        Commands::Unlink(args) => cmd::unlink::run_unlink(args, &ctx),
        Commands::Delete(args) => cmd::delete::run_delete(args, &ctx),
        Commands::Completions(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmd::link::LinkCommand;
    use cmd::unlink::UnlinkCommand;

    #[test]
    fn json_flag_parses_before_and_after_subcommand() {
        assert!(Cli::parse_from(["itsm", "--json", "check"]).json);
        assert!(Cli::parse_from(["itsm", "check", "--json"]).json);
    }

    #[test]
    fn format_flag_parses() {
        let cli = Cli::parse_from(["itsm", "--format", "text", "show", "INC-001"]);
        assert_eq!(cli.format, Some(OutputMode::Text));
    }

    #[test]
    fn data_and_actor_are_global() {
        let cli = Cli::parse_from([
            "itsm", "link", "change", "INC-001", "CHG-456", "--data", "x.json", "--actor", "ops",
        ]);
        assert_eq!(cli.data, Some(PathBuf::from("x.json")));
        assert_eq!(cli.actor.as_deref(), Some("ops"));
    }

    #[test]
    fn link_subcommands_parse() {
        let cli = Cli::parse_from(["itsm", "link", "parent", "INC-002", "INC-001"]);
        let Commands::Link(args) = cli.command else {
            panic!("expected link");
        };
        let LinkCommand::Parent(pair) = args.command else {
            panic!("expected parent");
        };
        assert_eq!(pair.incident, "INC-002");
        assert_eq!(pair.target, "INC-001");
    }

    #[test]
    fn unlink_problem_takes_only_incident() {
        let cli = Cli::parse_from(["itsm", "unlink", "problem", "INC-001"]);
        assert!(matches!(
            cli.command,
            Commands::Unlink(cmd::unlink::UnlinkArgs {
                command: UnlinkCommand::Problem(_)
            })
        ));
        assert!(Cli::try_parse_from(["itsm", "unlink", "problem", "INC-001", "PRB-001"]).is_err());
    }

    #[test]
    fn delete_kind_parses_aliases() {
        let cli = Cli::parse_from(["itsm", "delete", "LAP-0042", "--kind", "asset"]);
        let Commands::Delete(args) = cli.command else {
            panic!("expected delete");
        };
        assert_eq!(args.kind, Some(itsm_core::model::EntityKind::Asset));
        assert!(Cli::try_parse_from(["itsm", "delete", "X", "--kind", "ticket"]).is_err());
    }

    #[test]
    fn completions_subcommand_parses() {
        let cli = Cli::parse_from(["itsm", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Commands::Completions(cmd::completions::CompletionsArgs {
                shell: clap_complete::Shell::Bash,
            })
        ));
    }

    #[test]
    fn all_subcommands_listed() {
        let subcommands = [
            vec!["itsm", "init"],
            vec!["itsm", "init", "--force"],
            vec!["itsm", "show", "INC-001"],
            vec!["itsm", "candidates", "INC-001"],
            vec!["itsm", "tree", "INC-001"],
            vec!["itsm", "check"],
            vec!["itsm", "link", "change", "INC-001", "CHG-456"],
            vec!["itsm", "link", "problem", "INC-001", "PRB-001"],
            vec!["itsm", "link", "asset", "INC-001", "NET-SW-07"],
            vec!["itsm", "link", "kb", "INC-001", "KB-101"],
            vec!["itsm", "unlink", "change", "INC-001", "CHG-456"],
            vec!["itsm", "unlink", "asset", "INC-001", "NET-SW-07"],
            vec!["itsm", "unlink", "kb", "INC-001", "KB-101"],
            vec!["itsm", "unlink", "parent", "INC-002"],
            vec!["itsm", "delete", "CHG-789"],
            vec!["itsm", "completions", "zsh"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "failed to parse {args:?}: {:?}", result.err());
        }
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
