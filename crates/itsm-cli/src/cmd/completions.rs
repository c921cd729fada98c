use anyhow::Result;
use clap::Args;
use clap_complete::{Shell, generate};
use std::io::Write;

/// Arguments for `itsm completions`.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script generation.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write the completion script for `command` to stdout.
///
/// # Errors
///
/// Returns an error if stdout cannot be flushed.
pub fn run_completions(args: &CompletionsArgs, command: &mut clap::Command) -> Result<()> {
    let bin_name = command.get_name().to_string();
    let mut out = std::io::stdout().lock();
    generate(args.shell, command, bin_name, &mut out);
    out.flush()?;
    Ok(())
}
