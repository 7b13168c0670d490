use std::ffi::OsString;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use crate::args::Args;
use crate::commands::Command;
use crate::commands::EgoCommand;
use crate::logging;

#[derive(Parser)]
#[command(name = "ego")]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: EgoCommand,

    #[command(flatten)]
    pub args: Args,
}

/// Parse CLI arguments and execute the chosen command
pub fn run<I, T>(args: I) -> Result<ExitCode>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args).unwrap_or_else(|e| {
        e.exit();
    });

    logging::init_tracing(&cli.args.global);

    let exit = cli.command.execute(&cli.args)?;
    Ok(exit.report(&cli.args.global))
}
