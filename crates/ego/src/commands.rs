mod check;
mod generate;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Subcommand;
use ego_conf::Settings;

use crate::args::Args;
use crate::exit::Exit;

pub trait Command {
    fn execute(&self, args: &Args) -> Result<Exit>;
}

#[derive(Debug, Subcommand)]
pub enum EgoCommand {
    /// Compile templates into a single Go source file
    Generate(self::generate::Generate),
    /// Report template errors without writing any output
    Check(self::check::Check),
}

impl Command for EgoCommand {
    fn execute(&self, args: &Args) -> Result<Exit> {
        match self {
            EgoCommand::Generate(cmd) => cmd.execute(args),
            EgoCommand::Check(cmd) => cmd.execute(args),
        }
    }
}

/// The current directory, which doubles as the project root for settings.
fn project_root() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Utf8PathBuf::from_path_buf(cwd)
        .map_err(|_| anyhow::anyhow!("Current directory is not valid UTF-8"))
}

/// Explicit paths, or the project root when none were given.
fn roots(paths: &[Utf8PathBuf]) -> Vec<Utf8PathBuf> {
    if paths.is_empty() {
        vec![Utf8PathBuf::from(".")]
    } else {
        paths.to_vec()
    }
}

/// The `--extension` flag when given, otherwise the configured one.
fn resolve_extension<'a>(flag: Option<&'a str>, settings: &'a Settings) -> Result<&'a str> {
    let extension = flag.map_or(settings.extension.as_str(), |ext| ext.trim_start_matches('.'));
    if extension.is_empty() {
        bail!("Template extension must not be empty");
    }
    Ok(extension)
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}
