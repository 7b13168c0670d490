use std::fs;
use std::io::Write as _;
use std::process::Command as ProcessCommand;
use std::process::Stdio;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use clap::Parser;
use ego_conf::Settings;
use ego_templates::Package;
use ego_templates::Template;
use rayon::prelude::*;

use crate::args::Args;
use crate::commands::plural;
use crate::commands::project_root;
use crate::commands::resolve_extension;
use crate::commands::roots;
use crate::commands::Command;
use crate::exit::Exit;
use crate::walk::walk_templates;

#[derive(Debug, Parser)]
pub struct Generate {
    /// Files or directories to compile. Defaults to the current directory.
    paths: Vec<Utf8PathBuf>,

    /// Output file [default: ego.go]
    #[arg(short, long)]
    output: Option<Utf8PathBuf>,

    /// Go package name. Defaults to the name of the output file's directory.
    #[arg(short, long)]
    package: Option<String>,

    /// Write the generated code without running gofmt.
    #[arg(long)]
    no_fmt: bool,

    /// Template file extension [default: ego]
    #[arg(long)]
    extension: Option<String>,
}

impl Command for Generate {
    fn execute(&self, _args: &Args) -> Result<Exit> {
        let project_root = project_root()?;
        let settings = Settings::new(&project_root).context("Failed to load settings")?;

        let extension = resolve_extension(self.extension.as_deref(), &settings)?;
        let output = self.output.as_ref().unwrap_or(&settings.output);
        let run_fmt = settings.fmt && !self.no_fmt;

        let files = walk_templates(&roots(&self.paths), extension)?;
        if files.is_empty() {
            tracing::warn!(extension, "no templates found");
            return Ok(Exit::success().with_message("No templates found."));
        }

        let templates = parse_all(&files)?;

        let name = self
            .package
            .clone()
            .or_else(|| settings.package.clone())
            .unwrap_or_else(|| package_name_for(&project_root.join(output)));
        tracing::debug!(package = %name, %output, "emitting package");

        let mut code = Vec::new();
        Package::new(name, templates)
            .emit(&mut code)
            .context("Failed to generate Go code")?;

        if run_fmt {
            code = gofmt(code)?;
        }

        fs::write(output, code).with_context(|| format!("Failed to write {output}"))?;

        Ok(Exit::success().with_message(format!(
            "Generated {} into {output}.",
            plural(files.len(), "template")
        )))
    }
}

/// Parse every file on the rayon pool, keeping the discovery order.
fn parse_all(files: &[Utf8PathBuf]) -> Result<Vec<Template>> {
    files
        .par_iter()
        .map(|path| {
            let source =
                fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
            ego_templates::parse(&source, path.as_str())
                .with_context(|| format!("Failed to parse {path}"))
        })
        .collect()
}

/// The first run of word characters in the output directory's name, so that
/// `site-views/ego.go` lands in package `site` and `.cache/ego.go` in `cache`.
fn package_name_for(output: &Utf8Path) -> String {
    fn is_word(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_'
    }

    let Some(dir) = output.parent() else {
        return String::new();
    };
    let dir = dir.canonicalize_utf8().unwrap_or_else(|_| dir.to_owned());
    dir.file_name()
        .map(|name| {
            name.chars()
                .skip_while(|c| !is_word(*c))
                .take_while(|c| is_word(*c))
                .collect()
        })
        .unwrap_or_default()
}

/// Pipe `code` through `gofmt`. Without `gofmt` on the PATH the code is
/// returned unchanged.
fn gofmt(code: Vec<u8>) -> Result<Vec<u8>> {
    let Ok(binary) = which::which("gofmt") else {
        tracing::warn!("gofmt not found on PATH, writing unformatted output");
        return Ok(code);
    };

    let mut child = ProcessCommand::new(&binary)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to run {}", binary.display()))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(&code)
            .context("Failed to send generated code to gofmt")?;
    }

    let output = child
        .wait_with_output()
        .context("Failed to wait for gofmt")?;
    if !output.status.success() {
        bail!(
            "gofmt rejected the generated code: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(output.stdout)
}
