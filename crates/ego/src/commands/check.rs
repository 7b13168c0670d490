use std::fmt::Write as _;
use std::io::IsTerminal;

use anyhow::Context;
use anyhow::Result;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use clap::Parser;
use ego_conf::DiagnosticSeverity;
use ego_conf::DiagnosticsConfig;
use ego_conf::Settings;
use ego_source::Diagnostic;
use ego_source::DiagnosticRenderer;
use ego_source::LineIndex;
use ego_source::Severity;
use ego_source::Span;
use ego_templates::TemplateError;
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
pub struct Check {
    /// Files or directories to check. Defaults to the current directory.
    paths: Vec<Utf8PathBuf>,

    /// Template file extension [default: ego]
    #[arg(long)]
    extension: Option<String>,

    /// Report these codes or code prefixes as errors (e.g. E002,E003).
    #[arg(long, value_delimiter = ',')]
    select: Vec<String>,

    /// Do not report these codes or code prefixes (e.g. E003).
    #[arg(long, value_delimiter = ',')]
    ignore: Vec<String>,
}

impl Command for Check {
    fn execute(&self, _args: &Args) -> Result<Exit> {
        let project_root = project_root()?;
        let settings = Settings::new(&project_root).context("Failed to load settings")?;

        let config = build_diagnostics_config(&settings, &self.select, &self.ignore);
        let extension = resolve_extension(self.extension.as_deref(), &settings)?;
        let files = walk_templates(&roots(&self.paths), extension)?;

        if files.is_empty() {
            return Ok(Exit::success());
        }

        let results = files
            .par_iter()
            .map(|path| check_file(path))
            .collect::<Result<Vec<_>>>()?;

        let fmt = pick_renderer();
        let mut tally = Tally::default();

        for result in &results {
            let Some(error) = &result.error else {
                continue;
            };
            let Some(severity) = config.get_severity(error.code()).to_render_severity() else {
                tracing::debug!(path = %result.path, code = error.code(), "diagnostic disabled");
                continue;
            };
            println!("{}\n", result.render(error, severity, &fmt));
            tally.record(severity);
        }

        Ok(tally.into_exit(results.len()))
    }
}

/// Outcome of checking one template. Parsing stops at the first error, so
/// there is at most one.
struct FileCheckResult {
    path: Utf8PathBuf,
    source: String,
    error: Option<TemplateError>,
}

impl FileCheckResult {
    fn render(
        &self,
        error: &TemplateError,
        severity: Severity,
        fmt: &DiagnosticRenderer,
    ) -> String {
        let index = LineIndex::from_text(&self.source);
        let span = error
            .position()
            .and_then(|pos| index.line_span(pos.line(), &self.source))
            .unwrap_or_else(|| Span::from_parts(0, 0));
        let message = error.message();

        let mut diagnostic = Diagnostic::new(
            &self.source,
            self.path.as_str(),
            error.code(),
            &message,
            span,
            label(error),
        )
        .severity(severity);

        if matches!(error, TemplateError::DeclarationRequired { .. }) {
            diagnostic = diagnostic
                .note("every template needs one `<%! func Name(w io.Writer) error %>` block");
        }

        fmt.render(&diagnostic)
    }
}

fn check_file(path: &Utf8Path) -> Result<FileCheckResult> {
    let source =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    let error = ego_templates::parse(&source, path.as_str())
        .and_then(|template| template.check())
        .err();

    Ok(FileCheckResult {
        path: path.to_owned(),
        source,
        error,
    })
}

fn label(error: &TemplateError) -> &'static str {
    match error {
        TemplateError::UnexpectedEndOfInput { .. } => "opened here and never closed",
        TemplateError::Syntax { .. } => "on this line",
        TemplateError::DeclarationRequired { .. } => "no declaration in this template",
        TemplateError::PackageNameRequired | TemplateError::Io(_) => "",
    }
}

fn build_diagnostics_config(
    settings: &Settings,
    select: &[String],
    ignore: &[String],
) -> DiagnosticsConfig {
    let mut config = settings.diagnostics.clone();

    for code in select {
        config.set_severity(code, DiagnosticSeverity::Error);
    }

    for code in ignore {
        config.set_severity(code, DiagnosticSeverity::Off);
    }

    config
}

fn pick_renderer() -> DiagnosticRenderer {
    if std::io::stdout().is_terminal() {
        DiagnosticRenderer::styled()
    } else {
        DiagnosticRenderer::plain()
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    errors: usize,
    warnings: usize,
}

impl Tally {
    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
        }
    }

    fn into_exit(self, checked: usize) -> Exit {
        if self.errors == 0 && self.warnings == 0 {
            return Exit::success().with_message(format!(
                "Checked {}, no problems found.",
                plural(checked, "template")
            ));
        }

        let mut message = String::from("Found ");
        if self.errors > 0 {
            message.push_str(&plural(self.errors, "error"));
        }
        if self.warnings > 0 {
            if self.errors > 0 {
                message.push_str(" and ");
            }
            message.push_str(&plural(self.warnings, "warning"));
        }
        let _ = write!(message, " in {}.", plural(checked, "template"));

        if self.errors > 0 {
            Exit::error().with_message(message)
        } else {
            Exit::success().with_message(message)
        }
    }
}
