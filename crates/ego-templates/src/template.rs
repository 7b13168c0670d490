use std::fmt::Write as _;
use std::io;

use rustc_hash::FxHashSet;

use crate::block::Block;
use crate::codegen::write_block;
use crate::codegen::write_pragma;
use crate::error::TemplateError;
use crate::preamble::parse_preamble;
use crate::preamble::Import;

/// One parsed template: the normalized block tree of a single source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    pub path: String,
    pub blocks: Vec<Block>,
}

impl Template {
    #[must_use]
    pub fn new(path: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self {
            path: path.into(),
            blocks,
        }
    }

    /// Write this template as a standalone Go fragment: its header blocks
    /// verbatim, then the template function.
    ///
    /// No package clause is added; the output only has one if a header
    /// block supplies it. Use [`Package`] to produce a complete Go file.
    pub fn emit<W: io::Write>(&self, writer: &mut W) -> Result<(), TemplateError> {
        let rendered = self.render()?;
        writer.write_all(rendered.as_bytes())?;
        Ok(())
    }

    pub fn render(&self) -> Result<String, TemplateError> {
        let mut out = String::new();
        for block in &self.blocks {
            if let Block::Header { content, pos, .. } = block {
                write_pragma(&mut out, pos)?;
                writeln!(out, "{content}")?;
            }
        }
        self.write_function(&mut out)?;
        Ok(out)
    }

    /// Report the first error emission would hit, without producing output.
    pub fn check(&self) -> Result<(), TemplateError> {
        for header in self.headers() {
            if let Block::Header { content, pos, .. } = header {
                parse_preamble(content, pos)?;
            }
        }
        self.write_function(&mut String::new())
    }

    pub(crate) fn headers(&self) -> impl Iterator<Item = &Block> {
        self.blocks
            .iter()
            .filter(|block| matches!(block, Block::Header { .. }))
    }

    pub(crate) fn has_escaped_print(&self) -> bool {
        self.blocks.iter().any(Block::has_escaped_print)
    }

    /// The function declaration and body, without header blocks.
    pub(crate) fn write_function(&self, out: &mut String) -> Result<(), TemplateError> {
        let mut declarations = self
            .blocks
            .iter()
            .filter(|block| matches!(block, Block::Declaration { .. }));

        let Some(Block::Declaration { content, pos, .. }) = declarations.next() else {
            return Err(TemplateError::DeclarationRequired {
                path: self.path.clone(),
            });
        };
        if let Some(second) = declarations.next() {
            return Err(TemplateError::syntax(
                "multiple declarations",
                second.position(),
            ));
        }

        write_pragma(out, pos)?;
        writeln!(out, "{} {{", content.trim())?;

        for block in &self.blocks {
            if !matches!(block, Block::Declaration { .. } | Block::Header { .. }) {
                write_block(out, block)?;
            }
        }

        writeln!(out, "return nil")?;
        writeln!(out, "}}")?;
        Ok(())
    }
}

/// The templates that land in one generated Go file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub templates: Vec<Template>,
}

impl Package {
    #[must_use]
    pub fn new(name: impl Into<String>, templates: Vec<Template>) -> Self {
        Self {
            name: name.into(),
            templates,
        }
    }

    pub fn emit<W: io::Write>(&self, writer: &mut W) -> Result<(), TemplateError> {
        let rendered = self.render()?;
        writer.write_all(rendered.as_bytes())?;
        Ok(())
    }

    /// Render the package file: generated-code banner, package clause, one
    /// merged import group, shared declarations, then every template
    /// function in order.
    pub fn render(&self) -> Result<String, TemplateError> {
        if self.name.is_empty() {
            return Err(TemplateError::PackageNameRequired);
        }

        let escaped = self.templates.iter().any(Template::has_escaped_print);
        let mut implicit = vec![Import::unaliased("fmt")];
        if escaped {
            implicit.push(Import::unaliased("html"));
        }
        implicit.push(Import::unaliased("io"));

        let mut seen_imports: FxHashSet<String> = implicit.iter().map(Import::key).collect();
        let mut imports = implicit;
        let mut seen_decls: FxHashSet<String> = FxHashSet::default();
        let mut decls: Vec<String> = Vec::new();

        for template in &self.templates {
            for header in template.headers() {
                let Block::Header { content, pos, .. } = header else {
                    continue;
                };
                let preamble = parse_preamble(content, pos)?;
                for import in preamble.imports {
                    if seen_imports.insert(import.key()) {
                        tracing::debug!(
                            import = %import,
                            template = %template.path,
                            "merged import"
                        );
                        imports.push(import);
                    }
                }
                if let Some(decl) = preamble.decls {
                    if seen_decls.insert(decl.clone()) {
                        decls.push(decl);
                    }
                }
            }
        }

        let mut out = String::new();
        writeln!(out, "// Generated by ego.")?;
        writeln!(out, "// DO NOT EDIT")?;
        writeln!(out)?;
        writeln!(out, "package {}", self.name)?;
        writeln!(out)?;

        writeln!(out, "import (")?;
        for import in &imports {
            writeln!(out, "\t{import}")?;
        }
        writeln!(out, ")")?;
        writeln!(out)?;
        writeln!(out, "var _ = fmt.Sprint(\"\")")?;

        for decl in &decls {
            writeln!(out)?;
            writeln!(out, "{decl}")?;
        }

        for template in &self.templates {
            writeln!(out)?;
            template.write_function(&mut out)?;
        }

        Ok(out)
    }
}
