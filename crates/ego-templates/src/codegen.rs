//! Rendering of blocks as Go statements.

use std::fmt;
use std::fmt::Write;

use ego_source::Position;

use crate::block::Block;
use crate::block::ComponentStart;
use crate::error::TemplateError;

/// Name of the local variable holding a component value while its fields
/// are assigned.
const COMPONENT_VAR: &str = "EGO";

/// A string rendered as a Go interpreted string literal, the way `%q`
/// would print it.
pub(crate) struct GoQuoted<'a>(pub &'a str);

impl fmt::Display for GoQuoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('"')?;
        for c in self.0.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                '\t' => f.write_str("\\t")?,
                '\x07' => f.write_str("\\a")?,
                '\x08' => f.write_str("\\b")?,
                '\x0b' => f.write_str("\\v")?,
                '\x0c' => f.write_str("\\f")?,
                c if c.is_control() || c == '\u{feff}' => {
                    let code = u32::from(c);
                    if code < 0x80 {
                        write!(f, "\\x{code:02x}")?;
                    } else if code <= 0xffff {
                        write!(f, "\\u{code:04x}")?;
                    } else {
                        write!(f, "\\U{code:08x}")?;
                    }
                }
                c => f.write_char(c)?,
            }
        }
        f.write_char('"')
    }
}

pub(crate) fn write_pragma(out: &mut String, pos: &Position) -> fmt::Result {
    if pos.is_addressable() {
        writeln!(out, "//line {pos}")?;
    }
    Ok(())
}

pub(crate) fn write_blocks(out: &mut String, blocks: &[Block]) -> Result<(), TemplateError> {
    blocks.iter().try_for_each(|block| write_block(out, block))
}

pub(crate) fn write_block(out: &mut String, block: &Block) -> Result<(), TemplateError> {
    match block {
        Block::Text { content, pos, .. } => {
            write_pragma(out, pos)?;
            writeln!(out, "_, _ = io.WriteString(w, {})", GoQuoted(content))?;
        }
        Block::Code { content, pos, .. } => {
            write_pragma(out, pos)?;
            writeln!(out, "{content}")?;
        }
        Block::Print { content, pos, .. } => {
            write_pragma(out, pos)?;
            writeln!(
                out,
                "_, _ = io.WriteString(w, html.EscapeString(fmt.Sprint({content})))"
            )?;
        }
        Block::RawPrint { content, pos, .. } => {
            write_pragma(out, pos)?;
            writeln!(out, "_, _ = fmt.Fprint(w, {content})")?;
        }
        Block::ComponentStart(start) => write_component(out, start)?,
        Block::Declaration { pos, .. } => {
            return Err(TemplateError::syntax("unexpected declaration", pos));
        }
        Block::Header { pos, .. } => {
            return Err(TemplateError::syntax("unexpected header", pos));
        }
        Block::AttrStart(slot) => {
            return Err(TemplateError::syntax(
                format!("unexpected {} outside a component", slot.tag()),
                &slot.pos,
            ));
        }
        Block::ComponentEnd(end) => {
            return Err(TemplateError::syntax(
                format!("unexpected {}", end.component_tag()),
                &end.pos,
            ));
        }
        Block::AttrEnd(end) => {
            return Err(TemplateError::syntax(
                format!("unexpected {}", end.attr_tag()),
                &end.pos,
            ));
        }
    }
    Ok(())
}

fn write_component(out: &mut String, start: &ComponentStart) -> Result<(), TemplateError> {
    write_pragma(out, &start.pos)?;
    writeln!(out, "{{")?;
    writeln!(out, "var {COMPONENT_VAR} {}", start.type_name())?;

    for field in &start.fields {
        write_pragma(out, &field.value_pos)?;
        writeln!(out, "{COMPONENT_VAR}.{} = {}", field.name, field.value)?;
    }

    if !start.attrs.is_empty() {
        writeln!(out, "{COMPONENT_VAR}.Attrs = map[string]string{{")?;
        for attr in &start.attrs {
            write_pragma(out, &attr.value_pos)?;
            writeln!(out, "{}: fmt.Sprint({}),", GoQuoted(&attr.name), attr.value)?;
        }
        writeln!(out, "}}")?;
    }

    if !start.children.is_empty() {
        writeln!(out, "{COMPONENT_VAR}.Yield = func() {{")?;
        write_blocks(out, &start.children)?;
        writeln!(out, "}}")?;
    }

    for slot in &start.attr_blocks {
        write_pragma(out, &slot.pos)?;
        writeln!(out, "{COMPONENT_VAR}.{} = func() {{", slot.name)?;
        write_blocks(out, &slot.children)?;
        writeln!(out, "}}")?;
    }

    writeln!(out, "{COMPONENT_VAR}.Render(w)")?;
    writeln!(out, "}}")?;
    Ok(())
}
