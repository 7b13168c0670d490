use ego_source::Position;
use ego_source::Span;

/// Whitespace trimming requested by a directive's `<%-` / `-%>` delimiters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Trim {
    /// Strip trailing whitespace from the text before the directive.
    pub left: bool,
    /// Strip leading whitespace from the text after the directive.
    pub right: bool,
}

/// One classified unit of a scanned or parsed template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    /// Literal output, written as-is.
    Text {
        content: String,
        pos: Position,
        span: Span,
    },
    /// Go statements spliced verbatim into the function body.
    Code {
        content: String,
        trim: Trim,
        pos: Position,
        span: Span,
    },
    /// An expression whose value is HTML-escaped before writing.
    Print {
        content: String,
        trim: Trim,
        pos: Position,
        span: Span,
    },
    /// An expression whose value is written unescaped.
    RawPrint {
        content: String,
        trim: Trim,
        pos: Position,
        span: Span,
    },
    /// The function signature of the generated template function.
    Declaration {
        content: String,
        pos: Position,
        span: Span,
    },
    /// Preamble text collected above the function (package clause, imports).
    Header {
        content: String,
        pos: Position,
        span: Span,
    },
    ComponentStart(ComponentStart),
    ComponentEnd(TagEnd),
    AttrStart(AttrStart),
    AttrEnd(TagEnd),
}

impl Block {
    #[must_use]
    pub fn text(content: impl Into<String>, pos: Position, span: Span) -> Self {
        Block::Text {
            content: content.into(),
            pos,
            span,
        }
    }

    #[must_use]
    pub fn position(&self) -> &Position {
        match self {
            Block::Text { pos, .. }
            | Block::Code { pos, .. }
            | Block::Print { pos, .. }
            | Block::RawPrint { pos, .. }
            | Block::Declaration { pos, .. }
            | Block::Header { pos, .. } => pos,
            Block::ComponentStart(start) => &start.pos,
            Block::AttrStart(start) => &start.pos,
            Block::ComponentEnd(end) | Block::AttrEnd(end) => &end.pos,
        }
    }

    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Block::Text { span, .. }
            | Block::Code { span, .. }
            | Block::Print { span, .. }
            | Block::RawPrint { span, .. }
            | Block::Declaration { span, .. }
            | Block::Header { span, .. } => *span,
            Block::ComponentStart(start) => start.span,
            Block::AttrStart(start) => start.span,
            Block::ComponentEnd(end) | Block::AttrEnd(end) => end.span,
        }
    }

    #[must_use]
    pub fn trim(&self) -> Trim {
        match self {
            Block::Code { trim, .. } | Block::Print { trim, .. } | Block::RawPrint { trim, .. } => {
                *trim
            }
            _ => Trim::default(),
        }
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Block::Text { .. })
    }

    /// Whether this block, or any block nested inside it, is an escaped print.
    #[must_use]
    pub fn has_escaped_print(&self) -> bool {
        match self {
            Block::Print { .. } => true,
            Block::ComponentStart(start) => {
                start.children.iter().any(Block::has_escaped_print)
                    || start
                        .attr_blocks
                        .iter()
                        .any(|slot| slot.children.iter().any(Block::has_escaped_print))
            }
            Block::AttrStart(slot) => slot.children.iter().any(Block::has_escaped_print),
            _ => false,
        }
    }
}

/// A `<prefix:Name ...>` tag together with everything the parser nested
/// under it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentStart {
    /// Empty for the local package (`ego:` prefix).
    pub package: String,
    pub name: String,
    pub fields: Vec<Field>,
    pub attrs: Vec<Attr>,
    /// Self-closing (`/>`), so no children follow.
    pub closed: bool,
    pub children: Vec<Block>,
    pub attr_blocks: Vec<AttrStart>,
    pub pos: Position,
    /// Covers the open tag only.
    pub span: Span,
}

impl ComponentStart {
    /// The Go type expression for this component, e.g. `ui.Button`.
    #[must_use]
    pub fn type_name(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }

    #[must_use]
    pub fn tag(&self) -> String {
        format!("<{}:{}>", prefix(&self.package), self.name)
    }

    #[must_use]
    pub fn matches(&self, end: &TagEnd) -> bool {
        self.package == end.package && self.name == end.name
    }

    /// Namespace aliases declared by `xmlns:alias` attributes on this tag.
    pub fn declared_namespaces(&self) -> impl Iterator<Item = &str> {
        self.attrs
            .iter()
            .filter_map(|attr| attr.name.strip_prefix("xmlns:"))
            .filter(|alias| !alias.is_empty())
    }
}

/// A named slot, `<prefix::Name>...</prefix::Name>`, filled inside a component.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttrStart {
    pub package: String,
    pub name: String,
    pub children: Vec<Block>,
    pub pos: Position,
    pub span: Span,
}

impl AttrStart {
    #[must_use]
    pub fn tag(&self) -> String {
        format!("<{}::{}>", prefix(&self.package), self.name)
    }

    #[must_use]
    pub fn matches(&self, end: &TagEnd) -> bool {
        self.package == end.package && self.name == end.name
    }
}

/// A closing tag; only used to validate pairing and dropped after parsing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagEnd {
    pub package: String,
    pub name: String,
    pub pos: Position,
    pub span: Span,
}

impl TagEnd {
    #[must_use]
    pub fn component_tag(&self) -> String {
        format!("</{}:{}>", prefix(&self.package), self.name)
    }

    #[must_use]
    pub fn attr_tag(&self) -> String {
        format!("</{}::{}>", prefix(&self.package), self.name)
    }
}

/// A `name=value` pair on a component tag. The value is unparsed Go
/// expression text, or `true` for boolean shorthand.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub name_pos: Position,
    pub value: String,
    pub value_pos: Position,
}

/// Generic attributes share the shape of typed fields; only the case of the
/// name's first letter tells them apart.
pub type Attr = Field;

pub(crate) const LOCAL_PREFIX: &str = "ego";

fn prefix(package: &str) -> &str {
    if package.is_empty() {
        LOCAL_PREFIX
    } else {
        package
    }
}

/// Join adjacent text blocks, apply directive trim flags to their
/// neighbours and drop text left empty.
///
/// Running this over an already normalized sequence changes nothing.
#[must_use]
pub fn normalize(blocks: Vec<Block>) -> Vec<Block> {
    let mut merged: Vec<Block> = Vec::with_capacity(blocks.len());
    for block in blocks {
        if let (
            Some(Block::Text {
                content: prev,
                span: prev_span,
                ..
            }),
            Block::Text { content, span, .. },
        ) = (merged.last_mut(), &block)
        {
            prev.push_str(content);
            *prev_span = prev_span.cover(*span);
            continue;
        }
        merged.push(block);
    }

    for idx in 0..merged.len() {
        let trim = merged[idx].trim();
        if trim.left && idx > 0 {
            if let Block::Text { content, .. } = &mut merged[idx - 1] {
                let len = content.trim_end().len();
                content.truncate(len);
            }
        }
        if trim.right {
            if let Some(Block::Text { content, .. }) = merged.get_mut(idx + 1) {
                let skip = content.len() - content.trim_start().len();
                content.replace_range(..skip, "");
            }
        }
    }

    merged.retain(|block| !matches!(block, Block::Text { content, .. } if content.is_empty()));
    merged
}
