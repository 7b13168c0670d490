use std::iter::FusedIterator;
use std::sync::Arc;

use ego_source::Position;
use ego_source::Span;

use crate::block::AttrStart;
use crate::block::Block;
use crate::block::ComponentStart;
use crate::block::Field;
use crate::block::TagEnd;
use crate::block::Trim;
use crate::block::LOCAL_PREFIX;
use crate::error::TemplateError;
use crate::expr::ExprStatus;
use crate::expr::ExpressionOracle;
use crate::expr::GoExpr;

/// Pull-based tokenizer over one template source.
///
/// Every call to [`Scanner::next_block`] yields the next [`Block`] in document
/// order. Component and attribute tags come out flat; nesting them is the
/// parser's job.
pub struct Scanner<'src> {
    source: &'src str,
    path: Arc<str>,
    cursor: usize,
    /// Exclusive upper bound of the region being scanned.
    end: usize,
    line: u32,
    components: bool,
    oracle: &'src dyn ExpressionOracle,
    failed: bool,
}

impl<'src> Scanner<'src> {
    #[must_use]
    pub fn new(source: &'src str, path: &str) -> Self {
        Self {
            source,
            path: Arc::from(path),
            cursor: 0,
            end: source.len(),
            line: 1,
            components: true,
            oracle: &GoExpr,
            failed: false,
        }
    }

    /// Use `oracle` to decide where component attribute values end.
    #[must_use]
    pub fn with_oracle(mut self, oracle: &'src dyn ExpressionOracle) -> Self {
        self.oracle = oracle;
        self
    }

    /// Treat component and attribute tags as plain text.
    #[must_use]
    pub fn text_only(mut self) -> Self {
        self.components = false;
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The position of the cursor.
    #[must_use]
    pub fn cursor_pos(&self) -> Position {
        Position::new(Arc::clone(&self.path), self.line)
    }

    /// A text-only scanner over `span` of the same source, starting at `pos`.
    ///
    /// Blocks produced by the fragment keep spans relative to the whole
    /// source.
    #[must_use]
    pub fn fragment(&self, span: Span, pos: &Position) -> Scanner<'src> {
        let end = span.end_usize().min(self.source.len());
        Scanner {
            source: self.source,
            path: Arc::clone(&self.path),
            cursor: span.start_usize().min(end),
            end,
            line: pos.line(),
            components: false,
            oracle: self.oracle,
            failed: false,
        }
    }

    pub fn next_block(&mut self) -> Result<Option<Block>, TemplateError> {
        if self.cursor >= self.end {
            return Ok(None);
        }

        let rest = self.rest();
        let block = if rest.starts_with("<%") {
            self.scan_directive()?
        } else if !rest.starts_with('<') {
            self.scan_text(0)
        } else if let Some(tag) = self
            .components
            .then(|| peek_tag(self.view(), self.cursor))
            .flatten()
        {
            self.scan_tag(tag)?
        } else {
            self.scan_text(1)
        };

        Ok(Some(block))
    }

    /// Consume raw source up to and including the `</package:name>` that
    /// closes an already scanned open tag.
    ///
    /// Everything is kept as text except `<% ... %>` directives. Nested
    /// opens of the same tag are counted so their closes are skipped;
    /// self-closing ones are not.
    pub fn scan_passthrough(
        &mut self,
        package: &str,
        name: &str,
        open: &Position,
    ) -> Result<Vec<Block>, TemplateError> {
        let unclosed = || TemplateError::syntax(format!("unclosed <{package}:{name}>"), open);
        let mut blocks = Vec::new();
        let mut depth = 0usize;
        let mut text_start = self.cursor;
        let mut text_pos = self.cursor_pos();

        loop {
            let Some(offset) = memchr::memchr(b'<', &self.view().as_bytes()[self.cursor..]) else {
                return Err(unclosed());
            };
            let at = self.cursor + offset;

            if self.view()[at..].starts_with("<%") {
                self.advance_to(at);
                self.flush_text(&mut blocks, text_start, &text_pos);
                blocks.push(self.scan_directive()?);
                text_start = self.cursor;
                text_pos = self.cursor_pos();
                continue;
            }

            let tag = peek_tag(self.view(), at)
                .filter(|tag| tag.prefix == package && tag.name == name);
            match tag.map(|tag| (tag.kind, at + tag.len)) {
                Some((TagKind::ComponentStart, after)) => {
                    let (close, self_closing) =
                        tag_end(self.view(), after).ok_or_else(unclosed)?;
                    if !self_closing {
                        depth += 1;
                    }
                    self.advance_to(close);
                }
                Some((TagKind::ComponentEnd, after)) => {
                    let close = memchr::memchr(b'>', &self.view().as_bytes()[after..])
                        .map(|offset| after + offset + 1)
                        .ok_or_else(unclosed)?;
                    self.advance_to(close);
                    if depth == 0 {
                        self.flush_text(&mut blocks, text_start, &text_pos);
                        return Ok(blocks);
                    }
                    depth -= 1;
                }
                _ => self.advance_to(at + 1),
            }
        }
    }

    fn view(&self) -> &'src str {
        &self.source[..self.end]
    }

    fn rest(&self) -> &'src str {
        &self.source[self.cursor..self.end]
    }

    fn peek_byte(&self) -> Option<u8> {
        self.view().as_bytes().get(self.cursor).copied()
    }

    fn advance_to(&mut self, target: usize) {
        let consumed = &self.source.as_bytes()[self.cursor..target];
        let newlines = memchr::memchr_iter(b'\n', consumed).count();
        self.line = self
            .line
            .saturating_add(u32::try_from(newlines).unwrap_or(u32::MAX));
        self.cursor = target;
    }

    fn skip_whitespace(&mut self) {
        let skip = self
            .rest()
            .bytes()
            .take_while(u8::is_ascii_whitespace)
            .count();
        self.advance_to(self.cursor + skip);
    }

    fn flush_text(&self, blocks: &mut Vec<Block>, start: usize, pos: &Position) {
        if start < self.cursor {
            blocks.push(Block::text(
                &self.source[start..self.cursor],
                pos.clone(),
                Span::from_bounds(start, self.cursor),
            ));
        }
    }

    /// Text up to the next `<`, always consuming at least `skip` bytes.
    fn scan_text(&mut self, skip: usize) -> Block {
        let pos = self.cursor_pos();
        let start = self.cursor;
        let from = (start + skip).min(self.end);
        let stop = memchr::memchr(b'<', &self.source.as_bytes()[from..self.end])
            .map_or(self.end, |offset| from + offset);
        self.advance_to(stop);
        Block::text(
            &self.source[start..stop],
            pos,
            Span::from_bounds(start, stop),
        )
    }

    fn scan_directive(&mut self) -> Result<Block, TemplateError> {
        let pos = self.cursor_pos();
        let start = self.cursor;
        let (kind, left, open_len) = directive_kind(self.rest());
        let body = start + open_len;

        let bytes = self.view().as_bytes();
        let close = if kind == DirectiveKind::Header {
            find_header_close(bytes, body)
        } else {
            find_close(bytes, body)
        };
        let Some((content_end, close_end)) = close else {
            return Err(TemplateError::eof(&pos));
        };

        let mut content = &self.source[body..content_end];
        let mut trim = Trim {
            left,
            right: false,
        };
        if !matches!(kind, DirectiveKind::Header | DirectiveKind::Declaration) {
            if let Some(stripped) = content.strip_suffix('-') {
                content = stripped;
                trim.right = true;
            }
        }
        let content = content.to_string();

        self.advance_to(close_end);
        let span = Span::from_bounds(start, close_end);

        Ok(match kind {
            DirectiveKind::Header => Block::Header { content, pos, span },
            DirectiveKind::Declaration => Block::Declaration { content, pos, span },
            DirectiveKind::RawPrint => Block::RawPrint {
                content,
                trim,
                pos,
                span,
            },
            DirectiveKind::Print => Block::Print {
                content,
                trim,
                pos,
                span,
            },
            DirectiveKind::Code => Block::Code {
                content,
                trim,
                pos,
                span,
            },
        })
    }

    fn scan_tag(&mut self, tag: TagPeek<'src>) -> Result<Block, TemplateError> {
        let pos = self.cursor_pos();
        let start = self.cursor;
        self.advance_to(start + tag.len);
        let (package, name) = resolve_name(tag.prefix, tag.name, &pos)?;

        match tag.kind {
            TagKind::ComponentStart => {
                let mut component = ComponentStart {
                    package,
                    name,
                    pos,
                    ..ComponentStart::default()
                };
                self.scan_pairs(&mut component)?;
                component.span = Span::from_bounds(start, self.cursor);
                Ok(Block::ComponentStart(component))
            }
            TagKind::AttrStart => {
                self.expect_close(&pos)?;
                Ok(Block::AttrStart(AttrStart {
                    package,
                    name,
                    children: Vec::new(),
                    pos,
                    span: Span::from_bounds(start, self.cursor),
                }))
            }
            TagKind::ComponentEnd | TagKind::AttrEnd => {
                self.expect_close(&pos)?;
                let end = TagEnd {
                    package,
                    name,
                    pos,
                    span: Span::from_bounds(start, self.cursor),
                };
                Ok(if tag.kind == TagKind::ComponentEnd {
                    Block::ComponentEnd(end)
                } else {
                    Block::AttrEnd(end)
                })
            }
        }
    }

    fn expect_close(&mut self, open: &Position) -> Result<(), TemplateError> {
        self.skip_whitespace();
        match self.peek_byte() {
            None => Err(TemplateError::eof(open)),
            Some(b'>') => {
                self.advance_to(self.cursor + 1);
                Ok(())
            }
            Some(_) => Err(TemplateError::syntax("expected '>'", &self.cursor_pos())),
        }
    }

    fn scan_pairs(&mut self, component: &mut ComponentStart) -> Result<(), TemplateError> {
        loop {
            self.skip_whitespace();
            match self.peek_byte() {
                None => return Err(TemplateError::eof(&component.pos)),
                Some(b'>') => {
                    self.advance_to(self.cursor + 1);
                    return Ok(());
                }
                Some(b'/') => {
                    if self.rest().starts_with("/>") {
                        self.advance_to(self.cursor + 2);
                        component.closed = true;
                        return Ok(());
                    }
                    return Err(TemplateError::syntax(
                        "expected '>' after '/'",
                        &self.cursor_pos(),
                    ));
                }
                Some(b) if is_ident_start(b) => {
                    let pair = self.scan_pair(&component.pos)?;
                    if pair.name.starts_with(|c: char| c.is_ascii_uppercase()) {
                        component.fields.push(pair);
                    } else {
                        component.attrs.push(pair);
                    }
                }
                Some(_) => {
                    return Err(TemplateError::syntax(
                        "malformed identifier",
                        &self.cursor_pos(),
                    ));
                }
            }
        }
    }

    fn scan_pair(&mut self, open: &Position) -> Result<Field, TemplateError> {
        let name_pos = self.cursor_pos();
        let start = self.cursor;
        let len = self
            .rest()
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b':' | b'.' | b'-'))
            .count();
        self.advance_to(start + len);
        let name = self.source[start..self.cursor].to_string();

        self.skip_whitespace();
        match self.peek_byte() {
            None => Err(TemplateError::eof(open)),
            Some(b'=') => {
                self.advance_to(self.cursor + 1);
                self.skip_whitespace();
                let value_pos = self.cursor_pos();
                let value = self.scan_value(&value_pos)?;
                Ok(Field {
                    name,
                    name_pos,
                    value,
                    value_pos,
                })
            }
            Some(b) if b == b'>' || is_ident_start(b) || self.rest().starts_with("/>") => {
                Ok(Field {
                    name,
                    value: "true".to_string(),
                    value_pos: name_pos.clone(),
                    name_pos,
                })
            }
            Some(_) => Err(TemplateError::syntax("expected '='", &self.cursor_pos())),
        }
    }

    /// Grow the value one boundary at a time until the oracle accepts it.
    fn scan_value(&mut self, value_pos: &Position) -> Result<String, TemplateError> {
        let bytes = self.view().as_bytes();
        let start = self.cursor;
        let mut idx = start;

        loop {
            while idx < bytes.len() && !is_value_boundary(bytes, idx) {
                idx += 1;
            }
            if idx >= bytes.len() {
                return Err(TemplateError::syntax("incomplete expression", value_pos));
            }
            match self.oracle.check(&self.source[start..idx]) {
                ExprStatus::Valid => break,
                ExprStatus::Incomplete => idx += 1,
                ExprStatus::Invalid => {
                    return Err(TemplateError::syntax("invalid expression", value_pos));
                }
            }
        }

        self.advance_to(idx);
        Ok(self.source[start..idx].to_string())
    }
}

impl Iterator for Scanner<'_> {
    type Item = Result<Block, TemplateError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_block() {
            Ok(block) => block.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for Scanner<'_> {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DirectiveKind {
    Header,
    Declaration,
    RawPrint,
    Print,
    Code,
}

/// Classify the directive at the start of `rest`, which begins with `<%`.
/// Returns the kind, the left-trim flag and the length of the opener.
fn directive_kind(rest: &str) -> (DirectiveKind, bool, usize) {
    const OPENERS: &[(&str, DirectiveKind, bool)] = &[
        ("<%%", DirectiveKind::Header, false),
        ("<%!", DirectiveKind::Declaration, false),
        ("<%-==", DirectiveKind::RawPrint, true),
        ("<%==", DirectiveKind::RawPrint, false),
        ("<%-=", DirectiveKind::Print, true),
        ("<%=", DirectiveKind::Print, false),
        ("<%-", DirectiveKind::Code, true),
    ];
    OPENERS
        .iter()
        .find(|(opener, ..)| rest.starts_with(opener))
        .map_or((DirectiveKind::Code, false, 2), |(opener, kind, left)| {
            (*kind, *left, opener.len())
        })
}

/// Find `%>` from `from`. A `%` followed by anything else is content, and
/// the byte after it is never a terminator.
fn find_close(bytes: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut idx = from;
    while let Some(offset) = memchr::memchr(b'%', bytes.get(idx..)?) {
        let at = idx + offset;
        match bytes.get(at + 1) {
            Some(b'>') => return Some((at, at + 2)),
            Some(_) => idx = at + 2,
            None => return None,
        }
    }
    None
}

fn find_header_close(bytes: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut idx = from;
    while let Some(offset) = memchr::memchr(b'%', bytes.get(idx..)?) {
        let at = idx + offset;
        match (bytes.get(at + 1), bytes.get(at + 2)) {
            (Some(b'%'), Some(b'>')) => return Some((at, at + 3)),
            (Some(b'%'), Some(_)) => idx = at + 3,
            (Some(_), _) => idx = at + 2,
            (None, _) => return None,
        }
    }
    None
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TagKind {
    ComponentStart,
    ComponentEnd,
    AttrStart,
    AttrEnd,
}

/// A tag recognized by [`peek_tag`], not yet consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TagPeek<'a> {
    pub kind: TagKind,
    pub prefix: &'a str,
    /// `Name`, or `pkg.Name` when qualified.
    pub name: &'a str,
    /// Bytes from the `<` through the end of the name.
    pub len: usize,
}

/// Recognize `<prefix:Name`, `</prefix:Name`, `<prefix::Name` or
/// `</prefix::Name` at `idx` without consuming anything.
pub(crate) fn peek_tag(source: &str, idx: usize) -> Option<TagPeek<'_>> {
    let bytes = source.as_bytes();
    if bytes.get(idx) != Some(&b'<') {
        return None;
    }

    let mut at = idx + 1;
    let end = bytes.get(at) == Some(&b'/');
    if end {
        at += 1;
    }

    let prefix_len = ident_len(&bytes[at..]);
    if prefix_len == 0 {
        return None;
    }
    let prefix = &source[at..at + prefix_len];
    at += prefix_len;

    if bytes.get(at) != Some(&b':') {
        return None;
    }
    at += 1;
    let slot = bytes.get(at) == Some(&b':');
    if slot {
        at += 1;
    }

    let name_start = at;
    let first = ident_len(&bytes[at..]);
    if first == 0 {
        return None;
    }
    at += first;
    if bytes.get(at) == Some(&b'.') {
        let second = ident_len(&bytes[at + 1..]);
        if second == 0 {
            return None;
        }
        at += 1 + second;
    }
    let name = &source[name_start..at];

    let terminated = match bytes.get(at) {
        Some(b'>') => true,
        Some(b'/') => !end,
        Some(b) => b.is_ascii_whitespace(),
        None => false,
    };
    if !terminated {
        return None;
    }

    let kind = match (end, slot) {
        (false, false) => TagKind::ComponentStart,
        (true, false) => TagKind::ComponentEnd,
        (false, true) => TagKind::AttrStart,
        (true, true) => TagKind::AttrEnd,
    };

    Some(TagPeek {
        kind,
        prefix,
        name,
        len: at - idx,
    })
}

/// Find the `>` closing a tag whose name ends at `from`, skipping quoted
/// attribute values. Returns the offset just past it and whether the tag is
/// self-closing.
fn tag_end(source: &str, from: usize) -> Option<(usize, bool)> {
    let bytes = source.as_bytes();
    let mut quote: Option<u8> = None;
    for (offset, &b) in bytes.get(from..)?.iter().enumerate() {
        let at = from + offset;
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'' | b'`') => quote = Some(b),
            (None, b'>') => return Some((at + 1, at > 0 && bytes[at - 1] == b'/')),
            (None, _) => {}
        }
    }
    None
}

/// Split a tag's prefix and name into the Go package and type name.
fn resolve_name(
    prefix: &str,
    name: &str,
    pos: &Position,
) -> Result<(String, String), TemplateError> {
    match (prefix == LOCAL_PREFIX, name.split_once('.')) {
        (true, Some((package, name))) => Ok((package.to_string(), name.to_string())),
        (true, None) => Ok((String::new(), name.to_string())),
        (false, None) => Ok((prefix.to_string(), name.to_string())),
        (false, Some(_)) => Err(TemplateError::syntax(
            format!("qualified name <{prefix}:{name}> requires the {LOCAL_PREFIX} prefix"),
            pos,
        )),
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn ident_len(bytes: &[u8]) -> usize {
    match bytes.first() {
        Some(&b) if is_ident_start(b) => bytes
            .iter()
            .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
            .count(),
        _ => 0,
    }
}

fn is_value_boundary(bytes: &[u8], idx: usize) -> bool {
    match bytes[idx] {
        b'>' => true,
        b'/' => bytes.get(idx + 1) == Some(&b'>'),
        b => b.is_ascii_whitespace(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(source: &str) -> Result<Vec<Block>, TemplateError> {
        Scanner::new(source, "t.ego").collect()
    }

    fn single(source: &str) -> Block {
        let mut blocks = scan_all(source).unwrap();
        assert_eq!(blocks.len(), 1, "{blocks:?}");
        blocks.remove(0)
    }

    fn component(source: &str) -> ComponentStart {
        match single(source) {
            Block::ComponentStart(start) => start,
            other => panic!("expected component start, got {other:?}"),
        }
    }

    fn pos(line: u32) -> Position {
        Position::new("t.ego", line)
    }

    mod stepping {
        use super::*;

        #[test]
        fn next_block_advances_cursor_pos() {
            let mut scanner = Scanner::new("a\n<%= x %>\nb", "t.ego");
            assert_eq!(scanner.cursor_pos(), pos(1));
            assert!(matches!(scanner.next_block(), Ok(Some(Block::Text { .. }))));
            assert_eq!(scanner.cursor_pos(), pos(2));
            assert!(matches!(scanner.next_block(), Ok(Some(Block::Print { .. }))));
            assert!(matches!(scanner.next_block(), Ok(Some(Block::Text { .. }))));
            assert_eq!(scanner.cursor_pos(), pos(3));
            assert_eq!(scanner.next_block(), Ok(None));
        }
    }

    mod text {
        use super::*;

        #[test]
        fn plain_text_is_one_block() {
            let block = single("hello world");
            assert_eq!(block, Block::text("hello world", pos(1), Span::new(0, 11)));
        }

        #[test]
        fn lone_angle_at_end() {
            let blocks = scan_all("a<").unwrap();
            assert_eq!(blocks.len(), 2);
            assert_eq!(blocks[1], Block::text("<", pos(1), Span::new(1, 1)));
        }

        #[test]
        fn html_tags_are_text() {
            let blocks = scan_all("<p>hi</p>").unwrap();
            let contents: Vec<_> = blocks
                .iter()
                .map(|b| match b {
                    Block::Text { content, .. } => content.as_str(),
                    other => panic!("unexpected {other:?}"),
                })
                .collect();
            assert_eq!(contents, vec!["<p>hi", "</p>"]);
        }

        #[test]
        fn empty_source_yields_nothing() {
            assert_eq!(scan_all("").unwrap(), vec![]);
        }
    }

    mod directives {
        use super::*;

        #[test]
        fn code() {
            let block = single("<% x := 1 %>");
            assert_eq!(
                block,
                Block::Code {
                    content: " x := 1 ".to_string(),
                    trim: Trim::default(),
                    pos: pos(1),
                    span: Span::new(0, 12),
                }
            );
        }

        #[test]
        fn raw_print() {
            let Block::RawPrint { content, .. } = single("<%== x %>") else {
                panic!("expected raw print");
            };
            assert_eq!(content, " x ");
        }

        #[test]
        fn print() {
            let Block::Print { content, trim, .. } = single("<%= user.Name %>") else {
                panic!("expected print");
            };
            assert_eq!(content, " user.Name ");
            assert_eq!(trim, Trim::default());
        }

        #[test]
        fn trim_flags() {
            let Block::Print { content, trim, .. } = single("<%-= x -%>") else {
                panic!("expected print");
            };
            assert_eq!(content, " x ");
            assert_eq!(
                trim,
                Trim {
                    left: true,
                    right: true
                }
            );

            let Block::RawPrint { trim, .. } = single("<%-== x %>") else {
                panic!("expected raw print");
            };
            assert!(trim.left && !trim.right);

            let Block::Code { trim, .. } = single("<% } -%>") else {
                panic!("expected code");
            };
            assert!(!trim.left && trim.right);
        }

        #[test]
        fn declaration_and_header() {
            let blocks = scan_all("<%% import \"strings\" %%><%! func Hello(w io.Writer) error %>")
                .unwrap();
            assert!(matches!(
                &blocks[0],
                Block::Header { content, .. } if content == " import \"strings\" "
            ));
            assert!(matches!(
                &blocks[1],
                Block::Declaration { content, .. } if content == " func Hello(w io.Writer) error "
            ));
        }

        #[test]
        fn lone_percent_is_content() {
            let Block::Code { content, .. } = single("<% x := 10 % 3 %>") else {
                panic!("expected code");
            };
            assert_eq!(content, " x := 10 % 3 ");
        }

        #[test]
        fn percent_pair_in_header_is_content() {
            let Block::Header { content, .. } = single("<%% a %% b %%>") else {
                panic!("expected header");
            };
            assert_eq!(content, " a %% b ");
        }

        #[test]
        fn unterminated_is_eof_at_open() {
            assert_eq!(scan_all("<%"), Err(TemplateError::eof(&pos(1))));
            assert_eq!(
                scan_all("line\n<%= x"),
                Err(TemplateError::eof(&pos(2)))
            );
            assert_eq!(
                scan_all("<%% import \"a\""),
                Err(TemplateError::eof(&pos(1)))
            );
        }
    }

    mod positions {
        use super::*;

        #[test]
        fn multiline_directive_advances_lines() {
            let blocks = scan_all("a\n<% if x {\n  y()\n} %>\nb").unwrap();
            let lines: Vec<u32> = blocks.iter().map(|b| b.position().line()).collect();
            assert_eq!(lines, vec![1, 2, 4]);
        }

        #[test]
        fn spans_cover_source() {
            let source = "ab<%= x %>cd";
            let blocks = scan_all(source).unwrap();
            let slices: Vec<_> = blocks
                .iter()
                .map(|b| b.span().slice(source).unwrap())
                .collect();
            assert_eq!(slices, vec!["ab", "<%= x %>", "cd"]);
        }
    }

    mod tags {
        use super::*;

        #[test]
        fn component_with_field() {
            let blocks = scan_all("<ego:Widget Count=3></ego:Widget>").unwrap();
            assert_eq!(blocks.len(), 2);
            let Block::ComponentStart(start) = &blocks[0] else {
                panic!("expected component start");
            };
            assert_eq!(start.package, "");
            assert_eq!(start.name, "Widget");
            assert!(!start.closed);
            assert_eq!(start.fields.len(), 1);
            assert_eq!(start.fields[0].name, "Count");
            assert_eq!(start.fields[0].value, "3");
            assert!(matches!(
                &blocks[1],
                Block::ComponentEnd(end) if end.name == "Widget" && end.package.is_empty()
            ));
        }

        #[test]
        fn fields_and_attrs_by_case() {
            let start = component("<ego:Link URL=u class=\"btn\" data-id=id/>");
            assert!(start.closed);
            assert_eq!(start.fields.len(), 1);
            let attrs: Vec<_> = start.attrs.iter().map(|a| a.name.as_str()).collect();
            assert_eq!(attrs, vec!["class", "data-id"]);
        }

        #[test]
        fn boolean_shorthand() {
            let start = component("<ego:Input Disabled checked name=n>");
            assert_eq!(start.fields[0].name, "Disabled");
            assert_eq!(start.fields[0].value, "true");
            assert_eq!(start.attrs[0].name, "checked");
            assert_eq!(start.attrs[0].value, "true");
            assert_eq!(start.attrs[1].value, "n");
        }

        #[test]
        fn boolean_shorthand_before_self_close() {
            let start = component("<ego:Input Required/>");
            assert_eq!(start.fields[0].value, "true");
            assert!(start.closed);
        }

        #[test]
        fn composite_literal_value_spans_whitespace() {
            let start = component("<ego:List Items=[]int{1, 2, 3} Title=\"a > b\">");
            assert_eq!(start.fields[0].value, "[]int{1, 2, 3}");
            assert_eq!(start.fields[1].value, "\"a > b\"");
        }

        #[test]
        fn value_positions_track_lines() {
            let start = component("<ego:Card\n  Title=t\n  Body=b>");
            assert_eq!(start.fields[0].name_pos, pos(2));
            assert_eq!(start.fields[1].value_pos, pos(3));
        }

        #[test]
        fn qualified_names() {
            let start = component("<ego:ui.Button>");
            assert_eq!(start.package, "ui");
            assert_eq!(start.name, "Button");

            let start = component("<ui:Button>");
            assert_eq!(start.package, "ui");
            assert_eq!(start.name, "Button");
        }

        #[test]
        fn dotted_name_needs_local_prefix() {
            let err = scan_all("<ui:pkg.Button>").unwrap_err();
            assert!(matches!(err, TemplateError::Syntax { .. }));
        }

        #[test]
        fn attr_tags() {
            let blocks = scan_all("<ego::Header>x</ego::Header >").unwrap();
            assert!(matches!(&blocks[0], Block::AttrStart(s) if s.name == "Header"));
            assert!(matches!(&blocks[2], Block::AttrEnd(e) if e.name == "Header"));
        }

        #[test]
        fn not_a_tag_when_name_runs_on() {
            let blocks = scan_all("<ego:Widget-x>").unwrap();
            assert!(blocks.iter().all(Block::is_text));
        }

        #[test]
        fn text_only_scanner_ignores_tags() {
            let blocks: Vec<_> = Scanner::new("<ego:Widget/><%= x %>", "t.ego")
                .text_only()
                .collect::<Result<_, _>>()
                .unwrap();
            assert!(blocks[0].is_text());
            assert!(matches!(blocks[1], Block::Print { .. }));
        }
    }

    mod tag_errors {
        use super::*;

        fn syntax_message(source: &str) -> String {
            match scan_all(source) {
                Err(TemplateError::Syntax { message, .. }) => message,
                other => panic!("expected syntax error, got {other:?}"),
            }
        }

        #[test]
        fn malformed_identifier() {
            assert_eq!(syntax_message("<ego:X 1a=2>"), "malformed identifier");
        }

        #[test]
        fn missing_equals() {
            assert_eq!(syntax_message("<ego:X a \"b\">"), "expected '='");
        }

        #[test]
        fn invalid_expression() {
            assert_eq!(syntax_message("<ego:X A=1)>"), "invalid expression");
        }

        #[test]
        fn incomplete_expression_at_value_position() {
            let err = scan_all("<ego:X\n A=[]int{1,").unwrap_err();
            assert_eq!(
                err,
                TemplateError::syntax("incomplete expression", &pos(2))
            );
        }

        #[test]
        fn eof_inside_tag() {
            assert_eq!(
                scan_all("<ego:X A=1 "),
                Err(TemplateError::eof(&pos(1)))
            );
            assert_eq!(scan_all("</ego:X "), Err(TemplateError::eof(&pos(1))));
        }

        #[test]
        fn slash_without_close() {
            assert_eq!(syntax_message("<ego:X / >"), "expected '>' after '/'");
        }

        #[test]
        fn iterator_stops_after_error() {
            let mut scanner = Scanner::new("<ego:X 1=2> tail", "t.ego");
            assert!(scanner.next().unwrap().is_err());
            assert!(scanner.next().is_none());
        }
    }

    mod peek {
        use super::*;

        #[test]
        fn recognizes_each_kind() {
            let cases = [
                ("<ego:A>", TagKind::ComponentStart),
                ("</ego:A>", TagKind::ComponentEnd),
                ("<ego::A>", TagKind::AttrStart),
                ("</ego::A>", TagKind::AttrEnd),
            ];
            for (source, kind) in cases {
                let tag = peek_tag(source, 0).unwrap();
                assert_eq!(tag.kind, kind, "{source}");
                assert_eq!(tag.prefix, "ego");
                assert_eq!(tag.name, "A");
                assert_eq!(tag.len, source.len() - 1);
            }
        }

        #[test]
        fn rejects_non_tags() {
            for source in ["<p>", "<%= x %>", "<a:>", "<http://x>", "</ego:A/>", "<ego:A"] {
                assert_eq!(peek_tag(source, 0), None, "{source}");
            }
        }

        #[test]
        fn does_not_move_the_scanner() {
            let scanner = Scanner::new("<ego:A>", "t.ego");
            assert!(peek_tag(scanner.view(), 0).is_some());
            assert_eq!(scanner.cursor, 0);
        }
    }

    mod passthrough {
        use super::*;

        fn passthrough(source: &str, open_len: usize) -> Result<Vec<Block>, TemplateError> {
            let mut scanner = Scanner::new(source, "t.ego");
            scanner.advance_to(open_len);
            scanner.scan_passthrough("v", "rect", &pos(1))
        }

        #[test]
        fn consumes_through_close_tag() {
            let source = "<v:rect><ego:Widget/></v:rect>after";
            let blocks = passthrough(source, 8).unwrap();
            assert_eq!(
                blocks,
                vec![Block::text(
                    "<ego:Widget/></v:rect>",
                    pos(1),
                    Span::new(8, 22)
                )]
            );
        }

        #[test]
        fn counts_nested_opens() {
            let source = "<v:rect><v:rect a=\">\"><v:rect/></v:rect></v:rect>!";
            let blocks = passthrough(source, 8).unwrap();
            let Block::Text { content, .. } = &blocks[0] else {
                panic!("expected text");
            };
            assert_eq!(content, "<v:rect a=\">\"><v:rect/></v:rect></v:rect>");
        }

        #[test]
        fn keeps_directives() {
            let source = "<v:rect>a<%= x %>b</v:rect>";
            let blocks = passthrough(source, 8).unwrap();
            assert_eq!(blocks.len(), 3);
            assert!(matches!(blocks[1], Block::Print { .. }));
        }

        #[test]
        fn unclosed_is_error_at_open() {
            let err = passthrough("<v:rect>\nno close", 8).unwrap_err();
            assert_eq!(err, TemplateError::syntax("unclosed <v:rect>", &pos(1)));
        }
    }

    mod fragment {
        use super::*;

        #[test]
        fn rescans_subrange_as_text() {
            let source = "xx\n<v:rect a=b>";
            let scanner = Scanner::new(source, "t.ego");
            let blocks: Vec<_> = scanner
                .fragment(Span::new(3, 12), &pos(2))
                .collect::<Result<_, _>>()
                .unwrap();
            assert_eq!(
                blocks,
                vec![Block::text("<v:rect a=b>", pos(2), Span::new(3, 12))]
            );
        }
    }

    mod oracle {
        use super::*;

        struct UpToSpace;

        impl ExpressionOracle for UpToSpace {
            fn check(&self, text: &str) -> ExprStatus {
                if text.contains(' ') {
                    ExprStatus::Valid
                } else {
                    ExprStatus::Incomplete
                }
            }
        }

        #[test]
        fn injected_oracle_decides_boundaries() {
            let oracle = UpToSpace;
            let blocks: Vec<_> = Scanner::new("<ego:X A=a b>", "t.ego")
                .with_oracle(&oracle)
                .collect::<Result<_, _>>()
                .unwrap();
            let Block::ComponentStart(start) = &blocks[0] else {
                panic!("expected component start");
            };
            assert_eq!(start.fields[0].value, "a b");
        }
    }
}
