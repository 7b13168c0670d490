use rustc_hash::FxHashSet;

use crate::block::normalize;
use crate::block::AttrStart;
use crate::block::Block;
use crate::block::ComponentStart;
use crate::error::TemplateError;
use crate::scanner::Scanner;
use crate::template::Template;

/// XML namespace aliases in scope. Tags whose package is one of these are
/// foreign markup, not components.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Namespaces(FxHashSet<String>);

impl Namespaces {
    #[must_use]
    pub fn contains(&self, alias: &str) -> bool {
        self.0.contains(alias)
    }

    /// A copy of this set with `aliases` added.
    #[must_use]
    pub fn extended<'a>(&self, aliases: impl IntoIterator<Item = &'a str>) -> Self {
        let mut next = self.clone();
        next.0.extend(aliases.into_iter().map(str::to_string));
        next
    }
}

/// Aliases declared by `xmlns:alias` occurrences in literal text.
fn xmlns_aliases(text: &str) -> impl Iterator<Item = &str> {
    const MARKER: &[u8] = b"xmlns:";
    memchr::memmem::find_iter(text.as_bytes(), MARKER).filter_map(move |at| {
        let rest = &text[at + MARKER.len()..];
        let len = rest
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
            .count();
        (len > 0).then(|| &rest[..len])
    })
}

/// Bring `xmlns:` aliases written in a text block into scope for the blocks
/// that follow it.
fn declare_from_text(namespaces: &mut Namespaces, block: &Block) {
    let Block::Text { content, .. } = block else {
        return;
    };
    let aliases: Vec<&str> = xmlns_aliases(content).collect();
    if !aliases.is_empty() {
        *namespaces = namespaces.extended(aliases);
    }
}

/// Builds the block tree of one template from a scanner's flat stream.
pub struct Parser<'src> {
    scanner: Scanner<'src>,
}

impl<'src> Parser<'src> {
    #[must_use]
    pub fn new(scanner: Scanner<'src>) -> Self {
        Self { scanner }
    }

    pub fn parse(mut self) -> Result<Template, TemplateError> {
        let path = self.scanner.path().to_string();
        let mut namespaces = Namespaces::default();
        let mut blocks = Vec::new();

        while let Some(block) = self.scanner.next_block()? {
            declare_from_text(&mut namespaces, &block);
            match block {
                Block::ComponentStart(start) => {
                    blocks.extend(self.parse_component(start, &namespaces)?);
                }
                Block::ComponentEnd(end) => {
                    return Err(TemplateError::syntax(
                        format!("unexpected {}", end.component_tag()),
                        &end.pos,
                    ));
                }
                Block::AttrStart(slot) => {
                    return Err(TemplateError::syntax(
                        format!("unexpected {} outside a component", slot.tag()),
                        &slot.pos,
                    ));
                }
                Block::AttrEnd(end) => {
                    return Err(TemplateError::syntax(
                        format!("unexpected {}", end.attr_tag()),
                        &end.pos,
                    ));
                }
                other => blocks.push(other),
            }
        }

        let blocks = normalize(blocks);
        tracing::trace!(path = %path, blocks = blocks.len(), "parsed template");
        Ok(Template::new(path, blocks))
    }

    /// Parse everything up to the end tag matching `start`.
    ///
    /// Returns the finished component, or the raw text of the whole tag when
    /// its package is a namespace in scope.
    fn parse_component(
        &mut self,
        mut start: ComponentStart,
        namespaces: &Namespaces,
    ) -> Result<Vec<Block>, TemplateError> {
        let mut namespaces = namespaces.extended(start.declared_namespaces());

        if !start.package.is_empty() && namespaces.contains(&start.package) {
            return self.passthrough(&start);
        }
        if start.closed {
            return Ok(vec![Block::ComponentStart(start)]);
        }

        let mut children = Vec::new();
        loop {
            let Some(block) = self.scanner.next_block()? else {
                return Err(TemplateError::syntax(
                    format!("unclosed {}", start.tag()),
                    &start.pos,
                ));
            };
            declare_from_text(&mut namespaces, &block);
            match block {
                Block::ComponentStart(nested) => {
                    children.extend(self.parse_component(nested, &namespaces)?);
                }
                Block::AttrStart(slot) => {
                    let slot = self.parse_attr(slot, &namespaces)?;
                    start.attr_blocks.push(slot);
                }
                Block::ComponentEnd(end) if start.matches(&end) => break,
                Block::ComponentEnd(end) => {
                    return Err(TemplateError::syntax(
                        format!(
                            "mismatched tags: {} closed by {}",
                            start.tag(),
                            end.component_tag()
                        ),
                        &end.pos,
                    ));
                }
                Block::AttrEnd(end) => {
                    return Err(TemplateError::syntax(
                        format!("unexpected {} inside {}", end.attr_tag(), start.tag()),
                        &end.pos,
                    ));
                }
                Block::Declaration { pos, .. } => {
                    return Err(TemplateError::syntax(
                        format!("declaration inside {}", start.tag()),
                        &pos,
                    ));
                }
                Block::Header { pos, .. } => {
                    return Err(TemplateError::syntax(
                        format!("header inside {}", start.tag()),
                        &pos,
                    ));
                }
                other => children.push(other),
            }
        }

        start.children = normalize(children);
        Ok(vec![Block::ComponentStart(start)])
    }

    fn parse_attr(
        &mut self,
        mut slot: AttrStart,
        namespaces: &Namespaces,
    ) -> Result<AttrStart, TemplateError> {
        let mut namespaces = namespaces.clone();
        let mut children = Vec::new();
        loop {
            let Some(block) = self.scanner.next_block()? else {
                return Err(TemplateError::syntax(
                    format!("unclosed {}", slot.tag()),
                    &slot.pos,
                ));
            };
            declare_from_text(&mut namespaces, &block);
            match block {
                Block::ComponentStart(nested) => {
                    children.extend(self.parse_component(nested, &namespaces)?);
                }
                Block::AttrEnd(end) if slot.matches(&end) => break,
                Block::AttrEnd(end) => {
                    return Err(TemplateError::syntax(
                        format!("mismatched tags: {} closed by {}", slot.tag(), end.attr_tag()),
                        &end.pos,
                    ));
                }
                Block::AttrStart(nested) => {
                    return Err(TemplateError::syntax(
                        format!("unexpected {} inside {}", nested.tag(), slot.tag()),
                        &nested.pos,
                    ));
                }
                Block::ComponentEnd(end) => {
                    return Err(TemplateError::syntax(
                        format!("unexpected {} inside {}", end.component_tag(), slot.tag()),
                        &end.pos,
                    ));
                }
                Block::Declaration { pos, .. } | Block::Header { pos, .. } => {
                    return Err(TemplateError::syntax(
                        format!("unexpected preamble inside {}", slot.tag()),
                        &pos,
                    ));
                }
                other => children.push(other),
            }
        }

        slot.children = normalize(children);
        Ok(slot)
    }

    /// Re-read a foreign tag as text: the open tag from its own span, then
    /// the raw source through its close tag.
    fn passthrough(&mut self, start: &ComponentStart) -> Result<Vec<Block>, TemplateError> {
        tracing::trace!(
            package = %start.package,
            name = %start.name,
            "namespace passthrough"
        );
        let mut blocks = self
            .scanner
            .fragment(start.span, &start.pos)
            .collect::<Result<Vec<_>, _>>()?;
        if !start.closed {
            blocks.extend(
                self.scanner
                    .scan_passthrough(&start.package, &start.name, &start.pos)?,
            );
        }
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use ego_source::Position;

    use super::*;
    use crate::parse;

    fn blocks(source: &str) -> Vec<Block> {
        parse(source, "t.ego").unwrap().blocks
    }

    fn syntax_message(source: &str) -> String {
        match parse(source, "t.ego") {
            Err(TemplateError::Syntax { message, .. }) => message,
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    fn only_component(source: &str) -> ComponentStart {
        let mut blocks = blocks(source);
        assert_eq!(blocks.len(), 1, "{blocks:?}");
        match blocks.remove(0) {
            Block::ComponentStart(start) => start,
            other => panic!("expected component, got {other:?}"),
        }
    }

    mod nesting {
        use super::*;

        #[test]
        fn empty_component() {
            let start = only_component("<ego:Widget Count=3></ego:Widget>");
            assert_eq!(start.name, "Widget");
            assert_eq!(start.fields.len(), 1);
            assert_eq!(start.fields[0].name, "Count");
            assert_eq!(start.fields[0].value, "3");
            assert!(!start.closed);
            assert!(start.children.is_empty());
        }

        #[test]
        fn children_are_nested_and_normalized() {
            let start = only_component("<ego:Box>a<b>c<%= x %>d</ego:Box>");
            assert_eq!(start.children.len(), 3);
            assert!(matches!(
                &start.children[0],
                Block::Text { content, .. } if content == "a<b>c"
            ));
        }

        #[test]
        fn nested_components() {
            let start = only_component("<ego:Outer><ego:Inner/>x<ego:Inner></ego:Inner></ego:Outer>");
            let names: Vec<_> = start
                .children
                .iter()
                .filter_map(|b| match b {
                    Block::ComponentStart(s) => Some(s.name.as_str()),
                    _ => None,
                })
                .collect();
            assert_eq!(names, vec!["Inner", "Inner"]);
        }

        #[test]
        fn attr_slots_are_collected() {
            let start = only_component(
                "<ego:Card><ego::Header>Title</ego::Header>body<ego::Footer><%= n %></ego::Footer></ego:Card>",
            );
            let slots: Vec<_> = start.attr_blocks.iter().map(|s| s.name.as_str()).collect();
            assert_eq!(slots, vec!["Header", "Footer"]);
            assert_eq!(start.children.len(), 1);
            assert!(matches!(
                &start.attr_blocks[0].children[0],
                Block::Text { content, .. } if content == "Title"
            ));
        }

        #[test]
        fn component_inside_slot() {
            let start = only_component("<ego:Card><ego::Body><ego:Icon/></ego::Body></ego:Card>");
            assert!(matches!(
                start.attr_blocks[0].children[0],
                Block::ComponentStart(_)
            ));
        }

        #[test]
        fn text_around_component_stays_top_level() {
            let blocks = blocks("before<ego:Box>in</ego:Box>after");
            assert_eq!(blocks.len(), 3);
            assert!(blocks[0].is_text() && blocks[2].is_text());
        }

        #[test]
        fn package_qualified_component() {
            let start = only_component("<ui:Button></ui:Button>");
            assert_eq!(start.type_name(), "ui.Button");
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn mismatched_end_names_both_tags() {
            let message = syntax_message("<ego:A></ego:B>");
            assert!(message.contains("<ego:A>"), "{message}");
            assert!(message.contains("</ego:B>"), "{message}");
        }

        #[test]
        fn mismatched_package() {
            let message = syntax_message("<ui:A></ego:A>");
            assert_eq!(message, "mismatched tags: <ui:A> closed by </ego:A>");
        }

        #[test]
        fn case_sensitive_match() {
            assert!(syntax_message("<ego:Box></ego:box>").starts_with("mismatched"));
        }

        #[test]
        fn unclosed_component_at_open_position() {
            let err = parse("x\n<ego:Box>\nbody", "t.ego").unwrap_err();
            assert_eq!(
                err,
                TemplateError::syntax("unclosed <ego:Box>", &Position::new("t.ego", 2))
            );
        }

        #[test]
        fn stray_tags_at_top_level() {
            assert_eq!(syntax_message("</ego:Box>"), "unexpected </ego:Box>");
            assert_eq!(
                syntax_message("<ego::Slot>"),
                "unexpected <ego::Slot> outside a component"
            );
            assert_eq!(syntax_message("</ego::Slot>"), "unexpected </ego::Slot>");
        }

        #[test]
        fn slot_rules() {
            assert_eq!(
                syntax_message("<ego:C><ego::A><ego::B></ego::B></ego::A></ego:C>"),
                "unexpected <ego::B> inside <ego::A>"
            );
            assert_eq!(
                syntax_message("<ego:C><ego::A></ego:C>"),
                "unexpected </ego:C> inside <ego::A>"
            );
            assert_eq!(
                syntax_message("<ego:C><ego::A></ego::B></ego:C>"),
                "mismatched tags: <ego::A> closed by </ego::B>"
            );
            assert_eq!(syntax_message("<ego:C><ego::A>"), "unclosed <ego::A>");
        }

        #[test]
        fn stray_attr_end_inside_component() {
            assert_eq!(
                syntax_message("<ego:C></ego::A></ego:C>"),
                "unexpected </ego::A> inside <ego:C>"
            );
        }

        #[test]
        fn declaration_inside_component() {
            assert_eq!(
                syntax_message("<ego:C><%! func F() error %></ego:C>"),
                "declaration inside <ego:C>"
            );
        }

        #[test]
        fn scanner_errors_propagate() {
            assert!(matches!(
                parse("<%= x", "t.ego"),
                Err(TemplateError::UnexpectedEndOfInput { .. })
            ));
        }
    }

    mod passthrough {
        use super::*;

        #[test]
        fn own_xmlns_attribute_makes_whole_tag_text() {
            let source = r#"<v:rect xmlns:v="urn:x"><ego:Widget/></v:rect>"#;
            let blocks = blocks(source);
            assert_eq!(blocks.len(), 1, "{blocks:?}");
            let Block::Text { content, pos, .. } = &blocks[0] else {
                panic!("expected text");
            };
            assert_eq!(content, source);
            assert_eq!(pos.line(), 1);
        }

        #[test]
        fn namespace_declared_in_text() {
            let source = "<html xmlns:v=\"urn:x\">\n<v:oval/>\n<v:rect>\n<b>hi</b>\n</v:rect>\n</html>";
            let blocks = blocks(source);
            assert_eq!(blocks.len(), 1);
            assert!(matches!(&blocks[0], Block::Text { content, .. } if content == source));
        }

        #[test]
        fn undeclared_prefix_is_a_component() {
            let blocks = blocks("<v:rect></v:rect>");
            assert!(matches!(blocks[0], Block::ComponentStart(_)));
        }

        #[test]
        fn directives_inside_passthrough_survive() {
            let blocks = blocks(r#"<v:rect xmlns:v="urn:x"><%= color %></v:rect>"#);
            assert_eq!(blocks.len(), 3);
            assert!(matches!(blocks[1], Block::Print { .. }));
        }

        #[test]
        fn passthrough_inside_component_children() {
            let start = only_component(
                r#"<ego:Frame xmlns:v="urn:x"><v:line/>text</ego:Frame>"#,
            );
            assert_eq!(start.children.len(), 1);
            assert!(matches!(
                &start.children[0],
                Block::Text { content, .. } if content == "<v:line/>text"
            ));
        }

        #[test]
        fn namespace_declared_in_component_children() {
            let start =
                only_component(r#"<ego:Layout><svg xmlns:v="urn:x"><v:rect/></svg></ego:Layout>"#);
            assert_eq!(start.children.len(), 1, "{:?}", start.children);
            assert!(matches!(
                &start.children[0],
                Block::Text { content, .. } if content == r#"<svg xmlns:v="urn:x"><v:rect/></svg>"#
            ));
        }

        #[test]
        fn namespace_declared_in_slot_children() {
            let start = only_component(
                r#"<ego:Card><ego::Footer><svg xmlns:v="urn:x"><v:rect></v:rect></svg></ego::Footer></ego:Card>"#,
            );
            let children = &start.attr_blocks[0].children;
            assert_eq!(children.len(), 1, "{children:?}");
            assert!(matches!(
                &children[0],
                Block::Text { content, .. }
                    if content == r#"<svg xmlns:v="urn:x"><v:rect></v:rect></svg>"#
            ));
        }

        #[test]
        fn namespace_from_children_does_not_leak_to_parent_siblings() {
            let blocks = blocks(r#"<ego:Box><svg xmlns:v="urn:x"></svg></ego:Box><v:rect/>"#);
            assert_eq!(blocks.len(), 2, "{blocks:?}");
            assert!(matches!(&blocks[1], Block::ComponentStart(start) if start.package == "v"));
        }

        #[test]
        fn unclosed_passthrough() {
            assert_eq!(
                syntax_message(r#"<v:rect xmlns:v="urn:x">open"#),
                "unclosed <v:rect>"
            );
        }
    }

    mod namespaces {
        use super::*;

        #[test]
        fn extended_does_not_touch_original() {
            let base = Namespaces::default();
            let next = base.extended(["v", "o"]);
            assert!(!base.contains("v"));
            assert!(next.contains("v") && next.contains("o"));
        }

        #[test]
        fn aliases_from_text() {
            let aliases: Vec<_> =
                xmlns_aliases(r#"<html xmlns="a" xmlns:v="b" xmlns:o="c">"#).collect();
            assert_eq!(aliases, vec!["v", "o"]);
        }
    }
}
