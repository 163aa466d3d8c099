//! Markdown documents as element trees.
//!
//! Markdown is parsed with pulldown-cmark and mirrored as the element tree a
//! renderer would produce (`p`, `h2`, `ul > li`, `pre > code`, ...). Every
//! element gets a synthetic layout box derived from its source lines, so the
//! position factor of scoring sees content move when lines are inserted above it.

use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};

use super::{BoundingBox, DocumentTree, ElementTree, NodeId};

/// Height of one source line in document units.
pub const LINE_HEIGHT: f64 = 20.0;
/// Horizontal indent per nesting level in document units.
pub const INDENT_WIDTH: f64 = 24.0;
/// Width of the synthetic page in document units.
pub const PAGE_WIDTH: f64 = 800.0;

fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_HEADING_ATTRIBUTES
}

/// An open element. Content is appended to `inner`, which is the `code` child
/// for `pre > code` and the element itself otherwise.
struct Frame {
    inner: NodeId,
}

struct Builder<'s> {
    tree: ElementTree,
    stack: Vec<Frame>,
    line_starts: Vec<usize>,
    source: &'s str,
    in_table_head: bool,
}

impl<'s> Builder<'s> {
    fn new(source: &'s str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(index, _)| index + 1))
            .collect();
        Self {
            tree: ElementTree::new(),
            stack: Vec::new(),
            line_starts,
            source,
            in_table_head: false,
        }
    }

    fn current(&self) -> NodeId {
        self.stack
            .last()
            .map_or_else(|| self.tree.root(), |frame| frame.inner)
    }

    fn line_of(&self, offset: usize) -> usize {
        self.line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }

    fn layout(&mut self, node: NodeId, range: &Range<usize>) {
        let first_line = self.line_of(range.start);
        let last_byte = range.end.saturating_sub(1).max(range.start);
        let last_line = self.line_of(last_byte.min(self.source.len()));
        let depth = self.stack.len() as f64;
        let left = depth * INDENT_WIDTH;
        self.tree.set_bounding_box(
            node,
            BoundingBox::new(
                first_line as f64 * LINE_HEIGHT,
                left,
                (PAGE_WIDTH - left).max(0.0),
                (last_line - first_line + 1) as f64 * LINE_HEIGHT,
            ),
        );
    }

    fn leaf(&mut self, tag: &str, range: &Range<usize>) -> NodeId {
        let parent = self.current();
        let node = self.tree.append_element(parent, tag);
        self.layout(node, range);
        node
    }

    fn start(&mut self, tag: Tag<'_>, range: &Range<usize>) {
        let parent = self.current();
        let outer = self.tree.append_element(parent, element_name(&tag, self.in_table_head));
        self.layout(outer, range);
        let mut inner = outer;

        match tag {
            Tag::Heading {
                id, classes, attrs, ..
            } => {
                if let Some(id) = id {
                    self.tree.set_attribute(outer, "id", &id);
                }
                if !classes.is_empty() {
                    let classes: Vec<&str> = classes.iter().map(|class| class.as_ref()).collect();
                    self.tree.set_attribute(outer, "class", &classes.join(" "));
                }
                for (name, value) in attrs {
                    self.tree
                        .set_attribute(outer, &name, value.as_deref().unwrap_or(""));
                }
            }
            Tag::CodeBlock(kind) => {
                inner = self.tree.append_element(outer, "code");
                self.layout(inner, range);
                if let CodeBlockKind::Fenced(info) = kind
                    && let Some(lang) = info.split_whitespace().next()
                {
                    self.tree
                        .set_attribute(inner, "class", &format!("language-{lang}"));
                }
            }
            Tag::List(Some(first)) if first != 1 => {
                self.tree.set_attribute(outer, "start", &first.to_string());
            }
            Tag::TableHead => self.in_table_head = true,
            Tag::Link {
                dest_url, title, ..
            } => {
                self.tree.set_attribute(outer, "href", &dest_url);
                if !title.is_empty() {
                    self.tree.set_attribute(outer, "title", &title);
                }
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                self.tree.set_attribute(outer, "src", &dest_url);
                if !title.is_empty() {
                    self.tree.set_attribute(outer, "title", &title);
                }
            }
            Tag::FootnoteDefinition(label) => {
                self.tree.set_attribute(outer, "class", "footnote-definition");
                self.tree.set_attribute(outer, "id", &label);
            }
            _ => {}
        }

        self.stack.push(Frame { inner });
    }

    fn end(&mut self) {
        if let Some(frame) = self.stack.pop()
            && self.tree.tag_name(frame.inner) == "thead"
        {
            self.in_table_head = false;
        }
    }

    fn event(&mut self, event: Event<'_>, range: Range<usize>) {
        match event {
            Event::Start(tag) => self.start(tag, &range),
            Event::End(_) => self.end(),
            Event::Text(text) => {
                let parent = self.current();
                self.tree.append_text(parent, &text);
            }
            Event::Code(code) => {
                let node = self.leaf("code", &range);
                self.tree.append_text(node, &code);
            }
            Event::SoftBreak => {
                let parent = self.current();
                self.tree.append_text(parent, "\n");
            }
            Event::HardBreak => {
                self.leaf("br", &range);
            }
            Event::Rule => {
                self.leaf("hr", &range);
            }
            Event::TaskListMarker(checked) => {
                let node = self.leaf("input", &range);
                self.tree.set_attribute(node, "type", "checkbox");
                if checked {
                    self.tree.set_attribute(node, "checked", "");
                }
            }
            Event::FootnoteReference(label) => {
                let node = self.leaf("sup", &range);
                self.tree.set_attribute(node, "class", "footnote-reference");
                self.tree.append_text(node, &label);
            }
            // Raw HTML and math are not mirrored.
            _ => {}
        }
    }
}

fn element_name(tag: &Tag<'_>, in_table_head: bool) -> &'static str {
    match tag {
        Tag::Paragraph => "p",
        Tag::Heading { level, .. } => match level {
            HeadingLevel::H1 => "h1",
            HeadingLevel::H2 => "h2",
            HeadingLevel::H3 => "h3",
            HeadingLevel::H4 => "h4",
            HeadingLevel::H5 => "h5",
            HeadingLevel::H6 => "h6",
        },
        Tag::BlockQuote(_) => "blockquote",
        Tag::CodeBlock(_) => "pre",
        Tag::List(Some(_)) => "ol",
        Tag::List(None) => "ul",
        Tag::Item => "li",
        Tag::Table(_) => "table",
        Tag::TableHead => "thead",
        Tag::TableRow => "tr",
        Tag::TableCell if in_table_head => "th",
        Tag::TableCell => "td",
        Tag::Emphasis => "em",
        Tag::Strong => "strong",
        Tag::Strikethrough => "del",
        Tag::Link { .. } => "a",
        Tag::Image { .. } => "img",
        Tag::DefinitionList => "dl",
        Tag::DefinitionListTitle => "dt",
        Tag::DefinitionListDefinition => "dd",
        _ => "div",
    }
}

impl ElementTree {
    /// Parse Markdown into an element tree with line-derived geometry.
    pub fn from_markdown(source: &str) -> Self {
        let mut builder = Builder::new(source);
        for (event, range) in Parser::new_ext(source, markdown_options()).into_offset_iter() {
            builder.event(event, range);
        }
        builder.tree
    }
}
