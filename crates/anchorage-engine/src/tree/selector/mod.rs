//! Structural path selectors.
//!
//! A path is a chain of compounds joined by ` > `, for example
//! `section > ul.tasks > li:nth-of-type(3)` or `#intro > p`. Each compound is
//! either an id (`#name`) or a tag with optional classes and an
//! `:nth-of-type(k)` rank. Identifiers use CSS backslash escaping.
//!
//! Paths are anchored: unless the first compound is an id, it must match an
//! element child of the document node, and every later compound must match an
//! element child of the previous match.

mod cursor;

use std::fmt;

use cursor::Cursor;

use super::DocumentTree;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,
    #[error("Unexpected character {found:?} at position {position}")]
    UnexpectedChar { position: usize, found: char },
    #[error("Unexpected end of selector at position {position}")]
    UnexpectedEnd { position: usize },
    #[error("Expected an identifier at position {position}")]
    MissingIdent { position: usize },
    #[error("Unterminated escape at position {position}")]
    UnterminatedEscape { position: usize },
    #[error("Unsupported pseudo-class at position {position}")]
    UnsupportedPseudo { position: usize },
    #[error("Invalid :nth-of-type argument at position {position}")]
    InvalidNth { position: usize },
}

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub nth_of_type: Option<usize>,
}

impl Compound {
    pub fn with_id(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::default()
        }
    }

    fn describing<T: DocumentTree>(tree: &T, node: T::Node) -> Self {
        let (rank, same_tag_count) = tree.same_tag_rank(node);
        Self {
            tag: Some(tree.tag_name(node).to_string()),
            id: None,
            classes: tree
                .class_name(node)
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            nth_of_type: (same_tag_count > 1).then_some(rank),
        }
    }

    fn matches<T: DocumentTree>(&self, tree: &T, node: T::Node) -> bool {
        if !tree.is_element(node) {
            return false;
        }
        if let Some(tag) = &self.tag
            && tree.tag_name(node) != tag
        {
            return false;
        }
        if let Some(id) = &self.id
            && tree.element_id(node) != Some(id.as_str())
        {
            return false;
        }
        if !self.classes.is_empty() {
            let class_name = tree.class_name(node);
            let present: Vec<&str> = class_name.split_whitespace().collect();
            if !self.classes.iter().all(|class| present.contains(&class.as_str())) {
                return false;
            }
        }
        match self.nth_of_type {
            Some(rank) => tree.same_tag_rank(node).0 == rank,
            None => true,
        }
    }

    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.nth_of_type.is_none()
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}", escape_identifier(tag))?,
            None if self.is_empty() => write!(f, "*")?,
            None => {}
        }
        if let Some(id) = &self.id {
            write!(f, "#{}", escape_identifier(id))?;
        }
        for class in &self.classes {
            write!(f, ".{}", escape_identifier(class))?;
        }
        if let Some(rank) = self.nth_of_type {
            write!(f, ":nth-of-type({rank})")?;
        }
        Ok(())
    }
}

/// A parsed path selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub compounds: Vec<Compound>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let mut cur = Cursor::new(input);
        cur.skip_whitespace();
        if cur.eof() {
            return Err(SelectorError::Empty);
        }

        let mut compounds = Vec::new();
        loop {
            compounds.push(parse_compound(&mut cur)?);
            cur.skip_whitespace();
            match cur.peek() {
                None => break,
                Some('>') => {
                    cur.bump();
                    cur.skip_whitespace();
                    if cur.eof() {
                        return Err(SelectorError::UnexpectedEnd { position: cur.pos() });
                    }
                }
                Some(found) => {
                    return Err(SelectorError::UnexpectedChar {
                        position: cur.pos(),
                        found,
                    });
                }
            }
        }
        Ok(Self { compounds })
    }

    /// First element in document order matched by the whole path.
    pub fn find_first<T: DocumentTree>(&self, tree: &T) -> Option<T::Node> {
        let (first, rest) = self.compounds.split_first()?;
        let starts = match &first.id {
            Some(id) => tree.nodes_with_id(id),
            None => tree.element_children(tree.root()),
        };
        starts
            .into_iter()
            .filter(|&node| first.matches(tree, node))
            .find_map(|node| match_below(tree, node, rest))
    }
}

fn match_below<T: DocumentTree>(tree: &T, node: T::Node, rest: &[Compound]) -> Option<T::Node> {
    let Some((next, rest)) = rest.split_first() else {
        return Some(node);
    };
    tree.element_children(node)
        .into_iter()
        .filter(|&child| next.matches(tree, child))
        .find_map(|child| match_below(tree, child, rest))
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, compound) in self.compounds.iter().enumerate() {
            if index > 0 {
                write!(f, " > ")?;
            }
            write!(f, "{compound}")?;
        }
        Ok(())
    }
}

fn parse_compound(cur: &mut Cursor) -> Result<Compound, SelectorError> {
    let start = cur.pos();
    let mut compound = Compound::default();
    let mut universal = false;

    match cur.peek() {
        Some('*') => {
            cur.bump();
            universal = true;
        }
        Some(c) if starts_ident(c) => {
            compound.tag = Some(read_ident(cur)?.to_ascii_lowercase());
        }
        _ => {}
    }

    loop {
        match cur.peek() {
            Some('#') => {
                cur.bump();
                compound.id = Some(read_ident(cur)?);
            }
            Some('.') => {
                cur.bump();
                compound.classes.push(read_ident(cur)?);
            }
            Some(':') => {
                if !cur.starts_with(":nth-of-type(") {
                    return Err(SelectorError::UnsupportedPseudo { position: cur.pos() });
                }
                cur.bump_n(":nth-of-type(".len());
                compound.nth_of_type = Some(read_rank(cur)?);
            }
            _ => break,
        }
    }

    if compound.is_empty() && !universal {
        return Err(match cur.peek() {
            Some(found) => SelectorError::UnexpectedChar {
                position: start,
                found,
            },
            None => SelectorError::UnexpectedEnd { position: start },
        });
    }
    Ok(compound)
}

fn read_rank(cur: &mut Cursor) -> Result<usize, SelectorError> {
    let position = cur.pos();
    let mut digits = String::new();
    while let Some(c) = cur.peek().filter(char::is_ascii_digit) {
        digits.push(c);
        cur.bump();
    }
    if cur.bump() != Some(')') {
        return Err(SelectorError::InvalidNth { position });
    }
    match digits.parse::<usize>() {
        Ok(rank) if rank >= 1 => Ok(rank),
        _ => Err(SelectorError::InvalidNth { position }),
    }
}

fn starts_ident(c: char) -> bool {
    is_ident_char(c) || c == '\\'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

fn read_ident(cur: &mut Cursor) -> Result<String, SelectorError> {
    let position = cur.pos();
    let mut ident = String::new();

    while let Some(c) = cur.peek() {
        if c == '\\' {
            cur.bump();
            ident.push(read_escape(cur)?);
        } else if is_ident_char(c) {
            cur.bump();
            ident.push(c);
        } else {
            break;
        }
    }

    if ident.is_empty() {
        return Err(SelectorError::MissingIdent { position });
    }
    Ok(ident)
}

/// Decode the escape following a backslash.
fn read_escape(cur: &mut Cursor) -> Result<char, SelectorError> {
    let Some(first) = cur.peek() else {
        return Err(SelectorError::UnterminatedEscape { position: cur.pos() });
    };
    if !first.is_ascii_hexdigit() {
        cur.bump();
        return Ok(first);
    }

    let mut hex = String::new();
    while hex.len() < 6
        && let Some(c) = cur.peek().filter(char::is_ascii_hexdigit)
    {
        hex.push(c);
        cur.bump();
    }
    // A single whitespace terminates a hex escape and is consumed with it.
    if cur.peek().is_some_and(char::is_whitespace) {
        cur.bump();
    }
    let code = u32::from_str_radix(&hex, 16).unwrap_or(0xFFFD);
    Ok(char::from_u32(code)
        .filter(|&c| c != '\0')
        .unwrap_or('\u{FFFD}'))
}

/// Escape `value` for use as an identifier inside a path, mirroring `CSS.escape`.
pub fn escape_identifier(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut escaped = String::with_capacity(value.len());

    for (index, &c) in chars.iter().enumerate() {
        let leading_digit = c.is_ascii_digit()
            && (index == 0 || (index == 1 && chars[0] == '-'));
        if c == '\0' {
            escaped.push('\u{FFFD}');
        } else if (c.is_control() && c.is_ascii()) || leading_digit {
            escaped.push_str(&format!("\\{:x} ", c as u32));
        } else if index == 0 && c == '-' && chars.len() == 1 {
            escaped.push_str("\\-");
        } else if is_ident_char(c) {
            escaped.push(c);
        } else {
            escaped.push('\\');
            escaped.push(c);
        }
    }
    escaped
}

/// Build a path that resolves back to `node` in the current tree.
///
/// Walks from `node` towards the document node, emitting one compound per
/// element. An element whose id is unique in the document becomes the first
/// compound and ends the walk. A non-element `node` is described by its parent.
pub fn build_selector<T: DocumentTree>(tree: &T, node: T::Node) -> String {
    let mut compounds = Vec::new();
    let mut current = Some(node);

    while let Some(candidate) = current {
        if !tree.is_element(candidate) {
            if candidate == tree.root() {
                break;
            }
            current = tree.parent(candidate);
            continue;
        }
        if let Some(id) = tree.element_id(candidate)
            && tree.nodes_with_id(id).len() == 1
        {
            compounds.push(Compound::with_id(id));
            break;
        }
        compounds.push(Compound::describing(tree, candidate));
        current = tree.parent(candidate);
    }

    compounds.reverse();
    Selector { compounds }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ElementTree;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    /// `div > p` also describes the nested paragraph, which comes first in
    /// document order; anchoring keeps paths unambiguous.
    fn nested_tree() -> (ElementTree, Vec<crate::tree::NodeId>) {
        let mut tree = ElementTree::new();
        let root = tree.root();
        let outer = tree.append_element(root, "div");
        let inner = tree.append_element(outer, "div");
        let nested_p = tree.append_element(inner, "p");
        tree.append_text(nested_p, "nested");
        let outer_p = tree.append_element(outer, "p");
        tree.append_text(outer_p, "outer");
        (tree, vec![outer, inner, nested_p, outer_p])
    }

    #[test]
    fn test_build_selector_paths() {
        let (tree, nodes) = nested_tree();

        assert_eq!(build_selector(&tree, nodes[2]), "div > div > p");
        assert_eq!(build_selector(&tree, nodes[3]), "div > p");
    }

    #[test]
    fn test_round_trip_for_every_element() {
        let (mut tree, nodes) = nested_tree();
        let list = tree.append_element(nodes[0], "ul");
        tree.set_attribute(list, "class", "tasks  done");
        for label in ["one", "two", "three"] {
            let item = tree.append_element(list, "li");
            tree.append_text(item, label);
        }
        let labelled = tree.append_element(nodes[0], "section");
        tree.set_attribute(labelled, "id", "notes:2024.q1");
        let inside = tree.append_element(labelled, "p");

        let elements: Vec<_> = tree
            .descendants(tree.root())
            .filter(|&node| tree.is_element(node))
            .collect();
        assert!(elements.contains(&inside));
        for element in elements {
            let path = build_selector(&tree, element);
            assert_eq!(
                tree.query_selector(&path),
                Ok(Some(element)),
                "path {path} did not round-trip"
            );
        }
    }

    #[test]
    fn test_nth_of_type_only_when_same_tag_siblings_exist() {
        let mut tree = ElementTree::new();
        let root = tree.root();
        let list = tree.append_element(root, "ul");
        tree.set_attribute(list, "class", "tasks");
        let first = tree.append_element(list, "li");
        let second = tree.append_element(list, "li");
        let lone = tree.append_element(second, "span");

        assert_eq!(build_selector(&tree, first), "ul.tasks > li:nth-of-type(1)");
        assert_eq!(
            build_selector(&tree, lone),
            "ul.tasks > li:nth-of-type(2) > span"
        );
    }

    #[test]
    fn test_unique_id_roots_the_path() {
        let mut tree = ElementTree::new();
        let root = tree.root();
        let article = tree.append_element(root, "article");
        tree.set_attribute(article, "id", "main");
        let p = tree.append_element(article, "p");

        assert_eq!(build_selector(&tree, article), "#main");
        assert_eq!(build_selector(&tree, p), "#main > p");
    }

    #[test]
    fn test_duplicate_id_is_not_used() {
        let mut tree = ElementTree::new();
        let root = tree.root();
        let first = tree.append_element(root, "div");
        tree.set_attribute(first, "id", "dup");
        let second = tree.append_element(root, "div");
        tree.set_attribute(second, "id", "dup");

        assert_eq!(build_selector(&tree, second), "div:nth-of-type(2)");
    }

    #[test]
    fn test_text_node_is_described_by_parent() {
        let mut tree = ElementTree::new();
        let root = tree.root();
        let p = tree.append_element(root, "p");
        let text = tree.append_text(p, "hello");

        assert_eq!(build_selector(&tree, text), "p");
    }

    #[rstest]
    #[case("main", "main")]
    #[case("notes:2024.q1", "notes\\:2024\\.q1")]
    #[case("1st", "\\31 st")]
    #[case("-2x", "-\\32 x")]
    #[case("-", "\\-")]
    #[case("with space", "with\\ space")]
    #[case("café", "café")]
    fn test_escape_identifier(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(escape_identifier(raw), expected);

        let parsed = Selector::parse(&format!("#{expected}")).unwrap();
        assert_eq!(parsed.compounds[0].id.as_deref(), Some(raw));
    }

    #[test]
    fn test_parse_and_display_round_trip() {
        let text = "#intro > ul.tasks.open > li:nth-of-type(3) > *";
        let selector = Selector::parse(text).unwrap();

        assert_eq!(selector.compounds.len(), 4);
        assert_eq!(selector.compounds[1].classes, vec!["tasks", "open"]);
        assert_eq!(selector.compounds[2].nth_of_type, Some(3));
        assert_eq!(selector.to_string(), text);
        assert_eq!(Selector::parse("DIV>P").unwrap().to_string(), "div > p");
    }

    #[rstest]
    #[case("", SelectorError::Empty)]
    #[case("   ", SelectorError::Empty)]
    #[case("div >", SelectorError::UnexpectedEnd { position: 5 })]
    #[case("> div", SelectorError::UnexpectedChar { position: 0, found: '>' })]
    #[case("div p", SelectorError::UnexpectedChar { position: 4, found: 'p' })]
    #[case("div:hover", SelectorError::UnsupportedPseudo { position: 3 })]
    #[case("li:nth-of-type(0)", SelectorError::InvalidNth { position: 15 })]
    #[case("li:nth-of-type(2n+1)", SelectorError::InvalidNth { position: 15 })]
    #[case("div.", SelectorError::MissingIdent { position: 4 })]
    #[case("#a\\", SelectorError::UnterminatedEscape { position: 3 })]
    fn test_parse_errors(#[case] input: &str, #[case] expected: SelectorError) {
        assert_eq!(Selector::parse(input), Err(expected));
        assert!(ElementTree::new().query_selector(input).is_err());
    }

    #[test]
    fn test_well_formed_path_without_match_is_none() {
        let (tree, _) = nested_tree();

        assert_eq!(tree.query_selector("article > p"), Ok(None));
        assert_eq!(tree.query_selector("p"), Ok(None));
    }
}
