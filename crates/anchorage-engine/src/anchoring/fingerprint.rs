use crate::text::{hash_text, last_chars, normalize_text, truncate_chars};
use crate::tree::{DocumentTree, build_selector, common_ancestor};

use super::text_match::nearest_occurrence;
use super::{Anchor, FingerprintLimits};

/// A caret position: a character offset inside a text node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition<N> {
    pub node: N,
    pub offset: usize,
}

/// A user selection between two caret positions, start first in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRange<N> {
    pub start: TextPosition<N>,
    pub end: TextPosition<N>,
}

impl<N: Copy + Eq> SelectionRange<N> {
    pub fn new(start_node: N, start_offset: usize, end_node: N, end_offset: usize) -> Self {
        Self {
            start: TextPosition {
                node: start_node,
                offset: start_offset,
            },
            end: TextPosition {
                node: end_node,
                offset: end_offset,
            },
        }
    }

    /// Selection inside a single text node.
    pub fn within(node: N, start_offset: usize, end_offset: usize) -> Self {
        Self::new(node, start_offset, node, end_offset)
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Raw selected text, or `None` when either end is not a text node or the
    /// end does not follow the start.
    pub fn selected_text<T>(&self, tree: &T) -> Option<String>
    where
        T: DocumentTree<Node = N>,
    {
        let start_text = tree.text(self.start.node)?;
        let end_text = tree.text(self.end.node)?;

        if self.start.node == self.end.node {
            if self.end.offset < self.start.offset {
                return None;
            }
            return Some(char_slice(start_text, self.start.offset, self.end.offset));
        }

        let mut selected = String::new();
        let mut started = false;
        for leaf in tree.text_leaves() {
            if leaf == self.start.node {
                selected.push_str(&char_slice(start_text, self.start.offset, usize::MAX));
                started = true;
            } else if leaf == self.end.node {
                if !started {
                    return None;
                }
                selected.push_str(&char_slice(end_text, 0, self.end.offset));
                return Some(selected);
            } else if started {
                selected.push_str(tree.text(leaf).unwrap_or_default());
            }
        }
        None
    }
}

fn char_slice(text: &str, from: usize, to: usize) -> String {
    text.chars().skip(from).take(to.saturating_sub(from)).collect()
}

/// The element itself, or the nearest element above a non-element node.
fn enclosing_element<T: DocumentTree>(tree: &T, node: T::Node) -> Option<T::Node> {
    let mut current = Some(node);
    while let Some(candidate) = current {
        if tree.is_element(candidate) {
            return Some(candidate);
        }
        current = tree.parent(candidate);
    }
    None
}

/// Normalized sibling text immediately before and after `node`.
///
/// Siblings are collected outward from the node until at least `max_chars` raw
/// characters are gathered; the result is normalized and cut to the `max_chars`
/// characters nearest the node.
pub fn get_context<T: DocumentTree>(tree: &T, node: T::Node, max_chars: usize) -> (String, String) {
    let Some(parent) = tree.parent(node) else {
        return (String::new(), String::new());
    };
    let siblings = tree.children(parent);
    let Some(index) = siblings.iter().position(|&sibling| sibling == node) else {
        return (String::new(), String::new());
    };

    let mut before = String::new();
    for &sibling in siblings[..index].iter().rev() {
        if before.chars().count() >= max_chars {
            break;
        }
        before.insert_str(0, &tree.text_content(sibling));
    }

    let mut after = String::new();
    for &sibling in &siblings[index + 1..] {
        if after.chars().count() >= max_chars {
            break;
        }
        after.push_str(&tree.text_content(sibling));
    }

    (
        last_chars(&normalize_text(&before), max_chars),
        truncate_chars(&normalize_text(&after), max_chars),
    )
}

/// Fingerprint a whole node. A non-element node is described by its element
/// parent.
pub fn create_fingerprint<T: DocumentTree>(
    tree: &T,
    node: T::Node,
    limits: &FingerprintLimits,
) -> Anchor {
    let node = enclosing_element(tree, node).unwrap_or(node);
    let text = tree.normalized_text(node);
    let (context_before, context_after) = get_context(tree, node, limits.context_chars);

    Anchor {
        selector: build_selector(tree, node),
        tag_name: tree.tag_name(node).to_string(),
        class_name: tree.class_name(node).to_string(),
        text_snapshot: truncate_chars(&text, limits.snapshot_chars),
        text_hash: hash_text(&text),
        context_before,
        context_after,
        bounding_box: tree.absolute_bounding_box(node),
        selection_start_offset: None,
        selection_length: None,
    }
}

/// Fingerprint a text selection; `None` if it is collapsed, reversed or selects
/// only whitespace.
///
/// The anchor describes the element enclosing the whole selection. Its snapshot
/// is the full normalized selected text, and the offset locates it inside the
/// element's normalized text (the occurrence nearest to where the selection
/// started, when the text repeats).
pub fn create_selection_fingerprint<T: DocumentTree>(
    tree: &T,
    selection: &SelectionRange<T::Node>,
    limits: &FingerprintLimits,
) -> Option<Anchor> {
    if selection.is_collapsed() {
        return None;
    }
    let snapshot = normalize_text(&selection.selected_text(tree)?);
    if snapshot.is_empty() {
        return None;
    }

    let container = common_ancestor(tree, selection.start.node, selection.end.node)?;
    let element = enclosing_element(tree, container)?;
    let element_text = tree.normalized_text(element);

    let estimate = normalized_prefix_len(tree, element, &selection.start);
    let start_offset = nearest_occurrence(&element_text, &snapshot, estimate).unwrap_or(0);
    let (context_before, context_after) = get_context(tree, element, limits.context_chars);

    Some(Anchor {
        selector: build_selector(tree, element),
        tag_name: tree.tag_name(element).to_string(),
        class_name: tree.class_name(element).to_string(),
        text_hash: hash_text(&snapshot),
        selection_length: Some(snapshot.chars().count()),
        text_snapshot: snapshot,
        context_before,
        context_after,
        bounding_box: None,
        selection_start_offset: Some(start_offset),
    })
}

/// Approximate offset of `position` within the normalized text of `element`.
fn normalized_prefix_len<T: DocumentTree>(
    tree: &T,
    element: T::Node,
    position: &TextPosition<T::Node>,
) -> usize {
    let mut prefix = String::new();
    for leaf in tree.descendants(element) {
        let Some(text) = tree.text(leaf) else {
            continue;
        };
        if leaf == position.node {
            prefix.push_str(&char_slice(text, 0, position.offset));
            break;
        }
        prefix.push_str(text);
    }

    let ends_with_space = prefix.ends_with(char::is_whitespace);
    let normalized = normalize_text(&prefix);
    let separator = usize::from(ends_with_space && !normalized.is_empty());
    normalized.chars().count() + separator
}
