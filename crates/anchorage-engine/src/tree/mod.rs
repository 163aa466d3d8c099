/*!
 * # Document Tree Capability
 *
 * The engine never talks to a concrete document representation. Everything it
 * needs from a host document is expressed by the [`DocumentTree`] trait:
 *
 * - **Structure**: `root`, `parent`, `children` (text nodes included, in order)
 * - **Element accessors**: `tag_name`, `attribute`, and the derived `class_name`
 *   and `element_id`
 * - **Text**: `text` for text nodes, with `text_content` / `normalized_text`
 *   derived by walking descendants
 * - **Geometry**: viewport-relative `bounding_box` plus `scroll_offset`, combined
 *   into `absolute_bounding_box`
 * - **Queries**: `descendants`, `nodes_by_tag`, `text_leaves` and
 *   `query_selector`, all in document order
 *
 * Only the structural and accessor methods are required; the queries have
 * provided implementations built on top of them, which a host may override with
 * faster native lookups.
 *
 * [`ElementTree`] is the in-crate implementation, used for Markdown documents and
 * as the fixture tree in tests.
 */

pub mod element;
pub mod markdown;
pub mod selector;

pub use element::{ElementTree, NodeId};
pub use selector::{Selector, SelectorError, build_selector, escape_identifier};

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

use crate::text::normalize_text;

/// Rectangle in either viewport or document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    /// Shift the box by a scroll offset, turning viewport coordinates into
    /// document coordinates.
    pub fn offset_by(self, (scroll_left, scroll_top): (f64, f64)) -> Self {
        Self {
            top: self.top + scroll_top,
            left: self.left + scroll_left,
            ..self
        }
    }
}

/// Read-only query capability over a live document tree.
pub trait DocumentTree {
    /// Cheap handle to a node of this tree.
    type Node: Copy + Eq + Hash + Debug;

    /// The document node. It is never an element and never part of a path.
    fn root(&self) -> Self::Node;

    fn parent(&self, node: Self::Node) -> Option<Self::Node>;

    /// All child nodes, text nodes included, in document order.
    fn children(&self, node: Self::Node) -> Vec<Self::Node>;

    fn is_element(&self, node: Self::Node) -> bool;

    /// Lower-cased tag name; empty for text and document nodes.
    fn tag_name(&self, node: Self::Node) -> &str;

    fn attribute(&self, node: Self::Node, name: &str) -> Option<&str>;

    /// Own text of a text node; `None` for every other node kind.
    fn text(&self, node: Self::Node) -> Option<&str>;

    /// Viewport-relative geometry, if the node is laid out.
    fn bounding_box(&self, node: Self::Node) -> Option<BoundingBox>;

    /// Current scroll position as `(left, top)`.
    fn scroll_offset(&self) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn class_name(&self, node: Self::Node) -> &str {
        self.attribute(node, "class").unwrap_or("")
    }

    fn element_id(&self, node: Self::Node) -> Option<&str> {
        self.attribute(node, "id").filter(|id| !id.is_empty())
    }

    /// Concatenated text of every text node below `node`.
    fn text_content(&self, node: Self::Node) -> String
    where
        Self: Sized,
    {
        if let Some(text) = self.text(node) {
            return text.to_string();
        }
        self.descendants(node)
            .filter_map(|descendant| self.text(descendant))
            .collect()
    }

    fn normalized_text(&self, node: Self::Node) -> String
    where
        Self: Sized,
    {
        normalize_text(&self.text_content(node))
    }

    /// Geometry in document coordinates (viewport box plus scroll offset).
    fn absolute_bounding_box(&self, node: Self::Node) -> Option<BoundingBox> {
        self.bounding_box(node)
            .map(|bounds| bounds.offset_by(self.scroll_offset()))
    }

    fn element_children(&self, node: Self::Node) -> Vec<Self::Node> {
        self.children(node)
            .into_iter()
            .filter(|&child| self.is_element(child))
            .collect()
    }

    /// 1-based rank of `node` among its parent's element children sharing its
    /// tag, together with how many such siblings there are.
    fn same_tag_rank(&self, node: Self::Node) -> (usize, usize) {
        let Some(parent) = self.parent(node) else {
            return (1, 1);
        };
        let tag = self.tag_name(node);
        let same_tag: Vec<Self::Node> = self
            .element_children(parent)
            .into_iter()
            .filter(|&sibling| self.tag_name(sibling) == tag)
            .collect();
        let rank = same_tag
            .iter()
            .position(|&sibling| sibling == node)
            .map_or(1, |index| index + 1);
        (rank, same_tag.len())
    }

    /// Pre-order walk of the nodes below `from` (excluding `from` itself).
    fn descendants(&self, from: Self::Node) -> Descendants<'_, Self>
    where
        Self: Sized,
    {
        Descendants::new(self, from)
    }

    /// Elements with the given tag in document order.
    fn nodes_by_tag(&self, tag: &str) -> Vec<Self::Node>
    where
        Self: Sized,
    {
        self.descendants(self.root())
            .filter(|&node| self.is_element(node) && self.tag_name(node) == tag)
            .collect()
    }

    /// Text nodes with non-empty text, in document order.
    fn text_leaves(&self) -> impl Iterator<Item = Self::Node> + '_
    where
        Self: Sized,
    {
        self.descendants(self.root())
            .filter(move |&node| self.text(node).is_some_and(|text| !text.is_empty()))
    }

    /// Elements whose `id` attribute equals `id`, in document order.
    fn nodes_with_id(&self, id: &str) -> Vec<Self::Node>
    where
        Self: Sized,
    {
        self.descendants(self.root())
            .filter(|&node| self.is_element(node) && self.element_id(node) == Some(id))
            .collect()
    }

    /// Resolve a path selector produced by [`build_selector`].
    ///
    /// A malformed path is an error; a well-formed path that matches nothing is
    /// `Ok(None)`.
    fn query_selector(&self, path: &str) -> Result<Option<Self::Node>, SelectorError>
    where
        Self: Sized,
    {
        let selector = Selector::parse(path)?;
        Ok(selector.find_first(self))
    }
}

/// Lazy pre-order iterator over the descendants of a node.
pub struct Descendants<'t, T: DocumentTree> {
    tree: &'t T,
    stack: Vec<T::Node>,
}

impl<'t, T: DocumentTree> Descendants<'t, T> {
    fn new(tree: &'t T, from: T::Node) -> Self {
        let mut stack = tree.children(from);
        stack.reverse();
        Self { tree, stack }
    }
}

impl<T: DocumentTree> Iterator for Descendants<'_, T> {
    type Item = T::Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(self.tree.children(node).into_iter().rev());
        Some(node)
    }
}

/// Lowest node that is an ancestor-or-self of both `a` and `b`.
pub fn common_ancestor<T: DocumentTree>(tree: &T, a: T::Node, b: T::Node) -> Option<T::Node> {
    let mut ancestors_of_a = Vec::new();
    let mut current = Some(a);
    while let Some(node) = current {
        ancestors_of_a.push(node);
        current = tree.parent(node);
    }

    let mut current = Some(b);
    while let Some(node) = current {
        if ancestors_of_a.contains(&node) {
            return Some(node);
        }
        current = tree.parent(node);
    }
    None
}
