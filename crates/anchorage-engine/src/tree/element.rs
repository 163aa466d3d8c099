use super::{BoundingBox, DocumentTree};

/// Handle to a node inside an [`ElementTree`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Clone, Debug, PartialEq)]
enum NodeKind {
    Document,
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Clone, Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    bounds: Option<BoundingBox>,
}

/// Arena-backed document tree.
///
/// Nodes are never freed: [`ElementTree::detach`] unlinks a subtree from its
/// parent, after which it is unreachable from the root and invisible to every
/// query, but existing [`NodeId`]s stay valid.
#[derive(Clone, Debug)]
pub struct ElementTree {
    nodes: Vec<NodeData>,
    scroll: (f64, f64),
}

impl Default for ElementTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementTree {
    /// Create a tree holding only the document node.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
                bounds: None,
            }],
            scroll: (0.0, 0.0),
        }
    }

    /// Append an element with `tag` (lower-cased) as the last child of `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.push_child(
            parent,
            NodeKind::Element {
                tag: tag.to_ascii_lowercase(),
                attributes: Vec::new(),
            },
        )
    }

    /// Append a text node as the last child of `parent`.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push_child(parent, NodeKind::Text(text.to_string()))
    }

    fn push_child(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            bounds: None,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Set (or replace) an attribute. Ignored for non-element nodes.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[node.0].kind {
            match attributes.iter_mut().find(|(key, _)| key == name) {
                Some((_, existing)) => *existing = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[node.0].kind {
            attributes.retain(|(key, _)| key != name);
        }
    }

    /// Replace the text of a text node. Ignored for other node kinds.
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let NodeKind::Text(existing) = &mut self.nodes[node.0].kind {
            *existing = text.to_string();
        }
    }

    pub fn set_bounding_box(&mut self, node: NodeId, bounds: BoundingBox) {
        self.nodes[node.0].bounds = Some(bounds);
    }

    pub fn set_scroll_offset(&mut self, left: f64, top: f64) {
        self.scroll = (left, top);
    }

    /// Unlink `node` and its subtree from the document.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&child| child != node);
        }
    }

    /// Attributes of an element in insertion order.
    pub fn attributes(&self, node: NodeId) -> &[(String, String)] {
        match &self.nodes[node.0].kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Number of nodes reachable from the root, the root included.
    pub fn len(&self) -> usize {
        1 + self.descendants(self.root()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    /// Render the reachable tree as HTML, escaping text and attribute values.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        for child in self.children(self.root()) {
            self.write_html(child, &mut html);
        }
        html
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].kind {
            NodeKind::Document => {}
            NodeKind::Text(text) => out.push_str(&html_escape::encode_text(text)),
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if is_void_element(tag) {
                    return;
                }
                for &child in &self.nodes[node.0].children {
                    self.write_html(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn is_void_element(tag: &str) -> bool {
    matches!(tag, "br" | "hr" | "img" | "input")
}

impl DocumentTree for ElementTree {
    type Node = NodeId;

    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes[node.0].children.clone()
    }

    fn is_element(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.0].kind, NodeKind::Element { .. })
    }

    fn tag_name(&self, node: NodeId) -> &str {
        match &self.nodes[node.0].kind {
            NodeKind::Element { tag, .. } => tag,
            _ => "",
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attributes(node)
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    fn bounding_box(&self, node: NodeId) -> Option<BoundingBox> {
        self.nodes[node.0].bounds
    }

    fn scroll_offset(&self) -> (f64, f64) {
        self.scroll
    }
}
