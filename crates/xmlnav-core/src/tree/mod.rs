//! Addressable, line-annotated tree built from a parsed document.
//!
//! Nodes live in an arena owned by [`XmlTree`]; [`NodeId`] handles are used for both the child
//! lists and the parent back-reference, so there is exactly one owner and no reference cycles.

mod builder;
mod line_index;

pub use builder::build_tree;
pub use line_index::{LineIndex, TagPos};

use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One XML element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// Display label: the tag, followed by ` [k="v" ...]` when the element has attributes.
    pub name: String,
    pub tag: String,
    /// Trimmed direct text; empty when absent.
    pub value: String,
    pub attributes: IndexMap<String, String>,
    /// Index-aware locator such as `/root[1]/item[2]`.
    pub path: String,
    /// 1-based line of the opening tag, 0 when unknown.
    pub line_number: usize,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl TreeNode {
    pub fn new(
        tag: impl Into<String>,
        value: impl Into<String>,
        attributes: IndexMap<String, String>,
        path: impl Into<String>,
        line_number: usize,
    ) -> Self {
        let tag = tag.into();
        Self {
            name: display_name(&tag, &attributes),
            tag,
            value: value.into(),
            attributes,
            path: path.into(),
            line_number,
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

pub(crate) fn display_name(tag: &str, attributes: &IndexMap<String, String>) -> String {
    if attributes.is_empty() {
        return tag.to_string();
    }
    let attrs = attributes
        .iter()
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{tag} [{attrs}]")
}

/// Arena-backed element tree. The root is always the first node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlTree {
    nodes: Vec<TreeNode>,
}

impl XmlTree {
    /// Creates a tree holding only `root`.
    pub fn new(mut root: TreeNode) -> Self {
        root.parent = None;
        root.children.clear();
        Self { nodes: vec![root] }
    }

    /// Appends `node` as the last child of `parent` and returns its id.
    ///
    /// Panics if `parent` does not belong to this tree.
    pub fn push_child(&mut self, parent: NodeId, mut node: TreeNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent(&self, id: NodeId) -> Option<&TreeNode> {
        self.node(id).parent.map(|p| self.node(p))
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &TreeNode> + '_ {
        self.node(id).children.iter().map(move |&c| self.node(c))
    }

    /// Ids from `id`'s parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.node(id).parent,
        }
    }

    /// Number of edges between `id` and the root (root = 0).
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// Root-to-node tag chain, for breadcrumb display.
    pub fn breadcrumbs(&self, id: NodeId) -> Vec<&str> {
        let mut chain: Vec<&str> = self
            .ancestors(id)
            .map(|a| self.node(a).tag.as_str())
            .collect();
        chain.reverse();
        chain.push(self.node(id).tag.as_str());
        chain
    }

    /// Pre-order (document order) traversal of node ids.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![self.root_id()],
        }
    }

    pub fn find_by_path(&self, path: &str) -> Option<NodeId> {
        self.iter().find(|&id| self.node(id).path == path)
    }

    /// The opening-tag line of the node at `path`, when it is known.
    pub fn line_of(&self, path: &str) -> Option<usize> {
        self.find_by_path(path)
            .map(|id| self.node(id).line_number)
            .filter(|&l| l > 0)
    }
}

pub struct Ancestors<'a> {
    tree: &'a XmlTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.next?;
        self.next = self.tree.node(cur).parent;
        Some(cur)
    }
}

pub struct PreOrder<'a> {
    tree: &'a XmlTree,
    stack: Vec<NodeId>,
}

impl Iterator for PreOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.stack.pop()?;
        self.stack
            .extend(self.tree.node(cur).children.iter().rev().copied());
        Some(cur)
    }
}

/// Splits an index-aware path into `(parent_path, tag, index)`; the root's parent path is
/// empty. Returns `None` for malformed paths.
pub fn split_last_segment(path: &str) -> Option<(&str, &str, usize)> {
    let slash = path.rfind('/')?;
    let (parent, seg) = (&path[..slash], &path[slash + 1..]);
    let open = seg.rfind('[')?;
    let index = seg.get(open + 1..seg.len().checked_sub(1)?)?.parse().ok()?;
    if !seg.ends_with(']') {
        return None;
    }
    Some((parent, &seg[..open], index))
}
