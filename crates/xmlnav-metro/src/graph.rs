//! Depth-limited station graph over an [`XmlTree`].

use crate::layout::{LayoutResult, Point};
use xmlnav_core::{NodeId, TreeNode, XmlTree};

/// Copies the first `max_depth` levels of `tree`. Nodes at the cutoff keep their own data but
/// lose all descendants. `max_depth == 0` keeps the root alone.
pub fn extract_levels(tree: Option<&XmlTree>, max_depth: usize) -> Option<XmlTree> {
    let tree = tree?;
    let mut limited = XmlTree::new(tree.root().clone());
    let to = limited.root_id();
    copy_children(tree, tree.root_id(), &mut limited, to, 0, max_depth);
    Some(limited)
}

fn copy_children(
    src: &XmlTree,
    from: NodeId,
    dst: &mut XmlTree,
    to: NodeId,
    level: usize,
    max_depth: usize,
) {
    if level + 1 >= max_depth {
        return;
    }
    for &child in src.node(from).children() {
        let copied = dst.push_child(to, src.node(child).clone());
        copy_children(src, child, dst, copied, level + 1, max_depth);
    }
}

/// Wraps every node of `tree` as a station. `None` in, `None` out.
pub fn to_graph(tree: Option<XmlTree>) -> Option<MetroGraph> {
    tree.map(MetroGraph::from_tree)
}

/// A station: one element of the limited tree plus its graph level and position.
#[derive(Debug, Clone, PartialEq)]
pub struct MetroNode {
    pub id: NodeId,
    /// 0 for the root.
    pub level: usize,
    pub position: Point,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl MetroNode {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// Station graph. Stations share ids with the nodes of the tree they wrap.
#[derive(Debug, Clone)]
pub struct MetroGraph {
    tree: XmlTree,
    nodes: Vec<MetroNode>,
}

impl MetroGraph {
    pub fn from_tree(tree: XmlTree) -> Self {
        let mut slots: Vec<Option<MetroNode>> = vec![None; tree.len()];
        for id in tree.iter() {
            let parent = tree.node(id).parent();
            let level = parent
                .and_then(|p| slots[p.index()].as_ref())
                .map_or(0, |p| p.level + 1);
            slots[id.index()] = Some(MetroNode {
                id,
                level,
                position: Point::default(),
                parent,
                children: tree.node(id).children().to_vec(),
            });
        }
        // Every arena slot is reachable from the root.
        let nodes = slots.into_iter().flatten().collect();
        Self { tree, nodes }
    }

    pub fn tree(&self) -> &XmlTree {
        &self.tree
    }

    pub fn root_id(&self) -> NodeId {
        self.tree.root_id()
    }

    pub fn root(&self) -> &MetroNode {
        self.node(self.root_id())
    }

    pub fn node(&self, id: NodeId) -> &MetroNode {
        &self.nodes[id.index()]
    }

    /// The element a station stands for.
    pub fn element(&self, id: NodeId) -> &TreeNode {
        self.tree.node(id)
    }

    pub fn xpath(&self, id: NodeId) -> &str {
        &self.tree.node(id).path
    }

    pub fn display_name(&self, id: NodeId) -> &str {
        self.tree.node(id).display_name()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Stations in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = &MetroNode> + '_ {
        self.tree.iter().map(move |id| self.node(id))
    }

    /// Parent → child pairs in pre-order of the parent.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.iter()
            .flat_map(|n| n.children.iter().map(move |&c| (n.id, c)))
            .collect()
    }

    pub fn max_level(&self) -> usize {
        self.nodes.iter().map(|n| n.level).max().unwrap_or(0)
    }

    pub fn find_by_xpath(&self, xpath: &str) -> Option<NodeId> {
        self.tree.find_by_path(xpath)
    }

    /// Station chain from the root down to `id`, inclusive.
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain: Vec<NodeId> = self.tree.ancestors(id).collect();
        chain.reverse();
        chain.push(id);
        chain
    }

    /// Number of stations below `id`.
    pub fn descendant_count(&self, id: NodeId) -> usize {
        let mut count = 0;
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let children = &self.node(cur).children;
            count += children.len();
            stack.extend(children.iter().copied());
        }
        count
    }

    /// Copies computed positions onto the stations. Stations missing from `layout` keep their
    /// previous position.
    pub fn apply_layout(&mut self, layout: &LayoutResult) {
        for node in &mut self.nodes {
            if let Some(p) = layout.positions.get(&self.tree.node(node.id).path) {
                node.position = *p;
            }
        }
    }
}
