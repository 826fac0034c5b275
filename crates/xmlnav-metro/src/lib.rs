#![forbid(unsafe_code)]

//! Headless "metro map" view of an XML tree.
//!
//! The first few levels of an [`XmlTree`] become stations ([`graph`]); [`layout`] places them on
//! level-aligned rows. Rendering is left to the caller.

pub mod graph;
pub mod layout;

pub use graph::{MetroGraph, MetroNode, extract_levels, to_graph};
pub use layout::{
    LayoutOptions, LayoutResult, NodeSize, Point, compute_layout, compute_layout_with,
};

use xmlnav_core::XmlTree;

#[derive(Debug, Clone, PartialEq)]
pub struct MetroOptions {
    /// Number of tree levels shown, root included.
    pub max_depth: usize,
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub layout: LayoutOptions,
}

impl Default for MetroOptions {
    fn default() -> Self {
        Self {
            max_depth: 3,
            canvas_width: 2000.0,
            canvas_height: 1500.0,
            layout: LayoutOptions::default(),
        }
    }
}

/// Builds the depth-limited graph of `tree` with every station positioned.
pub fn layout_tree(tree: &XmlTree, opts: &MetroOptions) -> MetroGraph {
    let limited = extract_levels(Some(tree), opts.max_depth).unwrap_or_else(|| tree.clone());
    let mut graph = MetroGraph::from_tree(limited);
    let result = compute_layout_with(
        Some(&graph),
        opts.canvas_width,
        opts.canvas_height,
        &opts.layout,
    );
    graph.apply_layout(&result);
    graph
}

/// Extract, convert and lay out in one call.
pub fn compute_layout_for_tree(tree: &XmlTree, opts: &MetroOptions) -> LayoutResult {
    let graph = to_graph(extract_levels(Some(tree), opts.max_depth));
    compute_layout_with(
        graph.as_ref(),
        opts.canvas_width,
        opts.canvas_height,
        &opts.layout,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmlnav_core::XmlService;

    #[test]
    fn layout_tree_positions_every_station() {
        let tree = XmlService::new()
            .build_tree("<r><a><b><c/></b></a><d/></r>")
            .unwrap();
        let graph = layout_tree(&tree, &MetroOptions::default());
        assert_eq!(graph.len(), 4);
        let via_map = compute_layout_for_tree(&tree, &MetroOptions::default());
        for n in graph.iter() {
            assert_eq!(Some(n.position), via_map.get(graph.xpath(n.id)));
        }
        assert!(via_map.get("/r[1]/a[1]/b[1]/c[1]").is_none());
    }
}
