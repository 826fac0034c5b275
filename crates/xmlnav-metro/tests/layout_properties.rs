//! Property tests for depth-limited extraction and the station layout over generated trees.

use proptest::prelude::*;
use xmlnav_core::{XmlService, XmlTree};
use xmlnav_metro::{LayoutOptions, MetroGraph, compute_layout, extract_levels, to_graph};

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    children: Vec<Node>,
}

fn node() -> impl Strategy<Value = Node> {
    let tag = prop::sample::select(vec!["a", "b", "item", "row"]).prop_map(String::from);
    let leaf = tag.clone().prop_map(|tag| Node {
        tag,
        children: Vec::new(),
    });
    leaf.prop_recursive(4, 90, 12, move |inner| {
        (tag.clone(), prop::collection::vec(inner, 0..12))
            .prop_map(|(tag, children)| Node { tag, children })
    })
}

fn render(node: &Node) -> String {
    if node.children.is_empty() {
        return format!("<{}/>", node.tag);
    }
    let inner: String = node.children.iter().map(render).collect();
    format!("<{0}>{inner}</{0}>", node.tag)
}

fn tree_of(node: &Node) -> XmlTree {
    XmlService::new()
        .build_tree(&render(node))
        .expect("generated XML builds")
}

fn graph_of(node: &Node, depth: usize) -> MetroGraph {
    to_graph(extract_levels(Some(&tree_of(node)), depth)).expect("graph")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn extraction_stops_at_the_depth_limit(root in node(), depth in 1usize..5) {
        let limited = extract_levels(Some(&tree_of(&root)), depth).expect("tree");
        for id in limited.iter() {
            let d = limited.depth(id);
            prop_assert!(d < depth);
            if d == depth - 1 {
                prop_assert_eq!(limited.node(id).child_count(), 0);
            }
        }
    }

    #[test]
    fn graph_levels_increase_by_one(root in node()) {
        let graph = graph_of(&root, 3);
        prop_assert_eq!(graph.root().level, 0);
        for (parent, child) in graph.edges() {
            prop_assert_eq!(graph.node(child).level, graph.node(parent).level + 1);
        }
        for n in graph.iter().filter(|n| n.level == 2) {
            prop_assert_eq!(n.child_count(), 0);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn layouts_are_spaced_aligned_and_collision_free(root in node()) {
        let graph = graph_of(&root, 3);
        let layout = compute_layout(Some(&graph), 2000.0, 1500.0);
        prop_assert_eq!(layout.len(), graph.len());
        let opts = LayoutOptions::default();

        let placed: Vec<_> = graph
            .iter()
            .map(|n| (n.level, layout.get(graph.xpath(n.id)).expect("position")))
            .collect();

        for (level, p) in &placed {
            prop_assert!((p.y - opts.level_y(*level)).abs() < 0.01);
        }

        for (i, (la, a)) in placed.iter().enumerate() {
            for (lb, b) in &placed[i + 1..] {
                let (dx, dy) = (b.x - a.x, b.y - a.y);
                let dist = (dx * dx + dy * dy).sqrt();
                prop_assert!(dist >= 79.9, "centers too close: {:?} {:?}", a, b);

                let (sa, sb) = (opts.node_size(*la), opts.node_size(*lb));
                let overlap = dx.abs() < (sa.width + sb.width) / 2.0
                    && dy.abs() < (sa.height + sb.height) / 2.0;
                prop_assert!(!overlap, "boxes overlap: {:?} {:?}", a, b);
            }
        }

        let max_level = graph.max_level();
        let avg_y = |level: usize| {
            let ys: Vec<f64> = placed
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, p)| p.y)
                .collect();
            ys.iter().sum::<f64>() / ys.len() as f64
        };
        for level in 1..=max_level {
            prop_assert!(avg_y(level) - avg_y(level - 1) >= 119.9);
        }
    }

    #[test]
    fn layouts_are_deterministic(root in node()) {
        let graph = graph_of(&root, 3);
        let first = compute_layout(Some(&graph), 2000.0, 1500.0);
        let second = compute_layout(Some(&graph), 2000.0, 1500.0);
        for (path, a) in &first.positions {
            let b = second.get(path).expect("same keys");
            prop_assert!((a.x - b.x).abs() <= 1.0 && (a.y - b.y).abs() <= 1.0);
        }
    }
}
