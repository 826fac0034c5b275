//! Level-aligned force-directed layout for a [`MetroGraph`].
//!
//! Stages run in a fixed order: proportional initial placement per level, a damped force
//! simulation, a hard snap to level heights, then horizontal-only collision resolution. With the
//! default [`LayoutOptions`] the result has same-level stations sharing one `y`, levels 120px
//! apart, centers at least 80px apart and no overlapping station boxes.

mod collide;
mod force;

use crate::graph::MetroGraph;
use nalgebra as na;
use serde::Serialize;
use std::collections::BTreeMap;

type Vec2 = na::Vector2<f64>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Station centers keyed by index-aware path.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LayoutResult {
    pub positions: BTreeMap<String, Point>,
}

impl LayoutResult {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, xpath: &str) -> Option<Point> {
        self.positions.get(xpath).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    pub repulsion_constant: f64,
    pub spring_constant: f64,
    /// Minimum center distance between stations.
    pub min_node_distance: f64,
    /// Vertical distance between consecutive levels.
    pub min_level_distance: f64,
    /// `y` of level 0.
    pub top_margin: f64,
    pub root_node_size: NodeSize,
    pub standard_node_size: NodeSize,
    /// Extra space per station on top of its width during initial placement.
    pub initial_spacing_margin: f64,
    /// Gap kept between station boxes when resolving collisions.
    pub collision_margin: f64,
    pub iterations: usize,
    pub collision_passes: usize,
    pub damping: f64,
    /// Share of the remaining distance to the level height recovered per iteration.
    pub level_correction: f64,
    /// Above this many stations children are pulled horizontally toward their parent.
    pub grouping_node_threshold: usize,
    pub grouping_strength: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            repulsion_constant: 5000.0,
            spring_constant: 0.1,
            min_node_distance: 80.0,
            min_level_distance: 120.0,
            top_margin: 100.0,
            root_node_size: NodeSize {
                width: 100.0,
                height: 60.0,
            },
            standard_node_size: NodeSize {
                width: 80.0,
                height: 50.0,
            },
            initial_spacing_margin: 20.0,
            collision_margin: 10.0,
            iterations: 50,
            collision_passes: 100,
            damping: 0.85,
            level_correction: 0.3,
            grouping_node_threshold: 50,
            grouping_strength: 0.5,
        }
    }
}

impl LayoutOptions {
    pub fn level_y(&self, level: usize) -> f64 {
        level as f64 * self.min_level_distance + self.top_margin
    }

    pub fn node_size(&self, level: usize) -> NodeSize {
        if level == 0 {
            self.root_node_size
        } else {
            self.standard_node_size
        }
    }
}

/// Dense station indices (arena order) with the data the layout stages need.
struct Stations {
    /// Pre-order.
    order: Vec<usize>,
    levels: Vec<usize>,
    parents: Vec<Option<usize>>,
}

impl Stations {
    fn from_graph(graph: &MetroGraph) -> Self {
        let mut levels = vec![0; graph.len()];
        let mut parents = vec![None; graph.len()];
        let mut order = Vec::with_capacity(graph.len());
        for n in graph.iter() {
            let i = n.id.index();
            levels[i] = n.level;
            parents[i] = n.parent().map(|p| p.index());
            order.push(i);
        }
        Self {
            order,
            levels,
            parents,
        }
    }

    fn len(&self) -> usize {
        self.levels.len()
    }

    fn edges(&self) -> Vec<(usize, usize)> {
        self.order
            .iter()
            .filter_map(|&c| self.parents[c].map(|p| (p, c)))
            .collect()
    }
}

/// Positions for every station of `graph` with the default options. `None` yields an empty
/// result.
pub fn compute_layout(
    graph: Option<&MetroGraph>,
    canvas_width: f64,
    canvas_height: f64,
) -> LayoutResult {
    compute_layout_with(graph, canvas_width, canvas_height, &LayoutOptions::default())
}

/// Like [`compute_layout`]. Only the width shapes the result: vertical placement depends on
/// the level alone.
pub fn compute_layout_with(
    graph: Option<&MetroGraph>,
    canvas_width: f64,
    canvas_height: f64,
    opts: &LayoutOptions,
) -> LayoutResult {
    let Some(graph) = graph else {
        return LayoutResult::default();
    };
    if graph.is_empty() {
        return LayoutResult::default();
    }

    let timing_enabled = std::env::var("XMLNAV_METRO_TIMING").ok().as_deref() == Some("1");
    let total_start = timing_enabled.then(std::time::Instant::now);

    let stations = Stations::from_graph(graph);

    let init_start = timing_enabled.then(std::time::Instant::now);
    let mut pos = force::initial_positions(&stations, canvas_width, opts);
    let init = init_start.map(|s| s.elapsed());

    let sim_start = timing_enabled.then(std::time::Instant::now);
    force::simulate(&stations, &mut pos, opts);
    for &i in &stations.order {
        pos[i].y = opts.level_y(stations.levels[i]);
    }
    let sim = sim_start.map(|s| s.elapsed());

    let collide_start = timing_enabled.then(std::time::Instant::now);
    let passes = collide::resolve(&stations, &mut pos, opts);
    let swept = collide::has_collision(&stations, &pos, opts);
    if swept {
        tracing::debug!(
            nodes = stations.len(),
            passes,
            "collisions left after pairwise resolution; sweeping levels"
        );
        collide::sweep(&stations, &mut pos, opts);
    }
    let collide = collide_start.map(|s| s.elapsed());

    let positions: BTreeMap<String, Point> = graph
        .tree()
        .iter()
        .map(|id| {
            let p = pos[id.index()];
            (graph.xpath(id).to_string(), Point { x: p.x, y: p.y })
        })
        .collect();

    if let Some(s) = total_start {
        eprintln!(
            "[xmlnav-metro-timing] total={:?} init={:?} simulate={:?} collide={:?} nodes={} collision_passes={} swept={} canvas={}x{}",
            s.elapsed(),
            init.unwrap_or_default(),
            sim.unwrap_or_default(),
            collide.unwrap_or_default(),
            stations.len(),
            passes,
            swept,
            canvas_width,
            canvas_height,
        );
    }

    LayoutResult { positions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{extract_levels, to_graph};
    use xmlnav_core::XmlService;

    fn graph(text: &str, depth: usize) -> MetroGraph {
        let tree = XmlService::new().build_tree(text).unwrap();
        to_graph(extract_levels(Some(&tree), depth)).unwrap()
    }

    #[test]
    fn missing_graph_yields_empty_layout() {
        assert!(compute_layout(None, 2000.0, 1500.0).is_empty());
    }

    #[test]
    fn single_root_is_centered() {
        let layout = compute_layout(Some(&graph("<r/>", 3)), 2000.0, 1500.0);
        assert_eq!(layout.get("/r[1]"), Some(Point { x: 1000.0, y: 100.0 }));
    }

    #[test]
    fn levels_are_aligned_and_spaced() {
        let g = graph("<r><a><x/><y/></a><b><z/></b><c/></r>", 3);
        let layout = compute_layout(Some(&g), 2000.0, 1500.0);
        assert_eq!(layout.len(), g.len());
        for n in g.iter() {
            let p = layout.get(g.xpath(n.id)).unwrap();
            assert_eq!(p.y, 100.0 + 120.0 * n.level as f64);
        }
        let opts = LayoutOptions::default();
        let nodes: Vec<_> = g.iter().collect();
        for (i, m) in nodes.iter().enumerate() {
            for n in &nodes[i + 1..] {
                let p = layout.get(g.xpath(m.id)).unwrap();
                let q = layout.get(g.xpath(n.id)).unwrap();
                let (dx, dy) = (p.x - q.x, p.y - q.y);
                assert!((dx * dx + dy * dy).sqrt() >= 80.0, "{p:?} {q:?}");
                let (sm, sn) = (opts.node_size(m.level), opts.node_size(n.level));
                let overlap = dx.abs() <= (sm.width + sn.width) / 2.0
                    && dy.abs() <= (sm.height + sn.height) / 2.0;
                assert!(!overlap, "{p:?} overlaps {q:?}");
            }
        }
    }

    #[test]
    fn options_expose_level_geometry() {
        let opts = LayoutOptions::default();
        assert_eq!(opts.level_y(2), 340.0);
        assert_eq!(opts.node_size(0).width, 100.0);
        assert_eq!(opts.node_size(3).height, 50.0);
    }
}
