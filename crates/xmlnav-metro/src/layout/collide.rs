use super::{LayoutOptions, Stations, Vec2};
use std::collections::BTreeMap;

/// Axis-aligned station boxes touch or overlap.
fn boxes_overlap(
    stations: &Stations,
    pos: &[Vec2],
    opts: &LayoutOptions,
    a: usize,
    b: usize,
) -> bool {
    let sa = opts.node_size(stations.levels[a]);
    let sb = opts.node_size(stations.levels[b]);
    let d = pos[b] - pos[a];
    d.x.abs() <= (sa.width + sb.width) / 2.0 && d.y.abs() <= (sa.height + sb.height) / 2.0
}

fn required_separation(stations: &Stations, opts: &LayoutOptions, a: usize, b: usize) -> f64 {
    let wa = opts.node_size(stations.levels[a]).width;
    let wb = opts.node_size(stations.levels[b]).width;
    (wa + wb) / 2.0 + opts.collision_margin
}

/// Pairwise passes pushing overlapping stations apart along x by half the missing separation
/// each. Stops after the first clean pass; returns the number of passes run.
pub(super) fn resolve(stations: &Stations, pos: &mut [Vec2], opts: &LayoutOptions) -> usize {
    for pass in 0..opts.collision_passes {
        let mut collided = false;
        for (k, &a) in stations.order.iter().enumerate() {
            for &b in &stations.order[k + 1..] {
                if !boxes_overlap(stations, pos, opts, a, b) {
                    continue;
                }
                collided = true;
                let mut d = pos[b] - pos[a];
                let mut dist = d.norm();
                if dist < 0.1 {
                    d = Vec2::new(1.0, 0.0);
                    dist = 1.0;
                }
                let required = required_separation(stations, opts, a, b);
                if dist < required {
                    let shift = d.x / dist * (required - dist) * 0.5;
                    pos[a].x -= shift;
                    pos[b].x += shift;
                }
            }
        }
        if !collided {
            return pass + 1;
        }
    }
    opts.collision_passes
}

pub(super) fn has_collision(stations: &Stations, pos: &[Vec2], opts: &LayoutOptions) -> bool {
    stations.order.iter().enumerate().any(|(k, &a)| {
        stations.order[k + 1..]
            .iter()
            .any(|&b| boxes_overlap(stations, pos, opts, a, b))
    })
}

/// Left-to-right pass per level that moves each station right until it clears its left
/// neighbour by the required separation.
pub(super) fn sweep(stations: &Stations, pos: &mut [Vec2], opts: &LayoutOptions) {
    let mut by_level: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for &i in &stations.order {
        by_level.entry(stations.levels[i]).or_default().push(i);
    }
    for members in by_level.values_mut() {
        members.sort_by(|&a, &b| pos[a].x.total_cmp(&pos[b].x).then(a.cmp(&b)));
        for pair in members.windows(2) {
            let (left, right) = (pair[0], pair[1]);
            let gap = required_separation(stations, opts, left, right).max(opts.min_node_distance);
            let min_x = pos[left].x + gap;
            if pos[right].x < min_x {
                pos[right].x = min_x;
            }
        }
    }
}
