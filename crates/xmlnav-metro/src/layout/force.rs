use super::{LayoutOptions, Stations, Vec2};
use std::collections::BTreeMap;

/// Below this center distance pairwise forces are skipped.
const MIN_FORCE_DISTANCE: f64 = 0.1;

/// Per-level placement: a lone station is centered; otherwise stations share the usable width in
/// proportion to `1 + descendants`, each getting at least one node width plus margin.
pub(super) fn initial_positions(
    stations: &Stations,
    width: f64,
    opts: &LayoutOptions,
) -> Vec<Vec2> {
    let mut descendants = vec![0usize; stations.len()];
    for &i in stations.order.iter().rev() {
        if let Some(p) = stations.parents[i] {
            descendants[p] += descendants[i] + 1;
        }
    }

    let mut by_level: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for &i in &stations.order {
        by_level.entry(stations.levels[i]).or_default().push(i);
    }

    let mut pos = vec![Vec2::zeros(); stations.len()];
    let min_spacing = opts.standard_node_size.width + opts.initial_spacing_margin;
    for (&level, members) in &by_level {
        let y = opts.level_y(level);
        if let [only] = members.as_slice() {
            pos[*only] = Vec2::new(width / 2.0, y);
            continue;
        }
        let total_weight: usize = members.iter().map(|&i| descendants[i] + 1).sum();
        let available = (width * 0.8).max(members.len() as f64 * min_spacing);
        let mut cursor = (width - available) / 2.0;
        for &i in members {
            let share = (descendants[i] + 1) as f64 / total_weight as f64 * available;
            let space = share.max(min_spacing);
            pos[i] = Vec2::new(cursor + space / 2.0, y);
            cursor += space;
        }
    }
    pos
}

/// Runs the damped simulation in place: pairwise inverse-square repulsion, linear springs along
/// parent-child edges, optional horizontal grouping, then a soft pull toward each level height.
pub(super) fn simulate(stations: &Stations, pos: &mut [Vec2], opts: &LayoutOptions) {
    let edges = stations.edges();
    let grouping = stations.len() > opts.grouping_node_threshold;
    let mut velocity = vec![Vec2::zeros(); pos.len()];
    let mut force = vec![Vec2::zeros(); pos.len()];

    for _ in 0..opts.iterations {
        force.fill(Vec2::zeros());

        for (k, &a) in stations.order.iter().enumerate() {
            for &b in &stations.order[k + 1..] {
                let d = pos[b] - pos[a];
                let dist = d.norm();
                if dist > MIN_FORCE_DISTANCE {
                    let f = d * (opts.repulsion_constant / (dist * dist * dist));
                    force[a] -= f;
                    force[b] += f;
                }
            }
        }

        for &(parent, child) in &edges {
            let d = pos[child] - pos[parent];
            if d.norm() > MIN_FORCE_DISTANCE {
                let f = d * opts.spring_constant;
                force[parent] += f;
                force[child] -= f;
            }
        }

        if grouping {
            for &(parent, child) in &edges {
                force[child].x += (pos[parent].x - pos[child].x) * opts.grouping_strength;
            }
        }

        for &i in &stations.order {
            velocity[i] = (velocity[i] + force[i]) * opts.damping;
            pos[i] += velocity[i];
            let target = opts.level_y(stations.levels[i]);
            pos[i].y += (target - pos[i].y) * opts.level_correction;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star(children: usize) -> Stations {
        let mut parents = vec![None];
        let mut levels = vec![0];
        for _ in 0..children {
            parents.push(Some(0));
            levels.push(1);
        }
        Stations {
            order: (0..=children).collect(),
            levels,
            parents,
        }
    }

    #[test]
    fn initial_placement_centers_lone_stations_and_spreads_siblings() {
        let opts = LayoutOptions::default();
        let pos = initial_positions(&star(2), 1000.0, &opts);
        assert_eq!(pos[0], Vec2::new(500.0, 100.0));
        // 800px usable, two equal shares.
        assert_eq!(pos[1], Vec2::new(300.0, 220.0));
        assert_eq!(pos[2], Vec2::new(700.0, 220.0));
    }

    #[test]
    fn crowded_levels_fall_back_to_the_spacing_floor() {
        let opts = LayoutOptions::default();
        let pos = initial_positions(&star(20), 1000.0, &opts);
        for pair in pos[1..].windows(2) {
            assert!((pair[1].x - pair[0].x - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn simulation_keeps_positions_finite() {
        let opts = LayoutOptions::default();
        let stations = star(60);
        let mut pos = initial_positions(&stations, 2000.0, &opts);
        simulate(&stations, &mut pos, &opts);
        assert!(pos.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
    }
}
