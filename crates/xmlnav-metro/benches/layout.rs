use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use xmlnav_core::XmlService;
use xmlnav_metro::{MetroOptions, compute_layout, compute_layout_for_tree, extract_levels, to_graph};

/// `groups` second-level elements with `leaves` children each.
fn wide_document(groups: usize, leaves: usize) -> String {
    let mut out = String::from("<catalog>\n");
    for g in 0..groups {
        out.push_str(&format!("  <section id=\"{g}\">\n"));
        for _ in 0..leaves {
            out.push_str("    <entry/>\n");
        }
        out.push_str("  </section>\n");
    }
    out.push_str("</catalog>\n");
    out
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("metro_layout");
    group.sample_size(10);
    for &(groups, leaves) in &[(8, 4), (20, 5), (40, 8)] {
        let tree = XmlService::new()
            .build_tree(&wide_document(groups, leaves))
            .expect("bench document builds");
        let graph = to_graph(extract_levels(Some(&tree), 3)).expect("graph");
        let id = format!("{}_stations", graph.len());

        group.bench_with_input(BenchmarkId::new("compute_layout", &id), &graph, |b, g| {
            b.iter(|| compute_layout(Some(black_box(g)), 2000.0, 1500.0))
        });
        group.bench_with_input(BenchmarkId::new("from_tree", &id), &tree, |b, t| {
            b.iter(|| compute_layout_for_tree(black_box(t), &MetroOptions::default()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_layout);
criterion_main!(benches);
