use criterion::{criterion_group, criterion_main, Criterion};
use lumen_core::math::Vec3;
use lumen_data::scene::SceneGraph;
use std::hint::black_box;

fn bench_world_matrices(c: &mut Criterion) {
    // 100 chains of 100 nodes each
    let mut graph = SceneGraph::new();
    let mut heads = Vec::new();
    let mut leaves = Vec::new();
    for i in 0..100 {
        let head = graph.spawn(graph.root(), format!("chain{i}")).unwrap();
        let mut parent = head;
        for _ in 0..99 {
            parent = graph.spawn(parent, "link").unwrap();
            graph.set_position(parent, Vec3::new(0.0, 0.1, 0.0)).unwrap();
        }
        heads.push(head);
        leaves.push(parent);
    }

    let mut group = c.benchmark_group("Scene Graph");

    group.bench_function("Cached world matrices", |b| {
        for &leaf in &leaves {
            graph.world_matrix(leaf).unwrap();
        }
        b.iter(|| {
            for &leaf in &leaves {
                black_box(graph.world_matrix(leaf).unwrap());
            }
        });
    });

    group.bench_function("Invalidate root of each chain and recompute", |b| {
        let mut t = 0.0;
        b.iter(|| {
            t += 0.01;
            for &head in &heads {
                graph.set_rotation(head, Vec3::new(0.0, t, 0.0)).unwrap();
            }
            for &leaf in &leaves {
                black_box(graph.world_matrix(leaf).unwrap());
            }
        });
    });

    group.bench_function("Enabled traversal", |b| {
        b.iter(|| black_box(graph.iter_enabled().count()));
    });

    group.finish();
}

criterion_group!(benches, bench_world_matrices);
criterion_main!(benches);
