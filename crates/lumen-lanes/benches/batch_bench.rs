use criterion::{criterion_group, criterion_main, Criterion};
use lumen_core::math::{Mat4, Vec3};
use lumen_data::assets::primitives::create_cube;
use lumen_data::assets::Material;
use lumen_data::components::{CameraComponent, MeshComponent};
use lumen_data::scene::Scene;
use lumen_infra::HeadlessDevice;
use lumen_lanes::DrawCallBatcher;
use std::hint::black_box;
use std::sync::Arc;

fn bench_batching(c: &mut Criterion) {
    // 10_000 cubes in 8 materials, about half of them behind the camera
    let device = HeadlessDevice::new();
    let cube = Arc::new(create_cube(&device, 1.0).unwrap());
    let mut scene = Scene::new();
    let root = scene.root();
    for i in 0..10_000 {
        let id = scene.graph.spawn(root, "cube").unwrap();
        let z = if i % 2 == 0 { -5.0 } else { 5.0 } - (i % 50) as f32;
        scene
            .graph
            .set_position(id, Vec3::new((i % 20) as f32 - 10.0, 0.0, z))
            .unwrap();
        let tint = (i % 8) as f32 / 8.0;
        let material = Material::new([tint, 0.5, 0.5, 1.0], 0.5, 0.0);
        scene
            .graph
            .add_component(id, MeshComponent::new(Arc::clone(&cube), material))
            .unwrap();
    }
    let camera = CameraComponent::new_perspective(60f32.to_radians(), 16.0 / 9.0, 0.1, 200.0);
    let frustum = camera.frustum(&Mat4::IDENTITY).unwrap();
    let candidates = scene.gather().meshes;
    let mut batcher = DrawCallBatcher::new(&device, 2, true).unwrap();

    let mut group = c.benchmark_group("Draw Call Batcher");

    group.bench_function("Cull and group 10k cubes", |b| {
        let mut slot = 0;
        b.iter(|| {
            slot = (slot + 1) % 2;
            batcher.begin_frame(slot);
            black_box(batcher.batch(&scene, &frustum, &candidates));
        });
    });

    group.bench_function("Cull, group and upload 10k cubes", |b| {
        b.iter(|| {
            batcher.begin_frame(0);
            black_box(batcher.batch(&scene, &frustum, &candidates));
            black_box(batcher.upload(&device).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_batching);
criterion_main!(benches);
