// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Renders a small animated scene on the headless device and logs frame stats.
//!
//! Usage: `sandbox [config.ron] [frames]`

use std::sync::Arc;

use anyhow::Context;
use lumen_agents::{FrameOutcome, SceneRenderer};
use lumen_core::math::Vec3;
use lumen_core::RenderConfig;
use lumen_data::assets::primitives::create_cube;
use lumen_data::assets::Material;
use lumen_data::components::{CameraComponent, LightComponent, MeshComponent};
use lumen_data::Scene;
use lumen_infra::{init_logging, HeadlessDevice};

const VIEWPORT: (u32, u32) = (1280, 720);
const GRID: i32 = 6;

fn build_scene(device: &HeadlessDevice) -> anyhow::Result<Scene> {
    let mut scene = Scene::new();
    let root = scene.root();

    let camera = scene.graph.spawn(root, "camera")?;
    scene.graph.set_position(camera, Vec3::new(0.0, 6.0, 14.0))?;
    scene.graph.look_at(camera, Vec3::ZERO, Some(Vec3::Y))?;
    scene.graph.add_component(
        camera,
        CameraComponent::new_perspective(60f32.to_radians(), 16.0 / 9.0, 0.1, 200.0),
    )?;

    let sun = scene.graph.spawn(root, "sun")?;
    scene.graph.set_rotation(sun, Vec3::new(-0.9, 0.4, 0.0))?;
    scene
        .graph
        .add_component(sun, LightComponent::directional(Vec3::ONE, 3.0).with_shadows(0.005))?;

    let lamp = scene.graph.spawn(root, "lamp")?;
    scene.graph.set_position(lamp, Vec3::new(0.0, 1.5, 0.0))?;
    scene
        .graph
        .add_component(lamp, LightComponent::point(Vec3::new(1.0, 0.6, 0.3), 8.0, 6.0))?;

    let mesh = Arc::new(create_cube(device, 1.0)?);
    let materials = [
        Material::new([0.8, 0.2, 0.2, 1.0], 0.5, 0.0),
        Material::new([0.2, 0.8, 0.2, 1.0], 0.3, 0.0),
        Material::new([0.7, 0.7, 0.75, 1.0], 0.2, 1.0),
    ];
    let pivot = scene.graph.spawn(root, "pivot")?;
    for z in -GRID / 2..GRID / 2 {
        for x in -GRID / 2..GRID / 2 {
            let cube = scene.graph.spawn(pivot, format!("cube {x} {z}"))?;
            scene
                .graph
                .set_position(cube, Vec3::new(x as f32 * 2.0, 0.0, z as f32 * 2.0))?;
            let material = materials[(x + z).rem_euclid(materials.len() as i32) as usize];
            scene
                .graph
                .add_component(cube, MeshComponent::new(mesh.clone(), material))?;
        }
    }

    scene.add_animation(move |graph, dt| {
        if let Ok(mut transform) = graph.transform(pivot) {
            transform.rotation = transform.rotation + Vec3::new(0.0, dt * 0.5, 0.0);
            let _ = graph.set_transform(pivot, transform);
        }
    });
    Ok(scene)
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => RenderConfig::load_from_file(&path)
            .with_context(|| format!("loading render config from {path}"))?,
        None => RenderConfig::default(),
    };
    let frames: u32 = match args.next() {
        Some(n) => n.parse().context("frame count must be a number")?,
        None => 10,
    };

    let device = HeadlessDevice::new();
    let mut scene = build_scene(&device)?;
    let mut renderer = SceneRenderer::new(Arc::new(device.clone()), config, VIEWPORT)?;

    for _ in 0..frames {
        match renderer.render_frame(&mut scene, 1.0 / 60.0)? {
            FrameOutcome::Presented(output) => {
                let stats = renderer.stats();
                log::info!(
                    "frame {} -> {:?} {}x{}: {} views, {} draws, {} instances, {} lights, {} shadow passes, {:?}",
                    stats.frames,
                    output.image,
                    output.size.0,
                    output.size.1,
                    stats.views,
                    stats.draw_calls,
                    stats.instances,
                    stats.lights,
                    stats.shadow_passes,
                    stats.frame_time,
                );
            }
            FrameOutcome::Skipped => log::warn!("frame skipped"),
        }
        device.complete_all();
    }

    log::info!(
        "rendered {} frames, skipped {}",
        renderer.stats().frames,
        renderer.stats().skipped_frames
    );
    renderer.destroy()?;
    Ok(())
}
