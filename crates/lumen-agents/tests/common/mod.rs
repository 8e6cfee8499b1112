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

#![allow(dead_code)]

use lumen_agents::SceneRenderer;
use lumen_core::math::Vec3;
use lumen_core::renderer::api::BufferId;
use lumen_core::RenderConfig;
use lumen_data::assets::primitives::create_cube;
use lumen_data::assets::Material;
use lumen_data::components::{CameraComponent, LightComponent, MeshComponent};
use lumen_data::scene::{NodeId, Scene};
use lumen_infra::{HeadlessDevice, RecordedCommand, RecordedPass};
use std::sync::Arc;

pub const VIEWPORT: (u32, u32) = (320, 240);

pub struct CubeScene {
    pub scene: Scene,
    pub camera: NodeId,
    pub sun: NodeId,
    pub cube: NodeId,
}

/// A camera at the origin looking down -Z, a directional light without
/// shadows, and a unit cube three units in front of the camera.
pub fn cube_scene(device: &HeadlessDevice) -> CubeScene {
    let mut scene = Scene::new();
    let root = scene.root();

    let camera = scene.graph.spawn(root, "camera").unwrap();
    scene
        .graph
        .add_component(
            camera,
            CameraComponent::new_perspective(60f32.to_radians(), 4.0 / 3.0, 0.1, 100.0),
        )
        .unwrap();

    let sun = scene.graph.spawn(root, "sun").unwrap();
    scene.graph.set_rotation(sun, Vec3::new(-0.8, 0.3, 0.0)).unwrap();
    scene
        .graph
        .add_component(sun, LightComponent::directional(Vec3::ONE, 3.0))
        .unwrap();

    let mesh = Arc::new(create_cube(device, 1.0).unwrap());
    let cube = scene.graph.spawn(root, "cube").unwrap();
    scene.graph.set_position(cube, Vec3::new(0.0, 0.0, -3.0)).unwrap();
    scene
        .graph
        .add_component(cube, MeshComponent::new(mesh, Material::default()))
        .unwrap();

    CubeScene {
        scene,
        camera,
        sun,
        cube,
    }
}

pub fn renderer(device: &HeadlessDevice, config: RenderConfig) -> SceneRenderer {
    SceneRenderer::new(Arc::new(device.clone()), config, VIEWPORT).unwrap()
}

pub fn pass<'a>(passes: &'a [RecordedPass], label: &str) -> &'a RecordedPass {
    passes
        .iter()
        .find(|p| p.label.as_deref() == Some(label))
        .unwrap_or_else(|| panic!("no pass labelled '{label}'"))
}

/// The buffer and offset bound at `binding` in `pass`.
pub fn bound_buffer(pass: &RecordedPass, binding: u32) -> (BufferId, u64) {
    pass.commands
        .iter()
        .find_map(|c| match c {
            RecordedCommand::SetBuffer {
                binding: b,
                buffer,
                offset,
            } if *b == binding => Some((*buffer, *offset)),
            _ => None,
        })
        .unwrap_or_else(|| panic!("nothing bound at {binding}"))
}

pub fn read<T: bytemuck::Pod>(device: &HeadlessDevice, buffer: BufferId, offset: u64) -> T {
    let bytes = device.buffer_contents(buffer).unwrap();
    let start = offset as usize;
    bytemuck::pod_read_unaligned(&bytes[start..start + std::mem::size_of::<T>()])
}
