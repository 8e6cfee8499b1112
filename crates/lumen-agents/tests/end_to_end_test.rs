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

mod common;

use common::{bound_buffer, cube_scene, pass, read, renderer, VIEWPORT};
use lumen_agents::FrameOutcome;
use lumen_core::math::{Mat4, Vec3, Vec4};
use lumen_core::renderer::api::LoadOp;
use lumen_core::renderer::params::{CameraParams, InstanceParams, LightGlobalParams, LightParams};
use lumen_core::RenderConfig;
use lumen_infra::{HeadlessDevice, RecordedCommand};
use lumen_lanes::bindings;

#[test]
fn lit_cube_is_drawn_into_its_footprint() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    let config = RenderConfig {
        clear_color: [0.1, 0.2, 0.3, 1.0],
        ..Default::default()
    };
    let mut renderer = renderer(&device, config);

    let FrameOutcome::Presented(output) = renderer.render_frame(&mut world.scene, 0.016).unwrap()
    else {
        panic!("frame was skipped");
    };
    assert_eq!(output.size, VIEWPORT);
    let targets = *renderer.gbuffer().targets().unwrap();
    assert_eq!(output.image, targets.output);

    let passes = device.submitted_passes(output.submission).unwrap();
    let labels: Vec<_> = passes.iter().filter_map(|p| p.label.as_deref()).collect();
    assert_eq!(labels, ["GBuffer Prepass", "Light Accumulation", "Deferred Shading"]);

    // Prepass: one cube instance into depth and the four color targets.
    let prepass = pass(&passes, "GBuffer Prepass");
    assert_eq!(prepass.depth_attachment.unwrap().texture, targets.depth);
    let written: Vec<_> = prepass.color_attachments.iter().map(|a| a.texture).collect();
    assert_eq!(written, [targets.albedo, targets.normal, targets.shading, targets.tangent]);
    assert_eq!(prepass.draw_count(), 1);
    assert_eq!(prepass.instance_count(), 1);

    let (instances, offset) = bound_buffer(prepass, bindings::INSTANCES);
    let instance: InstanceParams = read(&device, instances, offset);
    assert_eq!(instance.model[3], [0.0, 0.0, -3.0, 1.0]);

    // The cube covers part of the screen, not all of it.
    let (cameras, offset) = bound_buffer(prepass, bindings::CAMERA);
    let camera: CameraParams = read(&device, cameras, offset);
    let view_projection = Mat4::from_cols_array_2d(&camera.view_projection);
    let (mut min, mut max) = ([f32::MAX; 2], [f32::MIN; 2]);
    for i in 0..8 {
        let corner = Vec3::new(
            if i & 1 == 0 { -0.5 } else { 0.5 },
            if i & 2 == 0 { -0.5 } else { 0.5 },
            if i & 4 == 0 { -3.5 } else { -2.5 },
        );
        let clip = view_projection * Vec4::from_vec3(corner, 1.0);
        for (axis, ndc) in [clip.x / clip.w, clip.y / clip.w].into_iter().enumerate() {
            min[axis] = min[axis].min(ndc);
            max[axis] = max[axis].max(ndc);
        }
    }
    for axis in 0..2 {
        assert!(min[axis] > -1.0 && max[axis] < 1.0, "footprint leaves the screen");
        assert!(max[axis] - min[axis] > 0.1, "footprint is empty");
    }
    let covered = (max[0] - min[0]) * (max[1] - min[1]) / 4.0;
    assert!(covered < 0.5);

    // Light accumulation: the directional light shades the G-buffer.
    let lighting = pass(&passes, "Light Accumulation");
    assert_eq!(lighting.color_attachments[0].texture, targets.lighting);
    assert!(lighting.commands.contains(&RecordedCommand::Draw {
        vertices: 0..3,
        instances: 0..1,
    }));
    let (lights, offset) = bound_buffer(lighting, bindings::LIGHTS);
    let light: LightParams = read(&device, lights, offset);
    assert_eq!(light.direction_type[3], LightParams::TYPE_DIRECTIONAL);
    assert_eq!(light.color_intensity, [1.0, 1.0, 1.0, 3.0]);
    assert_eq!(light.shadow[3], -1.0);
    let (globals, offset) = bound_buffer(lighting, bindings::LIGHT_GLOBALS);
    let globals: LightGlobalParams = read(&device, globals, offset);
    assert_eq!((globals.num_directional, globals.num_point), (1, 0));

    // Shading clears to the background, then combines lighting into the output.
    let shading = pass(&passes, "Deferred Shading");
    let output_attachment = shading.color_attachments[0];
    assert_eq!(output_attachment.texture, targets.output);
    assert_eq!(output_attachment.ops.load, LoadOp::Clear([0.1, 0.2, 0.3, 1.0]));
    assert!(shading.textures().any(|t| t == targets.lighting));

    let stats = renderer.stats();
    assert_eq!((stats.views, stats.draw_calls, stats.instances, stats.lights), (1, 1, 1, 1));
}

#[test]
fn cube_behind_the_camera_leaves_the_background() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    world
        .scene
        .graph
        .set_position(world.cube, Vec3::new(0.0, 0.0, 3.0))
        .unwrap();
    let mut renderer = renderer(&device, RenderConfig::default());

    let FrameOutcome::Presented(output) = renderer.render_frame(&mut world.scene, 0.0).unwrap()
    else {
        panic!("frame was skipped");
    };
    let passes = device.submitted_passes(output.submission).unwrap();
    assert_eq!(pass(&passes, "GBuffer Prepass").draw_count(), 0);
    assert_eq!(renderer.stats().instances, 0);
}

#[test]
fn shadow_maps_render_before_the_views_that_sample_them() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    world
        .scene
        .graph
        .light_mut(world.sun)
        .unwrap()
        .cast_shadows = true;
    let config = RenderConfig {
        shadow: lumen_core::config::ShadowConfig {
            resolution: 512,
            cascades: 2,
        },
        ..Default::default()
    };
    let mut renderer = renderer(&device, config);

    let FrameOutcome::Presented(output) = renderer.render_frame(&mut world.scene, 0.0).unwrap()
    else {
        panic!("frame was skipped");
    };
    let shadow = renderer.shadows().buffer(world.sun).unwrap().texture();
    let passes = device.submitted_passes(output.submission).unwrap();
    assert!(passes[0].label.as_deref().unwrap().starts_with("Shadow Pass"));
    assert!(passes[1].label.as_deref().unwrap().starts_with("Shadow Pass"));
    assert_eq!(passes[1].depth_attachment.unwrap().array_layer, 1);
    assert!(pass(&passes, "Light Accumulation").textures().any(|t| t == shadow));

    let (lights, offset) = bound_buffer(pass(&passes, "Light Accumulation"), bindings::LIGHTS);
    let light: LightParams = read(&device, lights, offset);
    assert_eq!(light.shadow[3], 0.0);

    // Turning shadows off releases the map on the next frame.
    world.scene.graph.light_mut(world.sun).unwrap().cast_shadows = false;
    renderer.render_frame(&mut world.scene, 0.0).unwrap();
    assert!(renderer.shadows().is_empty());
    assert!(device.texture_info(shadow).is_none());
}

#[test]
fn animations_advance_before_culling() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    let cube = world.cube;
    world.scene.add_animation(move |graph, dt| {
        let mut transform = graph.transform(cube).unwrap();
        transform.position = transform.position + Vec3::new(0.0, 0.0, 10.0 * dt);
        graph.set_transform(cube, transform).unwrap();
    });
    let mut renderer = renderer(&device, RenderConfig::default());

    renderer.render_frame(&mut world.scene, 0.0).unwrap();
    assert_eq!(renderer.stats().instances, 1);
    // Moved to z = +7, behind the camera.
    renderer.render_frame(&mut world.scene, 1.0).unwrap();
    assert_eq!(renderer.stats().instances, 0);
}
