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

use common::{cube_scene, pass, renderer, CubeScene};
use lumen_agents::{FrameOutcome, MAX_CONSECUTIVE_SKIPS};
use lumen_core::config::AllocationFallback;
use lumen_core::renderer::api::{
    Extent3D, Operations, RenderPassColorAttachment, RenderPassDescriptor, TextureDescriptor,
    TextureFormat, TextureId, TextureUsage,
};
use lumen_core::renderer::{CommandEncoder, GraphicsDevice, RenderError, ResourceError};
use lumen_core::RenderConfig;
use lumen_data::scene::{IblStages, ImageBasedLighting};
use lumen_infra::{HeadlessDevice, RecordedCommand};
use lumen_lanes::bindings;
use lumen_lanes::{IblProcessor, PostProcessContext, PostProcessLayer};
use std::sync::{Arc, Mutex};

fn small_texture(device: &HeadlessDevice, label: &'static str) -> TextureId {
    device
        .create_texture(&TextureDescriptor {
            label: Some(label.into()),
            size: Extent3D::new_2d(8, 8),
            mip_level_count: 1,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        })
        .unwrap()
}

fn cast_sun_shadows(world: &mut CubeScene) {
    world.scene.graph.light_mut(world.sun).unwrap().cast_shadows = true;
}

/// Bakes every IBL stage into a texture allocated up front.
struct Baker {
    environment: TextureId,
    irradiance: TextureId,
    specular: TextureId,
    brdf: TextureId,
}

impl Baker {
    fn new(device: &HeadlessDevice) -> Self {
        Self {
            environment: small_texture(device, "Environment"),
            irradiance: small_texture(device, "Irradiance"),
            specular: small_texture(device, "Specular"),
            brdf: small_texture(device, "BRDF"),
        }
    }
}

impl IblProcessor for Baker {
    fn render(
        &mut self,
        stage: IblStages,
        input: TextureId,
        _device: &dyn GraphicsDevice,
        encoder: &mut dyn CommandEncoder,
    ) -> Result<TextureId, RenderError> {
        let target = match stage {
            IblStages::ENVIRONMENT => self.environment,
            IblStages::IRRADIANCE => self.irradiance,
            IblStages::SPECULAR => self.specular,
            _ => self.brdf,
        };
        let attachments = [RenderPassColorAttachment {
            texture: target,
            array_layer: 0,
            ops: Operations::clear([0.0; 4]),
        }];
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("IBL Bake"),
            color_attachments: &attachments,
            depth_attachment: None,
        });
        pass.set_texture(0, input);
        pass.draw(0..3, 0..1);
        Ok(target)
    }
}

#[test]
fn skipped_frame_keeps_ibl_stages_pending() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    let mut renderer = renderer(&device, RenderConfig::default());
    let baker = Baker::new(&device);
    let irradiance = baker.irradiance;
    renderer.set_ibl_processor(Box::new(baker));
    renderer.render_frame(&mut world.scene, 0.0).unwrap();
    let submitted = device.last_submission();

    // The bake is recorded, then the shadow map does not fit.
    world.scene.ibl = Some(ImageBasedLighting::new(small_texture(&device, "Panorama")));
    cast_sun_shadows(&mut world);
    device.set_memory_budget(Some(device.allocated_bytes()));

    assert_eq!(renderer.render_frame(&mut world.scene, 0.0).unwrap(), FrameOutcome::Skipped);
    assert_eq!(device.last_submission(), submitted);
    let ibl = world.scene.ibl.as_ref().unwrap();
    assert_eq!(ibl.pending(), IblStages::all());
    assert!(ibl.maps().is_none());

    device.set_memory_budget(None);
    let FrameOutcome::Presented(output) = renderer.render_frame(&mut world.scene, 0.0).unwrap()
    else {
        panic!("retry was skipped");
    };
    assert!(world.scene.ibl.as_ref().unwrap().pending().is_empty());
    let passes = device.submitted_passes(output.submission).unwrap();
    let bakes = passes
        .iter()
        .filter(|p| p.label.as_deref() == Some("IBL Bake"))
        .count();
    assert_eq!(bakes, 4);
    let shading = pass(&passes, "Deferred Shading");
    assert!(shading.commands.iter().any(|c| matches!(
        c,
        RecordedCommand::SetTexture { binding, texture }
            if *binding == bindings::IBL_IRRADIANCE && *texture == irradiance
    )));
}

#[derive(Default)]
struct LayerState {
    fail_next_resize: bool,
    size: Option<(u32, u32)>,
}

/// A layer that can be told to refuse its next resize.
struct Flaky(Arc<Mutex<LayerState>>);

impl PostProcessLayer for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    fn rendering_order(&self) -> u32 {
        3000
    }

    fn resize(
        &mut self,
        _device: &dyn GraphicsDevice,
        width: u32,
        height: u32,
    ) -> Result<(), ResourceError> {
        let mut state = self.0.lock().unwrap();
        if std::mem::take(&mut state.fail_next_resize) {
            return Err(ResourceError::OutOfMemory {
                label: "flaky".to_string(),
                requested_bytes: 1,
            });
        }
        state.size = Some((width, height));
        Ok(())
    }

    fn render(&mut self, _ctx: &mut PostProcessContext<'_>) -> Result<(), RenderError> {
        Ok(())
    }
}

#[test]
fn failed_post_resize_is_finished_by_the_next_frame() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    let mut renderer = renderer(&device, RenderConfig::default());
    let state = Arc::new(Mutex::new(LayerState::default()));
    renderer
        .add_post_process(Box::new(Flaky(Arc::clone(&state))))
        .unwrap();
    renderer.render_frame(&mut world.scene, 0.0).unwrap();
    assert_eq!(state.lock().unwrap().size, Some((320, 240)));

    state.lock().unwrap().fail_next_resize = true;
    let err = renderer.resize(640, 480).unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(renderer.gbuffer().size(), (640, 480));
    assert_eq!(state.lock().unwrap().size, Some((320, 240)));

    for _ in 0..2 {
        let FrameOutcome::Presented(output) = renderer.render_frame(&mut world.scene, 0.0).unwrap()
        else {
            panic!("frame was skipped");
        };
        assert_eq!(output.size, (640, 480));
        assert_eq!(state.lock().unwrap().size, Some((640, 480)));
    }
}

#[test]
fn shadow_map_out_of_memory_lowers_the_shadow_resolution() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    let config = RenderConfig {
        allocation_fallback: AllocationFallback::ReduceResolution { min_scale: 1.0 },
        ..Default::default()
    };
    let mut renderer = renderer(&device, config);
    renderer.render_frame(&mut world.scene, 0.0).unwrap();

    // A 2048² depth map takes 16 MiB; a 1024² one takes 4 MiB.
    cast_sun_shadows(&mut world);
    device.set_memory_budget(Some(device.allocated_bytes() + (8 << 20)));

    assert_eq!(renderer.render_frame(&mut world.scene, 0.0).unwrap(), FrameOutcome::Skipped);
    assert!(renderer.shadows().buffer(world.sun).is_none());
    assert_eq!(renderer.shadows().default_resolution(), 1024);

    let FrameOutcome::Presented(output) = renderer.render_frame(&mut world.scene, 0.0).unwrap()
    else {
        panic!("reduced frame was skipped");
    };
    assert_eq!(renderer.shadows().buffer(world.sun).unwrap().resolution(), 1024);
    assert_eq!(renderer.render_scale(), 1.0);
    assert_eq!(output.size, (320, 240));
    let passes = device.submitted_passes(output.submission).unwrap();
    assert!(passes
        .iter()
        .any(|p| p.label.as_deref().is_some_and(|l| l.starts_with("Shadow Pass"))));
}

#[test]
fn repeated_out_of_memory_is_returned_after_the_skip_limit() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    let mut renderer = renderer(&device, RenderConfig::default());
    renderer.render_frame(&mut world.scene, 0.0).unwrap();

    cast_sun_shadows(&mut world);
    device.set_memory_budget(Some(device.allocated_bytes()));
    for _ in 0..MAX_CONSECUTIVE_SKIPS {
        assert_eq!(renderer.render_frame(&mut world.scene, 0.0).unwrap(), FrameOutcome::Skipped);
    }
    let err = renderer.render_frame(&mut world.scene, 0.0).unwrap_err();
    assert!(matches!(
        err,
        RenderError::ResourceError(ResourceError::OutOfMemory { .. })
    ));
    assert_eq!(renderer.stats().skipped_frames, MAX_CONSECUTIVE_SKIPS as u64);

    // The count starts over once memory is available again.
    device.set_memory_budget(None);
    assert!(matches!(
        renderer.render_frame(&mut world.scene, 0.0).unwrap(),
        FrameOutcome::Presented(_)
    ));
    assert!(renderer.shadows().buffer(world.sun).is_some());
}

#[test]
fn skipped_frames_still_advance_animations() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    let elapsed = Arc::new(Mutex::new(0.0f32));
    let clock = Arc::clone(&elapsed);
    world
        .scene
        .add_animation(move |_, dt| *clock.lock().unwrap() += dt);
    let mut renderer = renderer(&device, RenderConfig::default());
    renderer.render_frame(&mut world.scene, 0.25).unwrap();

    cast_sun_shadows(&mut world);
    device.set_memory_budget(Some(device.allocated_bytes()));
    assert_eq!(renderer.render_frame(&mut world.scene, 0.5).unwrap(), FrameOutcome::Skipped);
    assert_eq!(*elapsed.lock().unwrap(), 0.75);
}

#[test]
fn lost_device_aborts_the_frame() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    let mut renderer = renderer(&device, RenderConfig::default());
    renderer.render_frame(&mut world.scene, 0.0).unwrap();
    let submitted = device.last_submission();

    device.lose_device();
    let err = renderer.render_frame(&mut world.scene, 0.0).unwrap_err();
    assert!(matches!(err, RenderError::DeviceLost));
    assert!(!err.is_recoverable());
    assert_eq!(device.last_submission(), submitted);
}
